//! PCM16 wire format conversions.
//!
//! The remote endpoint speaks little-endian signed 16-bit mono PCM, base64
//! encoded inside JSON. Device streams speak f32 in [-1, 1].

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;

use crate::errors::SpotterError;

pub const SAMPLE_WIDTH: usize = 2;

const SCALE: f32 = 32768.0;

/// A device-ready buffer of interleaved f32 samples.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    pub sample_rate: u32,
    pub channels: u16,
    pub samples: Vec<f32>,
}

impl AudioBuffer {
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            0
        } else {
            self.samples.len() / self.channels as usize
        }
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            0.0
        } else {
            self.frames() as f64 / self.sample_rate as f64
        }
    }

    /// Convert to another rate and channel count for a device stream.
    pub fn convert(&self, sample_rate: u32, channels: u16) -> AudioBuffer {
        self.convert_continuing(sample_rate, channels, &mut 0.0)
    }

    /// Like `convert`, for one buffer of a longer stream. `carry` holds the
    /// fractional output frame owed by earlier buffers, so lengths summed over
    /// the stream match the exact rate ratio.
    pub fn convert_continuing(&self, sample_rate: u32, channels: u16, carry: &mut f64) -> AudioBuffer {
        let mono = remix(&self.samples, self.channels, 1);
        let resampled = resample_linear_carry(&mono, self.sample_rate, sample_rate, carry);
        AudioBuffer {
            sample_rate,
            channels,
            samples: remix(&resampled, 1, channels),
        }
    }
}

pub fn f32_to_i16(sample: f32) -> i16 {
    (sample * SCALE).round().clamp(i16::MIN as f32, i16::MAX as f32) as i16
}

pub fn i16_to_f32(sample: i16) -> f32 {
    sample as f32 / SCALE
}

/// Encode float samples as little-endian PCM16 bytes.
pub fn encode(frame: &[f32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(frame.len() * SAMPLE_WIDTH);
    for &s in frame {
        out.extend_from_slice(&f32_to_i16(s).to_le_bytes());
    }
    out
}

/// Decode little-endian PCM16 bytes.
pub fn decode(payload: &[u8]) -> Result<Vec<i16>, SpotterError> {
    if payload.len() % SAMPLE_WIDTH != 0 {
        return Err(SpotterError::MalformedAudio {
            len: payload.len(),
            width: SAMPLE_WIDTH,
        });
    }
    Ok(payload
        .chunks_exact(SAMPLE_WIDTH)
        .map(|b| i16::from_le_bytes([b[0], b[1]]))
        .collect())
}

pub fn decode_audio_data(
    payload: &[u8],
    sample_rate: u32,
    channels: u16,
) -> Result<AudioBuffer, SpotterError> {
    let pcm = decode(payload)?;
    if channels > 1 && pcm.len() % channels as usize != 0 {
        return Err(SpotterError::MalformedAudio {
            len: payload.len(),
            width: SAMPLE_WIDTH * channels as usize,
        });
    }
    Ok(AudioBuffer {
        sample_rate,
        channels,
        samples: pcm.into_iter().map(i16_to_f32).collect(),
    })
}

pub fn encode_base64(frame: &[f32]) -> String {
    encode_base64_bytes(&encode(frame))
}

pub fn encode_base64_bytes(pcm: &[u8]) -> String {
    BASE64.encode(pcm)
}

pub fn decode_base64(data: &str) -> Result<Vec<u8>, SpotterError> {
    BASE64
        .decode(data.trim())
        .map_err(|e| SpotterError::RemoteSession(format!("invalid base64 audio: {}", e)))
}

/// Linear interpolation resampler for mono input.
pub fn resample_linear(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    resample_linear_carry(samples, from_rate, to_rate, &mut 0.0)
}

pub fn resample_linear_carry(
    samples: &[f32],
    from_rate: u32,
    to_rate: u32,
    carry: &mut f64,
) -> Vec<f32> {
    if from_rate == to_rate || samples.is_empty() || from_rate == 0 || to_rate == 0 {
        return samples.to_vec();
    }
    let exact = samples.len() as f64 * to_rate as f64 / from_rate as f64 + *carry;
    // Never collapse a non-empty buffer; the extra frame is paid back later.
    let out_len = (exact.floor() as usize).max(1);
    *carry = exact - out_len as f64;

    let step = (samples.len() as f64 / out_len as f64).min(from_rate as f64 / to_rate as f64);
    let last = samples.len() - 1;
    (0..out_len)
        .map(|i| {
            let pos = i as f64 * step;
            let idx = pos.floor() as usize;
            if idx >= last {
                return samples[last];
            }
            let frac = (pos - idx as f64) as f32;
            samples[idx] + (samples[idx + 1] - samples[idx]) * frac
        })
        .collect()
}

/// Mix interleaved audio down to mono or duplicate mono out to N channels.
pub fn remix(samples: &[f32], from_channels: u16, to_channels: u16) -> Vec<f32> {
    if from_channels == to_channels || from_channels == 0 || to_channels == 0 {
        return samples.to_vec();
    }
    let mono: Vec<f32> = if from_channels == 1 {
        samples.to_vec()
    } else {
        samples
            .chunks(from_channels as usize)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect()
    };
    if to_channels == 1 {
        return mono;
    }
    mono.iter()
        .flat_map(|&s| std::iter::repeat_n(s, to_channels as usize))
        .collect()
}
