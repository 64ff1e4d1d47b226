//! Microphone capture chunked into fixed-size PCM16 frames.

use std::sync::Arc;

use cpal::traits::DeviceTrait;
use log::{debug, error, info};
use parking_lot::Mutex;

use super::codec::{self, remix};
use super::resample::StreamResampler;
use super::device::{self, StreamThread};
use crate::errors::SpotterError;

/// Receives each encoded frame, in arrival order.
pub type FrameSink = Box<dyn FnMut(Vec<u8>) + Send>;

/// Accumulates device audio into frames of exactly `frame_samples` mono
/// samples at the target rate. Holds at most one partial frame.
#[derive(Debug)]
pub struct FrameChunker {
    frame_samples: usize,
    target_rate: u32,
    source_channels: u16,
    resampler: Option<StreamResampler>,
    pending: Vec<f32>,
}

impl FrameChunker {
    pub fn new(frame_samples: usize, target_rate: u32) -> Self {
        Self {
            frame_samples,
            target_rate,
            source_channels: 1,
            resampler: None,
            pending: Vec::with_capacity(frame_samples),
        }
    }

    pub fn set_source(&mut self, sample_rate: u32, channels: u16) -> Result<(), SpotterError> {
        self.resampler = if sample_rate == self.target_rate {
            None
        } else {
            Some(StreamResampler::new(sample_rate, self.target_rate)?)
        };
        self.source_channels = channels;
        Ok(())
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn push(&mut self, data: &[f32]) -> Vec<Vec<f32>> {
        let mono = remix(data, self.source_channels, 1);
        let samples = match self.resampler.as_mut() {
            Some(resampler) => resampler.process(&mono),
            None => mono,
        };

        let mut frames = Vec::new();
        let mut rest = samples.as_slice();
        while !rest.is_empty() {
            let wanted = self.frame_samples - self.pending.len();
            let take = wanted.min(rest.len());
            self.pending.extend_from_slice(&rest[..take]);
            rest = &rest[take..];
            if self.pending.len() == self.frame_samples {
                frames.push(std::mem::replace(
                    &mut self.pending,
                    Vec::with_capacity(self.frame_samples),
                ));
            }
        }
        frames
    }
}

struct CaptureInner {
    chunker: FrameChunker,
    sink: Option<FrameSink>,
    frames_sent: u64,
}

impl CaptureInner {
    fn process(&mut self, data: &[f32]) {
        let Some(sink) = self.sink.as_mut() else {
            return;
        };
        for frame in self.chunker.push(data) {
            sink(codec::encode(&frame));
            self.frames_sent += 1;
        }
    }
}

/// Push side of a headless capture pipeline, standing in for the device.
#[derive(Clone)]
pub struct CaptureFeed {
    inner: Arc<Mutex<CaptureInner>>,
}

impl CaptureFeed {
    pub fn push(&self, samples: &[f32]) {
        self.inner.lock().process(samples);
    }
}

pub struct CapturePipeline {
    inner: Arc<Mutex<CaptureInner>>,
    stream: Option<StreamThread>,
    stopped: bool,
}

impl CapturePipeline {
    fn with_sink(frame_samples: usize, sample_rate: u32, sink: FrameSink) -> Self {
        Self {
            inner: Arc::new(Mutex::new(CaptureInner {
                chunker: FrameChunker::new(frame_samples, sample_rate),
                sink: Some(sink),
                frames_sent: 0,
            })),
            stream: None,
            stopped: false,
        }
    }

    /// Open the default microphone and start delivering frames to `sink`.
    pub async fn start_device(
        frame_samples: usize,
        sample_rate: u32,
        sink: FrameSink,
    ) -> Result<Self, SpotterError> {
        let mut pipeline = Self::with_sink(frame_samples, sample_rate, sink);
        let inner = pipeline.inner.clone();

        let stream = StreamThread::spawn("capture", move || {
            let device = device::default_input_device()?;
            let config = device
                .default_input_config()
                .map_err(SpotterError::device)?;
            let source_rate = config.sample_rate();
            let source_channels = config.channels();
            info!(
                "Capture: {}Hz, {} channels, format={:?} -> {}Hz mono",
                source_rate,
                source_channels,
                config.sample_format(),
                sample_rate
            );
            inner.lock().chunker.set_source(source_rate, source_channels)?;

            let callback_inner = inner.clone();
            device
                .build_input_stream(
                    &config.into(),
                    move |data: &[f32], _: &cpal::InputCallbackInfo| {
                        callback_inner.lock().process(data);
                    },
                    |err| {
                        error!("Capture stream error: {}", err);
                    },
                    None,
                )
                .map_err(SpotterError::device)
        })
        .await?;

        pipeline.stream = Some(stream);
        Ok(pipeline)
    }

    /// A pipeline with no device; audio is pushed through the returned feed.
    pub fn headless(frame_samples: usize, sample_rate: u32, sink: FrameSink) -> (Self, CaptureFeed) {
        let pipeline = Self::with_sink(frame_samples, sample_rate, sink);
        let feed = CaptureFeed {
            inner: pipeline.inner.clone(),
        };
        (pipeline, feed)
    }

    pub fn frames_sent(&self) -> u64 {
        self.inner.lock().frames_sent
    }

    pub fn is_running(&self) -> bool {
        !self.stopped
    }

    /// Release the device and detach the sink. Safe to call repeatedly.
    pub fn stop(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        if let Some(mut stream) = self.stream.take() {
            stream.stop();
        }
        let mut inner = self.inner.lock();
        inner.sink = None;
        debug!("Capture stopped after {} frames", inner.frames_sent);
    }
}

impl Drop for CapturePipeline {
    fn drop(&mut self) {
        self.stop();
    }
}
