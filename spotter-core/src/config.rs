use std::env;
use std::time::Duration;

use crate::errors::SpotterError;

pub const CAPTURE_SAMPLE_RATE: u32 = 16_000;
pub const PLAYBACK_SAMPLE_RATE: u32 = 24_000;
pub const CAPTURE_FRAME_SAMPLES: usize = 4096;

const DEFAULT_LIVE_MODEL: &str = "models/gemini-2.5-flash-native-audio-preview-09-2025";
const DEFAULT_VOICE: &str = "Puck";
const DEFAULT_LIVE_ENDPOINT: &str = "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioMode {
    /// Real microphone and speaker through cpal.
    Device,
    /// No devices; capture is fed and playback is rendered by the caller.
    Headless,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub capture_sample_rate: u32,
    pub playback_sample_rate: u32,
    pub frame_samples: usize,
    pub transcript_clear_delay: Duration,
    pub completion_grace: Duration,
    pub audio_mode: AudioMode,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            capture_sample_rate: CAPTURE_SAMPLE_RATE,
            playback_sample_rate: PLAYBACK_SAMPLE_RATE,
            frame_samples: CAPTURE_FRAME_SAMPLES,
            transcript_clear_delay: Duration::from_secs(3),
            completion_grace: Duration::from_secs(3),
            audio_mode: AudioMode::Device,
        }
    }
}

impl SessionConfig {
    pub fn headless() -> Self {
        Self {
            audio_mode: AudioMode::Headless,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), SpotterError> {
        if self.capture_sample_rate == 0 || self.playback_sample_rate == 0 {
            return Err(SpotterError::InvalidConfig(
                "sample rates must be non-zero".into(),
            ));
        }
        if self.frame_samples == 0 {
            return Err(SpotterError::InvalidConfig(
                "frame size must be at least one sample".into(),
            ));
        }
        Ok(())
    }
}

/// Connection settings for the remote conversational endpoint.
#[derive(Clone)]
pub struct LiveConfig {
    pub api_key: String,
    pub model: String,
    pub voice: String,
    pub endpoint: String,
}

impl std::fmt::Debug for LiveConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveConfig")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("voice", &self.voice)
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

impl LiveConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_LIVE_MODEL.to_string(),
            voice: DEFAULT_VOICE.to_string(),
            endpoint: DEFAULT_LIVE_ENDPOINT.to_string(),
        }
    }

    pub fn from_env() -> Result<Self, SpotterError> {
        let api_key = env::var("GEMINI_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| SpotterError::InvalidConfig("GEMINI_API_KEY is not set".into()))?;

        let mut config = Self::new(api_key);
        if let Ok(model) = env::var("SPOTTER_LIVE_MODEL") {
            config.model = model;
        }
        if let Ok(voice) = env::var("SPOTTER_VOICE") {
            config.voice = voice;
        }
        if let Ok(endpoint) = env::var("SPOTTER_LIVE_ENDPOINT") {
            config.endpoint = endpoint;
        }
        Ok(config)
    }

    pub fn url(&self) -> String {
        format!("{}?key={}", self.endpoint, self.api_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_wire_rates() {
        let config = SessionConfig::default();
        assert_eq!(config.capture_sample_rate, 16_000);
        assert_eq!(config.playback_sample_rate, 24_000);
        assert_eq!(config.frame_samples, 4096);
        assert_eq!(config.transcript_clear_delay, Duration::from_secs(3));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_frame_size_is_rejected() {
        let config = SessionConfig {
            frame_samples: 0,
            ..SessionConfig::headless()
        };
        assert!(matches!(
            config.validate(),
            Err(SpotterError::InvalidConfig(_))
        ));
    }

    #[test]
    fn debug_output_hides_key() {
        let config = LiveConfig::new("secret-key");
        let printed = format!("{:?}", config);
        assert!(!printed.contains("secret-key"));
        assert!(config.url().ends_with("?key=secret-key"));
    }
}
