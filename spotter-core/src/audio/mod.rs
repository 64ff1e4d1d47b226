pub mod capture;
pub mod codec;
pub mod device;
pub mod playback;
pub mod resample;

pub use capture::{CaptureFeed, CapturePipeline, FrameChunker, FrameSink};
pub use codec::{AudioBuffer, decode, decode_audio_data, encode};
pub use playback::{PlaybackPipeline, PlaybackRenderer, SegmentId};
