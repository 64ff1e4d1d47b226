//! Gapless speaker playback with barge-in flush.
//!
//! Segments are laid out on a sample-accurate timeline. The device callback
//! renders the timeline and reports each segment that played out; the owner
//! keeps the set of segments still pending and learns from it when the agent
//! has finished speaking.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use cpal::traits::DeviceTrait;
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use tokio::sync::mpsc;

use super::codec::AudioBuffer;
use super::device::{self, StreamThread};
use crate::errors::SpotterError;

pub type SegmentId = u64;

#[derive(Debug)]
struct Segment {
    id: SegmentId,
    start: u64,
    frames: u64,
    samples: Vec<f32>,
}

impl Segment {
    fn end(&self) -> u64 {
        self.start + self.frames
    }
}

/// Playback schedule measured in device frames.
#[derive(Debug)]
pub struct Timeline {
    sample_rate: u32,
    channels: u16,
    clock: u64,
    next_start: u64,
    queue: VecDeque<Segment>,
    next_id: SegmentId,
    resample_carry: f64,
}

impl Timeline {
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels: channels.max(1),
            clock: 0,
            next_start: 0,
            queue: VecDeque::new(),
            next_id: 1,
            resample_carry: 0.0,
        }
    }

    /// Only valid before anything is scheduled.
    pub fn set_format(&mut self, sample_rate: u32, channels: u16) {
        self.sample_rate = sample_rate;
        self.channels = channels.max(1);
    }

    pub fn clock(&self) -> u64 {
        self.clock
    }

    pub fn next_start(&self) -> u64 {
        self.next_start
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Queue a buffer directly after whatever is already scheduled, or at the
    /// current clock if the schedule has run dry.
    pub fn schedule(&mut self, buffer: &AudioBuffer) -> SegmentId {
        let converted =
            buffer.convert_continuing(self.sample_rate, self.channels, &mut self.resample_carry);
        let frames = converted.frames() as u64;
        let start = self.next_start.max(self.clock);
        let id = self.next_id;
        self.next_id += 1;
        self.next_start = start + frames;
        self.queue.push_back(Segment {
            id,
            start,
            frames,
            samples: converted.samples,
        });
        id
    }

    /// Drop every queued segment and start the schedule fresh from the
    /// current clock. Returns the discarded ids.
    pub fn flush(&mut self) -> Vec<SegmentId> {
        self.next_start = self.clock;
        self.resample_carry = 0.0;
        self.queue.drain(..).map(|s| s.id).collect()
    }

    /// Fill `out` with interleaved samples and advance the clock. Returns the
    /// ids of segments that finished within this block.
    pub fn render(&mut self, out: &mut [f32]) -> Vec<SegmentId> {
        let ch = self.channels as usize;
        let frames = out.len() / ch;
        let mut finished = Vec::new();

        for (f, dst) in out.chunks_exact_mut(ch).enumerate() {
            let t = self.clock + f as u64;
            while let Some(seg) = self.queue.front() {
                if t < seg.end() {
                    break;
                }
                finished.push(seg.id);
                self.queue.pop_front();
            }
            match self.queue.front() {
                Some(seg) if t >= seg.start => {
                    let offset = (t - seg.start) as usize * ch;
                    dst.copy_from_slice(&seg.samples[offset..offset + ch]);
                }
                _ => dst.fill(0.0),
            }
        }
        // Trailing samples that do not form a whole frame stay silent.
        out[frames * ch..].fill(0.0);

        self.clock += frames as u64;
        while let Some(seg) = self.queue.front() {
            if seg.end() > self.clock {
                break;
            }
            finished.push(seg.id);
            self.queue.pop_front();
        }
        finished
    }
}

/// Render side of the timeline, held by the output callback (or by tests in
/// headless mode).
#[derive(Clone)]
pub struct PlaybackRenderer {
    timeline: Arc<Mutex<Timeline>>,
    done_tx: mpsc::UnboundedSender<SegmentId>,
}

impl PlaybackRenderer {
    pub fn render(&self, out: &mut [f32]) {
        let finished = self.timeline.lock().render(out);
        for id in finished {
            // Receiver gone means the session already tore down.
            let _ = self.done_tx.send(id);
        }
    }
}

pub struct PlaybackPipeline {
    timeline: Arc<Mutex<Timeline>>,
    active: HashSet<SegmentId>,
    stream: Option<StreamThread>,
    stopped: bool,
}

impl PlaybackPipeline {
    fn with_timeline(
        timeline: Timeline,
    ) -> (Self, PlaybackRenderer, mpsc::UnboundedReceiver<SegmentId>) {
        let timeline = Arc::new(Mutex::new(timeline));
        let (done_tx, done_rx) = mpsc::unbounded_channel();
        let renderer = PlaybackRenderer {
            timeline: timeline.clone(),
            done_tx,
        };
        let pipeline = Self {
            timeline,
            active: HashSet::new(),
            stream: None,
            stopped: false,
        };
        (pipeline, renderer, done_rx)
    }

    /// Open the default speaker. Completed segment ids arrive on the
    /// returned receiver.
    pub async fn start_device(
        fallback_rate: u32,
    ) -> Result<(Self, mpsc::UnboundedReceiver<SegmentId>), SpotterError> {
        let (mut pipeline, renderer, done_rx) =
            Self::with_timeline(Timeline::new(fallback_rate, 1));
        let timeline = pipeline.timeline.clone();

        let stream = StreamThread::spawn("playback", move || {
            let output = device::default_output_device()?;
            let config = output
                .default_output_config()
                .map_err(SpotterError::device)?;
            info!(
                "Playback: {}Hz, {} channels, format={:?}",
                config.sample_rate(),
                config.channels(),
                config.sample_format()
            );
            timeline
                .lock()
                .set_format(config.sample_rate(), config.channels());

            output
                .build_output_stream(
                    &config.into(),
                    move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                        renderer.render(data);
                    },
                    |err| {
                        error!("Playback stream error: {}", err);
                    },
                    None,
                )
                .map_err(SpotterError::device)
        })
        .await?;
        pipeline.stream = Some(stream);
        Ok((pipeline, done_rx))
    }

    /// A pipeline with no device; the caller drives the clock through the
    /// returned renderer.
    pub fn headless(
        sample_rate: u32,
    ) -> (Self, PlaybackRenderer, mpsc::UnboundedReceiver<SegmentId>) {
        Self::with_timeline(Timeline::new(sample_rate, 1))
    }

    /// Schedule a decoded segment. Empty segments are skipped.
    pub fn schedule(&mut self, buffer: &AudioBuffer) -> Option<SegmentId> {
        if self.stopped || buffer.samples.is_empty() {
            return None;
        }
        let id = self.timeline.lock().schedule(buffer);
        self.active.insert(id);
        debug!(
            "Scheduled segment {} ({:.3}s), {} pending",
            id,
            buffer.duration_secs(),
            self.active.len()
        );
        Some(id)
    }

    /// Record a natural completion. Returns true when this was the last
    /// pending segment. Completions for flushed segments are ignored.
    pub fn on_finished(&mut self, id: SegmentId) -> bool {
        if !self.active.remove(&id) {
            return false;
        }
        self.active.is_empty()
    }

    /// Barge-in: discard everything scheduled and reset the schedule clock.
    /// Returns how many segments were dropped.
    pub fn interrupt(&mut self) -> usize {
        let flushed = self.timeline.lock().flush();
        let dropped = self.active.len();
        self.active.clear();
        debug!(
            "Playback interrupted, {} segments dropped ({} still queued)",
            dropped,
            flushed.len()
        );
        dropped
    }

    pub fn is_speaking(&self) -> bool {
        !self.active.is_empty()
    }

    pub fn pending(&self) -> usize {
        self.active.len()
    }

    pub fn next_start(&self) -> u64 {
        self.timeline.lock().next_start()
    }

    pub fn clock(&self) -> u64 {
        self.timeline.lock().clock()
    }

    pub fn is_running(&self) -> bool {
        !self.stopped
    }

    pub fn stop(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        if let Some(mut stream) = self.stream.take() {
            stream.stop();
        }
        self.timeline.lock().flush();
        if !self.active.is_empty() {
            warn!("Playback stopped with {} segments pending", self.active.len());
        }
        self.active.clear();
        debug!("Playback stopped");
    }
}

impl Drop for PlaybackPipeline {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer(samples: usize) -> AudioBuffer {
        AudioBuffer {
            sample_rate: 24_000,
            channels: 1,
            samples: vec![0.5; samples],
        }
    }

    #[test]
    fn segments_are_back_to_back() {
        let mut timeline = Timeline::new(24_000, 1);
        timeline.schedule(&buffer(100));
        timeline.schedule(&buffer(50));
        assert_eq!(timeline.next_start(), 150);

        let mut out = vec![0.0; 120];
        let done = timeline.render(&mut out);
        assert_eq!(done, vec![1]);
        assert!(out.iter().all(|&s| s == 0.5));
        assert_eq!(timeline.pending(), 1);
    }

    #[test]
    fn schedule_after_idle_starts_at_clock() {
        let mut timeline = Timeline::new(24_000, 1);
        let mut out = vec![0.0; 200];
        timeline.render(&mut out);
        timeline.schedule(&buffer(10));
        assert_eq!(timeline.next_start(), 210);

        let mut out = vec![1.0; 20];
        assert_eq!(timeline.render(&mut out), vec![1]);
        assert!(out[..10].iter().all(|&s| s == 0.5));
        assert!(out[10..].iter().all(|&s| s == 0.0));
    }

    #[test]
    fn segments_convert_to_device_format() {
        let mut timeline = Timeline::new(48_000, 2);
        timeline.schedule(&buffer(24));
        assert_eq!(timeline.next_start(), 48);
        let mut out = vec![0.0; 96];
        assert_eq!(timeline.render(&mut out), vec![1]);
        assert!(out.iter().all(|&s| (s - 0.5).abs() < 1e-6));
    }

    #[test]
    fn odd_rate_segments_do_not_drift() {
        let mut timeline = Timeline::new(44_100, 1);
        for _ in 0..240 {
            timeline.schedule(&buffer(100));
        }
        // 24_000 samples at 24kHz is exactly one second.
        assert_eq!(timeline.next_start(), 44_100);
    }

    #[tokio::test]
    async fn finished_speaking_after_last_segment() {
        let (mut playback, renderer, mut done_rx) = PlaybackPipeline::headless(24_000);
        let a = playback.schedule(&buffer(10)).unwrap();
        let b = playback.schedule(&buffer(10)).unwrap();
        assert!(playback.is_speaking());

        renderer.render(&mut [0.0; 10]);
        assert_eq!(done_rx.recv().await, Some(a));
        assert!(!playback.on_finished(a));

        renderer.render(&mut [0.0; 10]);
        assert_eq!(done_rx.recv().await, Some(b));
        assert!(playback.on_finished(b));
        assert!(!playback.is_speaking());
    }

    #[tokio::test]
    async fn interrupt_flushes_any_number_of_segments() {
        for count in [0usize, 1, 5] {
            let (mut playback, renderer, mut done_rx) = PlaybackPipeline::headless(24_000);
            let ids: Vec<_> = (0..count)
                .filter_map(|_| playback.schedule(&buffer(100)))
                .collect();
            renderer.render(&mut [0.0; 30]);

            assert_eq!(playback.interrupt(), count);
            assert_eq!(playback.pending(), 0);
            assert_eq!(playback.next_start(), playback.clock());

            // Nothing plays after the flush, and late reports are ignored.
            let mut out = [1.0; 300];
            renderer.render(&mut out);
            assert!(out.iter().all(|&s| s == 0.0));
            assert!(done_rx.try_recv().is_err());
            for id in ids {
                assert!(!playback.on_finished(id));
            }
            assert_eq!(playback.interrupt(), 0);
        }
    }

    #[test]
    fn empty_segments_and_stopped_pipeline_are_skipped() {
        let (mut playback, _renderer, _rx) = PlaybackPipeline::headless(24_000);
        assert!(playback.schedule(&buffer(0)).is_none());
        playback.schedule(&buffer(10));
        playback.stop();
        playback.stop();
        assert_eq!(playback.pending(), 0);
        assert!(playback.schedule(&buffer(10)).is_none());
    }
}
