//! cpal device lookup and stream lifetime.

use std::sync::mpsc;
use std::thread::{self, JoinHandle};

use tokio::sync::oneshot;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use log::{debug, info, warn};

use crate::errors::SpotterError;

/// Display name for a device, falling back to the deprecated `name()`.
pub fn get_device_display_name(device: &cpal::Device) -> String {
    device
        .description()
        .map(|desc| desc.name().to_string())
        .unwrap_or_else(|_| {
            #[allow(deprecated)]
            device.name().unwrap_or_else(|_| "Unknown".to_string())
        })
}

pub fn default_input_device() -> Result<cpal::Device, SpotterError> {
    let host = cpal::default_host();
    debug!("cpal host: {}", host.id().name());
    let device = host
        .default_input_device()
        .ok_or_else(|| SpotterError::device("no default input device available"))?;
    info!("Using input device: {}", get_device_display_name(&device));
    Ok(device)
}

pub fn default_output_device() -> Result<cpal::Device, SpotterError> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| SpotterError::device("no default output device available"))?;
    info!("Using output device: {}", get_device_display_name(&device));
    Ok(device)
}

/// Owns a cpal stream on a dedicated thread.
///
/// Streams are not `Send` on every platform, so the stream is built, played
/// and dropped on the same thread. Startup is awaited without holding up the
/// async runtime. `stop` is idempotent.
pub struct StreamThread {
    name: String,
    stop_tx: Option<mpsc::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl StreamThread {
    pub async fn spawn<F>(name: &str, build: F) -> Result<Self, SpotterError>
    where
        F: FnOnce() -> Result<cpal::Stream, SpotterError> + Send + 'static,
    {
        let (ready_tx, ready_rx) = oneshot::channel::<Result<(), SpotterError>>();
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        let thread_name = name.to_string();
        let handle = thread::Builder::new()
            .name(format!("spotter-{}", name))
            .spawn(move || {
                let stream = match build() {
                    Ok(stream) => stream,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                if let Err(e) = stream.play() {
                    let _ = ready_tx.send(Err(SpotterError::device(e)));
                    return;
                }
                let _ = ready_tx.send(Ok(()));
                // Blocks until stop() sends or the sender is dropped.
                let _ = stop_rx.recv();
                drop(stream);
                debug!("{} stream released", thread_name);
            })
            .map_err(SpotterError::device)?;

        match ready_rx.await {
            Ok(Ok(())) => Ok(Self {
                name: name.to_string(),
                stop_tx: Some(stop_tx),
                handle: Some(handle),
            }),
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(e)
            }
            Err(_) => {
                let _ = handle.join();
                Err(SpotterError::device(format!(
                    "{} stream thread exited during start",
                    name
                )))
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    pub fn stop(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("{} stream thread panicked", self.name);
            }
        }
    }
}

impl Drop for StreamThread {
    fn drop(&mut self) {
        self.stop();
    }
}
