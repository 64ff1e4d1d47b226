use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use super::protocol::{ClientMessage, ServerEvent, ServerMessage, SessionSetup};
use crate::config::LiveConfig;
use crate::errors::SpotterError;

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(15);

/// Handle to an open remote conversation.
///
/// Cloneable so the capture callback can send audio directly. Sends are
/// queued in submission order and never block; after `close` they are
/// refused.
#[derive(Clone)]
pub struct RemoteSession {
    outbound: mpsc::UnboundedSender<ClientMessage>,
    closed: Arc<AtomicBool>,
    shutdown: CancellationToken,
}

impl RemoteSession {
    fn new(outbound: mpsc::UnboundedSender<ClientMessage>) -> Self {
        Self {
            outbound,
            closed: Arc::new(AtomicBool::new(false)),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn send(&self, message: ClientMessage) -> bool {
        if self.is_closed() {
            return false;
        }
        self.outbound.send(message).is_ok()
    }

    /// Returns true only for the call that actually closed the session.
    pub fn close(&self) -> bool {
        if self.closed.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.shutdown.cancel();
        info!("RemoteSession::close closing remote session");
        true
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

struct MockLink {
    inbound_rx: mpsc::UnboundedReceiver<ServerEvent>,
    outbound_tx: mpsc::UnboundedSender<ClientMessage>,
}

enum LiveBackend {
    Gemini(LiveConfig),
    Mock {
        link: Mutex<Option<MockLink>>,
        setup: Arc<Mutex<Option<SessionSetup>>>,
    },
}

pub struct LiveClient {
    backend: LiveBackend,
}

/// Test side of a mock endpoint: inject server events, observe what the
/// session sent.
pub struct MockRemote {
    inbound_tx: mpsc::UnboundedSender<ServerEvent>,
    outbound_rx: mpsc::UnboundedReceiver<ClientMessage>,
    setup: Arc<Mutex<Option<SessionSetup>>>,
}

impl MockRemote {
    pub fn push(&self, event: ServerEvent) {
        let _ = self.inbound_tx.send(event);
    }

    /// Push a raw server JSON message through the real decoder.
    pub fn push_json(&self, raw: &str) -> Result<()> {
        let message: ServerMessage = serde_json::from_str(raw)?;
        for event in message.into_events() {
            self.push(event);
        }
        Ok(())
    }

    /// Remote-initiated close.
    pub fn hang_up(&self) {
        self.push(ServerEvent::Closed);
    }

    pub async fn next_sent(&mut self) -> Option<ClientMessage> {
        self.outbound_rx.recv().await
    }

    pub fn try_next_sent(&mut self) -> Option<ClientMessage> {
        self.outbound_rx.try_recv().ok()
    }

    pub fn setup(&self) -> Option<SessionSetup> {
        self.setup.lock().clone()
    }
}

impl LiveClient {
    pub fn new_gemini(config: LiveConfig) -> Self {
        info!(
            "LiveClient::new_gemini selected model={} voice={}",
            config.model, config.voice
        );
        Self {
            backend: LiveBackend::Gemini(config),
        }
    }

    pub fn new_mock() -> (Self, MockRemote) {
        debug!("LiveClient::new_mock creating mock backend");
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let setup = Arc::new(Mutex::new(None));
        let client = Self {
            backend: LiveBackend::Mock {
                link: Mutex::new(Some(MockLink {
                    inbound_rx,
                    outbound_tx,
                })),
                setup: setup.clone(),
            },
        };
        let remote = MockRemote {
            inbound_tx,
            outbound_rx,
            setup,
        };
        (client, remote)
    }

    pub fn backend_name(&self) -> String {
        match &self.backend {
            LiveBackend::Gemini(config) => format!("gemini({})", config.model),
            LiveBackend::Mock { .. } => "mock".to_string(),
        }
    }

    /// Setup message for this backend's model and voice.
    pub fn setup(&self, system_instruction: String, function_declarations: Vec<Value>) -> SessionSetup {
        let (model, voice) = match &self.backend {
            LiveBackend::Gemini(config) => (config.model.clone(), config.voice.clone()),
            LiveBackend::Mock { .. } => ("mock".to_string(), "mock".to_string()),
        };
        SessionSetup {
            model,
            voice,
            system_instruction,
            function_declarations,
        }
    }

    /// Open a conversation and wait for the endpoint to acknowledge setup.
    pub async fn connect(
        &self,
        setup: SessionSetup,
    ) -> Result<(RemoteSession, mpsc::UnboundedReceiver<ServerEvent>), SpotterError> {
        debug!("LiveClient::connect backend={}", self.backend_name());
        let result = match &self.backend {
            LiveBackend::Gemini(config) => connect_gemini(config, setup).await,
            LiveBackend::Mock { link, setup: slot } => {
                *slot.lock() = Some(setup);
                connect_mock(link.lock().take())
            }
        };
        result.map_err(|e| {
            error!("LiveClient::connect failed: {:#}", e);
            SpotterError::from(e)
        })
    }
}

fn connect_mock(
    link: Option<MockLink>,
) -> Result<(RemoteSession, mpsc::UnboundedReceiver<ServerEvent>)> {
    let MockLink {
        mut inbound_rx,
        outbound_tx,
    } = link.ok_or_else(|| anyhow!("mock endpoint already connected"))?;

    let (queue_tx, mut queue_rx) = mpsc::unbounded_channel::<ClientMessage>();
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let session = RemoteSession::new(queue_tx);

    let shutdown = session.shutdown.clone();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                Some(message) = queue_rx.recv() => {
                    if outbound_tx.send(message).is_err() {
                        break;
                    }
                }
                _ = shutdown.cancelled() => break,
            }
        }
        debug!("mock writer stopped");
    });

    let shutdown = session.shutdown.clone();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                event = inbound_rx.recv() => {
                    let Some(event) = event else { break };
                    let closed = event == ServerEvent::Closed;
                    if events_tx.send(event).is_err() || closed {
                        break;
                    }
                }
            }
        }
        debug!("mock reader stopped");
    });

    Ok((session, events_rx))
}

fn parse_frame(message: Message) -> Result<Option<ServerMessage>> {
    let parsed = match message {
        Message::Text(text) => serde_json::from_str(&text)?,
        Message::Binary(bytes) => serde_json::from_slice(&bytes)?,
        Message::Close(frame) => {
            debug!("remote close frame: {:?}", frame);
            return Ok(None);
        }
        _ => ServerMessage::default(),
    };
    Ok(Some(parsed))
}

async fn connect_gemini(
    config: &LiveConfig,
    setup: SessionSetup,
) -> Result<(RemoteSession, mpsc::UnboundedReceiver<ServerEvent>)> {
    let (ws, _) = connect_async(config.url())
        .await
        .with_context(|| format!("connecting to {}", config.endpoint))?;
    let (mut writer, mut reader) = ws.split();

    writer
        .send(Message::Text(setup.to_json().to_string()))
        .await
        .context("sending setup")?;

    let handshake = async {
        while let Some(frame) = reader.next().await {
            match parse_frame(frame?)? {
                Some(message) if message.is_setup_complete() => return Ok(()),
                Some(_) => continue,
                None => bail!("endpoint closed during setup"),
            }
        }
        Err::<(), anyhow::Error>(anyhow!("endpoint hung up during setup"))
    };
    tokio::time::timeout(HANDSHAKE_TIMEOUT, handshake)
        .await
        .map_err(|_| anyhow!("setup was not acknowledged within {:?}", HANDSHAKE_TIMEOUT))??;
    info!("connect_gemini setup complete model={}", setup.model);

    let (queue_tx, mut queue_rx) = mpsc::unbounded_channel::<ClientMessage>();
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let session = RemoteSession::new(queue_tx);

    let shutdown = session.shutdown.clone();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                Some(message) = queue_rx.recv() => {
                    let text = message.to_json().to_string();
                    if let Err(e) = writer.send(Message::Text(text)).await {
                        warn!("gemini writer send failed: {}", e);
                        break;
                    }
                }
                _ = shutdown.cancelled() => {
                    let _ = writer.close().await;
                    break;
                }
            }
        }
        debug!("gemini writer stopped");
    });

    let shutdown = session.shutdown.clone();
    tokio::spawn(async move {
        loop {
            let frame = tokio::select! {
                _ = shutdown.cancelled() => break,
                frame = reader.next() => frame,
            };
            let message = match frame.map(|f| f.map_err(anyhow::Error::from).and_then(parse_frame)) {
                Some(Ok(Some(message))) => message,
                Some(Ok(None)) | None => {
                    let _ = events_tx.send(ServerEvent::Closed);
                    break;
                }
                Some(Err(e)) => {
                    warn!("gemini reader error: {:#}", e);
                    let _ = events_tx.send(ServerEvent::Error(format!("{:#}", e)));
                    if e.downcast_ref::<serde_json::Error>().is_some() {
                        continue;
                    }
                    let _ = events_tx.send(ServerEvent::Closed);
                    break;
                }
            };
            for event in message.into_events() {
                if events_tx.send(event).is_err() {
                    return;
                }
            }
        }
        debug!("gemini reader stopped");
    });

    Ok((session, events_rx))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> SessionSetup {
        SessionSetup {
            model: "models/mock".into(),
            voice: "Puck".into(),
            system_instruction: "coach".into(),
            function_declarations: vec![],
        }
    }

    #[tokio::test]
    async fn mock_preserves_send_order() {
        let (client, mut remote) = LiveClient::new_mock();
        let (session, _events) = client.connect(setup()).await.unwrap();
        assert_eq!(remote.setup().map(|s| s.model), Some("models/mock".into()));

        for i in 0..5 {
            assert!(session.send(ClientMessage::RealtimeText(format!("m{i}"))));
        }
        for i in 0..5 {
            assert_eq!(
                remote.next_sent().await,
                Some(ClientMessage::RealtimeText(format!("m{i}")))
            );
        }
    }

    #[tokio::test]
    async fn close_is_idempotent_and_refuses_sends() {
        let (client, _remote) = LiveClient::new_mock();
        let (session, _events) = client.connect(setup()).await.unwrap();
        let clone = session.clone();
        assert!(session.close());
        assert!(!clone.close());
        assert!(clone.is_closed());
        assert!(!clone.send(ClientMessage::RealtimeText("late".into())));
    }

    #[tokio::test]
    async fn mock_forwards_events_until_hang_up() {
        let (client, remote) = LiveClient::new_mock();
        let (_session, mut events) = client.connect(setup()).await.unwrap();
        remote
            .push_json(r#"{"serverContent": {"outputTranscription": {"text": "Go!"}}}"#)
            .unwrap();
        remote.hang_up();
        assert_eq!(events.recv().await, Some(ServerEvent::Transcription("Go!".into())));
        assert_eq!(events.recv().await, Some(ServerEvent::Closed));
        assert_eq!(events.recv().await, None);
    }

    #[tokio::test]
    async fn mock_connects_once() {
        let (client, _remote) = LiveClient::new_mock();
        let _first = client.connect(setup()).await.unwrap();
        let second = client.connect(setup()).await;
        assert!(matches!(second, Err(SpotterError::RemoteSession(_))));
    }
}
