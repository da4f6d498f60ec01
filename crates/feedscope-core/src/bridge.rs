// WebSocket bridge to the host process.
//
// The host connects to `127.0.0.1:{port}`; one connection is served at a
// time. Inbound text frames are parsed as `HostEvent` JSON and forwarded to
// the widget. Outbound `WidgetMessage`s (feed scope changes, menu and link
// requests) are written to the connected host, or dropped while nobody is
// connected.

use futures_util::stream::Stream;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::collab::{ExternalOpener, FeedScope, MenuChannel};
use crate::protocol::{HostEvent, MenuRequest, WidgetMessage};

pub const OUTBOX_CAPACITY: usize = 64;

/// What to do after handling one inbound frame.
#[derive(Debug, PartialEq, Eq)]
pub enum Flow {
    Continue,
    /// The host went away; wait for the next connection.
    Disconnected,
    /// The widget side is gone; stop the bridge.
    Stop,
}

/// Parse one text frame. Malformed payloads are logged and skipped.
pub fn parse_host_event(text: &str) -> Option<HostEvent> {
    match serde_json::from_str::<HostEvent>(text) {
        Ok(event) => Some(event),
        Err(e) => {
            warn!("Ignoring malformed host message: {}", e);
            None
        }
    }
}

/// Handle one item read from the host connection.
pub async fn forward_frame(
    frame: Option<Result<Message, tungstenite::Error>>,
    tx: &mpsc::Sender<HostEvent>,
    addr: &str,
) -> Flow {
    match frame {
        Some(Ok(Message::Text(text))) => {
            let Some(event) = parse_host_event(text.as_str()) else {
                return Flow::Continue;
            };
            debug!("Host event from {addr}: {:?}", event);
            if tx.send(event).await.is_err() {
                return Flow::Stop;
            }
            Flow::Continue
        }
        Some(Ok(Message::Close(_))) => {
            info!("Host {addr} sent close frame");
            Flow::Disconnected
        }
        Some(Err(e)) => {
            warn!("WebSocket error from {addr}: {e}");
            Flow::Disconnected
        }
        None => Flow::Disconnected,
        Some(Ok(_)) => {
            // Binary, Ping, Pong and raw frames carry nothing for us.
            Flow::Continue
        }
    }
}

/// Forward host events from any message stream until it ends, closes, or
/// errors. Returns `Err(())` when `tx` is closed.
pub async fn process_message_stream<St>(
    mut stream: St,
    tx: &mpsc::Sender<HostEvent>,
    addr: &str,
) -> Result<(), ()>
where
    St: Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
{
    loop {
        match forward_frame(stream.next().await, tx, addr).await {
            Flow::Continue => {}
            Flow::Disconnected => return Ok(()),
            Flow::Stop => return Err(()),
        }
    }
}

pub fn encode(message: &WidgetMessage) -> Result<Message, serde_json::Error> {
    Ok(Message::Text(serde_json::to_string(message)?.into()))
}

/// Serve the host bridge until `cancel` fires or the widget side closes.
pub async fn run(
    port: u16,
    events: mpsc::Sender<HostEvent>,
    mut outbound: mpsc::Receiver<WidgetMessage>,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let listener = TcpListener::bind(format!("127.0.0.1:{port}")).await?;
    let local_addr = listener.local_addr()?;
    info!("Host bridge listening on {local_addr}");

    loop {
        let (stream, addr) = tokio::select! {
            _ = cancel.cancelled() => break,
            accepted = listener.accept() => accepted?,
            Some(message) = outbound.recv() => {
                debug!("No host connected, dropping {:?}", message);
                continue;
            }
        };
        let addr = addr.to_string();
        info!("Accepted TCP connection from {addr}");

        let ws_stream = match tokio_tungstenite::accept_async(stream).await {
            Ok(ws) => ws,
            Err(e) => {
                warn!("WebSocket handshake failed for {addr}: {e}");
                continue;
            }
        };
        let (mut write, mut read) = ws_stream.split();

        let flow = loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    let _ = write.send(Message::Close(None)).await;
                    break Flow::Stop;
                }
                frame = read.next() => {
                    match forward_frame(frame, &events, &addr).await {
                        Flow::Continue => {}
                        other => break other,
                    }
                }
                Some(message) = outbound.recv() => {
                    let frame = match encode(&message) {
                        Ok(frame) => frame,
                        Err(e) => {
                            warn!("Failed to encode {:?}: {}", message, e);
                            continue;
                        }
                    };
                    if let Err(e) = write.send(frame).await {
                        warn!("Failed to write to host {addr}: {e}");
                        break Flow::Disconnected;
                    }
                }
            }
        };

        info!("Host {addr} disconnected");
        if flow == Flow::Stop {
            break;
        }
    }

    info!("Host bridge stopped");
    Ok(())
}

/// Widget-side handle that queues outbound messages for the bridge.
///
/// Implements both one-way collaborator traits; sends never block the
/// engine and are dropped when the queue is full.
#[derive(Debug, Clone)]
pub struct BridgeOutbox {
    tx: mpsc::Sender<WidgetMessage>,
}

impl BridgeOutbox {
    pub fn channel() -> (BridgeOutbox, mpsc::Receiver<WidgetMessage>) {
        let (tx, rx) = mpsc::channel(OUTBOX_CAPACITY);
        (BridgeOutbox { tx }, rx)
    }

    fn push(&self, message: WidgetMessage) {
        match self.tx.try_send(message) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(message)) => {
                warn!("Bridge outbox full, dropping {:?}", message);
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!("Bridge stopped, dropping outbound message");
            }
        }
    }
}

impl FeedScope for BridgeOutbox {
    fn notify(&self, scope_id: &str) {
        self.push(WidgetMessage::FeedScope {
            scope: scope_id.to_string(),
        });
    }
}

impl MenuChannel for BridgeOutbox {
    fn request(&self, request: MenuRequest) {
        self.push(WidgetMessage::OpenMenu(request));
    }
}

impl ExternalOpener for BridgeOutbox {
    fn open_external(&self, url: &str) {
        self.push(WidgetMessage::OpenExternal {
            url: url.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;
    use tokio_tungstenite::tungstenite::Error as WsError;

    fn mock_stream(
        messages: Vec<Result<Message, WsError>>,
    ) -> impl Stream<Item = Result<Message, WsError>> + Unpin {
        stream::iter(messages)
    }

    #[tokio::test]
    async fn host_events_forwarded_in_order() {
        let (tx, mut rx) = mpsc::channel(64);
        let messages = vec![
            Ok(Message::Text(r#"{"type":"CONNECTIVITY","online":false}"#.into())),
            Ok(Message::Text(r#"{"type":"CONFIG_CHANGED"}"#.into())),
            Ok(Message::Text(r#"{"type":"WINDOW","visible":true}"#.into())),
        ];

        process_message_stream(mock_stream(messages), &tx, "test")
            .await
            .unwrap();

        assert_eq!(
            rx.recv().await.unwrap(),
            HostEvent::Connectivity { online: false }
        );
        assert_eq!(rx.recv().await.unwrap(), HostEvent::ConfigChanged);
        assert_eq!(rx.recv().await.unwrap(), HostEvent::Window { visible: true });
    }

    #[tokio::test]
    async fn malformed_json_is_skipped() {
        let (tx, mut rx) = mpsc::channel(64);
        let messages = vec![
            Ok(Message::Text("not json".into())),
            Ok(Message::Text(r#"{"type":"NO_SUCH_EVENT"}"#.into())),
            Ok(Message::Text(r#"{"type":"CONFIG_CHANGED"}"#.into())),
        ];

        process_message_stream(mock_stream(messages), &tx, "test")
            .await
            .unwrap();

        assert_eq!(rx.recv().await.unwrap(), HostEvent::ConfigChanged);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn close_frame_stops_processing() {
        let (tx, mut rx) = mpsc::channel(64);
        let messages = vec![
            Ok(Message::Close(None)),
            Ok(Message::Text(r#"{"type":"CONFIG_CHANGED"}"#.into())),
        ];

        process_message_stream(mock_stream(messages), &tx, "test")
            .await
            .unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn error_stops_processing() {
        let (tx, mut rx) = mpsc::channel(64);
        let messages = vec![
            Err(WsError::ConnectionClosed),
            Ok(Message::Text(r#"{"type":"CONFIG_CHANGED"}"#.into())),
        ];

        process_message_stream(mock_stream(messages), &tx, "test")
            .await
            .unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn binary_and_ping_frames_are_ignored() {
        let (tx, mut rx) = mpsc::channel(64);
        let messages = vec![
            Ok(Message::Binary(vec![1, 2, 3].into())),
            Ok(Message::Ping(vec![].into())),
            Ok(Message::Text(r#"{"type":"CONFIG_CHANGED"}"#.into())),
        ];

        process_message_stream(mock_stream(messages), &tx, "test")
            .await
            .unwrap();
        assert_eq!(rx.recv().await.unwrap(), HostEvent::ConfigChanged);
    }

    #[tokio::test]
    async fn closed_widget_channel_stops_bridge() {
        let (tx, rx) = mpsc::channel(64);
        drop(rx);
        let messages = vec![Ok(Message::Text(r#"{"type":"CONFIG_CHANGED"}"#.into()))];

        let result = process_message_stream(mock_stream(messages), &tx, "test").await;
        assert!(result.is_err());
    }

    #[test]
    fn outbox_queues_wire_messages() {
        let (outbox, mut rx) = BridgeOutbox::channel();
        outbox.notify("t_1");
        outbox.request(MenuRequest {
            x: 1,
            y: 2,
            height: 3,
            width: 4,
        });

        assert_eq!(
            rx.try_recv().unwrap(),
            WidgetMessage::FeedScope {
                scope: "t_1".into()
            }
        );
        assert!(matches!(rx.try_recv().unwrap(), WidgetMessage::OpenMenu(_)));
    }

    #[test]
    fn outbox_forwards_external_links() {
        let (outbox, mut rx) = BridgeOutbox::channel();
        outbox.open_external("https://zeit.co/teams/create");
        assert_eq!(
            rx.try_recv().unwrap(),
            WidgetMessage::OpenExternal {
                url: "https://zeit.co/teams/create".into()
            }
        );
    }

    #[test]
    fn encoded_feed_scope_is_tagged_json() {
        let frame = encode(&WidgetMessage::FeedScope {
            scope: "u_1".into(),
        })
        .unwrap();
        assert_eq!(
            frame,
            Message::Text(r#"{"type":"FEED_SCOPE","scope":"u_1"}"#.into())
        );
    }
}
