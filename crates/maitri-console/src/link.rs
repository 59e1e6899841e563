//! Live link to the backend event stream. One task owns the socket: it
//! connects, reconciles inbound frames into the store, writes queued
//! outbound frames, and after any close waits a fixed delay before the next
//! attempt until the handle shuts it down.

use crate::shutdown_requested;
use crate::store::{Store, Update, WeakStore};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use maitri_core::wire::{decode_inbound, encode_outbound, Outbound, WireError};
use maitri_core::ConnectionState;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};
use url::Url;

pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(3000);
pub const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(30);
const OUTBOUND_QUEUE_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinkError {
    #[error("connect failed: {0}")]
    Connect(String),
    #[error("send failed: {0}")]
    Send(String),
    #[error("receive failed: {0}")]
    Receive(String),
}

#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn open(&self) -> Result<Box<dyn Channel>, LinkError>;
}

#[async_trait]
pub trait Channel: Send {
    /// Next text frame, or `None` once the peer has closed.
    async fn recv(&mut self) -> Option<Result<String, LinkError>>;
    async fn send(&mut self, text: String) -> Result<(), LinkError>;
    async fn close(&mut self);
}

pub struct WsTransport {
    url: Url,
}

impl WsTransport {
    pub fn new(url: Url) -> Self {
        Self { url }
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn open(&self) -> Result<Box<dyn Channel>, LinkError> {
        let (ws, _) = connect_async(self.url.as_str())
            .await
            .map_err(|err| LinkError::Connect(err.to_string()))?;
        Ok(Box::new(WsChannel { ws }))
    }
}

struct WsChannel {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl Channel for WsChannel {
    async fn recv(&mut self) -> Option<Result<String, LinkError>> {
        loop {
            match self.ws.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(text)),
                Ok(Message::Close(_)) => return None,
                Ok(_) => continue,
                Err(err) => return Some(Err(LinkError::Receive(err.to_string()))),
            }
        }
    }

    async fn send(&mut self, text: String) -> Result<(), LinkError> {
        self.ws
            .send(Message::Text(text))
            .await
            .map_err(|err| LinkError::Send(err.to_string()))
    }

    async fn close(&mut self) {
        let _ = self.ws.close(None).await;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkConfig {
    pub reconnect_delay: Duration,
    pub ping_interval: Option<Duration>,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            ping_interval: Some(DEFAULT_PING_INTERVAL),
        }
    }
}

/// Chat text the link refused; the caller decides where it goes instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unsent(pub String);

/// Cloneable write side of a running link.
#[derive(Clone)]
pub struct LinkSender {
    outbound: mpsc::Sender<String>,
    store: WeakStore,
}

impl LinkSender {
    /// Queues a chat frame when the link is connected right now. Frames
    /// queued across a close are discarded, never replayed.
    pub fn try_send_chat(&self, text: String) -> Result<(), Unsent> {
        let connected = self
            .store
            .upgrade()
            .map(|store| store.connection().is_connected())
            .unwrap_or(false);
        if !connected {
            return Err(Unsent(text));
        }
        let frame = match encode_outbound(&Outbound::Chat { text: text.clone() }) {
            Ok(frame) => frame,
            Err(err) => {
                warn!("link_encode_error: {err}");
                return Err(Unsent(text));
            }
        };
        self.outbound.try_send(frame).map_err(|_| Unsent(text))
    }
}

pub struct LinkHandle {
    sender: LinkSender,
    shutdown: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl LinkHandle {
    /// Starts the link task. Requires a running tokio runtime.
    pub fn spawn<T: Transport>(transport: T, store: &Store, config: LinkConfig) -> Self {
        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_QUEUE_CAPACITY);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let weak = store.downgrade();
        let task = tokio::spawn(link_loop(
            transport,
            weak.clone(),
            config,
            outbound_rx,
            shutdown_rx,
        ));
        Self {
            sender: LinkSender {
                outbound: outbound_tx,
                store: weak,
            },
            shutdown: shutdown_tx,
            task: Some(task),
        }
    }

    pub fn sender(&self) -> LinkSender {
        self.sender.clone()
    }

    pub fn try_send_chat(&self, text: String) -> Result<(), Unsent> {
        self.sender.try_send_chat(text)
    }

    /// Cancels the link: an open socket is closed and a pending retry
    /// never fires.
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    pub async fn join(mut self) {
        self.shutdown();
        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                warn!("link_join_error: {err}");
            }
        }
    }
}

impl Drop for LinkHandle {
    fn drop(&mut self) {
        self.shutdown.send_replace(true);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PumpExit {
    Closed,
    Shutdown,
}

async fn link_loop<T: Transport>(
    transport: T,
    store: WeakStore,
    config: LinkConfig,
    mut outbound: mpsc::Receiver<String>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut attempt: u64 = 0;
    loop {
        if *shutdown.borrow() {
            break;
        }
        let state = if attempt == 0 {
            ConnectionState::Connecting
        } else {
            ConnectionState::Reconnecting
        };
        if !write(&store, Update::Connection(state)) {
            break;
        }
        attempt += 1;

        let opened = tokio::select! {
            opened = transport.open() => opened,
            _ = shutdown_requested(&mut shutdown) => break,
        };
        match opened {
            Ok(mut channel) => {
                info!("link_connected: attempt={attempt}");
                let exit = if write(&store, Update::Connection(ConnectionState::Connected)) {
                    pump(channel.as_mut(), &store, &config, &mut outbound, &mut shutdown).await
                } else {
                    PumpExit::Shutdown
                };
                // Senders must see the link as down while the close handshake runs.
                let store_alive = write(&store, Update::Connection(ConnectionState::Disconnected));
                channel.close().await;
                discard_pending(&mut outbound);
                if exit == PumpExit::Shutdown || !store_alive {
                    break;
                }
                info!("link_closed");
            }
            Err(err) => {
                warn!("link_connect_error: {err}");
                if !write(&store, Update::Connection(ConnectionState::Disconnected)) {
                    break;
                }
            }
        }

        debug!(
            "link_retry_scheduled: delay_ms={}",
            config.reconnect_delay.as_millis()
        );
        tokio::select! {
            _ = tokio::time::sleep(config.reconnect_delay) => {}
            _ = shutdown_requested(&mut shutdown) => break,
        }
    }
    write(&store, Update::Connection(ConnectionState::Disconnected));
    info!("link_stopped");
}

async fn pump(
    channel: &mut dyn Channel,
    store: &WeakStore,
    config: &LinkConfig,
    outbound: &mut mpsc::Receiver<String>,
    shutdown: &mut watch::Receiver<bool>,
) -> PumpExit {
    let mut ping = config.ping_interval.map(|every| {
        let mut ticker = tokio::time::interval_at(Instant::now() + every, every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker
    });
    loop {
        tokio::select! {
            _ = shutdown_requested(shutdown) => return PumpExit::Shutdown,
            frame = channel.recv() => match frame {
                Some(Ok(text)) => {
                    if !dispatch(store, &text) {
                        return PumpExit::Shutdown;
                    }
                }
                Some(Err(err)) => {
                    warn!("link_receive_error: {err}");
                    return PumpExit::Closed;
                }
                None => return PumpExit::Closed,
            },
            Some(frame) = outbound.recv() => {
                if let Err(err) = channel.send(frame).await {
                    warn!("link_send_error: {err}");
                    return PumpExit::Closed;
                }
            }
            _ = next_ping(&mut ping) => {
                let Ok(frame) = encode_outbound(&Outbound::Ping) else {
                    continue;
                };
                if let Err(err) = channel.send(frame).await {
                    warn!("link_ping_error: {err}");
                    return PumpExit::Closed;
                }
            }
        }
    }
}

/// Returns false once the store is gone.
fn dispatch(store: &WeakStore, text: &str) -> bool {
    let Some(store) = store.upgrade() else {
        return false;
    };
    match decode_inbound(text) {
        Ok(inbound) => {
            let kind = inbound.kind().to_string();
            match Update::from_inbound(inbound) {
                Some(update) => store.apply(update),
                None => debug!("link_frame_ignored: type={kind}"),
            }
        }
        Err(WireError::UnknownType(kind)) => warn!("link_frame_unknown: type={kind}"),
        Err(err) => warn!("link_frame_dropped: {err}"),
    }
    true
}

fn write(store: &WeakStore, update: Update) -> bool {
    match store.upgrade() {
        Some(store) => {
            store.apply(update);
            true
        }
        None => false,
    }
}

fn discard_pending(outbound: &mut mpsc::Receiver<String>) {
    let mut dropped = 0usize;
    while outbound.try_recv().is_ok() {
        dropped += 1;
    }
    if dropped > 0 {
        warn!("link_outbound_discarded: count={dropped}");
    }
}

async fn next_ping(ping: &mut Option<Interval>) {
    match ping {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sender_refuses_while_disconnected() {
        let store = Store::new();
        let (outbound, mut rx) = mpsc::channel(4);
        let sender = LinkSender {
            outbound,
            store: store.downgrade(),
        };

        assert_eq!(
            sender.try_send_chat("hello".to_string()),
            Err(Unsent("hello".to_string()))
        );
        assert!(rx.try_recv().is_err());

        store.set_connection(ConnectionState::Connected);
        assert_eq!(sender.try_send_chat("hello".to_string()), Ok(()));
        assert_eq!(
            rx.try_recv().expect("queued frame"),
            r#"{"type":"chat","text":"hello"}"#
        );
    }

    #[test]
    fn sender_refuses_once_store_is_gone() {
        let store = Store::new();
        store.set_connection(ConnectionState::Connected);
        let (outbound, _rx) = mpsc::channel(4);
        let sender = LinkSender {
            outbound,
            store: store.downgrade(),
        };
        drop(store);
        assert!(sender.try_send_chat("late".to_string()).is_err());
    }

    #[test]
    fn dispatch_applies_frames_and_skips_garbage() {
        let store = Store::new();
        let weak = store.downgrade();

        assert!(dispatch(&weak, "{not json"));
        assert!(dispatch(&weak, r#"{"type":"weather"}"#));
        assert!(dispatch(
            &weak,
            r#"{"type":"vitals_update","data":{"vitals":{"heart_rate":101}}}"#
        ));
        assert!(dispatch(
            &weak,
            r#"{"type":"chat_response","data":{"response":"Copy that."}}"#
        ));

        assert_eq!(store.vitals().heart_rate, Some(101.0));
        let chat = store.chat();
        assert_eq!(chat.len(), 1);
        assert_eq!(chat[0].text, "Copy that.");

        drop(store);
        assert!(!dispatch(&weak, r#"{"type":"pong"}"#));
    }

    #[test]
    fn queued_frames_are_discarded_not_replayed() {
        let (tx, mut rx) = mpsc::channel(4);
        tx.try_send("a".to_string()).expect("queue");
        tx.try_send("b".to_string()).expect("queue");
        discard_pending(&mut rx);
        assert!(rx.try_recv().is_err());
    }
}
