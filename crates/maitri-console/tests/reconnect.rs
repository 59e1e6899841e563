use async_trait::async_trait;
use maitri_console::link::{Channel, LinkConfig, LinkError, LinkHandle, Transport};
use maitri_console::store::{Store, WeakStore};
use maitri_core::ConnectionState;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

const RECONNECT_DELAY: Duration = Duration::from_millis(3000);
const PING_INTERVAL: Duration = Duration::from_secs(30);
const CLOSE_HANDSHAKE: Duration = Duration::from_secs(2);

fn link_config() -> LinkConfig {
    LinkConfig {
        reconnect_delay: RECONNECT_DELAY,
        ping_interval: None,
    }
}

/// Accepts every open and hands back a channel that closes at once.
struct DroppingTransport {
    opens: mpsc::UnboundedSender<Instant>,
}

struct ClosedChannel;

#[async_trait]
impl Channel for ClosedChannel {
    async fn recv(&mut self) -> Option<Result<String, LinkError>> {
        None
    }

    async fn send(&mut self, _text: String) -> Result<(), LinkError> {
        Err(LinkError::Send("closed".to_string()))
    }

    async fn close(&mut self) {}
}

#[async_trait]
impl Transport for DroppingTransport {
    async fn open(&self) -> Result<Box<dyn Channel>, LinkError> {
        let _ = self.opens.send(Instant::now());
        Ok(Box::new(ClosedChannel))
    }
}

/// Refuses every open, recording when it was asked and the state the
/// store showed at that moment.
struct RefusingTransport {
    opens: mpsc::UnboundedSender<(Instant, ConnectionState)>,
    store: WeakStore,
}

#[async_trait]
impl Transport for RefusingTransport {
    async fn open(&self) -> Result<Box<dyn Channel>, LinkError> {
        let state = self
            .store
            .upgrade()
            .map(|store| store.connection())
            .unwrap_or_default();
        let _ = self.opens.send((Instant::now(), state));
        Err(LinkError::Connect("connection refused".to_string()))
    }
}

/// Replays scripted frames, then stays open until closed.
struct ScriptedTransport {
    frames: Vec<String>,
    sent: mpsc::UnboundedSender<String>,
}

struct ScriptedChannel {
    frames: VecDeque<String>,
    sent: mpsc::UnboundedSender<String>,
}

#[async_trait]
impl Channel for ScriptedChannel {
    async fn recv(&mut self) -> Option<Result<String, LinkError>> {
        match self.frames.pop_front() {
            Some(frame) => Some(Ok(frame)),
            None => std::future::pending().await,
        }
    }

    async fn send(&mut self, text: String) -> Result<(), LinkError> {
        self.sent
            .send(text)
            .map_err(|err| LinkError::Send(err.to_string()))
    }

    async fn close(&mut self) {}
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn open(&self) -> Result<Box<dyn Channel>, LinkError> {
        Ok(Box::new(ScriptedChannel {
            frames: self.frames.iter().cloned().collect(),
            sent: self.sent.clone(),
        }))
    }
}

/// Hands out channels whose peer is already gone but whose close
/// handshake takes a while to finish.
struct SlowClosingTransport {
    opens: mpsc::UnboundedSender<Instant>,
}

struct SlowClosingChannel;

#[async_trait]
impl Channel for SlowClosingChannel {
    async fn recv(&mut self) -> Option<Result<String, LinkError>> {
        None
    }

    async fn send(&mut self, _text: String) -> Result<(), LinkError> {
        Err(LinkError::Send("closing".to_string()))
    }

    async fn close(&mut self) {
        tokio::time::sleep(CLOSE_HANDSHAKE).await;
    }
}

#[async_trait]
impl Transport for SlowClosingTransport {
    async fn open(&self) -> Result<Box<dyn Channel>, LinkError> {
        let _ = self.opens.send(Instant::now());
        Ok(Box::new(SlowClosingChannel))
    }
}

/// Stays open and silent; every write fails, the keepalive included.
struct DeafTransport {
    opens: mpsc::UnboundedSender<Instant>,
}

struct DeafChannel;

#[async_trait]
impl Channel for DeafChannel {
    async fn recv(&mut self) -> Option<Result<String, LinkError>> {
        std::future::pending().await
    }

    async fn send(&mut self, _text: String) -> Result<(), LinkError> {
        Err(LinkError::Send("broken pipe".to_string()))
    }

    async fn close(&mut self) {}
}

#[async_trait]
impl Transport for DeafTransport {
    async fn open(&self) -> Result<Box<dyn Channel>, LinkError> {
        let _ = self.opens.send(Instant::now());
        Ok(Box::new(DeafChannel))
    }
}

async fn wait_for(store: &Store, done: impl Fn(&Store) -> bool) {
    let mut revision = store.subscribe_revision();
    tokio::time::timeout(Duration::from_secs(60), async {
        while !done(store) {
            if revision.changed().await.is_err() {
                break;
            }
        }
    })
    .await
    .expect("store reached the expected state");
}

#[tokio::test(start_paused = true)]
async fn closed_channel_is_retried_after_the_fixed_delay() {
    let store = Store::new();
    let (opens_tx, mut opens) = mpsc::unbounded_channel();
    let link = LinkHandle::spawn(DroppingTransport { opens: opens_tx }, &store, link_config());

    let mut attempts = Vec::new();
    for _ in 0..4 {
        attempts.push(opens.recv().await.expect("open attempt"));
    }
    for pair in attempts.windows(2) {
        assert!(pair[1] - pair[0] >= RECONNECT_DELAY);
    }

    link.join().await;
    tokio::time::sleep(RECONNECT_DELAY * 10).await;
    assert!(opens.try_recv().is_err(), "no attempt after teardown");
    assert_eq!(store.connection(), ConnectionState::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn refused_opens_walk_through_reconnecting() {
    let store = Store::new();
    let (opens_tx, mut opens) = mpsc::unbounded_channel();
    let transport = RefusingTransport {
        opens: opens_tx,
        store: store.downgrade(),
    };
    let link = LinkHandle::spawn(transport, &store, link_config());

    let (first_at, first_state) = opens.recv().await.expect("first attempt");
    let (second_at, second_state) = opens.recv().await.expect("second attempt");
    let (third_at, third_state) = opens.recv().await.expect("third attempt");
    assert_eq!(first_state, ConnectionState::Connecting);
    assert_eq!(second_state, ConnectionState::Reconnecting);
    assert_eq!(third_state, ConnectionState::Reconnecting);
    assert!(second_at - first_at >= RECONNECT_DELAY);
    assert!(third_at - second_at >= RECONNECT_DELAY);

    link.join().await;
    assert_eq!(store.connection(), ConnectionState::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn teardown_during_the_wait_cancels_the_pending_retry() {
    let store = Store::new();
    let (opens_tx, mut opens) = mpsc::unbounded_channel();
    let transport = RefusingTransport {
        opens: opens_tx,
        store: store.downgrade(),
    };
    let link = LinkHandle::spawn(transport, &store, link_config());

    opens.recv().await.expect("first attempt");
    tokio::time::sleep(RECONNECT_DELAY / 2).await;
    link.shutdown();
    tokio::time::sleep(RECONNECT_DELAY * 4).await;

    assert!(opens.try_recv().is_err());
    assert_eq!(store.connection(), ConnectionState::Disconnected);
    link.join().await;
}

#[tokio::test(start_paused = true)]
async fn inbound_frames_reconcile_into_the_store() {
    let store = Store::new();
    let (sent_tx, _sent) = mpsc::unbounded_channel();
    let frames: Vec<String> = vec![
        r#"{"type":"connected","client_id":"c-7","message":"Connected to MAITRI"}"#,
        "{garbage",
        r#"{"type":"vitals_update","data":{"agent":"vitals_agent","vitals":{"heart_rate":110}}}"#,
        r#"{"type":"weather","data":{}}"#,
        r#"{"type":"agent_status","data":{"agents":{"mood_agent":{"name":"Mood","type":"mood","state":"alert","status_message":"Low mood trend"}}}}"#,
        r#"{"type":"pong"}"#,
        r#"{"type":"chat_response","data":{"response":"Take five slow breaths."}}"#,
    ]
    .into_iter()
    .map(str::to_string)
    .collect();
    let link = LinkHandle::spawn(
        ScriptedTransport {
            frames,
            sent: sent_tx,
        },
        &store,
        link_config(),
    );

    wait_for(&store, |store| store.chat_len() == 1).await;

    assert_eq!(store.connection(), ConnectionState::Connected);
    assert_eq!(store.vitals().heart_rate, Some(110.0));
    assert_eq!(store.vitals().o2_level, Some(maitri_core::DEFAULT_O2_LEVEL));
    assert_eq!(
        store.agents()["mood_agent"].status_label(),
        maitri_core::AgentStatusLabel::Alert
    );
    assert_eq!(store.chat()[0].text, "Take five slow breaths.");

    link.join().await;
    assert_eq!(store.connection(), ConnectionState::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn chat_goes_out_only_while_connected() {
    let store = Store::new();
    let (sent_tx, mut sent) = mpsc::unbounded_channel();
    let link = LinkHandle::spawn(
        ScriptedTransport {
            frames: Vec::new(),
            sent: sent_tx,
        },
        &store,
        link_config(),
    );

    wait_for(&store, |store| store.connection().is_connected()).await;
    link.try_send_chat("status report".to_string())
        .expect("connected link accepts chat");
    let frame = sent.recv().await.expect("frame written");
    assert_eq!(frame, r#"{"type":"chat","text":"status report"}"#);

    let sender = link.sender();
    link.join().await;
    assert!(sender.try_send_chat("after teardown".to_string()).is_err());
}

#[tokio::test(start_paused = true)]
async fn link_reads_disconnected_while_the_close_handshake_runs() {
    let store = Store::new();
    let (opens_tx, mut opens) = mpsc::unbounded_channel();
    let link = LinkHandle::spawn(
        SlowClosingTransport { opens: opens_tx },
        &store,
        link_config(),
    );

    let opened_at = opens.recv().await.expect("first attempt");
    tokio::time::sleep(CLOSE_HANDSHAKE / 4).await;
    assert_eq!(store.connection(), ConnectionState::Disconnected);
    assert!(link.try_send_chat("I feel stressed".to_string()).is_err());

    let reopened_at = opens.recv().await.expect("retry");
    assert!(reopened_at - opened_at >= CLOSE_HANDSHAKE + RECONNECT_DELAY);
    link.join().await;
}

#[tokio::test(start_paused = true)]
async fn keepalive_ping_goes_out_on_the_interval() {
    let store = Store::new();
    let (sent_tx, mut sent) = mpsc::unbounded_channel();
    let link = LinkHandle::spawn(
        ScriptedTransport {
            frames: Vec::new(),
            sent: sent_tx,
        },
        &store,
        LinkConfig {
            reconnect_delay: RECONNECT_DELAY,
            ping_interval: Some(PING_INTERVAL),
        },
    );

    wait_for(&store, |store| store.connection().is_connected()).await;
    let connected_at = Instant::now();

    let first = sent.recv().await.expect("first ping");
    assert_eq!(first, r#"{"type":"ping"}"#);
    assert!(Instant::now() - connected_at >= PING_INTERVAL);

    let second = sent.recv().await.expect("second ping");
    assert_eq!(second, r#"{"type":"ping"}"#);
    assert!(Instant::now() - connected_at >= PING_INTERVAL * 2);
    assert_eq!(store.connection(), ConnectionState::Connected);

    link.join().await;
}

#[tokio::test(start_paused = true)]
async fn failed_ping_drops_the_link_and_schedules_a_retry() {
    let store = Store::new();
    let (opens_tx, mut opens) = mpsc::unbounded_channel();
    let link = LinkHandle::spawn(
        DeafTransport { opens: opens_tx },
        &store,
        LinkConfig {
            reconnect_delay: RECONNECT_DELAY,
            ping_interval: Some(PING_INTERVAL),
        },
    );

    let opened_at = opens.recv().await.expect("first attempt");
    wait_for(&store, |store| store.connection().is_connected()).await;

    tokio::time::sleep_until(opened_at + PING_INTERVAL + Duration::from_secs(1)).await;
    assert_eq!(store.connection(), ConnectionState::Disconnected);
    assert!(opens.try_recv().is_err(), "retry waits out the fixed delay");

    let reopened_at = opens.recv().await.expect("retry");
    assert!(reopened_at - opened_at >= PING_INTERVAL + RECONNECT_DELAY);
    link.join().await;
}
