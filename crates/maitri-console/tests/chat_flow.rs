use async_trait::async_trait;
use maitri_console::backend::{Backend, BackendError, CONNECTION_ERROR_REPLY};
use maitri_console::conversation::{Conversation, Relay};
use maitri_console::link::{Channel, LinkConfig, LinkError, LinkHandle, Transport};
use maitri_console::store::{Store, Update};
use maitri_core::wire::ChatReply;
use maitri_core::{Role, VitalsPatch};
use maitri_dialogue::Intent;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

struct OfflineTransport;

#[async_trait]
impl Transport for OfflineTransport {
    async fn open(&self) -> Result<Box<dyn Channel>, LinkError> {
        Err(LinkError::Connect("backend unreachable".to_string()))
    }
}

struct CannedBackend {
    reply: Result<ChatReply, BackendError>,
    chats: AtomicUsize,
}

impl CannedBackend {
    fn new(reply: Result<ChatReply, BackendError>) -> Arc<Self> {
        Arc::new(Self {
            reply,
            chats: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl Backend for CannedBackend {
    async fn chat(&self, _text: &str) -> Result<ChatReply, BackendError> {
        self.chats.fetch_add(1, Ordering::SeqCst);
        self.reply.clone()
    }

    async fn vitals(&self) -> Result<VitalsPatch, BackendError> {
        Err(BackendError::MissingVitals)
    }
}

fn offline_link(store: &Store) -> LinkHandle {
    LinkHandle::spawn(
        OfflineTransport,
        store,
        LinkConfig {
            reconnect_delay: Duration::from_secs(3),
            ping_interval: None,
        },
    )
}

#[tokio::test(start_paused = true)]
async fn anxious_operator_gets_one_grounding_reply() {
    let store = Store::new();
    let conversation = Conversation::new(store.clone());

    let submission = conversation
        .submit("I'm feeling anxious and can't sleep")
        .expect("submitted");
    assert!(submission.relay.is_none());

    let chat = store.chat();
    assert_eq!(chat.len(), 1);
    assert_eq!(chat[0].role, Role::User);
    assert!(store.composing());

    submission.reply.await.expect("reply task");

    let chat = store.chat();
    assert_eq!(chat.len(), 2);
    assert_eq!(chat[0].text, "I'm feeling anxious and can't sleep");
    assert_eq!(chat[1].role, Role::Assistant);
    assert!(chat[1].text.contains("grounding technique"));
    assert!(chat[1].timestamp >= chat[0].timestamp);
    assert!(!store.composing());
    assert_eq!(
        store.suggestions(),
        maitri_dialogue::synthesize(Intent::Anxious, &store.vitals()).suggestions
    );
}

#[tokio::test(start_paused = true)]
async fn reply_reads_vitals_at_the_moment_it_fires() {
    let store = Store::new();
    let conversation = Conversation::new(store.clone()).with_reply_delay(1000..=1000);
    let submission = conversation.submit("show my vitals").expect("submitted");

    tokio::time::sleep(Duration::from_millis(400)).await;
    store.apply(Update::Vitals(VitalsPatch {
        heart_rate: Some(130.0),
        ..VitalsPatch::default()
    }));
    submission.reply.await.expect("reply task");

    let reply = &store.chat()[1].text;
    assert!(reply.contains("**130 bpm** (elevated)"), "{reply}");
}

#[tokio::test(start_paused = true)]
async fn late_reply_after_teardown_is_dropped() {
    let store = Store::new();
    let weak = store.downgrade();
    let conversation = Conversation::new(store);
    let submission = conversation.submit("hello").expect("submitted");

    drop(conversation);
    assert!(weak.upgrade().is_none());

    submission.reply.await.expect("reply task finishes quietly");
    assert!(weak.upgrade().is_none());
}

#[tokio::test(start_paused = true)]
async fn disconnected_relay_falls_back_to_the_http_reply() {
    let store = Store::new();
    let link = offline_link(&store);
    let backend = CannedBackend::new(Ok(serde_json::from_value::<ChatReply>(
        json!({"response": "Counselor here. Let's slow down together."}),
    )
    .expect("reply")));
    let conversation = Conversation::new(store.clone())
        .with_relay(Relay::new(link.sender(), backend.clone()));

    let submission = conversation.submit("I feel stressed").expect("submitted");
    submission
        .relay
        .expect("fallback used while disconnected")
        .await
        .expect("relay task");
    submission.reply.await.expect("reply task");

    assert_eq!(backend.chats.load(Ordering::SeqCst), 1);
    let texts: Vec<String> = store
        .chat()
        .into_iter()
        .filter(|message| message.role == Role::Assistant)
        .map(|message| message.text)
        .collect();
    assert_eq!(texts.len(), 2);
    assert!(texts.contains(&"Counselor here. Let's slow down together.".to_string()));
    link.join().await;
}

#[tokio::test(start_paused = true)]
async fn unreachable_backend_yields_the_connection_error_text() {
    let store = Store::new();
    let link = offline_link(&store);
    let backend = CannedBackend::new(Err(BackendError::Request("refused".to_string())));
    let conversation =
        Conversation::new(store.clone()).with_relay(Relay::new(link.sender(), backend));

    let submission = conversation.emergency().expect("submitted");
    submission
        .relay
        .expect("fallback used")
        .await
        .expect("relay task");

    let chat = store.chat();
    assert_eq!(chat[1].text, CONNECTION_ERROR_REPLY);
    link.join().await;
}
