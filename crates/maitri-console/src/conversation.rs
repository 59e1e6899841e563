//! Operator chat flow: the local assistant answers every submission after a
//! short composing pause, and the text may also be relayed to the backend.

use crate::backend::{fallback_reply_text, Backend};
use crate::link::{LinkSender, Unsent};
use crate::store::{Store, Update};
use maitri_core::ChatMessage;
use rand::Rng;
use std::ops::RangeInclusive;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

pub const EMERGENCY_TEXT: &str = "Emergency: I need immediate assistance";
/// Canned operator prompts offered next to the emergency action.
pub const QUICK_ACTIONS: [&str; 3] = ["I'm feeling stressed", "I need exercise", "How's my health?"];
pub const REPLY_DELAY_MS: RangeInclusive<u64> = 800..=1500;

/// Forwards operator text over the link, or through the fallback chat call
/// when the link is not connected.
pub struct Relay {
    link: LinkSender,
    backend: Arc<dyn Backend>,
}

impl Relay {
    pub fn new(link: LinkSender, backend: Arc<dyn Backend>) -> Self {
        Self { link, backend }
    }

    /// Returns the fallback task when the link refused the text.
    pub fn forward(&self, text: &str, store: &Store) -> Option<JoinHandle<()>> {
        let Err(Unsent(text)) = self.link.try_send_chat(text.to_string()) else {
            debug!("relay_sent: via=link");
            return None;
        };
        debug!("relay_sent: via=fallback");
        let backend = Arc::clone(&self.backend);
        let store = store.downgrade();
        Some(tokio::spawn(async move {
            let reply = fallback_reply_text(backend.chat(&text).await);
            match store.upgrade() {
                Some(store) => store.apply(Update::AssistantReply(reply)),
                None => debug!("relay_reply_dropped"),
            }
        }))
    }
}

/// Background work started by one submission.
pub struct Submission {
    pub reply: JoinHandle<()>,
    pub relay: Option<JoinHandle<()>>,
}

pub struct Conversation {
    store: Store,
    relay: Option<Relay>,
    reply_delay_ms: RangeInclusive<u64>,
    pending: Arc<AtomicUsize>,
}

impl Conversation {
    pub fn new(store: Store) -> Self {
        Self {
            store,
            relay: None,
            reply_delay_ms: REPLY_DELAY_MS,
            pending: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_relay(mut self, relay: Relay) -> Self {
        self.relay = Some(relay);
        self
    }

    pub fn with_reply_delay(mut self, range_ms: RangeInclusive<u64>) -> Self {
        if !range_ms.is_empty() {
            self.reply_delay_ms = range_ms;
        }
        self
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn relay_enabled(&self) -> bool {
        self.relay.is_some()
    }

    /// Appends the operator message and schedules the assistant reply.
    /// Blank input is ignored. Must be called inside a tokio runtime.
    pub fn submit(&self, text: &str) -> Option<Submission> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        self.store.push_message(ChatMessage::user(text));
        self.pending.fetch_add(1, Ordering::SeqCst);
        self.store.set_composing(true);

        let delay = Duration::from_millis(rand::rng().random_range(self.reply_delay_ms.clone()));
        let store = self.store.downgrade();
        let pending = Arc::clone(&self.pending);
        let prompt = text.to_string();
        let reply = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let remaining = pending.fetch_sub(1, Ordering::SeqCst).saturating_sub(1);
            let Some(store) = store.upgrade() else {
                debug!("reply_dropped: store closed");
                return;
            };
            let reply = maitri_dialogue::respond(&prompt, &store.vitals());
            debug!("reply_ready: intent={}", reply.intent);
            store.push_message(ChatMessage::assistant(reply.text));
            if remaining == 0 {
                store.set_composing(false);
            }
            store.set_suggestions(reply.suggestions);
        });

        let relay = self
            .relay
            .as_ref()
            .and_then(|relay| relay.forward(text, &self.store));
        Some(Submission { reply, relay })
    }

    pub fn emergency(&self) -> Option<Submission> {
        self.submit(EMERGENCY_TEXT)
    }

    /// `None` for an index outside `QUICK_ACTIONS`.
    pub fn quick_action(&self, index: usize) -> Option<Submission> {
        QUICK_ACTIONS.get(index).and_then(|text| self.submit(text))
    }
}
