//! Session state shared by the link, the poller, the chat flow and the
//! renderer. Every slot is a `watch` channel so readers can either sample
//! the current value or wait for the next change.

use maitri_core::wire::Inbound;
use maitri_core::{
    AgentMap, ChatMessage, ConnectionState, Feedback, Role, VitalsPatch, VitalsSnapshot,
};
use std::sync::{Arc, Weak};
use tokio::sync::watch;

#[derive(Debug, Clone, PartialEq)]
pub enum Update {
    Connection(ConnectionState),
    Vitals(VitalsPatch),
    Agents(AgentMap),
    AssistantReply(String),
}

impl Update {
    /// Maps a decoded server frame onto the store write it implies.
    pub fn from_inbound(inbound: Inbound) -> Option<Update> {
        match inbound {
            Inbound::Connected { .. } => Some(Update::Connection(ConnectionState::Connected)),
            Inbound::VitalsUpdate(patch) => Some(Update::Vitals(patch)),
            Inbound::AgentStatus(agents) => Some(Update::Agents(agents)),
            Inbound::ChatResponse(text) => Some(Update::AssistantReply(text)),
            Inbound::Ignored(_) => None,
        }
    }
}

struct Slots {
    connection: watch::Sender<ConnectionState>,
    vitals: watch::Sender<VitalsSnapshot>,
    agents: watch::Sender<AgentMap>,
    chat: watch::Sender<Vec<ChatMessage>>,
    selected_agent: watch::Sender<Option<String>>,
    composing: watch::Sender<bool>,
    suggestions: watch::Sender<Vec<String>>,
    revision: watch::Sender<u64>,
}

#[derive(Clone)]
pub struct Store {
    slots: Arc<Slots>,
}

/// Handle held by deferred work; writes through it are dropped once every
/// strong `Store` is gone.
#[derive(Clone)]
pub struct WeakStore {
    slots: Weak<Slots>,
}

impl WeakStore {
    pub fn upgrade(&self) -> Option<Store> {
        self.slots.upgrade().map(|slots| Store { slots })
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    pub fn new() -> Self {
        Self::with_suggestions(
            maitri_dialogue::DEFAULT_SUGGESTIONS
                .iter()
                .map(|suggestion| suggestion.to_string())
                .collect(),
        )
    }

    pub fn with_suggestions(suggestions: Vec<String>) -> Self {
        Self {
            slots: Arc::new(Slots {
                connection: watch::channel(ConnectionState::Disconnected).0,
                vitals: watch::channel(VitalsSnapshot::initial()).0,
                agents: watch::channel(AgentMap::new()).0,
                chat: watch::channel(Vec::new()).0,
                selected_agent: watch::channel(None).0,
                composing: watch::channel(false).0,
                suggestions: watch::channel(suggestions).0,
                revision: watch::channel(0).0,
            }),
        }
    }

    pub fn downgrade(&self) -> WeakStore {
        WeakStore {
            slots: Arc::downgrade(&self.slots),
        }
    }

    pub fn apply(&self, update: Update) {
        match update {
            Update::Connection(state) => self.set_connection(state),
            Update::Vitals(patch) => self.apply_vitals(&patch),
            Update::Agents(agents) => self.merge_agents(agents),
            Update::AssistantReply(text) => {
                self.push_message(ChatMessage::assistant(text));
            }
        }
    }

    pub fn connection(&self) -> ConnectionState {
        *self.slots.connection.borrow()
    }

    pub fn set_connection(&self, state: ConnectionState) {
        let changed = self.slots.connection.send_if_modified(|current| {
            if *current == state {
                return false;
            }
            *current = state;
            true
        });
        if changed {
            self.bump();
        }
    }

    pub fn vitals(&self) -> VitalsSnapshot {
        *self.slots.vitals.borrow()
    }

    /// Fields absent from `patch` keep their previous value.
    pub fn apply_vitals(&self, patch: &VitalsPatch) {
        if patch.is_empty() {
            return;
        }
        self.slots
            .vitals
            .send_modify(|current| *current = current.apply(patch));
        self.bump();
    }

    pub fn agents(&self) -> AgentMap {
        self.slots.agents.borrow().clone()
    }

    /// Records are replaced per id; ids missing from `agents` are kept.
    pub fn merge_agents(&self, agents: AgentMap) {
        let changed = self.slots.agents.send_if_modified(|current| {
            let mut changed = false;
            for (id, record) in agents {
                if current.get(&id) != Some(&record) {
                    current.insert(id, record);
                    changed = true;
                }
            }
            changed
        });
        if changed {
            self.bump();
        }
    }

    pub fn chat(&self) -> Vec<ChatMessage> {
        self.slots.chat.borrow().clone()
    }

    pub fn chat_len(&self) -> usize {
        self.slots.chat.borrow().len()
    }

    /// Appends to the transcript and returns the new message's index.
    /// Timestamps never run backwards within a transcript.
    pub fn push_message(&self, mut message: ChatMessage) -> usize {
        let mut index = 0;
        self.slots.chat.send_modify(|chat| {
            if let Some(last) = chat.last() {
                if message.timestamp < last.timestamp {
                    message.timestamp = last.timestamp;
                }
            }
            chat.push(message);
            index = chat.len() - 1;
        });
        self.bump();
        index
    }

    /// Rates an assistant message. Returns false for user messages and
    /// out-of-range indices.
    pub fn rate(&self, index: usize, feedback: Feedback) -> bool {
        let changed = self.slots.chat.send_if_modified(|chat| {
            match chat.get_mut(index) {
                Some(message) if message.role == Role::Assistant => {
                    message.feedback = Some(feedback);
                    true
                }
                _ => false,
            }
        });
        if changed {
            self.bump();
        }
        changed
    }

    pub fn last_assistant_index(&self) -> Option<usize> {
        self.slots
            .chat
            .borrow()
            .iter()
            .rposition(|message| message.role == Role::Assistant)
    }

    pub fn selected_agent(&self) -> Option<String> {
        self.slots.selected_agent.borrow().clone()
    }

    pub fn select_agent(&self, agent: Option<String>) {
        self.slots.selected_agent.send_replace(agent);
        self.bump();
    }

    pub fn composing(&self) -> bool {
        *self.slots.composing.borrow()
    }

    pub fn set_composing(&self, composing: bool) {
        let changed = self.slots.composing.send_if_modified(|current| {
            let changed = *current != composing;
            *current = composing;
            changed
        });
        if changed {
            self.bump();
        }
    }

    pub fn suggestions(&self) -> Vec<String> {
        self.slots.suggestions.borrow().clone()
    }

    pub fn set_suggestions(&self, suggestions: Vec<String>) {
        self.slots.suggestions.send_replace(suggestions);
        self.bump();
    }

    pub fn subscribe_connection(&self) -> watch::Receiver<ConnectionState> {
        self.slots.connection.subscribe()
    }

    pub fn subscribe_vitals(&self) -> watch::Receiver<VitalsSnapshot> {
        self.slots.vitals.subscribe()
    }

    pub fn subscribe_agents(&self) -> watch::Receiver<AgentMap> {
        self.slots.agents.subscribe()
    }

    pub fn subscribe_chat(&self) -> watch::Receiver<Vec<ChatMessage>> {
        self.slots.chat.subscribe()
    }

    pub fn subscribe_composing(&self) -> watch::Receiver<bool> {
        self.slots.composing.subscribe()
    }

    pub fn subscribe_suggestions(&self) -> watch::Receiver<Vec<String>> {
        self.slots.suggestions.subscribe()
    }

    /// Ticks once per effective write to any slot.
    pub fn subscribe_revision(&self) -> watch::Receiver<u64> {
        self.slots.revision.subscribe()
    }

    pub fn revision(&self) -> u64 {
        *self.slots.revision.borrow()
    }

    fn bump(&self) {
        self.slots
            .revision
            .send_modify(|revision| *revision = revision.wrapping_add(1));
    }
}
