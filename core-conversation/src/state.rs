//! Conversation states and the table that holds them per session.

use crate::{Result, StateError};
use bridge_traits::ChatId;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ConversationState {
    #[default]
    Idle,
    WaitingForChannelForward,
}

impl ConversationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConversationState::Idle => "Idle",
            ConversationState::WaitingForChannelForward => "WaitingForChannelForward",
        }
    }
}

impl fmt::Display for ConversationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConversationState {
    type Err = StateError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Idle" => Ok(ConversationState::Idle),
            "WaitingForChannelForward" => Ok(ConversationState::WaitingForChannelForward),
            other => Err(StateError::Unrecognized(other.to_string())),
        }
    }
}

/// Storage for per-session state.
///
/// Sessions are created lazily: an unknown session reads as `Idle`. A table
/// that holds a value it cannot decode reports
/// [`StateError::Unrecognized`], and the machine resets the session.
pub trait SessionTable: Send + Sync {
    fn get(&self, session: &ChatId) -> Result<ConversationState>;

    fn set(&self, session: &ChatId, state: ConversationState) -> Result<()>;
}

/// Process-local session table.
#[derive(Debug, Default)]
pub struct InMemorySessionTable {
    states: RwLock<HashMap<ChatId, ConversationState>>,
}

impl InMemorySessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.states.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.read().is_empty()
    }
}

impl SessionTable for InMemorySessionTable {
    fn get(&self, session: &ChatId) -> Result<ConversationState> {
        Ok(self
            .states
            .read()
            .get(session)
            .copied()
            .unwrap_or_default())
    }

    fn set(&self, session: &ChatId, state: ConversationState) -> Result<()> {
        self.states.write().insert(session.clone(), state);
        Ok(())
    }
}
