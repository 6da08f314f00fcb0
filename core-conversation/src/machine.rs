//! # Conversation State Machine
//!
//! Maps `(state, input)` to a reply, a next state and an optional action.
//!
//! | State                      | Input                     | Next state                 |
//! |----------------------------|---------------------------|----------------------------|
//! | `Idle`                     | `RegisterChannel`         | `WaitingForChannelForward` |
//! | `Idle`                     | other command / text      | `Idle`                     |
//! | `Idle`                     | forward                   | `Idle`                     |
//! | `WaitingForChannelForward` | forward from a channel    | `Idle` (channel registered)|
//! | `WaitingForChannelForward` | forward from a user       | unchanged                  |
//! | `WaitingForChannelForward` | text                      | unchanged                  |
//!
//! A state the session table cannot decode resets the session to `Idle`.

use crate::command::Command;
use crate::response::{
    menu_keyboard, BotResponse, SessionAction, Transition, FALLBACK_TEXT, FORWARD_EXPECTED_TEXT,
    FORWARD_PROMPT_TEXT, HELP_TEXT, NOT_A_CHANNEL_TEXT, RESET_TEXT, RESTORE_ACK_TEXT,
    UNEXPECTED_FORWARD_TEXT, UPLOAD_ACK_TEXT, WELCOME_TEXT,
};
use crate::state::{ConversationState, SessionTable};
use crate::StateError;
use bridge_traits::{ChatId, KeyboardHint};
use core_backup::ChannelRegistry;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct ConversationStateMachine {
    sessions: Arc<dyn SessionTable>,
    registry: Arc<ChannelRegistry>,
}

impl ConversationStateMachine {
    pub fn new(sessions: Arc<dyn SessionTable>, registry: Arc<ChannelRegistry>) -> Self {
        Self { sessions, registry }
    }

    /// Current state, `Idle` for new sessions.
    pub fn state_of(&self, session: &ChatId) -> Result<ConversationState, StateError> {
        self.sessions.get(session)
    }

    /// Handle a typed message.
    pub fn handle_text(&self, session: &ChatId, text: &str) -> Transition {
        let state = match self.sessions.get(session) {
            Ok(state) => state,
            Err(e) => return self.reset(session, e),
        };

        let command = Command::parse(text);
        debug!(session = %session, state = %state, command = ?command, "Handling text");

        match state {
            ConversationState::Idle => self.idle_command(session, command),
            ConversationState::WaitingForChannelForward => {
                Transition::reply(BotResponse::text(FORWARD_EXPECTED_TEXT))
            }
        }
    }

    /// Handle a forwarded message. `source_channel` is the channel it was
    /// forwarded from, `None` for forwards from users.
    pub fn handle_forward(&self, session: &ChatId, source_channel: Option<&ChatId>) -> Transition {
        let state = match self.sessions.get(session) {
            Ok(state) => state,
            Err(e) => return self.reset(session, e),
        };

        debug!(session = %session, state = %state, "Handling forward");

        match (state, source_channel) {
            (ConversationState::Idle, _) => {
                Transition::reply(BotResponse::text(UNEXPECTED_FORWARD_TEXT))
            }
            (ConversationState::WaitingForChannelForward, None) => {
                Transition::reply(BotResponse::text(NOT_A_CHANNEL_TEXT))
            }
            (ConversationState::WaitingForChannelForward, Some(channel)) => {
                let newly_added = self.registry.register(channel.clone());
                self.store(session, ConversationState::Idle);
                info!(session = %session, channel = %channel, newly_added, "Storage channel registered");

                Transition::reply(
                    BotResponse::text(format!("Channel registered! ID: `{}`", channel))
                        .with_keyboard(menu_keyboard())
                        .markdown(),
                )
                .with_action(SessionAction::ChannelRegistered {
                    channel: channel.clone(),
                    newly_added,
                })
            }
        }
    }

    fn idle_command(&self, session: &ChatId, command: Option<Command>) -> Transition {
        match command {
            Some(Command::Start) => Transition::reply(
                BotResponse::text(WELCOME_TEXT).with_keyboard(menu_keyboard()),
            ),
            Some(Command::RegisterChannel) => {
                self.store(session, ConversationState::WaitingForChannelForward);
                Transition::reply(
                    BotResponse::text(FORWARD_PROMPT_TEXT).with_keyboard(KeyboardHint::Remove),
                )
            }
            Some(Command::Upload) => Transition::reply(
                BotResponse::text(UPLOAD_ACK_TEXT).with_keyboard(KeyboardHint::Remove),
            )
            .with_action(SessionAction::StartUpload),
            Some(Command::Restore) => Transition::reply(
                BotResponse::text(RESTORE_ACK_TEXT).with_keyboard(KeyboardHint::Remove),
            )
            .with_action(SessionAction::StartRestore),
            Some(Command::Help) => Transition::reply(
                BotResponse::text(HELP_TEXT).with_keyboard(KeyboardHint::Remove),
            ),
            None => Transition::reply(BotResponse::text(FALLBACK_TEXT)),
        }
    }

    fn reset(&self, session: &ChatId, error: StateError) -> Transition {
        warn!(session = %session, error = %error, "Resetting conversation");
        self.store(session, ConversationState::Idle);
        Transition::reply(BotResponse::text(RESET_TEXT))
    }

    fn store(&self, session: &ChatId, state: ConversationState) {
        if let Err(e) = self.sessions.set(session, state) {
            warn!(session = %session, state = %state, error = %e, "Failed to store conversation state");
        }
    }
}
