//! # Conversation Module
//!
//! Per-session command handling and the channel registration handshake.
//!
//! ## Overview
//!
//! Every authorized session owns a small state machine:
//!
//! ```text
//! Idle ──RegisterChannel──▶ WaitingForChannelForward
//!  ▲                               │
//!  └────── forward from channel ───┘
//! ```
//!
//! The machine performs no I/O. Each input produces a [`Transition`] holding
//! the reply to send and, optionally, a [`SessionAction`] the caller carries
//! out (starting an upload or restore, announcing a registered channel).
//!
//! ## Usage
//!
//! ```ignore
//! use core_conversation::{ConversationStateMachine, InMemorySessionTable};
//!
//! let machine = ConversationStateMachine::new(Arc::new(InMemorySessionTable::new()), registry);
//! let transition = machine.handle_text(&session, "/start");
//! transport.send_text(&session, &transition.response.text, transition.response.options()).await?;
//! ```

pub mod command;
pub mod error;
pub mod machine;
pub mod response;
pub mod state;

pub use command::Command;
pub use error::{Result, StateError};
pub use machine::ConversationStateMachine;
pub use response::{menu_keyboard, BotResponse, SessionAction, Transition};
pub use state::{ConversationState, InMemorySessionTable, SessionTable};
