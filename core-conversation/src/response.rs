//! Replies and side-effect requests produced by the state machine.

use crate::command::{BUTTON_HELP, BUTTON_REGISTER_CHANNEL, BUTTON_RESTORE, BUTTON_UPLOAD};
use bridge_traits::{ChatId, KeyboardHint, TextOptions};

pub const WELCOME_TEXT: &str = "Welcome! What do you want to do?";
pub const FALLBACK_TEXT: &str = "Please use the keyboard options or type /start.";
pub const FORWARD_PROMPT_TEXT: &str =
    "Please forward any message from the channel you want to use as cloud storage.";
pub const FORWARD_EXPECTED_TEXT: &str =
    "Please forward a message from the channel, not type a message. Try again.";
pub const NOT_A_CHANNEL_TEXT: &str =
    "That message was not forwarded from a channel. Please forward a message from the channel you want to use.";
pub const UNEXPECTED_FORWARD_TEXT: &str =
    "Got forwarded message, but not expecting it. No action taken.";
pub const RESET_TEXT: &str = "Unexpected state. Resetting. Type /start to begin.";
pub const UPLOAD_ACK_TEXT: &str = "Starting upload...";
pub const RESTORE_ACK_TEXT: &str = "Starting restore...";
pub const HELP_TEXT: &str = "This bot backs up your drive into private storage channels.\n\n\
- Press \"Add Cloud Storage Channel\" and forward a message from that channel.\n\
- Press \"Upload From Drive\" to scan the local drive and upload new files.\n\
- Press \"Restore Images\" to download backed-up files from the channels.\n\
- Any file or image you send here is forwarded to every storage channel.";

/// The fixed command menu, one button per row.
pub fn menu_keyboard() -> KeyboardHint {
    KeyboardHint::Menu(
        [BUTTON_REGISTER_CHANNEL, BUTTON_UPLOAD, BUTTON_RESTORE, BUTTON_HELP]
            .iter()
            .map(|label| vec![label.to_string()])
            .collect(),
    )
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotResponse {
    pub text: String,
    pub keyboard: Option<KeyboardHint>,
    /// Render `text` as Markdown.
    pub markdown: bool,
}

impl BotResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            keyboard: None,
            markdown: false,
        }
    }

    pub fn with_keyboard(mut self, keyboard: KeyboardHint) -> Self {
        self.keyboard = Some(keyboard);
        self
    }

    pub fn markdown(mut self) -> Self {
        self.markdown = true;
        self
    }

    pub fn options(&self) -> TextOptions {
        TextOptions {
            keyboard: self.keyboard.clone(),
            markdown: self.markdown,
        }
    }
}

/// Work the caller performs after replying.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionAction {
    StartUpload,
    StartRestore,
    ChannelRegistered { channel: ChatId, newly_added: bool },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub response: BotResponse,
    pub action: Option<SessionAction>,
}

impl Transition {
    pub fn reply(response: BotResponse) -> Self {
        Self {
            response,
            action: None,
        }
    }

    pub fn with_action(mut self, action: SessionAction) -> Self {
        self.action = Some(action);
        self
    }
}
