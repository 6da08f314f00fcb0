//! Menu commands accepted from a session.

use std::fmt;

pub const BUTTON_REGISTER_CHANNEL: &str = "Add Cloud Storage Channel";
pub const BUTTON_UPLOAD: &str = "📤 Upload From Drive";
pub const BUTTON_RESTORE: &str = "📥 Restore Images";
pub const BUTTON_HELP: &str = "Help";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Start,
    RegisterChannel,
    Upload,
    Restore,
    Help,
}

impl Command {
    /// Parse a slash command, a plain word or a menu button label.
    ///
    /// Matching is case-insensitive and ignores surrounding whitespace and a
    /// `@botname` suffix on slash commands.
    pub fn parse(input: &str) -> Option<Self> {
        let trimmed = input.trim();
        let word = match trimmed.strip_prefix('/') {
            Some(rest) => {
                let name = rest.split('@').next().unwrap_or(rest);
                format!("/{}", name.to_lowercase())
            }
            None => trimmed.to_lowercase(),
        };

        match word.as_str() {
            "/start" => Some(Command::Start),
            "register-channel" | "/register" | "add cloud storage channel" => {
                Some(Command::RegisterChannel)
            }
            "upload" | "/upload" | "📤 upload from drive" => Some(Command::Upload),
            "restore" | "/restore" | "📥 restore images" => Some(Command::Restore),
            "help" | "/help" => Some(Command::Help),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Command::Start => "start",
            Command::RegisterChannel => "register-channel",
            Command::Upload => "upload",
            Command::Restore => "restore",
            Command::Help => "help",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
