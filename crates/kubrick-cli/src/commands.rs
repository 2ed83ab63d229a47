//! Parsing of interactive input lines.

/// One line of user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Plain text for the assistant.
    Chat(String),
    /// Stage a local image or video for the next turn.
    Attach(String),
    Detach,
    /// Upload a local video and start processing it.
    Upload(String),
    Videos,
    Select(String),
    Remove(String),
    /// Download the clip from the last assistant reply, optionally to a file.
    Clip(Option<String>),
    Reset,
    History,
    Help,
    Quit,
    /// A slash command that was not recognised or is missing its argument.
    Invalid(String),
}

impl Command {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.eq_ignore_ascii_case("exit") || line.eq_ignore_ascii_case("quit") {
            return Command::Quit;
        }
        let Some(rest) = line.strip_prefix('/') else {
            return Command::Chat(line.to_string());
        };

        let (name, arg) = match rest.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, Some(arg.trim()).filter(|arg| !arg.is_empty())),
            None => (rest, None),
        };
        let arg = arg.map(str::to_string);

        match (name, arg) {
            ("attach", Some(path)) => Command::Attach(path),
            ("detach", _) => Command::Detach,
            ("upload", Some(path)) => Command::Upload(path),
            ("videos", _) => Command::Videos,
            ("select", Some(id)) => Command::Select(id),
            ("remove", Some(id)) => Command::Remove(id),
            ("clip", out) => Command::Clip(out),
            ("reset", _) => Command::Reset,
            ("history", _) => Command::History,
            ("help", _) => Command::Help,
            ("quit" | "exit", _) => Command::Quit,
            _ => Command::Invalid(line.to_string()),
        }
    }
}

pub const HELP: &str = "\
Commands:
  /attach <path>   stage an image or video for the next message
  /detach          drop the staged file
  /upload <path>   upload a video and start processing
  /videos          list uploaded videos
  /select <id>     make a video the chat context
  /remove <id>     remove a video from the library
  /clip [file]     download the clip from the last reply
  /reset           clear the assistant's memory
  /history         print the conversation
  /quit            leave
Anything else is sent as a chat message.";
