//! Console rendering and command parsing.

use parley_core::events::SessionEvent;
use parley_core::types::ChatEntry;
use parley_voice::{Notice, Notifier};

pub const LOADING: &str = "Loading...";
pub const BUSY: &str = "Busy: wait for the current answer before asking again.";

pub const HELP: &str = "\
Type a question and press Enter to ask it.
  /voice    ask by speaking (one utterance)
  /stop     stop listening
  /history  show the conversation so far
  /help     show this help
  /quit     leave (Ctrl-D works too)";

/// One line of user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Ask(String),
    Voice,
    Stop,
    History,
    Help,
    Quit,
    Empty,
    Unknown(String),
}

pub fn parse_command(line: &str) -> Command {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Command::Empty;
    }
    if !trimmed.starts_with('/') {
        return Command::Ask(trimmed.to_string());
    }
    match trimmed.to_ascii_lowercase().as_str() {
        "/voice" | "/v" => Command::Voice,
        "/stop" => Command::Stop,
        "/history" => Command::History,
        "/help" | "/?" => Command::Help,
        "/quit" | "/exit" | "/q" => Command::Quit,
        _ => Command::Unknown(trimmed.to_string()),
    }
}

/// `Q: ...` then `A: ...`, the answer verbatim.
pub fn render_entry(entry: &ChatEntry) -> String {
    format!("Q: {}\nA: {}", entry.question(), entry.answer())
}

pub fn render_history(entries: &[ChatEntry]) -> String {
    if entries.is_empty() {
        return "(no questions yet)".to_string();
    }
    entries
        .iter()
        .map(render_entry)
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Text to print on stdout for an event, if it is visible at all.
pub fn render_event(event: &SessionEvent) -> Option<String> {
    match event {
        SessionEvent::BusyChanged { busy: true, .. } => Some(LOADING.to_string()),
        SessionEvent::EntryAppended { entry, .. } => Some(format!("{}\n", render_entry(entry))),
        SessionEvent::RecognitionStarted { language, .. } => {
            Some(format!("Listening ({})... /stop to cancel", language))
        }
        SessionEvent::RecognitionCompleted { transcript, .. } => {
            Some(format!("Heard: {}", transcript))
        }
        _ => None,
    }
}

/// Shows notices on stderr so they never mix with the history.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, notice: Notice) {
        tracing::debug!(notice = %notice, "Showing notice");
        eprintln!("! {}", notice);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    // ---- Commands ----

    #[test]
    fn test_parse_questions() {
        assert_eq!(
            parse_command("  What is 2+2?  "),
            Command::Ask("What is 2+2?".to_string())
        );
        assert_eq!(parse_command(""), Command::Empty);
        assert_eq!(parse_command("   \t"), Command::Empty);
    }

    #[test]
    fn test_parse_slash_commands() {
        assert_eq!(parse_command("/voice"), Command::Voice);
        assert_eq!(parse_command("/VOICE"), Command::Voice);
        assert_eq!(parse_command("/stop"), Command::Stop);
        assert_eq!(parse_command("/history"), Command::History);
        assert_eq!(parse_command("/help"), Command::Help);
        assert_eq!(parse_command("/quit"), Command::Quit);
        assert_eq!(parse_command("/exit"), Command::Quit);
        assert_eq!(
            parse_command("/dance"),
            Command::Unknown("/dance".to_string())
        );
    }

    // ---- Rendering ----

    #[test]
    fn test_render_entry_keeps_newlines() {
        let entry = ChatEntry::new("list two", "first\nsecond");
        assert_eq!(render_entry(&entry), "Q: list two\nA: first\nsecond");
    }

    #[test]
    fn test_render_failed_entry() {
        let entry = ChatEntry::failed("hi");
        assert_eq!(render_entry(&entry), "Q: hi\nA: Error: Could not get response");
    }

    #[test]
    fn test_render_history() {
        assert_eq!(render_history(&[]), "(no questions yet)");
        let entries = vec![ChatEntry::new("a", "1"), ChatEntry::new("b", "2")];
        assert_eq!(render_history(&entries), "Q: a\nA: 1\n\nQ: b\nA: 2");
    }

    #[test]
    fn test_render_events() {
        let loading = SessionEvent::BusyChanged {
            busy: true,
            timestamp: Utc::now(),
        };
        assert_eq!(render_event(&loading).as_deref(), Some(LOADING));

        let idle = SessionEvent::BusyChanged {
            busy: false,
            timestamp: Utc::now(),
        };
        assert!(render_event(&idle).is_none());

        let appended = SessionEvent::EntryAppended {
            index: 0,
            entry: ChatEntry::new("q", "a"),
            timestamp: Utc::now(),
        };
        assert_eq!(render_event(&appended).as_deref(), Some("Q: q\nA: a\n"));
    }

    #[test]
    fn test_help_lists_commands() {
        for cmd in ["/voice", "/stop", "/history", "/help", "/quit"] {
            assert!(HELP.contains(cmd), "help is missing {}", cmd);
        }
    }
}
