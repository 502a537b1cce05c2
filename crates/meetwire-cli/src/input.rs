//! Parsing of interactive commands typed on stdin

use meetwire_core::UserCommand;

pub const HELP: &str = "commands: join <destination> | hangup | quit | help";

/// One parsed input line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputLine {
    Command(UserCommand),
    Help,
    Empty,
}

/// Parse a line of user input
pub fn parse_line(line: &str) -> Result<InputLine, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(InputLine::Empty);
    }

    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    match word.to_ascii_lowercase().as_str() {
        "join" | "call" => {
            if rest.is_empty() {
                Err("usage: join <destination>".to_string())
            } else {
                Ok(InputLine::Command(UserCommand::Join(rest.to_string())))
            }
        }
        "hangup" | "leave" => Ok(InputLine::Command(UserCommand::Hangup)),
        "quit" | "exit" => Ok(InputLine::Command(UserCommand::Shutdown)),
        "help" | "?" => Ok(InputLine::Help),
        other => Err(format!("unknown command '{other}'; {HELP}")),
    }
}
