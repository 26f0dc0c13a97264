//! Console input: one command per line.

use shared::Command;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum InputError {
    #[error("unknown command '{0}'")]
    Unknown(String),
}

/// What a line of input asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputAction {
    Send(Command),
    Status,
    Quit,
}

/// Parses a command name (`accelerate`, `turn_left`, ...), a short alias or a
/// raw command code. Blank lines yield `None`.
pub fn parse_line(line: &str) -> Result<Option<InputAction>, InputError> {
    let word = line.trim().to_ascii_lowercase();
    if word.is_empty() {
        return Ok(None);
    }

    let action = match word.as_str() {
        "quit" | "exit" => InputAction::Quit,
        "status" => InputAction::Status,
        "w" | "up" => InputAction::Send(Command::Accelerate),
        "s" | "down" => InputAction::Send(Command::Decelerate),
        "x" => InputAction::Send(Command::Stop),
        "a" | "left" => InputAction::Send(Command::TurnLeft),
        "d" | "right" => InputAction::Send(Command::TurnRight),
        "e" => InputAction::Send(Command::TurnStop),
        "f" | "fire" => InputAction::Send(Command::Shoot),
        other => {
            let command = other
                .parse::<i32>()
                .ok()
                .and_then(Command::from_code)
                .or_else(|| Command::from_name(other))
                .ok_or_else(|| InputError::Unknown(other.to_string()))?;
            InputAction::Send(command)
        }
    };
    Ok(Some(action))
}

/// One line of help for the console.
pub fn usage() -> String {
    let names: Vec<&str> = Command::ALL.iter().map(|c| c.name()).collect();
    format!(
        "commands: {} (or w/s/x, a/d/e, f), status, quit",
        names.join(", ")
    )
}
