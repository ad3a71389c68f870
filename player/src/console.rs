/// Line-oriented control console on stdin.
///
/// Stands in for the player window's controls: the Play / Pause / Stop
/// buttons, the scrubber, the source path field and the offset field.
///
/// ```text
/// play | start          pause               stop | reset
/// seek <ms>             source <path>       offset <ms>
/// format <full|compact|precise>             status      quit
/// ```
use std::path::PathBuf;

use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::event::PlayerEvent;
use crate::timefmt::TimeFormat;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlCommand {
    Play,
    Pause,
    Stop,
    Seek(u64),
    Source(PathBuf),
    Offset(u64),
    Format(TimeFormat),
    Status,
    Quit,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("empty command")]
    Empty,
    #[error("unknown command '{0}'")]
    Unknown(String),
    #[error("'{0}' needs an argument")]
    MissingArgument(&'static str),
    #[error("'{0}' is not a millisecond value")]
    BadNumber(String),
    #[error("{0}")]
    BadFormat(String),
}

pub fn parse_command(line: &str) -> Result<ControlCommand, ParseError> {
    let line = line.trim();
    let (verb, rest) = match line.split_once(char::is_whitespace) {
        Some((verb, rest)) => (verb, rest.trim()),
        None => (line, ""),
    };

    let command = match verb.to_ascii_lowercase().as_str() {
        "" => return Err(ParseError::Empty),
        "play" | "start" => ControlCommand::Play,
        "pause" => ControlCommand::Pause,
        "stop" | "reset" => ControlCommand::Stop,
        "seek" => ControlCommand::Seek(millis("seek", rest)?),
        "offset" => ControlCommand::Offset(millis("offset", rest)?),
        "source" => {
            if rest.is_empty() {
                return Err(ParseError::MissingArgument("source"));
            }
            ControlCommand::Source(PathBuf::from(rest))
        }
        "format" => {
            if rest.is_empty() {
                return Err(ParseError::MissingArgument("format"));
            }
            ControlCommand::Format(rest.parse().map_err(ParseError::BadFormat)?)
        }
        "status" => ControlCommand::Status,
        "quit" | "exit" => ControlCommand::Quit,
        other => return Err(ParseError::Unknown(other.to_string())),
    };
    Ok(command)
}

fn millis(verb: &'static str, arg: &str) -> Result<u64, ParseError> {
    if arg.is_empty() {
        return Err(ParseError::MissingArgument(verb));
    }
    arg.parse().map_err(|_| ParseError::BadNumber(arg.to_string()))
}

/// Reads commands from `input` until EOF and forwards them to the event loop.
/// Invalid lines are logged and skipped; EOF ends only this task.
pub async fn run<R: AsyncBufRead + Unpin>(input: R, tx: mpsc::Sender<PlayerEvent>) {
    let mut lines = input.lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                warn!("[console] Failed to read input: {e}");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        match parse_command(&line) {
            Ok(command) => {
                if tx.send(PlayerEvent::Control(command)).await.is_err() {
                    return;
                }
            }
            Err(e) => warn!("[console] {e}"),
        }
    }
    debug!("[console] Input closed");
}
