pub mod executable;
pub mod get;
pub mod hget;
pub mod hgetall;
pub mod hset;
pub mod ping;
pub mod set;

use bytes::Bytes;
use std::str::{self, FromStr};
use std::vec;
use strum_macros::{AsRefStr, EnumString};
use thiserror::Error as ThisError;

use crate::commands::executable::Executable;
use crate::frame::Frame;
use crate::store::Store;

use get::Get;
use hget::HGet;
use hgetall::HGetAll;
use hset::HSet;
use ping::Ping;
use set::Set;

#[derive(Debug, PartialEq)]
pub enum Command {
    Get(Get),
    HGet(HGet),
    HGetAll(HGetAll),
    HSet(HSet),
    Ping(Ping),
    Set(Set),
}

/// Every command name the server answers to. Names are matched after being uppercased, so
/// lookups are case-insensitive.
#[derive(Debug, Clone, Copy, PartialEq, EnumString, AsRefStr)]
pub enum CommandName {
    #[strum(serialize = "GET")]
    Get,
    #[strum(serialize = "HGET")]
    HGet,
    #[strum(serialize = "HGETALL")]
    HGetAll,
    #[strum(serialize = "HSET")]
    HSet,
    #[strum(serialize = "PING")]
    Ping,
    #[strum(serialize = "SET")]
    Set,
}

impl Executable for Command {
    fn exec(self, store: Store) -> Frame {
        match self {
            Command::Get(cmd) => cmd.exec(store),
            Command::HGet(cmd) => cmd.exec(store),
            Command::HGetAll(cmd) => cmd.exec(store),
            Command::HSet(cmd) => cmd.exec(store),
            Command::Ping(cmd) => cmd.exec(store),
            Command::Set(cmd) => cmd.exec(store),
        }
    }
}

impl TryFrom<Frame> for Command {
    type Error = CommandParserError;

    fn try_from(frame: Frame) -> Result<Self, Self::Error> {
        // Clients send commands to the Redis server as RESP arrays.
        let frames = match frame {
            Frame::Array(array) => array,
            frame => {
                return Err(CommandParserError::InvalidFrame {
                    expected: "array".to_string(),
                    actual: frame,
                })
            }
        };

        let mut parts = frames.into_iter();
        let name = match parts.next() {
            Some(frame) => parse_string(frame)?,
            None => return Err(CommandParserError::EmptyCommand),
        };

        let command = CommandName::from_str(&name.to_uppercase())
            .map_err(|_| CommandParserError::UnknownCommand { command: name })?;

        let parser = &mut CommandParser { command, parts };

        // Each command validates its own arguments, including how many it takes.
        match command {
            CommandName::Get => Get::try_from(parser).map(Command::Get),
            CommandName::HGet => HGet::try_from(parser).map(Command::HGet),
            CommandName::HGetAll => HGetAll::try_from(parser).map(Command::HGetAll),
            CommandName::HSet => HSet::try_from(parser).map(Command::HSet),
            CommandName::Ping => Ping::try_from(parser).map(Command::Ping),
            CommandName::Set => Set::try_from(parser).map(Command::Set),
        }
    }
}

pub struct CommandParser {
    command: CommandName,
    parts: vec::IntoIter<Frame>,
}

impl CommandParser {
    fn next_frame(&mut self) -> Result<Frame, CommandParserError> {
        self.parts.next().ok_or_else(|| self.wrong_arity())
    }

    fn next_string(&mut self) -> Result<String, CommandParserError> {
        let frame = self.next_frame()?;
        parse_string(frame)
    }

    fn next_bytes(&mut self) -> Result<Bytes, CommandParserError> {
        let frame = self.next_frame()?;

        match frame {
            // Both `Simple` and `Bulk` representation may be strings. While errors are stored as
            // strings, they are considered separate types.
            Frame::Simple(s) => Ok(Bytes::from(s)),
            Frame::Bulk(bytes) => Ok(bytes),
            frame => Err(CommandParserError::InvalidFrame {
                expected: "simple or bulk string".to_string(),
                actual: frame,
            }),
        }
    }

    fn has_remaining(&self) -> bool {
        self.parts.len() > 0
    }

    /// Fails if arguments are left over once the command took everything it accepts.
    fn finish(&mut self) -> Result<(), CommandParserError> {
        if self.has_remaining() {
            return Err(self.wrong_arity());
        }
        Ok(())
    }

    fn wrong_arity(&self) -> CommandParserError {
        CommandParserError::WrongNumberOfArguments {
            command: self.command.as_ref().to_lowercase(),
        }
    }
}

fn parse_string(frame: Frame) -> Result<String, CommandParserError> {
    match frame {
        Frame::Simple(s) => Ok(s),
        Frame::Bulk(bytes) => str::from_utf8(&bytes[..])
            .map(|s| s.to_string())
            .map_err(CommandParserError::InvalidUTF8String),
        frame => Err(CommandParserError::InvalidFrame {
            expected: "simple or bulk string".to_string(),
            actual: frame,
        }),
    }
}

/// Errors in a well framed request. They are reported to the client as error replies, and the
/// connection stays open. The `Display` output is the reply text.
#[derive(Debug, ThisError, PartialEq)]
pub enum CommandParserError {
    #[error("ERR protocol error; invalid frame, expected {expected}, got {actual}")]
    InvalidFrame { expected: String, actual: Frame },
    #[error("ERR protocol error; empty command")]
    EmptyCommand,
    #[error("ERR unknown command '{command}'")]
    UnknownCommand { command: String },
    #[error("ERR wrong number of arguments for '{command}' command")]
    WrongNumberOfArguments { command: String },
    #[error("ERR protocol error; invalid UTF-8 string")]
    InvalidUTF8String(#[from] str::Utf8Error),
}

impl From<CommandParserError> for Frame {
    fn from(err: CommandParserError) -> Self {
        Frame::error(err.to_string())
    }
}
