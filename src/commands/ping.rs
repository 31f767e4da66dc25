use crate::commands::executable::Executable;
use crate::commands::{CommandParser, CommandParserError};
use crate::frame::Frame;
use crate::store::Store;

/// Returns PONG if no argument is provided, otherwise returns a copy of the argument.
///
/// The reply is always a simple string, so line breaks in the argument are replaced with
/// spaces.
///
/// Ref: <https://redis.io/docs/latest/commands/ping>
#[derive(Debug, PartialEq)]
pub struct Ping {
    pub payload: Option<String>,
}

impl Executable for Ping {
    fn exec(self, _store: Store) -> Frame {
        match self.payload {
            Some(payload) => Frame::simple(payload),
            None => Frame::simple("PONG"),
        }
    }
}

impl TryFrom<&mut CommandParser> for Ping {
    type Error = CommandParserError;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let payload = if parser.has_remaining() {
            Some(parser.next_string()?)
        } else {
            None
        };
        parser.finish()?;

        Ok(Self { payload })
    }
}
