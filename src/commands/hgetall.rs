use bytes::Bytes;

use crate::commands::executable::Executable;
use crate::commands::{CommandParser, CommandParserError};
use crate::frame::Frame;
use crate::store::Store;

/// Returns all fields and values of the hash stored at `key`, as a flat array where every field
/// name is followed by its value. Returns `nil` if the hash does not exist.
///
/// Ref: <https://redis.io/docs/latest/commands/hgetall/>
#[derive(Debug, PartialEq)]
pub struct HGetAll {
    pub key: String,
}

impl Executable for HGetAll {
    fn exec(self, store: Store) -> Frame {
        let Some(pairs) = store.hgetall(&self.key) else {
            return Frame::Null;
        };

        let frames = pairs
            .into_iter()
            .flat_map(|(field, value)| [Frame::Bulk(Bytes::from(field)), Frame::Bulk(value)])
            .collect();

        Frame::Array(frames)
    }
}

impl TryFrom<&mut CommandParser> for HGetAll {
    type Error = CommandParserError;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.next_string()?;
        parser.finish()?;

        Ok(Self { key })
    }
}
