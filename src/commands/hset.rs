use bytes::Bytes;

use crate::commands::executable::Executable;
use crate::commands::{CommandParser, CommandParserError};
use crate::frame::Frame;
use crate::store::Store;

/// Sets `field` in the hash stored at `key` to `value`. The hash is created if it does not
/// exist, and an existing field is overwritten.
///
/// **NOTE**: unlike Redis, a single field/value pair is accepted and the reply is `OK` rather
/// than the number of added fields.
///
/// Ref: <https://redis.io/docs/latest/commands/hset/>
#[derive(Debug, PartialEq)]
pub struct HSet {
    pub key: String,
    pub field: String,
    pub value: Bytes,
}

impl Executable for HSet {
    fn exec(self, store: Store) -> Frame {
        store.hset(self.key, self.field, self.value);

        Frame::simple("OK")
    }
}

impl TryFrom<&mut CommandParser> for HSet {
    type Error = CommandParserError;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.next_string()?;
        let field = parser.next_string()?;
        let value = parser.next_bytes()?;
        parser.finish()?;

        Ok(Self { key, field, value })
    }
}
