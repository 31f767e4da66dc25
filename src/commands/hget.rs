use crate::commands::executable::Executable;
use crate::commands::{CommandParser, CommandParserError};
use crate::frame::Frame;
use crate::store::Store;

/// Returns the value associated with `field` in the hash stored at `key`, or `nil` when either
/// the hash or the field is missing.
///
/// Ref: <https://redis.io/docs/latest/commands/hget/>
#[derive(Debug, PartialEq)]
pub struct HGet {
    pub key: String,
    pub field: String,
}

impl Executable for HGet {
    fn exec(self, store: Store) -> Frame {
        store
            .hget(&self.key, &self.field)
            .map_or(Frame::Null, Frame::Bulk)
    }
}

impl TryFrom<&mut CommandParser> for HGet {
    type Error = CommandParserError;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.next_string()?;
        let field = parser.next_string()?;
        parser.finish()?;

        Ok(Self { key, field })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::Command;
    use bytes::Bytes;

    #[test]
    fn existing_field() {
        let store = Store::new();
        store.hset(String::from("h"), String::from("f"), Bytes::from("v"));

        let frame = Frame::Array(vec![
            Frame::Bulk(Bytes::from("HGET")),
            Frame::Bulk(Bytes::from("h")),
            Frame::Bulk(Bytes::from("f")),
        ]);
        let cmd = Command::try_from(frame).unwrap();

        assert_eq!(
            cmd,
            Command::HGet(HGet {
                key: String::from("h"),
                field: String::from("f"),
            })
        );

        let res = cmd.exec(store.clone());

        assert_eq!(res, Frame::Bulk(Bytes::from("v")));
    }

    #[test]
    fn missing_hash() {
        let res = HGet {
            key: String::from("h"),
            field: String::from("f"),
        }
        .exec(Store::new());

        assert_eq!(res, Frame::Null);
    }

    #[test]
    fn missing_field() {
        let store = Store::new();
        store.hset(String::from("h"), String::from("f"), Bytes::from("v"));

        let res = HGet {
            key: String::from("h"),
            field: String::from("other"),
        }
        .exec(store);

        assert_eq!(res, Frame::Null);
    }
}
