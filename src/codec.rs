use bytes::{Buf, BytesMut};
use std::io::{self, Cursor};
use thiserror::Error as ThisError;
use tokio_util::codec::{Decoder, Encoder};

use crate::frame::{self, Frame, Header, MAX_DEPTH};

pub const DEFAULT_MAX_FRAME_SIZE: usize = 512 * 1024 * 1024;

#[derive(Debug, ThisError)]
pub enum CodecError {
    /// The peer sent bytes that are not a valid frame. The stream can't be resynchronized after
    /// this, so the connection has to be dropped.
    #[error("Protocol error: {0}")]
    Protocol(#[from] frame::Error),
    #[error("Protocol error: frame size exceeds limit of {limit} bytes")]
    FrameTooLarge { limit: usize },
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Splits the byte stream of a connection into frames, and writes reply frames back.
#[derive(Debug, Clone)]
pub struct FrameCodec {
    max_frame_size: usize,
    scan: Scan,
}

/// How far the buffered bytes have been checked for a complete frame. Kept between calls to
/// `decode` so bytes already checked are not looked at again when more data arrives.
#[derive(Debug, Clone, Default)]
struct Scan {
    // Bytes of the buffer made of complete elements or array headers.
    position: usize,
    // Elements still missing from each array that is open at `position`, innermost last.
    pending: Vec<usize>,
    started: bool,
}

impl Scan {
    /// Returns whether `buf[..self.position]` holds a whole frame.
    fn advance(&mut self, buf: &[u8]) -> Result<bool, frame::Error> {
        loop {
            if self.started && self.pending.is_empty() {
                return Ok(true);
            }

            let mut cursor = Cursor::new(&buf[self.position..]);
            let header = match frame::read_header(&mut cursor) {
                Ok(header) => header,
                Err(frame::Error::Incomplete) => return Ok(false),
                Err(err) => return Err(err),
            };
            self.position += cursor.position() as usize;
            self.started = true;

            match header {
                Header::Leaf => self.complete_element(),
                Header::Array(length) => {
                    if self.pending.len() >= MAX_DEPTH {
                        return Err(frame::Error::NestingTooDeep);
                    }
                    self.pending.push(length);
                }
            }
        }
    }

    fn complete_element(&mut self) {
        while let Some(remaining) = self.pending.last_mut() {
            *remaining -= 1;
            if *remaining > 0 {
                break;
            }
            // The array itself is now complete, which counts for its parent.
            self.pending.pop();
        }
    }
}

impl FrameCodec {
    pub fn new(max_frame_size: usize) -> FrameCodec {
        FrameCodec {
            max_frame_size,
            scan: Scan::default(),
        }
    }

    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_SIZE)
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.is_empty() {
            return Ok(None);
        }

        // Check if the frame size exceeds a certain limit to prevent DoS attacks
        if src.len() > self.max_frame_size {
            return Err(CodecError::FrameTooLarge {
                limit: self.max_frame_size,
            });
        }

        if !self.scan.advance(&src[..])? {
            return Ok(None); // Not enough data to parse a frame.
        }

        let position = self.scan.position;
        self.scan = Scan::default();

        let mut cursor = Cursor::new(&src[..position]);
        let frame = Frame::parse(&mut cursor)?;

        // Remove the parsed frame from the buffer.
        src.advance(position);

        Ok(Some(frame))
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = CodecError;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        frame.encode(dst);
        Ok(())
    }
}
