use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio_util::codec::{FramedRead, FramedWrite};
use uuid::Uuid;

use crate::codec::{CodecError, FrameCodec};
use crate::frame::Frame;

/// One client connection. Each connection owns its own codec state, so nothing here is shared
/// between clients.
pub struct Connection {
    pub id: Uuid,
    pub client_address: SocketAddr,
    // Data is read from the socket into the reader's buffer. When a frame is parsed, the
    // corresponding data is removed from the buffer.
    reader: FramedRead<OwnedReadHalf, FrameCodec>,
    writer: FramedWrite<OwnedWriteHalf, FrameCodec>,
}

impl Connection {
    pub fn new(stream: TcpStream, client_address: SocketAddr) -> Connection {
        Self::with_codec(stream, client_address, FrameCodec::default())
    }

    pub fn with_codec(
        stream: TcpStream,
        client_address: SocketAddr,
        codec: FrameCodec,
    ) -> Connection {
        let (reader, writer) = stream.into_split();

        Connection {
            id: Uuid::new_v4(),
            client_address,
            reader: FramedRead::new(reader, codec.clone()),
            writer: FramedWrite::new(writer, codec),
        }
    }

    /// Reads the next frame sent by the client. Returns `None` once the client closed the
    /// connection cleanly, and an error if the stream ended in the middle of a frame.
    pub async fn read_frame(&mut self) -> Result<Option<Frame>, CodecError> {
        self.reader.next().await.transpose()
    }

    /// Writes a frame and flushes it to the socket.
    pub async fn write_frame(&mut self, frame: Frame) -> Result<(), CodecError> {
        self.writer.send(frame).await
    }
}
