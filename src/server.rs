use std::net::SocketAddr;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, instrument, warn};

use crate::codec::{CodecError, FrameCodec};
use crate::commands::executable::Executable;
use crate::commands::Command;
use crate::config::Config;
use crate::connection::Connection;
use crate::frame::Frame;
use crate::store::Store;
use crate::Error;

pub async fn run(config: Config) -> Result<(), Error> {
    let _ = tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .try_init()
        .map_err(|e| debug!("Failed to initialize global tracing: {}", e));

    let listener = TcpListener::bind((config.bind, config.port)).await?;

    serve(listener, Store::new(), FrameCodec::new(config.max_frame_size)).await
}

/// Accepts connections on `listener` until accepting fails. Every connection is served by its
/// own task, and all of them share `store`.
pub async fn serve(listener: TcpListener, store: Store, codec: FrameCodec) -> Result<(), Error> {
    info!(
        "Server listening on {}, max frame size {} bytes",
        listener.local_addr()?,
        codec.max_frame_size()
    );

    loop {
        let (socket, client_address) = listener.accept().await?;
        let store = store.clone();
        let codec = codec.clone();
        info!("Accepted connection from {:?}", client_address);

        tokio::spawn(async move {
            if let Err(e) = handle_connection(socket, client_address, store, codec).await {
                error!("Connection failed: {}", e);
            }
        });
    }
}

#[instrument(
    name = "connection",
    skip(stream, store, codec),
    fields(connection_id, client_address)
)]
async fn handle_connection(
    stream: TcpStream,
    client_address: SocketAddr,
    store: Store,
    codec: FrameCodec,
) -> Result<(), Error> {
    let mut conn = Connection::with_codec(stream, client_address, codec);

    tracing::Span::current()
        .record("connection_id", conn.id.to_string())
        .record("client_address", conn.client_address.to_string());

    loop {
        let frame = match conn.read_frame().await {
            Ok(Some(frame)) => frame,
            Ok(None) => break,
            Err(CodecError::Io(e)) => return Err(e.into()),
            Err(e) => {
                // The stream is out of sync; let the client know why before hanging up. The
                // write is best effort, the connection is closed either way.
                warn!("Closing connection: {}", e);
                let _ = conn.write_frame(Frame::error(format!("ERR {}", e))).await;
                return Err(e.into());
            }
        };

        debug!("Received frame from client: {}", frame);

        let res = match Command::try_from(frame) {
            Ok(cmd) => cmd.exec(store.clone()),
            Err(e) => {
                warn!("Rejected command: {}", e);
                Frame::from(e)
            }
        };

        debug!("Sending response to client: {}", res);
        conn.write_frame(res).await?;
    }

    info!("Connection closed");
    Ok(())
}
