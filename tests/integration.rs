use rand::distributions::{Alphanumeric, DistString};
use redis::aio::MultiplexedConnection;
use redis::RedisError;
use serial_test::serial;
use std::collections::HashMap;
use std::net::SocketAddr;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{sleep, Duration};

use hashdis::codec::FrameCodec;
use hashdis::config::Config;
use hashdis::frame::MAX_DEPTH;
use hashdis::server::{run, serve};
use hashdis::store::Store;

/// Starts a server on an ephemeral port and returns its address.
async fn start_server() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(serve(listener, Store::new(), FrameCodec::default()));

    addr
}

async fn connect(addr: SocketAddr) -> Result<MultiplexedConnection, RedisError> {
    let client = redis::Client::open(format!("redis://{}/", addr))?;
    client.get_multiplexed_async_connection().await
}

/// Sends raw bytes and checks the server answers with exactly `expected`.
async fn exchange(stream: &mut TcpStream, request: &[u8], expected: &[u8]) {
    stream.write_all(request).await.unwrap();

    let mut reply = vec![0; expected.len()];
    stream.read_exact(&mut reply).await.unwrap();

    assert_eq!(
        String::from_utf8_lossy(&reply),
        String::from_utf8_lossy(expected)
    );
}

#[tokio::test]
async fn test_set_and_get_raw() {
    let addr = start_server().await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    exchange(
        &mut stream,
        b"*3\r\n$3\r\nSET\r\n$3\r\nfoo\r\n$3\r\nbar\r\n",
        b"+OK\r\n",
    )
    .await;
    exchange(
        &mut stream,
        b"*2\r\n$3\r\nGET\r\n$3\r\nfoo\r\n",
        b"$3\r\nbar\r\n",
    )
    .await;
    exchange(
        &mut stream,
        b"*2\r\n$3\r\nGET\r\n$7\r\nmissing\r\n",
        b"$-1\r\n",
    )
    .await;
}

#[tokio::test]
async fn test_ping_raw() {
    let addr = start_server().await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    exchange(&mut stream, b"*1\r\n$4\r\nPING\r\n", b"+PONG\r\n").await;
    exchange(
        &mut stream,
        b"*2\r\n$4\r\nping\r\n$5\r\nhello\r\n",
        b"+hello\r\n",
    )
    .await;
}

#[tokio::test]
async fn test_wrong_arity_keeps_connection_open() {
    let addr = start_server().await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    exchange(
        &mut stream,
        b"*2\r\n$3\r\nSET\r\n$3\r\nkey\r\n",
        b"-ERR wrong number of arguments for 'set' command\r\n",
    )
    .await;
    exchange(
        &mut stream,
        b"*3\r\n$3\r\nSET\r\n$3\r\nkey\r\n$5\r\nvalue\r\n",
        b"+OK\r\n",
    )
    .await;
    exchange(
        &mut stream,
        b"*2\r\n$3\r\nGET\r\n$3\r\nkey\r\n",
        b"$5\r\nvalue\r\n",
    )
    .await;
}

#[tokio::test]
async fn test_unknown_command_keeps_connection_open() {
    let addr = start_server().await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    exchange(
        &mut stream,
        b"*2\r\n$3\r\nDEL\r\n$3\r\nkey\r\n",
        b"-ERR unknown command 'DEL'\r\n",
    )
    .await;
    exchange(&mut stream, b"*1\r\n$4\r\nPING\r\n", b"+PONG\r\n").await;
}

#[tokio::test]
async fn test_protocol_error_closes_connection() {
    let addr = start_server().await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    stream.write_all(b"$abc\r\n").await.unwrap();

    // The server explains the failure and then closes the stream.
    let mut reply = Vec::new();
    stream.read_to_end(&mut reply).await.unwrap();

    assert_eq!(
        String::from_utf8_lossy(&reply),
        "-ERR Protocol error: invalid integer \"abc\"\r\n"
    );

    // Other clients are unaffected.
    let mut other = TcpStream::connect(addr).await.unwrap();
    exchange(&mut other, b"*1\r\n$4\r\nPING\r\n", b"+PONG\r\n").await;
}

#[tokio::test]
async fn test_deeply_nested_request_closes_connection() {
    let addr = start_server().await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    stream
        .write_all(&b"*1\r\n".repeat(MAX_DEPTH + 1))
        .await
        .unwrap();

    let mut reply = Vec::new();
    stream.read_to_end(&mut reply).await.unwrap();

    assert_eq!(
        String::from_utf8_lossy(&reply),
        format!(
            "-ERR Protocol error: arrays nested deeper than {} levels\r\n",
            MAX_DEPTH
        )
    );

    // The server is still up for everyone else.
    let mut other = TcpStream::connect(addr).await.unwrap();
    exchange(&mut other, b"*1\r\n$4\r\nPING\r\n", b"+PONG\r\n").await;
}

#[tokio::test]
async fn test_hashes_raw() {
    let addr = start_server().await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    exchange(
        &mut stream,
        b"*4\r\n$4\r\nHSET\r\n$4\r\nuser\r\n$4\r\nname\r\n$3\r\nann\r\n",
        b"+OK\r\n",
    )
    .await;
    exchange(
        &mut stream,
        b"*3\r\n$4\r\nHGET\r\n$4\r\nuser\r\n$4\r\nname\r\n",
        b"$3\r\nann\r\n",
    )
    .await;
    exchange(
        &mut stream,
        b"*2\r\n$7\r\nHGETALL\r\n$4\r\nuser\r\n",
        b"*2\r\n$4\r\nname\r\n$3\r\nann\r\n",
    )
    .await;
    exchange(
        &mut stream,
        b"*2\r\n$7\r\nHGETALL\r\n$7\r\nmissing\r\n",
        b"$-1\r\n",
    )
    .await;
}

#[tokio::test]
async fn test_set_and_get() {
    let addr = start_server().await;
    let mut conn = connect(addr).await.unwrap();

    let mut rng = rand::thread_rng();
    let pairs: Vec<(String, String)> = (0..20)
        .map(|_| {
            (
                Alphanumeric.sample_string(&mut rng, 10),
                Alphanumeric.sample_string(&mut rng, 30),
            )
        })
        .collect();

    for (key, value) in &pairs {
        let _: () = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .query_async(&mut conn)
            .await
            .unwrap();
    }

    for (key, value) in &pairs {
        let actual: Option<String> = redis::cmd("GET")
            .arg(key)
            .query_async(&mut conn)
            .await
            .unwrap();

        assert_eq!(actual.as_ref(), Some(value));
    }

    let missing: Option<String> = redis::cmd("GET")
        .arg("set_get_nonexistentkey")
        .query_async(&mut conn)
        .await
        .unwrap();

    assert_eq!(missing, None);
}

#[tokio::test]
async fn test_hset_and_hgetall() {
    let addr = start_server().await;
    let mut conn = connect(addr).await.unwrap();

    for (field, value) in [("f1", "v1"), ("f2", "v2"), ("f1", "v3")] {
        let _: () = redis::cmd("HSET")
            .arg("hash_key_1")
            .arg(field)
            .arg(value)
            .query_async(&mut conn)
            .await
            .unwrap();
    }

    let value: Option<String> = redis::cmd("HGET")
        .arg("hash_key_1")
        .arg("f1")
        .query_async(&mut conn)
        .await
        .unwrap();
    assert_eq!(value, Some("v3".to_string()));

    let all: Option<HashMap<String, String>> = redis::cmd("HGETALL")
        .arg("hash_key_1")
        .query_async(&mut conn)
        .await
        .unwrap();

    let expected = HashMap::from([
        ("f1".to_string(), "v3".to_string()),
        ("f2".to_string(), "v2".to_string()),
    ]);
    assert_eq!(all, Some(expected));

    let missing: Option<HashMap<String, String>> = redis::cmd("HGETALL")
        .arg("hash_key_2")
        .query_async(&mut conn)
        .await
        .unwrap();
    assert_eq!(missing, None);
}

#[tokio::test]
async fn test_concurrent_clients() {
    let addr = start_server().await;

    let tasks: Vec<_> = (0..16)
        .map(|i| {
            tokio::spawn(async move {
                let mut conn = connect(addr).await.unwrap();
                for j in 0..10 {
                    let _: () = redis::cmd("SET")
                        .arg(format!("client_{i}_key_{j}"))
                        .arg(format!("{i}:{j}"))
                        .query_async(&mut conn)
                        .await
                        .unwrap();
                    let _: () = redis::cmd("HSET")
                        .arg("shared_hash")
                        .arg(format!("client_{i}_field_{j}"))
                        .arg(format!("{i}:{j}"))
                        .query_async(&mut conn)
                        .await
                        .unwrap();
                }
            })
        })
        .collect();

    for task in tasks {
        task.await.unwrap();
    }

    let mut conn = connect(addr).await.unwrap();
    for i in 0..16 {
        for j in 0..10 {
            let value: Option<String> = redis::cmd("GET")
                .arg(format!("client_{i}_key_{j}"))
                .query_async(&mut conn)
                .await
                .unwrap();
            assert_eq!(value, Some(format!("{i}:{j}")));
        }
    }

    let all: HashMap<String, String> = redis::cmd("HGETALL")
        .arg("shared_hash")
        .query_async(&mut conn)
        .await
        .unwrap();
    assert_eq!(all.len(), 160);
}

#[tokio::test]
#[serial]
async fn test_run_on_configured_port() {
    let config = Config {
        port: 6378,
        ..Config::default()
    };
    tokio::spawn(run(config));
    sleep(Duration::from_millis(100)).await;

    let mut stream = TcpStream::connect("127.0.0.1:6378").await.unwrap();
    exchange(&mut stream, b"*1\r\n$4\r\nPING\r\n", b"+PONG\r\n").await;
}

#[tokio::test]
#[serial]
async fn test_run_with_max_frame_size() {
    let config = Config {
        port: 6378,
        max_frame_size: 64,
        ..Config::default()
    };
    tokio::spawn(run(config));
    sleep(Duration::from_millis(100)).await;

    let mut stream = TcpStream::connect("127.0.0.1:6378").await.unwrap();
    exchange(&mut stream, b"*1\r\n$4\r\nPING\r\n", b"+PONG\r\n").await;

    let value = "x".repeat(128);
    let request = format!(
        "*3\r\n$3\r\nSET\r\n$3\r\nkey\r\n${}\r\n{}\r\n",
        value.len(),
        value
    );
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut reply = Vec::new();
    stream.read_to_end(&mut reply).await.unwrap();

    assert_eq!(
        String::from_utf8_lossy(&reply),
        "-ERR Protocol error: frame size exceeds limit of 64 bytes\r\n"
    );
}
