// One shared server per test binary, started on first use.
#![allow(dead_code)]

use std::{
    sync::{Arc, OnceLock},
    time::Duration,
};

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

use arena_sync::config::Config;
use arena_sync::ws::protocol::ServerMsg;

pub type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

static SERVER_ADDR: OnceLock<String> = OnceLock::new();
static SERVER_READY: OnceLock<()> = OnceLock::new();

/// Ensure the test server is running and return its `host:port`.
pub fn ensure_server() -> &'static str {
    SERVER_READY.get_or_init(|| {
        let published = Arc::new(OnceLock::<String>::new());
        let published_thread = Arc::clone(&published);

        // Own thread and runtime so the server outlives each #[tokio::test] runtime
        std::thread::spawn(move || {
            let runtime = tokio::runtime::Runtime::new().expect("test runtime");
            runtime.block_on(async move {
                let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
                    .await
                    .expect("bind ephemeral test port");
                let addr = listener.local_addr().expect("get local addr");
                let _ = published_thread.set(addr.to_string());

                arena_sync::run(listener, Config::default(), std::future::pending())
                    .await
                    .expect("server failed");
            });
        });

        wait_for_readiness(published);
    });

    SERVER_ADDR
        .get()
        .expect("server addr should be initialized")
        .as_str()
}

fn wait_for_readiness(published: Arc<OnceLock<String>>) {
    let addr = loop {
        if let Some(addr) = published.get() {
            break addr.clone();
        }
        std::thread::sleep(Duration::from_millis(10));
    };
    let _ = SERVER_ADDR.set(addr.clone());

    for _ in 0..100 {
        if std::net::TcpStream::connect(&addr).is_ok() {
            return;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    panic!("server did not become ready in time");
}

pub fn http_url(path: &str) -> String {
    format!("http://{}{}", ensure_server(), path)
}

pub async fn connect() -> Socket {
    let url = format!("ws://{}/ws", ensure_server());
    let (socket, _) = connect_async(url.as_str())
        .await
        .expect("websocket handshake should succeed");
    socket
}

pub async fn send_json(socket: &mut Socket, value: serde_json::Value) {
    send_text(socket, value.to_string()).await;
}

pub async fn send_text(socket: &mut Socket, text: String) {
    socket
        .send(Message::Text(text))
        .await
        .expect("send should succeed");
}

/// Read server messages until one matches, failing after two seconds
pub async fn recv_until<F>(socket: &mut Socket, mut pred: F) -> ServerMsg
where
    F: FnMut(&ServerMsg) -> bool,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    loop {
        let frame = tokio::time::timeout_at(deadline, socket.next())
            .await
            .expect("timed out waiting for server message")
            .expect("socket closed")
            .expect("socket error");

        if let Message::Text(text) = frame {
            let msg: ServerMsg = serde_json::from_str(&text).expect("server sent valid JSON");
            if pred(&msg) {
                return msg;
            }
        }
    }
}

/// Connect and wait for the assigned id
pub async fn join() -> (Socket, uuid::Uuid) {
    let mut socket = connect().await;
    let ServerMsg::PlayerConnected(connected) =
        recv_until(&mut socket, |m| matches!(m, ServerMsg::PlayerConnected(_))).await
    else {
        unreachable!();
    };
    (socket, connected.id)
}
