use anyhow::{Context, Result};
use axum::{
    Router,
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
};
use logcast_framework::Broadcaster;
use std::{
    future::Future,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::PathBuf,
    sync::Arc,
};
use tokio::{
    net::TcpListener,
    sync::{mpsc, watch},
};

// constants
pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_BIND: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

const INDEX_HTML: &str = include_str!("../assets/index.html");

/// transport configuration
#[derive(Debug, Clone)]
pub struct ServerDesc {
    pub bind: IpAddr,
    pub port: u16,
    /// landing page read from disk on every request instead of the embedded one
    pub page: Option<PathBuf>,
}

impl Default for ServerDesc {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND,
            port: DEFAULT_PORT,
            page: None,
        }
    }
}

/// Shared state available to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub broadcaster: Arc<Broadcaster>,
    pub page: Option<Arc<PathBuf>>,
    pub shutdown: watch::Receiver<bool>,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(get_index))
        .route("/ws", get(ws_handler))
        .with_state(state)
}

/// Bind the listener. Split from [`serve`] so callers can learn the actual
/// port when binding to port 0.
pub async fn bind(desc: &ServerDesc) -> Result<TcpListener> {
    let addr = SocketAddr::new(desc.bind, desc.port);
    TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))
}

/// Serve until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr()?;
    log::info!("Server running on http://{}", addr);

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .context("Server error")?;

    log::info!("Server shut down");
    Ok(())
}

/// Wait until the shutdown flag flips to true.
pub async fn shutdown_signal(mut rx: watch::Receiver<bool>) {
    while !*rx.borrow_and_update() {
        if rx.changed().await.is_err() {
            break;
        }
    }
}

async fn get_index(State(state): State<AppState>) -> Response {
    let Some(path) = state.page else {
        return Html(INDEX_HTML).into_response();
    };

    match tokio::fs::read_to_string(path.as_path()).await {
        Ok(page) => Html(page).into_response(),
        Err(e) => {
            log::error!("Failed to read {}: {}", path.display(), e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Error loading index.html").into_response()
        }
    }
}

async fn ws_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_viewer(socket, state))
}

async fn handle_viewer(mut socket: WebSocket, state: AppState) {
    let (tx, mut rx) = mpsc::unbounded_channel();

    // registration reads the snapshot from disk
    let broadcaster = state.broadcaster.clone();
    let id = match tokio::task::spawn_blocking(move || broadcaster.register(tx)).await {
        Ok(id) => id,
        Err(e) => {
            log::error!("Failed to register viewer: {}", e);
            return;
        }
    };

    let mut shutdown = state.shutdown.clone();
    loop {
        tokio::select! {
            outbound = rx.recv() => {
                let Some(json) = outbound else { break };
                if socket.send(Message::Text(json.to_string().into())).await.is_err() {
                    log::debug!("Viewer {}: send failed", id);
                    break;
                }
            }
            inbound = socket.recv() => {
                match inbound {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        log::debug!("Viewer {}: receive failed: {}", id, e);
                        break;
                    }
                    // viewers have nothing to say in this protocol
                    Some(Ok(_)) => {}
                }
            }
            _ = shutdown.changed() => break,
        }
    }

    state.broadcaster.deregister(id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use logcast_file::{FileSnapshotSource, FileTailProvider};
    use logcast_framework::{
        HtmlEntryFormatter, LogProvider, TailDesc, WireMessage, run_tick,
    };
    use std::{fs, io::Write, time::Duration};
    use tempfile::TempDir;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};

    struct TestServer {
        _dir: TempDir,
        log_path: PathBuf,
        addr: SocketAddr,
        provider: FileTailProvider,
        broadcaster: Arc<Broadcaster>,
        shutdown_tx: watch::Sender<bool>,
    }

    async fn start_server(content: &str, page: Option<PathBuf>) -> TestServer {
        let dir = TempDir::new().unwrap();
        let log_path = dir.path().join("log.txt");
        fs::write(&log_path, content).unwrap();

        let desc = TailDesc::new(&log_path);
        let mut provider = FileTailProvider::new(&desc);
        provider.start().unwrap();
        let broadcaster = Arc::new(Broadcaster::new(
            Arc::new(FileSnapshotSource::new(&desc)),
            Arc::new(HtmlEntryFormatter),
            desc.snapshot_size,
        ));
        broadcaster.set_watermark(provider.delivered_offset());

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let state = AppState {
            broadcaster: broadcaster.clone(),
            page: page.map(Arc::new),
            shutdown: shutdown_rx.clone(),
        };
        let server_desc = ServerDesc {
            port: 0,
            ..ServerDesc::default()
        };
        let listener = bind(&server_desc).await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(serve(listener, state, shutdown_signal(shutdown_rx)));

        TestServer {
            _dir: dir,
            log_path,
            addr,
            provider,
            broadcaster,
            shutdown_tx,
        }
    }

    async fn http_get(addr: SocketAddr, path: &str) -> String {
        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        let request = format!(
            "GET {} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
            path
        );
        stream.write_all(request.as_bytes()).await.unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }

    async fn wait_for_viewers(broadcaster: &Broadcaster, count: usize) {
        for _ in 0..200 {
            if broadcaster.viewer_count() == count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("expected {} viewers", count);
    }

    async fn next_wire<S>(stream: &mut S) -> WireMessage
    where
        S: futures::Stream<Item = tokio_tungstenite::tungstenite::Result<WsMessage>> + Unpin,
    {
        let msg = tokio::time::timeout(Duration::from_secs(5), stream.next())
            .await
            .expect("message before timeout")
            .expect("open stream")
            .expect("valid frame");
        match msg {
            WsMessage::Text(text) => serde_json::from_str(&text).unwrap(),
            other => panic!("unexpected frame {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_index_serves_embedded_page() {
        let server = start_server("", None).await;
        let response = http_get(server.addr, "/").await;
        assert!(response.starts_with("HTTP/1.1 200"));
        assert!(response.contains("new WebSocket"));
        let _ = server.shutdown_tx.send(true);
    }

    #[tokio::test]
    async fn test_index_reads_custom_page() {
        let dir = TempDir::new().unwrap();
        let page = dir.path().join("index.html");
        fs::write(&page, "<p>custom viewer</p>").unwrap();

        let server = start_server("", Some(page)).await;
        let response = http_get(server.addr, "/").await;
        assert!(response.contains("<p>custom viewer</p>"));
        let _ = server.shutdown_tx.send(true);
    }

    #[tokio::test]
    async fn test_missing_custom_page_is_500() {
        let server = start_server("", Some(PathBuf::from("/no/such/index.html"))).await;
        let response = http_get(server.addr, "/").await;
        assert!(response.starts_with("HTTP/1.1 500"));
        assert!(response.contains("Error loading index.html"));
        let _ = server.shutdown_tx.send(true);
    }

    #[tokio::test]
    async fn test_unknown_path_is_404() {
        let server = start_server("", None).await;
        let response = http_get(server.addr, "/nope").await;
        assert!(response.starts_with("HTTP/1.1 404"));
        let _ = server.shutdown_tx.send(true);
    }

    #[tokio::test]
    async fn test_viewer_receives_snapshot_then_new_lines() {
        let content: String = (1..=12).map(|i| format!("line {}\n", i)).collect();
        let mut server = start_server(&content, None).await;

        let url = format!("ws://{}/ws", server.addr);
        let (mut ws, _) = connect_async(url).await.unwrap();

        match next_wire(&mut ws).await {
            WireMessage::InitialLines { lines } => {
                assert_eq!(lines.len(), 10);
                assert!(lines[0].ends_with("line 12</div>"));
                assert!(lines[9].ends_with("line 3</div>"));
            }
            other => panic!("expected initialLines, got {:?}", other),
        }

        let mut file = fs::OpenOptions::new()
            .append(true)
            .open(&server.log_path)
            .unwrap();
        file.write_all(b"fresh one\nfresh two\n").unwrap();
        assert_eq!(run_tick(&mut server.provider, &server.broadcaster).unwrap(), 2);

        match next_wire(&mut ws).await {
            WireMessage::NewLine { lines } => {
                assert_eq!(lines.len(), 2);
                assert!(lines[0].ends_with("fresh two</div>"));
                assert!(lines[1].ends_with("fresh one</div>"));
            }
            other => panic!("expected newLine, got {:?}", other),
        }

        let _ = server.shutdown_tx.send(true);
    }

    #[tokio::test]
    async fn test_closed_viewer_is_deregistered() {
        let server = start_server("", None).await;
        let url = format!("ws://{}/ws", server.addr);

        let (mut first, _) = connect_async(url.clone()).await.unwrap();
        let (_second, _) = connect_async(url).await.unwrap();
        wait_for_viewers(&server.broadcaster, 2).await;

        first.close(None).await.unwrap();
        wait_for_viewers(&server.broadcaster, 1).await;

        let report = server.broadcaster.broadcast(vec!["still here".into()]);
        assert_eq!(report.delivered, 1);
        assert!(report.failures.is_empty());
        let _ = server.shutdown_tx.send(true);
    }
}
