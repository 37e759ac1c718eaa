//! Minimal HTTP/1.1 responder for exercising the network code

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpListener,
};

pub struct TestServer {
    pub base: String,
    hits: Arc<Mutex<HashMap<String, usize>>>,
    peak: Arc<AtomicUsize>,
}

impl TestServer {
    /// Serve `(path, status, body)` routes; anything else is a 404
    pub async fn start(routes: Vec<(&str, u16, Vec<u8>)>) -> TestServer {
        TestServer::start_with_delay(routes, Duration::ZERO).await
    }

    /// Like [`TestServer::start`], but every response waits `delay` first
    pub async fn start_with_delay(
        routes: Vec<(&str, u16, Vec<u8>)>,
        delay: Duration,
    ) -> TestServer {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let routes: Arc<HashMap<String, (u16, Vec<u8>)>> = Arc::new(
            routes
                .into_iter()
                .map(|(path, status, body)| (path.to_string(), (status, body)))
                .collect(),
        );
        let hits = Arc::new(Mutex::new(HashMap::new()));
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let counter = hits.clone();
        let peak_counter = peak.clone();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let routes = routes.clone();
                let counter = counter.clone();
                let active = active.clone();
                let peak = peak_counter.clone();
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::spawn(async move {
                    let path = read_request_path(&mut socket).await;
                    *counter.lock().unwrap().entry(path.clone()).or_insert(0) += 1;
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }

                    // Counted as in flight until the answer starts going out
                    active.fetch_sub(1, Ordering::SeqCst);
                    let (status, body) = routes
                        .get(&path)
                        .cloned()
                        .unwrap_or((404, b"not found".to_vec()));
                    let head = format!(
                        "HTTP/1.1 {} Test\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                        status,
                        body.len()
                    );
                    let _ = socket.write_all(head.as_bytes()).await;
                    let _ = socket.write_all(&body).await;
                    let _ = socket.shutdown().await;
                });
            }
        });

        TestServer {
            base: format!("http://{addr}"),
            hits,
            peak,
        }
    }

    /// Accepts connections and reads requests, but never answers
    pub async fn silent() -> TestServer {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(Mutex::new(HashMap::new()));

        let counter = hits.clone();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((mut socket, _)) = listener.accept().await {
                let path = read_request_path(&mut socket).await;
                *counter.lock().unwrap().entry(path).or_insert(0) += 1;
                held.push(socket);
            }
        });

        TestServer {
            base: format!("http://{addr}"),
            hits,
            peak: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// How many requests hit `path`
    pub fn hits(&self, path: &str) -> usize {
        self.hits.lock().unwrap().get(path).copied().unwrap_or(0)
    }

    /// Most requests that were waiting for an answer at the same time
    pub fn peak_connections(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

async fn read_request_path(socket: &mut tokio::net::TcpStream) -> String {
    let mut request = Vec::new();
    let mut buf = [0u8; 1024];
    loop {
        let n = socket.read(&mut buf).await.unwrap_or(0);
        if n == 0 {
            break;
        }
        request.extend_from_slice(&buf[..n]);
        if request.windows(4).any(|w| w == b"\r\n\r\n") {
            break;
        }
    }
    let request = String::from_utf8_lossy(&request);
    request.split_whitespace().nth(1).unwrap_or("/").to_string()
}
