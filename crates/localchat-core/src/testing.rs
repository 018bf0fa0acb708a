//! In-memory engine and loader used by the unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::engine::{
    Completion, CompletionRequest, CreateOptions, Engine, EngineHandle, EngineLoader,
};
use crate::error::EngineError;

/// Engine that answers from a fixed script and records every request.
pub struct ScriptedEngine {
    model: String,
    script: Mutex<VecDeque<Result<Completion, String>>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedEngine {
    pub fn new(script: Vec<Result<Completion, String>>) -> Arc<Self> {
        Arc::new(Self {
            model: "scripted".to_string(),
            script: Mutex::new(script.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn replying<const N: usize>(replies: [&str; N]) -> Arc<Self> {
        Self::new(replies.iter().map(|r| Ok(Completion::from_content(*r))).collect())
    }

    pub fn into_handle(self: Arc<Self>) -> EngineHandle {
        self
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Engine for ScriptedEngine {
    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, EngineError> {
        self.requests.lock().unwrap().push(request.clone());
        match self.script.lock().unwrap().pop_front() {
            Some(Ok(completion)) => Ok(completion),
            Some(Err(msg)) => Err(EngineError::Server(msg)),
            None => Err(EngineError::Server("script exhausted".to_string())),
        }
    }
}

/// Loader that reports a fixed progress sequence, then succeeds or fails.
pub struct ScriptedLoader {
    progress: Vec<f64>,
    engine: Option<Arc<ScriptedEngine>>,
    calls: AtomicUsize,
    models: Mutex<Vec<String>>,
}

impl ScriptedLoader {
    pub fn succeeding(progress: Vec<f64>, engine: Arc<ScriptedEngine>) -> Self {
        Self {
            progress,
            engine: Some(engine),
            calls: AtomicUsize::new(0),
            models: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(progress: Vec<f64>) -> Self {
        Self {
            progress,
            engine: None,
            calls: AtomicUsize::new(0),
            models: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requested_models(&self) -> Vec<String> {
        self.models.lock().unwrap().clone()
    }
}

#[async_trait]
impl EngineLoader for ScriptedLoader {
    async fn create(
        &self,
        model: &str,
        options: CreateOptions,
    ) -> Result<EngineHandle, EngineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.models.lock().unwrap().push(model.to_string());
        for fraction in &self.progress {
            options.report(*fraction);
            tokio::task::yield_now().await;
        }
        match &self.engine {
            Some(engine) => Ok(engine.clone() as EngineHandle),
            None => Err(EngineError::ModelNotFound(model.to_string())),
        }
    }
}

/// One request captured by [`MockServer`].
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl RecordedRequest {
    pub fn route(&self) -> String {
        format!("{} {}", self.method, self.path)
    }

    pub fn header(&self, name: &str) -> Option<String> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.clone())
    }
}

/// Minimal HTTP/1.1 server answering canned bodies keyed by `"METHOD /path"`.
/// Every response closes its connection.
pub struct MockServer {
    pub url: String,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockServer {
    pub async fn start(routes: Vec<(&'static str, u16, String)>) -> Self {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        use tokio::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let requests = Arc::new(Mutex::new(Vec::new()));
        let routes = Arc::new(routes);

        let log = requests.clone();
        tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                let routes = routes.clone();
                let log = log.clone();
                tokio::spawn(async move {
                    let mut buf = Vec::new();
                    let mut chunk = [0u8; 4096];

                    let header_end = loop {
                        let n = stream.read(&mut chunk).await.unwrap_or(0);
                        if n == 0 {
                            return;
                        }
                        buf.extend_from_slice(&chunk[..n]);
                        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                            break pos + 4;
                        }
                    };

                    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
                    let mut head_lines = head.lines();
                    let mut request_line = head_lines.next().unwrap_or_default().split_whitespace();
                    let method = request_line.next().unwrap_or_default().to_string();
                    let path = request_line.next().unwrap_or_default().to_string();
                    let headers: Vec<(String, String)> = head_lines
                        .filter_map(|l| l.split_once(':'))
                        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
                        .collect();
                    let content_length = headers
                        .iter()
                        .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
                        .and_then(|(_, v)| v.parse::<usize>().ok())
                        .unwrap_or(0);

                    while buf.len() < header_end + content_length {
                        let n = stream.read(&mut chunk).await.unwrap_or(0);
                        if n == 0 {
                            break;
                        }
                        buf.extend_from_slice(&chunk[..n]);
                    }
                    let body_end = buf.len().min(header_end + content_length);
                    let body = String::from_utf8_lossy(&buf[header_end..body_end]).to_string();

                    let request = RecordedRequest {
                        method,
                        path,
                        headers,
                        body,
                    };
                    let route = request.route();
                    log.lock().unwrap().push(request);

                    let (status, payload) = routes
                        .iter()
                        .find(|(r, _, _)| *r == route)
                        .map(|(_, s, b)| (*s, b.clone()))
                        .unwrap_or((404, "not found".to_string()));

                    let response = format!(
                        concat!(
                            "HTTP/1.1 {} X\r\ncontent-type: application/json\r\n",
                            "content-length: {}\r\nconnection: close\r\n\r\n{}"
                        ),
                        status,
                        payload.len(),
                        payload
                    );
                    let _ = stream.write_all(response.as_bytes()).await;
                    let _ = stream.shutdown().await;
                });
            }
        });

        Self { url, requests }
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}
