//! 测试用的最小 HTTP 桩服务：按 方法+路径 注册响应闭包，
//! 并统计每个端点的命中次数，方便断言"没有发起网络请求"
//! 与"刷新只发生一次"这类性质。
#![allow(dead_code)]

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

pub struct StubResponse {
    pub status: u16,
    pub content_type: String,
    pub body: Vec<u8>,
}

impl StubResponse {
    pub fn json(status: u16, body: &str) -> Self {
        StubResponse {
            status,
            content_type: "application/json".to_string(),
            body: body.as_bytes().to_vec(),
        }
    }

    pub fn bytes(status: u16, content_type: &str, body: Vec<u8>) -> Self {
        StubResponse {
            status,
            content_type: content_type.to_string(),
            body,
        }
    }

    pub fn empty(status: u16) -> Self {
        StubResponse {
            status,
            content_type: "text/plain".to_string(),
            body: Vec::new(),
        }
    }
}

pub struct StubRequest {
    pub method: String,
    /// 不含查询串的路径。
    pub path: String,
    /// 含查询串的原始请求目标。
    pub target: String,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl StubRequest {
    pub fn bearer(&self) -> Option<&str> {
        self.headers
            .get("authorization")?
            .strip_prefix("Bearer ")
    }

    pub fn body_json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).unwrap_or(serde_json::Value::Null)
    }
}

type Handler = Arc<dyn Fn(&StubRequest) -> StubResponse + Send + Sync>;

pub struct StubServer {
    addr: SocketAddr,
    routes: Arc<Mutex<Vec<(String, String, Handler)>>>,
    hits: Arc<Mutex<HashMap<String, usize>>>,
    stop: Arc<AtomicBool>,
}

impl StubServer {
    pub fn start() -> Self {
        let listener = TcpListener::bind(("127.0.0.1", 0)).expect("bind stub server");
        let addr = listener.local_addr().expect("stub server addr");
        let routes: Arc<Mutex<Vec<(String, String, Handler)>>> = Arc::new(Mutex::new(Vec::new()));
        let hits: Arc<Mutex<HashMap<String, usize>>> = Arc::new(Mutex::new(HashMap::new()));
        let stop = Arc::new(AtomicBool::new(false));

        let accept_routes = Arc::clone(&routes);
        let accept_hits = Arc::clone(&hits);
        let accept_stop = Arc::clone(&stop);
        thread::spawn(move || {
            for stream in listener.incoming() {
                if accept_stop.load(Ordering::Relaxed) {
                    break;
                }
                let Ok(stream) = stream else { continue };
                let routes = Arc::clone(&accept_routes);
                let hits = Arc::clone(&accept_hits);
                thread::spawn(move || handle_connection(stream, routes, hits));
            }
        });

        StubServer {
            addr,
            routes,
            hits,
            stop,
        }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn route<F>(&self, method: &str, path: &str, handler: F)
    where
        F: Fn(&StubRequest) -> StubResponse + Send + Sync + 'static,
    {
        let mut routes = self.routes.lock().unwrap();
        routes.push((method.to_string(), path.to_string(), Arc::new(handler)));
    }

    /// 指定端点的命中次数，键形如 "POST /auth/token/refresh/"。
    pub fn hits(&self, key: &str) -> usize {
        *self.hits.lock().unwrap().get(key).unwrap_or(&0)
    }

    pub fn total_hits(&self) -> usize {
        self.hits.lock().unwrap().values().sum()
    }
}

impl Drop for StubServer {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        // 唤醒 accept 循环让它观察到停止标记。
        let _ = TcpStream::connect(self.addr);
    }
}

fn handle_connection(
    mut stream: TcpStream,
    routes: Arc<Mutex<Vec<(String, String, Handler)>>>,
    hits: Arc<Mutex<HashMap<String, usize>>>,
) {
    let Some(request) = read_request(&mut stream) else {
        return;
    };

    {
        let mut hits = hits.lock().unwrap();
        *hits
            .entry(format!("{} {}", request.method, request.path))
            .or_insert(0) += 1;
    }

    let handler = {
        let routes = routes.lock().unwrap();
        routes
            .iter()
            .find(|(method, path, _)| *method == request.method && *path == request.path)
            .map(|(_, _, handler)| Arc::clone(handler))
    };

    let response = match handler {
        Some(handler) => handler(&request),
        None => StubResponse::json(404, r#"{"detail":"not found"}"#),
    };

    write_response(&mut stream, &response);
}

fn read_request(stream: &mut TcpStream) -> Option<StubRequest> {
    let mut raw = Vec::new();
    let mut buf = [0u8; 4096];

    let header_end = loop {
        match find_header_end(&raw) {
            Some(end) => break end,
            None => {
                let read = stream.read(&mut buf).ok()?;
                if read == 0 {
                    return None;
                }
                raw.extend_from_slice(&buf[..read]);
            }
        }
    };

    let head = String::from_utf8_lossy(&raw[..header_end]).into_owned();
    let mut lines = head.lines();
    let request_line = lines.next()?;
    let mut parts = request_line.split_whitespace();
    let method = parts.next()?.to_string();
    let target = parts.next()?.to_string();
    let path = target.split('?').next().unwrap_or(&target).to_string();

    let mut headers = HashMap::new();
    for line in lines {
        if let Some((name, value)) = line.split_once(':') {
            headers.insert(name.trim().to_ascii_lowercase(), value.trim().to_string());
        }
    }

    let content_length: usize = headers
        .get("content-length")
        .and_then(|value| value.parse().ok())
        .unwrap_or(0);

    let body_start = header_end + 4;
    while raw.len() < body_start + content_length {
        let read = stream.read(&mut buf).ok()?;
        if read == 0 {
            break;
        }
        raw.extend_from_slice(&buf[..read]);
    }
    let body = raw
        .get(body_start..body_start + content_length)
        .unwrap_or(&[])
        .to_vec();

    Some(StubRequest {
        method,
        path,
        target,
        headers,
        body,
    })
}

fn find_header_end(raw: &[u8]) -> Option<usize> {
    raw.windows(4).position(|window| window == b"\r\n\r\n")
}

fn write_response(stream: &mut TcpStream, response: &StubResponse) {
    let reason = match response.status {
        200 => "OK",
        201 => "Created",
        204 => "No Content",
        400 => "Bad Request",
        401 => "Unauthorized",
        404 => "Not Found",
        _ => "Error",
    };
    let head = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        response.status,
        reason,
        response.content_type,
        response.body.len()
    );
    let _ = stream.write_all(head.as_bytes());
    let _ = stream.write_all(&response.body);
    let _ = stream.flush();
}
