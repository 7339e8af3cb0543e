//! A minimal HTTP/1.1 server for integration tests.
//!
//! Serves fixed bodies from a route table and records every request. Each
//! connection handles exactly one request and is then closed, which keeps the
//! parser trivial and is enough for `reqwest`.

#![allow(dead_code)]

use std::collections::HashMap;
use std::io::{BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;

/// How a route answers byte-range requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeMode {
    /// Advertises `Accept-Ranges: bytes` and answers ranges with 206.
    Ranged,
    /// Advertises nothing and always answers 200 with the full body.
    NoRanges,
    /// Advertises ranges but answers every GET with 200 and the full body.
    IgnoresRange,
    /// Advertises ranges but sends only half of each requested range.
    ShortRanges,
    /// Answers HEAD with 405; GET works without ranges.
    RejectsHead,
}

/// A canned response.
#[derive(Debug, Clone)]
pub struct Route {
    pub body: Vec<u8>,
    pub mode: RangeMode,
    pub status: u16,
    pub content_type: &'static str,
}

impl Route {
    pub fn bytes(body: impl Into<Vec<u8>>, mode: RangeMode) -> Self {
        Self {
            body: body.into(),
            mode,
            status: 200,
            content_type: "application/octet-stream",
        }
    }

    pub fn json(body: impl Into<String>) -> Self {
        Self {
            body: body.into().into_bytes(),
            mode: RangeMode::NoRanges,
            status: 200,
            content_type: "application/json",
        }
    }

    pub fn status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }
}

/// One request as the server saw it.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub path: String,
    pub headers: HashMap<String, String>,
}

impl Recorded {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }
}

#[derive(Default)]
struct State {
    routes: Mutex<HashMap<String, Route>>,
    requests: Mutex<Vec<Recorded>>,
}

pub struct TestServer {
    addr: SocketAddr,
    state: Arc<State>,
}

impl TestServer {
    pub fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(State::default());

        let shared = Arc::clone(&state);
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { continue };
                let state = Arc::clone(&shared);
                thread::spawn(move || handle(stream, &state));
            }
        });

        Self { addr, state }
    }

    pub fn route(&self, path: &str, route: Route) -> &Self {
        self.state
            .routes
            .lock()
            .unwrap()
            .insert(path.to_string(), route);
        self
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url())
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.state.requests.lock().unwrap().clone()
    }

    pub fn range_requests(&self, path: &str) -> usize {
        self.requests()
            .iter()
            .filter(|r| r.method == "GET" && r.path == path && r.header("range").is_some())
            .count()
    }
}

fn handle(stream: TcpStream, state: &State) {
    let mut reader = BufReader::new(stream.try_clone().unwrap());

    let mut request_line = String::new();
    if reader.read_line(&mut request_line).unwrap_or(0) == 0 {
        return;
    }
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or_default().to_string();
    let path = parts.next().unwrap_or_default().to_string();

    let mut headers = HashMap::new();
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).unwrap_or(0) == 0 {
            break;
        }
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            headers.insert(name.trim().to_ascii_lowercase(), value.trim().to_string());
        }
    }

    let recorded = Recorded {
        method,
        path,
        headers,
    };
    state.requests.lock().unwrap().push(recorded.clone());

    let route = state.routes.lock().unwrap().get(&recorded.path).cloned();
    let response = match route {
        Some(route) => respond(&route, &recorded),
        None => Response::new(404, "text/plain", b"not found".to_vec()),
    };
    response.write(stream, recorded.method == "HEAD");
}

fn respond(route: &Route, request: &Recorded) -> Response {
    let total = route.body.len();

    if route.status != 200 {
        return Response::new(route.status, route.content_type, route.body.clone());
    }

    if request.method == "HEAD" {
        let mut response = Response::new(200, route.content_type, route.body.clone());
        match route.mode {
            RangeMode::RejectsHead => return Response::new(405, "text/plain", Vec::new()),
            RangeMode::NoRanges => {}
            RangeMode::Ranged | RangeMode::IgnoresRange | RangeMode::ShortRanges => {
                response.extra.push(("Accept-Ranges".to_string(), "bytes".to_string()));
            }
        }
        return response;
    }

    let range = request.header("range").and_then(|r| parse_range(r, total));
    match (route.mode, range) {
        (RangeMode::Ranged, Some((start, end))) => {
            let mut response =
                Response::new(206, route.content_type, route.body[start..=end].to_vec());
            response.extra.push((
                "Content-Range".to_string(),
                format!("bytes {start}-{end}/{total}"),
            ));
            response
        }
        (RangeMode::ShortRanges, Some((start, end))) => {
            let half = start + (end - start + 1) / 2;
            let mut response =
                Response::new(206, route.content_type, route.body[start..half].to_vec());
            response.extra.push((
                "Content-Range".to_string(),
                format!("bytes {start}-{end}/{total}"),
            ));
            response
        }
        _ => Response::new(200, route.content_type, route.body.clone()),
    }
}

fn parse_range(header: &str, total: usize) -> Option<(usize, usize)> {
    let range = header.strip_prefix("bytes=")?;
    let (start, end) = range.split_once('-')?;
    let start: usize = start.parse().ok()?;
    let end: usize = end.parse::<usize>().ok()?.min(total.checked_sub(1)?);
    (start <= end).then_some((start, end))
}

struct Response {
    status: u16,
    content_type: &'static str,
    body: Vec<u8>,
    extra: Vec<(String, String)>,
}

impl Response {
    fn new(status: u16, content_type: &'static str, body: Vec<u8>) -> Self {
        Self {
            status,
            content_type,
            body,
            extra: Vec::new(),
        }
    }

    fn write(self, mut stream: TcpStream, head_only: bool) {
        let reason = match self.status {
            200 => "OK",
            206 => "Partial Content",
            404 => "Not Found",
            405 => "Method Not Allowed",
            _ => "Status",
        };
        let mut head = format!(
            "HTTP/1.1 {} {reason}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n",
            self.status,
            self.content_type,
            self.body.len()
        );
        for (name, value) in &self.extra {
            head.push_str(&format!("{name}: {value}\r\n"));
        }
        head.push_str("\r\n");

        let _ = stream.write_all(head.as_bytes());
        if !head_only {
            let _ = stream.write_all(&self.body);
        }
        let _ = stream.flush();
    }
}

/// Deterministic, non-repeating-looking test payload.
pub fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 31 % 251) as u8).collect()
}
