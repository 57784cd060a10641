//! Minimal HTTP/1.1 server for integration tests: HEAD probes, Range GETs,
//! multi-route bodies, failure injection, throttled responses, and PUT
//! upload capture (with caption header).
//!
//! Serves from a background thread until the process exits.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct ServerOptions {
    /// If false, HEAD returns 405 (servers that block HEAD).
    pub head_allowed: bool,
    /// If false, GET ignores Range and returns 200 with the full body.
    pub support_ranges: bool,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            head_allowed: true,
            support_ranges: true,
        }
    }
}

/// One served resource.
pub struct Route {
    pub body: Vec<u8>,
    /// Status returned for matching requests (GET and PUT alike).
    pub status: u16,
    /// Respond 500 to this many GETs before serving normally.
    pub fail_first: u32,
    /// Sleep between 1 KiB body chunks; slows transfers for cancel tests.
    pub chunk_delay: Option<Duration>,
}

impl Route {
    pub fn ok(body: Vec<u8>) -> Self {
        Self {
            body,
            status: 200,
            fail_first: 0,
            chunk_delay: None,
        }
    }

    pub fn status(status: u16) -> Self {
        Self {
            body: Vec::new(),
            status,
            fail_first: 0,
            chunk_delay: None,
        }
    }
}

struct RouteState {
    route: Route,
    fails_left: AtomicU32,
}

/// A captured PUT/POST body.
#[derive(Debug, Clone)]
pub struct Upload {
    pub path: String,
    pub caption: Option<String>,
    pub body: Vec<u8>,
}

pub struct MediaServer {
    base_url: String,
    routes: Arc<Mutex<HashMap<String, Arc<RouteState>>>>,
    uploads: Arc<Mutex<Vec<Upload>>>,
}

impl MediaServer {
    pub fn start() -> Self {
        Self::start_with_options(ServerOptions::default())
    }

    pub fn start_with_options(opts: ServerOptions) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().unwrap().port();
        let routes: Arc<Mutex<HashMap<String, Arc<RouteState>>>> =
            Arc::new(Mutex::new(HashMap::new()));
        let uploads: Arc<Mutex<Vec<Upload>>> = Arc::new(Mutex::new(Vec::new()));

        let server_routes = Arc::clone(&routes);
        let server_uploads = Arc::clone(&uploads);
        thread::spawn(move || {
            for stream in listener.incoming().flatten() {
                let routes = Arc::clone(&server_routes);
                let uploads = Arc::clone(&server_uploads);
                thread::spawn(move || handle(stream, &routes, &uploads, opts));
            }
        });

        Self {
            base_url: format!("http://127.0.0.1:{}", port),
            routes,
            uploads,
        }
    }

    pub fn add_route(&self, path: &str, route: Route) {
        let fails = route.fail_first;
        self.routes.lock().unwrap().insert(
            path.to_string(),
            Arc::new(RouteState {
                route,
                fails_left: AtomicU32::new(fails),
            }),
        );
    }

    pub fn add_body(&self, path: &str, body: Vec<u8>) {
        self.add_route(path, Route::ok(body));
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn uploads(&self) -> Vec<Upload> {
        self.uploads.lock().unwrap().clone()
    }
}

fn handle(
    mut stream: TcpStream,
    routes: &Mutex<HashMap<String, Arc<RouteState>>>,
    uploads: &Mutex<Vec<Upload>>,
    opts: ServerOptions,
) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(5)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(5)));

    let mut buf = Vec::new();
    let mut chunk = [0u8; 8192];
    let header_end = loop {
        let n = match stream.read(&mut chunk) {
            Ok(0) => return,
            Ok(n) => n,
            Err(_) => return,
        };
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = find_header_end(&buf) {
            break pos;
        }
        if buf.len() > 64 * 1024 {
            return;
        }
    };

    let head = match std::str::from_utf8(&buf[..header_end]) {
        Ok(s) => s.to_string(),
        Err(_) => return,
    };
    let body_start = header_end + 4;
    let req = match Request::parse(&head) {
        Some(r) => r,
        None => return,
    };

    match req.method.as_str() {
        "HEAD" => handle_head(&mut stream, routes, &req, opts),
        "GET" => handle_get(&mut stream, routes, &req, opts),
        "PUT" | "POST" => {
            handle_upload(&mut stream, routes, uploads, &req, &buf[body_start..])
        }
        _ => {
            let _ = stream.write_all(b"HTTP/1.1 405 Method Not Allowed\r\n\r\n");
        }
    }
}

fn handle_head(
    stream: &mut TcpStream,
    routes: &Mutex<HashMap<String, Arc<RouteState>>>,
    req: &Request,
    opts: ServerOptions,
) {
    if !opts.head_allowed {
        let _ = stream.write_all(b"HTTP/1.1 405 Method Not Allowed\r\n\r\n");
        return;
    }
    let Some(state) = lookup(routes, &req.path) else {
        let _ = stream.write_all(b"HTTP/1.1 404 Not Found\r\n\r\n");
        return;
    };
    let accept = if opts.support_ranges {
        "Accept-Ranges: bytes\r\n"
    } else {
        ""
    };
    let response = format!(
        "HTTP/1.1 200 OK\r\nContent-Length: {}\r\n{}\r\n",
        state.route.body.len(),
        accept
    );
    let _ = stream.write_all(response.as_bytes());
}

fn handle_get(
    stream: &mut TcpStream,
    routes: &Mutex<HashMap<String, Arc<RouteState>>>,
    req: &Request,
    opts: ServerOptions,
) {
    let Some(state) = lookup(routes, &req.path) else {
        let _ = stream.write_all(b"HTTP/1.1 404 Not Found\r\n\r\n");
        return;
    };
    if state.route.status != 200 {
        let _ = stream.write_all(
            format!("HTTP/1.1 {} X\r\nContent-Length: 0\r\n\r\n", state.route.status).as_bytes(),
        );
        return;
    }
    if state
        .fails_left
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |v| v.checked_sub(1))
        .is_ok()
    {
        let _ = stream.write_all(b"HTTP/1.1 500 Internal Server Error\r\nContent-Length: 0\r\n\r\n");
        return;
    }

    let body = &state.route.body;
    let total = body.len() as u64;
    let (status, content_range, slice) = match req.range.filter(|_| opts.support_ranges) {
        Some((start, end_incl)) => {
            let start = start.min(total) as usize;
            let end_excl = ((end_incl.min(total.saturating_sub(1))) + 1).min(total) as usize;
            if start >= end_excl {
                let _ = stream.write_all(b"HTTP/1.1 416 Range Not Satisfiable\r\n\r\n");
                return;
            }
            (
                "206 Partial Content",
                format!("Content-Range: bytes {}-{}/{}\r\n", start, end_excl - 1, total),
                &body[start..end_excl],
            )
        }
        None => ("200 OK", String::new(), &body[..]),
    };

    let accept = if opts.support_ranges {
        "Accept-Ranges: bytes\r\n"
    } else {
        ""
    };
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Length: {}\r\n{}{}\r\n",
        status,
        slice.len(),
        content_range,
        accept
    );
    if stream.write_all(response.as_bytes()).is_err() {
        return;
    }
    match state.route.chunk_delay {
        Some(delay) => {
            for part in slice.chunks(1024) {
                if stream.write_all(part).is_err() {
                    return;
                }
                let _ = stream.flush();
                thread::sleep(delay);
            }
        }
        None => {
            let _ = stream.write_all(slice);
        }
    }
}

fn handle_upload(
    stream: &mut TcpStream,
    routes: &Mutex<HashMap<String, Arc<RouteState>>>,
    uploads: &Mutex<Vec<Upload>>,
    req: &Request,
    already_read: &[u8],
) {
    if req.expect_continue {
        let _ = stream.write_all(b"HTTP/1.1 100 Continue\r\n\r\n");
    }

    let mut body = already_read.to_vec();
    if let Some(len) = req.content_length {
        let mut chunk = [0u8; 8192];
        while (body.len() as u64) < len {
            match stream.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => body.extend_from_slice(&chunk[..n]),
                Err(_) => break,
            }
        }
        body.truncate(len as usize);
    }

    uploads.lock().unwrap().push(Upload {
        path: req.path.clone(),
        caption: req.caption.clone(),
        body,
    });

    // A registered route sets the response status (rejection tests).
    let status = lookup(routes, &req.path)
        .map(|s| s.route.status)
        .unwrap_or(201);
    let reason = if status == 201 { "Created" } else { "X" };
    let _ = stream.write_all(
        format!("HTTP/1.1 {} {}\r\nContent-Length: 0\r\n\r\n", status, reason).as_bytes(),
    );
}

fn lookup(
    routes: &Mutex<HashMap<String, Arc<RouteState>>>,
    path: &str,
) -> Option<Arc<RouteState>> {
    routes.lock().unwrap().get(path).cloned()
}

fn find_header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

struct Request {
    method: String,
    path: String,
    range: Option<(u64, u64)>,
    content_length: Option<u64>,
    caption: Option<String>,
    expect_continue: bool,
}

impl Request {
    fn parse(head: &str) -> Option<Self> {
        let mut lines = head.lines();
        let request_line = lines.next()?;
        let mut parts = request_line.split_whitespace();
        let method = parts.next()?.to_string();
        let path = parts.next()?.split('?').next()?.to_string();

        let mut range = None;
        let mut content_length = None;
        let mut caption = None;
        let mut expect_continue = false;
        for line in lines {
            let Some((name, value)) = line.split_once(':') else {
                continue;
            };
            let name = name.trim().to_ascii_lowercase();
            let value = value.trim();
            match name.as_str() {
                "range" => {
                    if let Some(spec) = value.strip_prefix("bytes=") {
                        if let Some((a, b)) = spec.split_once('-') {
                            let start = a.trim().parse().unwrap_or(0);
                            let end = if b.trim().is_empty() {
                                u64::MAX
                            } else {
                                b.trim().parse().unwrap_or(0)
                            };
                            range = Some((start, end));
                        }
                    }
                }
                "content-length" => content_length = value.parse().ok(),
                "x-mgrab-caption" => caption = Some(value.to_string()),
                "expect" => expect_continue = value.eq_ignore_ascii_case("100-continue"),
                _ => {}
            }
        }
        Some(Self {
            method,
            path,
            range,
            content_length,
            caption,
            expect_continue,
        })
    }
}
