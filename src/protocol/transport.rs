use std::io::{self, Read, Write};
use std::net::TcpStream;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use log::debug;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request failed with status {0}")]
    Status(u16),

    #[error("malformed http response: {0}")]
    Http(String),

    #[error("transport io error: {0}")]
    Io(#[from] io::Error),
}

/// One HTTP exchange: the status code and the raw response body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

/// Abstraction over whatever issues the HTTP POST carrying a query string.
///
/// One call is one independent request/response; implementations hold no
/// shared mutable state and may be invoked from any number of concurrent
/// callers.
pub trait HttpTransport {
    fn send(&self, url: &str, body: &str) -> Result<HttpResponse, TransportError>;
}

/// A plain-TCP transport speaking HTTP/1.0 with `Connection: close`, so the
/// response is everything up to EOF and chunked transfer never applies.
/// TLS is not handled here.
pub struct TcpTransport {
    host: String,
    port: u16,
    username: String,
    password: String,
}

impl TcpTransport {
    /// An empty username means guest access; no authorization header is
    /// sent.
    pub fn new(
        host: impl Into<String>,
        port: u16,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        TcpTransport {
            host: host.into(),
            port,
            username: username.into(),
            password: password.into(),
        }
    }
}

impl HttpTransport for TcpTransport {
    fn send(&self, url: &str, body: &str) -> Result<HttpResponse, TransportError> {
        let path = request_path(url);
        debug!("POST {}:{}{} ({} bytes)", self.host, self.port, path, body.len());

        let mut stream = TcpStream::connect((self.host.as_str(), self.port))?;
        let mut head = format!(
            "POST {path} HTTP/1.0\r\n\
             Host: {host}:{port}\r\n\
             Content-Type: application/x-www-form-urlencoded;charset=UTF-8\r\n\
             Content-Length: {length}\r\n\
             Connection: close\r\n",
            host = self.host,
            port = self.port,
            length = body.len(),
        );
        if !self.username.is_empty() {
            let credentials = BASE64.encode(format!("{}:{}", self.username, self.password));
            head.push_str("Authorization: Basic ");
            head.push_str(&credentials);
            head.push_str("\r\n");
        }
        head.push_str("\r\n");

        stream.write_all(head.as_bytes())?;
        stream.write_all(body.as_bytes())?;

        let mut raw = Vec::new();
        stream.read_to_end(&mut raw)?;
        parse_response(&raw)
    }
}

/// Path component of an absolute http URL. The connection itself always
/// uses the transport's own host and port.
fn request_path(url: &str) -> &str {
    let rest = url
        .strip_prefix("http://")
        .or_else(|| url.strip_prefix("https://"))
        .unwrap_or(url);
    match rest.find('/') {
        Some(idx) => &rest[idx..],
        None => "/",
    }
}

fn parse_response(raw: &[u8]) -> Result<HttpResponse, TransportError> {
    let split = find_subsequence(raw, b"\r\n\r\n")
        .ok_or_else(|| TransportError::Http("missing header terminator".to_string()))?;
    let head = String::from_utf8_lossy(&raw[..split]);
    let status_line = head.lines().next().unwrap_or_default();
    let status = status_line
        .split_whitespace()
        .nth(1)
        .and_then(|code| code.parse::<u16>().ok())
        .ok_or_else(|| TransportError::Http(format!("bad status line '{status_line}'")))?;

    let mut body = raw[split + 4..].to_vec();
    if let Some(length) = content_length(&head) {
        body.truncate(length);
    }
    Ok(HttpResponse { status, body })
}

fn content_length(head: &str) -> Option<usize> {
    head.lines().find_map(|line| {
        let (name, value) = line.split_once(':')?;
        if name.eq_ignore_ascii_case("content-length") {
            value.trim().parse().ok()
        } else {
            None
        }
    })
}

fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|window| window == needle)
}
