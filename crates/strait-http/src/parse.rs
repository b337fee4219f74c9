//! The HTTP/2.5 text grammar: CRLF request/response lines, `name: value`
//! headers, and a body gated on content-length.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use crate::types::{Request, Response, StatusCode, HTTP_VERSION};

const SEPARATOR: &str = "\r\n";

/// Failures while interpreting the text grammar. The sender of a
/// malformed request gets a 400; everything else is logged and dropped.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("no CRLF CRLF head terminator found")]
    MissingCrlf,

    #[error("head is not valid UTF-8")]
    NonUtf8Head,

    #[error("malformed request line: {0}")]
    BadRequestLine(String),

    #[error("malformed status line: {0}")]
    BadStatusLine(String),

    #[error("unsupported protocol version: {0}")]
    UnsupportedVersion(String),

    #[error("unknown status code: {0}")]
    BadStatusCode(u16),

    #[error("malformed header line: {0}")]
    BadHeader(String),
}

fn find_head_end(raw: &[u8]) -> Option<usize> {
    raw.windows(4).position(|w| w == b"\r\n\r\n")
}

/// RFC 7230 token characters, the only ones allowed in header names.
fn is_token(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "!#$%&'*+-.^_`|~".contains(c))
}

fn parse_headers<'a>(
    lines: impl Iterator<Item = &'a str>,
) -> Result<HashMap<String, String>, ParseError> {
    let mut headers = HashMap::new();
    for line in lines {
        let colon = line
            .find(':')
            .ok_or_else(|| ParseError::BadHeader(line.to_string()))?;
        // One space is required after the colon, and none may sit
        // immediately before it.
        let rest = &line[colon + 1..];
        if !rest.starts_with(' ') {
            return Err(ParseError::BadHeader(line.to_string()));
        }
        if line[..colon].ends_with(' ') {
            return Err(ParseError::BadHeader(line.to_string()));
        }

        // Names and values are case-folded and trimmed; both must be
        // non-empty.
        let name = line[..colon].trim().to_ascii_lowercase();
        let value = rest[1..].trim().to_ascii_lowercase();
        if name.is_empty() || value.is_empty() || !is_token(&name) {
            return Err(ParseError::BadHeader(line.to_string()));
        }

        // A repeated name folds into one comma-separated entry.
        match headers.entry(name) {
            Entry::Occupied(mut entry) => {
                let folded: &mut String = entry.get_mut();
                folded.push_str(", ");
                folded.push_str(&value);
            }
            Entry::Vacant(entry) => {
                entry.insert(value);
            }
        }
    }
    Ok(headers)
}

fn parse_body(
    raw: &[u8],
    body_start: usize,
    headers: &HashMap<String, String>,
) -> Result<Vec<u8>, ParseError> {
    match headers.get("content-length") {
        None => Ok(Vec::new()),
        Some(value) => {
            let length: usize = value
                .parse()
                .map_err(|_| ParseError::BadHeader(format!("content-length: {value}")))?;
            // Lenient on short buffers: yield the bytes that are present,
            // up to the declared length.
            let end = raw.len().min(body_start.saturating_add(length));
            Ok(raw.get(body_start..end).unwrap_or_default().to_vec())
        }
    }
}

// ── Requests ─────────────────────────────────────────────────────────────────

/// Parse a request from raw bytes. The version must be exactly HTTP/2.5.
pub fn parse_request(raw: &[u8]) -> Result<Request, ParseError> {
    let head_end = find_head_end(raw).ok_or(ParseError::MissingCrlf)?;
    let head = std::str::from_utf8(&raw[..head_end]).map_err(|_| ParseError::NonUtf8Head)?;
    let mut lines = head.split(SEPARATOR);

    let request_line = lines.next().ok_or(ParseError::MissingCrlf)?;
    let mut parts = request_line.splitn(3, ' ');
    let method = parts
        .next()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ParseError::BadRequestLine(request_line.to_string()))?;
    let uri = parts
        .next()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ParseError::BadRequestLine(request_line.to_string()))?;
    let version = parts
        .next()
        .ok_or_else(|| ParseError::BadRequestLine(request_line.to_string()))?;
    if version != HTTP_VERSION {
        return Err(ParseError::UnsupportedVersion(version.to_string()));
    }

    let headers = parse_headers(lines)?;
    let body = parse_body(raw, head_end + 4, &headers)?;

    Ok(Request {
        method: method.to_string(),
        uri: uri.to_string(),
        version: version.to_string(),
        headers,
        body,
    })
}

/// Serialize a request to its wire form.
pub fn serialize_request(request: &Request) -> Vec<u8> {
    let mut out = format!(
        "{} {} {}{SEPARATOR}",
        request.method, request.uri, request.version
    )
    .into_bytes();
    for (name, value) in &request.headers {
        out.extend_from_slice(format!("{name}: {value}{SEPARATOR}").as_bytes());
    }
    out.extend_from_slice(SEPARATOR.as_bytes());
    out.extend_from_slice(&request.body);
    out
}

// ── Responses ────────────────────────────────────────────────────────────────

/// Parse a response from raw bytes.
pub fn parse_response(raw: &[u8]) -> Result<Response, ParseError> {
    let head_end = find_head_end(raw).ok_or(ParseError::MissingCrlf)?;
    let head = std::str::from_utf8(&raw[..head_end]).map_err(|_| ParseError::NonUtf8Head)?;
    let mut lines = head.split(SEPARATOR);

    let status_line = lines.next().ok_or(ParseError::MissingCrlf)?;
    let mut parts = status_line.splitn(3, ' ');
    let version = parts
        .next()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ParseError::BadStatusLine(status_line.to_string()))?;
    if version != HTTP_VERSION {
        return Err(ParseError::UnsupportedVersion(version.to_string()));
    }
    let code: u16 = parts
        .next()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| ParseError::BadStatusLine(status_line.to_string()))?;
    let status = StatusCode::from_code(code).ok_or(ParseError::BadStatusCode(code))?;
    let reason = parts.next().unwrap_or_default().to_string();

    let headers = parse_headers(lines)?;
    let body = parse_body(raw, head_end + 4, &headers)?;

    Ok(Response {
        version: version.to_string(),
        status,
        reason,
        headers,
        body,
    })
}

/// Serialize a response to its wire form.
pub fn serialize_response(response: &Response) -> Vec<u8> {
    let mut out = format!(
        "{} {} {}{SEPARATOR}",
        response.version,
        response.status.code(),
        response.reason
    )
    .into_bytes();
    for (name, value) in &response.headers {
        out.extend_from_slice(format!("{name}: {value}{SEPARATOR}").as_bytes());
    }
    out.extend_from_slice(SEPARATOR.as_bytes());
    out.extend_from_slice(&response.body);
    out
}

// ── Tests ────────────────────────────────────────────────────────────────────
