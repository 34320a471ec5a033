use std::str;

use bytes::{Buf, Bytes};
use thiserror::Error;
use tracing::{event, Level};

use crate::{detect::find_terminator, Method};

/// A single `key: value` header field.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct HttpField {
    pub key: Bytes,
    pub value: Bytes,
}

/// Parsed request header.
///
/// The request only describes where the header and body are, the bytes themselves stay in the
/// buffer the request was parsed from. Use `header` and `body` to view them.
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    target: String,
    segments: Vec<String>,
    query: Option<String>,
    fields: Vec<HttpField>,
    header_length: usize,
    content_length: usize,
}

impl Request {
    /// Parse the request header at the start of `buffer`.
    ///
    /// Fails with `ParseError::Incomplete` if the buffer doesn't contain a full header yet.
    pub fn parse(buffer: &[u8]) -> Result<Self, ParseError> {
        let header_length = find_terminator(buffer).ok_or(ParseError::Incomplete)?;

        // Keep the newline of the last line, but not the empty line ending the header
        let data = Bytes::copy_from_slice(&buffer[..header_length - 2]);
        let mut lines = split_lines(data).into_iter();

        let line = lines.next().ok_or(ParseError::InvalidRequestLine)?;
        let line = str::from_utf8(&line).map_err(|_| ParseError::Encoding)?;
        let (method, target) = parse_request_line(line)?;

        let fields = lines.map(parse_field).collect::<Result<Vec<_>, _>>()?;

        let mut request = Request {
            method,
            target: target.to_string(),
            segments: Vec::new(),
            query: None,
            fields,
            header_length,
            content_length: 0,
        };
        request.parse_target();

        if request.field("transfer-encoding").is_some() {
            return Err(ParseError::TransferEncoding);
        }

        if let Some(value) = request.field("content-length") {
            request.content_length = parse_content_length(value)?;
        }

        event!(
            Level::TRACE,
            method = %request.method,
            target = %request.target,
            header_length,
            content_length = request.content_length,
            "parsed request header"
        );

        Ok(request)
    }

    fn parse_target(&mut self) {
        let mut target = self.target.as_str();

        // Absolute-form, only the path matters for routing
        for scheme in ["http://", "https://"] {
            if let Some(rest) = target.strip_prefix(scheme) {
                target = rest.find('/').map_or("", |start| &rest[start..]);
            }
        }

        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path, Some(query.to_string())),
            None => (target, None),
        };

        self.segments = path
            .split('/')
            .filter(|segment| !segment.is_empty())
            .map(str::to_string)
            .collect();
        self.query = query;
    }

    pub fn method(&self) -> Method {
        self.method
    }

    /// Raw request target, as given in the request line.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Non-empty path segments, in order.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    pub fn fields(&self) -> &[HttpField] {
        &self.fields
    }

    /// Value of the first field named `key`, compared ASCII case-insensitively.
    pub fn field(&self, key: &str) -> Option<&[u8]> {
        self.fields
            .iter()
            .find(|field| field.key.eq_ignore_ascii_case(key.as_bytes()))
            .map(|field| &field.value[..])
    }

    /// Length of the header, including the terminating empty line.
    pub fn header_length(&self) -> usize {
        self.header_length
    }

    /// Body length declared by `Content-Length`, zero if absent.
    pub fn content_length(&self) -> usize {
        self.content_length
    }

    /// Length of the full message, header and body. Saturates for absurd content lengths.
    pub fn full_length(&self) -> usize {
        self.header_length.saturating_add(self.content_length)
    }

    /// View the header region of the buffer this request was parsed from.
    pub fn header<'b>(&self, buffer: &'b [u8]) -> Option<&'b [u8]> {
        buffer.get(..self.header_length)
    }

    /// View the body region of the buffer this request was parsed from.
    ///
    /// Returns `None` until the buffer holds the full body. Bytes past the declared length are
    /// not part of the body.
    pub fn body<'b>(&self, buffer: &'b [u8]) -> Option<&'b [u8]> {
        buffer.get(self.header_length..self.full_length())
    }
}

fn split_lines(mut data: Bytes) -> Vec<Bytes> {
    let mut lines = Vec::new();

    while let Some(end) = data.iter().position(|byte| *byte == b'\n') {
        let mut line = data.split_to(end);
        data.advance(1);

        // A bare newline is handled the same as CRLF
        if line.last() == Some(&b'\r') {
            line.truncate(line.len() - 1);
        }

        lines.push(line);
    }

    lines
}

fn parse_request_line(line: &str) -> Result<(Method, &str), ParseError> {
    let mut parts = line.split(' ');
    let (Some(method), Some(target), Some(version), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(ParseError::InvalidRequestLine);
    };

    if target.is_empty() {
        return Err(ParseError::InvalidRequestLine);
    }

    if !version.starts_with("HTTP/1.") {
        return Err(ParseError::UnsupportedVersion(version.to_string()));
    }

    Ok((method.parse()?, target))
}

fn parse_field(line: Bytes) -> Result<HttpField, ParseError> {
    let split = line
        .iter()
        .position(|byte| *byte == b':')
        .ok_or(ParseError::InvalidField)?;

    let mut value = line.clone();
    let key = value.split_to(split);
    value.advance(1);

    if key.is_empty() || key.iter().any(u8::is_ascii_whitespace) {
        return Err(ParseError::InvalidField);
    }

    Ok(HttpField {
        key,
        value: trim(value),
    })
}

fn trim(mut value: Bytes) -> Bytes {
    let is_space = |byte: &u8| *byte == b' ' || *byte == b'\t';

    let start = value.iter().take_while(|byte| is_space(*byte)).count();
    value.advance(start);
    let end = value.len() - value.iter().rev().take_while(|byte| is_space(*byte)).count();
    value.truncate(end);

    value
}

fn parse_content_length(value: &[u8]) -> Result<usize, ParseError> {
    str::from_utf8(value)
        .ok()
        .and_then(|value| value.parse().ok())
        .ok_or(ParseError::InvalidContentLength)
}

/// Failed to parse a request header.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("header terminator not found")]
    Incomplete,
    #[error("request line is not valid utf-8")]
    Encoding,
    #[error("malformed request line")]
    InvalidRequestLine,
    #[error("unknown method {0:?}")]
    UnknownMethod(String),
    #[error("unsupported protocol version {0:?}")]
    UnsupportedVersion(String),
    #[error("malformed header field")]
    InvalidField,
    #[error("invalid content length")]
    InvalidContentLength,
    #[error("transfer encodings are not supported")]
    TransferEncoding,
}
