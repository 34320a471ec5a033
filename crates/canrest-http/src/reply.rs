use std::{
    fmt,
    io::{self, Write},
    iter,
};

use bytes::{BufMut, BytesMut};

use crate::{Method, Methods};

const SERVER: &str = "CANopen master REST service";

/// Status code and reason phrase of a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Status {
    code: u16,
    reason: &'static str,
}

impl Status {
    pub const OK: Status = Status::new(200, "OK");
    pub const NO_CONTENT: Status = Status::new(204, "No Content");
    pub const BAD_REQUEST: Status = Status::new(400, "Bad Request");
    pub const NOT_FOUND: Status = Status::new(404, "Not Found");
    pub const METHOD_NOT_ALLOWED: Status = Status::new(405, "Method Not Allowed");
    pub const INTERNAL_SERVER_ERROR: Status = Status::new(500, "Internal Server Error");

    pub const fn new(code: u16, reason: &'static str) -> Self {
        Self { code, reason }
    }

    pub fn code(self) -> u16 {
        self.code
    }

    pub fn reason(self) -> &'static str {
        self.reason
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code, self.reason)
    }
}

/// A single reply, written once and followed by closing the connection.
#[derive(Debug, Clone, Copy)]
pub struct Reply<'a> {
    pub status: Status,
    pub content_type: Option<&'a str>,
    pub content: Option<&'a [u8]>,
    /// Length of the content, `None` if not known up front.
    ///
    /// An unknown length is announced as a chunked transfer encoding. Producing the chunk
    /// framing is left to whoever writes the content.
    pub content_length: Option<usize>,
    /// Methods to list in an `Allow` field.
    pub allow: Option<Methods>,
}

impl<'a> Reply<'a> {
    pub fn new(status: Status, content_type: &'a str, content: &'a [u8]) -> Self {
        Self {
            status,
            content_type: Some(content_type),
            content: Some(content),
            content_length: Some(content.len()),
            allow: None,
        }
    }

    /// Plain text reply.
    pub fn text(status: Status, content: &'a str) -> Self {
        Self::new(status, "text/plain", content.as_bytes())
    }

    /// Header-only reply, with the content to be written separately.
    pub fn unknown_length(status: Status, content_type: &'a str) -> Self {
        Self {
            status,
            content_type: Some(content_type),
            content: None,
            content_length: None,
            allow: None,
        }
    }

    /// Empty `200 OK` reply to an `OPTIONS` request.
    pub fn options(allow: Methods) -> Self {
        Self {
            status: Status::OK,
            content_type: None,
            content: None,
            content_length: Some(0),
            allow: Some(allow),
        }
    }

    pub fn with_allow(mut self, allow: Methods) -> Self {
        self.allow = Some(allow);
        self
    }
}

/// Write a reply, flushing after the header and again after the content.
pub fn write_reply<W>(output: &mut W, reply: &Reply) -> io::Result<()>
where
    W: Write + ?Sized,
{
    let mut data = BytesMut::new();

    data.put(format!("HTTP/1.1 {}\r\n", reply.status).as_bytes());
    put_field(&mut data, "Server", SERVER);
    put_field(&mut data, "Connection", "close");

    if let Some(content_type) = reply.content_type {
        put_field(&mut data, "Content-Type", content_type);
    }

    match reply.content_length {
        Some(length) => put_field(&mut data, "Content-Length", &length.to_string()),
        None => put_field(&mut data, "Transfer-Encoding", "chunked"),
    }

    put_field(&mut data, "Access-Control-Allow-Origin", "*");
    put_field(&mut data, "Access-Control-Allow-Methods", "GET, PUT");

    if let Some(allow) = reply.allow {
        put_field(&mut data, "Allow", &allow_value(allow));
    }

    data.put(&b"\r\n"[..]);

    output.write_all(&data)?;
    output.flush()?;

    if let Some(content) = reply.content {
        output.write_all(content)?;
        output.flush()?;
    }

    Ok(())
}

fn put_field(data: &mut BytesMut, key: &str, value: &str) {
    data.put(key.as_bytes());
    data.put(&b": "[..]);
    data.put(value.as_bytes());
    data.put(&b"\r\n"[..]);
}

/// Only routable methods are listed, `OPTIONS` always is.
fn allow_value(allow: Methods) -> String {
    allow
        .iter()
        .filter(|method| matches!(method, Method::Get | Method::Put))
        .chain(iter::once(Method::Options))
        .map(Method::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}
