#![allow(dead_code)]

use std::{
    cell::RefCell,
    io::{self, ErrorKind, Read, Write},
    rc::Rc,
};

use anyhow::Error;
use canrest::{Client, Limits, Methods, Reply, Services, Status};

/// Non-blocking input, handing out bytes as they are pushed.
#[derive(Default)]
pub struct ScriptedInput {
    data: Vec<u8>,
    position: usize,
    closed: bool,
    max_read: Option<usize>,
}

impl ScriptedInput {
    /// Limit how many bytes a single read returns.
    pub fn with_max_read(max_read: usize) -> Self {
        Self {
            max_read: Some(max_read),
            ..Self::default()
        }
    }

    pub fn push(&mut self, data: &[u8]) {
        self.data.extend_from_slice(data);
    }

    pub fn close(&mut self) {
        self.closed = true;
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.position
    }
}

impl Read for ScriptedInput {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining = &self.data[self.position..];

        if remaining.is_empty() {
            if self.closed {
                return Ok(0);
            }
            return Err(ErrorKind::WouldBlock.into());
        }

        let mut count = remaining.len().min(buf.len());
        if let Some(max_read) = self.max_read {
            count = count.min(max_read);
        }

        buf[..count].copy_from_slice(&remaining[..count]);
        self.position += count;

        Ok(count)
    }
}

/// Non-blocking output, accepting `capacity` bytes before it would block.
pub struct StalledOutput {
    pub data: Vec<u8>,
    capacity: usize,
}

impl StalledOutput {
    pub fn new(capacity: usize) -> Self {
        Self {
            data: Vec::new(),
            capacity,
        }
    }
}

impl Write for StalledOutput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let room = self.capacity - self.data.len();
        if room == 0 {
            return Err(ErrorKind::WouldBlock.into());
        }

        let count = room.min(buf.len());
        self.data.extend_from_slice(&buf[..count]);

        Ok(count)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Calls received by a recording service.
#[derive(Clone, Default)]
pub struct Calls {
    /// Body of every call, `None` for calls without a body.
    pub bodies: Rc<RefCell<Vec<Option<Vec<u8>>>>>,
    pub subpaths: Rc<RefCell<Vec<Vec<String>>>>,
}

impl Calls {
    pub fn count(&self) -> usize {
        self.bodies.borrow().len()
    }
}

/// Register a service recording its calls, replying with `content`.
pub fn given_recording_service(
    services: &mut Services,
    methods: impl Into<Methods>,
    path: &str,
    content: &'static str,
) -> Calls {
    let calls = Calls::default();

    let recorded = calls.clone();
    services.register(methods, path, move |request| {
        let body = request.body().map(<[u8]>::to_vec);
        recorded.bodies.borrow_mut().push(body);
        recorded
            .subpaths
            .borrow_mut()
            .push(request.subpath().to_vec());

        request.reply(&Reply::text(Status::OK, content))
    });

    calls
}

pub fn given_client(services: Services) -> Client<Vec<u8>> {
    given_client_with(services, Limits::default())
}

pub fn given_client_with(services: Services, limits: Limits) -> Client<Vec<u8>> {
    Client::new(Rc::new(services), limits, Vec::new())
}

pub fn given_client_writing_to<W: Write>(services: Services, output: W) -> Client<W> {
    Client::new(Rc::new(services), Limits::default(), output)
}

/// Deliver `chunks`, one readiness event each, returning if the client stayed open.
pub fn when_received(client: &mut Client<Vec<u8>>, chunks: &[&[u8]]) -> bool {
    let mut input = ScriptedInput::default();

    for chunk in chunks {
        input.push(chunk);
        if client.process(&mut input).is_break() {
            return false;
        }
    }

    true
}

/// A reply as read back from the wire.
#[derive(Debug)]
pub struct WireReply {
    pub status: String,
    pub fields: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl WireReply {
    pub fn parse(data: &[u8]) -> Result<Self, Error> {
        let text = std::str::from_utf8(data)?;
        let (header, body) = text
            .split_once("\r\n\r\n")
            .ok_or_else(|| anyhow::anyhow!("reply header not terminated"))?;

        let mut lines = header.split("\r\n");
        let status = lines
            .next()
            .and_then(|line| line.strip_prefix("HTTP/1.1 "))
            .ok_or_else(|| anyhow::anyhow!("malformed status line"))?
            .to_string();

        let mut fields = Vec::new();
        for line in lines {
            let (key, value) = line
                .split_once(": ")
                .ok_or_else(|| anyhow::anyhow!("malformed field {:?}", line))?;
            fields.push((key.to_string(), value.to_string()));
        }

        let reply = WireReply {
            status,
            fields,
            body: body.as_bytes().to_vec(),
        };
        Ok(reply)
    }

    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }
}

pub fn then_reply(client: &Client<Vec<u8>>) -> Result<WireReply, Error> {
    WireReply::parse(client.output())
}
