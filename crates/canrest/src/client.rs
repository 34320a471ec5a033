use std::{
    io::{ErrorKind, Read, Write},
    ops::ControlFlow,
    rc::Rc,
};

use anyhow::{bail, Context as _, Error};
use canrest_http::{HeaderDetector, Method, Request};
use canrest_mio::net::check_io;
use tracing::{event, Level};
use uuid::Uuid;

use crate::{
    dispatch::{self, Outcome},
    Limits, Services,
};

/// Connection state of a client.
///
/// States only move forward, in declaration order, with `Disconnected` reachable from any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Buffering the request header.
    Start,
    /// Buffering the body of a `PUT` request.
    Content,
    /// A service handler took over, further input is discarded.
    Servicing,
    /// A built-in reply was sent, further input closes the connection.
    Done,
    Disconnected,
}

/// Per-connection request state machine.
///
/// Every call to `process` handles one readiness event. The client reads everything currently
/// available from the given input, and dispatches the request exactly once as soon as enough
/// of it has arrived. Replies are written to the owned output.
pub struct Client<W>
where
    W: Write,
{
    id: Uuid,
    state: State,
    services: Rc<Services>,
    limits: Limits,

    buffer: Vec<u8>,
    detector: HeaderDetector,
    request: Option<Request>,
    output: W,
}

impl<W> Client<W>
where
    W: Write,
{
    pub fn new(services: Rc<Services>, limits: Limits, output: W) -> Self {
        let id = Uuid::new_v4();
        event!(Level::DEBUG, %id, "client opened");

        Self {
            id,
            state: State::Start,
            services,
            limits,

            buffer: Vec::new(),
            detector: HeaderDetector::default(),
            request: None,
            output,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// The parsed request, once the header has been received.
    pub fn request(&self) -> Option<&Request> {
        self.request.as_ref()
    }

    /// Request bytes kept so far, up to the point of dispatch.
    ///
    /// Never grows past the header plus the largest accepted body.
    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    pub fn output(&self) -> &W {
        &self.output
    }

    /// Handle a readiness event.
    ///
    /// Returns `ControlFlow::Break` when the connection should be torn down.
    pub fn process<R>(&mut self, input: &mut R) -> ControlFlow<()>
    where
        R: Read,
    {
        let result = match self.state {
            State::Start => self.process_start(input),
            State::Content => self.process_content(input),
            State::Servicing => self.process_junk(input),
            State::Done => {
                event!(Level::DEBUG, id = %self.id, "activity after reply");
                Ok(ControlFlow::Break(()))
            }
            State::Disconnected => Ok(ControlFlow::Break(())),
        };

        match result {
            Ok(flow) => flow,
            Err(error) => {
                event!(Level::DEBUG, id = %self.id, "closing connection: {:#}", error);
                ControlFlow::Break(())
            }
        }
    }

    /// Mark the client disconnected, and flush its output.
    pub fn close(&mut self) {
        if self.state == State::Disconnected {
            return;
        }

        event!(Level::DEBUG, id = %self.id, state = ?self.state, "client closed");
        self.state = State::Disconnected;

        if let Err(error) = self.output.flush() {
            event!(Level::DEBUG, id = %self.id, "failed to flush output: {}", error);
        }
    }

    fn process_start<R>(&mut self, input: &mut R) -> Result<ControlFlow<()>, Error>
    where
        R: Read,
    {
        let limits = self.limits;
        let buffer = &mut self.buffer;
        let detector = &mut self.detector;
        let mut header_length = None;
        let mut oversized = false;

        let stream = read_available(input, |data| {
            if oversized {
                return;
            }

            buffer.extend_from_slice(data);
            if header_length.is_none() {
                header_length = detector.check(buffer.as_slice());
            }

            // Only the header and the largest accepted body are kept
            let bound = match header_length {
                Some(length) => length.saturating_add(limits.max_content_length),
                None => limits.max_header_size,
            };
            if buffer.len() > bound {
                buffer.truncate(bound);
                oversized = header_length.is_none();
            }
        })?;

        if stream == Stream::Closed {
            event!(Level::DEBUG, id = %self.id, "peer closed before request");
            return Ok(ControlFlow::Break(()));
        }

        if oversized {
            bail!("header exceeds {} bytes", self.limits.max_header_size);
        }

        let Some(header_length) = header_length else {
            return Ok(ControlFlow::Continue(()));
        };

        if header_length > self.limits.max_header_size {
            bail!("header exceeds {} bytes", self.limits.max_header_size);
        }

        let request = Request::parse(&self.buffer).context("failed to parse request header")?;
        event!(
            Level::DEBUG,
            id = %self.id,
            method = %request.method(),
            target = request.target(),
            "received request"
        );

        let outcome = match request.method() {
            Method::Get => dispatch::dispatch_get(&self.services, &request, &mut self.output)?,
            Method::Put => {
                if request.content_length() > self.limits.max_content_length {
                    bail!(
                        "content length {} exceeds {} bytes",
                        request.content_length(),
                        self.limits.max_content_length
                    );
                }

                // The body may have arrived together with the header
                self.request = Some(request);
                self.state = State::Content;
                return self.dispatch_content();
            }
            Method::Options => {
                dispatch::dispatch_options(&self.services, &request, &mut self.output)?
            }
            Method::Head
            | Method::Post
            | Method::Delete
            | Method::Connect
            | Method::Trace
            | Method::Patch => dispatch::reject_method(&request, &mut self.output)?,
        };

        self.request = Some(request);
        self.finish(outcome);

        Ok(ControlFlow::Continue(()))
    }

    fn process_content<R>(&mut self, input: &mut R) -> Result<ControlFlow<()>, Error>
    where
        R: Read,
    {
        let full_length = self.request.as_ref().map_or(0, Request::full_length);
        let buffer = &mut self.buffer;
        let mut junk = 0;

        let stream = read_available(input, |data| {
            // Anything past the body is never looked at
            let take = full_length.saturating_sub(buffer.len()).min(data.len());
            buffer.extend_from_slice(&data[..take]);
            junk += data.len() - take;
        })?;

        if junk > 0 {
            event!(Level::TRACE, id = %self.id, junk, "discarded input past content");
        }

        if stream == Stream::Closed {
            event!(Level::DEBUG, id = %self.id, "peer closed before full content");
            return Ok(ControlFlow::Break(()));
        }

        self.dispatch_content()
    }

    fn dispatch_content(&mut self) -> Result<ControlFlow<()>, Error> {
        let request = self
            .request
            .as_ref()
            .context("receiving content without a request")?;

        // Nothing happens until the full body is there
        let Some(body) = request.body(&self.buffer) else {
            return Ok(ControlFlow::Continue(()));
        };

        let outcome = dispatch::dispatch_content(&self.services, request, body, &mut self.output)?;
        self.finish(outcome);

        Ok(ControlFlow::Continue(()))
    }

    fn process_junk<R>(&mut self, input: &mut R) -> Result<ControlFlow<()>, Error>
    where
        R: Read,
    {
        let mut junk = 0;
        let stream = read_available(input, |data| junk += data.len())?;

        event!(Level::TRACE, id = %self.id, junk, "discarded input");

        match stream {
            Stream::Open => Ok(ControlFlow::Continue(())),
            Stream::Closed => Ok(ControlFlow::Break(())),
        }
    }

    fn finish(&mut self, outcome: Outcome) {
        self.state = match outcome {
            Outcome::Replied => State::Done,
            Outcome::Servicing => State::Servicing,
        };
    }
}

impl<W> Drop for Client<W>
where
    W: Write,
{
    fn drop(&mut self) {
        self.close();
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Stream {
    /// Everything available was read, more may arrive later.
    Open,
    /// The peer closed the stream.
    Closed,
}

/// Read until the input would block or is closed, handing every chunk to `consume`.
fn read_available<R, F>(input: &mut R, mut consume: F) -> Result<Stream, Error>
where
    R: Read,
    F: FnMut(&[u8]),
{
    let mut chunk = [0; 1024];

    loop {
        let result = input.read(&mut chunk);

        if let Err(error) = &result {
            if error.kind() == ErrorKind::Interrupted {
                continue;
            }
        }

        match check_io(result).context("failed to read from peer")? {
            Some(0) => return Ok(Stream::Closed),
            Some(count) => consume(&chunk[..count]),
            None => return Ok(Stream::Open),
        }
    }
}
