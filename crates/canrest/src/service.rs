use std::{collections::VecDeque, fmt, io::Write};

use anyhow::{bail, Error};
use canrest_http::{write_reply, Method, Methods, Reply, Request};
use tracing::{event, Level};

type HandlerFn = dyn Fn(&mut ServiceRequest) -> Result<(), Error>;

/// Registry of services, newest first.
///
/// Built once at startup, then shared read-only with every connection.
#[derive(Default)]
pub struct Services {
    services: VecDeque<Service>,
}

impl Services {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for requests with one of `methods` on `path`.
    ///
    /// `OPTIONS` is always added to `methods`. Only the first path segment of a request is
    /// matched against `path`, ignoring ASCII case. Registering the same method and path again
    /// shadows the earlier registration.
    ///
    /// The handler runs on the event loop thread, it must reply once and return without
    /// blocking.
    pub fn register<M, F>(&mut self, methods: M, path: impl Into<String>, handler: F)
    where
        M: Into<Methods>,
        F: Fn(&mut ServiceRequest) -> Result<(), Error> + 'static,
    {
        let service = Service {
            methods: methods.into() | Method::Options,
            path: path.into(),
            handler: Box::new(handler),
        };
        event!(Level::DEBUG, path = %service.path, methods = ?service.methods, "registering service");

        self.services.push_front(service);
    }

    /// Find the most recently registered service matching the request.
    pub fn find(&self, request: &Request) -> Option<&Service> {
        self.services.iter().find(|service| service.is_match(request))
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// Iterate services in lookup order.
    pub fn iter(&self) -> impl Iterator<Item = &Service> {
        self.services.iter()
    }

    /// Remove all services.
    pub fn clear(&mut self) {
        event!(Level::DEBUG, count = self.services.len(), "clearing services");
        self.services.clear();
    }
}

/// A registered handler, with the methods and path it serves.
pub struct Service {
    methods: Methods,
    path: String,
    handler: Box<HandlerFn>,
}

impl Service {
    /// Methods served, including the implicit `OPTIONS`.
    pub fn methods(&self) -> Methods {
        self.methods
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    fn is_match(&self, request: &Request) -> bool {
        let Some(segment) = request.segments().first() else {
            return false;
        };

        self.methods.contains(request.method()) && segment.eq_ignore_ascii_case(&self.path)
    }

    pub(crate) fn call(&self, request: &mut ServiceRequest) -> Result<(), Error> {
        (self.handler)(request)
    }
}

impl fmt::Debug for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Service")
            .field("methods", &self.methods)
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

/// A routed request, handed to a service handler.
pub struct ServiceRequest<'a> {
    request: &'a Request,
    body: Option<&'a [u8]>,
    output: &'a mut dyn Write,
    replied: bool,
    write_failed: bool,
}

impl<'a> ServiceRequest<'a> {
    pub(crate) fn new(
        request: &'a Request,
        body: Option<&'a [u8]>,
        output: &'a mut dyn Write,
    ) -> Self {
        Self {
            request,
            body,
            output,
            replied: false,
            write_failed: false,
        }
    }

    pub fn request(&self) -> &Request {
        self.request
    }

    /// Path segments after the one the service was matched on.
    pub fn subpath(&self) -> &[String] {
        self.request.segments().get(1..).unwrap_or_default()
    }

    /// Body of a `PUT` request, exactly `Content-Length` bytes long. `None` for `GET`.
    pub fn body(&self) -> Option<&[u8]> {
        self.body
    }

    /// Write the reply. A request can only be replied to once.
    pub fn reply(&mut self, reply: &Reply) -> Result<(), Error> {
        if self.replied {
            bail!("request already replied to");
        }

        // Even a failed write counts, part of the reply may be out already
        self.replied = true;
        if let Err(error) = write_reply(&mut *self.output, reply) {
            self.write_failed = true;
            return Err(Error::new(error).context("failed to write reply"));
        }

        Ok(())
    }

    pub fn has_replied(&self) -> bool {
        self.replied
    }

    /// Writing the reply failed, the connection can't be used anymore.
    pub(crate) fn write_failed(&self) -> bool {
        self.write_failed
    }
}
