use std::{io, ops::ControlFlow};

use anyhow::Error;
use mio::event::Source;

use crate::Reactor;

/// Readiness handler, owning the mio source it is registered for.
///
/// Once inserted into a `Reactor`, the reactor is the sole owner of the handler. The handler is
/// removed when `ready` breaks or fails, or when the reactor itself is dropped. Removal always
/// deregisters the source first and then drops the handler, so teardown logic belongs in `Drop`.
pub trait Handler: 'static {
    /// The mio source readiness is delivered for.
    type Source: Source;

    /// Access the source, used for registration and deregistration.
    fn source(&mut self) -> &mut Self::Source;

    /// Handle a readiness event.
    ///
    /// Returning `Err` is treated the same as `ControlFlow::Break`, but is logged as an error.
    /// You should *always* prefer this over panicking, as a panic takes down every connection
    /// sharing the reactor.
    fn ready(&mut self, reactor: &mut Reactor, ready: Ready) -> Result<ControlFlow<()>, Error>;
}

/// Readiness state delivered with a wake.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Ready {
    pub readable: bool,
    pub writable: bool,
    /// The peer closed its side, or the source reported an error.
    pub closed: bool,
}

impl Ready {
    pub(crate) fn from_event(event: &mio::event::Event) -> Self {
        Self {
            readable: event.is_readable(),
            writable: event.is_writable(),
            closed: event.is_read_closed() || event.is_error(),
        }
    }
}

/// Type-erased handler, as stored by the reactor.
pub(crate) trait AnyHandler {
    fn register(
        &mut self,
        registry: &mio::Registry,
        token: mio::Token,
        interest: mio::Interest,
    ) -> io::Result<()>;

    fn deregister(&mut self, registry: &mio::Registry) -> io::Result<()>;

    fn ready(&mut self, reactor: &mut Reactor, ready: Ready) -> Result<ControlFlow<()>, Error>;
}

impl<H> AnyHandler for H
where
    H: Handler,
{
    fn register(
        &mut self,
        registry: &mio::Registry,
        token: mio::Token,
        interest: mio::Interest,
    ) -> io::Result<()> {
        registry.register(self.source(), token, interest)
    }

    fn deregister(&mut self, registry: &mio::Registry) -> io::Result<()> {
        registry.deregister(self.source())
    }

    fn ready(&mut self, reactor: &mut Reactor, ready: Ready) -> Result<ControlFlow<()>, Error> {
        Handler::ready(self, reactor, ready)
    }
}
