use std::{io::ErrorKind, ops::ControlFlow, time::Duration};

use anyhow::{Context as _, Error};
use mio::{Events, Interest, Poll, Token};
use thunderdome::{Arena, Index};
use tracing::{event, instrument, span, Level};

use crate::{
    handler::{AnyHandler, Ready},
    Handler,
};

/// Thread-local mio poll, together with the handlers owning its registered sources.
pub struct Reactor {
    poll: Poll,
    events: Events,
    handlers: Arena<HandlerEntry>,
}

struct HandlerEntry {
    name: &'static str,
    handler: Option<Box<dyn AnyHandler>>,
}

impl Reactor {
    pub fn new() -> Result<Self, Error> {
        let reactor = Self {
            poll: Poll::new()?,
            events: Events::with_capacity(128),
            handlers: Arena::new(),
        };
        Ok(reactor)
    }

    /// Register a handler's source, moving the handler into the reactor.
    ///
    /// The given `name` will be used in logging.
    /// If registration fails, the handler is dropped before returning.
    #[instrument("Reactor::register", level = "debug", skip_all)]
    pub fn register<H>(
        &mut self,
        name: &'static str,
        handler: H,
        interest: Interest,
    ) -> Result<HandlerId, Error>
    where
        H: Handler,
    {
        event!(Level::DEBUG, name, "registering handler");

        let entry = HandlerEntry {
            name,
            handler: Some(Box::new(handler)),
        };
        let index = self.handlers.insert(entry);

        let result = self.register_entry(index, interest);
        if let Err(error) = result {
            // Not registered with mio yet, so only the entry has to go
            self.handlers.remove(index);
            return Err(error);
        }

        Ok(HandlerId { index })
    }

    fn register_entry(&mut self, index: Index, interest: Interest) -> Result<(), Error> {
        let token = token_for(index)?;
        let handler = self
            .handlers
            .get_mut(index)
            .and_then(|entry| entry.handler.as_mut())
            .context("handler unavailable after insert")?;

        handler
            .register(self.poll.registry(), token, interest)
            .context("failed to register source")?;

        Ok(())
    }

    /// Deregister and drop a handler.
    ///
    /// Returns `false` if the handler was already removed.
    #[instrument("Reactor::remove", level = "debug", skip_all)]
    pub fn remove(&mut self, id: HandlerId) -> bool {
        let Some(entry) = self.handlers.remove(id.index) else {
            return false;
        };

        event!(Level::DEBUG, name = entry.name, "removing handler");

        // If the handler is currently borrowed, the wake returning it releases it instead
        if let Some(handler) = entry.handler {
            self.release(handler);
        }

        true
    }

    /// Number of currently registered handlers.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn contains(&self, id: HandlerId) -> bool {
        self.handlers.contains(id.index)
    }

    /// Wait for readiness, and deliver every received event to its handler.
    ///
    /// A `timeout` of `None` blocks until at least one event arrives.
    #[instrument("Reactor::poll", level = "trace", skip_all)]
    pub fn poll(&mut self, timeout: Option<Duration>) -> Result<(), Error> {
        match self.poll.poll(&mut self.events, timeout) {
            Ok(()) => {}
            // A signal interrupted the wait, the caller will poll again
            Err(error) if error.kind() == ErrorKind::Interrupted => return Ok(()),
            Err(error) => return Err(error).context("failed to poll"),
        }

        let wakes: Vec<(Token, Ready)> = self
            .events
            .iter()
            .map(|event| (event.token(), Ready::from_event(event)))
            .collect();

        for (token, ready) in wakes {
            self.wake(token, ready)?;
        }

        Ok(())
    }

    fn wake(&mut self, token: Token, ready: Ready) -> Result<(), Error> {
        let index = u64::try_from(token.0).ok().and_then(Index::from_bits);
        let Some(index) = index else {
            event!(Level::WARN, ?token, "wake for invalid token");
            return Ok(());
        };

        // Handlers removed earlier in the same batch can still have events pending
        let Some(entry) = self.handlers.get_mut(index) else {
            event!(Level::TRACE, "stale wake for removed handler");
            return Ok(());
        };
        let name = entry.name;
        let mut handler = entry.handler.take().context("handler unavailable")?;

        let span = span!(Level::INFO, "socket", name);
        let _entered = span.enter();

        event!(Level::TRACE, ?ready, "waking handler");
        let flow = match handler.ready(self, ready) {
            Ok(flow) => flow,
            Err(error) => {
                event!(Level::ERROR, "error in handler, removing:\n{:?}", error);
                ControlFlow::Break(())
            }
        };

        // Return the handler, unless it's done or got removed while borrowed
        match self.handlers.get_mut(index) {
            Some(entry) if flow.is_continue() => {
                entry.handler = Some(handler);
            }
            Some(_) => {
                event!(Level::DEBUG, "handler finished, removing");
                self.handlers.remove(index);
                self.release(handler);
            }
            None => self.release(handler),
        }

        Ok(())
    }

    /// Deregister the source, then drop the handler owning it.
    fn release(&self, mut handler: Box<dyn AnyHandler>) {
        if let Err(error) = handler.deregister(self.poll.registry()) {
            event!(Level::WARN, "failed to deregister source: {}", error);
        }

        drop(handler);
    }
}

impl Drop for Reactor {
    fn drop(&mut self) {
        if !self.handlers.is_empty() {
            event!(
                Level::DEBUG,
                count = self.handlers.len(),
                "releasing handlers on reactor drop"
            );
        }

        let handlers: Vec<_> = self
            .handlers
            .drain()
            .filter_map(|(_, entry)| entry.handler)
            .collect();

        for handler in handlers {
            self.release(handler);
        }
    }
}

/// Identifier of a handler registered with a reactor.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct HandlerId {
    index: Index,
}

fn token_for(index: Index) -> Result<Token, Error> {
    let bits = usize::try_from(index.to_bits()).context("handler index does not fit a token")?;
    Ok(Token(bits))
}
