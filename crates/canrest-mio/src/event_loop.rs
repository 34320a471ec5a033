use anyhow::Error;
use tracing::{event, instrument, Level};

use crate::Reactor;

/// Create a reactor, initialize it, and run it until polling fails.
///
/// Handler errors never end the loop, they only remove the failing handler.
#[instrument("mio-event-loop", skip_all)]
pub fn run_event_loop<I>(init: I) -> Result<(), Error>
where
    I: FnOnce(&mut Reactor) -> Result<(), Error>,
{
    let mut reactor = Reactor::new()?;

    init(&mut reactor)?;

    event!(Level::DEBUG, handlers = reactor.len(), "starting event loop");
    loop {
        if let Err(error) = reactor.poll(None) {
            event!(Level::ERROR, "error in event loop: {:?}", error);
            return Err(error);
        }
    }
}
