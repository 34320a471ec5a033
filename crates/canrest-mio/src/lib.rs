//! Single-threaded mio reactor.
//!
//! Sources are registered together with the handler that owns them. The reactor delivers
//! readiness to each handler, and is the only place a handler is ever released.

mod event_loop;
mod handler;
pub mod net;
mod reactor;

pub use self::{
    event_loop::run_event_loop,
    handler::{Handler, Ready},
    reactor::{HandlerId, Reactor},
};
