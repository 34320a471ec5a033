//! Minimal single-threaded REST front-end.
//!
//! Services are registered up front into a `Services` registry, which `listen` then shares with
//! every accepted connection. Each connection is driven by a `Client` state machine on a
//! `canrest_mio::Reactor`, and closed after a single reply.
//!
//! ```no_run
//! use std::rc::Rc;
//!
//! use canrest::{Method, Reply, ServerOptions, Services, Status};
//!
//! # fn main() -> Result<(), anyhow::Error> {
//! let mut services = Services::new();
//! services.register(Method::Get, "config", |request| {
//!     request.reply(&Reply::text(Status::OK, "node 1\r\n"))
//! });
//! let services = Rc::new(services);
//!
//! canrest_mio::run_event_loop(|reactor| {
//!     canrest::listen(reactor, services, &ServerOptions::default())?;
//!     Ok(())
//! })
//! # }
//! ```

mod client;
mod dispatch;
mod listener;
mod options;
mod service;

pub use canrest_http::{Method, Methods, Reply, Request, Status};

pub use self::{
    client::{Client, State},
    dispatch::{INDEX_CONTENT, NOT_FOUND_CONTENT},
    listener::{listen, ListenError, ListenerInfo},
    options::{Limits, ServerOptions},
    service::{Service, ServiceRequest, Services},
};
