use std::{
    io::{BufWriter, ErrorKind},
    net::{SocketAddr, TcpListener, TcpStream},
    ops::ControlFlow,
    rc::Rc,
};

use anyhow::{Context as _, Error};
use canrest_mio::{Handler, HandlerId, Reactor, Ready};
use mio::Interest;
use thiserror::Error;
use tracing::{event, instrument, Level};

use crate::{Client, Limits, ServerOptions, Services};

/// Information about a started listener.
#[derive(Debug, Clone, Copy)]
pub struct ListenerInfo {
    /// Reactor handler of the listener, remove it to stop accepting.
    pub id: HandlerId,
    pub local_addr: SocketAddr,
}

/// Start accepting connections on `options.addr`, serving them from `services`.
#[instrument("canrest::listen", skip_all)]
pub fn listen(
    reactor: &mut Reactor,
    services: Rc<Services>,
    options: &ServerOptions,
) -> Result<ListenerInfo, ListenError> {
    start_listener(reactor, services, options).map_err(|source| ListenError {
        addr: options.addr,
        source,
    })
}

fn start_listener(
    reactor: &mut Reactor,
    services: Rc<Services>,
    options: &ServerOptions,
) -> Result<ListenerInfo, Error> {
    let listener = canrest_mio::net::tcp::bind(options.addr, options.backlog)?;
    let local_addr = listener.local_addr()?;

    // Connections are accepted through the std handle, the mio one only drives readiness
    let source = listener.try_clone().context("failed to duplicate listener")?;
    let acceptor = Acceptor {
        listener,
        source: mio::net::TcpListener::from_std(source),
        services,
        limits: options.limits,
    };
    let id = reactor.register("rest-listener", acceptor, Interest::READABLE)?;

    event!(Level::INFO, addr = ?local_addr, "listening");

    Ok(ListenerInfo { id, local_addr })
}

struct Acceptor {
    listener: TcpListener,
    source: mio::net::TcpListener,
    services: Rc<Services>,
    limits: Limits,
}

impl Handler for Acceptor {
    type Source = mio::net::TcpListener;

    fn source(&mut self) -> &mut Self::Source {
        &mut self.source
    }

    fn ready(&mut self, reactor: &mut Reactor, ready: Ready) -> Result<ControlFlow<()>, Error> {
        if !ready.readable {
            return Ok(ControlFlow::Continue(()));
        }

        // Readiness is edge-triggered, so the whole backlog has to be taken now
        loop {
            let (stream, remote_addr) = match self.listener.accept() {
                Ok(value) => value,
                Err(error) if error.kind() == ErrorKind::WouldBlock => break,
                Err(error) if error.kind() == ErrorKind::Interrupted => continue,
                Err(error) => {
                    event!(Level::WARN, "failed to accept connection: {}", error);
                    break;
                }
            };

            event!(Level::DEBUG, ?remote_addr, "connection accepted");

            // Anything acquired so far is released on drop
            if let Err(error) = self.open(reactor, stream) {
                event!(Level::DEBUG, ?remote_addr, "abandoning connection: {:#}", error);
            }
        }

        Ok(ControlFlow::Continue(()))
    }
}

impl Acceptor {
    fn open(&self, reactor: &mut Reactor, stream: TcpStream) -> Result<(), Error> {
        stream.set_nonblocking(true)?;
        stream.set_nodelay(true)?;

        let output = stream.try_clone().context("failed to duplicate stream")?;
        let client = Client::new(self.services.clone(), self.limits, BufWriter::new(output));

        let connection = Connection {
            source: mio::net::TcpStream::from_std(stream),
            client,
        };
        reactor.register("rest-client", connection, Interest::READABLE)?;

        Ok(())
    }
}

/// A client registered with the reactor.
///
/// Dropping it closes the client and both of its stream handles.
struct Connection {
    source: mio::net::TcpStream,
    client: Client<BufWriter<TcpStream>>,
}

impl Handler for Connection {
    type Source = mio::net::TcpStream;

    fn source(&mut self) -> &mut Self::Source {
        &mut self.source
    }

    fn ready(&mut self, _reactor: &mut Reactor, ready: Ready) -> Result<ControlFlow<()>, Error> {
        if !ready.readable && !ready.closed {
            return Ok(ControlFlow::Continue(()));
        }

        Ok(self.client.process(&mut self.source))
    }
}

/// Failed to start listening.
#[derive(Error, Debug)]
#[error("failed to listen on {addr}")]
pub struct ListenError {
    addr: SocketAddr,
    #[source]
    source: Error,
}

impl ListenError {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }
}
