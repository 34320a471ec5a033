use std::net::{SocketAddr, TcpListener};

use anyhow::{Context as _, Error};
use socket2::{Domain, Protocol, Socket, Type};
use tracing::{event, instrument, Level};

/// Open a non-blocking TCP listener on the given address.
///
/// Address reuse is enabled. Unlike `mio::net::TcpListener::bind`, the backlog is chosen by the
/// caller.
#[instrument("tcp::bind", skip_all)]
pub fn bind(addr: SocketAddr, backlog: i32) -> Result<TcpListener, Error> {
    event!(Level::DEBUG, ?addr, backlog, "binding");

    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))
        .context("failed to create socket")?;
    socket.set_reuse_address(true)?;
    socket.bind(&addr.into()).context("failed to bind")?;
    socket.listen(backlog).context("failed to listen")?;
    socket.set_nonblocking(true)?;

    Ok(socket.into())
}
