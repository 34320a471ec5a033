use std::{
    cell::Cell,
    net::SocketAddr,
    ops::ControlFlow,
    rc::Rc,
    time::Duration,
};

use anyhow::{bail, Error};
use canrest_mio::{net::check_io, Handler, HandlerId, Reactor, Ready};
use mio::Interest;

pub fn given_mock_listener(reactor: &mut Reactor, fail: bool) -> Result<MockInfo, Error> {
    let listener = canrest_mio::net::tcp::bind("127.0.0.1:0".parse()?, 16)?;
    let addr = listener.local_addr()?;

    let instance = MockListener {
        source: mio::net::TcpListener::from_std(listener),
        fail,
        wakes: Rc::default(),
        dropped: Rc::default(),
    };
    let wakes = instance.wakes.clone();
    let dropped = instance.dropped.clone();

    let id = reactor.register("mock-listener", instance, Interest::READABLE)?;

    let info = MockInfo {
        id,
        addr,
        wakes,
        dropped,
    };
    Ok(info)
}

pub fn when_polled_until(
    reactor: &mut Reactor,
    mut done: impl FnMut(&Reactor) -> bool,
) -> Result<(), Error> {
    for _ in 0..100 {
        if done(reactor) {
            return Ok(());
        }

        reactor.poll(Some(Duration::from_millis(10)))?;
    }

    bail!("condition not reached while polling")
}

pub fn then_handler_dropped(info: &MockInfo) {
    assert!(info.dropped.get(), "handler not dropped");
}

pub struct MockInfo {
    pub id: HandlerId,
    pub addr: SocketAddr,
    pub wakes: Rc<Cell<usize>>,
    pub dropped: Rc<Cell<bool>>,
}

struct MockListener {
    source: mio::net::TcpListener,
    fail: bool,
    wakes: Rc<Cell<usize>>,
    dropped: Rc<Cell<bool>>,
}

impl Handler for MockListener {
    type Source = mio::net::TcpListener;

    fn source(&mut self) -> &mut Self::Source {
        &mut self.source
    }

    fn ready(&mut self, _reactor: &mut Reactor, ready: Ready) -> Result<ControlFlow<()>, Error> {
        self.wakes.set(self.wakes.get() + 1);

        if self.fail {
            bail!("mock intentional fail");
        }

        assert!(ready.readable);
        while check_io(self.source.accept())?.is_some() {}

        // Stop after handling the first wake
        Ok(ControlFlow::Break(()))
    }
}

impl Drop for MockListener {
    fn drop(&mut self) {
        self.dropped.set(true);
    }
}

pub fn connect(addr: SocketAddr) -> Result<std::net::TcpStream, Error> {
    let stream = std::net::TcpStream::connect(addr)?;
    Ok(stream)
}

