use std::{cell::RefCell, rc::Rc};

use anyhow::Error;
use canrest::{Method, Reply, ServerOptions, Services, Status};
use tracing::{event, Level};

fn main() -> Result<(), Error> {
    devutils::init_logging()?;

    let options = ServerOptions::from_env()?;
    let services = Rc::new(given_services());

    canrest_mio::run_event_loop(|reactor| {
        let info = canrest::listen(reactor, services, &options)?;
        event!(Level::INFO, addr = ?info.local_addr, "rest_hello ready");
        Ok(())
    })
}

fn given_services() -> Services {
    let mut services = Services::new();

    services.register(Method::Get, "config", |request| {
        let content = match request.subpath().first() {
            Some(key) => format!("{} is not configured\r\n", key),
            None => "heartbeat=1000\r\n".to_string(),
        };
        request.reply(&Reply::text(Status::OK, &content))
    });

    let value = Rc::new(RefCell::new(String::from("0")));
    services.register(Method::Get | Method::Put, "value", move |request| {
        if let Some(body) = request.body() {
            let body = String::from_utf8_lossy(body).trim().to_string();
            event!(Level::INFO, value = %body, "storing value");
            *value.borrow_mut() = body;

            return request.reply(&Reply::text(Status::OK, "stored\r\n"));
        }

        let content = format!("{}\r\n", value.borrow());
        request.reply(&Reply::text(Status::OK, &content))
    });

    services
}
