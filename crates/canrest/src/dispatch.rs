use std::io::Write;

use anyhow::{anyhow, Error};
use canrest_http::{write_reply, Method, Methods, Reply, Request, Status};
use tracing::{event, Level};

use crate::{ServiceRequest, Services};

/// Content of the built-in reply to `GET /`.
pub const INDEX_CONTENT: &str = "This is the CANopen master REST service.\r\n";

/// Content of the reply when no service matches.
pub const NOT_FOUND_CONTENT: &str = "No service is implemented for the given path.\r\n";

const NOT_ALLOWED_CONTENT: &str = "The request method is not supported.\r\n";
const FAILED_CONTENT: &str = "The service failed to handle the request.\r\n";

/// Result of dispatching a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Outcome {
    /// A built-in reply was written.
    Replied,
    /// A service handler took over the connection.
    Servicing,
}

fn routed() -> Methods {
    Method::Get | Method::Put | Method::Options
}

pub(crate) fn dispatch_get(
    services: &Services,
    request: &Request,
    output: &mut dyn Write,
) -> Result<Outcome, Error> {
    if request.segments().is_empty() {
        write_reply(output, &Reply::text(Status::OK, INDEX_CONTENT))?;
        return Ok(Outcome::Replied);
    }

    route(services, request, None, output)
}

pub(crate) fn dispatch_content(
    services: &Services,
    request: &Request,
    body: &[u8],
    output: &mut dyn Write,
) -> Result<Outcome, Error> {
    route(services, request, Some(body), output)
}

pub(crate) fn dispatch_options(
    services: &Services,
    request: &Request,
    output: &mut dyn Write,
) -> Result<Outcome, Error> {
    let allow = match request.segments().first() {
        None => routed(),
        Some(segment) if segment == "*" => routed(),
        Some(_) => match services.find(request) {
            Some(service) => service.methods(),
            None => return not_found(output),
        },
    };

    write_reply(output, &Reply::options(allow))?;
    Ok(Outcome::Replied)
}

/// Reply to a method that is parsed, but never routed.
pub(crate) fn reject_method(request: &Request, output: &mut dyn Write) -> Result<Outcome, Error> {
    event!(Level::DEBUG, method = %request.method(), "method not routed");

    let reply = Reply::text(Status::METHOD_NOT_ALLOWED, NOT_ALLOWED_CONTENT).with_allow(routed());
    write_reply(output, &reply)?;

    Ok(Outcome::Replied)
}

fn route(
    services: &Services,
    request: &Request,
    body: Option<&[u8]>,
    output: &mut dyn Write,
) -> Result<Outcome, Error> {
    let Some(service) = services.find(request) else {
        return not_found(output);
    };

    event!(Level::DEBUG, path = service.path(), "calling service");
    let mut service_request = ServiceRequest::new(request, body, output);
    let result = service.call(&mut service_request);

    // Regardless of what the handler made of it, a failed write ends the connection
    if service_request.write_failed() {
        return Err(result.err().unwrap_or_else(|| anyhow!("failed to write reply")));
    }

    match result {
        Ok(()) if !service_request.has_replied() => {
            event!(Level::WARN, path = service.path(), "service returned without replying");
        }
        Ok(()) => {}
        Err(error) => {
            event!(Level::WARN, path = service.path(), "service failed: {:?}", error);

            if !service_request.has_replied() {
                let reply = Reply::text(Status::INTERNAL_SERVER_ERROR, FAILED_CONTENT);
                service_request.reply(&reply)?;
            }
        }
    }

    Ok(Outcome::Servicing)
}

fn not_found(output: &mut dyn Write) -> Result<Outcome, Error> {
    write_reply(output, &Reply::text(Status::NOT_FOUND, NOT_FOUND_CONTENT))?;
    Ok(Outcome::Replied)
}
