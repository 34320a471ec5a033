mod utils;

use anyhow::Error;
use canrest::{Method, Request, Services};
use tracing_test::traced_test;

use crate::utils::given_recording_service;

fn request(data: &[u8]) -> Result<Request, Error> {
    Ok(Request::parse(data)?)
}

#[test]
#[traced_test]
fn find_matches_method_and_first_segment() -> Result<(), Error> {
    let mut services = Services::new();
    given_recording_service(&mut services, Method::Get, "config", "ok\r\n");

    let found = services.find(&request(b"GET /CONFIG/deeper/path HTTP/1.1\r\n\r\n")?);
    assert_eq!(found.map(|s| s.path()), Some("config"));

    // Wrong method, wrong path, or no path at all
    assert!(services.find(&request(b"PUT /config HTTP/1.1\r\n\r\n")?).is_none());
    assert!(services.find(&request(b"GET /configs HTTP/1.1\r\n\r\n")?).is_none());
    assert!(services.find(&request(b"GET / HTTP/1.1\r\n\r\n")?).is_none());

    Ok(())
}

#[test]
#[traced_test]
fn options_always_included() -> Result<(), Error> {
    let mut services = Services::new();
    given_recording_service(&mut services, Method::Put, "value", "ok\r\n");

    let service = services
        .find(&request(b"OPTIONS /value HTTP/1.1\r\n\r\n")?)
        .expect("service not found");
    assert_eq!(service.methods(), Method::Put | Method::Options);

    Ok(())
}

#[test]
#[traced_test]
fn newest_first() -> Result<(), Error> {
    let mut services = Services::new();
    given_recording_service(&mut services, Method::Get, "a", "ok\r\n");
    given_recording_service(&mut services, Method::Get | Method::Put, "b", "ok\r\n");
    given_recording_service(&mut services, Method::Get, "a", "ok\r\n");

    let paths: Vec<_> = services.iter().map(|s| s.path()).collect();
    assert_eq!(paths, ["a", "b", "a"]);

    // Shadowed registration is never returned
    let first = services.iter().next().expect("no services");
    let found = services
        .find(&request(b"GET /a HTTP/1.1\r\n\r\n")?)
        .expect("service not found");
    assert!(std::ptr::eq(found, first));

    Ok(())
}

#[test]
#[traced_test]
fn clear_drains() -> Result<(), Error> {
    let mut services = Services::new();
    given_recording_service(&mut services, Method::Get, "a", "ok\r\n");
    assert_eq!(services.len(), 1);

    services.clear();

    assert!(services.is_empty());
    assert!(services.find(&request(b"GET /a HTTP/1.1\r\n\r\n")?).is_none());

    Ok(())
}
