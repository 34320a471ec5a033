//! HTTP/1.1 message handling for canrest.
//!
//! Covers only what a close-after-reply REST front-end needs: finding the end of a request
//! header, parsing it, and writing replies.

mod detect;
mod method;
mod reply;
mod request;

pub use self::{
    detect::HeaderDetector,
    method::{Method, Methods},
    reply::{write_reply, Reply, Status},
    request::{HttpField, ParseError, Request},
};
