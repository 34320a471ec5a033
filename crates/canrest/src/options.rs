use std::{env, net::SocketAddr};

use anyhow::{Context as _, Error};

/// Listener and connection settings.
#[derive(Debug, Clone)]
pub struct ServerOptions {
    pub addr: SocketAddr,
    pub backlog: i32,
    pub limits: Limits,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            backlog: 16,
            limits: Limits::default(),
        }
    }
}

impl ServerOptions {
    /// Defaults, overridden by `CANREST_LISTEN` and `CANREST_BACKLOG` when set.
    pub fn from_env() -> Result<Self, Error> {
        let mut options = Self::default();

        if let Ok(value) = env::var("CANREST_LISTEN") {
            options.addr = value
                .parse()
                .with_context(|| format!("invalid CANREST_LISTEN {:?}", value))?;
        }

        if let Ok(value) = env::var("CANREST_BACKLOG") {
            options.backlog = value
                .parse()
                .with_context(|| format!("invalid CANREST_BACKLOG {:?}", value))?;
        }

        Ok(options)
    }
}

/// Per-connection size limits. Exceeding either closes the connection.
#[derive(Debug, Clone, Copy)]
pub struct Limits {
    /// Largest accepted request header, including the terminating empty line.
    pub max_header_size: usize,
    /// Largest accepted `Content-Length`.
    pub max_content_length: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_header_size: 8 * 1024,
            max_content_length: 1024 * 1024,
        }
    }
}
