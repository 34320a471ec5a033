use std::{fmt, ops::BitOr, str::FromStr};

use crate::ParseError;

/// Request method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Head,
    Post,
    Put,
    Delete,
    Connect,
    Options,
    Trace,
    Patch,
}

impl Method {
    const ALL: [Method; 9] = [
        Method::Get,
        Method::Head,
        Method::Post,
        Method::Put,
        Method::Delete,
        Method::Connect,
        Method::Options,
        Method::Trace,
        Method::Patch,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Connect => "CONNECT",
            Method::Options => "OPTIONS",
            Method::Trace => "TRACE",
            Method::Patch => "PATCH",
        }
    }

    fn bit(self) -> u16 {
        1 << self as u16
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = ParseError;

    /// Method tokens are case-sensitive.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Method::ALL
            .into_iter()
            .find(|method| method.as_str() == value)
            .ok_or_else(|| ParseError::UnknownMethod(value.to_string()))
    }
}

impl BitOr for Method {
    type Output = Methods;

    fn bitor(self, rhs: Method) -> Methods {
        Methods::from(self) | rhs
    }
}

/// Set of methods, used as a service's method mask.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Methods(u16);

impl Methods {
    pub const NONE: Methods = Methods(0);

    pub fn contains(self, method: Method) -> bool {
        self.0 & method.bit() != 0
    }

    /// Iterate contained methods, in declaration order.
    pub fn iter(self) -> impl Iterator<Item = Method> {
        Method::ALL
            .into_iter()
            .filter(move |method| self.contains(*method))
    }
}

impl From<Method> for Methods {
    fn from(method: Method) -> Self {
        Methods(method.bit())
    }
}

impl BitOr for Methods {
    type Output = Methods;

    fn bitor(self, rhs: Methods) -> Methods {
        Methods(self.0 | rhs.0)
    }
}

impl BitOr<Method> for Methods {
    type Output = Methods;

    fn bitor(self, rhs: Method) -> Methods {
        Methods(self.0 | rhs.bit())
    }
}
