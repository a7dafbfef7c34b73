//! Core DNS resolution types and traits.

use std::{
    collections::HashMap, fmt, future::Future, io, net::SocketAddr, pin::Pin, sync::Arc,
};

/// A host name to resolve into socket addresses.
#[derive(Clone, Hash, Eq, PartialEq)]
pub struct Name {
    host: Box<str>,
}

impl Name {
    #[inline]
    pub fn new(host: impl Into<Box<str>>) -> Self {
        Self { host: host.into() }
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.host
    }
}

impl From<&str> for Name {
    fn from(value: &str) -> Self {
        Name::new(value)
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.host, f)
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.host, f)
    }
}

/// Alias for the `Future` type returned by a resolver.
///
/// An empty address list is reported as an `io::ErrorKind::NotFound` error,
/// never as `Ok(vec![])`.
pub type Resolving = Pin<Box<dyn Future<Output = io::Result<Vec<SocketAddr>>> + Send>>;

/// Trait for name resolution used by the socket establisher.
///
/// Returned addresses already carry `port`.
pub trait Resolve: Send + Sync {
    fn resolve(&self, name: Name, port: u16) -> Resolving;
}

impl<R: Resolve + ?Sized> Resolve for Arc<R> {
    fn resolve(&self, name: Name, port: u16) -> Resolving {
        (**self).resolve(name, port)
    }
}

/// Resolver answering from a fixed table, optionally falling back to another
/// resolver for names not in the table.
///
/// Table entries with port 0 take the requested port.
#[derive(Default)]
pub struct StaticResolver {
    table: HashMap<String, Vec<SocketAddr>>,
    fallback: Option<Arc<dyn Resolve>>,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `host` with `addrs`.
    pub fn with_entry(mut self, host: impl Into<String>, addrs: Vec<SocketAddr>) -> Self {
        self.table.insert(host.into(), addrs);
        self
    }

    /// Resolve unknown names through `fallback` instead of failing.
    pub fn with_fallback(mut self, fallback: Arc<dyn Resolve>) -> Self {
        self.fallback = Some(fallback);
        self
    }
}

impl Resolve for StaticResolver {
    fn resolve(&self, name: Name, port: u16) -> Resolving {
        if let Some(addrs) = self.table.get(name.as_str()) {
            let addrs: Vec<SocketAddr> = addrs
                .iter()
                .map(|addr| {
                    let mut addr = *addr;
                    if addr.port() == 0 {
                        addr.set_port(port);
                    }
                    addr
                })
                .collect();
            let result = if addrs.is_empty() {
                Err(not_found(&name))
            } else {
                Ok(addrs)
            };
            return Box::pin(std::future::ready(result));
        }
        match &self.fallback {
            Some(fallback) => fallback.resolve(name, port),
            None => Box::pin(std::future::ready(Err(not_found(&name)))),
        }
    }
}

impl fmt::Debug for StaticResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticResolver")
            .field("entries", &self.table.len())
            .field("fallback", &self.fallback.is_some())
            .finish()
    }
}

pub(crate) fn not_found(name: &Name) -> io::Error {
    io::Error::new(io::ErrorKind::NotFound, format!("no addresses for {}", name))
}
