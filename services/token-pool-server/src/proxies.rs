//! Outbound proxy list with round-robin rotation
//!
//! Proxy files hold one entry per line in `host:port:username:password`
//! form. Blank lines and `#` comments are skipped. The password is the
//! remainder of the line, so it may itself contain colons.

use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::{Error, Result};
use crate::secret::SecretString;

/// One authenticated outbound proxy.
#[derive(Debug, Clone)]
pub struct Proxy {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: SecretString,
}

impl Proxy {
    /// Parse a `host:port:username:password` line.
    pub fn parse(raw: &str) -> Result<Self> {
        let mut parts = raw.splitn(4, ':');
        let (Some(host), Some(port), Some(username), Some(password)) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(Error::Proxy(format!(
                "expected host:port:username:password, got {} field(s)",
                raw.split(':').count()
            )));
        };

        if host.is_empty() {
            return Err(Error::Proxy("proxy host is empty".into()));
        }
        let port = port
            .parse::<u16>()
            .map_err(|e| Error::Proxy(format!("invalid proxy port {port:?} for {host}: {e}")))?;

        Ok(Self {
            host: host.to_string(),
            port,
            username: username.to_string(),
            password: SecretString::new(password),
        })
    }

    /// Build the reqwest proxy routing all traffic through this entry.
    pub fn to_reqwest(&self) -> Result<reqwest::Proxy> {
        let proxy = reqwest::Proxy::all(format!("http://{}:{}", self.host, self.port))?;
        Ok(proxy.basic_auth(&self.username, self.password.expose()))
    }
}

impl fmt::Display for Proxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}@{}:{}", self.username, self.password, self.host, self.port)
    }
}

/// Parse a whole proxy file body. Errors name the offending line.
pub fn parse_list(contents: &str) -> Result<Vec<Proxy>> {
    let mut proxies = Vec::new();
    for (idx, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let proxy = Proxy::parse(line).map_err(|e| match e {
            Error::Proxy(msg) => Error::Proxy(format!("line {}: {msg}", idx + 1)),
            other => other,
        })?;
        proxies.push(proxy);
    }

    if proxies.is_empty() {
        return Err(Error::Proxy("proxy list is empty".into()));
    }
    Ok(proxies)
}

/// Load and parse a proxy file.
pub fn load_list(path: &Path) -> Result<Vec<Proxy>> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
        Error::Proxy(format!("failed to read proxy file {}: {e}", path.display()))
    })?;
    parse_list(&contents)
}

/// Lock-free round-robin over a fixed, non-empty set of items.
pub struct RoundRobin<T> {
    items: Vec<T>,
    next_index: AtomicUsize,
}

impl<T> RoundRobin<T> {
    /// Returns `None` for an empty item list.
    pub fn new(items: Vec<T>) -> Option<Self> {
        if items.is_empty() {
            return None;
        }
        Some(Self {
            items,
            next_index: AtomicUsize::new(0),
        })
    }

    /// The next item in rotation. Safe to call from many tasks at once.
    pub fn next(&self) -> &T {
        let idx = self.next_index.fetch_add(1, Ordering::Relaxed) % self.items.len();
        &self.items[idx]
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }
}
