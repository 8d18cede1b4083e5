//! The seam between the gate and the chat server that embeds it.

use secrecy::SecretString;
use std::fmt;

/// Server notice mask used for connection notices.
pub const CONNECT_SNOMASK: char = 'c';

/// Stable identifier the host assigns to a live connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl From<u64> for ConnectionId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Settings of the connect class the connection initially matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionClass {
    pub googleauth: bool,
}

impl Default for ConnectionClass {
    fn default() -> Self {
        Self { googleauth: true }
    }
}

/// What the gate gets to see of a registering connection.
#[derive(Debug, Clone)]
pub struct Connection {
    pub id: ConnectionId,
    pub nick: String,
    pub ident: String,
    pub host: String,
    pub password: SecretString,
    pub class: ConnectionClass,
}

impl Connection {
    #[must_use]
    pub fn new(id: ConnectionId, nick: impl Into<String>, password: SecretString) -> Self {
        Self {
            id,
            nick: nick.into(),
            ident: String::new(),
            host: String::new(),
            password,
            class: ConnectionClass::default(),
        }
    }

    #[must_use]
    pub fn with_ident(mut self, ident: impl Into<String>) -> Self {
        self.ident = ident.into();
        self
    }

    #[must_use]
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    #[must_use]
    pub fn with_class(mut self, class: ConnectionClass) -> Self {
        self.class = class;
        self
    }

    /// `nick!ident@host`, for notices and logs.
    #[must_use]
    pub fn mask(&self) -> String {
        format!("{}!{}@{}", self.nick, self.ident, self.host)
    }
}

/// Tri-state answer handed back to the host's hook dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookResult {
    /// Continue with the host's normal flow.
    Passthrough,
    /// Hold or refuse; for readiness checks this means "not ready".
    Deny,
    Allow,
}

/// Operations the gate invokes on the host.
pub trait Host: Send + Sync + 'static {
    /// Disconnect `id`, showing `reason` to the user.
    fn quit(&self, id: ConnectionId, reason: &str);

    /// Send an operator notice to everyone subscribed to `snomask`.
    fn notice(&self, snomask: char, message: &str);
}
