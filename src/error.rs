//! Unified error types for the shutter controller.
//!
//! A single `Error` enum that every subsystem converts into, keeping the
//! worker's and the event loop's error handling uniform.  Nothing in the
//! decision engine is fatal: these errors end up as log lines and a
//! suppressed actuation, never as a crash.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Every fallible operation in the crate funnels into this type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The pub/sub transport refused a subscribe or publish.
    Transport(TransportError),
    /// Configuration is invalid or could not be loaded.
    Config(ConfigError),
    /// A rule evaluation could not run to completion.
    Rule(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(e) => write!(f, "transport: {e}"),
            Self::Config(e) => write!(f, "config: {e}"),
            Self::Rule(msg) => write!(f, "rule: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Transport errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// No broker connection is available.
    NotConnected,
    /// The client did not accept the subscribe request.
    SubscribeRejected(String),
    /// The client did not accept the publish request.
    PublishRejected(String),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotConnected => write!(f, "not connected"),
            Self::SubscribeRejected(topic) => write!(f, "subscribe to '{topic}' rejected"),
            Self::PublishRejected(topic) => write!(f, "publish to '{topic}' rejected"),
        }
    }
}

impl std::error::Error for TransportError {}

impl From<TransportError> for Error {
    fn from(e: TransportError) -> Self {
        Self::Transport(e)
    }
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The configuration document could not be parsed.
    Parse(String),
    /// A field failed range validation.  The string names the field.
    Validation(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse(msg) => write!(f, "parse error: {msg}"),
            Self::Validation(field) => write!(f, "invalid value for {field}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
