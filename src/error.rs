//! The [`Error`] type used throughout this crate.
//!
//! Modeled after `libafl::Error`: a flat, hand-rolled enum with named
//! constructor functions instead of `thiserror`/`anyhow`, so call sites read
//! as `Error::illegal_argument("...")` rather than `anyhow!("...")`.

use std::fmt::{self, Display, Formatter};
use std::io;

/// Any error produced by this crate.
#[derive(Debug)]
pub enum Error {
    /// A caller-supplied argument was invalid.
    IllegalArgument(String),
    /// The broker (or a component of it) was asked to do something that
    /// contradicts its current state.
    IllegalState(String),
    /// A lookup (alert, binary, client) found nothing.
    NotFound(String),
    /// A seed, alert, or binary key was looked up and not present.
    KeyNotFound(String),
    /// An operation required at least one element and found none.
    Empty(String),
    /// (De)serialization of a persisted artifact failed.
    Serialize(String),
    /// A filesystem operation failed.
    File(String),
}

impl Error {
    pub fn illegal_argument<S: Into<String>>(msg: S) -> Self {
        Error::IllegalArgument(msg.into())
    }

    pub fn illegal_state<S: Into<String>>(msg: S) -> Self {
        Error::IllegalState(msg.into())
    }

    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        Error::NotFound(msg.into())
    }

    pub fn key_not_found<S: Into<String>>(msg: S) -> Self {
        Error::KeyNotFound(msg.into())
    }

    pub fn empty<S: Into<String>>(msg: S) -> Self {
        Error::Empty(msg.into())
    }

    pub fn serialize<S: Into<String>>(msg: S) -> Self {
        Error::Serialize(msg.into())
    }

    pub fn file<S: Into<String>>(msg: S) -> Self {
        Error::File(msg.into())
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Error::IllegalArgument(s) => write!(f, "illegal argument: {s}"),
            Error::IllegalState(s) => write!(f, "illegal state: {s}"),
            Error::NotFound(s) => write!(f, "not found: {s}"),
            Error::KeyNotFound(s) => write!(f, "key not found: {s}"),
            Error::Empty(s) => write!(f, "empty: {s}"),
            Error::Serialize(s) => write!(f, "serialization error: {s}"),
            Error::File(s) => write!(f, "file error: {s}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::File(e.to_string())
    }
}

impl From<csv::Error> for Error {
    fn from(e: csv::Error) -> Self {
        Error::Serialize(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialize(e.to_string())
    }
}
