// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error hierarchy for the SOME/IP runtime.
//!
//! One flat enum, matched by hand for `Display`/`source()` rather than pulling
//! in a derive crate — keeps the dependency surface of this crate small and
//! the error text fully under our control.

use std::fmt;

/// All error conditions this crate can surface.
///
/// Variants map directly onto the error kinds a caller needs to branch on
/// (malformed input vs. fatal startup failure vs. a reclaimable timeout).
#[derive(Debug)]
pub enum Error {
    /// SOME/IP header shorter than 16 bytes, or otherwise unparsable.
    MalformedHeader,
    /// SD entries/options array could not be parsed (length mismatch, bad index).
    MalformedSdPacket(String),
    /// A TP segment violated alignment or offset/length invariants.
    MalformedTpSegment(String),
    /// A configuration alias could not be resolved; carries the offending path.
    ConfigResolution(String),
    /// Binding a socket required by an offered service failed.
    BindFailure(String),
    /// Any other socket I/O failure.
    SocketIo(std::io::Error),
    /// A synchronous wait (request or discovery) exceeded its deadline.
    Timeout,
    /// No handler registered for the target service at all.
    UnknownService,
    /// A handler is registered for the service but not for this method.
    UnknownMethod,
    /// `create_client` gave up waiting for the service to appear in the
    /// discovery cache.
    DiscoveryTimeout,
    /// The runtime was stopped while the caller was waiting.
    RuntimeStopped,
    /// The remote end replied with an Error message carrying this ReturnCode.
    RemoteError(crate::wire::header::ReturnCode),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::MalformedHeader => write!(f, "malformed SOME/IP header"),
            Error::MalformedSdPacket(msg) => write!(f, "malformed SD packet: {msg}"),
            Error::MalformedTpSegment(msg) => write!(f, "malformed TP segment: {msg}"),
            Error::ConfigResolution(path) => write!(f, "unresolved configuration reference: {path}"),
            Error::BindFailure(msg) => write!(f, "bind failure: {msg}"),
            Error::SocketIo(e) => write!(f, "socket I/O error: {e}"),
            Error::Timeout => write!(f, "request timed out"),
            Error::UnknownService => write!(f, "unknown service"),
            Error::UnknownMethod => write!(f, "unknown method"),
            Error::DiscoveryTimeout => write!(f, "discovery timed out"),
            Error::RuntimeStopped => write!(f, "runtime stopped"),
            Error::RemoteError(code) => write!(f, "remote returned {code:?}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::SocketIo(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::SocketIo(e)
    }
}

/// Convenience alias for API results using the crate's [`Error`] type.
pub type Result<T> = core::result::Result<T, Error>;

/// The SOME/IP `ReturnCode` that a given error maps onto when a `Request`
/// (not `RequestNoReturn`) needs an `Error` message sent back to the caller.
///
/// Returns `None` for errors that never surface as a wire return code
/// (timeouts, discovery, runtime shutdown — those are local-only).
#[must_use]
pub fn to_return_code(err: &Error) -> Option<crate::wire::header::ReturnCode> {
    use crate::wire::header::ReturnCode;
    match err {
        Error::UnknownService => Some(ReturnCode::UnknownService),
        Error::UnknownMethod => Some(ReturnCode::UnknownMethod),
        Error::MalformedHeader | Error::MalformedSdPacket(_) | Error::MalformedTpSegment(_) => {
            Some(ReturnCode::MalformedMessage)
        }
        _ => None,
    }
}
