// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

//! Error types for the probe engine.
//!
//! All fatal conditions surface as a [`ProbeError`]; there is no automatic
//! retry inside the engine — retry, if desired, is the caller's decision.
//! Cancellation is deliberately *not* an error: it is a distinct session
//! outcome carrying partial statistics (see
//! [`ProbeOutcome`](crate::session::ProbeOutcome)). Malformed datagrams are
//! never errors either; they are silently dropped by the codec.

use std::fmt;
use std::io;

/// Fatal errors that end a probe session.
#[derive(Debug)]
pub enum ProbeError {
    /// No sync reply arrived within the bound during the initial burst.
    SyncTimeout,
    /// A gap in the data stream exceeded the receive timeout.
    ReceiveTimeout,
    /// Socket-level failure (bind, send, receive).
    Transport(io::Error),
    /// Invalid session configuration.
    Config(ConfigError),
}

/// Configuration errors reported at build time.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ConfigError {
    /// No server address provided.
    NoServer,
    /// `packet_count` must be at least 1.
    ZeroPacketCount,
    /// `tick_interval_ms` must be at least 1.
    ZeroTickInterval,
}

impl fmt::Display for ProbeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeError::SyncTimeout => {
                write!(f, "no sync reply from server during initial synchronization")
            }
            ProbeError::ReceiveTimeout => write!(f, "timed out waiting for data packets"),
            ProbeError::Transport(e) => write!(f, "transport error: {e}"),
            ProbeError::Config(e) => write!(f, "config error: {e}"),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::NoServer => write!(f, "a server address is required"),
            ConfigError::ZeroPacketCount => write!(f, "packet count must be at least 1"),
            ConfigError::ZeroTickInterval => write!(f, "tick interval must be at least 1 ms"),
        }
    }
}

impl std::error::Error for ProbeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ProbeError::Transport(e) => Some(e),
            ProbeError::Config(e) => Some(e),
            _ => None,
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<io::Error> for ProbeError {
    fn from(err: io::Error) -> ProbeError {
        ProbeError::Transport(err)
    }
}

impl From<ConfigError> for ProbeError {
    fn from(err: ConfigError) -> ProbeError {
        ProbeError::Config(err)
    }
}

impl From<ProbeError> for io::Error {
    fn from(err: ProbeError) -> io::Error {
        let kind = match &err {
            ProbeError::SyncTimeout | ProbeError::ReceiveTimeout => io::ErrorKind::TimedOut,
            ProbeError::Transport(e) => e.kind(),
            ProbeError::Config(_) => io::ErrorKind::InvalidInput,
        };
        // Preserve the original io::Error directly for the Transport variant.
        if let ProbeError::Transport(e) = err {
            return e;
        }
        io::Error::new(kind, err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert!(ProbeError::SyncTimeout.to_string().contains("sync reply"));
        assert!(ProbeError::ReceiveTimeout.to_string().contains("timed out"));
        assert_eq!(
            ConfigError::ZeroPacketCount.to_string(),
            "packet count must be at least 1"
        );
    }

    #[test]
    fn test_io_error_kinds() {
        let cases: Vec<(ProbeError, io::ErrorKind)> = vec![
            (ProbeError::SyncTimeout, io::ErrorKind::TimedOut),
            (ProbeError::ReceiveTimeout, io::ErrorKind::TimedOut),
            (
                ProbeError::Config(ConfigError::NoServer),
                io::ErrorKind::InvalidInput,
            ),
        ];
        for (err, expected_kind) in cases {
            let io_err: io::Error = err.into();
            assert_eq!(io_err.kind(), expected_kind);
        }
    }

    #[test]
    fn test_transport_passthrough() {
        let orig = io::Error::new(io::ErrorKind::ConnectionReset, "reset");
        let kind = orig.kind();
        let err = ProbeError::Transport(orig);
        let io_err: io::Error = err.into();
        assert_eq!(io_err.kind(), kind);
        assert_eq!(io_err.to_string(), "reset");
    }

    #[test]
    fn test_from_io_error() {
        let orig = io::Error::new(io::ErrorKind::BrokenPipe, "broken");
        let err: ProbeError = orig.into();
        assert!(matches!(err, ProbeError::Transport(_)));
    }

    #[test]
    fn test_config_error_source() {
        let err = ProbeError::Config(ConfigError::ZeroTickInterval);
        assert!(std::error::Error::source(&err).is_some());
    }
}
