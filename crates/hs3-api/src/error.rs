use thiserror::Error;

/// Top-level error type for the `hs3-api` crate.
///
/// Covers both wire surfaces: the HTTP JSON control API and the ASCII
/// event socket. The JSON client logs these and degrades to an absent
/// result; the ASCII listener turns them into a reconnect cycle. Neither
/// surface lets one escape to the caller as a fatal condition.
#[derive(Debug, Error)]
pub enum Error {
    // ── HTTP transport ──────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Request timed out.
    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    // ── JSON API ────────────────────────────────────────────────────
    /// Controller answered with a non-2xx status.
    #[error("HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    /// Body was not JSON, or did not match the expected record shape.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },

    /// A JSON object lacked the top-level key that carries the payload.
    #[error("Response is missing the `{key}` key")]
    MissingKey { key: &'static str },

    // ── ASCII socket ────────────────────────────────────────────────
    /// TCP connect to the ASCII port was refused or failed.
    #[error("ASCII connect failed: {0}")]
    AsciiConnect(std::io::Error),

    /// TCP connect to the ASCII port did not complete in time.
    #[error("ASCII connect timed out after {timeout_secs}s")]
    AsciiConnectTimeout { timeout_secs: u64 },

    /// Read or write failure on an established ASCII session.
    #[error("ASCII socket error: {0}")]
    AsciiIo(#[from] std::io::Error),

    /// Peer closed the socket (empty read).
    #[error("ASCII connection closed by peer")]
    ConnectionClosed,

    /// No login acknowledgement arrived in time.
    #[error("ASCII login reply timed out after {timeout_secs}s")]
    LoginTimeout { timeout_secs: u64 },

    /// No traffic was seen for a full keep-alive interval.
    #[error("ASCII keep-alive timed out")]
    PingTimeout,
}

impl Error {
    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Timeout { .. }
            | Self::AsciiConnect(_)
            | Self::AsciiConnectTimeout { .. }
            | Self::AsciiIo(_)
            | Self::ConnectionClosed
            | Self::LoginTimeout { .. }
            | Self::PingTimeout => true,
            _ => false,
        }
    }

    /// Returns `true` for any of the timeout flavours.
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout(),
            Self::Timeout { .. }
            | Self::AsciiConnectTimeout { .. }
            | Self::LoginTimeout { .. }
            | Self::PingTimeout => true,
            _ => false,
        }
    }

    /// Short label for the failure family, used as a structured log field.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Transport(e) if e.is_timeout() => "timeout",
            Self::Transport(_) | Self::InvalidUrl(_) | Self::AsciiConnect(_) | Self::AsciiIo(_) => {
                "transport"
            }
            Self::Timeout { .. } | Self::AsciiConnectTimeout { .. } => "timeout",
            Self::HttpStatus { .. } => "http-status",
            Self::Deserialization { .. } | Self::MissingKey { .. } => "decode",
            Self::ConnectionClosed | Self::LoginTimeout { .. } | Self::PingTimeout => "protocol",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn socket_failures_are_transient() {
        assert!(Error::ConnectionClosed.is_transient());
        assert!(Error::LoginTimeout { timeout_secs: 3 }.is_transient());
        assert!(Error::AsciiConnectTimeout { timeout_secs: 3 }.is_transient());
        assert!(
            !Error::HttpStatus {
                status: 500,
                body: String::new()
            }
            .is_transient()
        );
    }

    #[test]
    fn categories_match_failure_family() {
        assert_eq!(
            Error::HttpStatus {
                status: 401,
                body: String::new()
            }
            .category(),
            "http-status"
        );
        assert_eq!(
            Error::Deserialization {
                message: "expected value".into(),
                body: "<html>".into()
            }
            .category(),
            "decode"
        );
        assert_eq!(Error::Timeout { timeout_secs: 3 }.category(), "timeout");
        assert_eq!(Error::PingTimeout.category(), "protocol");
        assert!(Error::PingTimeout.is_timeout());
    }
}
