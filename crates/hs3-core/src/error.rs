// ── Core error types ──
//
// User-facing errors from hs3-core. Callers never see raw socket or JSON
// failures here; those are logged and degraded inside hs3-api. What is
// left are the outcomes a caller can act on: a device action that could
// not be issued, or a call the controller did not complete.

use thiserror::Error;

use hs3_api::DeviceRef;

use crate::model::ControlAction;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Device errors ────────────────────────────────────────────────
    #[error("Device {reference} has no {control} control value")]
    ControlValueMissing {
        reference: DeviceRef,
        control: ControlAction,
    },

    #[error("Device not found: {reference}")]
    DeviceNotFound { reference: DeviceRef },

    // ── Request errors ───────────────────────────────────────────────
    /// The control channel returned no data for this request.
    #[error("Controller did not complete request: {request}")]
    RequestFailed { request: &'static str },

    #[error("API error: {message}")]
    Api {
        message: String,
        /// HTTP status code (if applicable).
        status: Option<u16>,
    },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<hs3_api::Error> for CoreError {
    fn from(err: hs3_api::Error) -> Self {
        match err {
            hs3_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            hs3_api::Error::HttpStatus { status, body } => CoreError::Api {
                message: body,
                status: Some(status),
            },
            other => CoreError::Api {
                message: other.to_string(),
                status: None,
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn missing_control_message_names_the_action() {
        let err = CoreError::ControlValueMissing {
            reference: 7,
            control: ControlAction::Lock,
        };
        assert_eq!(err.to_string(), "Device 7 has no lock control value");
    }

    #[test]
    fn http_status_keeps_code() {
        let err = CoreError::from(hs3_api::Error::HttpStatus {
            status: 401,
            body: "Unauthorized".into(),
        });
        assert!(matches!(err, CoreError::Api { status: Some(401), .. }));
    }

    #[test]
    fn protocol_errors_have_no_status() {
        let err = CoreError::from(hs3_api::Error::MissingKey { key: "Devices" });
        assert!(matches!(err, CoreError::Api { status: None, .. }));
        assert!(err.to_string().contains("Devices"));
    }
}
