use invent_core::ServiceError;
use invent_remote::RemoteError;
use thiserror::Error;

/// Generic text shown for failures the technician cannot act on.
pub const TRY_AGAIN_LATER: &str = "Something went wrong, please try again later.";

/// Errors surfaced by the installation workflow.
#[derive(Error, Debug)]
pub enum InstallError {
    /// No device serial matches the scanned value.
    #[error("device with serial number {0} not found")]
    DeviceNotFound(String),

    /// The scan did not produce a usable serial token.
    #[error("scan produced no usable serial number")]
    InvalidScan,

    /// One of two dependent writes committed and could not be undone.
    #[error("partial write: {completed} committed but {failed} failed: {reason}")]
    PartialWrite {
        completed: String,
        failed: String,
        reason: String,
    },

    #[error("no free port left at installation {0}")]
    CapacityExhausted(String),

    /// The store rejected the port because another customer holds it.
    #[error("port {port} at installation {installation_code} is already taken")]
    PortConflict {
        installation_code: String,
        port: u32,
    },

    #[error("port {port} is outside 1..={capacity} at installation {installation_code}")]
    PortOutOfRange {
        installation_code: String,
        port: u32,
        capacity: u32,
    },

    #[error("{kind} {id} not found")]
    RecordNotFound { kind: &'static str, id: String },

    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Remote(#[from] RemoteError),
}

impl InstallError {
    /// Text for the technician's dialog.
    pub fn user_message(&self) -> String {
        match self {
            InstallError::DeviceNotFound(sn) => format!(
                "Your product {} was not found, please check your Barcode/QR Code or Tag ID.",
                sn
            ),
            InstallError::InvalidScan => {
                "Nothing readable was scanned, please scan again.".to_string()
            }
            InstallError::CapacityExhausted(_) => {
                "There are no free ports left on this installation.".to_string()
            }
            InstallError::PortConflict { port, .. } => {
                format!("Port {} was just taken, please pick another port.", port)
            }
            InstallError::PortOutOfRange { capacity, .. } => {
                format!("Please pick a port between 1 and {}.", capacity)
            }
            InstallError::Validation(msg) => msg.clone(),
            InstallError::PartialWrite { .. }
            | InstallError::RecordNotFound { .. }
            | InstallError::Remote(_) => TRY_AGAIN_LATER.to_string(),
        }
    }
}

impl From<InstallError> for ServiceError {
    fn from(err: InstallError) -> Self {
        let msg = err.to_string();
        match err {
            InstallError::DeviceNotFound(_) | InstallError::RecordNotFound { .. } => {
                ServiceError::NotFound(msg)
            }
            InstallError::InvalidScan
            | InstallError::PortOutOfRange { .. }
            | InstallError::Validation(_) => ServiceError::Validation(msg),
            InstallError::PortConflict { .. } | InstallError::CapacityExhausted(_) => {
                ServiceError::Conflict(msg)
            }
            InstallError::PartialWrite { .. } => ServiceError::PartialWrite(msg),
            InstallError::Remote(_) => ServiceError::Internal(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_tells_technician_to_rescan() {
        let msg = InstallError::DeviceNotFound("SN-404".into()).user_message();
        assert!(msg.contains("SN-404"));
        assert!(msg.contains("Barcode"));
    }

    #[test]
    fn remote_failures_are_generic() {
        let err = InstallError::Remote(RemoteError::Decode("bad json".into()));
        assert_eq!(err.user_message(), TRY_AGAIN_LATER);
        let partial = InstallError::PartialWrite {
            completed: "link".into(),
            failed: "stamp".into(),
            reason: "timeout".into(),
        };
        assert_eq!(partial.user_message(), TRY_AGAIN_LATER);
    }


    #[test]
    fn service_error_mapping() {
        let e: ServiceError = InstallError::DeviceNotFound("x".into()).into();
        assert_eq!(e.error_code(), "NOT_FOUND");
        let e: ServiceError = InstallError::PortConflict { installation_code: "S".into(), port: 2 }.into();
        assert_eq!(e.error_code(), "ALREADY_EXISTS");
        let e: ServiceError = InstallError::PortOutOfRange {
            installation_code: "S".into(),
            port: 9,
            capacity: 8,
        }
        .into();
        assert_eq!(e.error_code(), "VALIDATION_FAILED");
    }
}
