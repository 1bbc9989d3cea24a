use crate::base::{status_of, Code};
use crate::Error;
use std::io;
use std::sync::mpsc::RecvTimeoutError;

/// Maps a failed call's error to the `error_type` label.
pub fn classify_error(err: &Error) -> &'static str {
    if let Some(status) = status_of(err) {
        return match status.code() {
            Code::DeadlineExceeded => "timeout",
            Code::Unavailable => "unavailable",
            Code::PermissionDenied => "permission_denied",
            Code::InvalidArgument => "invalid_argument",
            Code::NotFound => "not_found",
            Code::ResourceExhausted => "resource_exhausted",
            Code::Cancelled => "cancelled",
            _ => "unknown_error",
        };
    }
    if let Some(io_err) = err.downcast_ref::<io::Error>() {
        return match io_err.kind() {
            io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::HostUnreachable
            | io::ErrorKind::NetworkUnreachable => "network_error",
            io::ErrorKind::TimedOut => "timeout",
            _ => "unknown_error",
        };
    }
    if let Some(RecvTimeoutError::Timeout) = err.downcast_ref::<RecvTimeoutError>() {
        return "timeout";
    }
    "unknown_error"
}
