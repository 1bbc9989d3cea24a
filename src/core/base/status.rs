use crate::Error;
pub use tonic::{Code, Status};

/// Canonical upper-case gRPC name of a status code, as used in metric labels.
pub fn status_name(code: Code) -> &'static str {
    match code {
        Code::Ok => "OK",
        Code::Cancelled => "CANCELLED",
        Code::Unknown => "UNKNOWN",
        Code::InvalidArgument => "INVALID_ARGUMENT",
        Code::DeadlineExceeded => "DEADLINE_EXCEEDED",
        Code::NotFound => "NOT_FOUND",
        Code::AlreadyExists => "ALREADY_EXISTS",
        Code::PermissionDenied => "PERMISSION_DENIED",
        Code::ResourceExhausted => "RESOURCE_EXHAUSTED",
        Code::FailedPrecondition => "FAILED_PRECONDITION",
        Code::Aborted => "ABORTED",
        Code::OutOfRange => "OUT_OF_RANGE",
        Code::Unimplemented => "UNIMPLEMENTED",
        Code::Internal => "INTERNAL",
        Code::Unavailable => "UNAVAILABLE",
        Code::DataLoss => "DATA_LOSS",
        Code::Unauthenticated => "UNAUTHENTICATED",
        #[allow(unreachable_patterns)]
        _ => "UNKNOWN",
    }
}

/// The gRPC status carried by an error, if the error is a transport or
/// application status rather than a local failure.
pub fn status_of(err: &Error) -> Option<&Status> {
    err.downcast_ref::<Status>()
}

/// The error raised when a tracked RPC is refused a concurrency slot.
pub fn resource_exhausted(method: &str) -> Error {
    Error::new(Status::resource_exhausted(format!(
        "Concurrency limit exceeded for {}",
        method
    )))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn names() {
        assert_eq!(status_name(Code::Ok), "OK");
        assert_eq!(status_name(Code::Unavailable), "UNAVAILABLE");
        assert_eq!(status_name(Code::DeadlineExceeded), "DEADLINE_EXCEEDED");
        assert_eq!(status_name(Code::Unknown), "UNKNOWN");
    }

    #[test]
    fn status_inside_error() {
        let err = resource_exhausted("/pkg.ClaimService/BeginUpdate");
        let status = status_of(&err).unwrap();
        assert_eq!(status.code(), Code::ResourceExhausted);
        assert!(status.message().contains("BeginUpdate"));

        let err = Error::msg("plain");
        assert!(status_of(&err).is_none());
    }
}
