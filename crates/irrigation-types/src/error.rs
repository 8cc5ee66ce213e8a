use thiserror::Error;

/// The complete error taxonomy for the controller core. Each variant maps to
/// exactly one HTTP status via [`ControllerError::status_code`]; the actual
/// `IntoResponse` implementation lives in the `controller` binary crate,
/// which is the only crate in the workspace that depends on `axum`.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ControllerError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("wrong point kind: {0}")]
    WrongKind(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("queue full")]
    QueueFull,

    #[error("not allowed in current system mode: {0}")]
    NotAllowed(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("rate limited")]
    RateLimited,

    #[error("session expired")]
    SessionExpired,

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("max sessions reached")]
    MaxSessions,

    #[error("insufficient role")]
    InvalidRole,

    #[error("hardware error: {0}")]
    Hardware(String),

    #[error("out of memory in tier {0}")]
    OutOfMemory(String),
}

/// Status code class a variant surfaces as, independent of which HTTP
/// framework renders it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    BadRequest,
    NotFound,
    Unauthorized,
    Forbidden,
    TooManyRequests,
    ServiceUnavailable,
    GatewayTimeout,
    InternalError,
}

impl ControllerError {
    pub fn status_class(&self) -> StatusClass {
        use ControllerError::*;
        match self {
            NotFound(_) => StatusClass::NotFound,
            WrongKind(_) | InvalidArgument(_) => StatusClass::BadRequest,
            InvalidConfig(_) => StatusClass::InternalError,
            QueueFull => StatusClass::ServiceUnavailable,
            NotAllowed(_) => StatusClass::ServiceUnavailable,
            Timeout(_) => StatusClass::GatewayTimeout,
            RateLimited => StatusClass::TooManyRequests,
            SessionExpired | InvalidCredentials | MaxSessions => StatusClass::Unauthorized,
            InvalidRole => StatusClass::Forbidden,
            Hardware(_) => StatusClass::InternalError,
            OutOfMemory(_) => StatusClass::ServiceUnavailable,
        }
    }

    pub fn numeric_status(&self) -> u16 {
        match self.status_class() {
            StatusClass::BadRequest => 400,
            StatusClass::Unauthorized => 401,
            StatusClass::Forbidden => 403,
            StatusClass::NotFound => 404,
            StatusClass::TooManyRequests => 429,
            StatusClass::ServiceUnavailable => 503,
            StatusClass::GatewayTimeout => 504,
            StatusClass::InternalError => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limited_maps_to_429() {
        assert_eq!(ControllerError::RateLimited.numeric_status(), 429);
    }

    #[test]
    fn queue_full_maps_to_503() {
        assert_eq!(ControllerError::QueueFull.numeric_status(), 503);
    }

    #[test]
    fn invalid_role_maps_to_403() {
        assert_eq!(ControllerError::InvalidRole.numeric_status(), 403);
    }

    #[test]
    fn max_sessions_maps_to_401_alongside_other_session_errors() {
        assert_eq!(ControllerError::MaxSessions.numeric_status(), 401);
        assert_eq!(ControllerError::MaxSessions.status_class(), ControllerError::SessionExpired.status_class());
    }
}
