pub mod auth;
pub mod clock;
pub mod rate_limiter;
pub mod users;

pub use auth::{AuthCore, AuthSettings, AuthStats};
pub use rate_limiter::RateLimiter;
pub use users::{UserRecord, UserTable};
