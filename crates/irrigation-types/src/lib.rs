//! Shared data model for the irrigation controller core.
//!
//! Every type that crosses a crate boundary — configuration, runtime state,
//! request/session records — lives here so that `irrigation-hal`,
//! `irrigation-io`, `irrigation-priority` and `irrigation-auth` agree on a
//! single definition instead of redefining their own views.

pub mod alarm;
pub mod config;
pub mod error;
pub mod point;
pub mod priority;
pub mod request;
pub mod runtime;
pub mod session;
pub mod signal;

pub use alarm::{AlarmConfig, AlarmRule, AlarmRules};
pub use config::{IoConfiguration, IoPointConfig, ShiftRegisterWiring};
pub use error::ControllerError;
pub use point::{OutputKind, PointId, PointKind};
pub use priority::Priority;
pub use request::RequestId;
pub use runtime::{AlarmRuntime, PointRuntime, SmaState};
pub use session::{Role, Session};
pub use signal::{Filter, SignalConfig};
