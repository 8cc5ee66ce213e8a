//! The priority request pipeline: classification (C8), bounded priority
//! queues (C9), the worker pool (C10), and the system-mode admission
//! controller (C11) that owns all three.

pub mod classifier;
pub mod clock;
pub mod manager;
pub mod queue;
pub mod worker;

pub use classifier::{classify, Classification};
pub use manager::{AdmissionError, PriorityManager, PriorityStats, SystemMode};
pub use queue::QueueSet;
pub use worker::{Band, RequestHandler, WorkerPool, BACKGROUND_BAND, CRITICAL_BAND, NORMAL_BAND};
