use serde::{Deserialize, Serialize};

use crate::priority::Priority;

/// 16-byte identifier assigned to a request when it enters the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(pub [u8; 16]);

impl RequestId {
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

/// An in-flight HTTP request as it is carried through the priority pipeline.
///
/// The pipeline owns the request's body/response buffers directly rather
/// than holding a pointer into the HTTP collaborator's own request object.
#[derive(Debug, Clone)]
pub struct Request {
    pub id: RequestId,
    pub method: String,
    pub uri: String,
    pub priority: Priority,
    pub enqueue_us: u64,
    pub processing_start_us: Option<u64>,
    pub timeout_ms: u64,
    pub processed: bool,
}

impl Request {
    pub fn new(
        id: RequestId,
        method: impl Into<String>,
        uri: impl Into<String>,
        priority: Priority,
        enqueue_us: u64,
        timeout_ms: u64,
    ) -> Self {
        Self {
            id,
            method: method.into(),
            uri: uri.into(),
            priority,
            enqueue_us,
            processing_start_us: None,
            timeout_ms,
            processed: false,
        }
    }

    pub fn is_expired(&self, now_us: u64) -> bool {
        now_us.saturating_sub(self.enqueue_us) > self.timeout_ms.saturating_mul(1000)
    }
}
