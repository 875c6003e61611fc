use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Unique correlation identifier used to match calls with their responses
/// and push frames with their subscription.
///
/// Correlation IDs are carried *in-band* in the `id` field of protocol
/// envelopes. They are opaque to the transport layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(String);

impl CorrelationId {
    /// Borrow the correlation ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for CorrelationId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for CorrelationId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<u64> for CorrelationId {
    fn from(value: u64) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Monotonic source of correlation IDs.
///
/// One allocator is owned by each client session and shared through `Arc`
/// with whatever issues envelopes. Allocation is a single atomic increment,
/// so concurrent callers never observe the same value. The first ID issued
/// is `"1"`; there is no reset.
#[derive(Debug, Default)]
pub struct SequenceAllocator {
    last: AtomicU64,
}

impl SequenceAllocator {
    /// Create an allocator whose first ID is `"1"`.
    pub fn new() -> Self {
        Self {
            last: AtomicU64::new(0),
        }
    }

    /// Issue the next correlation ID.
    pub fn next(&self) -> CorrelationId {
        // ---
        let value = self.last.fetch_add(1, Ordering::Relaxed) + 1;
        CorrelationId::from(value)
    }

    /// Number of IDs issued so far.
    pub fn issued(&self) -> u64 {
        self.last.load(Ordering::Relaxed)
    }
}
