use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{Mutex, MutexGuard};

use crate::accumulator::FeatureAccumulator;

/// Hands out footprint identifiers that stay unique for the whole session
#[derive(Debug)]
pub struct FootprintIdAllocator {
    prefix: String,
    next: AtomicU64,
}

impl FootprintIdAllocator {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: AtomicU64::new(1),
        }
    }

    pub fn next_id(&self) -> String {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        format!("{}_{}", self.prefix, n)
    }

    /// Number of identifiers issued so far
    pub fn issued(&self) -> u64 {
        self.next.load(Ordering::Relaxed) - 1
    }
}

impl Default for FootprintIdAllocator {
    fn default() -> Self {
        Self::new("building")
    }
}

/// Token identifying one pipeline run within a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RunToken(u64);

impl RunToken {
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for RunToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "run#{}", self.0)
    }
}

/// State shared by every run of one user session.
///
/// Only the most recently started run is current; older runs notice at their
/// next suspend point and drop their results.
#[derive(Debug, Default)]
pub struct SessionState {
    accumulator: Mutex<FeatureAccumulator>,
    ids: FootprintIdAllocator,
    latest_run: AtomicU64,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_id_prefix(prefix: impl Into<String>) -> Self {
        Self {
            ids: FootprintIdAllocator::new(prefix),
            ..Default::default()
        }
    }

    pub fn ids(&self) -> &FootprintIdAllocator {
        &self.ids
    }

    /// Register a new run, superseding any run still in flight
    pub fn begin_run(&self) -> RunToken {
        RunToken(self.latest_run.fetch_add(1, Ordering::SeqCst) + 1)
    }

    pub fn is_current(&self, token: RunToken) -> bool {
        self.latest_run.load(Ordering::SeqCst) == token.0
    }

    pub async fn accumulator(&self) -> MutexGuard<'_, FeatureAccumulator> {
        self.accumulator.lock().await
    }

    /// User-initiated reset of the accumulated footprints
    pub async fn clear(&self) {
        self.accumulator.lock().await.clear();
    }
}
