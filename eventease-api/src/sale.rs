use std::sync::atomic::{AtomicBool, Ordering};

/// Operator-facing "sale is live" flag.
///
/// Purely informational: claims are accepted whether or not it is set.
#[derive(Debug, Default)]
pub struct SaleStatus {
    enabled: AtomicBool,
}

impl SaleStatus {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled: AtomicBool::new(enabled),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Returns the previous value.
    pub fn set(&self, enabled: bool) -> bool {
        self.enabled.swap(enabled, Ordering::SeqCst)
    }
}
