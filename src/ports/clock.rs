//! Clock port.

use crate::domain::foundation::Timestamp;

/// Source of "now" for everything time-dependent in the core.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}
