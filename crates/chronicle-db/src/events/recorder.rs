//! The recorder capability handed to every command.

use chronicle_core::{ChangeEvent, NewChangeEvent};

use crate::errors::Result;

/// Appends change events.
///
/// The executor calls this after a mutation has committed. Implementations
/// assign the event ID and timestamp.
#[cfg_attr(test, mockall::automock)]
pub trait ChangeEventRecorder: Send + Sync {
    /// Persist `event` and return it as stored.
    fn record_change_event(&self, event: &NewChangeEvent) -> Result<ChangeEvent>;
}
