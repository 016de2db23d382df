//! Change-event recording and storage.

mod recorder;
mod store;

#[cfg(test)]
pub use recorder::MockChangeEventRecorder;
pub use recorder::ChangeEventRecorder;
pub use store::ChangeEventStore;
