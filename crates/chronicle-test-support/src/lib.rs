//! Shared test doubles for the Chronicle event-sourcing core.

mod clock;
mod event_store;
mod notification_sink;

pub use clock::FixedClock;
pub use event_store::{AppendCall, FailingEventStore, RecordingEventStore};
pub use notification_sink::{FailingNotificationSink, RecordingNotificationSink};
