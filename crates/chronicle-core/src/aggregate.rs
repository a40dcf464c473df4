//! Event-sourced aggregate abstraction.
//!
//! An aggregate's fields are a deterministic fold over its events. The
//! bookkeeping every aggregate shares (identifier, version, uncommitted
//! buffer) lives in [`AggregateState`]; concrete aggregates embed one and
//! implement [`AggregateRoot::apply`] plus the snapshot pair.

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::event::DomainEvent;

/// Bookkeeping shared by every event-sourced aggregate.
///
/// Only the provided methods of [`AggregateRoot`] and the repository mutate
/// it, so `version` always equals the number of applied events minus one.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateState<E> {
    id: String,
    version: i64,
    uncommitted: Vec<E>,
}

impl<E> AggregateState<E> {
    /// Creates empty bookkeeping: no identifier yet, version -1.
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: String::new(),
            version: -1,
            uncommitted: Vec::new(),
        }
    }

    /// Returns the aggregate identifier (empty until the first event).
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the current version.
    #[must_use]
    pub fn version(&self) -> i64 {
        self.version
    }

    pub(crate) fn bind_id(&mut self, id: &str) {
        if self.id.is_empty() {
            id.clone_into(&mut self.id);
        }
    }
}

impl<E> Default for AggregateState<E> {
    fn default() -> Self {
        Self::new()
    }
}

/// Trait for aggregate roots that reconstitute from event history.
pub trait AggregateRoot: Send + Sync {
    /// The closed set of events this aggregate produces and consumes.
    type Event: DomainEvent;

    /// The single snapshot shape of this aggregate type.
    type Snapshot: Serialize + DeserializeOwned + Send;

    /// Returns the shared bookkeeping.
    fn state(&self) -> &AggregateState<Self::Event>;

    /// Returns the shared bookkeeping mutably.
    fn state_mut(&mut self) -> &mut AggregateState<Self::Event>;

    /// Apply an event to mutate fields. Must be a pure function of the
    /// current fields and the event.
    fn apply(&mut self, event: &Self::Event);

    /// Captures the current fields.
    fn create_snapshot(&self) -> Self::Snapshot;

    /// Sets the fields from a snapshot. Exact inverse of `create_snapshot`.
    fn restore_from_snapshot(&mut self, snapshot: Self::Snapshot);

    /// Returns the aggregate identifier.
    fn aggregate_id(&self) -> &str {
        self.state().id()
    }

    /// Returns the current version (-1 before any event is applied).
    fn version(&self) -> i64 {
        self.state().version()
    }

    /// Applies a newly raised event and buffers it for persistence.
    fn raise_event(&mut self, event: Self::Event) {
        fold(self, &event);
        self.state_mut().uncommitted.push(event);
    }

    /// Resets the aggregate to its default value and replays `events` in
    /// order. Replayed events are never buffered as uncommitted.
    fn load_from_history<I>(&mut self, events: I)
    where
        Self: Sized + Default,
        I: IntoIterator<Item = Self::Event>,
    {
        *self = Self::default();
        for event in events {
            fold(self, &event);
        }
    }

    /// Replays the events that follow a snapshot. Expects
    /// `restore_from_snapshot` to have set the baseline fields already.
    fn load_from_snapshot<I>(&mut self, snapshot_version: i64, events: I)
    where
        Self: Sized,
        I: IntoIterator<Item = Self::Event>,
    {
        let state = self.state_mut();
        state.uncommitted.clear();
        state.version = snapshot_version;
        for event in events {
            fold(self, &event);
        }
    }

    /// Clears the uncommitted buffer after a successful persist.
    fn mark_events_as_committed(&mut self) {
        self.state_mut().uncommitted.clear();
    }

    /// Returns `true` if events are waiting to be persisted.
    fn has_uncommitted_events(&self) -> bool {
        !self.state().uncommitted.is_empty()
    }

    /// Returns uncommitted events produced by command handling.
    fn uncommitted_events(&self) -> &[Self::Event] {
        &self.state().uncommitted
    }

    /// Returns the number of uncommitted events.
    fn uncommitted_event_count(&self) -> usize {
        self.state().uncommitted.len()
    }
}

fn fold<A: AggregateRoot + ?Sized>(aggregate: &mut A, event: &A::Event) {
    aggregate.apply(event);
    let state = aggregate.state_mut();
    state.bind_id(event.aggregate_id());
    state.version += 1;
}
