//! Domain events and their distribution.
//!
//! Mechanics only: the `Event` contract, the envelope events travel in once
//! they are committed, and a broadcast bus for downstream consumers.

pub mod bus;
pub mod envelope;
pub mod event;
pub mod in_memory_bus;

pub use bus::{EventBus, Subscription};
pub use envelope::EventEnvelope;
pub use event::Event;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
