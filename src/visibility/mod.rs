//! Lazy preview loading driven by container visibility

pub mod record;
pub mod scheduler;

pub use record::{ContainerObservationRecord, ObservedSubject, ScheduledLoad, WatchOptions};
pub use scheduler::{VisibilityScheduler, WatchId};
