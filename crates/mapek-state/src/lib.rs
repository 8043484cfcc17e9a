//! Dashboard state: the execution timeline and the trust event buffer.

pub mod memory;
pub mod store;
pub mod timeline;
pub mod trust;

pub use memory::MemoryStore;
pub use store::{CurrentExecutionRaw, ExecutionStore, StoreError};
pub use timeline::{reconcile_subject, StatusFilter, SubjectOutcome, TimelineAggregator, TimelineFrame};
pub use trust::{TrustBuffer, TrustMarker, TrustSnapshot};
