pub mod manager;
pub mod snapshot;
pub mod source;

pub use manager::EntityStore;
pub use snapshot::{SnapshotDescription, SnapshotManager};
pub use source::{collect_all, JsonFileSource, SourceCollector};
