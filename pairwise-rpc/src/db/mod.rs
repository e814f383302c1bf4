mod builder;
pub use builder::Builder as DbBuilder;

mod snapshot;
pub use snapshot::{SnapshotKind, SnapshotRepository};
