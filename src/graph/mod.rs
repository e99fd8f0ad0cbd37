//! The entity graph: instances, the identity registry that owns them, and
//! the snapshot and collaborator interfaces used to hand the graph off.

mod instance;
mod registry;
mod sink;
mod snapshot;

pub use instance::EntityInstance;
pub use registry::IdentityRegistry;
pub use sink::{ConsistencyChecker, ConsistencyVerdict, GraphSink, MemorySink, StructuralChecker};
pub use snapshot::{GraphSnapshot, InstanceSnapshot};
