//! taskdeck-core: Core library for the taskdeck tracker
//!
//! Users, projects and tasks held in memory, mirrored to a single JSON
//! snapshot after every change. Deletes cascade to dependent entities.

pub mod config;
pub mod error;
pub mod id;
pub mod model;
pub mod snapshot;
pub mod storage;
pub mod store;
pub mod views;

pub use config::Config;
pub use error::Error;
pub use id::generate_id;
pub use model::{
    NewTask, Priority, Project, ProjectStatus, ProjectUpdate, Task, TaskStatus, TaskUpdate, User,
    UserUpdate,
};
pub use snapshot::Snapshot;
pub use storage::{FileStorage, MemoryStorage, SnapshotStorage};
pub use store::{Removed, Store, StoreEvent};

/// Result type for taskdeck operations
pub type Result<T> = std::result::Result<T, Error>;
