// Application Layer - Use Cases and Business Logic

pub mod binder;
pub mod coordinator;
pub mod dispatcher;
pub mod inspection;
pub mod loader;
pub mod node_runner;
pub mod package;
pub mod verify;

// Re-exports
pub use binder::ExecutionContext;
pub use coordinator::{cancel_channel, CancelSender, CancelToken, Coordinator, EngineConfig, Interrupt};
pub use dispatcher::Backends;
pub use inspection::{detect_version, InspectionService, RunRequest, DEFAULT_VERSION_QUERY};
pub use loader::{load_dir, parse_task, TaskCatalog, TaskSelection};
pub use package::{CheckPackage, PackageCatalog};
