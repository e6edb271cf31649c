// Bundle Porter Infrastructure - System Adapters
// Implements: ImportExecutor (file copy, external host command)

pub mod command_executor;
pub mod copy_executor;

pub use command_executor::CommandImportExecutor;
pub use copy_executor::{sanitize_folder_name, CopyImportExecutor};

use porter_core::port::ExecutionError;
use std::path::Path;
use tokio::runtime::Handle;

/// Runtime to run the import on; `begin_import` is called from async code
pub(crate) fn current_runtime() -> Result<Handle, ExecutionError> {
    Handle::try_current()
        .map_err(|e| ExecutionError::SpawnFailed(format!("no async runtime: {e}")))
}

pub(crate) fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}
