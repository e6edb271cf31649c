// Copy executor - imports a file by copying it into the host project

use crate::{current_runtime, display_name};
use porter_core::domain::ImportRequest;
use porter_core::port::{ExecutionError, ImportExecutor, OutcomeReporter};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Longest folder name created under the import root
pub const MAX_FOLDER_NAME_CHARS: usize = 50;

/// Folder for items enqueued without an owner
pub const UNSORTED_FOLDER: &str = "Unsorted";

/// Characters not allowed in a folder name on any supported platform
const INVALID_NAME_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Copies `{source}` to `{import_root}/{sanitized owner}/{file name}`
pub struct CopyImportExecutor {
    import_root: PathBuf,
}

impl CopyImportExecutor {
    pub fn new(import_root: impl Into<PathBuf>) -> Self {
        Self {
            import_root: import_root.into(),
        }
    }

    pub fn destination_for(&self, request: &ImportRequest) -> PathBuf {
        let folder = if request.owner_id.is_empty() {
            UNSORTED_FOLDER.to_string()
        } else {
            sanitize_folder_name(&request.owner_id)
        };
        let file_name = Path::new(&request.source_path)
            .file_name()
            .map(PathBuf::from)
            .unwrap_or_default();
        self.import_root.join(folder).join(file_name)
    }
}

impl ImportExecutor for CopyImportExecutor {
    fn begin_import(
        &self,
        request: &ImportRequest,
        reporter: OutcomeReporter,
    ) -> Result<(), ExecutionError> {
        let source = PathBuf::from(&request.source_path);
        if !source.is_file() {
            return Err(ExecutionError::Unsupported(format!(
                "not a file: {}",
                source.display()
            )));
        }

        let runtime = current_runtime()?;
        let destination = self.destination_for(request);
        let name = display_name(&source);

        if request.interactive {
            debug!(path = %source.display(), "Copy imports have no interactive mode, copying directly");
        }

        runtime.spawn(async move {
            match copy_into_place(&source, &destination).await {
                Ok(bytes) => {
                    info!(
                        source = %source.display(),
                        destination = %destination.display(),
                        bytes = bytes,
                        "File imported"
                    );
                    reporter.completed(name);
                }
                Err(e) => {
                    warn!(source = %source.display(), error = %e, "File copy failed");
                    reporter.failed(name, e.to_string());
                }
            }
        });

        Ok(())
    }
}

async fn copy_into_place(source: &Path, destination: &Path) -> std::io::Result<u64> {
    if let Some(parent) = destination.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::copy(source, destination).await
}

/// Replace characters that cannot appear in a folder name, cap the length
pub fn sanitize_folder_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_control() || INVALID_NAME_CHARS.contains(&c) {
                '_'
            } else {
                c
            }
        })
        .take(MAX_FOLDER_NAME_CHARS)
        .collect();

    let trimmed = cleaned.trim_matches(|c: char| c == ' ' || c == '.');
    if trimmed.is_empty() {
        UNSORTED_FOLDER.to_string()
    } else {
        trimmed.to_string()
    }
}
