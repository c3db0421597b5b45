//! Output directory removal.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use crate::error::BuildError;
use crate::tasks::TaskOutput;

/// Remove `output_dir` and everything below it. An absent directory is not an error.
pub fn clean(output_dir: &Path) -> Result<TaskOutput, BuildError> {
    match fs::remove_dir_all(output_dir) {
        Ok(()) => {
            tracing::debug!("Removed {}", output_dir.display());
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => return Err(BuildError::write(output_dir, e)),
    }

    Ok(TaskOutput::default())
}
