use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::{debug, warn};

/// Removes every file in `directory` named `<stem>.*` when dropped, which
/// covers the final output as well as `.part` and per-format intermediates.
#[derive(Debug)]
pub struct ScratchFiles {
    directory: PathBuf,
    stem: String,
}

impl ScratchFiles {
    pub fn new(directory: impl Into<PathBuf>, stem: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            stem: stem.into(),
        }
    }
}

impl Drop for ScratchFiles {
    fn drop(&mut self) {
        // Blocking std::fs. The directory only holds files of in-flight jobs.
        let removed = remove_scratch_files(&self.directory, &self.stem);
        if removed > 0 {
            debug!(
                "Removed {} scratch file(s) for {} from {}",
                removed,
                self.stem,
                self.directory.display()
            );
        }
    }
}

pub fn remove_scratch_files(directory: &Path, stem: &str) -> usize {
    let prefix = format!("{stem}.");
    let entries = match fs::read_dir(directory) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Failed to list {}: {}", directory.display(), e);
            return 0;
        }
    };

    let mut removed = 0;
    for entry in entries.flatten() {
        let matches = entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with(&prefix));
        if !matches {
            continue;
        }

        let path = entry.path();
        match fs::remove_file(&path) {
            Ok(()) => removed += 1,
            Err(e) => warn!("Error removing file {}: {}", path.display(), e),
        }
    }

    removed
}
