//! Local stand-in for the upload and cleanup collaborators: processed files are
//! copied into a dated `published/` folder and finished inbox files removed.

use anyhow::{Context, Result};
use bankpost_ledger::ArtifactSink;
use chrono::Local;
use std::fs;
use std::path::{Path, PathBuf};

pub struct LocalOutbox {
    published_dir: PathBuf,
    keep_inputs: bool,
}

impl LocalOutbox {
    pub fn new(output_dir: &Path) -> Self {
        Self {
            published_dir: output_dir.join("published"),
            keep_inputs: false,
        }
    }

    /// Leave inbox files in place, e.g. for dry runs.
    pub fn keep_inputs(mut self, keep: bool) -> Self {
        self.keep_inputs = keep;
        self
    }
}

impl ArtifactSink for LocalOutbox {
    fn publish(&mut self, artifacts: &[PathBuf]) -> Result<()> {
        let stamp = Local::now().format("%Y%m%d-%H%M%S").to_string();
        let dir = self.published_dir.join(&stamp);
        fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;

        for src in artifacts {
            let name = src
                .file_name()
                .with_context(|| format!("artifact without a file name: {}", src.display()))?;
            let dst = dir.join(name);
            fs::copy(src, &dst).with_context(|| format!("copy {} -> {}", src.display(), dst.display()))?;
            tracing::info!(artifact = %dst.display(), "published");
        }
        Ok(())
    }

    fn cleanup(&mut self, files: &[PathBuf]) -> Result<()> {
        if self.keep_inputs {
            return Ok(());
        }
        for f in files {
            match fs::remove_file(f) {
                Ok(()) => tracing::info!(file = %f.display(), "removed processed input"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e).with_context(|| format!("remove {}", f.display())),
            }
        }
        Ok(())
    }
}
