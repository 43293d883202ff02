use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::error::Error;

/// Per-request output files named `<uuid>.pdf` inside one directory.
#[derive(Clone, Debug)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    /// Creates `dir` if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, Error> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// `HEALTHREPORT_OUTPUT_DIR`, else `<temp dir>/healthreport`.
    pub fn default_dir() -> PathBuf {
        std::env::var_os("HEALTHREPORT_OUTPUT_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| std::env::temp_dir().join("healthreport"))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// A fresh id and the path its PDF should be written to.
    pub fn allocate(&self) -> (String, PathBuf) {
        let id = Uuid::new_v4().to_string();
        let path = self.dir.join(format!("{id}.pdf"));
        (id, path)
    }

    /// Path of an existing artifact. Ids that are not UUIDs are rejected so
    /// callers can't reach outside the store.
    pub fn resolve(&self, id: &str) -> Option<PathBuf> {
        let id = Uuid::parse_str(id).ok()?;
        let path = self.dir.join(format!("{}.pdf", id.hyphenated()));
        path.is_file().then_some(path)
    }
}
