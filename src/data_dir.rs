use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

pub const DATA_DIR_ENV_VAR: &str = "JOTTER_DATA_DIR";

const NOTES_DB_FILE: &str = "notes.redb";
const PERSONAS_DIR: &str = "personas";

/// On-disk layout for one jotter installation:
///
/// ```text
/// <root>/
///   notes.redb      notes, users, settings
///   personas/       <name>.md persona prompts
/// ```
#[derive(Debug, Clone)]
pub struct DataDir {
    root: PathBuf,
}

impl DataDir {
    /// Locate the root and create it if needed. The root comes from, in
    /// order: `explicit` (--data-dir), a non-blank JOTTER_DATA_DIR, the XDG
    /// data home (~/.local/share/jotter/).
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        let root = ensure_dir(locate(explicit)?)?;
        tracing::debug!(root = %root.display(), "using data directory");
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn notes_db(&self) -> PathBuf {
        self.root.join(NOTES_DB_FILE)
    }

    /// Persona prompt directory, created on first use.
    pub fn personas_dir(&self) -> Result<PathBuf> {
        ensure_dir(self.root.join(PERSONAS_DIR))
    }
}

fn locate(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }

    if let Some(value) = std::env::var_os(DATA_DIR_ENV_VAR)
        && !value.is_empty()
    {
        return Ok(PathBuf::from(value));
    }

    xdg::BaseDirectories::with_prefix("jotter")
        .get_data_home()
        .ok_or_else(|| {
            Error::Config("could not determine XDG data home directory".into())
        })
}

fn ensure_dir(path: PathBuf) -> Result<PathBuf> {
    match std::fs::create_dir_all(&path) {
        Ok(()) => Ok(path),
        Err(e) => {
            tracing::error!(
                path = %path.display(),
                error = %e,
                "cannot create directory"
            );
            Err(Error::DataDir(path))
        }
    }
}
