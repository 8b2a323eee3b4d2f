//! On-disk machine records: `<root>/machines/<name>/config.json`, next to
//! the machine's SSH key.

use std::fs;
use std::path::{Path, PathBuf};

use ubi_driver::MachineRecord;

use crate::error::{CliError, Result};

const RECORD_FILE: &str = "config.json";

#[derive(Debug, Clone)]
pub struct Store {
    root: PathBuf,
}

impl Store {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn machine_dir(&self, name: &str) -> Result<PathBuf> {
        validate_name(name)?;
        Ok(self.root.join("machines").join(name))
    }

    pub fn exists(&self, name: &str) -> Result<bool> {
        Ok(self.machine_dir(name)?.join(RECORD_FILE).exists())
    }

    pub fn load(&self, name: &str) -> Result<MachineRecord> {
        let path = self.machine_dir(name)?.join(RECORD_FILE);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(CliError::NotFound(name.to_string()));
            }
            Err(source) => return Err(CliError::Io { path, source }),
        };
        serde_json::from_str(&raw).map_err(|source| CliError::Json { path, source })
    }

    pub fn save(&self, record: &MachineRecord) -> Result<()> {
        let dir = self.machine_dir(&record.name)?;
        fs::create_dir_all(&dir).map_err(|source| io_error(&dir, source))?;

        let path = dir.join(RECORD_FILE);
        let json = serde_json::to_string_pretty(record).map_err(|source| CliError::Json {
            path: path.clone(),
            source,
        })?;
        fs::write(&path, json).map_err(|source| io_error(&path, source))
    }

    /// Delete the machine directory, key material included.
    pub fn remove(&self, name: &str) -> Result<()> {
        let dir = self.machine_dir(name)?;
        match fs::remove_dir_all(&dir) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(io_error(&dir, source)),
        }
    }
}

fn io_error(path: &Path, source: std::io::Error) -> CliError {
    CliError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn validate_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_'));
    if valid {
        Ok(())
    } else {
        Err(CliError::InvalidName(name.to_string()))
    }
}
