use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, warn};

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

use super::record::{now, SessionRecord, StoredSession};

/// Extension of session files in the store directory.
pub const SESSION_SUFFIX: &str = ".json";

/// Store directory used when none is configured, relative to the working directory.
pub const DEFAULT_SESSIONS_DIR: &str = "sessions";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Session '{0}' not found")]
    NotFound(String),

    #[error("Failed to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to parse {}: {source}", path.display())]
    Serialization {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl StoreError {
    fn io(path: &Path, source: io::Error) -> Self {
        StoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    fn serialization(path: &Path, source: serde_json::Error) -> Self {
        StoreError::Serialization {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Strip a session name down to characters safe for a file name.
///
/// Alphanumerics, space, hyphen and underscore are kept. Returns a
/// timestamp-based name when nothing usable remains.
pub fn file_stem(name: &str) -> String {
    let safe: String = name
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_'))
        .collect();
    let safe = safe.trim();
    if safe.is_empty() {
        format!("session_{}", now().format("%Y%m%d_%H%M%S"))
    } else {
        safe.to_string()
    }
}

/// File-backed store with one JSON document per session.
pub struct SessionStore {
    dir: PathBuf,
}

impl SessionStore {
    /// The directory is created on first write, not here.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn session_path(&self, filename: &str) -> PathBuf {
        self.dir.join(filename)
    }

    fn read(&self, path: &Path) -> Result<SessionRecord, StoreError> {
        let contents = fs::read_to_string(path).map_err(|e| StoreError::io(path, e))?;
        serde_json::from_str(&contents).map_err(|e| StoreError::serialization(path, e))
    }

    fn write(&self, path: &Path, record: &SessionRecord) -> Result<(), StoreError> {
        let contents =
            serde_json::to_string_pretty(record).map_err(|e| StoreError::serialization(path, e))?;
        fs::write(path, contents).map_err(|e| StoreError::io(path, e))?;

        // Session strings grant full account access
        #[cfg(unix)]
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))
            .map_err(|e| StoreError::io(path, e))?;

        Ok(())
    }

    /// Paths of every session file, in directory order.
    fn session_files(&self) -> Result<Vec<PathBuf>, StoreError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::io(&self.dir, e)),
        };

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| StoreError::io(&self.dir, e))?;
            let path = entry.path();
            let is_session = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(SESSION_SUFFIX));
            if is_session && path.is_file() {
                files.push(path);
            }
        }
        Ok(files)
    }

    /// Save a new record, stamping its creation time. Overwrites any file
    /// with the same derived name. Returns the path written.
    pub fn save(&self, record: &SessionRecord) -> Result<PathBuf, StoreError> {
        fs::create_dir_all(&self.dir).map_err(|e| StoreError::io(&self.dir, e))?;

        let path = self.session_path(&format!("{}{}", file_stem(&record.name), SESSION_SUFFIX));
        let record = SessionRecord {
            created_at: Some(now()),
            last_used_at: None,
            ..record.clone()
        };

        if path.exists() {
            debug!(path = %path.display(), "Overwriting existing session file");
        }
        self.write(&path, &record)?;
        info!(name = %record.name, path = %path.display(), "Session saved");
        Ok(path)
    }

    /// Load a session's token by name or file name, stamping its last-used time.
    pub fn load(&self, identifier: &str) -> Result<String, StoreError> {
        let filename = self.resolve(identifier)?;
        let path = self.session_path(&filename);

        let mut record = self.read(&path)?;
        record.touch();
        self.write(&path, &record)?;

        info!(name = %record.name, file = %filename, "Session loaded");
        Ok(record.token)
    }

    /// Every readable session, newest first. Unreadable files are skipped.
    pub fn list(&self) -> Result<Vec<StoredSession>, StoreError> {
        let mut sessions = Vec::new();

        for path in self.session_files()? {
            let filename = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();

            let record = match self.read(&path) {
                Ok(record) => record,
                Err(e) => {
                    warn!(file = %filename, error = %e, "Skipping unreadable session file");
                    continue;
                }
            };
            let file_size = fs::metadata(&path).map(|m| m.len()).unwrap_or(0);

            sessions.push(StoredSession {
                record,
                filename,
                file_size,
            });
        }

        // None sorts below any timestamp, so undated records end up last
        sessions.sort_by(|a, b| b.record.created_at.cmp(&a.record.created_at));
        Ok(sessions)
    }

    /// Permanently remove a session by name or file name.
    pub fn delete(&self, identifier: &str) -> Result<(), StoreError> {
        let filename = self.resolve(identifier)?;
        let path = self.session_path(&filename);
        fs::remove_file(&path).map_err(|e| StoreError::io(&path, e))?;
        info!(file = %filename, "Session deleted");
        Ok(())
    }

    /// Find the file for an identifier: an exact file name, then the name
    /// plus suffix, then the first record whose `name` matches exactly.
    pub fn resolve(&self, identifier: &str) -> Result<String, StoreError> {
        let is_plain = !identifier.is_empty()
            && !identifier.contains(['/', '\\'])
            && identifier != "."
            && identifier != "..";

        if is_plain {
            if identifier.ends_with(SESSION_SUFFIX) && self.session_path(identifier).is_file() {
                return Ok(identifier.to_string());
            }

            let with_suffix = format!("{}{}", identifier, SESSION_SUFFIX);
            if self.session_path(&with_suffix).is_file() {
                return Ok(with_suffix);
            }
        }

        for path in self.session_files()? {
            match self.read(&path) {
                Ok(record) if record.name == identifier => {
                    if let Some(name) = path.file_name() {
                        return Ok(name.to_string_lossy().into_owned());
                    }
                }
                Ok(_) => {}
                Err(e) => debug!(error = %e, "Ignoring unreadable file during lookup"),
            }
        }

        Err(StoreError::NotFound(identifier.to_string()))
    }
}

// ============================================================================
// Tests
// ============================================================================
