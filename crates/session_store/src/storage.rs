use std::fmt::Debug;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::error::SessionStoreError;
use crate::schema::{SessionRecord, SESSION_RECORD_VERSION};

/// Backing store for the persisted session id.
pub trait SessionStorage: Debug + Send {
    fn load(&self) -> Result<Option<String>, SessionStoreError>;
    fn store(&mut self, session_id: &str) -> Result<(), SessionStoreError>;
    fn remove(&mut self) -> Result<(), SessionStoreError>;
}

/// Process-lifetime storage. Nothing survives a restart.
#[derive(Debug, Default, Clone)]
pub struct MemorySessionStorage {
    session_id: Option<String>,
}

impl SessionStorage for MemorySessionStorage {
    fn load(&self) -> Result<Option<String>, SessionStoreError> {
        Ok(self.session_id.clone())
    }

    fn store(&mut self, session_id: &str) -> Result<(), SessionStoreError> {
        self.session_id = Some(session_id.to_owned());
        Ok(())
    }

    fn remove(&mut self) -> Result<(), SessionStoreError> {
        self.session_id = None;
        Ok(())
    }
}

/// Single JSON record on disk, replaced atomically on every write.
#[derive(Debug, Clone)]
pub struct FileSessionStorage {
    path: PathBuf,
}

impl FileSessionStorage {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl SessionStorage for FileSessionStorage {
    fn load(&self) -> Result<Option<String>, SessionStoreError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(source) if source.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(SessionStoreError::io(
                    "reading session file",
                    &self.path,
                    source,
                ))
            }
        };

        if contents.trim().is_empty() {
            return Ok(None);
        }

        let record: SessionRecord = serde_json::from_str(&contents)
            .map_err(|source| SessionStoreError::json_parse(&self.path, source))?;
        validate_record(&self.path, &record)?;
        Ok(Some(record.session_id))
    }

    fn store(&mut self, session_id: &str) -> Result<(), SessionStoreError> {
        if let Some(parent) = self.path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| {
                SessionStoreError::io("creating session directory", parent, source)
            })?;
        }

        let saved_at = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .map_err(SessionStoreError::ClockFormat)?;
        let record = SessionRecord::v1(session_id, saved_at);
        let mut body = serde_json::to_string_pretty(&record)
            .map_err(|source| SessionStoreError::json_serialize(&self.path, source))?;
        body.push('\n');

        let temp_path = self.temp_path();
        fs::write(&temp_path, body).map_err(|source| {
            SessionStoreError::io("writing session file", &temp_path, source)
        })?;
        fs::rename(&temp_path, &self.path).map_err(|source| {
            SessionStoreError::io("replacing session file", &self.path, source)
        })
    }

    fn remove(&mut self) -> Result<(), SessionStoreError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(source) if source.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(SessionStoreError::io(
                "removing session file",
                &self.path,
                source,
            )),
        }
    }
}

fn validate_record(path: &Path, record: &SessionRecord) -> Result<(), SessionStoreError> {
    if record.version != SESSION_RECORD_VERSION {
        return Err(SessionStoreError::UnsupportedVersion {
            path: path.to_path_buf(),
            found: record.version,
        });
    }

    if OffsetDateTime::parse(&record.saved_at, &Rfc3339).is_err() {
        return Err(SessionStoreError::InvalidTimestamp {
            path: path.to_path_buf(),
            field: "saved_at",
            value: record.saved_at.clone(),
        });
    }

    if record.session_id.trim().is_empty() {
        return Err(SessionStoreError::EmptySessionId {
            path: path.to_path_buf(),
        });
    }

    Ok(())
}
