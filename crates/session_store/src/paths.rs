use std::path::{Path, PathBuf};

pub const SESSION_DIR: &str = ".pipeline";
pub const SESSION_FILE_NAME: &str = "session.json";

#[must_use]
pub fn session_dir(cwd: &Path) -> PathBuf {
    cwd.join(SESSION_DIR)
}

#[must_use]
pub fn default_session_file(cwd: &Path) -> PathBuf {
    session_dir(cwd).join(SESSION_FILE_NAME)
}
