mod correlator;
mod error;
mod paths;
mod schema;
mod storage;

pub use correlator::SessionCorrelator;
pub use error::SessionStoreError;
pub use paths::{default_session_file, session_dir, SESSION_FILE_NAME};
pub use schema::{SessionRecord, SESSION_RECORD_VERSION};
pub use storage::{FileSessionStorage, MemorySessionStorage, SessionStorage};
