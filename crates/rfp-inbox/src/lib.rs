pub mod analysis;
pub mod config;
pub mod db;
pub mod desk;
pub mod email;
pub mod error;
pub mod model;
pub mod notify;
pub mod sanitize;
pub mod secrets;
pub mod storage;

pub use analysis::{AnalysisError, AnalysisQueue, AnalysisWorker, Analyzer, ReasoningProvider};
pub use config::{load_config, load_config_from_str, AppConfig};
pub use db::Database;
pub use desk::{Acceptance, Assembly, Desk};
pub use email::{InboxStats, InboxSynchronizer, MailboxConnector, MailboxSession, SyncSummary};
pub use error::{ConfigError, Result, RfpError, StorageError};
pub use notify::{Notifier, NotifyError};
pub use secrets::{resolve_secret, resolve_secret_optional, SecretError};
pub use storage::ContentStore;
