pub mod ai;
pub mod balance;
pub mod composer;
pub mod config;
pub mod error;
pub mod nav;
pub mod notice;
pub mod settings;
pub mod state;
pub mod store;
pub mod stream;
pub mod templates;
pub mod toolbar;

#[cfg(test)]
mod testing;

// Re-export main types for convenience
pub use ai::{BalanceQuery, ChatCompletion, DeepSeekClient, FileUploader};
pub use balance::{BalanceMonitor, BalanceSummary};
pub use composer::{Composer, PendingSend, SubmitOutcome, Submission, UploadOutcome};
pub use config::{ConfigError, Settings};
pub use error::ApiError;
pub use notice::{Notice, NoticeBoard, NoticeLevel};
pub use settings::{SettingField, SettingsPatch, SettingsStore};
pub use state::{ChatMessage, ChatRole, PendingFile};
pub use store::{ChatSnapshot, ChatStore};
pub use toolbar::ChatToolbar;
