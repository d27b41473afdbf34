pub mod config;
pub mod cursor;
pub mod daemon;
pub mod error;
pub mod filter;
pub mod forwarder;
pub mod imap;
pub mod message;
pub mod runner;
pub mod scheduler;

/// retrieve the version from Cargo.toml, note that this will yield an error
/// when compiling without cargo
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use config::{ClientConfig, Config, ContactPoint};
pub use cursor::{Cursor, CursorStore};
pub use daemon::Daemon;
pub use error::{Error, Result};
pub use forwarder::{Forwarder, TelegramForwarder};
pub use imap::{ImapRetriever, MailRetriever};
pub use message::{Address, Attachment, BodySegment, MailBatch, Message};
pub use runner::TaskRunner;
pub use scheduler::{Schedule, Scheduler};
