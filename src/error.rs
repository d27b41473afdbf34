use std::time::Duration;

pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error returned by the binary entrypoints.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("{0}")]
    Scheduler(#[from] SchedulerError),
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("unable to read configuration file: {0}")]
    Read(#[from] std::io::Error),
    #[error("unable to parse configuration file: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("mail_poll_interval must be greater than zero")]
    ZeroPollInterval,
    #[error("mail_poll_task_timeout must be greater than zero")]
    ZeroTaskTimeout,
    #[error("no clients configured")]
    NoClients,
    #[error("client {login}: unsupported protocol {proto:?}")]
    UnsupportedProto { login: String, proto: String },
    #[error("client {login}: {field} must not be empty")]
    EmptyField { login: String, field: &'static str },
}

/// Filter expression compilation errors. Every variant carries the byte
/// index in the source expression at which the problem was detected.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum FilterError {
    #[error("unterminated quoted string starting at index {0}")]
    UnterminatedString(usize),
    #[error("unexpected character {1:?} at index {0}")]
    UnexpectedChar(usize, char),
    #[error("unbalanced parenthesis at index {0}")]
    UnbalancedParen(usize),
    #[error("{1:?} at index {0} is not a flag and is not compared to a value")]
    UnknownFlag(usize, String),
    #[error("expected quoted string at index {0}")]
    ExpectedString(usize),
    #[error("expected {1} at index {0}")]
    Expected(usize, &'static str),
    #[error("unexpected end of expression")]
    UnexpectedEnd,
}

/// Mail retrieval errors, one variant per protocol stage. The kind label
/// is attached to log records so cycles remain grep-able per failure class.
#[derive(thiserror::Error, Debug)]
pub enum RetrieveError {
    #[error("dial {address}: {source}")]
    Dial {
        address: String,
        #[source]
        source: std::io::Error,
    },
    #[error("login: {0}")]
    Auth(#[source] async_imap::error::Error),
    #[error("select: {0}")]
    Select(#[source] async_imap::error::Error),
    #[error("capability: {0}")]
    Capability(#[source] async_imap::error::Error),
    #[error("search: {0}")]
    Search(#[source] async_imap::error::Error),
    #[error("fetch: {0}")]
    Fetch(#[source] async_imap::error::Error),
    #[error("filter: {0}")]
    Filter(#[from] FilterError),
}

impl RetrieveError {
    pub fn kind(&self) -> &'static str {
        match self {
            RetrieveError::Dial { .. } => "dial_error",
            RetrieveError::Auth(_) => "auth_error",
            RetrieveError::Select(_) => "select_error",
            RetrieveError::Capability(_) => "capability_error",
            RetrieveError::Search(_) => "search_error",
            RetrieveError::Fetch(_) => "fetch_error",
            RetrieveError::Filter(_) => "config_error",
        }
    }
}

/// A single fetched item that cannot be turned into a message. Skipping it
/// never aborts the batch it came from.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MalformedMessage {
    #[error("fetched item is missing a UID")]
    MissingUid,
    #[error("fetched item is missing the body section")]
    MissingBody,
    #[error("unable to parse MIME structure")]
    Mime,
}

#[derive(thiserror::Error, Debug)]
pub enum ForwardError {
    #[error("telegram request: {0}")]
    Http(#[from] reqwest::Error),
    #[error("telegram API error {code}: {description}")]
    Api { code: i64, description: String },
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("schedule interval must be greater than zero, got {0:?}")]
    ZeroInterval(Duration),
    #[error("scheduler is already running")]
    AlreadyScheduled,
}
