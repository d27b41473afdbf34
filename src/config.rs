use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

use bytesize::ByteSize;
use serde::Deserialize;

use crate::error::ConfigError;

pub const PROTO_IMAP_TLS: &str = "imap+tls";

fn default_proto() -> String {
    PROTO_IMAP_TLS.to_string()
}

fn default_max_attachments_size() -> ByteSize {
    ByteSize::mb(20)
}

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    /// Interval between poll cycles.
    #[serde(with = "humantime_serde")]
    pub mail_poll_interval: Duration,
    /// Deadline for a single poll cycle across all clients.
    #[serde(with = "humantime_serde")]
    pub mail_poll_task_timeout: Duration,
    /// Default log directive, overridden by RUST_LOG.
    #[serde(default)]
    pub log_level: Option<String>,
    pub clients: Vec<ClientConfig>,
}

/// Static mailbox descriptor. UID state is not part of the configuration;
/// it lives in the cursor store and is overlaid by the runner per cycle.
#[derive(Clone, Debug, Deserialize)]
pub struct ClientConfig {
    #[serde(default = "default_proto")]
    pub proto: String,
    /// IMAP server in host:port form.
    pub address: String,
    pub login: String,
    pub password: String,
    /// When false the mailbox is opened read-only so the server never
    /// flags fetched mail as \Seen.
    #[serde(default)]
    pub mark_as_seen: bool,
    #[serde(default)]
    pub include_attachments: bool,
    #[serde(default = "default_max_attachments_size")]
    pub max_attachments_size: ByteSize,
    /// Filter expressions, and-merged into one search predicate.
    #[serde(default)]
    pub filters: Vec<String>,
    #[serde(default)]
    pub contact_points: Vec<ContactPoint>,
}

/// Destination descriptor. Opaque to the retrieval pipeline; only the
/// forwarder that matches the tag interprets the payload.
#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContactPoint {
    Telegram(TelegramContactPoint),
}

#[derive(Clone, Debug, Deserialize)]
pub struct TelegramContactPoint {
    pub bot_token: String,
    pub chat_id: i64,
    /// Deliver without a notification sound.
    #[serde(default)]
    pub silent_mode: bool,
    /// Protect delivered messages from being forwarded on.
    #[serde(default)]
    pub disable_forwarding: bool,
    #[serde(default)]
    pub parse_mode: Option<ParseMode>,
    /// Message layout override; `{{placeholder}}` references are replaced
    /// per message, the default layout is used when unset.
    #[serde(default)]
    pub template: Option<String>,
}

#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
pub enum ParseMode {
    #[default]
    MarkdownV2,
    Markdown,
    #[serde(rename = "HTML")]
    Html,
}

impl ParseMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParseMode::MarkdownV2 => "MarkdownV2",
            ParseMode::Markdown => "Markdown",
            ParseMode::Html => "HTML",
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Config, ConfigError> {
        let raw = fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&expand_env(&raw))?;
        config.validate()?;

        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.mail_poll_interval.is_zero() {
            return Err(ConfigError::ZeroPollInterval);
        }
        if self.mail_poll_task_timeout.is_zero() {
            return Err(ConfigError::ZeroTaskTimeout);
        }
        if self.clients.is_empty() {
            return Err(ConfigError::NoClients);
        }

        for client in &self.clients {
            if client.proto != PROTO_IMAP_TLS {
                return Err(ConfigError::UnsupportedProto {
                    login: client.login.clone(),
                    proto: client.proto.clone(),
                });
            }

            for (field, value) in [("address", &client.address), ("login", &client.login)] {
                if value.trim().is_empty() {
                    return Err(ConfigError::EmptyField {
                        login: client.login.clone(),
                        field,
                    });
                }
            }
        }

        Ok(())
    }
}

/// Substitute `${NAME}` references with the value of the corresponding
/// environment variable; unset variables expand to the empty string.
fn expand_env(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);

        match rest[start + 2..].find('}') {
            Some(end) => {
                let name = &rest[start + 2..start + 2 + end];
                if let Ok(value) = env::var(name) {
                    out.push_str(&value);
                }
                rest = &rest[start + 2 + end + 1..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
mail_poll_interval: 10m
mail_poll_task_timeout: 90s
clients:
  - address: imap.example.com:993
    login: inbox@example.com
    password: hunter2
    include_attachments: true
    max_attachments_size: 5MB
    filters:
      - "!JUNK"
    contact_points:
      - type: telegram
        bot_token: 123:abc
        chat_id: -100200300
        silent_mode: true
"#;

    #[test]
    fn parses_sample_config() {
        let config: Config = serde_yaml::from_str(SAMPLE).unwrap();

        assert_eq!(config.mail_poll_interval, Duration::from_secs(600));
        assert_eq!(config.mail_poll_task_timeout, Duration::from_secs(90));
        assert_eq!(config.clients.len(), 1);

        let client = &config.clients[0];
        assert_eq!(client.proto, PROTO_IMAP_TLS);
        assert!(!client.mark_as_seen);
        assert!(client.include_attachments);
        assert_eq!(client.max_attachments_size.as_u64(), 5_000_000);
        assert_eq!(client.filters, vec!["!JUNK".to_string()]);

        let ContactPoint::Telegram(telegram) = &client.contact_points[0];
        assert_eq!(telegram.chat_id, -100200300);
        assert!(telegram.silent_mode);
        assert!(!telegram.disable_forwarding);
        assert_eq!(telegram.parse_mode, None);
        assert_eq!(telegram.template, None);
    }

    #[test]
    fn parses_contact_point_template() {
        let contact: ContactPoint = serde_yaml::from_str(
            "type: telegram\nbot_token: t\nchat_id: 5\ntemplate: \"*{{subject}}*\"",
        )
        .unwrap();

        let ContactPoint::Telegram(telegram) = contact;
        assert_eq!(telegram.template.as_deref(), Some("*{{subject}}*"));
    }

    #[test]
    fn validate_rejects_zero_interval() {
        let mut config: Config = serde_yaml::from_str(SAMPLE).unwrap();
        config.mail_poll_interval = Duration::ZERO;

        assert!(matches!(
            config.validate(),
            Err(ConfigError::ZeroPollInterval)
        ));
    }

    #[test]
    fn validate_rejects_unknown_proto() {
        let mut config: Config = serde_yaml::from_str(SAMPLE).unwrap();
        config.clients[0].proto = "pop3".to_string();

        assert!(matches!(
            config.validate(),
            Err(ConfigError::UnsupportedProto { proto, .. }) if proto == "pop3"
        ));
    }

    #[test]
    fn validate_rejects_empty_client_list() {
        let mut config: Config = serde_yaml::from_str(SAMPLE).unwrap();
        config.clients.clear();

        assert!(matches!(config.validate(), Err(ConfigError::NoClients)));
    }

    #[test]
    fn expands_environment_references() {
        env::set_var("MAILGRAM_TEST_SECRET", "s3cr3t");

        let expanded = expand_env("password: ${MAILGRAM_TEST_SECRET}");
        assert_eq!(expanded, "password: s3cr3t");

        let missing = expand_env("password: ${MAILGRAM_TEST_UNSET_VAR}!");
        assert_eq!(missing, "password: !");
    }

    #[test]
    fn leaves_unterminated_reference_alone() {
        assert_eq!(expand_env("a ${oops"), "a ${oops");
        assert_eq!(expand_env("plain text"), "plain text");
    }
}
