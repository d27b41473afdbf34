use futures::StreamExt;
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::TlsConnector;
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::cursor::Cursor;
use crate::error::{MalformedMessage, RetrieveError};
use crate::filter::{self, FilterCache};
use crate::message::MailBatch;

use super::INBOX;

type ImapSession = async_imap::Session<TlsStream<TcpStream>>;

/// BODY.PEEK keeps the fetch from setting \Seen on servers that ignore the
/// read-only mailbox selection.
const FETCH_ITEMS: &str = "(UID FLAGS INTERNALDATE RFC822.SIZE ENVELOPE MODSEQ BODY.PEEK[])";

pub(super) async fn get_mail(
    tls: &TlsConnector,
    filters: &FilterCache,
    client: &ClientConfig,
    cursor: Cursor,
) -> Result<MailBatch, RetrieveError> {
    let stream = dial(tls, &client.address).await?;

    let mut session = async_imap::Client::new(stream)
        .login(&client.login, &client.password)
        .await
        .map_err(|(err, _client)| RetrieveError::Auth(err))?;

    let result = fetch_batch(&mut session, filters, client, cursor).await;
    let _ = session.logout().await;

    result
}

async fn dial(tls: &TlsConnector, address: &str) -> Result<TlsStream<TcpStream>, RetrieveError> {
    let host = address
        .rsplit_once(':')
        .map(|(host, _port)| host)
        .unwrap_or(address);
    let server_name = ServerName::try_from(host.to_string()).map_err(|err| {
        dial_error(
            address,
            std::io::Error::new(std::io::ErrorKind::InvalidInput, err),
        )
    })?;

    let tcp = TcpStream::connect(address)
        .await
        .map_err(|err| dial_error(address, err))?;

    tls.connect(server_name, tcp)
        .await
        .map_err(|err| dial_error(address, err))
}

fn dial_error(address: &str, source: std::io::Error) -> RetrieveError {
    RetrieveError::Dial {
        address: address.to_string(),
        source,
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SyncState {
    /// Cursor has never observed this mailbox; anchor without fetching.
    FirstRun,
    /// UIDVALIDITY changed; previous UIDs are void, re-anchor.
    Resync,
    /// Nothing arrived since the last cycle.
    Unchanged,
    /// New UIDs exist in `[cursor.uid_next, uid_next)`.
    Diverged,
}

fn sync_state(cursor: Cursor, uid_validity: u32, uid_next: u32) -> SyncState {
    if cursor.is_unseen() {
        SyncState::FirstRun
    } else if cursor.uid_validity != uid_validity {
        SyncState::Resync
    } else if uid_next <= cursor.uid_next {
        SyncState::Unchanged
    } else {
        SyncState::Diverged
    }
}

async fn fetch_batch(
    session: &mut ImapSession,
    filters: &FilterCache,
    client: &ClientConfig,
    cursor: Cursor,
) -> Result<MailBatch, RetrieveError> {
    // EXAMINE opens the mailbox read-only, so the server never flags
    // fetched mail as \Seen unless the client opted in.
    let mailbox = if client.mark_as_seen {
        session.select(INBOX).await
    } else {
        session.examine(INBOX).await
    }
    .map_err(RetrieveError::Select)?;

    let uid_validity = mailbox.uid_validity.unwrap_or_default();
    let uid_next = mailbox.uid_next.unwrap_or_default();

    let mut batch = MailBatch {
        last_uid_validity: uid_validity,
        last_uid_next: uid_next,
        messages: Vec::new(),
    };

    match sync_state(cursor, uid_validity, uid_next) {
        SyncState::FirstRun => {
            debug!(uid_validity, uid_next, "first observation, anchoring cursor");
            return Ok(batch);
        }
        SyncState::Resync => {
            debug!(
                old_uid_validity = cursor.uid_validity,
                uid_validity, "mailbox UIDVALIDITY changed, resynchronizing"
            );
            return Ok(batch);
        }
        SyncState::Unchanged => {
            debug!(uid_next, "mailbox unchanged");
            return Ok(batch);
        }
        SyncState::Diverged => {}
    }

    let capabilities = session
        .capabilities()
        .await
        .map_err(RetrieveError::Capability)?;
    let esearch = capabilities.has_str("ESEARCH");

    let has_filters = client.filters.iter().any(|f| !f.trim().is_empty());
    let uid_set = if has_filters && esearch {
        let criteria = filter::build_search_criteria(filters, &client.filters, cursor.uid_next)?;

        let found = session
            .uid_search(criteria.to_query())
            .await
            .map_err(RetrieveError::Search)?;

        let mut uids: Vec<u32> = found
            .into_iter()
            .filter(|&uid| uid >= cursor.uid_next)
            .collect();
        uids.sort_unstable();

        if uids.is_empty() {
            return Ok(batch);
        }

        compress_uid_set(&uids)
    } else {
        if has_filters {
            debug!("server lacks ESEARCH, fetching the full UID range unfiltered");
        }
        format!("{}:{}", cursor.uid_next, uid_next - 1)
    };

    // drain the fetch before anything else touches the session
    let fetched = {
        let fetches = session
            .uid_fetch(&uid_set, FETCH_ITEMS)
            .await
            .map_err(RetrieveError::Fetch)?;
        fetches.collect::<Vec<_>>().await
    };

    for item in fetched {
        let item = item.map_err(RetrieveError::Fetch)?;

        match (item.uid, item.body()) {
            (Some(uid), Some(body)) => match super::parse::message(uid, body, client, INBOX) {
                Ok(message) => batch.messages.push(message),
                Err(err) => warn!(
                    uid,
                    kind = "malformed_message",
                    error = %err,
                    "skipping unparseable message"
                ),
            },
            (Some(uid), None) => warn!(
                uid,
                kind = "malformed_message",
                error = %MalformedMessage::MissingBody,
                "skipping fetched item"
            ),
            (None, _) => warn!(
                kind = "malformed_message",
                error = %MalformedMessage::MissingUid,
                "skipping fetched item"
            ),
        }
    }

    batch.messages.sort_unstable_by_key(|message| message.uid);

    Ok(batch)
}

/// Render sorted UIDs as an IMAP sequence set, collapsing runs into ranges.
fn compress_uid_set(uids: &[u32]) -> String {
    let mut parts: Vec<String> = Vec::new();
    let mut run: Option<(u32, u32)> = None;

    for &uid in uids {
        run = match run {
            Some((start, end)) if uid == end + 1 => Some((start, uid)),
            Some((start, end)) => {
                parts.push(range_part(start, end));
                Some((uid, uid))
            }
            None => Some((uid, uid)),
        };
    }
    if let Some((start, end)) = run {
        parts.push(range_part(start, end));
    }

    parts.join(",")
}

fn range_part(start: u32, end: u32) -> String {
    if start == end {
        format!("{start}")
    } else {
        format!("{start}:{end}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unseen_cursor_is_a_first_run() {
        assert_eq!(sync_state(Cursor::default(), 7, 500), SyncState::FirstRun);
    }

    #[test]
    fn validity_change_forces_resync() {
        assert_eq!(sync_state(Cursor::new(7, 100), 8, 200), SyncState::Resync);
    }

    #[test]
    fn equal_state_is_unchanged() {
        assert_eq!(sync_state(Cursor::new(7, 105), 7, 105), SyncState::Unchanged);
    }

    #[test]
    fn lower_server_uid_next_is_treated_as_unchanged() {
        assert_eq!(sync_state(Cursor::new(7, 105), 7, 100), SyncState::Unchanged);
    }

    #[test]
    fn new_mail_diverges() {
        assert_eq!(sync_state(Cursor::new(7, 100), 7, 105), SyncState::Diverged);
    }

    #[test]
    fn compresses_consecutive_uids_into_ranges() {
        assert_eq!(compress_uid_set(&[100, 101, 102, 103, 104]), "100:104");
        assert_eq!(compress_uid_set(&[1, 3, 4, 5, 9]), "1,3:5,9");
        assert_eq!(compress_uid_set(&[42]), "42");
        assert_eq!(compress_uid_set(&[]), "");
    }
}
