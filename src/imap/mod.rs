//! Incremental IMAP mail retrieval.
//!
//! One connection per (mailbox, cycle): dial, login, select, compare the
//! mailbox UID state against the caller's cursor, search or range-scan for
//! new UIDs, fetch and parse them, log out.

use std::future::Future;

use tokio_rustls::TlsConnector;

use crate::config::ClientConfig;
use crate::cursor::Cursor;
use crate::error::RetrieveError;
use crate::filter::FilterCache;
use crate::message::MailBatch;

mod parse;
mod session;
mod tls;

pub const INBOX: &str = "INBOX";

/// Retrieval seam the runner depends on; the production implementation is
/// [`ImapRetriever`], tests substitute fakes.
pub trait MailRetriever {
    fn get_mail(
        &self,
        client: &ClientConfig,
        cursor: Cursor,
    ) -> impl Future<Output = Result<MailBatch, RetrieveError>> + Send;
}

pub struct ImapRetriever {
    tls: TlsConnector,
    filters: FilterCache,
}

impl ImapRetriever {
    pub fn new() -> Self {
        ImapRetriever {
            tls: tls::connector(),
            filters: FilterCache::new(),
        }
    }
}

impl Default for ImapRetriever {
    fn default() -> Self {
        Self::new()
    }
}

impl MailRetriever for ImapRetriever {
    async fn get_mail(
        &self,
        client: &ClientConfig,
        cursor: Cursor,
    ) -> Result<MailBatch, RetrieveError> {
        session::get_mail(&self.tls, &self.filters, client, cursor).await
    }
}
