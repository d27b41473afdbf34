use std::sync::Arc;

use tokio::time::{timeout_at, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::cursor::{Cursor, CursorStore};
use crate::forwarder::Forwarder;
use crate::imap::MailRetriever;

/// Executes one poll cycle across all configured clients.
///
/// Errors never abort a cycle: a failing client is logged with its error
/// kind and the iteration moves on, leaving the next tick as the retry.
/// Only shutdown or the cycle deadline end a cycle early.
pub struct TaskRunner<R, F> {
    cfg: Arc<Config>,
    store: Arc<CursorStore>,
    retriever: R,
    forwarder: F,
}

impl<R, F> TaskRunner<R, F>
where
    R: MailRetriever + Send + Sync,
    F: Forwarder + Send + Sync,
{
    pub fn new(cfg: Arc<Config>, store: Arc<CursorStore>, retriever: R, forwarder: F) -> Self {
        TaskRunner {
            cfg,
            store,
            retriever,
            forwarder,
        }
    }

    pub async fn run_cycle(&self, shutdown: &CancellationToken) {
        let deadline = Instant::now() + self.cfg.mail_poll_task_timeout;

        for client in &self.cfg.clients {
            if shutdown.is_cancelled() {
                debug!("shutdown requested, aborting poll cycle");
                return;
            }

            if client.contact_points.is_empty() {
                warn!(
                    client = %client.login,
                    kind = "config_error",
                    "client has no contact points configured, skipping"
                );
                continue;
            }

            let cursor = self.store.get(&client.login).unwrap_or_default();
            debug!(client = %client.login, ?cursor, "starting mail retrieval");

            let retrieved = tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    debug!("shutdown requested, aborting poll cycle");
                    return;
                }
                result = timeout_at(deadline, self.retriever.get_mail(client, cursor)) => result,
            };

            let batch = match retrieved {
                Err(_elapsed) => {
                    warn!(
                        client = %client.login,
                        kind = "cancelled",
                        "poll cycle deadline exceeded, deferring to the next tick"
                    );
                    return;
                }
                Ok(Err(err)) => {
                    error!(
                        client = %client.login,
                        kind = err.kind(),
                        error = %err,
                        "mail retrieval failed"
                    );
                    continue;
                }
                Ok(Ok(batch)) => batch,
            };

            // Persist the acknowledged fetch range before forwarding: on a
            // crash in between, re-sending already-fetched mail is
            // preferable to re-receiving it from the server.
            self.store.set(
                &client.login,
                Cursor::new(batch.last_uid_validity, batch.last_uid_next),
            );

            if batch.messages.is_empty() {
                debug!(client = %client.login, "no new messages");
                continue;
            }
            info!(
                client = %client.login,
                count = batch.messages.len(),
                "new messages received"
            );

            for contact in &client.contact_points {
                let forwarded = tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => {
                        debug!("shutdown requested, aborting poll cycle");
                        return;
                    }
                    result = timeout_at(deadline, self.forwarder.forward(contact, &batch.messages)) => result,
                };

                match forwarded {
                    Err(_elapsed) => {
                        warn!(
                            client = %client.login,
                            kind = "cancelled",
                            "poll cycle deadline exceeded while forwarding"
                        );
                        return;
                    }
                    Ok(Err(err)) => {
                        error!(
                            client = %client.login,
                            kind = "forward_error",
                            error = %err,
                            "forwarding failed, skipping remaining contact points"
                        );
                        break;
                    }
                    Ok(Ok(())) => {}
                }
            }
        }
    }
}
