use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::Config;
use crate::error::Result;
use crate::forwarder::Forwarder;
use crate::imap::MailRetriever;
use crate::runner::TaskRunner;
use crate::scheduler::{Schedule, Scheduler};

/// Long-lived daemon loop: drives the runner through the scheduler until the
/// shutdown token fires, then waits for the in-flight cycle to wind down.
pub struct Daemon<R, F> {
    cfg: Arc<Config>,
    scheduler: Scheduler,
    runner: Arc<TaskRunner<R, F>>,
}

impl<R, F> Daemon<R, F>
where
    R: MailRetriever + Send + Sync + 'static,
    F: Forwarder + Send + Sync + 'static,
{
    pub fn new(cfg: Arc<Config>, scheduler: Scheduler, runner: Arc<TaskRunner<R, F>>) -> Self {
        Daemon {
            cfg,
            scheduler,
            runner,
        }
    }

    pub async fn run(self, shutdown: CancellationToken) -> Result<()> {
        info!(
            interval = ?self.cfg.mail_poll_interval,
            timeout = ?self.cfg.mail_poll_task_timeout,
            clients = self.cfg.clients.len(),
            "starting mail poll schedule"
        );

        let runner = self.runner.clone();
        let cycle_token = shutdown.clone();
        self.scheduler.schedule(
            shutdown.clone(),
            Schedule {
                interval: self.cfg.mail_poll_interval,
                launch_initially: true,
            },
            move || {
                let runner = runner.clone();
                let token = cycle_token.clone();
                async move { runner.run_cycle(&token).await }
            },
        )?;

        shutdown.cancelled().await;
        self.scheduler.stop();
        self.scheduler.join().await;
        info!("mail poll schedule stopped");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    use tokio::time::sleep;

    use super::*;
    use crate::config::{ClientConfig, ContactPoint, TelegramContactPoint, PROTO_IMAP_TLS};
    use crate::cursor::{Cursor, CursorStore};
    use crate::error::{ForwardError, RetrieveError};
    use crate::message::{MailBatch, Message};

    struct ScriptedRetriever {
        responses: Mutex<VecDeque<MailBatch>>,
    }

    impl MailRetriever for ScriptedRetriever {
        async fn get_mail(
            &self,
            _client: &ClientConfig,
            _cursor: Cursor,
        ) -> std::result::Result<MailBatch, RetrieveError> {
            Ok(self
                .responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_default())
        }
    }

    struct CountingForwarder {
        forwarded: Arc<Mutex<usize>>,
    }

    impl Forwarder for CountingForwarder {
        async fn forward(
            &self,
            _contact: &ContactPoint,
            messages: &[Message],
        ) -> std::result::Result<(), ForwardError> {
            *self.forwarded.lock().unwrap() += messages.len();
            Ok(())
        }
    }

    fn config() -> Arc<Config> {
        Arc::new(Config {
            mail_poll_interval: Duration::from_secs(60),
            mail_poll_task_timeout: Duration::from_secs(30),
            log_level: None,
            clients: vec![ClientConfig {
                proto: PROTO_IMAP_TLS.to_string(),
                address: "imap.example.com:993".to_string(),
                login: "a@example.com".to_string(),
                password: "secret".to_string(),
                mark_as_seen: false,
                include_attachments: false,
                max_attachments_size: bytesize::ByteSize::mb(1),
                filters: Vec::new(),
                contact_points: vec![ContactPoint::Telegram(TelegramContactPoint {
                    bot_token: "t".to_string(),
                    chat_id: 1,
                    silent_mode: false,
                    disable_forwarding: false,
                    parse_mode: None,
                    template: None,
                })],
            }],
        })
    }

    #[tokio::test(start_paused = true)]
    async fn polls_on_schedule_until_shutdown() {
        let store = Arc::new(CursorStore::new());
        let batches = VecDeque::from([
            // first observation anchors, second delivers one message
            MailBatch {
                last_uid_validity: 7,
                last_uid_next: 100,
                messages: Vec::new(),
            },
            MailBatch {
                last_uid_validity: 7,
                last_uid_next: 101,
                messages: vec![Message {
                    uid: 100,
                    ..Default::default()
                }],
            },
        ]);

        let forwarded = Arc::new(Mutex::new(0));
        let runner = Arc::new(TaskRunner::new(
            config(),
            store.clone(),
            ScriptedRetriever {
                responses: Mutex::new(batches),
            },
            CountingForwarder {
                forwarded: forwarded.clone(),
            },
        ));

        let daemon = Daemon::new(config(), Scheduler::new(), runner);
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(daemon.run(shutdown.clone()));

        // initial cycle plus one scheduled tick
        sleep(Duration::from_secs(61)).await;
        shutdown.cancel();
        handle.await.unwrap().unwrap();

        assert_eq!(store.get("a@example.com"), Some(Cursor::new(7, 101)));
        assert_eq!(*forwarded.lock().unwrap(), 1);
    }
}
