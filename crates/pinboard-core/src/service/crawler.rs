//! The polling ingest loop.
//!
//! ```text
//! Disconnected ──login──► Polling ──cycle──► Waiting ──interval──► Polling
//!      ▲                     │                  │
//!      │   relogin due / failed cycle           │ cancel
//!      └────────────────── QUIT ◄───────────────┘
//! ```
//!
//! A failed login backs off and retries. A failed fetch, parse or delete
//! backs off, keeps the message on the server and forces a fresh login.
//! A dropped connection reconnects after the same backoff and does not count
//! against the message. A rejected LIST ends the crawl.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use pinboard_pop3::{MessageId, ScanListing};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::parser::MessageParser;
use super::session::{Connector, Session, TlsConnector, connect_and_login};
use crate::attachment::AttachmentStore;
use crate::config::CrawlerConfig;
use crate::record::{Record, RecordStore};
use crate::{Error, Result};

/// A source of records.
pub trait Crawler {
    /// Runs until `cancel` fires or the source fails for good, sending each
    /// new record on `output`.
    ///
    /// `output` is dropped on return, which closes the channel.
    fn crawl(
        self,
        output: mpsc::Sender<Record>,
        cancel: CancellationToken,
        interval: Duration,
    ) -> impl Future<Output = ()> + Send;
}

/// Delays used by the crawl loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    /// Session lifetime before a fresh login.
    pub relogin_interval: Duration,
    /// Pause after a failed login.
    pub auth_backoff: Duration,
    /// Pause after a failed cycle.
    pub cycle_backoff: Duration,
    /// Pause between QUIT and the next login.
    pub relogin_pause: Duration,
    /// Sleep granularity while waiting for the next cycle.
    pub wait_tick: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            relogin_interval: Duration::from_secs(60 * 60),
            auth_backoff: Duration::from_secs(5 * 60),
            cycle_backoff: Duration::from_secs(60),
            relogin_pause: Duration::from_secs(3),
            wait_tick: Duration::from_secs(1),
        }
    }
}

impl Timing {
    /// Timing taken from a crawler config.
    #[must_use]
    pub const fn from_config(config: &CrawlerConfig) -> Self {
        Self {
            relogin_interval: config.relogin_interval,
            auth_backoff: config.auth_backoff,
            cycle_backoff: config.cycle_backoff,
            relogin_pause: config.relogin_pause,
            wait_tick: config.wait_tick,
        }
    }
}

/// Crawls one POP3 mailbox, oldest message first.
pub struct MailCrawler<C> {
    connector: C,
    username: String,
    password: String,
    parser: Arc<MessageParser>,
    records: RecordStore,
    timing: Timing,
    max_delivery_attempts: Option<u32>,
}

impl MailCrawler<TlsConnector> {
    /// Builds a TLS crawler from a validated config.
    #[must_use]
    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self::new(
            TlsConnector::new(&config.host, config.port),
            &config.username,
            &config.password,
            MessageParser::new(AttachmentStore::from_config(config)),
            RecordStore::new(&config.record_dir),
        )
        .with_timing(Timing::from_config(config))
        .with_max_delivery_attempts(config.max_delivery_attempts)
    }
}

impl<C: Connector> MailCrawler<C> {
    /// Create a crawler with default timing and no delivery limit.
    #[must_use]
    pub fn new(
        connector: C,
        username: impl Into<String>,
        password: impl Into<String>,
        parser: MessageParser,
        records: RecordStore,
    ) -> Self {
        Self {
            connector,
            username: username.into(),
            password: password.into(),
            parser: Arc::new(parser),
            records,
            timing: Timing::default(),
            max_delivery_attempts: None,
        }
    }

    /// Overrides the loop delays.
    #[must_use]
    pub fn with_timing(mut self, timing: Timing) -> Self {
        self.timing = timing;
        self
    }

    /// Deletes a message after it failed `attempts` cycles in a row.
    #[must_use]
    pub fn with_max_delivery_attempts(mut self, attempts: Option<u32>) -> Self {
        self.max_delivery_attempts = attempts;
        self
    }

    async fn run(self, output: mpsc::Sender<Record>, cancel: CancellationToken, interval: Duration) {
        let server = self.connector.describe();
        info!(server = %server, interval = ?interval, "Start crawling mails");

        let mut session: Option<(Session<C::Stream>, Instant)> = None;
        let mut tracker = DeliveryTracker::new(self.max_delivery_attempts);

        let stop = loop {
            if cancel.is_cancelled() {
                break Stop::Cancelled;
            }

            let Some((mut client, logged_in_at)) = session.take() else {
                match connect_and_login(&self.connector, &self.username, &self.password).await {
                    Ok(client) => session = Some((client, Instant::now())),
                    Err(_) => {
                        info!(backoff = ?self.timing.auth_backoff, "Retrying login after backoff");
                        if !pause(&cancel, self.timing.auth_backoff).await {
                            break Stop::Cancelled;
                        }
                    }
                }
                continue;
            };

            let started = Instant::now();
            let mut relogin_due = false;

            match self.poll(&mut client, &output, &cancel, &mut tracker).await {
                Outcome::Idle | Outcome::Delivered => {}
                Outcome::Failed(e) => {
                    warn!(error = %e, backoff = ?self.timing.cycle_backoff, "Crawling attempt failed");
                    relogin_due = true;
                    if !pause(&cancel, self.timing.cycle_backoff).await {
                        session = Some((client, logged_in_at));
                        break Stop::Cancelled;
                    }
                }
                Outcome::Disconnected(e) => {
                    warn!(error = %e, "Connection lost, logging in again");
                    drop(client);
                    if !pause(&cancel, self.timing.cycle_backoff).await {
                        break Stop::Cancelled;
                    }
                    continue;
                }
                Outcome::Stop(stop) => {
                    session = Some((client, logged_in_at));
                    break stop;
                }
            }

            if !wait_until(&cancel, started + interval, self.timing.wait_tick).await {
                session = Some((client, logged_in_at));
                break Stop::Cancelled;
            }

            if relogin_due || logged_in_at.elapsed() >= self.timing.relogin_interval {
                info!(server = %server, "Relogin to the server");
                quit(client).await;
                if !pause(&cancel, self.timing.relogin_pause).await {
                    break Stop::Cancelled;
                }
                continue;
            }

            session = Some((client, logged_in_at));
        };

        if let Some((client, _)) = session {
            quit(client).await;
        }

        match stop {
            Stop::Cancelled => info!("Crawler cancelled"),
            Stop::ConsumerGone => warn!("Record consumer went away"),
            Stop::ListFailed => error!("Cannot list messages, giving up"),
        }
        drop(output);
        info!(server = %server, "Stop crawling mails");
    }

    /// One polling cycle: list, then ingest the oldest message.
    async fn poll(
        &self,
        client: &mut Session<C::Stream>,
        output: &mpsc::Sender<Record>,
        cancel: &CancellationToken,
        tracker: &mut DeliveryTracker,
    ) -> Outcome {
        debug!("Start new crawling attempt");

        let listings = match client.list_all().await {
            Ok(listings) => listings,
            Err(e) if e.is_connection_lost() => return Outcome::Disconnected(e.into()),
            Err(e) => {
                error!(error = %e, "LIST failed");
                return Outcome::Stop(Stop::ListFailed);
            }
        };
        info!(messages = listings.len(), "Number of messages");

        match client.stat().await {
            Ok(stat) => debug!(count = stat.count, size = stat.size, "Maildrop status"),
            Err(e) => warn!(error = %e, "STAT failed"),
        }

        let Some(head) = listings.iter().min_by_key(|listing| listing.id).copied() else {
            tracker.clear();
            return Outcome::Idle;
        };

        let record = match self.ingest(client, head.id).await {
            Ok(record) => {
                tracker.clear();
                record
            }
            Err(e) if e.is_connection_lost() => return Outcome::Disconnected(e),
            Err(e) => {
                if tracker.record_failure(head.size) {
                    dead_letter(client, head, self.max_delivery_attempts).await;
                }
                return Outcome::Failed(e);
            }
        };

        if let Err(e) = self.records.save(&record) {
            error!(error = %e, "Failed to save record, handing it over anyway");
        }

        let filename = record.filename();
        tokio::select! {
            biased;
            sent = output.send(record) => match sent {
                Ok(()) => {
                    debug!(record = %filename, "Record handed over");
                    Outcome::Delivered
                }
                Err(_) => Outcome::Stop(Stop::ConsumerGone),
            },
            () = cancel.cancelled() => {
                warn!(record = %filename, "Cancelled before the record was handed over");
                Outcome::Stop(Stop::Cancelled)
            }
        }
    }

    /// Fetch, parse, then delete one message.
    async fn ingest(&self, client: &mut Session<C::Stream>, id: MessageId) -> Result<Record> {
        let raw = client.retr(id).await?;
        debug!(id, bytes = raw.len(), "Retrieved message");

        let parser = Arc::clone(&self.parser);
        let record = tokio::task::spawn_blocking(move || parser.parse(&raw)).await??;

        if let Err(e) = client.dele(id).await {
            self.parser.attachments().discard(&record.image_names);
            return Err(e.into());
        }
        info!(id, sender = %record.sender_name, "Deleted message on server");

        Ok(record)
    }
}

impl<C: Connector> Crawler for MailCrawler<C> {
    fn crawl(
        self,
        output: mpsc::Sender<Record>,
        cancel: CancellationToken,
        interval: Duration,
    ) -> impl Future<Output = ()> + Send {
        self.run(output, cancel, interval)
    }
}

/// Why the crawl loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stop {
    Cancelled,
    ConsumerGone,
    ListFailed,
}

/// Result of one polling cycle.
#[derive(Debug)]
enum Outcome {
    Idle,
    Delivered,
    Failed(Error),
    Disconnected(Error),
    Stop(Stop),
}

/// Counts consecutive failures of the head message, identified by size.
#[derive(Debug)]
struct DeliveryTracker {
    limit: Option<u32>,
    head_size: Option<u64>,
    failures: u32,
}

impl DeliveryTracker {
    const fn new(limit: Option<u32>) -> Self {
        Self {
            limit,
            head_size: None,
            failures: 0,
        }
    }

    const fn clear(&mut self) {
        self.head_size = None;
        self.failures = 0;
    }

    /// Returns true once the head message reached the limit.
    fn record_failure(&mut self, size: u64) -> bool {
        let Some(limit) = self.limit else {
            return false;
        };

        if self.head_size == Some(size) {
            self.failures += 1;
        } else {
            self.head_size = Some(size);
            self.failures = 1;
        }

        if self.failures >= limit {
            self.clear();
            true
        } else {
            false
        }
    }
}

async fn dead_letter<S>(client: &mut Session<S>, head: ScanListing, attempts: Option<u32>)
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    match client.dele(head.id).await {
        Ok(()) => error!(
            id = head.id,
            size = head.size,
            attempts,
            "Message failed too often, deleted it from the server"
        ),
        Err(e) => error!(
            id = head.id,
            size = head.size,
            error = %e,
            "Message failed too often, but deleting it failed"
        ),
    }
}

async fn quit<S>(client: Session<S>)
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    if let Err(e) = client.quit().await {
        debug!(error = %e, "QUIT failed");
    }
}

/// Sleeps for `duration`. Returns false if cancelled first.
async fn pause(cancel: &CancellationToken, duration: Duration) -> bool {
    tokio::select! {
        () = cancel.cancelled() => false,
        () = tokio::time::sleep(duration) => true,
    }
}

/// Sleeps in `tick` steps until `deadline`. Returns false if cancelled first.
async fn wait_until(cancel: &CancellationToken, deadline: Instant, tick: Duration) -> bool {
    loop {
        if cancel.is_cancelled() {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        if !pause(cancel, tick.min(deadline - now)).await {
            return false;
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_timing_defaults_match_config_defaults() {
        assert_eq!(
            Timing::default(),
            Timing::from_config(&CrawlerConfig::default())
        );
    }

    #[test]
    fn test_tracker_without_limit_never_gives_up() {
        let mut tracker = DeliveryTracker::new(None);
        for _ in 0..100 {
            assert!(!tracker.record_failure(42));
        }
    }

    #[test]
    fn test_tracker_counts_consecutive_failures() {
        let mut tracker = DeliveryTracker::new(Some(3));
        assert!(!tracker.record_failure(42));
        assert!(!tracker.record_failure(42));
        assert!(tracker.record_failure(42));
        // Counting starts over after giving up.
        assert!(!tracker.record_failure(42));
    }

    #[test]
    fn test_tracker_resets_on_new_head() {
        let mut tracker = DeliveryTracker::new(Some(2));
        assert!(!tracker.record_failure(42));
        assert!(!tracker.record_failure(7));
        assert!(tracker.record_failure(7));

        assert!(!tracker.record_failure(42));
        tracker.clear();
        assert!(!tracker.record_failure(42));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_until_reaches_deadline() {
        let cancel = CancellationToken::new();
        let start = Instant::now();

        assert!(wait_until(&cancel, start + Duration::from_millis(3500), Duration::from_secs(1)).await);
        assert!(start.elapsed() >= Duration::from_millis(3500));
        assert!(start.elapsed() < Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_until_stops_on_cancel() {
        let cancel = CancellationToken::new();
        let start = Instant::now();

        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(2500)).await;
            canceller.cancel();
        });

        assert!(!wait_until(&cancel, start + Duration::from_secs(60), Duration::from_secs(1)).await);
        assert!(start.elapsed() < Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_returns_immediately_when_cancelled() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let start = Instant::now();

        assert!(!pause(&cancel, Duration::from_secs(300)).await);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }
}
