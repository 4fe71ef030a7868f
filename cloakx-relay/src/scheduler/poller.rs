//! Event poller
//!
//! Follows the ledger event log of one tracked event type. Each tick reads
//! the page after the current cursor, hands it to the type's handler and
//! only then persists the new cursor. A failed query, handler or cursor
//! write leaves the cursor where it was, so the same page is read again on
//! the next tick.
//!
//! An operator cursor reset is observed through a generation counter: the
//! loop drops its in-memory cursor and replays from genesis.

use anyhow::{Context, Result};
use async_trait::async_trait;
use cloakx_core::domain::cursor::EventId;
use cloakx_core::domain::event::{EventFilter, LedgerEvent};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{self, Duration};
use tracing::{debug, error, info, warn};

use crate::repository::{CursorRepository, LedgerRepository};

/// Handles one page of events, in ledger order
///
/// Handlers must be idempotent: a page is delivered again whenever the
/// cursor could not be persisted after it.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, events: &[LedgerEvent]) -> Result<()>;
}

/// An event type followed by its own poller loop
#[derive(Clone)]
pub struct EventTracker {
    /// Cursor key
    pub event_type: String,
    pub filter: EventFilter,
    pub handler: Arc<dyn EventHandler>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollStatus {
    /// Nothing new
    Idle,
    Advanced,
    QueryFailed,
    HandlerFailed,
    CursorWriteFailed,
    /// Cursors were reset while the batch was handled; nothing written
    Reset,
}

/// Result of a single tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollOutcome {
    /// Cursor to start the next tick from
    pub cursor: Option<EventId>,
    /// Whether the ledger reported more pages after this one
    pub has_more: bool,
    pub handled: usize,
    pub status: PollStatus,
}

impl PollOutcome {
    fn unchanged(cursor: Option<EventId>, status: PollStatus) -> Self {
        Self {
            cursor,
            has_more: false,
            handled: 0,
            status,
        }
    }
}

/// Polls the ledger for tracked event types
pub struct EventPoller {
    ledger: Arc<dyn LedgerRepository>,
    cursors: Arc<dyn CursorRepository>,
    poll_interval: Duration,
    page_size: usize,
    reset: Option<watch::Receiver<u64>>,
}

impl EventPoller {
    pub fn new(
        ledger: Arc<dyn LedgerRepository>,
        cursors: Arc<dyn CursorRepository>,
        poll_interval: Duration,
        page_size: usize,
    ) -> Self {
        Self {
            ledger,
            cursors,
            poll_interval,
            page_size,
            reset: None,
        }
    }

    /// Makes every loop restart from genesis when `reset` changes
    pub fn with_reset_signal(mut self, reset: watch::Receiver<u64>) -> Self {
        self.reset = Some(reset);
        self
    }

    /// Reads the persisted cursor of a tracker, `None` meaning genesis
    pub async fn load_cursor(&self, tracker: &EventTracker) -> Result<Option<EventId>> {
        self.cursors
            .get(&tracker.event_type)
            .await
            .with_context(|| format!("Failed to load cursor for {}", tracker.event_type))
    }

    /// Runs the polling loop from `cursor` until `shutdown` turns true
    pub async fn run_from(
        &self,
        tracker: EventTracker,
        mut cursor: Option<EventId>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        info!(
            "Starting poller for {} (interval: {:?}, from: {})",
            tracker.event_type,
            self.poll_interval,
            cursor
                .as_ref()
                .map_or_else(|| "genesis".to_string(), |c| c.to_string())
        );

        let mut reset = self.reset.clone();
        let mut failures: u32 = 0;

        loop {
            if *shutdown.borrow() {
                break;
            }

            if let Some(reset) = reset.as_mut() {
                if reset.has_changed().unwrap_or(false) {
                    let _ = reset.borrow_and_update();
                    warn!(
                        "Cursor for {} was reset, replaying from genesis",
                        tracker.event_type
                    );
                    cursor = None;
                }
            }

            let outcome = self
                .poll_after(&tracker, cursor.clone(), reset.as_ref())
                .await;
            match outcome.status {
                PollStatus::Advanced => {
                    failures = 0;
                    info!(
                        "Processed {} {} event(s), cursor now {}",
                        outcome.handled,
                        tracker.event_type,
                        outcome
                            .cursor
                            .as_ref()
                            .map_or_else(|| "genesis".to_string(), |c| c.to_string())
                    );
                }
                PollStatus::Idle | PollStatus::Reset => failures = 0,
                PollStatus::QueryFailed
                | PollStatus::HandlerFailed
                | PollStatus::CursorWriteFailed => {
                    failures += 1;
                    if failures % 10 == 0 {
                        warn!(
                            "{} consecutive failed polls for {}",
                            failures, tracker.event_type
                        );
                    }
                }
            }
            cursor = outcome.cursor;

            if outcome.has_more {
                continue;
            }

            tokio::select! {
                _ = time::sleep(self.poll_interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!("Poller for {} stopped", tracker.event_type);
    }

    /// Performs a single tick starting after `cursor`
    pub async fn poll_once(&self, tracker: &EventTracker, cursor: Option<EventId>) -> PollOutcome {
        self.poll_after(tracker, cursor, None).await
    }

    /// Single tick that leaves the stored cursor alone when `reset` changed
    /// while the batch was handled
    async fn poll_after(
        &self,
        tracker: &EventTracker,
        cursor: Option<EventId>,
        reset: Option<&watch::Receiver<u64>>,
    ) -> PollOutcome {
        let page = match self
            .ledger
            .query_events(&tracker.filter, cursor.as_ref(), self.page_size)
            .await
        {
            Ok(page) => page,
            Err(e) => {
                warn!("Event query for {} failed: {}", tracker.event_type, e);
                return PollOutcome::unchanged(cursor, PollStatus::QueryFailed);
            }
        };

        let Some(last) = page.data.last() else {
            debug!("No new {} events", tracker.event_type);
            return PollOutcome::unchanged(cursor, PollStatus::Idle);
        };
        let next = page.next_cursor.clone().unwrap_or_else(|| last.id.clone());
        let handled = page.data.len();

        if let Err(e) = tracker.handler.handle(&page.data).await {
            error!(
                "Handler for {} failed on a batch of {} event(s): {:#}",
                tracker.event_type, handled, e
            );
            return PollOutcome::unchanged(cursor, PollStatus::HandlerFailed);
        }

        if reset.is_some_and(|r| r.has_changed().unwrap_or(false)) {
            warn!(
                "Cursors were reset during a {} batch, not persisting {}",
                tracker.event_type, next
            );
            return PollOutcome::unchanged(None, PollStatus::Reset);
        }

        if let Err(e) = self.cursors.set(&tracker.event_type, &next).await {
            error!(
                "Failed to persist {} cursor at {}: {}",
                tracker.event_type, next, e
            );
            return PollOutcome::unchanged(cursor, PollStatus::CursorWriteFailed);
        }

        PollOutcome {
            cursor: Some(next),
            has_more: page.has_next_page,
            handled,
            status: PollStatus::Advanced,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::fakes::{ScriptedLedger, event_id, job_created_event};
    use crate::repository::{InMemoryCursorRepository, LedgerError};
    use cloakx_core::domain::event::EventPage;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingHandler {
        fail: Mutex<bool>,
        seen: Mutex<Vec<EventId>>,
    }

    #[async_trait]
    impl EventHandler for RecordingHandler {
        async fn handle(&self, events: &[LedgerEvent]) -> Result<()> {
            if *self.fail.lock().unwrap() {
                anyhow::bail!("storage unavailable");
            }
            self.seen
                .lock()
                .unwrap()
                .extend(events.iter().map(|e| e.id.clone()));
            Ok(())
        }
    }

    fn page(seqs: &[u64], next: Option<u64>, has_next_page: bool) -> EventPage {
        EventPage {
            data: seqs.iter().map(|s| job_created_event(*s, *s)).collect(),
            next_cursor: next.map(event_id),
            has_next_page,
        }
    }

    struct Setup {
        ledger: Arc<ScriptedLedger>,
        cursors: Arc<InMemoryCursorRepository>,
        handler: Arc<RecordingHandler>,
        poller: EventPoller,
        tracker: EventTracker,
    }

    fn setup() -> Setup {
        let ledger = Arc::new(ScriptedLedger::new());
        let cursors = Arc::new(InMemoryCursorRepository::new());
        let handler = Arc::new(RecordingHandler::default());
        let poller = EventPoller::new(
            ledger.clone(),
            cursors.clone(),
            Duration::from_millis(10),
            50,
        );
        let tracker = EventTracker {
            event_type: "JobCreated".to_string(),
            filter: EventFilter::MoveEventModule {
                package: "0x1".to_string(),
                module: "jobs".to_string(),
            },
            handler: handler.clone(),
        };
        Setup {
            ledger,
            cursors,
            handler,
            poller,
            tracker,
        }
    }

    #[tokio::test]
    async fn test_cursor_not_advanced_when_handler_fails() {
        let s = setup();
        *s.handler.fail.lock().unwrap() = true;
        s.ledger.push_page(Ok(page(&[1, 2], Some(2), false)));

        let outcome = s.poller.poll_once(&s.tracker, None).await;
        assert_eq!(outcome.status, PollStatus::HandlerFailed);
        assert_eq!(outcome.cursor, None);
        assert_eq!(s.cursors.get("JobCreated").await.unwrap(), None);

        // Same page again once the handler recovers
        *s.handler.fail.lock().unwrap() = false;
        s.ledger.push_page(Ok(page(&[1, 2], Some(2), false)));

        let outcome = s.poller.poll_once(&s.tracker, outcome.cursor).await;
        assert_eq!(outcome.status, PollStatus::Advanced);
        assert_eq!(outcome.handled, 2);
        assert_eq!(outcome.cursor, Some(event_id(2)));
        assert_eq!(
            s.cursors.get("JobCreated").await.unwrap(),
            Some(event_id(2))
        );
        assert_eq!(*s.ledger.queried_from.lock().unwrap(), vec![None, None]);
    }

    #[tokio::test]
    async fn test_query_failure_keeps_cursor() {
        let s = setup();
        s.ledger
            .push_page(Err(LedgerError::Decode("rate limited".to_string())));

        let outcome = s.poller.poll_once(&s.tracker, Some(event_id(4))).await;
        assert_eq!(outcome.status, PollStatus::QueryFailed);
        assert_eq!(outcome.cursor, Some(event_id(4)));
        assert!(s.handler.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_page_is_idle() {
        let s = setup();

        let outcome = s.poller.poll_once(&s.tracker, Some(event_id(4))).await;
        assert_eq!(outcome.status, PollStatus::Idle);
        assert_eq!(outcome.cursor, Some(event_id(4)));
        assert!(!outcome.has_more);
        assert_eq!(s.cursors.get("JobCreated").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_missing_next_cursor_falls_back_to_last_event() {
        let s = setup();
        s.ledger.push_page(Ok(page(&[5, 6], None, true)));

        let outcome = s.poller.poll_once(&s.tracker, None).await;
        assert_eq!(outcome.cursor, Some(event_id(6)));
        assert!(outcome.has_more);
        assert_eq!(
            *s.handler.seen.lock().unwrap(),
            vec![event_id(5), event_id(6)]
        );
    }

    #[tokio::test]
    async fn test_run_from_drains_pages_then_stops_on_shutdown() {
        let s = setup();
        s.ledger.push_page(Ok(page(&[1], Some(1), true)));
        s.ledger.push_page(Ok(page(&[2], Some(2), false)));

        let (tx, rx) = watch::channel(false);
        let Setup {
            poller,
            tracker,
            handler,
            cursors,
            ..
        } = s;
        let task = tokio::spawn(async move { poller.run_from(tracker, None, rx).await });

        for _ in 0..100 {
            if handler.seen.lock().unwrap().len() == 2 {
                break;
            }
            time::sleep(Duration::from_millis(5)).await;
        }

        tx.send(true).unwrap();
        task.await.unwrap();

        assert_eq!(cursors.get("JobCreated").await.unwrap(), Some(event_id(2)));
    }

    struct ResettingHandler {
        reset: watch::Sender<u64>,
    }

    #[async_trait]
    impl EventHandler for ResettingHandler {
        async fn handle(&self, _events: &[LedgerEvent]) -> Result<()> {
            self.reset.send_modify(|generation| *generation += 1);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_reset_during_batch_skips_cursor_write() {
        let mut s = setup();
        let (reset_tx, reset_rx) = watch::channel(0u64);
        s.tracker.handler = Arc::new(ResettingHandler { reset: reset_tx });
        s.ledger.push_page(Ok(page(&[1, 2], Some(2), false)));

        let outcome = s
            .poller
            .poll_after(&s.tracker, Some(event_id(0)), Some(&reset_rx))
            .await;

        assert_eq!(outcome.status, PollStatus::Reset);
        assert_eq!(outcome.cursor, None);
        assert_eq!(s.cursors.get("JobCreated").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_reset_signal_replays_from_genesis() {
        let s = setup();
        let (reset_tx, reset_rx) = watch::channel(0u64);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let Setup {
            ledger,
            poller,
            tracker,
            ..
        } = s;
        let poller = poller.with_reset_signal(reset_rx);

        reset_tx.send_modify(|generation| *generation += 1);
        let task =
            tokio::spawn(async move { poller.run_from(tracker, Some(event_id(9)), shutdown_rx).await });

        for _ in 0..100 {
            if !ledger.queried_from.lock().unwrap().is_empty() {
                break;
            }
            time::sleep(Duration::from_millis(5)).await;
        }

        shutdown_tx.send(true).unwrap();
        task.await.unwrap();

        assert_eq!(ledger.queried_from.lock().unwrap()[0], None);
    }
}
