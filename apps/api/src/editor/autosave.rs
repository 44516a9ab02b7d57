//! Autosave — debounced reconciliation of the local snapshot with storage.
//!
//! # Scheduling contract
//! A worker task owns at most one pending snapshot with a deadline. Every
//! change replaces the pending snapshot and pushes the deadline out to
//! `now + debounce`. When the deadline passes, exactly one save is submitted
//! carrying the full fields of the latest snapshot.
//!
//! # Save ordering
//! At most one save per document is in flight. A save submitted while
//! another is running is parked, and a newer one replaces it; the parked
//! save goes out when the running one finishes. Storage therefore sees
//! writes in revision order and the last write is always the newest
//! snapshot. Saves are also numbered, and `SyncStatus` ignores any response
//! older than the newest issued save.
//!
//! # Failure and teardown
//! Failed saves are not retried. The status stays dirty and the next change
//! schedules a fresh save. `shutdown` drops an unfired deadline; a running
//! save and the save parked behind it still complete.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::editor::store::{ChangeSubscriber, SnapshotChange};
use crate::editor::EditorError;
use crate::models::Document;
use crate::persistence::{DocumentPersistence, PersistenceError, SaveReceipt};

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(1000);
const EVENT_CAPACITY: usize = 16;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncStatus {
    /// Latest local revision handed to the synchronizer.
    pub local_revision: u64,
    /// Latest local revision confirmed by storage.
    pub saved_revision: u64,
    /// Number of saves issued so far. Doubles as the sequence of the newest
    /// save.
    pub issued_saves: u64,
    pub remote_updated_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl SyncStatus {
    pub fn is_dirty(&self) -> bool {
        self.local_revision > self.saved_revision
    }
}

/// Transient notifications for the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SyncEvent {
    Saved {
        revision: u64,
        updated_at: DateTime<Utc>,
    },
    Failed {
        revision: u64,
        message: String,
    },
}

enum Command {
    Changed {
        revision: u64,
        snapshot: Arc<Document>,
    },
    Flush,
    Shutdown,
}

struct Shared {
    document_id: Uuid,
    persistence: Arc<dyn DocumentPersistence>,
    status: Mutex<SyncStatus>,
    events: broadcast::Sender<SyncEvent>,
}

impl Shared {
    fn status(&self) -> MutexGuard<'_, SyncStatus> {
        self.status.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Applies a finished save unless a newer save was issued after it.
    fn complete(&self, seq: u64, revision: u64, result: Result<SaveReceipt, PersistenceError>) {
        let mut status = self.status();
        if seq < status.issued_saves {
            let stale = EditorError::Conflict {
                issued: seq,
                latest: status.issued_saves,
            };
            debug!("Document {}: {stale}", self.document_id);
            return;
        }

        let event = match result {
            Ok(receipt) => {
                status.saved_revision = status.saved_revision.max(revision);
                status.remote_updated_at = Some(receipt.updated_at);
                status.last_error = None;
                debug!(
                    "Saved document {} at revision {revision}",
                    self.document_id
                );
                SyncEvent::Saved {
                    revision,
                    updated_at: receipt.updated_at,
                }
            }
            Err(e) => {
                let err = EditorError::from(e);
                warn!(
                    "Autosave of document {} at revision {revision} failed: {err}",
                    self.document_id
                );
                status.last_error = Some(err.to_string());
                SyncEvent::Failed {
                    revision,
                    message: err.to_string(),
                }
            }
        };
        drop(status);
        // No receivers is fine: nobody is watching for notifications.
        let _ = self.events.send(event);
    }
}

pub struct AutosaveSynchronizer {
    tx: mpsc::UnboundedSender<Command>,
    shared: Arc<Shared>,
}

impl AutosaveSynchronizer {
    /// Starts the debounce worker for one document. Must be called from
    /// within a tokio runtime.
    pub fn spawn(
        document_id: Uuid,
        persistence: Arc<dyn DocumentPersistence>,
        debounce: Duration,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let shared = Arc::new(Shared {
            document_id,
            persistence,
            status: Mutex::new(SyncStatus::default()),
            events,
        });

        tokio::spawn(run_worker(rx, Arc::clone(&shared), debounce));
        info!("Autosave started for document {document_id} (debounce {debounce:?})");

        Self { tx, shared }
    }

    pub fn status(&self) -> SyncStatus {
        self.shared.status().clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.shared.events.subscribe()
    }

    /// Fires the pending save now instead of waiting for quiescence.
    pub fn flush(&self) {
        let _ = self.tx.send(Command::Flush);
    }

    /// Cancels the pending deadline. In-flight saves are left to finish.
    pub fn shutdown(&self) {
        let _ = self.tx.send(Command::Shutdown);
    }
}

impl ChangeSubscriber for AutosaveSynchronizer {
    fn on_change(&mut self, change: &SnapshotChange) {
        self.shared.status().local_revision = change.revision;
        let command = Command::Changed {
            revision: change.revision,
            snapshot: Arc::clone(&change.current),
        };
        if self.tx.send(command).is_err() {
            warn!(
                "Autosave worker for document {} is gone; change not scheduled",
                self.shared.document_id
            );
        }
    }
}

/// Serializes saves for one document.
struct SaveQueue {
    in_flight: bool,
    parked: Option<(u64, Arc<Document>)>,
    done: mpsc::UnboundedSender<()>,
}

impl SaveQueue {
    fn submit(&mut self, shared: &Arc<Shared>, revision: u64, snapshot: Arc<Document>) {
        if self.in_flight {
            debug!(
                "Save in flight for document {}; parking revision {revision}",
                shared.document_id
            );
            self.parked = Some((revision, snapshot));
            return;
        }
        self.in_flight = true;
        dispatch(shared, revision, snapshot, self.done.clone());
    }

    fn finished(&mut self, shared: &Arc<Shared>) {
        self.in_flight = false;
        if let Some((revision, snapshot)) = self.parked.take() {
            self.submit(shared, revision, snapshot);
        }
    }
}

async fn run_worker(
    mut rx: mpsc::UnboundedReceiver<Command>,
    shared: Arc<Shared>,
    debounce: Duration,
) {
    let (done, mut done_rx) = mpsc::unbounded_channel();
    let mut queue = SaveQueue {
        in_flight: false,
        parked: None,
        done,
    };
    let mut pending: Option<(u64, Arc<Document>)> = None;
    let deadline = sleep(debounce);
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            command = rx.recv() => match command {
                Some(Command::Changed { revision, snapshot }) => {
                    pending = Some((revision, snapshot));
                    deadline.as_mut().reset(Instant::now() + debounce);
                }
                Some(Command::Flush) => {
                    if let Some((revision, snapshot)) = pending.take() {
                        queue.submit(&shared, revision, snapshot);
                    }
                }
                Some(Command::Shutdown) | None => break,
            },
            () = &mut deadline, if pending.is_some() => {
                if let Some((revision, snapshot)) = pending.take() {
                    queue.submit(&shared, revision, snapshot);
                }
            }
            Some(()) = done_rx.recv() => queue.finished(&shared),
        }
    }

    if let Some((revision, _)) = pending {
        info!(
            "Autosave stopped for document {} with unsaved revision {revision}",
            shared.document_id
        );
    } else {
        info!("Autosave stopped for document {}", shared.document_id);
    }

    // The parked save already fired; send it once the running save is done.
    if let Some((revision, snapshot)) = queue.parked.take() {
        let done = queue.done.clone();
        tokio::spawn(async move {
            if done_rx.recv().await.is_some() {
                dispatch(&shared, revision, snapshot, done);
            }
        });
    }
}

fn dispatch(
    shared: &Arc<Shared>,
    revision: u64,
    snapshot: Arc<Document>,
    done: mpsc::UnboundedSender<()>,
) {
    let seq = {
        let mut status = shared.status();
        status.issued_saves += 1;
        status.issued_saves
    };
    debug!(
        "Issuing save #{seq} for document {} at revision {revision}",
        shared.document_id
    );

    let shared = Arc::clone(shared);
    tokio::spawn(async move {
        let result = shared
            .persistence
            .save(snapshot.id, snapshot.fields())
            .await;
        shared.complete(seq, revision, result);
        // The worker may be gone after shutdown.
        let _ = done.send(());
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor::store::ChangeOrigin;
    use crate::editor::test_support::{sample_document, ScriptedPersistence};

    fn change_to(title: &str, revision: u64) -> SnapshotChange {
        let previous = Arc::new(sample_document());
        let mut doc = sample_document();
        doc.title = title.to_string();
        SnapshotChange {
            previous,
            current: Arc::new(doc),
            revision,
            origin: ChangeOrigin::edit(),
        }
    }

    fn synchronizer(persistence: &Arc<ScriptedPersistence>) -> AutosaveSynchronizer {
        AutosaveSynchronizer::spawn(Uuid::new_v4(), persistence.clone(), DEFAULT_DEBOUNCE)
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_of_changes_produces_one_save_with_latest_state() {
        let persistence = Arc::new(ScriptedPersistence::new());
        let mut autosave = synchronizer(&persistence);

        for i in 1..=5 {
            autosave.on_change(&change_to(&format!("title {i}"), i));
            sleep(Duration::from_millis(300)).await;
        }
        assert_eq!(persistence.save_count(), 0);

        sleep(Duration::from_millis(1500)).await;

        let saves = persistence.saved_fields();
        assert_eq!(saves.len(), 1);
        assert_eq!(saves[0].title, "title 5");
        let status = autosave.status();
        assert_eq!(status.saved_revision, 5);
        assert!(!status.is_dirty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_change_marks_status_dirty_immediately() {
        let persistence = Arc::new(ScriptedPersistence::new());
        let mut autosave = synchronizer(&persistence);
        autosave.on_change(&change_to("edited", 1));
        assert!(autosave.status().is_dirty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_saves_are_serialized_so_latest_lands_last() {
        let persistence = Arc::new(ScriptedPersistence::new().with_delays(&[5000, 10]));
        let mut autosave = synchronizer(&persistence);

        autosave.on_change(&change_to("A", 1));
        sleep(Duration::from_millis(1100)).await; // save of A in flight for 5s
        autosave.on_change(&change_to("B", 2));
        sleep(Duration::from_millis(1100)).await; // B fired, parked behind A

        assert_eq!(persistence.call_count(), 1);
        assert!(autosave.status().is_dirty());

        sleep(Duration::from_millis(5000)).await; // A lands, then B goes out

        let titles: Vec<String> = persistence
            .saved_fields()
            .into_iter()
            .map(|f| f.title)
            .collect();
        assert_eq!(titles, vec!["A", "B"]);

        let status = autosave.status();
        assert_eq!(status.saved_revision, 2);
        assert_eq!(status.remote_updated_at, Some(persistence.receipt_time(2)));
        assert!(!status.is_dirty());
    }

    #[tokio::test]
    async fn test_response_older_than_latest_issued_save_is_ignored() {
        let (events, mut rx) = broadcast::channel(EVENT_CAPACITY);
        let shared = Shared {
            document_id: Uuid::new_v4(),
            persistence: Arc::new(ScriptedPersistence::new()),
            status: Mutex::new(SyncStatus {
                local_revision: 2,
                issued_saves: 2,
                ..SyncStatus::default()
            }),
            events,
        };
        let receipt = |secs| SaveReceipt {
            updated_at: DateTime::<Utc>::from_timestamp(secs, 0).unwrap(),
        };

        shared.complete(1, 1, Ok(receipt(100)));
        assert_eq!(shared.status().saved_revision, 0);
        assert!(rx.try_recv().is_err());

        shared.complete(2, 2, Ok(receipt(200)));
        assert_eq!(shared.status().saved_revision, 2);
        assert_eq!(
            rx.try_recv().unwrap(),
            SyncEvent::Saved {
                revision: 2,
                updated_at: receipt(200).updated_at,
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_parked_save_is_replaced_by_newer_snapshot() {
        let persistence = Arc::new(ScriptedPersistence::new().with_delays(&[5000]));
        let mut autosave = synchronizer(&persistence);

        autosave.on_change(&change_to("A", 1));
        sleep(Duration::from_millis(1100)).await;
        autosave.on_change(&change_to("B", 2));
        sleep(Duration::from_millis(1100)).await;
        autosave.on_change(&change_to("C", 3));
        sleep(Duration::from_millis(6000)).await;

        let titles: Vec<String> = persistence
            .saved_fields()
            .into_iter()
            .map(|f| f.title)
            .collect();
        assert_eq!(titles, vec!["A", "C"]);
        assert_eq!(autosave.status().saved_revision, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_save_is_reported_and_not_retried() {
        let persistence = Arc::new(ScriptedPersistence::new().failing_on(&[1]));
        let mut autosave = synchronizer(&persistence);
        let mut events = autosave.subscribe();

        autosave.on_change(&change_to("A", 1));
        sleep(Duration::from_millis(1100)).await;

        let event = events.recv().await.unwrap();
        assert!(matches!(event, SyncEvent::Failed { revision: 1, .. }));
        let status = autosave.status();
        assert!(status.is_dirty());
        assert!(status.last_error.is_some());

        sleep(Duration::from_millis(10_000)).await;
        assert_eq!(persistence.call_count(), 1);

        // The next edit goes through the normal debounce and succeeds.
        autosave.on_change(&change_to("B", 2));
        sleep(Duration::from_millis(1100)).await;
        assert!(matches!(events.recv().await.unwrap(), SyncEvent::Saved { revision: 2, .. }));
        let status = autosave.status();
        assert!(!status.is_dirty());
        assert!(status.last_error.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_cancels_pending_save() {
        let persistence = Arc::new(ScriptedPersistence::new());
        let mut autosave = synchronizer(&persistence);

        autosave.on_change(&change_to("never saved", 1));
        sleep(Duration::from_millis(500)).await;
        autosave.shutdown();
        sleep(Duration::from_millis(5000)).await;

        assert_eq!(persistence.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_lets_in_flight_save_finish() {
        let persistence = Arc::new(ScriptedPersistence::new().with_delays(&[2000]));
        let mut autosave = synchronizer(&persistence);

        autosave.on_change(&change_to("in flight", 1));
        sleep(Duration::from_millis(1100)).await;
        autosave.shutdown();
        sleep(Duration::from_millis(3000)).await;

        assert_eq!(persistence.save_count(), 1);
        assert_eq!(autosave.status().saved_revision, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_still_sends_parked_save() {
        let persistence = Arc::new(ScriptedPersistence::new().with_delays(&[2000]));
        let mut autosave = synchronizer(&persistence);

        autosave.on_change(&change_to("A", 1));
        sleep(Duration::from_millis(1100)).await;
        autosave.on_change(&change_to("B", 2));
        sleep(Duration::from_millis(1100)).await;
        autosave.shutdown();
        sleep(Duration::from_millis(3000)).await;

        let titles: Vec<String> = persistence
            .saved_fields()
            .into_iter()
            .map(|f| f.title)
            .collect();
        assert_eq!(titles, vec!["A", "B"]);
        assert!(!autosave.status().is_dirty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_saves_without_waiting() {
        let persistence = Arc::new(ScriptedPersistence::new());
        let mut autosave = synchronizer(&persistence);

        autosave.on_change(&change_to("now", 1));
        autosave.flush();
        sleep(Duration::from_millis(10)).await;

        assert_eq!(persistence.save_count(), 1);

        // Nothing pending any more: the original deadline does not fire again.
        sleep(Duration::from_millis(2000)).await;
        assert_eq!(persistence.save_count(), 1);
    }
}
