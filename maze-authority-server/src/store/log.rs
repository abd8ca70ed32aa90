//! Event Log
//!
//! Per-room ordered event stream with gap-free offsets.
//!
//! `append` admits a record to a bounded in-memory outbox and assigns the
//! next offset on admission. A drain task publishes the outbox to the store
//! in offset order. A record that fails is retried (bounded attempts with
//! exponential backoff, then a pause and another round) and is never
//! skipped, so the stored stream has no holes. Emitted and durable offsets
//! are tracked separately, and the log reports itself degraded while the
//! head of the outbox cannot be delivered. When the outbox is full, new
//! events are shed before they get an offset.
//!
//! A room id keeps one stream across every room built under it. A fresh
//! log continues after the records already stored, and a retired log hands
//! its position and its unfinished drain to the next log of the same room,
//! whose drain waits for the old one before publishing.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{self, Stream};
use serde::Serialize;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::game::events::{EventRecord, GameEvent};
use crate::store::{Store, StoreError};

/// Publish attempts per retry round.
pub const PUBLISH_ATTEMPTS: u32 = 3;

/// Backoff before the second attempt; doubles each attempt.
pub const PUBLISH_BACKOFF: Duration = Duration::from_millis(50);

/// Pause between retry rounds while the store is down.
pub const DEGRADED_PAUSE: Duration = Duration::from_secs(1);

/// Records the outbox holds before new events are shed.
pub const OUTBOX_CAPACITY: usize = 4096;

/// Idle wait between polls of a tail with nothing new.
pub const TAIL_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Maximum records fetched per tail poll.
pub const TAIL_BATCH: usize = 100;

/// Offsets and health of one room's log.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogStatus {
    /// Next offset to be assigned
    pub emitted_offset: u64,
    /// Offset up to which records are confirmed in the store
    pub durable_offset: u64,
    /// Whether the drain is currently failing to publish
    pub degraded: bool,
    /// Events refused because the outbox was full
    pub shed: u64,
}

impl LogStatus {
    /// Admitted records not yet stored.
    pub fn lag(&self) -> u64 {
        self.emitted_offset.saturating_sub(self.durable_offset)
    }
}

/// Progress shared by every log of one room id.
#[derive(Default)]
struct Shared {
    durable: AtomicU64,
    degraded: AtomicBool,
    shed: AtomicU64,
}

impl Shared {
    fn starting_at(durable: u64) -> Self {
        Self {
            durable: AtomicU64::new(durable),
            ..Self::default()
        }
    }
}

/// Outbox-backed event log for one room.
pub struct EventLog {
    room_id: String,
    next_offset: u64,
    outbox: Option<mpsc::Sender<EventRecord>>,
    shared: Arc<Shared>,
    drain: Option<JoinHandle<()>>,
}

/// What a retired log leaves to the next log of the same room.
pub struct LogSuccession {
    room_id: String,
    next_offset: u64,
    shared: Arc<Shared>,
    drain: JoinHandle<()>,
}

impl LogSuccession {
    /// Room the log belonged to.
    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    /// Offset the next log starts at.
    pub fn next_offset(&self) -> u64 {
        self.next_offset
    }

    /// Whether every record of the retired log has been stored.
    pub fn is_drained(&self) -> bool {
        self.drain.is_finished()
    }
}

impl EventLog {
    /// Open the log of `room_id`, continuing after its stored records.
    ///
    /// Fails if the store cannot report the stream length, since offsets
    /// handed out without it could collide with stored records. Must be
    /// called from within a Tokio runtime.
    pub async fn open(room_id: impl Into<String>, store: Store) -> Result<Self, StoreError> {
        let room_id = room_id.into();
        let base = stored_count(&store, &room_id).await?;
        if base > 0 {
            debug!(room_id = %room_id, base, "event log resumes stored stream");
        }
        let shared = Arc::new(Shared::starting_at(base));
        Ok(Self::start(room_id, store, base, shared, None))
    }

    /// Continue a retired log of the same room.
    pub fn succeed(succession: LogSuccession, store: Store) -> Self {
        let LogSuccession {
            room_id,
            next_offset,
            shared,
            drain,
        } = succession;
        Self::start(room_id, store, next_offset, shared, Some(drain))
    }

    fn start(
        room_id: String,
        store: Store,
        next_offset: u64,
        shared: Arc<Shared>,
        predecessor: Option<JoinHandle<()>>,
    ) -> Self {
        let (tx, rx) = mpsc::channel(OUTBOX_CAPACITY);
        let drain = tokio::spawn(drain(room_id.clone(), store, rx, Arc::clone(&shared), predecessor));
        Self {
            room_id,
            next_offset,
            outbox: Some(tx),
            shared,
            drain: Some(drain),
        }
    }

    /// Admit an event and return its offset.
    ///
    /// The offset advances only when the record was accepted into the
    /// outbox. A full outbox sheds the event.
    pub fn append(&mut self, event: GameEvent, ts: i64) -> Result<u64, StoreError> {
        let Some(outbox) = &self.outbox else {
            return Err(StoreError::Closed(self.room_id.clone()));
        };
        let offset = self.next_offset;
        match outbox.try_send(EventRecord::from_event(offset, ts, event)) {
            Ok(()) => {
                self.next_offset += 1;
                Ok(offset)
            }
            Err(TrySendError::Full(_)) => {
                self.shared.shed.fetch_add(1, Ordering::Relaxed);
                Err(StoreError::Backlog {
                    room_id: self.room_id.clone(),
                    capacity: OUTBOX_CAPACITY,
                })
            }
            Err(TrySendError::Closed(_)) => Err(StoreError::Closed(self.room_id.clone())),
        }
    }

    /// Stop admitting events and hand the rest of the stream over.
    ///
    /// The drain keeps publishing what is already queued. Returns `None`
    /// if the log was already retired.
    pub fn retire(&mut self) -> Option<LogSuccession> {
        self.outbox.take()?;
        let drain = self.drain.take()?;
        Some(LogSuccession {
            room_id: self.room_id.clone(),
            next_offset: self.next_offset,
            shared: Arc::clone(&self.shared),
            drain,
        })
    }

    /// Room this log belongs to.
    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    /// Next offset to be assigned.
    pub fn emitted_offset(&self) -> u64 {
        self.next_offset
    }

    /// Offset up to which records are confirmed in the store.
    pub fn durable_offset(&self) -> u64 {
        self.shared.durable.load(Ordering::Acquire)
    }

    /// Current offsets and health.
    pub fn status(&self) -> LogStatus {
        LogStatus {
            emitted_offset: self.emitted_offset(),
            durable_offset: self.durable_offset(),
            degraded: self.shared.degraded.load(Ordering::Acquire),
            shed: self.shared.shed.load(Ordering::Relaxed),
        }
    }
}

async fn drain(
    room_id: String,
    store: Store,
    mut rx: mpsc::Receiver<EventRecord>,
    shared: Arc<Shared>,
    predecessor: Option<JoinHandle<()>>,
) {
    if let Some(previous) = predecessor {
        if let Err(e) = previous.await {
            error!(room_id = %room_id, error = %e, "previous event log drain failed");
        }
    }

    while let Some(record) = rx.recv().await {
        loop {
            match publish_with_retry(&store, &room_id, &record).await {
                Ok(()) => {
                    shared.durable.store(record.offset + 1, Ordering::Release);
                    if shared.degraded.swap(false, Ordering::AcqRel) {
                        info!(room_id = %room_id, offset = record.offset, "event log recovered");
                    }
                    break;
                }
                Err(e) => {
                    if !shared.degraded.swap(true, Ordering::AcqRel) {
                        if matches!(e, StoreError::Conflict { .. }) {
                            error!(room_id = %room_id, offset = record.offset, error = %e, "event log conflicts with stored stream");
                        } else {
                            warn!(room_id = %room_id, offset = record.offset, error = %e, "event log degraded");
                        }
                    }
                    sleep(DEGRADED_PAUSE).await;
                }
            }
        }
    }
    debug!(room_id = %room_id, "event log drained");
}

async fn publish_with_retry(store: &Store, room_id: &str, record: &EventRecord) -> Result<(), StoreError> {
    let mut backoff = PUBLISH_BACKOFF;
    let mut attempt = 1;
    loop {
        match store.publish_event(room_id, record).await {
            Ok(()) => return Ok(()),
            Err(e) if attempt >= PUBLISH_ATTEMPTS => return Err(e),
            Err(e) => {
                debug!(room_id, offset = record.offset, attempt, error = %e, "event publish failed, retrying");
                sleep(backoff).await;
                backoff *= 2;
                attempt += 1;
            }
        }
    }
}

async fn stored_count(store: &Store, room_id: &str) -> Result<u64, StoreError> {
    let mut backoff = PUBLISH_BACKOFF;
    let mut attempt = 1;
    loop {
        match store.event_count(room_id).await {
            Ok(count) => return Ok(count),
            Err(e) if attempt >= PUBLISH_ATTEMPTS => return Err(e),
            Err(e) => {
                debug!(room_id, attempt, error = %e, "event count failed, retrying");
                sleep(backoff).await;
                backoff *= 2;
                attempt += 1;
            }
        }
    }
}

// =============================================================================
// TAIL
// =============================================================================

/// Reader that follows a room's stored stream.
pub struct EventTail {
    store: Store,
    room_id: String,
    next: u64,
    poll_interval: Duration,
}

impl EventTail {
    /// Start at `offset`.
    pub fn from_offset(store: Store, room_id: impl Into<String>, offset: u64) -> Self {
        Self {
            store,
            room_id: room_id.into(),
            next: offset,
            poll_interval: TAIL_POLL_INTERVAL,
        }
    }

    /// Start after the last currently stored record.
    pub async fn from_latest(store: Store, room_id: impl Into<String>) -> Result<Self, StoreError> {
        let room_id = room_id.into();
        let next = store.event_count(&room_id).await?;
        Ok(Self::from_offset(store, room_id, next))
    }

    /// Override the idle poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Offset of the next record this tail will yield.
    pub fn position(&self) -> u64 {
        self.next
    }

    /// Wait for and return the next non-empty batch.
    pub async fn next_batch(&mut self) -> Result<Vec<EventRecord>, StoreError> {
        loop {
            let batch = self.store.read_events(&self.room_id, self.next, TAIL_BATCH).await?;
            if let Some(last) = batch.last() {
                self.next = last.offset + 1;
                return Ok(batch);
            }
            sleep(self.poll_interval).await;
        }
    }

    /// Endless stream of records. Read errors are logged and retried.
    pub fn into_stream(self) -> impl Stream<Item = EventRecord> + Send {
        stream::unfold((self, VecDeque::new()), |(mut tail, mut buffered)| async move {
            loop {
                if let Some(record) = buffered.pop_front() {
                    return Some((record, (tail, buffered)));
                }
                match tail.next_batch().await {
                    Ok(batch) => buffered.extend(batch),
                    Err(e) => {
                        warn!(room_id = %tail.room_id, offset = tail.next, error = %e, "event tail read failed");
                        sleep(tail.poll_interval).await;
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::events::EventKind;
    use crate::store::MemoryStore;
    use futures_util::StreamExt;
    use serde_json::json;

    fn event(i: u64) -> GameEvent {
        GameEvent::new(i, EventKind::Pickup, format!("p{}", i % 3), json!({ "i": i }))
    }

    async fn wait_durable(log: &EventLog, target: u64) {
        for _ in 0..200 {
            if log.durable_offset() >= target {
                return;
            }
            sleep(Duration::from_millis(10)).await;
        }
        panic!("durable offset stuck at {}", log.durable_offset());
    }

    #[tokio::test]
    async fn test_offsets_are_consecutive_from_zero() {
        let store = Store::memory();
        let mut log = EventLog::open("room", store.clone()).await.unwrap();
        let offsets: Vec<u64> = (0..25).map(|i| log.append(event(i), 0).unwrap()).collect();
        assert_eq!(offsets, (0..25).collect::<Vec<_>>());
        assert_eq!(log.emitted_offset(), 25);

        wait_durable(&log, 25).await;
        let stored = store.read_events("room", 0, 100).await.unwrap();
        let stored_offsets: Vec<u64> = stored.iter().map(|r| r.offset).collect();
        assert_eq!(stored_offsets, (0..25).collect::<Vec<_>>());
        assert_eq!(stored[4].who, "p1");
    }

    #[tokio::test]
    async fn test_outage_degrades_then_recovers_without_gaps() {
        let memory = MemoryStore::new();
        let store = Store::Memory(memory.clone());
        let mut log = EventLog::open("room", store.clone()).await.unwrap();
        memory.set_available(false);

        for i in 0..5 {
            log.append(event(i), 0).unwrap();
        }

        // Emission keeps going while nothing is durable.
        sleep(Duration::from_millis(400)).await;
        let status = log.status();
        assert_eq!(status.emitted_offset, 5);
        assert_eq!(status.durable_offset, 0);
        assert!(status.degraded);
        assert_eq!(status.lag(), 5);

        memory.set_available(true);
        wait_durable(&log, 5).await;
        assert!(!log.status().degraded);
        assert_eq!(store.event_count("room").await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_rooms_have_separate_offsets() {
        let store = Store::memory();
        let mut a = EventLog::open("a", store.clone()).await.unwrap();
        let mut b = EventLog::open("b", store.clone()).await.unwrap();
        assert_eq!(a.append(event(0), 0).unwrap(), 0);
        assert_eq!(b.append(event(0), 0).unwrap(), 0);
        assert_eq!(a.append(event(1), 0).unwrap(), 1);
    }

    #[tokio::test]
    async fn test_tail_from_offset_and_latest() {
        let store = Store::memory();
        let mut log = EventLog::open("room", store.clone()).await.unwrap();
        for i in 0..3 {
            log.append(event(i), 0).unwrap();
        }
        wait_durable(&log, 3).await;

        let mut from_one = EventTail::from_offset(store.clone(), "room", 1);
        let batch = from_one.next_batch().await.unwrap();
        assert_eq!(batch.iter().map(|r| r.offset).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(from_one.position(), 3);

        let latest = EventTail::from_latest(store.clone(), "room")
            .await
            .unwrap()
            .with_poll_interval(Duration::from_millis(10));
        assert_eq!(latest.position(), 3);

        let mut stream = Box::pin(latest.into_stream());
        log.append(event(3), 0).unwrap();
        log.append(event(4), 0).unwrap();

        let first = tokio::time::timeout(Duration::from_secs(2), stream.next()).await.unwrap().unwrap();
        let second = tokio::time::timeout(Duration::from_secs(2), stream.next()).await.unwrap().unwrap();
        assert_eq!((first.offset, second.offset), (3, 4));
    }

    #[tokio::test]
    async fn test_reopened_log_continues_stored_stream() {
        let store = Store::memory();
        let mut first = EventLog::open("room", store.clone()).await.unwrap();
        for tick in 0..3 {
            first.append(event(tick), 0).unwrap();
        }
        wait_durable(&first, 3).await;
        drop(first);

        let mut second = EventLog::open("room", store.clone()).await.unwrap();
        assert_eq!(second.emitted_offset(), 3);
        assert_eq!(second.durable_offset(), 3);
        assert_eq!(second.append(event(100), 0).unwrap(), 3);
        assert_eq!(second.append(event(101), 0).unwrap(), 4);
        wait_durable(&second, 5).await;

        let stored = store.read_events("room", 0, 10).await.unwrap();
        let ticks: Vec<u64> = stored.iter().map(|r| r.tick).collect();
        assert_eq!(ticks, vec![0, 1, 2, 100, 101]);
        assert!(!second.status().degraded);
    }

    #[tokio::test]
    async fn test_open_fails_when_store_cannot_be_counted() {
        let memory = MemoryStore::new();
        memory.set_available(false);
        let opened = EventLog::open("room", Store::Memory(memory)).await;
        assert!(matches!(opened, Err(StoreError::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_successor_waits_for_retired_drain() {
        let memory = MemoryStore::new();
        let store = Store::Memory(memory.clone());
        let mut first = EventLog::open("room", store.clone()).await.unwrap();
        memory.set_available(false);
        for tick in 0..3 {
            first.append(event(tick), 0).unwrap();
        }

        let succession = first.retire().unwrap();
        assert!(first.retire().is_none());
        assert!(matches!(first.append(event(9), 0), Err(StoreError::Closed(_))));
        assert_eq!(succession.room_id(), "room");
        assert_eq!(succession.next_offset(), 3);
        assert!(!succession.is_drained());

        let mut second = EventLog::succeed(succession, store.clone());
        assert_eq!(second.append(event(100), 0).unwrap(), 3);
        assert_eq!(second.append(event(101), 0).unwrap(), 4);
        sleep(Duration::from_millis(200)).await;
        assert_eq!(second.durable_offset(), 0);

        memory.set_available(true);
        wait_durable(&second, 5).await;
        let stored = store.read_events("room", 0, 10).await.unwrap();
        let offsets: Vec<u64> = stored.iter().map(|r| r.offset).collect();
        let ticks: Vec<u64> = stored.iter().map(|r| r.tick).collect();
        assert_eq!(offsets, vec![0, 1, 2, 3, 4]);
        assert_eq!(ticks, vec![0, 1, 2, 100, 101]);
    }

    #[tokio::test]
    async fn test_full_outbox_sheds_without_gaps() {
        let memory = MemoryStore::new();
        let store = Store::Memory(memory.clone());
        let mut log = EventLog::open("room", store.clone()).await.unwrap();
        memory.set_available(false);

        let mut admitted = 0;
        let mut refused = 0;
        for i in 0..(OUTBOX_CAPACITY as u64 + 2) {
            match log.append(event(i), 0) {
                Ok(offset) => {
                    assert_eq!(offset, admitted);
                    admitted += 1;
                }
                Err(StoreError::Backlog { capacity, .. }) => {
                    assert_eq!(capacity, OUTBOX_CAPACITY);
                    refused += 1;
                }
                Err(e) => panic!("unexpected error {e}"),
            }
        }
        assert!(refused >= 1);
        assert_eq!(log.emitted_offset(), admitted);
        assert_eq!(log.status().shed, refused);

        memory.set_available(true);
        for _ in 0..500 {
            if log.durable_offset() >= admitted {
                break;
            }
            sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(log.durable_offset(), admitted);
        assert_eq!(log.append(event(0), 0).unwrap(), admitted);
        assert_eq!(store.event_count("room").await.unwrap(), admitted);
    }
}
