mod availability;
mod error;
mod mutations;
mod queries;
mod validate;

pub use availability::room_is_free;
pub use error::StoreError;

use std::future::Future;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot, OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};
use ulid::Ulid;

use crate::model::*;
use crate::observability;
use crate::wal::Wal;

pub type SharedRoomState = Arc<RwLock<RoomState>>;

/// Per-call bound used when none is configured.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(3);

// ── Group-commit WAL channel ─────────────────────────────

pub(super) enum WalCommand {
    Append {
        event: Event,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

/// Background task that owns the WAL and batches appends for group commit:
/// block for the first append, drain whatever else is queued, then fsync once
/// for the whole batch and answer every sender.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            WalCommand::Append { event, response } => {
                let mut batch = vec![(event, response)];
                let mut deferred = None;
                loop {
                    match rx.try_recv() {
                        Ok(WalCommand::Append { event, response }) => batch.push((event, response)),
                        Ok(other) => {
                            deferred = Some(other);
                            break;
                        }
                        Err(_) => break,
                    }
                }

                metrics::histogram!(observability::WAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
                let flush_start = Instant::now();
                let result = flush_batch(&mut wal, &batch);
                metrics::histogram!(observability::WAL_FLUSH_DURATION_SECONDS)
                    .record(flush_start.elapsed().as_secs_f64());
                respond_batch(batch, &result);

                if let Some(other) = deferred {
                    handle_non_append(&mut wal, other);
                }
            }
            other => handle_non_append(&mut wal, other),
        }
    }
}

fn flush_batch(wal: &mut Wal, batch: &[(Event, oneshot::Sender<io::Result<()>>)]) -> io::Result<()> {
    let mut append_err = None;
    for (event, _) in batch {
        if let Err(e) = wal.append_buffered(event) {
            append_err = Some(e);
            break;
        }
    }
    // Flush even after an append error so half-buffered bytes don't leak into the next batch.
    let flush_err = wal.flush_sync().err();
    match (append_err, flush_err) {
        (Some(e), _) | (None, Some(e)) => Err(e),
        (None, None) => Ok(()),
    }
}

fn respond_batch(batch: Vec<(Event, oneshot::Sender<io::Result<()>>)>, result: &io::Result<()>) {
    for (_, tx) in batch {
        let r = match result {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = tx.send(r);
    }
}

fn handle_non_append(wal: &mut Wal, cmd: WalCommand) {
    match cmd {
        WalCommand::Compact { events, response } => {
            let result = Wal::write_compact_file(wal.path(), &events)
                .and_then(|()| wal.swap_compact_file());
            let _ = response.send(result);
        }
        WalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(wal.appends_since_compact());
        }
        WalCommand::Append { .. } => unreachable!(),
    }
}

/// The restriction and reservation store.
///
/// State lives in memory and is rebuilt from the WAL on start. Each room's
/// restriction list sits behind its own lock; reservations and
/// administrators are plain records in concurrent maps.
pub struct Store {
    pub(super) rooms: Arc<DashMap<Ulid, SharedRoomState>>,
    pub(super) reservations: Arc<DashMap<Ulid, Reservation>>,
    pub(super) administrators: Arc<DashMap<Ulid, Administrator>>,
    /// Reverse lookup: restriction id → room id
    pub(super) restriction_to_room: Arc<DashMap<Ulid, Ulid>>,
    /// Reservation id → its guest-booking restriction id
    pub(super) reservation_to_restriction: Arc<DashMap<Ulid, Ulid>>,
    /// Writers hold a read permit from validation until their event is applied.
    /// Compaction takes it exclusively so its snapshot and the log cannot drift.
    pub(super) commit_gate: Arc<RwLock<()>>,
    wal_tx: mpsc::Sender<WalCommand>,
    call_timeout: Duration,
}

pub(super) type CommitPermit = OwnedRwLockReadGuard<()>;
pub(super) type RoomGuard = OwnedRwLockWriteGuard<RoomState>;

/// Handles on the shared maps, owned by a commit that must outlive its caller.
#[derive(Clone)]
struct Indexes {
    rooms: Arc<DashMap<Ulid, SharedRoomState>>,
    reservations: Arc<DashMap<Ulid, Reservation>>,
    administrators: Arc<DashMap<Ulid, Administrator>>,
    restriction_to_room: Arc<DashMap<Ulid, Ulid>>,
    reservation_to_restriction: Arc<DashMap<Ulid, Ulid>>,
}

impl Indexes {
    /// Apply record-level effects of an event (rooms, reservations, administrators).
    fn apply_records(&self, event: &Event) {
        match event {
            Event::RoomCreated { id, name } => {
                self.rooms.entry(*id).or_insert_with(|| {
                    Arc::new(RwLock::new(RoomState::new(Room {
                        id: *id,
                        name: name.clone(),
                    })))
                });
            }
            Event::AdministratorCreated {
                id,
                first_name,
                last_name,
                email,
                password_hash,
                access_level,
            } => {
                self.administrators.insert(
                    *id,
                    Administrator {
                        id: *id,
                        first_name: first_name.clone(),
                        last_name: last_name.clone(),
                        email: email.clone(),
                        password_hash: password_hash.clone(),
                        access_level: *access_level,
                    },
                );
            }
            Event::ReservationCreated { reservation, .. } => {
                self.reservations.insert(reservation.id, reservation.clone());
            }
            Event::ReservationUpdated { id, guest, updated_at } => {
                if let Some(mut r) = self.reservations.get_mut(id) {
                    r.guest = guest.clone();
                    r.updated_at = *updated_at;
                }
            }
            Event::ReservationProcessed {
                id,
                processed,
                updated_at,
            } => {
                if let Some(mut r) = self.reservations.get_mut(id) {
                    r.processed = *processed;
                    r.updated_at = *updated_at;
                }
            }
            Event::ReservationDeleted { id, .. } => {
                self.reservations.remove(id);
            }
            Event::OwnerBlockAdded { .. } | Event::RestrictionRemoved { .. } => {}
        }
    }
}

/// Apply a room-scoped event to a RoomState. The caller holds the lock.
fn apply_to_room(
    rs: &mut RoomState,
    event: &Event,
    restriction_map: &DashMap<Ulid, Ulid>,
    reservation_map: &DashMap<Ulid, Ulid>,
) {
    match event {
        Event::ReservationCreated {
            reservation,
            restriction_id,
        } => {
            rs.insert_restriction(Restriction {
                id: *restriction_id,
                room_id: reservation.room_id,
                span: reservation.stay,
                kind: RestrictionKind::GuestBooking {
                    reservation_id: reservation.id,
                },
            });
            restriction_map.insert(*restriction_id, reservation.room_id);
            reservation_map.insert(reservation.id, *restriction_id);
        }
        Event::ReservationDeleted { id, .. } => {
            if let Some((_, restriction_id)) = reservation_map.remove(id) {
                rs.remove_restriction(restriction_id);
                restriction_map.remove(&restriction_id);
            }
        }
        Event::OwnerBlockAdded { id, room_id, span } => {
            rs.insert_restriction(Restriction {
                id: *id,
                room_id: *room_id,
                span: *span,
                kind: RestrictionKind::OwnerBlock,
            });
            restriction_map.insert(*id, *room_id);
        }
        Event::RestrictionRemoved { id, .. } => {
            rs.remove_restriction(*id);
            restriction_map.remove(id);
        }
        // Record-level events are handled by `Indexes::apply_records`
        Event::RoomCreated { .. }
        | Event::AdministratorCreated { .. }
        | Event::ReservationUpdated { .. }
        | Event::ReservationProcessed { .. } => {}
    }
}

/// Extract the room an event's restrictions live on.
fn event_room_id(event: &Event) -> Option<Ulid> {
    match event {
        Event::ReservationCreated { reservation, .. } => Some(reservation.room_id),
        Event::ReservationDeleted { room_id, .. }
        | Event::OwnerBlockAdded { room_id, .. }
        | Event::RestrictionRemoved { room_id, .. } => Some(*room_id),
        Event::RoomCreated { .. }
        | Event::AdministratorCreated { .. }
        | Event::ReservationUpdated { .. }
        | Event::ReservationProcessed { .. } => None,
    }
}

impl Store {
    /// Replay the WAL at `wal_path` and start its writer task. Must run inside a tokio runtime.
    pub fn open(wal_path: PathBuf, call_timeout: Duration) -> io::Result<Self> {
        let replay = Wal::replay(&wal_path)?;
        let wal = Wal::open(&wal_path, &replay)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        let store = Self {
            rooms: Arc::default(),
            reservations: Arc::default(),
            administrators: Arc::default(),
            restriction_to_room: Arc::default(),
            reservation_to_restriction: Arc::default(),
            commit_gate: Arc::default(),
            wal_tx,
            call_timeout,
        };
        let indexes = store.indexes();

        // Sole owner of these Arcs during replay, so try_write always succeeds.
        // Never block here: this may run inside an async context.
        for event in &replay.events {
            if let Some(room_id) = event_room_id(event) {
                match store.room_state(&room_id) {
                    Some(rs) => {
                        let mut guard = rs
                            .try_write()
                            .map_err(|_| io::Error::other("replay: room state already locked"))?;
                        apply_to_room(
                            &mut guard,
                            event,
                            &store.restriction_to_room,
                            &store.reservation_to_restriction,
                        );
                    }
                    None => tracing::warn!(%room_id, "replay: event for unknown room skipped"),
                }
            }
            indexes.apply_records(event);
        }

        tracing::info!(
            events = replay.events.len(),
            rooms = store.rooms.len(),
            reservations = store.reservations.len(),
            "store replayed"
        );
        Ok(store)
    }

    pub fn call_timeout(&self) -> Duration {
        self.call_timeout
    }

    fn indexes(&self) -> Indexes {
        Indexes {
            rooms: self.rooms.clone(),
            reservations: self.reservations.clone(),
            administrators: self.administrators.clone(),
            restriction_to_room: self.restriction_to_room.clone(),
            reservation_to_restriction: self.reservation_to_restriction.clone(),
        }
    }

    /// Permit to commit one event. Take it before any room lock.
    pub(super) async fn commit_permit(&self) -> CommitPermit {
        self.commit_gate.clone().read_owned().await
    }

    /// Permit plus the room's write lock, in that order.
    pub(super) async fn lock_room(&self, room_id: Ulid) -> Result<(CommitPermit, RoomGuard), StoreError> {
        let rs = self.room_state(&room_id).ok_or(StoreError::NotFound(room_id))?;
        let permit = self.commit_permit().await;
        Ok((permit, rs.write_owned().await))
    }

    /// WAL-append the event, then apply it to the locked room (if any) and the record maps.
    ///
    /// Once the event is queued for the writer, a spawned task owns the rest
    /// of the commit. Dropping this future (a call timeout, a closed
    /// connection) cannot leave an event on disk that memory never saw.
    pub(super) async fn commit(
        &self,
        permit: CommitPermit,
        room: Option<RoomGuard>,
        event: Event,
    ) -> Result<(), StoreError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Append {
                event: event.clone(),
                response: tx,
            })
            .await
            .map_err(|_| StoreError::Unavailable("WAL writer shut down".into()))?;

        let indexes = self.indexes();
        let applied = tokio::spawn(async move {
            let _permit = permit;
            rx.await
                .map_err(|_| StoreError::Unavailable("WAL writer dropped response".into()))?
                .map_err(|e| StoreError::Unavailable(e.to_string()))?;
            if let Some(mut rs) = room {
                apply_to_room(
                    &mut rs,
                    &event,
                    &indexes.restriction_to_room,
                    &indexes.reservation_to_restriction,
                );
            }
            indexes.apply_records(&event);
            Ok::<(), StoreError>(())
        });
        applied
            .await
            .map_err(|e| StoreError::Unavailable(format!("commit task failed: {e}")))?
    }

    /// Hand a compaction snapshot to the writer and wait for the swap.
    pub(super) async fn send_compact(&self, events: Vec<Event>) -> Result<(), StoreError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact { events, response: tx })
            .await
            .map_err(|_| StoreError::Unavailable("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| StoreError::Unavailable("WAL writer dropped response".into()))?
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }

    pub(crate) fn room_state(&self, id: &Ulid) -> Option<SharedRoomState> {
        self.rooms.get(id).map(|e| e.value().clone())
    }

    /// Run one store call under the per-call time bound, recording its outcome.
    pub(super) async fn bounded<T>(
        &self,
        op: &'static str,
        call: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, StoreError> {
        let started = Instant::now();
        let result = match tokio::time::timeout(self.call_timeout, call).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(op, timeout_ms = self.call_timeout.as_millis() as u64, "store call timed out");
                Err(StoreError::Timeout)
            }
        };
        let status = match &result {
            Ok(_) => "ok",
            Err(StoreError::Timeout) => "timeout",
            Err(_) => "error",
        };
        metrics::counter!(observability::STORE_CALLS_TOTAL, "op" => op, "status" => status).increment(1);
        metrics::histogram!(observability::STORE_CALL_DURATION_SECONDS, "op" => op)
            .record(started.elapsed().as_secs_f64());
        result
    }
}

/// The store operations the availability and calendar logic depend on.
#[async_trait]
pub trait RestrictionStore: Send + Sync {
    async fn all_rooms(&self) -> Result<Vec<Room>, StoreError>;

    async fn room(&self, id: Ulid) -> Result<Room, StoreError>;

    /// Rooms with no restriction occupying any night of the stay `[start, end]`.
    async fn find_available_rooms(&self, start: Day, end: Day) -> Result<Vec<Room>, StoreError>;

    async fn is_room_available(&self, start: Day, end: Day, room_id: Ulid) -> Result<bool, StoreError>;

    /// Restrictions on the room whose occupied days touch `[start, end]`.
    async fn restrictions_for_room_in_range(
        &self,
        room_id: Ulid,
        start: Day,
        end: Day,
    ) -> Result<Vec<Restriction>, StoreError>;

    /// Block the room on every day in `[start, end]`. Returns the new restriction id.
    async fn insert_owner_block(&self, room_id: Ulid, start: Day, end: Day) -> Result<Ulid, StoreError>;

    async fn delete_restriction(&self, id: Ulid) -> Result<(), StoreError>;

    /// Counter bumped on every restriction change of the room.
    async fn room_revision(&self, room_id: Ulid) -> Result<u64, StoreError>;
}

#[async_trait]
impl RestrictionStore for Store {
    async fn all_rooms(&self) -> Result<Vec<Room>, StoreError> {
        Store::all_rooms(self).await
    }

    async fn room(&self, id: Ulid) -> Result<Room, StoreError> {
        Store::room(self, id).await
    }

    async fn find_available_rooms(&self, start: Day, end: Day) -> Result<Vec<Room>, StoreError> {
        Store::find_available_rooms(self, start, end).await
    }

    async fn is_room_available(&self, start: Day, end: Day, room_id: Ulid) -> Result<bool, StoreError> {
        Store::is_room_available(self, start, end, room_id).await
    }

    async fn restrictions_for_room_in_range(
        &self,
        room_id: Ulid,
        start: Day,
        end: Day,
    ) -> Result<Vec<Restriction>, StoreError> {
        Store::restrictions_for_room_in_range(self, room_id, start, end).await
    }

    async fn insert_owner_block(&self, room_id: Ulid, start: Day, end: Day) -> Result<Ulid, StoreError> {
        Store::insert_owner_block(self, room_id, start, end).await
    }

    async fn delete_restriction(&self, id: Ulid) -> Result<(), StoreError> {
        Store::delete_restriction(self, id).await
    }

    async fn room_revision(&self, room_id: Ulid) -> Result<u64, StoreError> {
        Store::room_revision(self, room_id).await
    }
}
