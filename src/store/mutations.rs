use chrono::Utc;
use tokio::sync::oneshot;
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;

use super::validate::{check_no_conflict, validate_block, validate_guest, validate_stay};
use super::{Store, StoreError, WalCommand};

impl Store {
    pub async fn create_room(&self, name: &str) -> Result<Room, StoreError> {
        self.bounded("create_room", async {
            let name = name.trim();
            if name.is_empty() {
                return Err(StoreError::Validation("room name is empty".into()));
            }
            if name.len() > MAX_NAME_LEN {
                return Err(StoreError::LimitExceeded("room name too long"));
            }
            if self.rooms.len() >= MAX_ROOMS {
                return Err(StoreError::LimitExceeded("too many rooms"));
            }
            let permit = self.commit_permit().await;
            let room = Room {
                id: Ulid::new(),
                name: name.to_string(),
            };
            let event = Event::RoomCreated {
                id: room.id,
                name: room.name.clone(),
            };
            self.commit(permit, None, event).await?;
            tracing::info!(room_id = %room.id, name, "room created");
            Ok(room)
        })
        .await
    }

    pub async fn create_administrator(
        &self,
        first_name: &str,
        last_name: &str,
        email: &str,
        password_hash: String,
        access_level: u8,
    ) -> Result<Ulid, StoreError> {
        self.bounded("create_administrator", async {
            if email.trim().is_empty() {
                return Err(StoreError::Validation("administrator email is empty".into()));
            }
            if [first_name, last_name, email].iter().any(|f| f.len() > MAX_NAME_LEN) {
                return Err(StoreError::LimitExceeded("administrator field too long"));
            }
            let permit = self.commit_permit().await;
            if self
                .administrators
                .iter()
                .any(|a| a.email.eq_ignore_ascii_case(email))
            {
                return Err(StoreError::Validation(format!("administrator {email} already exists")));
            }
            let id = Ulid::new();
            let event = Event::AdministratorCreated {
                id,
                first_name: first_name.to_string(),
                last_name: last_name.to_string(),
                email: email.to_string(),
                password_hash,
                access_level,
            };
            self.commit(permit, None, event).await?;
            Ok(id)
        })
        .await
    }

    /// Store a reservation together with its guest-booking restriction.
    ///
    /// The availability check and the write happen under the room's write
    /// lock, so two guests racing for the same nights cannot both succeed.
    pub async fn insert_reservation(
        &self,
        room_id: Ulid,
        guest: GuestDetails,
        arrival: Day,
        departure: Day,
    ) -> Result<Reservation, StoreError> {
        self.bounded("insert_reservation", async {
            let stay = validate_stay(arrival, departure)?;
            validate_guest(&guest)?;
            let (permit, guard) = self.lock_room(room_id).await?;
            if guard.restrictions.len() >= MAX_RESTRICTIONS_PER_ROOM {
                return Err(StoreError::LimitExceeded("too many restrictions on room"));
            }
            check_no_conflict(&guard, &DayRange::nights(arrival, departure))?;

            let now = Utc::now();
            let reservation = Reservation {
                id: Ulid::new(),
                room_id,
                guest,
                stay,
                processed: false,
                created_at: now,
                updated_at: now,
            };
            let event = Event::ReservationCreated {
                reservation: reservation.clone(),
                restriction_id: Ulid::new(),
            };
            self.commit(permit, Some(guard), event).await?;
            Ok(reservation)
        })
        .await
    }

    /// Overwrite the guest details of a reservation.
    pub async fn update_reservation(&self, id: Ulid, guest: GuestDetails) -> Result<(), StoreError> {
        self.bounded("update_reservation", async {
            validate_guest(&guest)?;
            let permit = self.commit_permit().await;
            if !self.reservations.contains_key(&id) {
                return Err(StoreError::NotFound(id));
            }
            let event = Event::ReservationUpdated {
                id,
                guest,
                updated_at: Utc::now(),
            };
            self.commit(permit, None, event).await
        })
        .await
    }

    pub async fn set_processed(&self, id: Ulid, processed: bool) -> Result<(), StoreError> {
        self.bounded("set_processed", async {
            let permit = self.commit_permit().await;
            if !self.reservations.contains_key(&id) {
                return Err(StoreError::NotFound(id));
            }
            let event = Event::ReservationProcessed {
                id,
                processed,
                updated_at: Utc::now(),
            };
            self.commit(permit, None, event).await
        })
        .await
    }

    /// Delete a reservation and free the nights it held.
    pub async fn delete_reservation(&self, id: Ulid) -> Result<(), StoreError> {
        self.bounded("delete_reservation", async {
            let room_id = self
                .reservations
                .get(&id)
                .map(|r| r.room_id)
                .ok_or(StoreError::NotFound(id))?;
            let (permit, guard) = self.lock_room(room_id).await?;
            // Lost a race with another delete while waiting for the lock
            if !self.reservations.contains_key(&id) {
                return Err(StoreError::NotFound(id));
            }
            let event = Event::ReservationDeleted { id, room_id };
            self.commit(permit, Some(guard), event).await
        })
        .await
    }

    pub async fn insert_owner_block(&self, room_id: Ulid, start: Day, end: Day) -> Result<Ulid, StoreError> {
        self.bounded("insert_owner_block", async {
            let span = validate_block(start, end)?;
            let (permit, guard) = self.lock_room(room_id).await?;
            if guard.restrictions.len() >= MAX_RESTRICTIONS_PER_ROOM {
                return Err(StoreError::LimitExceeded("too many restrictions on room"));
            }
            let id = Ulid::new();
            let event = Event::OwnerBlockAdded { id, room_id, span };
            self.commit(permit, Some(guard), event).await?;
            Ok(id)
        })
        .await
    }

    /// Delete an owner block. Guest bookings go away with their reservation only.
    pub async fn delete_restriction(&self, id: Ulid) -> Result<(), StoreError> {
        self.bounded("delete_restriction", async {
            let room_id = self
                .restriction_to_room
                .get(&id)
                .map(|e| *e.value())
                .ok_or(StoreError::NotFound(id))?;
            let (permit, guard) = self.lock_room(room_id).await?;
            match guard.restrictions.iter().find(|r| r.id == id) {
                None => return Err(StoreError::NotFound(id)),
                Some(r) if !r.is_owner_block() => {
                    return Err(StoreError::Validation(
                        "restriction belongs to a reservation; delete the reservation instead".into(),
                    ));
                }
                Some(_) => {}
            }
            let event = Event::RestrictionRemoved { id, room_id };
            self.commit(permit, Some(guard), event).await
        })
        .await
    }

    /// Create the given rooms when the store holds none. Returns how many were made.
    pub async fn seed_rooms_if_empty(&self, names: &[&str]) -> Result<usize, StoreError> {
        if !self.rooms.is_empty() {
            return Ok(0);
        }
        for name in names {
            self.create_room(name).await?;
        }
        Ok(names.len())
    }

    // ── WAL compaction ───────────────────────────────────────

    /// Rewrite the WAL as the minimal event list that rebuilds current state.
    ///
    /// Writers are held off for the whole call: every commit already queued
    /// is applied before the snapshot is taken, and none starts until the
    /// compacted file has replaced the log.
    pub async fn compact_wal(&self) -> Result<(), StoreError> {
        let _exclusive = self.commit_gate.write().await;
        let mut events = Vec::new();

        let handles: Vec<_> = self.rooms.iter().map(|e| e.value().clone()).collect();
        let mut blocks = Vec::new();
        for rs in handles {
            let guard = rs.read().await;
            events.push(Event::RoomCreated {
                id: guard.room.id,
                name: guard.room.name.clone(),
            });
            for r in guard.restrictions.iter().filter(|r| r.is_owner_block()) {
                blocks.push(Event::OwnerBlockAdded {
                    id: r.id,
                    room_id: r.room_id,
                    span: r.span,
                });
            }
        }

        for admin in self.administrators.iter() {
            events.push(Event::AdministratorCreated {
                id: admin.id,
                first_name: admin.first_name.clone(),
                last_name: admin.last_name.clone(),
                email: admin.email.clone(),
                password_hash: admin.password_hash.clone(),
                access_level: admin.access_level,
            });
        }

        let reservations: Vec<Reservation> = self.reservations.iter().map(|r| r.value().clone()).collect();
        for reservation in reservations {
            let Some(restriction_id) = self
                .reservation_to_restriction
                .get(&reservation.id)
                .map(|e| *e.value())
            else {
                tracing::warn!(reservation_id = %reservation.id, "reservation without restriction left out of compaction");
                continue;
            };
            events.push(Event::ReservationCreated {
                reservation,
                restriction_id,
            });
        }
        events.extend(blocks);
        self.send_compact(events).await
    }

    pub async fn wal_appends_since_compact(&self) -> u64 {
        let (tx, rx) = oneshot::channel();
        if self
            .wal_tx
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}
