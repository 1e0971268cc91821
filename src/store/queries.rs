use ulid::Ulid;

use crate::model::*;

use super::availability::{room_is_free, sort_rooms};
use super::validate::{check_day, validate_stay};
use super::{Store, StoreError};

impl Store {
    pub async fn all_rooms(&self) -> Result<Vec<Room>, StoreError> {
        self.bounded("all_rooms", async {
            let handles: Vec<_> = self.rooms.iter().map(|e| e.value().clone()).collect();
            let mut rooms = Vec::with_capacity(handles.len());
            for rs in handles {
                rooms.push(rs.read().await.room.clone());
            }
            sort_rooms(&mut rooms);
            Ok(rooms)
        })
        .await
    }

    pub async fn room(&self, id: Ulid) -> Result<Room, StoreError> {
        self.bounded("room", async {
            let rs = self.room_state(&id).ok_or(StoreError::NotFound(id))?;
            let room = rs.read().await.room.clone();
            Ok(room)
        })
        .await
    }

    pub async fn find_available_rooms(&self, start: Day, end: Day) -> Result<Vec<Room>, StoreError> {
        self.bounded("find_available_rooms", async {
            validate_stay(start, end)?;
            let handles: Vec<_> = self.rooms.iter().map(|e| e.value().clone()).collect();
            let mut free = Vec::new();
            for rs in handles {
                let guard = rs.read().await;
                if room_is_free(&guard, start, end) {
                    free.push(guard.room.clone());
                }
            }
            sort_rooms(&mut free);
            Ok(free)
        })
        .await
    }

    pub async fn is_room_available(&self, start: Day, end: Day, room_id: Ulid) -> Result<bool, StoreError> {
        self.bounded("is_room_available", async {
            validate_stay(start, end)?;
            let rs = self.room_state(&room_id).ok_or(StoreError::NotFound(room_id))?;
            let guard = rs.read().await;
            Ok(room_is_free(&guard, start, end))
        })
        .await
    }

    pub async fn restrictions_for_room_in_range(
        &self,
        room_id: Ulid,
        start: Day,
        end: Day,
    ) -> Result<Vec<Restriction>, StoreError> {
        self.bounded("restrictions_for_room_in_range", async {
            check_day(start)?;
            check_day(end)?;
            if end < start {
                return Err(StoreError::Validation("range ends before it starts".into()));
            }
            let rs = self.room_state(&room_id).ok_or(StoreError::NotFound(room_id))?;
            let guard = rs.read().await;
            let range = DayRange::new(start, end);
            Ok(guard.colliding(&range).cloned().collect())
        })
        .await
    }

    pub async fn room_revision(&self, room_id: Ulid) -> Result<u64, StoreError> {
        self.bounded("room_revision", async {
            let rs = self.room_state(&room_id).ok_or(StoreError::NotFound(room_id))?;
            let revision = rs.read().await.revision;
            Ok(revision)
        })
        .await
    }

    /// A reservation joined with its room name.
    pub async fn reservation(&self, id: Ulid) -> Result<ReservationInfo, StoreError> {
        self.bounded("reservation", async {
            let reservation = self
                .reservations
                .get(&id)
                .map(|r| r.value().clone())
                .ok_or(StoreError::NotFound(id))?;
            self.with_room_name(reservation).await
        })
        .await
    }

    /// Every reservation, newest arrival first.
    pub async fn all_reservations(&self) -> Result<Vec<ReservationInfo>, StoreError> {
        self.bounded("all_reservations", self.list_reservations(|_| true)).await
    }

    /// Reservations not yet marked processed.
    pub async fn new_reservations(&self) -> Result<Vec<ReservationInfo>, StoreError> {
        self.bounded("new_reservations", self.list_reservations(|r| !r.processed))
            .await
    }

    pub async fn administrator_by_email(&self, email: &str) -> Result<Option<Administrator>, StoreError> {
        self.bounded("administrator_by_email", async {
            Ok(self
                .administrators
                .iter()
                .find(|a| a.email.eq_ignore_ascii_case(email))
                .map(|a| a.value().clone()))
        })
        .await
    }

    pub async fn administrator(&self, id: Ulid) -> Result<Administrator, StoreError> {
        self.bounded("administrator", async {
            self.administrators
                .get(&id)
                .map(|a| a.value().clone())
                .ok_or(StoreError::NotFound(id))
        })
        .await
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn administrator_count(&self) -> usize {
        self.administrators.len()
    }

    async fn list_reservations(
        &self,
        keep: impl Fn(&Reservation) -> bool,
    ) -> Result<Vec<ReservationInfo>, StoreError> {
        let picked: Vec<Reservation> = self
            .reservations
            .iter()
            .filter(|r| keep(r.value()))
            .map(|r| r.value().clone())
            .collect();
        let mut out = Vec::with_capacity(picked.len());
        for reservation in picked {
            out.push(self.with_room_name(reservation).await?);
        }
        out.sort_by(|a, b| {
            b.reservation
                .stay
                .start
                .cmp(&a.reservation.stay.start)
                .then(a.reservation.id.cmp(&b.reservation.id))
        });
        Ok(out)
    }

    async fn with_room_name(&self, reservation: Reservation) -> Result<ReservationInfo, StoreError> {
        let room_name = match self.room_state(&reservation.room_id) {
            Some(rs) => rs.read().await.room.name.clone(),
            None => return Err(StoreError::NotFound(reservation.room_id)),
        };
        Ok(ReservationInfo {
            reservation,
            room_name,
        })
    }
}
