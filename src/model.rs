use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// A calendar day, the only date type.
pub type Day = NaiveDate;

/// Closed day range `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DayRange {
    pub start: Day,
    pub end: Day,
}

impl DayRange {
    pub fn new(start: Day, end: Day) -> Self {
        debug_assert!(start <= end, "DayRange start must not be after end");
        Self { start, end }
    }

    /// The nights a guest sleeps over when arriving on `arrival` and leaving
    /// on `departure`. The departure day itself stays free; a same-day stay
    /// occupies its single day.
    pub fn nights(arrival: Day, departure: Day) -> Self {
        let last = departure
            .pred_opt()
            .filter(|d| *d >= arrival)
            .unwrap_or(arrival);
        Self::new(arrival, last)
    }

    pub fn len_days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    pub fn contains_day(&self, day: Day) -> bool {
        self.start <= day && day <= self.end
    }

    /// Overlap policy: `self.start BETWEEN other.start AND other.end`
    /// or `other.start BETWEEN self.start AND self.end`.
    pub fn collides_with(&self, other: &DayRange) -> bool {
        (other.start <= self.start && self.start <= other.end)
            || (self.start <= other.start && other.start <= self.end)
    }

    /// Every day in the range, in order.
    pub fn days(&self) -> impl Iterator<Item = Day> + use<> {
        let end = self.end;
        self.start.iter_days().take_while(move |d| *d <= end)
    }
}

/// What a restriction represents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RestrictionKind {
    /// Closed by an administrator (maintenance, personal use).
    OwnerBlock,
    /// Occupied by a guest reservation.
    GuestBooking { reservation_id: Ulid },
}

/// A single "room unavailable" row, for owner blocks and guest bookings alike.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Restriction {
    pub id: Ulid,
    pub room_id: Ulid,
    /// Dates as stored: block days for owner blocks, arrival/departure for bookings.
    pub span: DayRange,
    pub kind: RestrictionKind,
}

impl Restriction {
    /// Days on which the room is unavailable because of this restriction.
    pub fn occupied(&self) -> DayRange {
        match self.kind {
            RestrictionKind::OwnerBlock => self.span,
            RestrictionKind::GuestBooking { .. } => DayRange::nights(self.span.start, self.span.end),
        }
    }

    pub fn reservation_id(&self) -> Option<Ulid> {
        match self.kind {
            RestrictionKind::OwnerBlock => None,
            RestrictionKind::GuestBooking { reservation_id } => Some(reservation_id),
        }
    }

    pub fn is_owner_block(&self) -> bool {
        matches!(self.kind, RestrictionKind::OwnerBlock)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub id: Ulid,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuestDetails {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
}

impl GuestDetails {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: Ulid,
    pub room_id: Ulid,
    pub guest: GuestDetails,
    /// Arrival and departure dates.
    pub stay: DayRange,
    pub processed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Administrator {
    pub id: Ulid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    /// PHC-formatted Argon2id hash.
    pub password_hash: String,
    pub access_level: u8,
}

#[derive(Debug, Clone)]
pub struct RoomState {
    pub room: Room,
    /// Bumped on every restriction insert/delete.
    pub revision: u64,
    /// All restrictions on this room, sorted by `occupied().start`.
    pub restrictions: Vec<Restriction>,
}

impl RoomState {
    pub fn new(room: Room) -> Self {
        Self {
            room,
            revision: 0,
            restrictions: Vec::new(),
        }
    }

    /// Insert restriction maintaining sort order by occupied start.
    pub fn insert_restriction(&mut self, restriction: Restriction) {
        let start = restriction.occupied().start;
        let pos = self
            .restrictions
            .partition_point(|r| r.occupied().start <= start);
        self.restrictions.insert(pos, restriction);
        self.revision += 1;
    }

    /// Remove restriction by id.
    pub fn remove_restriction(&mut self, id: Ulid) -> Option<Restriction> {
        let pos = self.restrictions.iter().position(|r| r.id == id)?;
        self.revision += 1;
        Some(self.restrictions.remove(pos))
    }

    /// Return only restrictions whose occupied days collide with `query`.
    /// Restrictions occupying from after `query.end` are skipped by binary search.
    pub fn colliding(&self, query: &DayRange) -> impl Iterator<Item = &Restriction> {
        let right_bound = self
            .restrictions
            .partition_point(|r| r.occupied().start <= query.end);
        let query = *query;
        self.restrictions[..right_bound]
            .iter()
            .filter(move |r| r.occupied().collides_with(&query))
    }
}

/// The event types. This is the WAL record format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    RoomCreated {
        id: Ulid,
        name: String,
    },
    AdministratorCreated {
        id: Ulid,
        first_name: String,
        last_name: String,
        email: String,
        password_hash: String,
        access_level: u8,
    },
    ReservationCreated {
        reservation: Reservation,
        restriction_id: Ulid,
    },
    ReservationUpdated {
        id: Ulid,
        guest: GuestDetails,
        updated_at: DateTime<Utc>,
    },
    ReservationProcessed {
        id: Ulid,
        processed: bool,
        updated_at: DateTime<Utc>,
    },
    ReservationDeleted {
        id: Ulid,
        room_id: Ulid,
    },
    OwnerBlockAdded {
        id: Ulid,
        room_id: Ulid,
        span: DayRange,
    },
    RestrictionRemoved {
        id: Ulid,
        room_id: Ulid,
    },
}

// ── Query result types ───────────────────────────────────────────

/// A reservation joined with its room name, for listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReservationInfo {
    pub reservation: Reservation,
    pub room_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> Day {
        s.parse().unwrap()
    }

    fn block(start: &str, end: &str) -> Restriction {
        Restriction {
            id: Ulid::new(),
            room_id: Ulid::new(),
            span: DayRange::new(d(start), d(end)),
            kind: RestrictionKind::OwnerBlock,
        }
    }

    fn booking(arrival: &str, departure: &str) -> Restriction {
        Restriction {
            id: Ulid::new(),
            room_id: Ulid::new(),
            span: DayRange::new(d(arrival), d(departure)),
            kind: RestrictionKind::GuestBooking {
                reservation_id: Ulid::new(),
            },
        }
    }

    fn room_state() -> RoomState {
        RoomState::new(Room {
            id: Ulid::new(),
            name: "Major's Suite".into(),
        })
    }

    #[test]
    fn day_range_basics() {
        let r = DayRange::new(d("2024-02-27"), d("2024-03-02"));
        assert_eq!(r.len_days(), 5); // leap year
        assert!(r.contains_day(d("2024-02-29")));
        assert!(r.contains_day(d("2024-03-02")));
        assert!(!r.contains_day(d("2024-03-03")));
        assert_eq!(r.days().count(), 5);
        assert_eq!(r.days().last(), Some(d("2024-03-02")));
    }

    #[test]
    fn nights_exclude_departure_day() {
        let n = DayRange::nights(d("2024-01-01"), d("2024-01-05"));
        assert_eq!(n, DayRange::new(d("2024-01-01"), d("2024-01-04")));
    }

    #[test]
    fn nights_of_same_day_stay_is_that_day() {
        let n = DayRange::nights(d("2024-01-05"), d("2024-01-05"));
        assert_eq!(n, DayRange::new(d("2024-01-05"), d("2024-01-05")));
    }

    #[test]
    fn collides_single_day() {
        let a = DayRange::new(d("2024-01-05"), d("2024-01-05"));
        let b = DayRange::new(d("2024-01-05"), d("2024-01-05"));
        assert!(a.collides_with(&b));
    }

    #[test]
    fn collides_touching_end_is_overlap() {
        // Closed ranges sharing a day overlap
        let a = DayRange::new(d("2024-03-01"), d("2024-03-10"));
        let b = DayRange::new(d("2024-03-10"), d("2024-03-12"));
        assert!(a.collides_with(&b));
        assert!(b.collides_with(&a));
    }

    #[test]
    fn collides_adjacent_is_not_overlap() {
        let a = DayRange::new(d("2024-03-01"), d("2024-03-10"));
        let b = DayRange::new(d("2024-03-11"), d("2024-03-12"));
        assert!(!a.collides_with(&b));
        assert!(!b.collides_with(&a));
    }

    #[test]
    fn collides_containing_range() {
        let outer = DayRange::new(d("2024-01-01"), d("2024-01-31"));
        let inner = DayRange::new(d("2024-01-10"), d("2024-01-12"));
        assert!(outer.collides_with(&inner));
        assert!(inner.collides_with(&outer));
    }

    /// The BETWEEN policy must agree with plain closed-interval intersection
    /// for every pair of ranges inside a small window.
    #[test]
    fn collides_matches_closed_intersection_exhaustively() {
        let base = d("2024-01-01");
        let day = |n: u64| base.checked_add_days(chrono::Days::new(n)).unwrap();
        let mut ranges = Vec::new();
        for s in 0..8 {
            for e in s..8 {
                ranges.push(DayRange::new(day(s), day(e)));
            }
        }
        for a in &ranges {
            for b in &ranges {
                let expected = a.start <= b.end && b.start <= a.end;
                assert_eq!(a.collides_with(b), expected, "{a:?} vs {b:?}");
                assert_eq!(a.collides_with(b), b.collides_with(a), "{a:?} vs {b:?}");
            }
        }
    }

    #[test]
    fn occupied_days_by_kind() {
        let b = block("2024-01-01", "2024-01-05");
        assert_eq!(b.occupied(), b.span);
        assert!(b.is_owner_block());
        assert_eq!(b.reservation_id(), None);

        let g = booking("2024-01-01", "2024-01-05");
        assert_eq!(g.occupied(), DayRange::new(d("2024-01-01"), d("2024-01-04")));
        assert!(!g.is_owner_block());
        assert!(g.reservation_id().is_some());
    }

    #[test]
    fn restriction_ordering() {
        let mut rs = room_state();
        rs.insert_restriction(block("2024-03-20", "2024-03-21"));
        rs.insert_restriction(booking("2024-03-01", "2024-03-04"));
        rs.insert_restriction(block("2024-03-10", "2024-03-10"));
        assert_eq!(rs.restrictions[0].span.start, d("2024-03-01"));
        assert_eq!(rs.restrictions[1].span.start, d("2024-03-10"));
        assert_eq!(rs.restrictions[2].span.start, d("2024-03-20"));
        assert_eq!(rs.revision, 3);
    }

    #[test]
    fn restriction_remove() {
        let mut rs = room_state();
        let r = block("2024-03-10", "2024-03-12");
        let id = r.id;
        rs.insert_restriction(r);
        assert!(rs.remove_restriction(id).is_some());
        assert!(rs.restrictions.is_empty());
        assert_eq!(rs.revision, 2);
    }

    #[test]
    fn remove_nonexistent_keeps_revision() {
        let mut rs = room_state();
        rs.insert_restriction(block("2024-03-10", "2024-03-12"));
        assert!(rs.remove_restriction(Ulid::new()).is_none());
        assert_eq!(rs.restrictions.len(), 1);
        assert_eq!(rs.revision, 1);
    }

    #[test]
    fn colliding_skips_past_and_future() {
        let mut rs = room_state();
        rs.insert_restriction(block("2024-01-01", "2024-01-03"));
        rs.insert_restriction(block("2024-01-09", "2024-01-12"));
        rs.insert_restriction(block("2024-02-01", "2024-02-03"));
        let query = DayRange::new(d("2024-01-10"), d("2024-01-20"));
        let hits: Vec<_> = rs.colliding(&query).collect();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].span.start, d("2024-01-09"));
    }

    #[test]
    fn colliding_booking_departure_day_not_included() {
        let mut rs = room_state();
        rs.insert_restriction(booking("2024-01-01", "2024-01-05"));
        let query = DayRange::nights(d("2024-01-05"), d("2024-01-08"));
        assert_eq!(rs.colliding(&query).count(), 0);
    }

    #[test]
    fn colliding_long_restriction_spanning_query() {
        let mut rs = room_state();
        rs.insert_restriction(block("2024-01-01", "2024-12-31"));
        let query = DayRange::new(d("2024-06-01"), d("2024-06-02"));
        assert_eq!(rs.colliding(&query).count(), 1);
    }

    #[test]
    fn event_serialization_roundtrip() {
        let event = Event::OwnerBlockAdded {
            id: Ulid::new(),
            room_id: Ulid::new(),
            span: DayRange::new(d("2024-03-01"), d("2024-03-03")),
        };
        let bytes = bincode::serialize(&event).unwrap();
        let decoded: Event = bincode::deserialize(&bytes).unwrap();
        assert_eq!(event, decoded);
    }
}
