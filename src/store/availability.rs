use crate::model::*;

// ── Availability ──────────────────────────────────────────────────

/// True when no restriction on the room occupies any night of the stay.
///
/// A guest's stay occupies `[arrival, departure - 1]`, so a guest may arrive
/// on the day another guest departs. Owner blocks occupy every day they name.
pub fn room_is_free(rs: &RoomState, arrival: Day, departure: Day) -> bool {
    let nights = DayRange::nights(arrival, departure);
    rs.colliding(&nights).next().is_none()
}

/// Order rooms for display: by name, ties broken by id.
pub(super) fn sort_rooms(rooms: &mut [Room]) {
    rooms.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use ulid::Ulid;

    fn d(s: &str) -> Day {
        s.parse().unwrap()
    }

    fn state_with(restrictions: Vec<Restriction>) -> RoomState {
        let mut rs = RoomState::new(Room {
            id: Ulid::new(),
            name: "General's Quarters".into(),
        });
        for r in restrictions {
            rs.insert_restriction(r);
        }
        rs
    }

    fn block(room_id: Ulid, start: &str, end: &str) -> Restriction {
        Restriction {
            id: Ulid::new(),
            room_id,
            span: DayRange::new(d(start), d(end)),
            kind: RestrictionKind::OwnerBlock,
        }
    }

    fn booking(room_id: Ulid, arrival: &str, departure: &str) -> Restriction {
        Restriction {
            id: Ulid::new(),
            room_id,
            span: DayRange::new(d(arrival), d(departure)),
            kind: RestrictionKind::GuestBooking {
                reservation_id: Ulid::new(),
            },
        }
    }

    #[test]
    fn empty_room_is_free() {
        let rs = state_with(vec![]);
        assert!(room_is_free(&rs, d("2024-01-01"), d("2024-01-05")));
    }

    #[test]
    fn turnover_day_is_free() {
        let room = Ulid::new();
        let rs = state_with(vec![booking(room, "2024-01-01", "2024-01-05")]);
        assert!(room_is_free(&rs, d("2024-01-05"), d("2024-01-08")));
        assert!(!room_is_free(&rs, d("2024-01-04"), d("2024-01-08")));
    }

    #[test]
    fn departing_on_a_guests_arrival_is_free() {
        let room = Ulid::new();
        let rs = state_with(vec![booking(room, "2024-01-10", "2024-01-12")]);
        assert!(room_is_free(&rs, d("2024-01-07"), d("2024-01-10")));
        assert!(!room_is_free(&rs, d("2024-01-07"), d("2024-01-11")));
    }

    #[test]
    fn owner_block_last_day_is_taken() {
        let room = Ulid::new();
        let rs = state_with(vec![block(room, "2024-03-01", "2024-03-10")]);
        // Stay starting on the last blocked day
        assert!(!room_is_free(&rs, d("2024-03-10"), d("2024-03-12")));
        assert!(room_is_free(&rs, d("2024-03-11"), d("2024-03-12")));
    }

    #[test]
    fn same_day_stay_checks_that_day() {
        let room = Ulid::new();
        let rs = state_with(vec![block(room, "2024-03-05", "2024-03-05")]);
        assert!(!room_is_free(&rs, d("2024-03-05"), d("2024-03-05")));
        assert!(room_is_free(&rs, d("2024-03-06"), d("2024-03-06")));
    }

    #[test]
    fn stay_enclosing_a_block_is_taken() {
        let room = Ulid::new();
        let rs = state_with(vec![block(room, "2024-03-05", "2024-03-06")]);
        assert!(!room_is_free(&rs, d("2024-03-01"), d("2024-03-20")));
    }

    #[test]
    fn rooms_sorted_by_name_then_id() {
        let a = Ulid::from_parts(1, 1);
        let b = Ulid::from_parts(2, 2);
        let mut rooms = vec![
            Room { id: b, name: "Major's Suite".into() },
            Room { id: Ulid::new(), name: "General's Quarters".into() },
            Room { id: a, name: "Major's Suite".into() },
        ];
        sort_rooms(&mut rooms);
        assert_eq!(rooms[0].name, "General's Quarters");
        assert_eq!(rooms[1].id, a);
        assert_eq!(rooms[2].id, b);
    }
}
