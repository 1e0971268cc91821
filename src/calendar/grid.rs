use crate::model::*;
use crate::store::{RestrictionStore, StoreError};

use super::{CalendarSnapshot, YearMonth};

/// Build the per-day reservation and block maps for one room and month.
///
/// The room's revision is read before its restrictions, so a change landing
/// in between leaves the snapshot looking stale rather than fresh.
pub async fn build_month_grid(
    store: &dyn RestrictionStore,
    room: &Room,
    month: YearMonth,
) -> Result<CalendarSnapshot, StoreError> {
    let revision = store.room_revision(room.id).await?;
    let mut snap = CalendarSnapshot::empty(room.id, month, revision);
    let restrictions = store
        .restrictions_for_room_in_range(room.id, month.first_day(), month.last_day())
        .await?;

    for r in &restrictions {
        let map = match r.kind {
            RestrictionKind::OwnerBlock => &mut snap.blocks,
            RestrictionKind::GuestBooking { .. } => &mut snap.reservations,
        };
        let stamp = match r.kind {
            RestrictionKind::OwnerBlock => r.id,
            RestrictionKind::GuestBooking { reservation_id } => reservation_id,
        };
        for day in r.occupied().days() {
            if let Some(slot) = map.get_mut(&day) {
                *slot = Some(stamp);
            }
        }
    }
    Ok(snap)
}
