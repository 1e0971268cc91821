use chrono::Datelike;

use crate::limits::*;
use crate::model::*;

use super::StoreError;

pub(crate) fn check_day(day: Day) -> Result<(), StoreError> {
    if day.year() < MIN_VALID_YEAR || day.year() > MAX_VALID_YEAR {
        return Err(StoreError::Validation(format!("date {day} outside supported range")));
    }
    Ok(())
}

/// Validate a requested stay (arrival, departure).
pub(crate) fn validate_stay(start: Day, end: Day) -> Result<DayRange, StoreError> {
    check_day(start)?;
    check_day(end)?;
    if end < start {
        return Err(StoreError::Validation("departure is before arrival".into()));
    }
    if (end - start).num_days() > MAX_STAY_DAYS {
        return Err(StoreError::Validation(format!("stays are limited to {MAX_STAY_DAYS} days")));
    }
    Ok(DayRange::new(start, end))
}

/// Validate an owner block (inclusive block days).
pub(crate) fn validate_block(start: Day, end: Day) -> Result<DayRange, StoreError> {
    check_day(start)?;
    check_day(end)?;
    if end < start {
        return Err(StoreError::Validation("block ends before it starts".into()));
    }
    if (end - start).num_days() >= i64::from(MAX_BLOCK_DAYS) {
        return Err(StoreError::LimitExceeded("block too long"));
    }
    Ok(DayRange::new(start, end))
}

pub(crate) fn validate_guest(guest: &GuestDetails) -> Result<(), StoreError> {
    for field in [&guest.first_name, &guest.last_name, &guest.email, &guest.phone] {
        if field.len() > MAX_GUEST_FIELD_LEN {
            return Err(StoreError::LimitExceeded("guest field too long"));
        }
    }
    Ok(())
}

/// Fail with `Conflict` if any restriction on the room occupies a night of the stay.
pub(crate) fn check_no_conflict(rs: &RoomState, nights: &DayRange) -> Result<(), StoreError> {
    match rs.colliding(nights).next() {
        Some(existing) => Err(StoreError::Conflict(existing.id)),
        None => Ok(()),
    }
}
