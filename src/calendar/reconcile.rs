use std::collections::{HashMap, HashSet};

use chrono::Days;
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;
use crate::observability;
use crate::store::{RestrictionStore, StoreError};

use super::{parse_room_day, CalendarSnapshot, YearMonth, ADD_PREFIX, REMOVE_PREFIX};

/// A parsed calendar form submission.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CalendarEdit {
    /// `(room, day)` pairs whose existing block the administrator kept ticked.
    pub kept: HashSet<(Ulid, Day)>,
    /// `(room, day)` pairs ticked for a new block, in form order.
    pub additions: Vec<(Ulid, Day)>,
    /// Days each new block covers, starting at its ticked day.
    pub block_count: u32,
    /// Checkbox fields whose name could not be parsed.
    pub malformed: usize,
}

/// Outcome of applying one calendar submission.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub removed: usize,
    pub added: usize,
    pub failures: usize,
    /// Rooms whose removals were skipped because their snapshot was out of date.
    pub stale_rooms: Vec<Ulid>,
}

impl ReconcileReport {
    pub fn is_clean(&self) -> bool {
        self.failures == 0 && self.stale_rooms.is_empty()
    }
}

/// Read the calendar checkboxes and `block_count` out of posted form fields.
///
/// A bad `block_count` rejects the whole form. A bad checkbox name is logged
/// and skipped.
pub fn parse_calendar_form(fields: &[(String, String)]) -> Result<CalendarEdit, StoreError> {
    if fields.len() > MAX_FORM_FIELDS {
        return Err(StoreError::LimitExceeded("too many form fields"));
    }
    let mut edit = CalendarEdit {
        block_count: 1,
        ..Default::default()
    };
    for (name, value) in fields {
        if name == "block_count" {
            edit.block_count = parse_block_count(value)?;
        } else if let Some(rest) = name.strip_prefix(REMOVE_PREFIX) {
            match parse_room_day(rest) {
                Some(key) => {
                    edit.kept.insert(key);
                }
                None => {
                    tracing::warn!(field = %name, "skipping malformed calendar field");
                    edit.malformed += 1;
                }
            }
        } else if let Some(rest) = name.strip_prefix(ADD_PREFIX) {
            match parse_room_day(rest) {
                Some(key) => edit.additions.push(key),
                None => {
                    tracing::warn!(field = %name, "skipping malformed calendar field");
                    edit.malformed += 1;
                }
            }
        }
    }
    Ok(edit)
}

fn parse_block_count(value: &str) -> Result<u32, StoreError> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(1);
    }
    match value.parse::<u32>() {
        Ok(n) if (1..=MAX_BLOCK_DAYS).contains(&n) => Ok(n),
        _ => Err(StoreError::Validation(format!(
            "block count must be between 1 and {MAX_BLOCK_DAYS}"
        ))),
    }
}

/// Apply a calendar submission against the snapshots taken when it was rendered.
///
/// Phase 1 deletes every block the snapshot showed whose checkbox came back
/// unticked. Phase 2 inserts a block for every ticked "add" box. Individual
/// failures are logged and counted; the remaining items still run.
pub async fn reconcile_month_edits(
    store: &dyn RestrictionStore,
    edit: &CalendarEdit,
    rooms: &[Room],
    month: YearMonth,
    snapshots: &HashMap<Ulid, CalendarSnapshot>,
) -> ReconcileReport {
    let mut report = ReconcileReport::default();

    // Phase 1: removals
    let mut deleted: HashSet<Ulid> = HashSet::new();
    for room in rooms {
        let Some(snap) = snapshots.get(&room.id) else {
            tracing::warn!(room_id = %room.id, "no calendar snapshot, skipping removals");
            report.stale_rooms.push(room.id);
            continue;
        };
        if snap.month != month {
            tracing::warn!(room_id = %room.id, snapshot = %snap.month, posted = %month, "snapshot is for another month, skipping removals");
            report.stale_rooms.push(room.id);
            continue;
        }
        match store.room_revision(room.id).await {
            Ok(current) if current == snap.revision => {}
            Ok(current) => {
                tracing::warn!(room_id = %room.id, snapshot = snap.revision, current, "room changed since calendar render, skipping removals");
                report.stale_rooms.push(room.id);
                continue;
            }
            Err(e) => {
                tracing::warn!(room_id = %room.id, error = %e, "could not read room revision, skipping removals");
                report.failures += 1;
                continue;
            }
        }

        for (day, block) in &snap.blocks {
            let Some(restriction_id) = *block else {
                continue;
            };
            if edit.kept.contains(&(room.id, *day)) || !deleted.insert(restriction_id) {
                continue;
            }
            match store.delete_restriction(restriction_id).await {
                Ok(()) => report.removed += 1,
                Err(e) => {
                    tracing::warn!(room_id = %room.id, %restriction_id, %day, error = %e, "failed to remove owner block");
                    report.failures += 1;
                }
            }
        }
    }

    // Phase 2: additions
    let known: HashSet<Ulid> = rooms.iter().map(|r| r.id).collect();
    let extra_days = u64::from(edit.block_count.saturating_sub(1));
    for &(room_id, day) in &edit.additions {
        if !known.contains(&room_id) {
            tracing::warn!(%room_id, %day, "block requested for unknown room");
            report.failures += 1;
            continue;
        }
        let Some(end) = day.checked_add_days(Days::new(extra_days)) else {
            report.failures += 1;
            continue;
        };
        match store.insert_owner_block(room_id, day, end).await {
            Ok(_) => report.added += 1,
            Err(e) => {
                tracing::warn!(%room_id, %day, %end, error = %e, "failed to add owner block");
                report.failures += 1;
            }
        }
    }

    metrics::counter!(observability::CALENDAR_BLOCKS_REMOVED_TOTAL).increment(report.removed as u64);
    metrics::counter!(observability::CALENDAR_BLOCKS_ADDED_TOTAL).increment(report.added as u64);
    metrics::counter!(observability::CALENDAR_EDIT_FAILURES_TOTAL).increment(report.failures as u64);
    metrics::counter!(observability::CALENDAR_STALE_ROOMS_TOTAL).increment(report.stale_rooms.len() as u64);
    tracing::info!(
        %month,
        removed = report.removed,
        added = report.added,
        failures = report.failures,
        stale = report.stale_rooms.len(),
        "calendar edits applied"
    );
    report
}
