//! The administrator's per-room month calendar: building the day grid and
//! applying the edits posted back from it.

mod grid;
mod reconcile;

pub use grid::build_month_grid;
pub use reconcile::{parse_calendar_form, reconcile_month_edits, CalendarEdit, ReconcileReport};

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::limits::*;
use crate::model::{Day, DayRange};
use crate::store::StoreError;

/// A calendar month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl YearMonth {
    pub fn new(year: i32, month: u32) -> Result<Self, StoreError> {
        if !(1..=12).contains(&month) {
            return Err(StoreError::Validation(format!("month {month} out of range")));
        }
        if !(MIN_VALID_YEAR..=MAX_VALID_YEAR).contains(&year) {
            return Err(StoreError::Validation(format!("year {year} out of range")));
        }
        Ok(Self { year, month })
    }

    pub fn of(day: Day) -> Self {
        Self {
            year: day.year(),
            month: day.month(),
        }
    }

    /// Month from optional `y`/`m` query values, falling back to `today`'s month.
    pub fn from_query(y: Option<&str>, m: Option<&str>, today: Day) -> Result<Self, StoreError> {
        match (y, m) {
            (Some(y), Some(m)) => {
                let year = y
                    .trim()
                    .parse()
                    .map_err(|_| StoreError::Validation(format!("invalid year {y:?}")))?;
                let month = m
                    .trim()
                    .parse()
                    .map_err(|_| StoreError::Validation(format!("invalid month {m:?}")))?;
                Self::new(year, month)
            }
            _ => Ok(Self::of(today)),
        }
    }

    pub fn first_day(&self) -> Day {
        // Constructors keep year/month in range, so the first always exists.
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
    }

    pub fn last_day(&self) -> Day {
        self.next()
            .first_day()
            .pred_opt()
            .unwrap_or_else(|| self.first_day())
    }

    pub fn days_in_month(&self) -> u32 {
        self.last_day().day()
    }

    pub fn range(&self) -> DayRange {
        DayRange::new(self.first_day(), self.last_day())
    }

    pub fn days(&self) -> impl Iterator<Item = Day> + use<> {
        self.range().days()
    }

    pub fn next(&self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    pub fn prev(&self) -> Self {
        if self.month == 1 {
            Self {
                year: self.year - 1,
                month: 12,
            }
        } else {
            Self {
                year: self.year,
                month: self.month - 1,
            }
        }
    }

    /// Where the calendar page for this month lives.
    pub fn calendar_path(&self) -> String {
        format!("/admin/reservations-calendar?y={}&m={:02}", self.year, self.month)
    }
}

impl std::fmt::Display for YearMonth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{:02}", self.year, self.month)
    }
}

/// What one room's calendar looked like when it was rendered.
///
/// Every day of the month has an entry in both maps; `None` means the day
/// held nothing of that kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarSnapshot {
    pub room_id: Ulid,
    pub month: YearMonth,
    /// Room revision read before the restrictions were fetched.
    pub revision: u64,
    /// Day → reservation id of the guest staying that night.
    pub reservations: BTreeMap<Day, Option<Ulid>>,
    /// Day → owner-block restriction id.
    pub blocks: BTreeMap<Day, Option<Ulid>>,
}

impl CalendarSnapshot {
    /// Empty maps covering every day of `month`.
    pub fn empty(room_id: Ulid, month: YearMonth, revision: u64) -> Self {
        let blank: BTreeMap<Day, Option<Ulid>> = month.days().map(|d| (d, None)).collect();
        Self {
            room_id,
            month,
            revision,
            reservations: blank.clone(),
            blocks: blank,
        }
    }

    pub fn reservation_on(&self, day: Day) -> Option<Ulid> {
        self.reservations.get(&day).copied().flatten()
    }

    pub fn block_on(&self, day: Day) -> Option<Ulid> {
        self.blocks.get(&day).copied().flatten()
    }
}

/// Session key a room's snapshot is stored under.
pub fn snapshot_session_key(room_id: Ulid) -> String {
    format!("calendar_snapshot:{room_id}")
}

const REMOVE_PREFIX: &str = "remove_blocked_";
const ADD_PREFIX: &str = "add_blocked_";

/// Checkbox name that keeps an existing block when posted.
pub fn remove_field_name(room_id: Ulid, day: Day) -> String {
    format!("{REMOVE_PREFIX}{room_id}_{}", day.format("%Y-%m-%d"))
}

/// Checkbox name that requests a new block when posted.
pub fn add_field_name(room_id: Ulid, day: Day) -> String {
    format!("{ADD_PREFIX}{room_id}_{}", day.format("%Y-%m-%d"))
}

/// Split `<ulid>_<YYYY-MM-DD>` into its parts.
fn parse_room_day(rest: &str) -> Option<(Ulid, Day)> {
    let (room, day) = rest.split_once('_')?;
    let room = Ulid::from_string(room).ok()?;
    let day = NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()?;
    Some((room, day))
}
