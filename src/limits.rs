//! Hard caps on input sizes, checked before anything reaches the store.

/// Rooms a single property may hold.
pub const MAX_ROOMS: usize = 256;

/// Restrictions (bookings + blocks) per room.
pub const MAX_RESTRICTIONS_PER_ROOM: usize = 20_000;

/// Longest bookable stay, in days from arrival to departure.
pub const MAX_STAY_DAYS: i64 = 366;

/// Longest owner block a single calendar cell may create.
pub const MAX_BLOCK_DAYS: u32 = 90;

pub const MAX_NAME_LEN: usize = 128;

pub const MAX_GUEST_FIELD_LEN: usize = 256;

/// Fields accepted in one posted form (the calendar form is the largest).
pub const MAX_FORM_FIELDS: usize = 20_000;

/// Largest posted form body in bytes.
pub const MAX_FORM_BYTES: usize = 2 * 1024 * 1024;

/// Earliest and latest dates the calendar accepts.
pub const MIN_VALID_YEAR: i32 = 2000;
pub const MAX_VALID_YEAR: i32 = 2200;

/// Live sessions held in memory at once.
pub const MAX_SESSIONS: usize = 100_000;
