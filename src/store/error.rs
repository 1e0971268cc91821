use ulid::Ulid;

#[derive(Debug)]
pub enum StoreError {
    /// The store could not be reached or failed to persist.
    Unavailable(String),
    /// A call exceeded the per-call time bound.
    Timeout,
    NotFound(Ulid),
    Validation(String),
    /// The room is already occupied for the requested days.
    Conflict(Ulid),
    LimitExceeded(&'static str),
}

impl StoreError {
    /// Unreachable and timed-out stores are treated alike by callers.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_) | StoreError::Timeout)
    }
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Unavailable(e) => write!(f, "store unavailable: {e}"),
            StoreError::Timeout => write!(f, "store call timed out"),
            StoreError::NotFound(id) => write!(f, "not found: {id}"),
            StoreError::Validation(msg) => write!(f, "invalid input: {msg}"),
            StoreError::Conflict(id) => write!(f, "conflict with restriction: {id}"),
            StoreError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {}
