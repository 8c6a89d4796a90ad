use std::fmt;

/// Tracks how deep rule invocations have nested so a pathological or
/// left-recursive-looking grammar fails with a clean error instead of
/// overflowing the stack.
///
/// `consume` is paired with `release` around every rule call, so `current`
/// reflects live recursion depth rather than a running total; `high` keeps
/// the high-water mark for diagnostics.
///
/// ```
/// use peg_core::LimitTracker;
///
/// let mut limit = LimitTracker::new(2);
/// limit.consume();
/// limit.consume();
/// assert!(!limit.limited());
/// limit.consume();
/// assert!(limit.limited());
/// ```
#[derive(PartialEq, Eq, Clone, Copy)]
pub struct LimitTracker {
    current: usize,
    /// High water mark reached over the life of this tracker.
    pub high: usize,
    /// The configured limit.
    pub limit: usize,
}

impl Default for LimitTracker {
    fn default() -> Self {
        Self::new(DEFAULT_RECURSION_LIMIT)
    }
}

/// Chosen the same way upstream recursive-descent parsers pick theirs:
/// comfortably below where an unoptimized debug build starts to risk a
/// stack overflow on a deeply right-nested grammar.
pub const DEFAULT_RECURSION_LIMIT: usize = 500;

impl LimitTracker {
    pub fn new(limit: usize) -> Self {
        Self {
            current: 0,
            high: 0,
            limit,
        }
    }

    pub fn limited(&self) -> bool {
        self.current > self.limit
    }

    pub fn consume(&mut self) {
        self.current += 1;
        if self.current > self.high {
            self.high = self.current;
        }
    }

    pub fn release(&mut self) {
        self.current = self.current.saturating_sub(1);
    }
}

impl fmt::Debug for LimitTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "recursion limit: {}, high: {}", self.limit, self.high)
    }
}
