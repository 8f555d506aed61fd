//! Invocation budget for a single handler.

/// Remaining-call counter of a handler.
///
/// Once the budget runs out the limit is *finished*: further attempts are
/// refused until [`InvokeLimit::reset`] installs a new budget.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InvokeLimit {
    remaining: Option<u32>,
    finished: bool,
}

impl InvokeLimit {
    /// Creates the limit requested at registration time.
    ///
    /// `None` and `Some(0)` both mean "unlimited".
    pub fn new(limit: Option<u32>) -> Self {
        Self {
            remaining: limit.filter(|n| *n > 0),
            finished: false,
        }
    }

    /// Consumes one attempt.
    ///
    /// Returns `false` when the handler must not run. The first refusal marks
    /// the limit finished.
    pub fn permit(&mut self) -> bool {
        if self.finished {
            return false;
        }
        match &mut self.remaining {
            None => true,
            Some(0) => {
                self.finished = true;
                false
            }
            Some(n) => {
                *n -= 1;
                true
            }
        }
    }

    /// Installs a new budget and clears the finished flag.
    ///
    /// Unlike [`InvokeLimit::new`], `Some(0)` here is an empty budget.
    pub fn reset(&mut self, limit: Option<u32>) {
        self.remaining = limit;
        self.finished = false;
    }

    /// Returns `true` if the handler has a finite budget.
    pub fn is_finite(&self) -> bool {
        self.remaining.is_some()
    }

    /// Returns `true` once the budget has been exhausted.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Attempts left, or `None` when unlimited.
    pub fn remaining(&self) -> Option<u32> {
        self.remaining
    }
}
