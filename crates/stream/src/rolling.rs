//! Rolling-window extremum trackers.
//!
//! Monotonic-deque structures giving O(1) amortized max/min over a
//! fixed-size sliding window, used by conversion hooks that need windowed
//! extrema (channel and exit indicators).
//!
//! The two trackers deliberately disagree on not-a-number handling: the
//! max tracker rejects NaN input outright, while the min tracker accepts
//! it and reports NaN for as long as any NaN value remains in the window.
//! Preserve both behaviors; do not unify them.

use std::collections::VecDeque;

use crate::error::HubError;

/// O(1) amortized maximum over the last `capacity` pushed values.
#[derive(Debug, Clone)]
pub struct RollingWindowMax {
    capacity: usize,
    /// Raw values in arrival order, for eviction bookkeeping.
    window: VecDeque<f64>,
    /// Candidate maxima, non-increasing front to back.
    deque: VecDeque<f64>,
}

impl RollingWindowMax {
    /// Creates a tracker over a window of `capacity` values.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        RollingWindowMax {
            capacity,
            window: VecDeque::with_capacity(capacity + 1),
            deque: VecDeque::with_capacity(capacity + 1),
        }
    }

    /// Pushes a value, evicting the oldest once the window is full.
    ///
    /// # Errors
    /// Returns [`HubError::NanValue`] for not-a-number input: NaN cannot
    /// be ranked and would silently corrupt the candidate deque.
    pub fn push(&mut self, value: f64) -> Result<(), HubError> {
        if value.is_nan() {
            return Err(HubError::NanValue);
        }

        // dominated candidates can never be the maximum again
        // while `value` is in the window
        while self.deque.back().is_some_and(|&back| back < value) {
            self.deque.pop_back();
        }
        self.deque.push_back(value);
        self.window.push_back(value);

        if self.window.len() > self.capacity {
            if let Some(evicted) = self.window.pop_front() {
                if self.deque.front().is_some_and(|&front| front == evicted) {
                    self.deque.pop_front();
                }
            }
        }
        Ok(())
    }

    /// Current window maximum; `None` on an empty window.
    #[must_use]
    pub fn max(&self) -> Option<f64> {
        self.deque.front().copied()
    }

    /// Number of values currently in the window.
    #[must_use]
    pub fn len(&self) -> usize {
        self.window.len()
    }

    /// Checks if the window is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    /// Empties the window.
    pub fn clear(&mut self) {
        self.window.clear();
        self.deque.clear();
    }
}

/// O(1) amortized minimum over the last `capacity` pushed values.
///
/// NaN input poisons the reported minimum until the last NaN value is
/// evicted from the window.
#[derive(Debug, Clone)]
pub struct RollingWindowMin {
    capacity: usize,
    window: VecDeque<f64>,
    /// Candidate minima, non-decreasing front to back.
    deque: VecDeque<f64>,
    /// NaN values currently inside the window.
    nan_count: usize,
}

impl RollingWindowMin {
    /// Creates a tracker over a window of `capacity` values.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        RollingWindowMin {
            capacity,
            window: VecDeque::with_capacity(capacity + 1),
            deque: VecDeque::with_capacity(capacity + 1),
            nan_count: 0,
        }
    }

    /// Pushes a value, evicting the oldest once the window is full.
    pub fn push(&mut self, value: f64) {
        if value.is_nan() {
            // NaN is never a ranked candidate; it only poisons the
            // window until it ages out
            self.nan_count += 1;
        } else {
            while self.deque.back().is_some_and(|&back| back > value) {
                self.deque.pop_back();
            }
            self.deque.push_back(value);
        }
        self.window.push_back(value);

        if self.window.len() > self.capacity {
            if let Some(evicted) = self.window.pop_front() {
                if evicted.is_nan() {
                    self.nan_count -= 1;
                } else if self.deque.front().is_some_and(|&front| front == evicted) {
                    self.deque.pop_front();
                }
            }
        }
    }

    /// Current window minimum; `None` on an empty window, NaN while any
    /// NaN value remains in the window.
    #[must_use]
    pub fn min(&self) -> Option<f64> {
        if self.window.is_empty() {
            None
        } else if self.nan_count > 0 {
            Some(f64::NAN)
        } else {
            self.deque.front().copied()
        }
    }

    /// Number of values currently in the window.
    #[must_use]
    pub fn len(&self) -> usize {
        self.window.len()
    }

    /// Checks if the window is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    /// Empties the window and clears the poisoned state.
    pub fn clear(&mut self) {
        self.window.clear();
        self.deque.clear();
        self.nan_count = 0;
    }
}
