use crate::error::FilterError;
use std::cmp::Ordering;
use std::collections::VecDeque;

/// Smallest window the filter accepts.
pub const MIN_WINDOW: usize = 3;

/// Window used by the recorder unless configured otherwise.
pub const DEFAULT_MEDIAN_WINDOW: usize = 3;

/// Plain function comparator, the default for [`MedianFilter`].
pub type Comparator<T> = fn(&T, &T) -> Ordering;

/// Sliding-window median estimator.
///
/// Keeps the last `window` submitted values and, on each submission, returns
/// the median of whatever is currently held. Before the window fills, the
/// median of the partial history is returned. For an even count the higher of
/// the two middle elements is chosen, so the result is always one of the
/// submitted values and `T` only needs a total order.
pub struct MedianFilter<T, C = Comparator<T>> {
    history: VecDeque<T>,
    window: usize,
    compare: C,
}

impl<T: Ord + Clone> MedianFilter<T> {
    /// Create a filter ordered by `T`'s own `Ord`.
    pub fn new(window: usize) -> Result<Self, FilterError> {
        Self::with_comparator(window, T::cmp)
    }
}

impl<T, C> MedianFilter<T, C>
where
    T: Clone,
    C: Fn(&T, &T) -> Ordering,
{
    /// Create a filter ordered by `compare`.
    pub fn with_comparator(window: usize, compare: C) -> Result<Self, FilterError> {
        if window < MIN_WINDOW {
            return Err(FilterError::WindowTooSmall(window));
        }
        Ok(Self {
            history: VecDeque::with_capacity(window),
            window,
            compare,
        })
    }

    /// Push `value` into the window and return the current median.
    pub fn sample(&mut self, value: T) -> T {
        if self.history.len() == self.window {
            self.history.pop_front();
        }
        self.history.push_back(value);
        self.median()
    }

    fn median(&self) -> T {
        let mut sorted: Vec<T> = self.history.iter().cloned().collect();
        sorted.sort_by(|a, b| (self.compare)(a, b));
        sorted[sorted.len() / 2].clone()
    }

    pub fn window(&self) -> usize {
        self.window
    }

    /// Number of values currently held (saturates at the window size).
    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }
}

impl MedianFilter<f64> {
    /// Filter over `f64` ordered by `f64::total_cmp`.
    pub fn real(window: usize) -> Result<Self, FilterError> {
        Self::with_comparator(window, f64::total_cmp as Comparator<f64>)
    }
}
