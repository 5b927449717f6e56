//! Iterator adapters for automatic progress tracking.
//!
//! [`ProgressIteratorExt`] adds helpers to every [`Iterator`] so a loop can report into a
//! [`Progress`] with one method call. Each yielded item increments the value by one and
//! exhausting the iterator finishes the progress.
//!
//! # Heuristics
//!
//! When the adapter creates the [`Progress`] itself, it checks [`Iterator::size_hint`]:
//! an exact size becomes the total, anything else leaves the total unknown.
//!
//! # Example
//!
//! ```ignore
//! use rated_progress::ProgressIteratorExt;
//!
//! for file in files.iter().progress_with_description("hashing") {
//!     // ...
//! }
//! ```

use compact_str::CompactString;

use crate::progress::Progress;

/// An iterator adapter that counts yielded items into a [`Progress`].
pub struct ProgressIter<I> {
    iter: I,
    progress: Progress,
}

impl<I> ProgressIter<I> {
    /// Creates a new `ProgressIter`.
    ///
    /// Usually constructed via [`ProgressIteratorExt`] methods.
    pub const fn new(iter: I, progress: Progress) -> Self {
        Self { iter, progress }
    }

    /// The progress this iterator reports into.
    pub const fn progress(&self) -> &Progress {
        &self.progress
    }
}

impl<I: Iterator> Iterator for ProgressIter<I> {
    type Item = I::Item;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.iter.next();

        if item.is_some() {
            self.progress.inc(1);
        } else if !self.progress.is_finished() {
            self.progress.finish();
        }

        item
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.iter.size_hint()
    }
}

/// Extension trait to attach progress tracking to any Iterator.
pub trait ProgressIteratorExt: Sized {
    /// Wraps the iterator in a new, running [`Progress`] with the given description.
    fn progress_with_description(self, description: impl Into<CompactString>) -> ProgressIter<Self>;

    /// Wraps the iterator using an existing [`Progress`].
    fn progress_with(self, progress: Progress) -> ProgressIter<Self>;
}

impl<I: Iterator> ProgressIteratorExt for I {
    fn progress_with_description(
        self,
        description: impl Into<CompactString>,
    ) -> ProgressIter<Self> {
        let progress = Progress::new(description, exact_len(&self), 0);
        progress.run();
        ProgressIter::new(self, progress)
    }

    fn progress_with(self, progress: Progress) -> ProgressIter<Self> {
        ProgressIter::new(self, progress)
    }
}

/// The exact length from `size_hint`, or `-1` if unknown.
fn exact_len(iter: &impl Iterator) -> i64 {
    match iter.size_hint() {
        (lower, Some(upper)) if upper == lower => i64::try_from(upper).unwrap_or(-1),
        _ => -1,
    }
}

#[cfg(test)]
mod tests {
    use super::ProgressIteratorExt as _;
    use crate::progress::Progress;

    /// Iterator Integration
    #[test]
    fn test_iterator_adapter() {
        let data = [1, 2, 3, 4, 5];

        let iter = data.iter().progress_with_description("iter_test");
        let handle = iter.progress().clone();
        let count = iter.count();

        assert_eq!(count, 5);
        assert_eq!(handle.get_value(), 5);
        assert!(handle.is_finished(), "exhaustion finishes the progress");
        assert_eq!(handle.get_total(), 5, "total inferred from the exact size");
        assert!(handle.get_elapsed().is_some());
    }

    /// Unknown sizes leave the total unknown.
    #[test]
    fn test_unknown_size() {
        let iter = (0..10).filter(|n| n % 2 == 0).progress_with_description("evens");
        assert_eq!(iter.progress().get_total(), -1);
    }

    /// An existing progress keeps its own total.
    #[test]
    fn test_existing_progress() {
        let progress = Progress::new("shared", 100, 40);
        let sum: i32 = (0..3).progress_with(progress.clone()).sum();

        assert_eq!(sum, 3);
        assert_eq!(progress.get_value(), 43);
        assert_eq!(progress.get_total(), 100);
    }
}
