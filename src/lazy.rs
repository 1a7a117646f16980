// SPDX-License-Identifier: MIT OR Apache-2.0

//! Load-once slots for expensive collaborators (models, in-memory indexes).

use anyhow::Result;

/// State of a lazily loaded dependency.
///
/// `Unavailable` is terminal: once a loader reports the dependency cannot be
/// provided, it is never attempted again for the lifetime of the slot.
#[derive(Debug, Default)]
pub enum LazySlot<T> {
    #[default]
    Unloaded,
    Loaded(T),
    Unavailable,
}

impl<T> LazySlot<T> {
    /// Creates a slot that already holds a value.
    pub fn loaded(value: T) -> Self {
        LazySlot::Loaded(value)
    }

    /// Returns the value, running `load` on first access.
    ///
    /// `Ok(None)` from the loader marks the slot unavailable. An `Err` leaves
    /// the slot unloaded so a later call may retry.
    pub fn get_or_load<F>(&mut self, load: F) -> Result<Option<&mut T>>
    where
        F: FnOnce() -> Result<Option<T>>,
    {
        if let LazySlot::Unloaded = self {
            *self = match load()? {
                Some(value) => LazySlot::Loaded(value),
                None => LazySlot::Unavailable,
            };
        }

        match self {
            LazySlot::Loaded(value) => Ok(Some(value)),
            _ => Ok(None),
        }
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self, LazySlot::Loaded(_))
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, LazySlot::Unavailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_only_once() {
        let mut slot: LazySlot<u32> = LazySlot::default();
        let mut calls = 0;

        for _ in 0..3 {
            let value = slot
                .get_or_load(|| {
                    calls += 1;
                    Ok(Some(7))
                })
                .unwrap();
            assert_eq!(value.copied(), Some(7));
        }

        assert_eq!(calls, 1);
        assert!(slot.is_loaded());
    }

    #[test]
    fn unavailable_is_terminal() {
        let mut slot: LazySlot<u32> = LazySlot::default();
        assert!(slot.get_or_load(|| Ok(None)).unwrap().is_none());
        assert!(slot.is_unavailable());

        let value = slot.get_or_load(|| Ok(Some(1))).unwrap();
        assert!(value.is_none());
    }

    #[test]
    fn load_error_allows_retry() {
        let mut slot: LazySlot<u32> = LazySlot::default();
        assert!(slot.get_or_load(|| anyhow::bail!("boom")).is_err());
        assert!(!slot.is_loaded());

        let value = slot.get_or_load(|| Ok(Some(3))).unwrap();
        assert_eq!(value.copied(), Some(3));
    }
}
