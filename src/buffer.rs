//! Growable record buffer
//!
//! Slot storage that grows in fixed increments. Every slot past the logical
//! end holds `T::default()`, so a freshly grown region never carries stale
//! data. The logical length is tracked explicitly; consumers never scan for
//! a terminator.

/// Default number of slots added per growth step
pub const GROWTH_INCREMENT: usize = 30;

#[derive(Debug)]
pub struct RecordBuffer<T> {
    slots: Vec<T>,
    len: usize,
    increment: usize,
}

impl<T: Default> RecordBuffer<T> {
    pub fn new() -> Self {
        Self::with_increment(GROWTH_INCREMENT)
    }

    /// Buffer with a custom growth step (at least one slot)
    pub fn with_increment(increment: usize) -> Self {
        Self {
            slots: Vec::new(),
            len: 0,
            increment: increment.max(1),
        }
    }

    /// Number of records written
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of slots allocated (written or not)
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Grow by one increment if `count` has reached the capacity.
    ///
    /// Only the new slots are initialised; written records keep their
    /// index and value.
    pub fn ensure_capacity(&mut self, count: usize) -> Result<(), BufferError> {
        if count != self.slots.len() {
            return Ok(());
        }

        self.slots
            .try_reserve_exact(self.increment)
            .map_err(|_| BufferError::Allocation {
                requested: self.slots.len() + self.increment,
            })?;
        self.slots.resize_with(self.slots.len() + self.increment, T::default);

        log::trace!("record buffer grown to {} slots", self.slots.len());
        Ok(())
    }

    /// Append a record, growing first if every slot is taken
    pub fn push(&mut self, record: T) -> Result<(), BufferError> {
        self.ensure_capacity(self.len)?;
        self.slots[self.len] = record;
        self.len += 1;
        Ok(())
    }

    pub fn as_slice(&self) -> &[T] {
        &self.slots[..self.len]
    }

    /// Allocated slots past the logical end
    pub fn spare(&self) -> &[T] {
        &self.slots[self.len..]
    }

    /// Hand the written records to the caller, dropping spare slots
    pub fn into_vec(mut self) -> Vec<T> {
        self.slots.truncate(self.len);
        self.slots
    }
}

impl<T: Default> Default for RecordBuffer<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BufferError {
    #[error("Unable to allocate {requested} record slots")]
    Allocation { requested: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grows_in_increments() {
        let mut buf: RecordBuffer<u32> = RecordBuffer::with_increment(4);
        assert_eq!(buf.capacity(), 0);

        for i in 1..=5 {
            buf.push(i).unwrap();
        }

        assert_eq!(buf.len(), 5);
        assert_eq!(buf.capacity(), 8);
        assert_eq!(buf.as_slice(), &[1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_new_region_is_default() {
        let mut buf: RecordBuffer<String> = RecordBuffer::with_increment(3);
        buf.push("a".into()).unwrap();
        buf.push("b".into()).unwrap();
        buf.push("c".into()).unwrap();

        buf.ensure_capacity(buf.len()).unwrap();

        assert_eq!(buf.capacity(), 6);
        assert_eq!(buf.as_slice(), &["a", "b", "c"]);
        assert!(buf.spare().iter().all(|s| s.is_empty()));
    }

    #[test]
    fn test_ensure_capacity_noop_below_capacity() {
        let mut buf: RecordBuffer<u8> = RecordBuffer::with_increment(10);
        buf.push(7).unwrap();
        buf.ensure_capacity(1).unwrap();
        assert_eq!(buf.capacity(), 10);
    }

    #[test]
    fn test_into_vec_drops_spare_slots() {
        let mut buf: RecordBuffer<u32> = RecordBuffer::new();
        buf.push(42).unwrap();
        let records = buf.into_vec();
        assert_eq!(records, vec![42]);
    }

    #[test]
    fn test_failed_growth_keeps_records() {
        let mut buf: RecordBuffer<u64> = RecordBuffer::with_increment(usize::MAX / 2);

        let err = buf.push(1).unwrap_err();

        let BufferError::Allocation { requested } = err;
        assert_eq!(requested, usize::MAX / 2);
        assert_eq!(buf.len(), 0);
        assert_eq!(buf.capacity(), 0);
    }

    #[test]
    fn test_zero_increment_clamped() {
        let mut buf: RecordBuffer<u32> = RecordBuffer::with_increment(0);
        buf.push(1).unwrap();
        buf.push(2).unwrap();
        assert_eq!(buf.as_slice(), &[1, 2]);
    }
}
