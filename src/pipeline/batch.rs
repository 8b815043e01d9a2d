use crate::pipeline::IncrementEvent;

/// Double-buffered accumulation of not-yet-persisted events.
///
/// Appends go to `active`. [`Batch::take`] hands `active` out whole and installs
/// the recycled `spare` buffer in its place, so neither buffer is copied and the
/// drained events are never appended to while they are being flushed. Once the
/// flush is done the caller returns the buffer via [`Batch::recycle`].
#[derive(Debug, Default)]
pub struct Batch {
    active: Vec<IncrementEvent>,
    spare: Vec<IncrementEvent>,
}

impl Batch {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            active: Vec::with_capacity(capacity),
            spare: Vec::with_capacity(capacity),
        }
    }

    /// Append an event and return the new batch length.
    pub fn push(&mut self, event: IncrementEvent) -> usize {
        self.active.push(event);
        self.active.len()
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    /// Swap buffers and return the accumulated events, or `None` if empty.
    pub fn take(&mut self) -> Option<Vec<IncrementEvent>> {
        if self.active.is_empty() {
            return None;
        }
        let fresh = std::mem::take(&mut self.spare);
        Some(std::mem::replace(&mut self.active, fresh))
    }

    /// Give a drained buffer back for reuse.
    pub fn recycle(&mut self, mut drained: Vec<IncrementEvent>) {
        drained.clear();
        if drained.capacity() > self.spare.capacity() {
            self.spare = drained;
        }
    }
}
