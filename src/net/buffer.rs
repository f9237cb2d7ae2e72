//! Reusable byte staging buffer with amortized compaction.
//!
//! # Responsibilities
//! - Stage socket reads and writes without per-operation allocation
//! - Hand out zero-copy views into the occupied window
//! - Compact lazily so raw storage stays bounded at twice the capacity
//!
//! # Design Decisions
//! - `head`/`tail` cursors bound the occupied window `[head, tail)`;
//!   invariant `0 <= head <= tail <= raw.len()`, `len <= capacity`
//! - Compaction moves the occupied window back to offset 0 under the
//!   policy in `require_write`, amortizing the move cost
//! - Not safe for concurrent use; the protocol engine drives at most one
//!   in-flight read and one in-flight write per buffer

use thiserror::Error;

/// Error type for buffer cursor operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BufferError {
    /// Asked for more bytes than are currently staged.
    #[error("requested {requested} bytes but only {staged} are staged")]
    ExceedsStaged { requested: usize, staged: usize },

    /// Asked for more bytes than the remaining logical capacity.
    #[error("requested {requested} bytes but only {room} fit")]
    ExceedsCapacity { requested: usize, room: usize },

    /// Committed more bytes than the writable tail region holds.
    #[error("committed {committed} bytes but tail room is {room}")]
    ExceedsTailRoom { committed: usize, room: usize },
}

/// A staging buffer over raw storage of twice the logical capacity.
pub struct StagingBuffer {
    raw: Vec<u8>,
    capacity: usize,
    head: usize,
    tail: usize,
}

impl StagingBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            raw: vec![0; capacity * 2],
            capacity,
            head: 0,
            tail: 0,
        }
    }

    /// Number of staged (unread) bytes.
    pub fn len(&self) -> usize {
        self.tail - self.head
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Logical capacity; `len` never exceeds this.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Remaining logical room for writes.
    pub fn available(&self) -> usize {
        self.capacity - self.len()
    }

    /// Drop all staged bytes and reset both cursors.
    pub fn clear(&mut self) {
        self.head = 0;
        self.tail = 0;
    }

    /// Borrow the next `count` staged bytes without consuming them.
    pub fn require_read(&self, count: usize) -> Result<&[u8], BufferError> {
        if count > self.len() {
            return Err(BufferError::ExceedsStaged {
                requested: count,
                staged: self.len(),
            });
        }
        Ok(&self.raw[self.head..self.head + count])
    }

    /// Consume `count` staged bytes. Resets both cursors when the window
    /// empties, keeping storage compact across idle periods.
    pub fn confirm_read(&mut self, count: usize) -> Result<(), BufferError> {
        if count > self.len() {
            return Err(BufferError::ExceedsStaged {
                requested: count,
                staged: self.len(),
            });
        }
        self.head += count;
        if self.is_empty() {
            self.clear();
        }
        Ok(())
    }

    /// Borrow a writable view at the tail, `min(tail room, count)` bytes
    /// long. Callers must be prepared to receive fewer bytes than requested
    /// and loop.
    ///
    /// Compacts (moves the occupied window to offset 0) when `force_compact`
    /// is set, when tail room is below half of `count`, when `head` has
    /// consumed more than half of the staged window, or when
    /// `ensure_contiguous` is set and tail room is below `count`.
    pub fn require_write(
        &mut self,
        count: usize,
        ensure_contiguous: bool,
        force_compact: bool,
    ) -> Result<&mut [u8], BufferError> {
        if count > self.available() {
            return Err(BufferError::ExceedsCapacity {
                requested: count,
                room: self.available(),
            });
        }

        let mut tail_room = self.raw.len() - self.tail;
        if force_compact
            || tail_room < count / 2
            || self.head > self.len() / 2
            || (ensure_contiguous && tail_room < count)
        {
            let len = self.len();
            self.raw.copy_within(self.head..self.tail, 0);
            self.head = 0;
            self.tail = len;
            tail_room = self.raw.len() - self.tail;
        }

        let view_len = tail_room.min(count);
        Ok(&mut self.raw[self.tail..self.tail + view_len])
    }

    /// Commit `count` bytes written into the tail view.
    pub fn confirm_write(&mut self, count: usize) -> Result<(), BufferError> {
        let tail_room = self.raw.len() - self.tail;
        if count > tail_room {
            return Err(BufferError::ExceedsTailRoom {
                committed: count,
                room: tail_room,
            });
        }
        if count > self.available() {
            return Err(BufferError::ExceedsCapacity {
                requested: count,
                room: self.available(),
            });
        }
        self.tail += count;
        Ok(())
    }
}
