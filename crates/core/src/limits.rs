//! Page size and container packing limits
//!
//! Encoded vectors are packed into containers: runs of whole pages holding a
//! fixed number of equally sized slots. The slot index of a vector must fit in
//! a single byte, so a container never holds more than 255 slots.
//!
//! ## Contract
//!
//! These values define the persisted layout and are FROZEN.

/// Size of a single storage page in bytes
pub const PAGE_SIZE: usize = 8192;

/// Largest run of pages a single container may span (256 KiB)
pub const MAX_CONTAINER_PAGES: usize = 32;

/// Slot indices are stored as `u8`
pub const MAX_CONTAINER_SLOTS: usize = u8::MAX as usize;

/// Number of whole pages required to hold `bytes`
pub const fn pages_for_bytes(bytes: usize) -> usize {
    if bytes == 0 {
        return 1;
    }
    (bytes + PAGE_SIZE - 1) / PAGE_SIZE
}

/// Largest slot count for a container of vectors of `vector_len` bytes
///
/// The count is bounded by the container byte budget and by the single-byte
/// slot index. Vectors larger than the budget get a container of their own.
/// Returns 0 for a zero-length vector.
pub const fn slots_per_container(vector_len: usize) -> usize {
    if vector_len == 0 {
        return 0;
    }
    let by_budget = (MAX_CONTAINER_PAGES * PAGE_SIZE) / vector_len;
    let slots = if by_budget < MAX_CONTAINER_SLOTS {
        by_budget
    } else {
        MAX_CONTAINER_SLOTS
    };
    if slots == 0 {
        1
    } else {
        slots
    }
}

/// Container geometry for a fixed encoded vector length
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerLayout {
    /// Encoded length of one vector in bytes
    pub vector_len: usize,
    /// Slots per container (1..=255)
    pub slots: usize,
    /// Pages per container run
    pub pages: u32,
}

impl ContainerLayout {
    /// Compute the layout for vectors of `vector_len` bytes
    ///
    /// Returns `None` when `vector_len` is zero.
    pub fn for_vector_len(vector_len: usize) -> Option<Self> {
        let slots = slots_per_container(vector_len);
        if slots == 0 {
            return None;
        }
        let pages = pages_for_bytes(slots * vector_len) as u32;
        Some(ContainerLayout {
            vector_len,
            slots,
            pages,
        })
    }

    /// Byte offset of `slot` within the container run
    pub fn slot_offset(&self, slot: u8) -> usize {
        slot as usize * self.vector_len
    }
}
