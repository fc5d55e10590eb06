//! Growable result buffers
//!
//! A contiguous buffer whose capacity is managed by an injected
//! `GrowthPolicy`. The buffer grows before a push whenever the remaining
//! headroom falls under 1/16 of capacity, so `len <= capacity` always holds
//! and a burst of pushes never reallocates element by element.
//!
//! Buffers are owned by exactly one search or registration session and are
//! never shared.

use serde::{Deserialize, Serialize};

/// Capacity strategy for a `GrowableBuffer`
pub trait GrowthPolicy {
    /// Capacity allocated on first use
    fn initial_size(&self) -> usize;

    /// Next capacity after `capacity`; must be strictly larger
    fn grow(&self, capacity: usize) -> usize;

    /// Whether `count` elements leave too little headroom in `capacity`
    fn threshold_exceeded(&self, count: usize, capacity: usize) -> bool {
        let headroom = capacity.saturating_sub(count);
        headroom < (capacity / 16).max(1)
    }
}

/// Doubles capacity every time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DoublingGrowth {
    initial: usize,
}

impl DoublingGrowth {
    /// Start at `initial` elements (at least 1)
    pub fn new(initial: usize) -> Self {
        DoublingGrowth {
            initial: initial.max(1),
        }
    }
}

impl GrowthPolicy for DoublingGrowth {
    fn initial_size(&self) -> usize {
        self.initial
    }

    fn grow(&self, capacity: usize) -> usize {
        capacity.saturating_mul(2).max(capacity + 1)
    }
}

/// Doubles while small, then grows by progressively smaller factors
///
/// | Capacity        | Growth |
/// |-----------------|--------|
/// | < 4096          | x2     |
/// | < 65536         | x1.5   |
/// | otherwise       | x1.25  |
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TieredGrowth {
    initial: usize,
}

impl TieredGrowth {
    const SMALL: usize = 4096;
    const MEDIUM: usize = 65536;

    /// Start at `initial` elements (at least 1)
    pub fn new(initial: usize) -> Self {
        TieredGrowth {
            initial: initial.max(1),
        }
    }
}

impl GrowthPolicy for TieredGrowth {
    fn initial_size(&self) -> usize {
        self.initial
    }

    fn grow(&self, capacity: usize) -> usize {
        let next = if capacity < Self::SMALL {
            capacity.saturating_mul(2)
        } else if capacity < Self::MEDIUM {
            capacity.saturating_add(capacity / 2)
        } else {
            capacity.saturating_add(capacity / 4)
        };
        next.max(capacity + 1)
    }
}

/// Policy chosen at runtime from configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BufferGrowth {
    /// See `DoublingGrowth`
    Doubling(usize),
    /// See `TieredGrowth`
    Tiered(usize),
}

impl Default for BufferGrowth {
    fn default() -> Self {
        BufferGrowth::Doubling(64)
    }
}

impl GrowthPolicy for BufferGrowth {
    fn initial_size(&self) -> usize {
        match *self {
            BufferGrowth::Doubling(initial) => DoublingGrowth::new(initial).initial_size(),
            BufferGrowth::Tiered(initial) => TieredGrowth::new(initial).initial_size(),
        }
    }

    fn grow(&self, capacity: usize) -> usize {
        match *self {
            BufferGrowth::Doubling(initial) => DoublingGrowth::new(initial).grow(capacity),
            BufferGrowth::Tiered(initial) => TieredGrowth::new(initial).grow(capacity),
        }
    }
}

/// Contiguous element storage with policy-driven growth
#[derive(Debug, Clone)]
pub struct GrowableBuffer<T, P: GrowthPolicy = BufferGrowth> {
    items: Vec<T>,
    /// Logical capacity; the backing `Vec` may round up
    capacity: usize,
    policy: P,
}

impl<T, P: GrowthPolicy> GrowableBuffer<T, P> {
    /// Create an empty buffer; nothing is allocated until the first push
    pub fn new(policy: P) -> Self {
        GrowableBuffer {
            items: Vec::new(),
            capacity: 0,
            policy,
        }
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// True if the buffer holds no elements
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Current logical capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append one element, growing first if headroom is too small
    pub fn push(&mut self, item: T) {
        self.reserve_for(1);
        self.items.push(item);
    }

    /// Make room for `additional` more elements
    pub fn reserve_for(&mut self, additional: usize) {
        let needed = self.items.len() + additional;
        if self.capacity == 0 {
            self.capacity = self.policy.initial_size();
        }
        while needed > self.capacity || self.policy.threshold_exceeded(needed, self.capacity) {
            self.capacity = self.policy.grow(self.capacity);
        }
        if self.items.capacity() < self.capacity {
            self.items.reserve_exact(self.capacity - self.items.len());
        }
    }

    /// Elements as a slice
    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    /// Elements as a mutable slice
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.items
    }

    /// Drop all elements, keeping capacity
    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Keep only the first `len` elements
    pub fn truncate(&mut self, len: usize) {
        self.items.truncate(len);
    }

    /// Iterate over the elements
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }
}

impl<T: Copy, P: GrowthPolicy> GrowableBuffer<T, P> {
    /// Append a slice of elements
    pub fn extend_from_slice(&mut self, items: &[T]) {
        self.reserve_for(items.len());
        self.items.extend_from_slice(items);
    }
}

impl<T, P: GrowthPolicy> Extend<T> for GrowableBuffer<T, P> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for item in iter {
            self.push(item);
        }
    }
}
