//! Resize policies for the Monitor's ring storage.
//!
//! A policy is a stateless function: given the mutation that just happened and
//! the resulting `len`/`capacity`, it returns the capacity to relinearize into,
//! or `None` to leave the storage alone. Policies are plain function pointers so
//! a Monitor can be built with any of them, the same way a caller picks an
//! eviction strategy.

/// The mutation the Monitor just applied to its storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    Enqueued,
    Dequeued,
}

pub type ResizePolicy = fn(Mutation, usize, usize) -> Option<usize>;

// Grows to twice the capacity as soon as an enqueue fills the store, and halves
// it after a dequeue leaves 0 < len <= capacity / 4.
pub fn doubling_policy(mutation: Mutation, len: usize, capacity: usize) -> Option<usize> {
    match mutation {
        Mutation::Enqueued => grow_when_full(len, capacity),
        Mutation::Dequeued => shrink_at_or_below(len, capacity, capacity / 4),
    }
}

// Same growth rule as doubling_policy, but only shrinks once 0 < len <= capacity / 8.
// A store that just shrank is then at most a quarter full, so alternating
// produce/consume right at a threshold does not resize on every call.
pub fn damped_policy(mutation: Mutation, len: usize, capacity: usize) -> Option<usize> {
    match mutation {
        Mutation::Enqueued => grow_when_full(len, capacity),
        Mutation::Dequeued => shrink_at_or_below(len, capacity, capacity / 8),
    }
}

fn grow_when_full(len: usize, capacity: usize) -> Option<usize> {
    if len == capacity {
        capacity.checked_mul(2)
    } else {
        None
    }
}

fn shrink_at_or_below(len: usize, capacity: usize, threshold: usize) -> Option<usize> {
    let halved = capacity / 2;
    // never shrink to zero, and never below what is held
    if len > 0 && len <= threshold && halved >= 1 && halved >= len {
        Some(halved)
    } else {
        None
    }
}
