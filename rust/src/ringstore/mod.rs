// RingStore is fixed-capacity circular storage with logical front/back/count
// pointers. It does no locking and never resizes itself; the Monitor decides
// when to call relinearize.
pub struct RingStore<T> {
    slots: Vec<Option<T>>,
    // next slot to dequeue
    front: usize,
    // next free slot to enqueue into
    back: usize,
    count: usize,
}

impl<T> RingStore<T> {
    pub fn new(capacity: usize) -> RingStore<T> {
        assert!(capacity > 0, "RingStore capacity must be > 0");
        RingStore {
            slots: Self::alloc(capacity),
            front: 0,
            back: 0,
            count: 0,
        }
    }

    fn alloc(capacity: usize) -> Vec<Option<T>> {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);
        slots
    }

    // push_back stores item at the back slot. The caller must check is_full first;
    // pushing into a full store is a bug and panics.
    pub fn push_back(&mut self, item: T) {
        assert!(!self.is_full(), "push_back on a full RingStore");
        self.slots[self.back] = Some(item);
        self.back = (self.back + 1) % self.capacity();
        self.count += 1;
    }

    pub fn pop_front(&mut self) -> Option<T> {
        if self.count == 0 {
            return None;
        }
        let item = self.slots[self.front].take();
        self.front = (self.front + 1) % self.capacity();
        self.count -= 1;
        item
    }

    /// Moves the held items, front to back, into fresh storage of `new_capacity`
    /// slots. Afterwards `front == 0` and `back == len() % new_capacity`.
    ///
    /// # Panics
    ///
    /// Panics if `new_capacity` is 0 or smaller than `len()`.
    pub fn relinearize(&mut self, new_capacity: usize) {
        assert!(new_capacity > 0, "cannot relinearize to capacity 0");
        assert!(
            new_capacity >= self.count,
            "cannot fit {} items into capacity {}",
            self.count,
            new_capacity
        );

        let mut fresh = Self::alloc(new_capacity);
        let old_capacity = self.capacity();
        for (i, slot) in fresh.iter_mut().enumerate().take(self.count) {
            *slot = self.slots[(self.front + i) % old_capacity].take();
        }

        self.slots = fresh;
        self.front = 0;
        // back must stay inside [0, capacity) even when the new store is exactly full
        self.back = self.count % new_capacity;
    }

    // Iterates front to back without removing anything.
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        let capacity = self.capacity();
        (0..self.count).filter_map(move |i| self.slots[(self.front + i) % capacity].as_ref())
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn is_full(&self) -> bool {
        self.count == self.capacity()
    }

    pub fn front_index(&self) -> usize {
        self.front
    }

    pub fn back_index(&self) -> usize {
        self.back
    }
}

impl<T> std::fmt::Debug for RingStore<T>
where
    T: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RingStore")
            .field("capacity", &self.capacity())
            .field("front", &self.front)
            .field("back", &self.back)
            .field("items", &self.iter().collect::<Vec<_>>())
            .finish()
    }
}
