use std::collections::VecDeque;

/// Fixed capacity window over the last visited pins.
///
/// The ring keeps visiting order for eviction, the counters answer membership in O(1).
#[derive(Clone, Debug)]
pub struct RecentPins {
    ring: VecDeque<usize>,
    counts: Vec<u32>,
    capacity: usize,
}

impl RecentPins {
    pub fn new(pin_count: usize, capacity: usize) -> Self {
        Self {
            ring: VecDeque::with_capacity(capacity),
            counts: vec![0; pin_count],
            capacity,
        }
    }

    pub fn contains(&self, pin: usize) -> bool {
        self.counts.get(pin).is_some_and(|&count| count > 0)
    }

    /// Marks `pin` as visited, evicting the oldest pin when the window is full.
    pub fn push(&mut self, pin: usize) {
        if self.capacity == 0 {
            return;
        }
        if self.ring.len() == self.capacity {
            if let Some(oldest) = self.ring.pop_front() {
                self.counts[oldest] -= 1;
            }
        }
        self.ring.push_back(pin);
        self.counts[pin] += 1;
    }

    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }
}
