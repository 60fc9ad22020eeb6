use std::collections::VecDeque;

/// A line evicted from one level that still has to reach the next one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteBackEntry {
    pub address: u64,
    pub tag: u64,
}

/// Time and energy spent draining a queue.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DrainCost {
    pub entries: u64,
    pub time_ns: f64,
    pub energy_j: f64,
}

/// Unbounded FIFO of pending write-backs into one destination level.
#[derive(Debug, Clone, Default)]
pub struct WriteBackQueue {
    entries: VecDeque<WriteBackEntry>,
}

impl WriteBackQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&mut self, address: u64, tag: u64) {
        self.entries.push_back(WriteBackEntry { address, tag });
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Pops every entry in arrival order, charging one destination access each.
    pub fn drain_all(&mut self, latency_ns: f64, active_power_w: f64) -> DrainCost {
        let mut cost = DrainCost::default();
        while let Some(entry) = self.entries.pop_front() {
            log::trace!("write-back {:#x} (tag {:#x})", entry.address, entry.tag);
            cost.entries += 1;
            cost.time_ns += latency_ns;
            cost.energy_j += active_power_w * latency_ns * 1e-9;
        }
        cost
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn drain_empties_queue_and_charges_each_entry() {
        let mut queue = WriteBackQueue::new();
        queue.enqueue(0x8000, 1);
        queue.enqueue(0x40, 0);
        assert_eq!(queue.entries.len(), 2);

        let cost = queue.drain_all(5.0, 2.0);
        assert!(queue.is_empty());
        assert_eq!(cost.entries, 2);
        assert_eq!(cost.time_ns, 10.0);
        assert!((cost.energy_j - 20e-9).abs() < 1e-18);
    }

    #[test]
    fn draining_empty_queue_costs_nothing() {
        let mut queue = WriteBackQueue::new();
        assert_eq!(queue.drain_all(50.0, 4.0), DrainCost::default());
    }

    #[test]
    fn entries_leave_in_arrival_order() {
        let mut queue = WriteBackQueue::new();
        for tag in 0..4 {
            queue.enqueue(tag * 0x1000, tag);
        }
        let order: Vec<u64> = queue.entries.iter().map(|e| e.tag).collect();
        assert_eq!(order, vec![0, 1, 2, 3]);
        let _ = queue.drain_all(1.0, 1.0);
        assert!(queue.is_empty());
    }
}
