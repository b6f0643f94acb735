use crate::registry::RunnerId;
use std::collections::VecDeque;

/// Runners waiting to be executed before the next LaTeX pass.
///
/// Ordered like a list but holding each runner at most once.
#[derive(Debug, Default, Clone)]
pub struct BuildQueue {
    items: VecDeque<RunnerId>,
}

impl BuildQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedules `runner` ahead of everything else, moving it to the front
    /// if it is already queued.
    pub fn push(&mut self, runner: RunnerId) {
        self.items.retain(|queued| *queued != runner);
        self.items.push_front(runner);
    }

    /// Schedules `runner` last. Does nothing if it is already queued.
    pub fn append(&mut self, runner: RunnerId) {
        if !self.contains(runner) {
            self.items.push_back(runner);
        }
    }

    pub fn take_next(&mut self) -> Option<RunnerId> {
        self.items.pop_front()
    }

    pub fn contains(&self, runner: RunnerId) -> bool {
        self.items.contains(&runner)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = RunnerId> + '_ {
        self.items.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(queue: &BuildQueue) -> Vec<usize> {
        queue.iter().map(|id| id.0).collect()
    }

    #[test]
    fn push_moves_to_front_without_duplicating() {
        let mut queue = BuildQueue::new();
        queue.append(RunnerId(1));
        queue.append(RunnerId(2));
        queue.append(RunnerId(3));
        queue.push(RunnerId(3));

        assert_eq!(ids(&queue), vec![3, 1, 2]);
        assert_eq!(queue.len(), 3);
    }

    #[test]
    fn append_is_noop_when_queued() {
        let mut queue = BuildQueue::new();
        queue.push(RunnerId(1));
        queue.append(RunnerId(2));
        queue.append(RunnerId(1));

        assert_eq!(ids(&queue), vec![1, 2]);
    }

    #[test]
    fn take_next_drains_in_order() {
        let mut queue = BuildQueue::new();
        queue.append(RunnerId(4));
        queue.push(RunnerId(5));

        assert_eq!(queue.take_next(), Some(RunnerId(5)));
        assert_eq!(queue.take_next(), Some(RunnerId(4)));
        assert_eq!(queue.take_next(), None);
        assert!(queue.is_empty());
    }
}
