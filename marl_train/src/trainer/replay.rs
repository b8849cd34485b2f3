//! Per-agent replay storage.
//!
//! Every agent receives exactly one transition per global step, so the
//! buffers of all agents stay index-aligned: position `i` in agent A's buffer
//! and position `i` in agent B's buffer belong to the same environment step.
//! A centralised critic relies on this to sample joint transitions with one
//! shared index vector.

use rand::Rng;

use super::TrainerError;

/// Ring buffer with O(1) insert and random access.
///
/// Overwrites oldest elements when capacity is reached.
#[derive(Debug, Clone)]
struct RingBuffer<T> {
    buffer: Vec<T>,
    capacity: usize,
    write_pos: usize,
}

impl<T> RingBuffer<T> {
    fn new(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity.min(4096)),
            capacity: capacity.max(1),
            write_pos: 0,
        }
    }

    fn push(&mut self, item: T) {
        if self.buffer.len() < self.capacity {
            self.buffer.push(item);
        } else {
            self.buffer[self.write_pos] = item;
        }
        self.write_pos = (self.write_pos + 1) % self.capacity;
    }

    #[inline]
    fn get(&self, idx: usize) -> Option<&T> {
        self.buffer.get(idx)
    }

    #[inline]
    fn len(&self) -> usize {
        self.buffer.len()
    }
}

/// One stored transition.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredTransition {
    /// Observation the action was chosen from.
    pub observation: Vec<f32>,
    /// Action taken, in environment space.
    pub action: Vec<f32>,
    /// Reward received.
    pub reward: f32,
    /// Observation after the step.
    pub next_observation: Vec<f32>,
    /// Agent-reported completion.
    pub done: bool,
}

/// Flattened minibatch, row-major.
#[derive(Debug, Clone, Default)]
pub struct ReplayBatch {
    /// Observations [batch * obs_dim].
    pub observations: Vec<f32>,
    /// Actions [batch * act_dim].
    pub actions: Vec<f32>,
    /// Rewards [batch].
    pub rewards: Vec<f32>,
    /// Next observations [batch * obs_dim].
    pub next_observations: Vec<f32>,
    /// Done flags as 0.0 / 1.0 [batch].
    pub dones: Vec<f32>,
}

/// Replay buffer for one agent.
#[derive(Debug, Clone)]
pub struct ReplayBuffer {
    storage: RingBuffer<StoredTransition>,
}

impl ReplayBuffer {
    /// Create a buffer holding at most `capacity` transitions.
    pub fn new(capacity: usize) -> Self {
        Self {
            storage: RingBuffer::new(capacity),
        }
    }

    /// Store a transition, evicting the oldest when full.
    pub fn push(&mut self, transition: StoredTransition) {
        self.storage.push(transition);
    }

    /// Number of stored transitions.
    pub fn len(&self) -> usize {
        self.storage.len()
    }

    /// Whether nothing has been stored yet.
    pub fn is_empty(&self) -> bool {
        self.storage.len() == 0
    }

    /// Draw `batch_size` indices uniformly with replacement.
    pub fn make_index<R: Rng>(&self, batch_size: usize, rng: &mut R) -> Vec<usize> {
        if self.is_empty() {
            return Vec::new();
        }
        (0..batch_size)
            .map(|_| rng.gen_range(0..self.storage.len()))
            .collect()
    }

    /// Collect the transitions at `indices` into a flattened batch.
    pub fn gather(&self, indices: &[usize]) -> Result<ReplayBatch, TrainerError> {
        let mut batch = ReplayBatch::default();
        for &idx in indices {
            let t = self.storage.get(idx).ok_or(TrainerError::ReplayIndex {
                index: idx,
                len: self.storage.len(),
            })?;
            batch.observations.extend_from_slice(&t.observation);
            batch.actions.extend_from_slice(&t.action);
            batch.rewards.push(t.reward);
            batch.next_observations.extend_from_slice(&t.next_observation);
            batch.dones.push(if t.done { 1.0 } else { 0.0 });
        }
        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn transition(i: usize) -> StoredTransition {
        StoredTransition {
            observation: vec![i as f32, 0.0],
            action: vec![i as f32 * 0.1],
            reward: i as f32,
            next_observation: vec![i as f32 + 1.0, 0.0],
            done: i % 2 == 0,
        }
    }

    #[test]
    fn test_push_and_len() {
        let mut buffer = ReplayBuffer::new(10);
        assert!(buffer.is_empty());
        for i in 0..4 {
            buffer.push(transition(i));
        }
        assert_eq!(buffer.len(), 4);
    }

    #[test]
    fn test_ring_overwrites_oldest() {
        let mut buffer = ReplayBuffer::new(3);
        for i in 0..5 {
            buffer.push(transition(i));
        }
        assert_eq!(buffer.len(), 3);
        // Slots 0 and 1 were overwritten by transitions 3 and 4.
        let batch = buffer.gather(&[0, 1, 2]).unwrap();
        assert_eq!(batch.rewards, vec![3.0, 4.0, 2.0]);
    }

    #[test]
    fn test_gather_flattens_rows() {
        let mut buffer = ReplayBuffer::new(8);
        for i in 0..3 {
            buffer.push(transition(i));
        }
        let batch = buffer.gather(&[2, 0]).unwrap();
        assert_eq!(batch.observations, vec![2.0, 0.0, 0.0, 0.0]);
        assert_eq!(batch.next_observations, vec![3.0, 0.0, 1.0, 0.0]);
        assert_eq!(batch.dones, vec![1.0, 1.0]);
        assert_eq!(batch.rewards, vec![2.0, 0.0]);
    }

    #[test]
    fn test_gather_out_of_range() {
        let buffer = ReplayBuffer::new(8);
        assert!(matches!(
            buffer.gather(&[0]),
            Err(TrainerError::ReplayIndex { index: 0, len: 0 })
        ));
    }

    #[test]
    fn test_make_index_in_range() {
        let mut buffer = ReplayBuffer::new(16);
        for i in 0..5 {
            buffer.push(transition(i));
        }
        let mut rng = StdRng::seed_from_u64(7);
        let index = buffer.make_index(64, &mut rng);
        assert_eq!(index.len(), 64);
        assert!(index.iter().all(|&i| i < 5));
    }

    #[test]
    fn test_aligned_buffers_share_indices() {
        let mut a = ReplayBuffer::new(4);
        let mut b = ReplayBuffer::new(4);
        for i in 0..6 {
            a.push(transition(i));
            b.push(transition(i + 100));
        }
        let mut rng = StdRng::seed_from_u64(1);
        let index = a.make_index(8, &mut rng);
        let batch_a = a.gather(&index).unwrap();
        let batch_b = b.gather(&index).unwrap();
        for (ra, rb) in batch_a.rewards.iter().zip(&batch_b.rewards) {
            assert_eq!(*rb, *ra + 100.0);
        }
    }
}
