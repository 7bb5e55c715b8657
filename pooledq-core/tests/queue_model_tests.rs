//! Randomized single-threaded comparison against a `VecDeque` model.

use std::collections::VecDeque;

use pooledq_core::LockFreeQueue;
use rstest::rstest;

/// Reference behaviour: a ring that drops its front when full.
struct EvictingModel {
    items: VecDeque<u32>,
    capacity: usize,
    evicted: usize,
}

impl EvictingModel {
    fn new(capacity: usize) -> Self {
        EvictingModel {
            items: VecDeque::with_capacity(capacity),
            capacity,
            evicted: 0,
        }
    }

    fn enqueue(&mut self, value: u32) {
        if self.items.len() == self.capacity {
            self.items.pop_front();
            self.evicted += 1;
        }
        self.items.push_back(value);
    }

    fn try_enqueue(&mut self, value: u32) -> Result<(), u32> {
        if self.items.len() == self.capacity {
            return Err(value);
        }
        self.items.push_back(value);
        Ok(())
    }
}

#[rstest]
#[case::two_nodes(2, 10_000)]
#[case::four_nodes(4, 10_000)]
#[case::medium(64, 50_000)]
fn test_matches_model(#[case] capacity: usize, #[case] operations: usize) {
    let queue = LockFreeQueue::new(capacity).unwrap();
    let mut model = EvictingModel::new(queue.capacity());

    for _ in 0..operations {
        let value = rand::random::<u32>();

        match rand::random::<u8>() % 5 {
            0 | 1 => {
                queue.enqueue(value);
                model.enqueue(value);
            }
            2 => {
                assert_eq!(queue.try_enqueue(value), model.try_enqueue(value));
            }
            3 => {
                assert_eq!(queue.dequeue(), model.items.pop_front());
            }
            4 => {
                if rand::random::<u8>() % 64 == 0 {
                    queue.clear();
                    model.items.clear();
                }
            }
            _ => unreachable!(),
        }

        assert_eq!(queue.len(), model.items.len());
        assert_eq!(queue.evicted(), model.evicted);
    }

    let drained: Vec<_> = std::iter::from_fn(|| queue.dequeue()).collect();
    let expected: Vec<_> = model.items.drain(..).collect();
    assert_eq!(drained, expected);
}
