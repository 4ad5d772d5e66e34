//! Bounded FIFO buffering of operations during a failover transition.
//!
//! Best-effort, in-memory only: the contract is at-least-once replay of what
//! the buffer still holds, not durability across a process crash.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// One operation captured while the primary was unavailable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BufferedOperation {
    /// Kind of operation (write, index, publish, ...).
    pub operation_type: String,

    /// Opaque payload replayed against the restored primary.
    pub operation_data: serde_json::Value,

    /// When the operation was buffered.
    pub buffered_at: DateTime<Utc>,
}

/// Bounded FIFO queue; overflow drops the oldest entry.
#[derive(Debug)]
pub struct OperationBuffer {
    queue: Mutex<VecDeque<BufferedOperation>>,
    max_size: usize,
}

impl OperationBuffer {
    pub fn new(max_size: usize) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            max_size: max_size.max(1),
        }
    }

    /// Enqueue an operation, returning the dropped entry on overflow.
    pub fn push(
        &self,
        operation_type: impl Into<String>,
        operation_data: serde_json::Value,
    ) -> Option<BufferedOperation> {
        let mut queue = self.queue.lock();
        let dropped = if queue.len() >= self.max_size {
            queue.pop_front()
        } else {
            None
        };
        queue.push_back(BufferedOperation {
            operation_type: operation_type.into(),
            operation_data,
            buffered_at: Utc::now(),
        });
        dropped
    }

    /// Take every buffered operation in FIFO order.
    pub fn drain(&self) -> Vec<BufferedOperation> {
        self.queue.lock().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fifo_order_preserved() {
        let buffer = OperationBuffer::new(10);
        for i in 0..5 {
            buffer.push("write", serde_json::json!({ "seq": i }));
        }

        let drained = buffer.drain();
        assert_eq!(drained.len(), 5);
        for (i, op) in drained.iter().enumerate() {
            assert_eq!(op.operation_data["seq"], i);
        }
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_overflow_drops_oldest() {
        let buffer = OperationBuffer::new(3);
        for i in 0..3 {
            assert!(buffer.push("write", serde_json::json!({ "seq": i })).is_none());
        }

        let dropped = buffer.push("write", serde_json::json!({ "seq": 3 })).unwrap();
        assert_eq!(dropped.operation_data["seq"], 0);
        assert_eq!(buffer.len(), 3);

        let drained = buffer.drain();
        assert_eq!(drained[0].operation_data["seq"], 1);
        assert_eq!(drained[2].operation_data["seq"], 3);
    }

    #[test]
    fn test_never_exceeds_capacity() {
        let buffer = OperationBuffer::new(4);
        for i in 0..100 {
            buffer.push("write", serde_json::json!({ "seq": i }));
            assert!(buffer.len() <= 4);
        }
    }
}
