use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

/// One answered question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exchange {
    pub question: String,
    pub answer: String,
}

/// The last few exchanges of the conversation, oldest first.
pub struct ConversationMemory {
    capacity: usize,
    exchanges: Mutex<VecDeque<Exchange>>,
}

impl ConversationMemory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            exchanges: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Exchange>> {
        self.exchanges.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Record an exchange, evicting the oldest when full.
    pub fn add(&self, question: impl Into<String>, answer: impl Into<String>) {
        let mut exchanges = self.lock();
        if exchanges.len() == self.capacity {
            exchanges.pop_front();
        }
        exchanges.push_back(Exchange {
            question: question.into(),
            answer: answer.into(),
        });
    }

    pub fn entries(&self) -> Vec<Exchange> {
        self.lock().iter().cloned().collect()
    }

    /// Retained exchanges as `Q: ...` / `A: ...` lines.
    pub fn context(&self) -> String {
        self.lock()
            .iter()
            .map(|e| format!("Q: {}\nA: {}", e.question, e.answer))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
