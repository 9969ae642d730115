use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use super::GenerationError;

/// Text-completion capability: one system instruction, one user message,
/// no memory between calls.
pub trait TextGenerator: Send + Sync {
    fn complete(&self, system: &str, user: &str) -> Result<String, GenerationError>;
}

enum MockBehavior {
    Scripted(Vec<Result<String, String>>),
    Echo,
}

/// Mock generator for tests. Scripted outputs are consumed per call and the
/// last entry repeats; `Err` entries become `GenerationError::Connection`.
pub struct MockTextGenerator {
    behavior: MockBehavior,
    calls: AtomicUsize,
    seen: Mutex<Vec<(String, String)>>,
}

impl MockTextGenerator {
    pub fn new(response: &str) -> Self {
        Self::scripted(vec![Ok(response.to_string())])
    }

    pub fn scripted(outputs: Vec<Result<String, String>>) -> Self {
        Self::with_behavior(MockBehavior::Scripted(outputs))
    }

    /// Every call fails as if the service were down.
    pub fn failing(reason: &str) -> Self {
        Self::scripted(vec![Err(reason.to_string())])
    }

    /// Returns the user message unchanged.
    pub fn echo() -> Self {
        Self::with_behavior(MockBehavior::Echo)
    }

    fn with_behavior(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// (system, user) pairs in call order.
    pub fn seen(&self) -> Vec<(String, String)> {
        self.seen.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

impl TextGenerator for MockTextGenerator {
    fn complete(&self, system: &str, user: &str) -> Result<String, GenerationError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut seen) = self.seen.lock() {
            seen.push((system.to_string(), user.to_string()));
        }
        match &self.behavior {
            MockBehavior::Echo => Ok(user.to_string()),
            MockBehavior::Scripted(outputs) => outputs
                .get(n)
                .or_else(|| outputs.last())
                .cloned()
                .unwrap_or_else(|| Ok(String::new()))
                .map_err(GenerationError::Connection),
        }
    }
}
