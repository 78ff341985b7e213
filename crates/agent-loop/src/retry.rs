use std::collections::HashMap;

use agent_core::AgentError;

/// Consecutive retryable failures, counted per tool.
///
/// Each tool has its own counter, which a successful call resets. Plain-text
/// replies to a structured request count against the result tool. The
/// failure that brings a counter to the maximum is fatal, so a maximum of
/// `K` allows exactly `K` attempts of a call that never succeeds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryBudget {
    max: usize,
    used: HashMap<String, usize>,
}

impl RetryBudget {
    pub fn new(max: usize) -> Self {
        Self {
            max,
            used: HashMap::new(),
        }
    }

    /// Failures recorded for `tool` since it last succeeded.
    pub fn used(&self, tool: &str) -> usize {
        self.used.get(tool).copied().unwrap_or(0)
    }

    pub fn max(&self) -> usize {
        self.max.max(1)
    }

    /// Records one retryable failure of `tool`.
    pub fn consume(&mut self, tool: &str, reason: &str) -> Result<(), AgentError> {
        let max = self.max();
        let used = self.used.entry(tool.to_string()).or_insert(0);
        *used += 1;
        if *used >= max {
            return Err(AgentError::RetryBudgetExceeded {
                attempts: *used,
                reason: reason.to_string(),
            });
        }
        Ok(())
    }

    /// `tool` succeeded; its next failure starts a fresh count.
    pub fn reset(&mut self, tool: &str) {
        self.used.remove(tool);
    }
}
