use futures::future::join_all;
use tokio_util::sync::CancellationToken;

use agent_core::tools::{execute_tool_call, ToolCall, ToolError, ToolOutput, ToolRegistry};
use agent_core::AgentError;

use crate::config::ToolDispatch;

pub type ToolOutcome = Result<ToolOutput, ToolError>;

/// Runs the tool calls of one reply and returns their outcomes in request
/// order, whatever order they finished in.
///
/// On cancellation every call still in flight is dropped and nothing is
/// returned.
pub async fn dispatch_tool_calls<D>(
    registry: &ToolRegistry<D>,
    calls: &[ToolCall],
    deps: &D,
    mode: ToolDispatch,
    cancel_token: &CancellationToken,
) -> Result<Vec<ToolOutcome>, AgentError>
where
    D: Send + Sync + 'static,
{
    let run = async {
        match mode {
            ToolDispatch::Serial => {
                let mut outcomes = Vec::with_capacity(calls.len());
                for call in calls {
                    outcomes.push(execute_tool_call(registry, call, deps).await);
                }
                outcomes
            }
            ToolDispatch::Concurrent => {
                join_all(calls.iter().map(|call| execute_tool_call(registry, call, deps))).await
            }
        }
    };

    tokio::select! {
        biased;
        _ = cancel_token.cancelled() => Err(AgentError::Cancelled),
        outcomes = run => Ok(outcomes),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::json;

    use agent_core::tools::{ParamKind, ParameterSchema, ParameterSpec, Tool, ToolArgs};

    use super::*;

    #[derive(Default)]
    struct Journal {
        finished: Mutex<Vec<String>>,
    }

    struct DelayTool;

    #[async_trait]
    impl Tool<Journal> for DelayTool {
        fn name(&self) -> &str {
            "delay"
        }

        fn description(&self) -> &str {
            "Waits, then echoes its label."
        }

        fn parameters(&self) -> ParameterSchema {
            ParameterSchema::new()
                .param(ParameterSpec::required("label", ParamKind::String))
                .param(ParameterSpec::required("ms", ParamKind::Integer))
        }

        async fn invoke(&self, deps: &Journal, args: ToolArgs) -> Result<ToolOutput, ToolError> {
            let label = args.get("label").and_then(|v| v.as_str()).unwrap_or_default().to_string();
            let ms = args.get("ms").and_then(|v| v.as_u64()).unwrap_or_default();
            tokio::time::sleep(Duration::from_millis(ms)).await;
            deps.finished.lock().unwrap().push(label.clone());
            Ok(ToolOutput::text(label))
        }
    }

    fn registry() -> ToolRegistry<Journal> {
        let registry = ToolRegistry::new();
        registry.register(DelayTool).unwrap();
        registry
    }

    fn call(id: &str, label: &str, ms: u64) -> ToolCall {
        ToolCall::function(id, "delay", json!({"label": label, "ms": ms}).to_string())
    }

    fn labels(outcomes: &[ToolOutcome]) -> Vec<String> {
        outcomes
            .iter()
            .map(|outcome| outcome.as_ref().unwrap().to_message_content())
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_outcomes_keep_request_order() {
        let journal = Journal::default();
        let calls = [call("call_a", "A", 50), call("call_b", "B", 1)];

        let outcomes = dispatch_tool_calls(
            &registry(),
            &calls,
            &journal,
            ToolDispatch::Concurrent,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(*journal.finished.lock().unwrap(), vec!["B", "A"]);
        assert_eq!(labels(&outcomes), vec!["A", "B"]);
    }

    #[tokio::test(start_paused = true)]
    async fn serial_runs_one_at_a_time() {
        let journal = Journal::default();
        let calls = [call("call_a", "A", 50), call("call_b", "B", 1)];

        let outcomes = dispatch_tool_calls(
            &registry(),
            &calls,
            &journal,
            ToolDispatch::Serial,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(*journal.finished.lock().unwrap(), vec!["A", "B"]);
        assert_eq!(labels(&outcomes), vec!["A", "B"]);
    }

    #[tokio::test]
    async fn failures_stay_in_their_slot() {
        let journal = Journal::default();
        let calls = [
            ToolCall::function("call_a", "missing", "{}"),
            call("call_b", "B", 0),
        ];

        let outcomes = dispatch_tool_calls(
            &registry(),
            &calls,
            &journal,
            ToolDispatch::Concurrent,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert!(matches!(outcomes[0], Err(ToolError::NotFound(_))));
        assert_eq!(outcomes[1].as_ref().unwrap().to_message_content(), "B");
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_drops_in_flight_calls() {
        let journal = Journal::default();
        let cancel = CancellationToken::new();
        let calls = [call("call_a", "A", 60_000)];

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.cancel();
        });

        let result =
            dispatch_tool_calls(&registry(), &calls, &journal, ToolDispatch::Concurrent, &cancel).await;

        assert!(matches!(result, Err(AgentError::Cancelled)));
        assert!(journal.finished.lock().unwrap().is_empty());
    }
}
