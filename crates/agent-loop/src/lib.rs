pub mod config;
pub mod dispatch;
pub mod retry;
pub mod runner;
pub mod sink;
pub mod stream;

pub use config::{AgentLoopConfig, ToolDispatch};
pub use retry::RetryBudget;
pub use runner::{
    Agent, RunOutcome, FINAL_RESULT_PROCESSED, PLAIN_TEXT_NOT_PERMITTED, TOOL_NOT_EXECUTED,
};
pub use sink::{NullSink, PresentationSink};
