pub mod conversation;
pub mod orchestrator;
pub mod reasoning;
pub mod sink;
pub mod tool_dispatch;
pub mod turn;

pub use conversation::{ChatMessage, ConversationContext, FunctionCall, ToolCallRecord};
pub use orchestrator::{ChatOrchestrator, RunSummary};
pub use reasoning::{ReasoningSplit, split_reasoning};
pub use sink::{ConversationSink, TurnRecord};
pub use tool_dispatch::ToolExecutionCoordinator;
pub use turn::{THINKING_STATUS, Turn, TurnState, flush_on_exit};
