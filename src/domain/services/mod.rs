mod app_state;
mod chat_orchestrator;
pub mod events;
mod response_scheduler;
mod session_store;

pub use app_state::*;
pub use chat_orchestrator::*;
pub use response_scheduler::*;
pub use session_store::*;
