//! Talkhead core: render job domain types, cost gate and the pure wait-loop state machine.
mod confirm;
mod cost;
mod effect;
mod msg;
mod request;
mod state;
mod status;
mod update;

pub use confirm::{confirm, is_affirmative, BudgetCeiling, ConfirmationProvider, ConsolePrompt};
pub use cost::{estimate, CostError, CostEstimate};
pub use effect::{Effect, PollDelay, WaitOutcome};
pub use msg::Msg;
pub use request::{MediaRef, RenderRequest, DEFAULT_PROMPT};
pub use state::{JobPhase, JobState};
pub use status::{CancelAck, JobStatus};
pub use update::update;
