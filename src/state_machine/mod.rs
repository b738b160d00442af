mod job;
mod procedure;
mod progress;
mod state;
mod tracker;

pub use job::{Job, JobState, Priority, ProcessChain};
pub use procedure::{AssemblyEffect, ProcessStep, Procedure};
pub use progress::{Progress, ProgressEntry, ProgressEvaluator};
pub use state::{State, StateExec, StateHistory, StateMachine, TRANSPORT_STATE};
pub use tracker::JobProgressTracker;
