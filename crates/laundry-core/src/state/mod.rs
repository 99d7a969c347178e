//! Status flow state: the registry of configured steps and the transition
//! rules derived from it.

pub mod machine;
pub mod registry;

pub use machine::{OrderStatusMachine, TransitionError};
pub use registry::{background_tone, text_tone, StatusFlowRegistry, StepDisplay};
