mod engine;
mod event;
pub mod state;

pub use engine::reconcile_pass;
pub use engine::Context;
pub use engine::Engine;
pub use engine::RECONCILE_INTERVAL;
pub use event::EngineEvent;
pub use state::desired_state;
pub use state::LightStatus;
pub use state::StatusCache;
pub use state::TallyState;
