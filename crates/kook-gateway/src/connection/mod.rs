//! Connection bookkeeping: states, sequence, heartbeat, backoff, resume

mod backoff;
mod heartbeat;
mod resume;
mod sequence;
mod state;

pub use backoff::ReconnectBackoff;
pub use heartbeat::{HeartbeatAction, HeartbeatMonitor};
pub use resume::{ResumeState, ResumeTarget};
pub use sequence::{SequenceCheck, SequenceTracker};
pub use state::ConnectionState;
