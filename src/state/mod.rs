//! State module for tracking job progress
//!
//! # Components
//!
//! - `JobState`: Tracks where a job is in its lifecycle (pending, running, completed, failed)
//! - `ErrorRecord`: The single error retained for a job attempt, tagged with the phase that produced it

mod error_record;
mod job_state;

// Re-export main types
pub use error_record::{ErrorOrigin, ErrorRecord};
pub use job_state::JobState;
