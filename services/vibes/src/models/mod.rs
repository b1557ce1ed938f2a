//! Vibe models

pub mod vibe;

// Re-export for convenience
pub use vibe::{
    CreateVibeRequest, HistoryParams, MoodBucket, NewVibe, UpdateStatusRequest, Vibe, VibeFilter,
    VibeStatus, VibeView,
};
