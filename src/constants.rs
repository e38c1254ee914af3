//! Configuration constants for the timed quiz
//!
//! This module contains the limits and thresholds used throughout the
//! crate to keep question shapes, session sizes and timing consistent.

/// Question shape constants
pub mod question {
    /// Number of answer options every question must carry
    pub const OPTION_COUNT: usize = 4;
    /// Highest valid index of the correct option
    pub const MAX_CORRECT_INDEX: usize = OPTION_COUNT - 1;
    /// Maximum length of a question prompt in characters
    pub const MAX_TEXT_LENGTH: usize = 500;
    /// Maximum length of a single answer option in characters
    pub const MAX_OPTION_LENGTH: usize = 200;
}

/// Session sizing constants
pub mod session {
    /// Minimum number of questions in a session
    pub const MIN_QUESTION_COUNT: usize = 1;
    /// Maximum number of questions in a session
    pub const MAX_QUESTION_COUNT: usize = 20;
    /// Maximum total time budget for a session, in seconds (one hour)
    pub const MAX_TOTAL_SECONDS: u64 = 3600;
}

/// Question supply constants
pub mod supply {
    /// Maximum length of a topic label in characters
    pub const MAX_TOPIC_LENGTH: usize = 100;
}

/// Countdown constants
pub mod countdown {
    use std::time::Duration;

    /// Interval between two countdown ticks
    pub const TICK_INTERVAL: Duration = Duration::from_secs(1);
    /// Remaining seconds at or below which the timer is shown as a warning
    pub const WARNING_SECONDS: u64 = 10;
    /// Remaining seconds at or below which the timer is shown as critical
    pub const CRITICAL_SECONDS: u64 = 5;
}

/// Result grading thresholds, as whole percentages
pub mod grade {
    /// Minimum percentage graded as excellent
    pub const EXCELLENT: u32 = 80;
    /// Minimum percentage graded as good
    pub const GOOD: u32 = 60;
    /// Minimum percentage graded as fair
    pub const FAIR: u32 = 40;
}
