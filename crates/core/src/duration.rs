//! Spoken-duration estimation for composite renders.
//!
//! Approximates speech at ~150 words per minute (2.5 words/second),
//! clamped to the range the composite provider accepts.

/// Shortest composite the pipeline requests, in seconds.
pub const MIN_DURATION_SECS: u32 = 15;
/// Longest composite the pipeline requests, in seconds.
pub const MAX_DURATION_SECS: u32 = 60;

/// Number of whitespace-separated words in `script`.
pub fn word_count(script: &str) -> usize {
    script.split_whitespace().count()
}

/// `clamp(ceil(words / 2.5), 15, 60)`.
///
/// Integer form: `ceil(words / 2.5) == ceil(2 * words / 5)`.
pub fn estimate_duration_secs(words: usize) -> u32 {
    let secs = (words.saturating_mul(2)).div_ceil(5);
    let secs = u32::try_from(secs).unwrap_or(u32::MAX);
    secs.clamp(MIN_DURATION_SECS, MAX_DURATION_SECS)
}

/// Convenience wrapper: estimate directly from script text.
pub fn estimate_script_duration(script: &str) -> u32 {
    estimate_duration_secs(word_count(script))
}
