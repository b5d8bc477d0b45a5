//! Exponential backoff.

use std::time::Duration;

/// Delay before retry number `attempt` (0-indexed): `base * multiplier^attempt`.
///
/// Saturates instead of overflowing for large attempts or multipliers.
pub fn calculate_backoff(attempt: u32, base: Duration, multiplier: f64) -> Duration {
    let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
    let nanos = base.as_nanos() as f64 * multiplier.powi(exponent);

    if !nanos.is_finite() || nanos >= u64::MAX as f64 {
        return Duration::from_nanos(u64::MAX);
    }

    Duration::from_nanos(nanos.round() as u64)
}
