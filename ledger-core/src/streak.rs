//! Consecutive-activity streak arithmetic
//!
//! Pure date math over `(streak_count, last_streak_date)` and a
//! caller-injected current date. Dates are UTC calendar days; there is
//! no per-user timezone reconciliation.

use chrono::NaiveDate;

/// Result of advancing a streak for one day of activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreakUpdate {
    /// New consecutive-day counter
    pub streak_count: u32,

    /// Day the streak was last counted
    pub last_streak_date: NaiveDate,
}

/// Advance a streak given activity on `today`.
///
/// - No prior date: streak becomes 1
/// - Same day as stored: unchanged (no double-counting)
/// - Exactly one day later: streak + 1
/// - Any other gap (including a backwards clock): reset to 1
pub fn advance(
    streak_count: u32,
    last_streak_date: Option<NaiveDate>,
    today: NaiveDate,
) -> StreakUpdate {
    let last = match last_streak_date {
        None => {
            return StreakUpdate {
                streak_count: 1,
                last_streak_date: today,
            }
        }
        Some(d) => d,
    };

    match (today - last).num_days() {
        0 => StreakUpdate {
            streak_count,
            last_streak_date: last,
        },
        1 => StreakUpdate {
            streak_count: streak_count + 1,
            last_streak_date: today,
        },
        _ => StreakUpdate {
            streak_count: 1,
            last_streak_date: today,
        },
    }
}
