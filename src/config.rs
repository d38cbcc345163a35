use thiserror::Error;

/// A subject is considered one "full course" worth of sessions. Completion and
/// progress percentages are measured against this baseline.
pub const SESSIONS_PER_SUBJECT: i64 = 20;

/// The progress baseline assumes a subject is worked through over six months.
pub const BASELINE_COURSE_MONTHS: f64 = 6.0;

/// Enrollment months are approximated as 30-day blocks throughout.
pub const DAYS_PER_MONTH: i64 = 30;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{field} must be a positive number of days, got {value}")]
    NonPositiveDays { field: &'static str, value: i64 },
    #[error("{field} must be a positive number of months, got {value}")]
    NonPositiveMonths { field: &'static str, value: i64 },
    #[error("{field} must be within (0, 100], got {value}")]
    PercentOutOfRange { field: &'static str, value: f64 },
    #[error("irregular_min_sessions must be at least 2, got {value}")]
    MinSessionsTooLow { value: usize },
}

/// Every tunable threshold the engine consumes, with the documented defaults.
/// Callers may override any field per invocation; `validate` rejects invalid
/// values before any computation runs.
#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    /// At-risk: days without a session before an active student is flagged.
    pub at_risk_days: i64,
    /// Extended: months enrolled before a student counts as long-running.
    pub extended_months: i64,
    /// Nearing completion: completion percentage cutoff.
    pub completion_threshold_pct: f64,
    /// Irregular: lookback window in days.
    pub irregular_window_days: i64,
    /// Irregular: minimum sessions in the window before gaps are meaningful.
    pub irregular_min_sessions: usize,
    /// Irregular: max inter-session gap (days) tolerated before flagging.
    pub gap_threshold_days: i64,
    /// Delayed: months enrolled before progress is judged.
    pub delayed_months: i64,
    /// Delayed: progress percentage below which a student is flagged.
    pub progress_threshold_pct: f64,
    /// Attendance velocity lookback window in days.
    pub velocity_window_days: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            at_risk_days: 7,
            extended_months: 6,
            completion_threshold_pct: 80.0,
            irregular_window_days: 30,
            irregular_min_sessions: 5,
            gap_threshold_days: 3,
            delayed_months: 6,
            progress_threshold_pct: 50.0,
            velocity_window_days: 30,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let day_fields = [
            ("at_risk_days", self.at_risk_days),
            ("irregular_window_days", self.irregular_window_days),
            ("gap_threshold_days", self.gap_threshold_days),
            ("velocity_window_days", self.velocity_window_days),
        ];
        for (field, value) in day_fields {
            if value <= 0 {
                return Err(ConfigError::NonPositiveDays { field, value });
            }
        }

        let month_fields = [
            ("extended_months", self.extended_months),
            ("delayed_months", self.delayed_months),
        ];
        for (field, value) in month_fields {
            if value <= 0 {
                return Err(ConfigError::NonPositiveMonths { field, value });
            }
        }

        let pct_fields = [
            ("completion_threshold_pct", self.completion_threshold_pct),
            ("progress_threshold_pct", self.progress_threshold_pct),
        ];
        for (field, value) in pct_fields {
            if !(value > 0.0 && value <= 100.0) {
                return Err(ConfigError::PercentOutOfRange { field, value });
            }
        }

        if self.irregular_min_sessions < 2 {
            return Err(ConfigError::MinSessionsTooLow {
                value: self.irregular_min_sessions,
            });
        }

        Ok(())
    }
}
