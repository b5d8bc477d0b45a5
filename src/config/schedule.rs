//! Cron schedules for backup routines.
//!
//! Accepts five-field expressions, six-field expressions with leading
//! seconds, and nicknames such as `@daily`.

use std::fmt;

use chrono::{DateTime, Utc};
use croner::errors::CronError;
use croner::Cron;

/// A parsed cron expression that remembers its source text.
#[derive(Debug, Clone)]
pub struct CronSchedule {
    expression: String,
    cron: Cron,
}

impl CronSchedule {
    /// Parse `expression`, trimming surrounding whitespace.
    pub fn parse(expression: &str) -> Result<Self, CronError> {
        let expression = expression.trim();
        if expression.is_empty() {
            return Err(CronError::EmptyPattern);
        }

        let cron = Cron::new(expression).with_seconds_optional().parse()?;
        Ok(Self {
            expression: expression.to_string(),
            cron,
        })
    }

    /// The expression as written in the configuration.
    pub fn as_str(&self) -> &str {
        &self.expression
    }

    /// First fire time strictly after `after`, if any.
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.cron.find_next_occurrence(&after, false).ok()
    }
}

impl PartialEq for CronSchedule {
    fn eq(&self, other: &Self) -> bool {
        self.expression == other.expression
    }
}

impl fmt::Display for CronSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.expression)
    }
}
