use chrono::{DateTime, FixedOffset, Timelike, Utc};

use crate::config::MarketConfig;

/// Submission window in the platform's reference clock.
///
/// The reference clock is a fixed UTC offset rather than a named time zone;
/// the window covers `[open_hour, close_hour)` in that clock.
#[derive(Debug, Clone)]
pub struct BusinessHours {
    pub open_hour: u32,
    pub close_hour: u32,
    offset: FixedOffset,
}

impl BusinessHours {
    pub fn new(open_hour: u32, close_hour: u32, utc_offset_minutes: i32) -> Self {
        let offset = FixedOffset::east_opt(utc_offset_minutes * 60)
            .unwrap_or_else(|| FixedOffset::east_opt(0).expect("zero offset is valid"));
        Self {
            open_hour,
            close_hour,
            offset,
        }
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        let hour = instant.with_timezone(&self.offset).hour();
        hour >= self.open_hour && hour < self.close_hour
    }

    pub fn describe(&self) -> String {
        format!("{:02}:00-{:02}:00", self.open_hour, self.close_hour)
    }
}

/// Deployment policy the lifecycle services consult.
#[derive(Debug, Clone)]
pub struct MarketPolicy {
    pub business_hours: BusinessHours,
    pub currency: String,
    /// Fixed ordering decision: when set, an enquiry cannot leave `draft`
    /// until its initial-phase payment order has been paid.
    pub payment_gates_submission: bool,
}

impl MarketPolicy {
    pub fn from_config(config: &MarketConfig) -> Self {
        Self {
            business_hours: BusinessHours::new(
                config.business_open_hour,
                config.business_close_hour,
                config.utc_offset_minutes,
            ),
            currency: config.currency.clone(),
            payment_gates_submission: config.payment_gates_submission,
        }
    }
}

impl Default for MarketPolicy {
    fn default() -> Self {
        Self {
            business_hours: BusinessHours::new(9, 23, 330),
            currency: "INR".to_string(),
            payment_gates_submission: true,
        }
    }
}
