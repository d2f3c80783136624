use chrono::Duration;
use std::env;
use std::str::FromStr;

use crate::error::ArbitrationError;

const MAX_PAYMENT_WINDOW_MINUTES: i64 = 60 * 24 * 30;
const MAX_MEMBERSHIP_TTL_HOURS: i64 = 24 * 90;

/// What happens to a committed seat when an active member leaves their team.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SeatReleasePolicy {
    /// The seat stays counted against the hackathon.
    #[default]
    Spent,
    /// The seat goes back to the team reservation (or the general pool once the
    /// reservation is gone).
    Reopen,
}

impl FromStr for SeatReleasePolicy {
    type Err = ArbitrationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "spent" => Ok(SeatReleasePolicy::Spent),
            "reopen" => Ok(SeatReleasePolicy::Reopen),
            other => Err(ArbitrationError::Validation(format!(
                "unknown seat release policy '{}'",
                other
            ))),
        }
    }
}

/// Knobs the arbitration services read on every decision.
#[derive(Debug, Clone)]
pub struct ArbitrationSettings {
    /// How long a paid individual registration holds its slot waiting for payment.
    pub payment_window: Duration,
    /// How long a join request or invitation stays pending.
    pub membership_ttl: Duration,
    pub leave_policy: SeatReleasePolicy,
}

impl Default for ArbitrationSettings {
    fn default() -> Self {
        Self {
            payment_window: Duration::hours(24),
            membership_ttl: Duration::hours(48),
            leave_policy: SeatReleasePolicy::Spent,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub max_connections: u32,
    pub settings: ArbitrationSettings,
}

impl AppConfig {
    /// Reads the process environment. Call `dotenvy::dotenv()` first to pick up `.env`.
    pub fn from_env() -> Result<Self, ArbitrationError> {
        let database_url = env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://hackmate.db".to_string());
        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = parse_var("PORT", 3000u16)?;
        let max_connections = parse_var("DB_MAX_CONNECTIONS", 8u32)?;

        let defaults = ArbitrationSettings::default();
        let payment_window = match env::var("PAYMENT_WINDOW_MINUTES") {
            Ok(v) => parse_span("PAYMENT_WINDOW_MINUTES", &v, MAX_PAYMENT_WINDOW_MINUTES, Duration::minutes)?,
            Err(_) => defaults.payment_window,
        };
        let membership_ttl = match env::var("MEMBERSHIP_TTL_HOURS") {
            Ok(v) => parse_span("MEMBERSHIP_TTL_HOURS", &v, MAX_MEMBERSHIP_TTL_HOURS, Duration::hours)?,
            Err(_) => defaults.membership_ttl,
        };
        let leave_policy = match env::var("LEAVE_SEAT_POLICY") {
            Ok(v) => v.parse()?,
            Err(_) => defaults.leave_policy,
        };

        Ok(Self {
            database_url,
            host,
            port,
            max_connections,
            settings: ArbitrationSettings {
                payment_window,
                membership_ttl,
                leave_policy,
            },
        })
    }
}

/// A whole number of units in `1..=max`, so the `Duration` constructor cannot overflow.
fn parse_span(
    name: &str,
    value: &str,
    max: i64,
    unit: fn(i64) -> Duration,
) -> Result<Duration, ArbitrationError> {
    let amount: i64 = parse_value(name, value)?;
    if !(1..=max).contains(&amount) {
        return Err(ArbitrationError::Validation(format!(
            "{} must be between 1 and {}, got {}",
            name, max, amount
        )));
    }
    Ok(unit(amount))
}

fn parse_var<T: FromStr>(name: &str, default: T) -> Result<T, ArbitrationError> {
    match env::var(name) {
        Ok(v) => parse_value(name, &v),
        Err(_) => Ok(default),
    }
}

fn parse_value<T: FromStr>(name: &str, value: &str) -> Result<T, ArbitrationError> {
    value
        .trim()
        .parse()
        .map_err(|_| ArbitrationError::Validation(format!("{} has invalid value '{}'", name, value)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seat_policy_parses_case_insensitively() {
        assert_eq!("Reopen".parse::<SeatReleasePolicy>().unwrap(), SeatReleasePolicy::Reopen);
        assert_eq!(" spent ".parse::<SeatReleasePolicy>().unwrap(), SeatReleasePolicy::Spent);
        assert!("sometimes".parse::<SeatReleasePolicy>().is_err());
    }

    #[test]
    fn durations_must_be_positive_and_bounded() {
        let window = parse_span("PAYMENT_WINDOW_MINUTES", " 90 ", MAX_PAYMENT_WINDOW_MINUTES, Duration::minutes);
        assert_eq!(window.unwrap(), Duration::minutes(90));

        for bad in ["0", "-5", "9223372036854775807", "soon"] {
            let err = parse_span("MEMBERSHIP_TTL_HOURS", bad, MAX_MEMBERSHIP_TTL_HOURS, Duration::hours)
                .unwrap_err();
            assert!(matches!(err, ArbitrationError::Validation(_)), "{}", bad);
        }
    }
}
