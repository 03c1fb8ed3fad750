//! CLI commands

use std::time::Duration;

use crate::{Error, Result};

pub mod token;

/// Parse a duration like `0`, `3600`, `90s`, `30m` or `24h`
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim();
    let invalid = || Error::validation(format!("invalid duration: {}", s));

    let secs = if let Some(hours) = s.strip_suffix('h') {
        hours
            .parse::<u64>()
            .ok()
            .and_then(|n| n.checked_mul(3600))
            .ok_or_else(invalid)?
    } else if let Some(minutes) = s.strip_suffix('m') {
        minutes
            .parse::<u64>()
            .ok()
            .and_then(|n| n.checked_mul(60))
            .ok_or_else(invalid)?
    } else if let Some(secs) = s.strip_suffix('s') {
        secs.parse().map_err(|_| invalid())?
    } else {
        // Try parsing as raw seconds
        s.parse().map_err(|_| {
            Error::validation(format!(
                "invalid duration '{}', expected e.g. 1h, 30m, 3600s",
                s
            ))
        })?
    };

    Ok(Duration::from_secs(secs))
}
