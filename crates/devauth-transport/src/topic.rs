// ============================================
// File: crates/devauth-transport/src/topic.rs
// ============================================
//! # Topic Filters
//!
//! MQTT topic filter syntax and matching, shared by the broker adapter
//! (to route incoming publishes to local subscriptions) and the in-memory
//! broker.
//!
//! - `+` matches exactly one level
//! - `#` matches the remaining levels (including none) and must be last
//! - Topics starting with `$` are not matched by a leading wildcard

use crate::error::{Result, TransportError};

/// Checks that `filter` is a valid MQTT topic filter.
///
/// # Errors
/// Returns `InvalidTopicFilter` describing the broken rule.
pub fn validate_filter(filter: &str) -> Result<()> {
    if filter.is_empty() {
        return Err(TransportError::invalid_filter(filter, "empty"));
    }
    if filter.contains('\0') {
        return Err(TransportError::invalid_filter(filter, "contains NUL"));
    }

    let levels: Vec<&str> = filter.split('/').collect();
    for (i, level) in levels.iter().enumerate() {
        if level.contains('#') && (*level != "#" || i != levels.len() - 1) {
            return Err(TransportError::invalid_filter(
                filter,
                "'#' must be a whole, final level",
            ));
        }
        if level.contains('+') && *level != "+" {
            return Err(TransportError::invalid_filter(
                filter,
                "'+' must be a whole level",
            ));
        }
    }
    Ok(())
}

/// Returns `true` if `topic` matches `filter`.
///
/// `filter` is assumed valid (see [`validate_filter`]).
///
/// # Example
/// ```
/// use devauth_transport::topic::topic_matches;
///
/// assert!(topic_matches("iot/auth/+", "iot/auth/response"));
/// assert!(topic_matches("iot/#", "iot/auth/response"));
/// assert!(!topic_matches("iot/+", "iot/auth/response"));
/// ```
#[must_use]
pub fn topic_matches(filter: &str, topic: &str) -> bool {
    if topic.starts_with('$') && (filter.starts_with('+') || filter.starts_with('#')) {
        return false;
    }

    let mut filter_levels = filter.split('/');
    let mut topic_levels = topic.split('/');

    loop {
        match (filter_levels.next(), topic_levels.next()) {
            (Some("#"), _) => return true,
            (Some("+"), Some(_)) => {}
            (Some(f), Some(t)) if f == t => {}
            (None, None) => return true,
            _ => return false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_match() {
        assert!(topic_matches("iot/auth/challenge", "iot/auth/challenge"));
        assert!(!topic_matches("iot/auth/challenge", "iot/auth/response"));
        assert!(!topic_matches("iot/auth", "iot/auth/challenge"));
        assert!(!topic_matches("iot/auth/challenge", "iot/auth"));
    }

    #[test]
    fn test_single_level_wildcard() {
        assert!(topic_matches("+/data", "device1/data"));
        assert!(topic_matches("iot/+/challenge", "iot/auth/challenge"));
        assert!(!topic_matches("iot/+", "iot/auth/challenge"));
        // empty level still counts as a level
        assert!(topic_matches("iot/+/x", "iot//x"));
    }

    #[test]
    fn test_multi_level_wildcard() {
        assert!(topic_matches("#", "anything/at/all"));
        assert!(topic_matches("iot/#", "iot/auth/challenge"));
        assert!(topic_matches("iot/#", "iot"));
        assert!(!topic_matches("iot/#", "other/auth"));
    }

    #[test]
    fn test_system_topics() {
        assert!(!topic_matches("#", "$SYS/broker/uptime"));
        assert!(!topic_matches("+/broker/uptime", "$SYS/broker/uptime"));
        assert!(topic_matches("$SYS/#", "$SYS/broker/uptime"));
    }

    #[test]
    fn test_validate_filter() {
        assert!(validate_filter("iot/auth/response").is_ok());
        assert!(validate_filter("iot/+/response").is_ok());
        assert!(validate_filter("iot/#").is_ok());
        assert!(validate_filter("#").is_ok());

        assert!(validate_filter("").is_err());
        assert!(validate_filter("iot/#/x").is_err());
        assert!(validate_filter("iot/a#").is_err());
        assert!(validate_filter("iot/a+/x").is_err());
        assert!(validate_filter("a\0b").is_err());
    }
}
