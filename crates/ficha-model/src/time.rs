//! Millisecond timestamps

/// Current wall-clock time in milliseconds since the Unix epoch
#[inline]
#[must_use]
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Render a millisecond timestamp as RFC 3339, falling back to the raw number
#[must_use]
pub fn to_rfc3339(millis: i64) -> String {
    chrono::DateTime::from_timestamp_millis(millis)
        .map_or_else(|| millis.to_string(), |dt| dt.to_rfc3339())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_is_positive() {
        assert!(now_millis() > 0);
    }

    #[test]
    fn test_rfc3339_epoch() {
        assert_eq!(to_rfc3339(0), "1970-01-01T00:00:00+00:00");
    }
}
