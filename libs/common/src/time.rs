use chrono::{SecondsFormat, Utc};

/// Current time as an ISO-8601 / RFC 3339 string with millisecond precision,
/// e.g. `2026-08-06T19:04:11.283Z`.
///
/// Realtime events are stamped with this at broadcast time, so the value a
/// client sees reflects server-observed ordering per broadcast call.
pub fn now_iso8601() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Current time in milliseconds since the Unix epoch.
pub fn now_epoch_ms() -> i64 {
    Utc::now().timestamp_millis()
}
