use std::time::SystemTime;

/// The current time, formatted for humans (RFC 3339, second precision).
pub fn time_str() -> String {
    humantime::format_rfc3339_seconds(SystemTime::now()).to_string()
}

/// Whether `s` looks like a channel name rather than a nickname.
pub fn is_channel_name(s: &str) -> bool {
    s.starts_with('#') || s.starts_with('&')
}
