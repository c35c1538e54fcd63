/// Event type used when a notification carries no usable description
pub const EVENT_TYPE_UNKNOWN: &str = "unknown";

/// Event type dispatched when the local node becomes master
pub const EVENT_TYPE_ON_MASTER: &str = "on_master";

/// Event type dispatched when the local node stops being master
pub const EVENT_TYPE_OFF_MASTER: &str = "off_master";

/// Category that matches every event type
pub const EVENT_TYPE_ALL: &str = "all";

/// Normalize a free-text event description into an event type key.
///
/// Everything from the first `(` or `[` onward is dropped, the rest is
/// trimmed, and each run of whitespace or `-` becomes a single `_`.
pub fn resolve(raw: Option<&str>) -> String {
    let raw = match raw {
        Some(s) if !s.is_empty() => s,
        _ => return EVENT_TYPE_UNKNOWN.to_string(),
    };

    let head = match raw.find(['(', '[']) {
        Some(pos) => &raw[..pos],
        None => raw,
    };

    let mut key = String::with_capacity(head.len());
    let mut in_separator = false;
    for c in head.trim().chars() {
        if c.is_whitespace() || c == '-' {
            if !in_separator {
                key.push('_');
                in_separator = true;
            }
        } else {
            key.push(c);
            in_separator = false;
        }
    }

    if key.is_empty() {
        EVENT_TYPE_UNKNOWN.to_string()
    } else {
        key
    }
}
