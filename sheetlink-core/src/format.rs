// Display helpers for sizes, durations, counts and backend identifiers.
#![allow(clippy::cast_precision_loss)]

const SIZE_UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

/// `1536` → `"1.5 KB"`. Trailing zeros are trimmed (`"2 MB"`, not `"2.00 MB"`).
pub fn format_file_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 B".to_string();
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < SIZE_UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{} {}", trim_decimals(value, 2), SIZE_UNITS[unit])
}

/// `150` → `"2m 30s"`, `3725` → `"1h 2m 5s"`.
pub fn format_duration(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    if hours > 0 {
        format!("{hours}h {minutes}m {secs}s")
    } else if minutes > 0 {
        format!("{minutes}m {secs}s")
    } else {
        format!("{secs}s")
    }
}

/// `"2:05"` style elapsed clock.
pub fn format_duration_short(seconds: u64) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

/// Percentage with fixed decimals; `None` renders as `"-"`.
pub fn format_percentage(value: Option<f64>, decimals: usize) -> String {
    match value {
        None => "-".to_string(),
        Some(v) if v.is_nan() => "Invalid percentage".to_string(),
        Some(v) => format!("{v:.decimals$}%"),
    }
}

/// `1234` → `"1.2K"`, `3_500_000` → `"3.5M"`.
pub fn format_large_number(n: u64) -> String {
    match n {
        1_000_000_000.. => format!("{:.1}B", n as f64 / 1e9),
        1_000_000.. => format!("{:.1}M", n as f64 / 1e6),
        1_000.. => format!("{:.1}K", n as f64 / 1e3),
        _ => n.to_string(),
    }
}

/// `foreign_key` → `"Foreign Key"`. Empty input renders as `"-"`.
pub fn format_relationship_type(kind: &str) -> String {
    if kind.is_empty() {
        return "-".to_string();
    }
    kind.split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Cut to `max_chars` characters and append `...` when shortened.
pub fn truncate_text(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

/// Strip the backend storage prefix `file_{12 hex}_` from a stored name.
///
/// Names without the prefix are returned unchanged.
pub fn extract_original_filename(stored: &str) -> &str {
    stored
        .strip_prefix("file_")
        .and_then(|rest| {
            let (hex, tail) = rest.split_at_checked(12)?;
            let is_hex = hex
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
            if is_hex { tail.strip_prefix('_') } else { None }
        })
        .unwrap_or(stored)
}

fn trim_decimals(value: f64, decimals: usize) -> String {
    let s = format!("{value:.decimals$}");
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        s
    }
}
