use chrono::{DateTime, Utc};

/// Format a placement result as an ordinal ("1" -> "1st", "22" -> "22nd").
/// Non-numeric results such as "F" (finalist) are returned as-is.
pub fn format_placement_result(result: &str) -> String {
    let trimmed = result.trim();
    let Ok(n) = trimmed.parse::<u32>() else {
        return trimmed.to_string();
    };

    // 11th, 12th and 13th break the last-digit rule
    let suffix = match (n % 10, n % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{}{}", n, suffix)
}

/// Format a normalized date for display
pub fn format_date(date: &DateTime<Utc>) -> String {
    date.format("%b %d, %Y").to_string()
}

/// Truncate a string to a maximum length, adding ellipsis if needed
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    }
}
