use chrono::{DateTime, Utc};

/// Format an amount in pounds with thousands separators: `£1,234.50`
pub fn format_currency(amount: f64) -> String {
    let pence = (amount * 100.0).round() as i64;
    let sign = if pence < 0 { "-" } else { "" };
    let pence = pence.abs();
    let whole = (pence / 100).to_string();

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, c) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    format!("{}£{}.{:02}", sign, grouped, pence % 100)
}

/// Share of `part` in `whole` as a whole-number percentage
pub fn format_percent(part: u32, whole: u32) -> String {
    if whole == 0 {
        return "0%".to_string();
    }
    format!("{:.0}%", f64::from(part) * 100.0 / f64::from(whole))
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

pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format("%-d %b %Y %H:%M").to_string()
}
