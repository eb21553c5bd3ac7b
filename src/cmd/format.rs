// Output helpers for cache commands.
// Human-readable sizes, ages and dates, headers, JSON, and y/N prompts.

use std::io::{BufRead, Write};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::Result;

/// Bytes in 1024 units: "512 B", "1.5 KB", "3.0 MB".
pub fn format_size(bytes: u64) -> String {
    const UNIT: u64 = 1024;
    if bytes < UNIT {
        return format!("{} B", bytes);
    }

    let mut div = UNIT;
    let mut exp = 0;
    let mut n = bytes / UNIT;
    while n >= UNIT {
        div *= UNIT;
        exp += 1;
        n /= UNIT;
    }

    let prefix = ['K', 'M', 'G', 'T', 'P', 'E'][exp];
    format!("{:.1} {}B", bytes as f64 / div as f64, prefix)
}

/// Coarse age of a timestamp: "today", "yesterday", "3 days ago", ...
pub fn format_age(t: DateTime<Utc>) -> String {
    format_age_at(t, Utc::now())
}

pub(crate) fn format_age_at(t: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let hours = now.signed_duration_since(t).num_hours();
    let days = hours / 24;

    match hours {
        h if h < 24 => "today".to_string(),
        h if h < 48 => "yesterday".to_string(),
        _ if days < 7 => format!("{} days ago", days),
        _ if days < 30 => format!("{} weeks ago", days / 7),
        _ if days < 365 => format!("{} months ago", days / 30),
        _ => format!("{} years ago", days / 365),
    }
}

/// Short date: "Mar 4, 2025".
pub fn format_date(t: DateTime<Utc>) -> String {
    t.format("%b %-d, %Y").to_string()
}

pub fn print_header(out: &mut impl Write, title: &str) -> Result<()> {
    writeln!(out, "{}", title)?;
    writeln!(out, "{}", "━".repeat(title.chars().count()))?;
    writeln!(out)?;
    Ok(())
}

pub fn print_json(out: &mut impl Write, value: &impl Serialize) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}

/// Ask a y/N question. Anything but "y" or "yes" (including EOF) is a no.
pub fn confirm_action(out: &mut impl Write, input: &mut impl BufRead, prompt: &str) -> Result<bool> {
    write!(out, "{} (y/N): ", prompt)?;
    out.flush()?;

    let mut response = String::new();
    if input.read_line(&mut response)? == 0 {
        return Ok(false);
    }
    let response = response.trim().to_lowercase();
    Ok(response == "y" || response == "yes")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(1023), "1023 B");
        assert_eq!(format_size(1536), "1.5 KB");
        assert_eq!(format_size(3 * 1024 * 1024), "3.0 MB");
        assert_eq!(format_size(5 * 1024 * 1024 * 1024), "5.0 GB");
    }

    #[test]
    fn test_format_age() {
        let now = Utc::now();
        assert_eq!(format_age_at(now - Duration::hours(2), now), "today");
        assert_eq!(format_age_at(now + Duration::hours(2), now), "today");
        assert_eq!(format_age_at(now - Duration::hours(30), now), "yesterday");
        assert_eq!(format_age_at(now - Duration::days(4), now), "4 days ago");
        assert_eq!(format_age_at(now - Duration::days(15), now), "2 weeks ago");
        assert_eq!(format_age_at(now - Duration::days(65), now), "2 months ago");
        assert_eq!(format_age_at(now - Duration::days(800), now), "2 years ago");
    }

    #[test]
    fn test_format_date() {
        let t = Utc.with_ymd_and_hms(2025, 3, 4, 15, 30, 0).unwrap();
        assert_eq!(format_date(t), "Mar 4, 2025");
    }

    #[test]
    fn test_print_header() {
        let mut out = Vec::new();
        print_header(&mut out, "Cache").unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "Cache\n━━━━━\n\n");
    }

    #[test]
    fn test_confirm_action() {
        let mut out = Vec::new();
        assert!(confirm_action(&mut out, &mut "y\n".as_bytes(), "Sure?").unwrap());
        assert!(confirm_action(&mut out, &mut " YES \n".as_bytes(), "Sure?").unwrap());
        assert!(!confirm_action(&mut out, &mut "n\n".as_bytes(), "Sure?").unwrap());
        assert!(!confirm_action(&mut out, &mut "\n".as_bytes(), "Sure?").unwrap());
        assert!(!confirm_action(&mut out, &mut "".as_bytes(), "Sure?").unwrap());
        assert!(String::from_utf8(out).unwrap().starts_with("Sure? (y/N): "));
    }
}
