//! Shared formatting and unit helpers.
//!
//! Pure functions only. Collectors use them to turn tool output such as
//! `1.5GiB` into bytes and to render the short display strings carried in
//! snapshots.

const KIB: f64 = 1024.0;
const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

// ---------------------------------------------------------------------------
// Display strings
// ---------------------------------------------------------------------------

/// Format `used / allocated` memory in GiB with two decimals.
///
/// `"1.50 GB / 4.00 GB"`, or `"0 / 0"` when nothing is allocated.
pub fn format_memory_display(used: u64, allocated: u64) -> String {
    if allocated == 0 {
        return "0 / 0".to_string();
    }
    format!(
        "{:.2} GB / {:.2} GB",
        used as f64 / GIB,
        allocated as f64 / GIB
    )
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Parse a human size such as `"12.5MiB"`, `"1.2kB"`, `"3GB"` or `"512B"` into bytes.
///
/// Binary suffixes (`KiB`, `MiB`, ...) use powers of 1024, decimal ones
/// (`kB`, `MB`, ...) powers of 1000. Returns `None` for anything else.
pub fn parse_human_size(s: &str) -> Option<u64> {
    let s = s.trim();
    let split = s
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(s.len());
    let (number, unit) = s.split_at(split);
    let value: f64 = number.parse().ok()?;

    let multiplier = match unit.trim().to_ascii_lowercase().as_str() {
        "" | "b" => 1.0,
        "kb" | "k" => 1e3,
        "mb" | "m" => 1e6,
        "gb" | "g" => 1e9,
        "tb" | "t" => 1e12,
        "kib" => KIB,
        "mib" => KIB * KIB,
        "gib" => GIB,
        "tib" => GIB * KIB,
        _ => return None,
    };

    Some((value * multiplier).round() as u64)
}

/// Parse a percentage such as `"12.34%"`.
pub fn parse_percent(s: &str) -> Option<f64> {
    s.trim().trim_end_matches('%').trim().parse().ok()
}
