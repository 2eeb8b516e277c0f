// file: src/hardware/format.rs
// description: human readable byte sizes

const UNITS: [&str; 7] = ["B", "KB", "MB", "GB", "TB", "PB", "EB"];

/// Scales by 1024 until the value prints below 1024, two decimals.
///
/// `format_bytes(1253656) == "1.20MB"`, `format_bytes(1253656678) == "1.17GB"`.
pub fn format_bytes(bytes: u64) -> String {
    let mut value = bytes as f64;
    let mut unit = 0;
    // compare the rounded value so 1048575 prints as 1.00MB rather than 1024.00KB
    while unit < UNITS.len() - 1 && (value * 100.0).round() / 100.0 >= 1024.0 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.2}{}", value, UNITS[unit])
}
