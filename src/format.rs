const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];

/// Human-readable size with 1024 steps and at most two decimals.
///
/// Sizes past the last unit stay in GB (`"2048 GB"`).
pub fn format_file_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    // integer steps instead of log(bytes)/log(1024), which can land just
    // under a whole number for exact powers
    let mut index = 0;
    let mut step = 1u64;
    while index < UNITS.len() - 1 && bytes / step >= 1024 {
        step *= 1024;
        index += 1;
    }
    let scaled = bytes as f64 / step as f64;

    format!("{} {}", trim_decimals(scaled), UNITS[index])
}

fn trim_decimals(value: f64) -> String {
    let fixed = format!("{:.2}", value);
    fixed.trim_end_matches('0').trim_end_matches('.').to_string()
}
