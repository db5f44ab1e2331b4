const KB: f64 = 1024.0;
const MB: f64 = KB * 1024.0;

const SIZE_UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];

/// Human readable size, e.g. `1536` -> `1.5 KB`.
///
/// Missing, zero, negative and non-finite inputs all read as `0 Bytes`.
/// Anything past the gigabyte range stays in GB.
pub fn format_file_size(bytes: Option<f64>) -> String {
    let mut value = match bytes {
        Some(b) if b.is_finite() && b > 0.0 => b,
        _ => return "0 Bytes".to_string(),
    };

    let mut unit = 0;
    while value >= KB && unit < SIZE_UNITS.len() - 1 {
        value /= KB;
        unit += 1;
    }

    format!("{} {}", trim_decimals(value), SIZE_UNITS[unit])
}

pub fn format_speed(bytes_per_second: Option<f64>) -> String {
    match bytes_per_second {
        Some(bps) if bps.is_finite() && bps != 0.0 => format!("{:.2} MB/s", bps / MB),
        _ => "0 MB/s".to_string(),
    }
}

pub fn format_time(seconds: Option<f64>) -> String {
    let seconds = match seconds {
        Some(s) if s.is_finite() && s > 0.0 => s,
        _ => return "calculating...".to_string(),
    };

    if seconds < 60.0 {
        return format!("{}s", seconds.ceil() as u64);
    }
    let minutes = (seconds / 60.0).floor() as u64;
    let remaining = (seconds % 60.0).ceil() as u64;
    format!("{}m {}s", minutes, remaining)
}

pub fn format_percent(percent: f64) -> String {
    format!("{:.1}%", percent)
}

// two decimals, then drop trailing zeros: 1.50 -> 1.5, 1.00 -> 1
fn trim_decimals(value: f64) -> String {
    let fixed = format!("{:.2}", value);
    fixed
        .trim_end_matches('0')
        .trim_end_matches('.')
        .to_string()
}
