/// Render a duration in minutes for display.
///
/// Below an hour this reads `"12m 05s"`, from an hour on `"1h 30m"`.
/// Negative input is shown as zero.
pub fn format_minutes(minutes: f64) -> String {
    let total_seconds = (minutes.max(0.0) * 60.0).round() as u64;
    let hours = total_seconds / 3600;
    let mins = (total_seconds % 3600) / 60;
    let secs = total_seconds % 60;

    if hours > 0 {
        format!("{}h {:02}m", hours, mins)
    } else {
        format!("{}m {:02}s", mins, secs)
    }
}
