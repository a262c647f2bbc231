/// Returns the current Unix timestamp in seconds, 0 if the clock sits
/// before the epoch.
pub fn current_unix_timestamp() -> u64 {
    std::time::UNIX_EPOCH
        .elapsed()
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or_default()
}

/// Returns the local wall-clock time as `HH:MM:SS`.
pub fn current_clock_hms() -> String {
    chrono::Local::now().format("%H:%M:%S").to_string()
}
