/// Elapsed-time rendering for the time label.
use serde::Deserialize;

/// How [`format_time`] renders a millisecond value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeFormat {
    /// Always `HH:MM:SS`.
    #[default]
    Full,
    /// Leading zero units are dropped: `S`, `MM:SS` or `HH:MM:SS`.
    Compact,
    /// `HH:MM:SS.hh` with truncated hundredths.
    Precise,
}

impl std::str::FromStr for TimeFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "full" => Ok(TimeFormat::Full),
            "compact" => Ok(TimeFormat::Compact),
            "precise" => Ok(TimeFormat::Precise),
            other => Err(format!("unknown time format '{other}'")),
        }
    }
}

/// A millisecond value split into display units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timestamp {
    pub hours: u64,
    pub minutes: u64,
    pub seconds: u64,
    pub hundredths: u64,
}

impl Timestamp {
    pub fn from_millis(ms: u64) -> Self {
        let (total_secs, millis) = (ms / 1000, ms % 1000);
        let (total_mins, seconds) = (total_secs / 60, total_secs % 60);
        let (hours, minutes) = (total_mins / 60, total_mins % 60);
        Self { hours, minutes, seconds, hundredths: millis / 10 }
    }
}

/// Formats `ms` for the time label.
///
/// # Panics
/// Panics if `ms` is negative; callers must never hand a negative position
/// or duration to the display.
pub fn format_time(ms: i64, format: TimeFormat) -> String {
    assert!(ms >= 0, "cannot format negative time: {ms} ms");
    let t = Timestamp::from_millis(ms as u64);

    match format {
        TimeFormat::Full => format!("{:02}:{:02}:{:02}", t.hours, t.minutes, t.seconds),
        TimeFormat::Precise => format!(
            "{:02}:{:02}:{:02}.{:02}",
            t.hours, t.minutes, t.seconds, t.hundredths
        ),
        TimeFormat::Compact if t.hours > 0 => {
            format!("{:02}:{:02}:{:02}", t.hours, t.minutes, t.seconds)
        }
        TimeFormat::Compact if t.minutes > 0 => format!("{:02}:{:02}", t.minutes, t.seconds),
        TimeFormat::Compact => t.seconds.to_string(),
    }
}

/// Formats an unsigned engine value, saturating at `i64::MAX`.
pub fn format_millis(ms: u64, format: TimeFormat) -> String {
    format_time(i64::try_from(ms).unwrap_or(i64::MAX), format)
}
