use chrono::{DateTime, Utc};

use inksync_lib::sync::{DrainOutcome, DrainState};

/// ANSI color codes
pub struct Color;

impl Color {
    pub const RESET: &'static str = "\x1b[0m";
    pub const BOLD: &'static str = "\x1b[1m";
    pub const DIM: &'static str = "\x1b[2m";
    pub const RED: &'static str = "\x1b[31m";
    pub const GREEN: &'static str = "\x1b[32m";
    pub const YELLOW: &'static str = "\x1b[33m";
}

pub fn paint(text: &str, color: &str, use_color: bool) -> String {
    if use_color {
        format!("{}{}{}", color, text, Color::RESET)
    } else {
        text.to_string()
    }
}

pub fn state_label(state: DrainState, use_color: bool) -> String {
    match state {
        DrainState::Idle => paint("idle", Color::GREEN, use_color),
        DrainState::Draining => paint("draining", Color::YELLOW, use_color),
        DrainState::BackingOff => paint("backing off", Color::RED, use_color),
    }
}

pub fn online_label(online: bool, use_color: bool) -> String {
    if online {
        paint("online", Color::GREEN, use_color)
    } else {
        paint("offline", Color::RED, use_color)
    }
}

pub fn outcome_label(outcome: DrainOutcome, use_color: bool) -> String {
    match outcome {
        DrainOutcome::Completed => paint("completed", Color::GREEN, use_color),
        DrainOutcome::BackingOff => paint("server unavailable, will retry", Color::YELLOW, use_color),
        DrainOutcome::WentOffline => paint("offline", Color::RED, use_color),
        DrainOutcome::Cancelled => paint("cancelled", Color::DIM, use_color),
    }
}

/// Human-readable age such as "3m" or "2d 4h".
pub fn format_age(created_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = (now - created_at).num_seconds().max(0);
    let (days, hours, mins) = (secs / 86_400, (secs % 86_400) / 3_600, (secs % 3_600) / 60);
    if days > 0 {
        format!("{}d {}h", days, hours)
    } else if hours > 0 {
        format!("{}h {}m", hours, mins)
    } else if mins > 0 {
        format!("{}m", mins)
    } else {
        format!("{}s", secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_format_age() {
        let now = Utc::now();
        assert_eq!(format_age(now - Duration::seconds(42), now), "42s");
        assert_eq!(format_age(now - Duration::minutes(5), now), "5m");
        assert_eq!(format_age(now - Duration::minutes(125), now), "2h 5m");
        assert_eq!(format_age(now - Duration::hours(52), now), "2d 4h");
        assert_eq!(format_age(now + Duration::seconds(3), now), "0s");
    }

    #[test]
    fn test_paint_without_color() {
        assert_eq!(paint("idle", Color::GREEN, false), "idle");
        assert_eq!(state_label(DrainState::BackingOff, false), "backing off");
        assert!(paint("x", Color::BOLD, true).starts_with(Color::BOLD));
    }
}
