//! Text formatting shared by one-shot output and the interactive UI.

use chrono::{DateTime, Utc};
use classroom_core::entities::{AuthStatus, Course, CourseWork, GradeEntry};

pub fn due_label(work: &CourseWork) -> String {
    match (work.due_date, work.due_time) {
        (Some(d), Some(t)) => format!(
            "{}/{:02}/{:02} {:02}:{:02}",
            d.year, d.month, d.day, t.hours, t.minutes
        ),
        (Some(d), None) => format!("{}/{:02}/{:02}", d.year, d.month, d.day),
        (None, _) => "No due date".to_string(),
    }
}

pub fn work_status(work: &CourseWork, now: DateTime<Utc>) -> &'static str {
    if work.is_overdue_at(now) {
        "Overdue"
    } else {
        "Pending"
    }
}

/// Whole numbers without a trailing `.0`
pub fn points(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        format!("{:.1}", value)
    }
}

pub fn points_label(max_points: Option<f64>) -> String {
    match max_points {
        Some(max) if max > 0.0 => format!("{} pts", points(max)),
        _ => "Ungraded".to_string(),
    }
}

pub fn grade_label(entry: &GradeEntry) -> String {
    match entry.max_points {
        Some(max) if max > 0.0 => format!("{} / {}", points(entry.grade), points(max)),
        _ => points(entry.grade),
    }
}

pub fn date_label(at: Option<DateTime<Utc>>) -> String {
    at.map(|t| t.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "-".to_string())
}

pub fn course_subtitle(course: &Course) -> String {
    match (course.section.as_deref(), course.room.as_deref()) {
        (Some(section), Some(room)) => format!("{} · Room {}", section, room),
        (Some(section), None) => section.to_string(),
        (None, Some(room)) => format!("Room {}", room),
        (None, None) => String::new(),
    }
}

/// First line of `text`, cut to `max` characters with an ellipsis
pub fn headline(text: &str, max: usize) -> String {
    let line = text.lines().next().unwrap_or("").trim();
    if line.chars().count() <= max {
        line.to_string()
    } else {
        let cut: String = line.chars().take(max.saturating_sub(1)).collect();
        format!("{}…", cut)
    }
}

pub fn auth_status_line(status: &AuthStatus) -> String {
    match status {
        AuthStatus::NotLoggedIn => "Not logged in. Run 'gc-cli auth login'.".to_string(),
        AuthStatus::Corrupt(reason) => format!(
            "Saved credential is unreadable ({}). Run 'gc-cli auth login'.",
            reason
        ),
        AuthStatus::Valid { expiry } => format!(
            "Logged in. Access token valid until {}.",
            expiry.format("%Y-%m-%d %H:%M:%S UTC")
        ),
        AuthStatus::ExpiredRefreshable { expiry } => format!(
            "Logged in. Access token expired at {}; it will be refreshed on next use.",
            expiry.format("%Y-%m-%d %H:%M:%S UTC")
        ),
        AuthStatus::Expired { expiry } => format!(
            "Session expired at {} and cannot be refreshed. Run 'gc-cli auth login'.",
            expiry.format("%Y-%m-%d %H:%M:%S UTC")
        ),
    }
}
