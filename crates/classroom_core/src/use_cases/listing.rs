use std::cmp::Ordering;

use crate::entities::{Course, CourseWork};

/// Courses still in session
pub fn active_courses(courses: Vec<Course>) -> Vec<Course> {
    courses.into_iter().filter(Course::is_active).collect()
}

/// Published coursework, earliest due first; undated work sorts last.
pub fn published_by_due_date(course_work: Vec<CourseWork>) -> Vec<CourseWork> {
    let mut published: Vec<CourseWork> = course_work
        .into_iter()
        .filter(CourseWork::is_published)
        .collect();
    published.sort_by(|a, b| match (a.due_at(), b.due_at()) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
    published
}
