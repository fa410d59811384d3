//! Classroom REST API adapter.
//!
//! [`ClassroomClient`] executes authenticated requests with uniform error
//! classification, bounded exponential backoff, and page aggregation.

mod client;
mod pages;
mod resources;

pub use client::{classify, AttemptOutcome, ClassroomClient, RequestAttempt, RetryPolicy};
pub use pages::{AnnouncementList, CourseList, CourseWorkList, Paginated, SubmissionList};
