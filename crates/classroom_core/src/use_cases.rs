mod credentials;
mod grades;
mod listing;

pub use credentials::CredentialManager;
pub use grades::GradeReport;
pub use listing::{active_courses, published_by_due_date};
