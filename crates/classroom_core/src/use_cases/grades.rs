use std::sync::Arc;

use tracing::debug;

use crate::entities::{Feedback, GradeEntry, StudentSubmission};
use crate::error::{ApiError, Error};
use crate::ports::ClassroomApi;

/// Builds the signed-in user's grade list for one course.
///
/// Coursework without a readable submission is skipped; any other failure
/// aborts the whole report.
pub struct GradeReport<C>
where
    C: ClassroomApi + ?Sized,
{
    api: Arc<C>,
}

impl<C> GradeReport<C>
where
    C: ClassroomApi + ?Sized,
{
    pub fn new(api: Arc<C>) -> Self {
        Self { api }
    }

    pub async fn execute(&self, course_id: &str) -> Result<Vec<GradeEntry>, Error> {
        let course_work = self.api.list_course_work(course_id).await?;
        let mut entries = Vec::new();

        for work in course_work.iter().filter(|w| w.is_published()) {
            let submission = match self.api.get_my_submission(course_id, &work.id).await {
                Ok(submission) => submission,
                Err(Error::Api(ApiError::NotFound(_) | ApiError::Forbidden(_))) => {
                    debug!(course_work_id = %work.id, "no readable submission, skipping");
                    continue;
                }
                Err(e) => return Err(e),
            };

            if let Some(grade) = submission.effective_grade() {
                entries.push(GradeEntry {
                    course_work_id: work.id.clone(),
                    assignment: work.title.clone(),
                    grade,
                    max_points: work.max_points,
                    feedback: feedback_for(&submission),
                });
            }
        }

        Ok(entries)
    }
}

fn feedback_for(submission: &StudentSubmission) -> Feedback {
    if submission.state.as_deref() == Some("RETURNED") {
        Feedback::Returned
    } else if submission.assigned_grade.is_some_and(|g| g > 0.0) {
        Feedback::Graded
    } else {
        Feedback::NotReturned
    }
}
