use std::sync::Arc;

use classroom_core::entities::ResourceKind;
use classroom_core::ports::ClassroomApi;
use classroom_core::use_cases::{active_courses, published_by_due_date, GradeReport};
use classroom_core::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use super::state::{Event, FetchRequest, FetchTarget, Items};

pub async fn load(api: Arc<dyn ClassroomApi>, target: &FetchTarget) -> Result<Items, Error> {
    let (kind, course) = match target {
        FetchTarget::CoursePicker { .. } => {
            return Ok(Items::Courses(active_courses(api.list_courses().await?)))
        }
        FetchTarget::Resource { kind, course } => (*kind, course.as_ref()),
    };

    match (kind, course) {
        (ResourceKind::Courses, _) => Ok(Items::Courses(active_courses(api.list_courses().await?))),
        (ResourceKind::Coursework, Some(course)) => Ok(Items::Coursework(published_by_due_date(
            api.list_course_work(&course.id).await?,
        ))),
        (ResourceKind::Grades, Some(course)) => Ok(Items::Grades(
            GradeReport::new(api.clone()).execute(&course.id).await?,
        )),
        (ResourceKind::Announcements, Some(course)) => Ok(Items::Announcements(
            api.list_announcements(&course.id).await?,
        )),
        (kind, None) => Err(Error::Other(format!("{} needs a selected class", kind))),
    }
}

/// Run `request` in the background and report the outcome on `tx`.
///
/// Aborting the returned handle drops the in-flight HTTP call.
pub fn spawn_fetch(
    api: Arc<dyn ClassroomApi>,
    request: FetchRequest,
    tx: mpsc::UnboundedSender<Event>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let event = match load(api, &request.target).await {
            Ok(items) => Event::FetchCompleted {
                id: request.id,
                items,
            },
            Err(error) => Event::FetchFailed {
                id: request.id,
                error,
            },
        };
        if tx.send(event).is_err() {
            debug!(id = request.id, "UI closed before fetch finished");
        }
    })
}
