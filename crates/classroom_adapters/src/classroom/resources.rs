use async_trait::async_trait;
use classroom_core::entities::{
    Announcement, Course, CourseWork, StudentSubmission, SubmissionUpdate,
};
use classroom_core::ports::{AccessTokenSource, ClassroomApi};
use classroom_core::Error;
use tracing::instrument;

use super::client::ClassroomClient;
use super::pages::{AnnouncementList, CourseList, CourseWorkList, SubmissionList};

const COURSES: &str = "courses";
const COURSE_WORK: &str = "courseWork";
const SUBMISSIONS: &str = "studentSubmissions";
const ANNOUNCEMENTS: &str = "announcements";

#[async_trait]
impl<T> ClassroomApi for ClassroomClient<T>
where
    T: AccessTokenSource + ?Sized,
{
    #[instrument(skip(self))]
    async fn list_courses(&self) -> Result<Vec<Course>, Error> {
        self.list_all::<CourseList>(self.endpoint(&[COURSES]), &[])
            .await
    }

    #[instrument(skip(self))]
    async fn get_course(&self, course_id: &str) -> Result<Course, Error> {
        self.get_json(self.endpoint(&[COURSES, course_id]), &[])
            .await
    }

    #[instrument(skip(self))]
    async fn list_course_work(&self, course_id: &str) -> Result<Vec<CourseWork>, Error> {
        self.list_all::<CourseWorkList>(self.endpoint(&[COURSES, course_id, COURSE_WORK]), &[])
            .await
    }

    #[instrument(skip(self))]
    async fn get_course_work(
        &self,
        course_id: &str,
        course_work_id: &str,
    ) -> Result<CourseWork, Error> {
        self.get_json(
            self.endpoint(&[COURSES, course_id, COURSE_WORK, course_work_id]),
            &[],
        )
        .await
    }

    #[instrument(skip(self))]
    async fn list_submissions(
        &self,
        course_id: &str,
        course_work_id: &str,
    ) -> Result<Vec<StudentSubmission>, Error> {
        self.list_all::<SubmissionList>(
            self.endpoint(&[COURSES, course_id, COURSE_WORK, course_work_id, SUBMISSIONS]),
            &[],
        )
        .await
    }

    #[instrument(skip(self))]
    async fn get_submission(
        &self,
        course_id: &str,
        course_work_id: &str,
        submission_id: &str,
    ) -> Result<StudentSubmission, Error> {
        self.get_json(
            self.endpoint(&[
                COURSES,
                course_id,
                COURSE_WORK,
                course_work_id,
                SUBMISSIONS,
                submission_id,
            ]),
            &[],
        )
        .await
    }

    async fn get_my_submission(
        &self,
        course_id: &str,
        course_work_id: &str,
    ) -> Result<StudentSubmission, Error> {
        self.get_submission(course_id, course_work_id, "me").await
    }

    #[instrument(skip(self, update), fields(mask = %update.update_mask()))]
    async fn patch_submission(
        &self,
        course_id: &str,
        course_work_id: &str,
        submission_id: &str,
        update: &SubmissionUpdate,
    ) -> Result<StudentSubmission, Error> {
        if update.is_empty() {
            return Err(Error::Other("submission update has no fields".to_string()));
        }

        self.patch_json(
            self.endpoint(&[
                COURSES,
                course_id,
                COURSE_WORK,
                course_work_id,
                SUBMISSIONS,
                submission_id,
            ]),
            &[("updateMask", update.update_mask())],
            update,
        )
        .await
    }

    #[instrument(skip(self))]
    async fn list_announcements(&self, course_id: &str) -> Result<Vec<Announcement>, Error> {
        self.list_all::<AnnouncementList>(
            self.endpoint(&[COURSES, course_id, ANNOUNCEMENTS]),
            &[],
        )
        .await
    }

    #[instrument(skip(self))]
    async fn get_announcement(
        &self,
        course_id: &str,
        announcement_id: &str,
    ) -> Result<Announcement, Error> {
        self.get_json(
            self.endpoint(&[COURSES, course_id, ANNOUNCEMENTS, announcement_id]),
            &[],
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classroom::RetryPolicy;
    use classroom_core::config::ApiSettings;
    use classroom_core::entities::Attachment;
    use classroom_core::ApiError;
    use std::sync::Arc;
    use std::time::Duration;
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct StaticToken;

    #[async_trait]
    impl AccessTokenSource for StaticToken {
        async fn access_token(&self) -> Result<String, Error> {
            Ok("t".to_string())
        }
    }

    fn client(server: &MockServer) -> ClassroomClient<StaticToken> {
        let settings = ApiSettings {
            base_url: format!("{}/v1", server.uri()),
            ..ApiSettings::default()
        };
        ClassroomClient::new(&settings, Arc::new(StaticToken))
            .unwrap()
            .with_retry_policy(RetryPolicy {
                retries: 1,
                initial_backoff: Duration::from_millis(1),
                max_backoff: Duration::from_millis(1),
            })
    }

    #[tokio::test]
    async fn test_list_course_work() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/courses/c1/courseWork"))
            .and(query_param("pageSize", "100"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "courseWork": [
                    {"id": "w1", "courseId": "c1", "title": "Lab 1", "state": "PUBLISHED",
                     "maxPoints": 20, "dueDate": {"year": 2024, "month": 9, "day": 1}},
                    {"id": "w2", "courseId": "c1", "title": "Lab 2", "state": "DRAFT"}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let work = client(&server).list_course_work("c1").await.unwrap();

        assert_eq!(work.len(), 2);
        assert_eq!(work[0].title, "Lab 1");
        assert_eq!(work[0].max_points, Some(20.0));
        assert!(work[0].due_at().is_some());
    }

    #[tokio::test]
    async fn test_get_my_submission_path() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/courses/c1/courseWork/w1/studentSubmissions/me"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "s1", "courseId": "c1", "courseWorkId": "w1",
                "state": "RETURNED", "assignedGrade": 18
            })))
            .expect(1)
            .mount(&server)
            .await;

        let submission = client(&server).get_my_submission("c1", "w1").await.unwrap();

        assert_eq!(submission.id, "s1");
        assert_eq!(submission.assigned_grade, Some(18.0));
    }

    #[tokio::test]
    async fn test_get_missing_course() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/courses/nope"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = client(&server).get_course("nope").await.unwrap_err();
        assert!(matches!(err, Error::Api(ApiError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_patch_sends_only_changed_fields() {
        let server = MockServer::start().await;
        let update =
            SubmissionUpdate::with_attachments(vec![Attachment::link("https://example.com/a", None)]);

        Mock::given(method("PATCH"))
            .and(path("/v1/courses/c1/courseWork/w1/studentSubmissions/s1"))
            .and(query_param("updateMask", "assignmentSubmission"))
            .and(body_json(serde_json::json!({
                "assignmentSubmission": {"attachments": [{"link": {"url": "https://example.com/a"}}]}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "s1", "courseId": "c1", "courseWorkId": "w1", "state": "CREATED"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let patched = client(&server)
            .patch_submission("c1", "w1", "s1", &update)
            .await
            .unwrap();

        assert_eq!(patched.state.as_deref(), Some("CREATED"));
    }

    #[tokio::test]
    async fn test_empty_patch_is_rejected_locally() {
        let server = MockServer::start().await;
        let err = client(&server)
            .patch_submission("c1", "w1", "s1", &SubmissionUpdate::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Other(_)));
    }

    #[tokio::test]
    async fn test_list_announcements() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/courses/c1/announcements"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "announcements": [
                    {"id": "a1", "courseId": "c1", "text": "Exam moved",
                     "creationTime": "2024-03-01T10:00:00.123Z"}
                ]
            })))
            .mount(&server)
            .await;

        let announcements = client(&server).list_announcements("c1").await.unwrap();

        assert_eq!(announcements.len(), 1);
        assert_eq!(announcements[0].text, "Exam moved");
        assert!(announcements[0].creation_time.is_some());
    }
}
