use std::fmt;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Credentials
// ============================================================================

/// OAuth credential for the signed-in user.
///
/// `access_token` and `expiry` only ever change together (see [`Credential::refreshed`]);
/// the refresh token survives refreshes unless the provider rotates it.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expiry: DateTime<Utc>,
    pub token_type: String,
    pub scopes: Vec<String>,
}

/// Token endpoint response, before it is folded into a [`Credential`]
#[derive(Debug, Clone, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

impl Credential {
    /// Tokens this close to expiry are treated as already expired
    pub const EXPIRY_SKEW_SECS: i64 = 10;

    /// Lifetime assumed when the provider omits `expires_in`
    const DEFAULT_LIFETIME_SECS: i64 = 3600;
    /// Upper bound on a provider-reported lifetime
    const MAX_LIFETIME_SECS: i64 = 366 * 24 * 3600;

    pub fn from_grant(grant: TokenGrant, now: DateTime<Utc>) -> Self {
        let lifetime = grant
            .expires_in
            .unwrap_or(Self::DEFAULT_LIFETIME_SECS)
            .clamp(0, Self::MAX_LIFETIME_SECS);
        let expiry = now
            .checked_add_signed(Duration::seconds(lifetime))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Self {
            access_token: grant.access_token,
            refresh_token: grant.refresh_token.filter(|t| !t.is_empty()),
            expiry,
            token_type: grant.token_type.unwrap_or_else(|| "Bearer".to_string()),
            scopes: grant
                .scope
                .map(|s| split_scopes(&s))
                .unwrap_or_default(),
        }
    }

    /// Apply a refresh grant, keeping the refresh token and scopes the grant leaves out.
    pub fn refreshed(&self, grant: TokenGrant, now: DateTime<Utc>) -> Self {
        let mut next = Self::from_grant(grant, now);
        if next.refresh_token.is_none() {
            next.refresh_token = self.refresh_token.clone();
        }
        if next.scopes.is_empty() {
            next.scopes = self.scopes.clone();
        }
        next
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(Self::EXPIRY_SKEW_SECS) >= self.expiry
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn can_refresh(&self) -> bool {
        self.refresh_token.as_deref().is_some_and(|t| !t.is_empty())
    }

    pub fn scope_string(&self) -> String {
        self.scopes.join(" ")
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"<redacted>")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "<redacted>"),
            )
            .field("expiry", &self.expiry)
            .field("token_type", &self.token_type)
            .field("scopes", &self.scopes)
            .finish()
    }
}

pub fn split_scopes(scope: &str) -> Vec<String> {
    scope.split_whitespace().map(str::to_string).collect()
}

/// What `auth status` reports about the saved credential
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthStatus {
    NotLoggedIn,
    Corrupt(String),
    Valid { expiry: DateTime<Utc> },
    ExpiredRefreshable { expiry: DateTime<Utc> },
    Expired { expiry: DateTime<Utc> },
}

impl AuthStatus {
    /// Whether API calls can proceed without a new `auth login`
    pub fn is_usable(&self) -> bool {
        matches!(
            self,
            AuthStatus::Valid { .. } | AuthStatus::ExpiredRefreshable { .. }
        )
    }
}

/// Code captured from the provider redirect, plus the redirect URI it was issued for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationCode {
    pub code: String,
    pub redirect_uri: String,
}

// ============================================================================
// Classroom resources
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct Course {
    pub id: String,
    pub name: String,
    pub section: Option<String>,
    pub description_heading: Option<String>,
    pub room: Option<String>,
    pub owner_id: Option<String>,
    pub course_state: Option<String>,
    pub alternate_link: Option<String>,
}

impl Course {
    pub fn is_active(&self) -> bool {
        self.course_state.as_deref() == Some("ACTIVE")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Date {
    pub year: i32,
    pub month: u32,
    pub day: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct TimeOfDay {
    pub hours: u32,
    pub minutes: u32,
    pub seconds: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct CourseWork {
    pub id: String,
    pub course_id: String,
    pub title: String,
    pub description: Option<String>,
    pub state: Option<String>,
    pub work_type: Option<String>,
    pub max_points: Option<f64>,
    pub due_date: Option<Date>,
    pub due_time: Option<TimeOfDay>,
    pub alternate_link: Option<String>,
    pub creation_time: Option<DateTime<Utc>>,
    pub update_time: Option<DateTime<Utc>>,
}

impl CourseWork {
    pub fn is_published(&self) -> bool {
        self.state.as_deref() == Some("PUBLISHED")
    }

    /// Due instant in UTC; a due date without a time means end of that day.
    pub fn due_at(&self) -> Option<DateTime<Utc>> {
        let date = self.due_date?;
        let day = NaiveDate::from_ymd_opt(date.year, date.month, date.day)?;
        let time = match self.due_time {
            Some(t) => NaiveTime::from_hms_opt(t.hours, t.minutes, t.seconds)?,
            None => NaiveTime::from_hms_opt(23, 59, 59)?,
        };
        Some(day.and_time(time).and_utc())
    }

    pub fn is_overdue_at(&self, now: DateTime<Utc>) -> bool {
        self.due_at().is_some_and(|due| now > due)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct StudentSubmission {
    pub id: String,
    pub course_id: String,
    pub course_work_id: String,
    pub user_id: Option<String>,
    pub state: Option<String>,
    pub late: bool,
    pub assigned_grade: Option<f64>,
    pub draft_grade: Option<f64>,
    pub alternate_link: Option<String>,
    pub course_work_type: Option<String>,
    pub creation_time: Option<DateTime<Utc>>,
    pub update_time: Option<DateTime<Utc>>,
    pub assignment_submission: Option<AssignmentSubmission>,
}

impl StudentSubmission {
    /// Assigned grade when present and non-zero, otherwise the draft grade.
    pub fn effective_grade(&self) -> Option<f64> {
        match (self.assigned_grade, self.draft_grade) {
            (Some(assigned), _) if assigned > 0.0 => Some(assigned),
            (_, Some(draft)) if draft > 0.0 => Some(draft),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct AssignmentSubmission {
    pub attachments: Vec<Attachment>,
}

/// Reference to material stored elsewhere; uploading the bytes is not our concern
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub drive_file: Option<DriveFile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<Link>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alternate_link: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Link {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl Attachment {
    pub fn link(url: impl Into<String>, title: Option<String>) -> Self {
        Self {
            link: Some(Link {
                url: url.into(),
                title,
            }),
            ..Self::default()
        }
    }

    pub fn drive_file(id: impl Into<String>) -> Self {
        Self {
            drive_file: Some(DriveFile {
                id: id.into(),
                ..DriveFile::default()
            }),
            ..Self::default()
        }
    }
}

/// Partial update for a submission: only populated fields are sent
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_grade: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub draft_grade: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignment_submission: Option<AssignmentSubmission>,
}

impl SubmissionUpdate {
    pub fn with_attachments(attachments: Vec<Attachment>) -> Self {
        Self {
            assignment_submission: Some(AssignmentSubmission { attachments }),
            ..Self::default()
        }
    }

    /// Comma-separated `updateMask` naming exactly the populated fields
    pub fn update_mask(&self) -> String {
        let mut fields = Vec::new();
        if self.assigned_grade.is_some() {
            fields.push("assignedGrade");
        }
        if self.draft_grade.is_some() {
            fields.push("draftGrade");
        }
        if self.assignment_submission.is_some() {
            fields.push("assignmentSubmission");
        }
        fields.join(",")
    }

    pub fn is_empty(&self) -> bool {
        self.update_mask().is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct Announcement {
    pub id: String,
    pub course_id: String,
    pub text: String,
    pub state: Option<String>,
    pub alternate_link: Option<String>,
    pub creator_user_id: Option<String>,
    pub creation_time: Option<DateTime<Utc>>,
    pub update_time: Option<DateTime<Utc>>,
}

/// A course chosen as context for course-scoped views and commands
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseRef {
    pub id: String,
    pub name: String,
}

impl From<&Course> for CourseRef {
    fn from(course: &Course) -> Self {
        Self {
            id: course.id.clone(),
            name: course.name.clone(),
        }
    }
}

/// Resource views offered by the interactive menu
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Courses,
    Coursework,
    Grades,
    Announcements,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 4] = [
        ResourceKind::Courses,
        ResourceKind::Coursework,
        ResourceKind::Grades,
        ResourceKind::Announcements,
    ];

    pub fn requires_course(self) -> bool {
        !matches!(self, ResourceKind::Courses)
    }

    pub fn label(self) -> &'static str {
        match self {
            ResourceKind::Courses => "Classes",
            ResourceKind::Coursework => "Classwork",
            ResourceKind::Grades => "Grades",
            ResourceKind::Announcements => "Announcements",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Feedback {
    Returned,
    Graded,
    NotReturned,
}

impl fmt::Display for Feedback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Feedback::Returned => write!(f, "Returned"),
            Feedback::Graded => write!(f, "Graded"),
            Feedback::NotReturned => write!(f, "Not returned"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GradeEntry {
    pub course_work_id: String,
    pub assignment: String,
    pub grade: f64,
    pub max_points: Option<f64>,
    pub feedback: Feedback,
}
