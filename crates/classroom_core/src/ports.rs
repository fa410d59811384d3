use async_trait::async_trait;

use crate::config::Settings;
use crate::entities::{
    Announcement, AuthorizationCode, Course, CourseWork, Credential, StudentSubmission,
    SubmissionUpdate, TokenGrant,
};
use crate::error::Error;

// ============================================================================
// Authentication Ports
// ============================================================================

/// Persistence for the single saved credential
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Read the saved credential.
    ///
    /// Fails with `TokenError::NotFound` when nothing is saved and
    /// `TokenError::Corrupt` when the stored data cannot be parsed.
    async fn load(&self) -> Result<Credential, Error>;

    /// Replace the saved credential atomically
    async fn persist(&self, credential: &Credential) -> Result<(), Error>;

    /// Remove the saved credential; a missing credential is not an error
    async fn delete(&self) -> Result<(), Error>;
}

/// Token endpoint of the OAuth provider
#[async_trait]
pub trait OAuthProvider: Send + Sync {
    /// URL the user visits to grant consent
    fn authorization_url(&self, state: &str, redirect_uri: &str) -> String;

    /// Exchange an authorization code for tokens
    async fn exchange_code(&self, code: &AuthorizationCode) -> Result<TokenGrant, Error>;

    /// Obtain a new access token from the credential's refresh token.
    ///
    /// A rejection by the provider is reported as `TokenError::RefreshFailed`;
    /// transport failures as `Error::Network`.
    async fn refresh(&self, credential: &Credential) -> Result<TokenGrant, Error>;
}

/// Obtains an authorization code from the user, interactively
#[async_trait]
pub trait Authorizer: Send + Sync {
    async fn authorize(&self) -> Result<AuthorizationCode, Error>;
}

/// Source of a currently valid bearer token, consulted before every request
#[async_trait]
pub trait AccessTokenSource: Send + Sync {
    async fn access_token(&self) -> Result<String, Error>;
}

// ============================================================================
// Classroom Ports
// ============================================================================

/// Read and update operations against the classroom service.
///
/// List operations return every item across all pages or fail as a whole.
#[async_trait]
pub trait ClassroomApi: Send + Sync {
    async fn list_courses(&self) -> Result<Vec<Course>, Error>;

    async fn get_course(&self, course_id: &str) -> Result<Course, Error>;

    async fn list_course_work(&self, course_id: &str) -> Result<Vec<CourseWork>, Error>;

    async fn get_course_work(
        &self,
        course_id: &str,
        course_work_id: &str,
    ) -> Result<CourseWork, Error>;

    async fn list_submissions(
        &self,
        course_id: &str,
        course_work_id: &str,
    ) -> Result<Vec<StudentSubmission>, Error>;

    async fn get_submission(
        &self,
        course_id: &str,
        course_work_id: &str,
        submission_id: &str,
    ) -> Result<StudentSubmission, Error>;

    /// The signed-in user's own submission for a piece of coursework
    async fn get_my_submission(
        &self,
        course_id: &str,
        course_work_id: &str,
    ) -> Result<StudentSubmission, Error>;

    async fn patch_submission(
        &self,
        course_id: &str,
        course_work_id: &str,
        submission_id: &str,
        update: &SubmissionUpdate,
    ) -> Result<StudentSubmission, Error>;

    async fn list_announcements(&self, course_id: &str) -> Result<Vec<Announcement>, Error>;

    async fn get_announcement(
        &self,
        course_id: &str,
        announcement_id: &str,
    ) -> Result<Announcement, Error>;
}

// ============================================================================
// Configuration Ports
// ============================================================================

#[async_trait]
pub trait ConfigRepository: Send + Sync {
    async fn load(&self) -> Result<Settings, Error>;
    async fn save(&self, settings: &Settings) -> Result<(), Error>;
    async fn exists(&self) -> bool;
}
