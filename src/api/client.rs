//! HTTP client for the Apolomics REST API

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response, StatusCode, header};
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::auth::AuthSession;
use super::error::ApiError;
use super::models::*;
use super::traits::CourseApi;

/// Course API client
pub struct ApiClient {
    /// HTTP client
    client: Client,
    /// Base URL without trailing slash, e.g. `http://localhost:8000/api`
    base_url: String,
    /// Credentials attached to every request
    session: AuthSession,
}

impl ApiClient {
    /// Default request timeout
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

    /// Create a new client for the given API root
    pub fn new(
        base_url: impl Into<String>,
        session: AuthSession,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let base_url = base_url.into();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ApiError::InvalidBaseUrl(base_url));
        }

        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self { client, base_url: base_url.trim_end_matches('/').to_string(), session })
    }

    /// Credentials of this client
    pub fn session(&self) -> &AuthSession {
        &self.session
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Attach the authorization header, failing before any I/O without a token
    fn authorized(&self, request: RequestBuilder) -> Result<RequestBuilder, ApiError> {
        let authorization = self.session.authorization()?;
        Ok(request.header(header::AUTHORIZATION, authorization))
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ApiError> {
        tracing::debug!("GET {} {:?}", path, query);
        let request = self.authorized(self.client.get(self.url(path)).query(query))?;
        let response = self.check_status(request.send().await?).await?;

        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn post_json<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<Response, ApiError> {
        tracing::debug!("POST {}", path);
        let request = self.authorized(self.client.post(self.url(path)).json(body))?;
        self.check_status(request.send().await?).await
    }

    /// Map HTTP error statuses onto [`ApiError`]
    async fn check_status(&self, response: Response) -> Result<Response, ApiError> {
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            let message = error_message(response).await;
            return Err(self
                .session
                .reject(ApiError::Unauthorized { status: status.as_u16(), message }));
        }

        if !status.is_success() {
            let message = error_message(response).await;
            return Err(ApiError::ApiError { status: status.as_u16(), message });
        }

        Ok(response)
    }
}

/// Pull the `detail`/`error` field out of an error body, falling back to the raw text
async fn error_message(response: Response) -> String {
    let body = response.text().await.unwrap_or_default();
    serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|value| {
            value
                .get("detail")
                .or_else(|| value.get("error"))
                .and_then(|v| v.as_str())
                .map(str::to_string)
        })
        .unwrap_or(body)
}

#[async_trait]
impl CourseApi for ApiClient {
    async fn list_lectures(&self, course_id: Id) -> Result<Vec<Lecture>, ApiError> {
        self.get_json("video-lectures/", &[("course_id", course_id.to_string())]).await
    }

    async fn list_progress(&self) -> Result<Vec<ProgressRecord>, ApiError> {
        self.get_json("progress/", &[]).await
    }

    async fn update_progress(&self, update: &ProgressUpdate) -> Result<(), ApiError> {
        self.post_json("progress/update_progress/", update).await?;
        Ok(())
    }

    async fn list_assignments(&self, course_id: Id) -> Result<Vec<Assignment>, ApiError> {
        self.get_json("assignments/", &[("course_id", course_id.to_string())]).await
    }

    async fn list_assignment_submissions(
        &self,
        assignment_id: Id,
    ) -> Result<Vec<AssignmentSubmission>, ApiError> {
        self.get_json("assignment-submissions/", &[("assignment", assignment_id.to_string())])
            .await
    }

    async fn create_assignment_submission(
        &self,
        submission: NewAssignmentSubmission,
    ) -> Result<AssignmentSubmission, ApiError> {
        let mut form = Form::new()
            .text("assignment", submission.assignment_id.to_string())
            .text("submission_text", submission.submission_text);
        if let Some(file) = submission.file {
            form = form.part("submission_file", Part::bytes(file.bytes).file_name(file.file_name));
        }

        tracing::debug!("POST assignment-submissions/ (multipart)");
        let request =
            self.authorized(self.client.post(self.url("assignment-submissions/")).multipart(form))?;
        let response = self.check_status(request.send().await?).await?;

        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn list_exams(&self, course_id: Id) -> Result<Vec<Exam>, ApiError> {
        self.get_json("exams/", &[("course_id", course_id.to_string())]).await
    }

    async fn list_questions(&self, exam_id: Id) -> Result<Vec<Question>, ApiError> {
        self.get_json("questions/", &[("exam_id", exam_id.to_string())]).await
    }

    async fn list_exam_submissions(&self, exam_id: Id) -> Result<Vec<ExamSubmission>, ApiError> {
        self.get_json("exam-submissions/", &[("exam", exam_id.to_string())]).await
    }

    async fn create_exam_submission(
        &self,
        submission: &NewExamSubmission,
    ) -> Result<ExamResult, ApiError> {
        let response = self.post_json("exam-submissions/", submission).await?;
        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn list_certificates(&self, course_id: Id) -> Result<Vec<Certificate>, ApiError> {
        self.get_json("certificates/", &[("course_id", course_id.to_string())]).await
    }
}
