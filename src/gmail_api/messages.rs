use async_trait::async_trait;

use crate::errors::ApiError;
use crate::types::{MessagePage, MessagesResponse};

pub const GMAIL_API_BASE: &str = "https://gmail.googleapis.com";

// The two mailbox calls the purge needs, as a trait so the loop can be
// driven against a mock.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MailApi: Send + Sync {
    async fn list_messages(
        &self,
        query: &str,
        page_token: Option<String>,
    ) -> Result<MessagePage, ApiError>;

    async fn delete_message(&self, message_id: &str) -> Result<(), ApiError>;
}

/// Authenticated session against the Gmail REST API for the `me` user.
pub struct GmailClient {
    client: reqwest::Client,
    token: String,
    base_url: String,
}

impl GmailClient {
    pub fn new(client: reqwest::Client, token: String) -> Self {
        Self {
            client,
            token,
            base_url: GMAIL_API_BASE.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    fn messages_url(&self) -> String {
        format!("{}/gmail/v1/users/me/messages", self.base_url)
    }
}

async fn error_from_response(response: reqwest::Response) -> ApiError {
    let status = response.status().as_u16();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    ApiError::Status { status, body }
}

#[async_trait]
impl MailApi for GmailClient {
    async fn list_messages(
        &self,
        query: &str,
        page_token: Option<String>,
    ) -> Result<MessagePage, ApiError> {
        let mut request = self
            .client
            .get(self.messages_url())
            .bearer_auth(&self.token)
            .query(&[("q", query)]);
        if let Some(token) = &page_token {
            request = request.query(&[("pageToken", token.as_str())]);
        }

        let response = request.send().await?;
        if response.status().is_success() {
            let data: MessagesResponse = response.json().await?;
            Ok(data.into())
        } else {
            Err(error_from_response(response).await)
        }
    }

    // Permanent delete, bypassing Trash.
    async fn delete_message(&self, message_id: &str) -> Result<(), ApiError> {
        let delete_url = format!("{}/{}", self.messages_url(), message_id);

        let response = self
            .client
            .delete(&delete_url)
            .bearer_auth(&self.token)
            .send()
            .await?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(error_from_response(response).await)
        }
    }
}
