use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct MessagesResponse {
    pub messages: Option<Vec<MessageRef>>,
    #[serde(rename = "nextPageToken")]
    pub next_page_token: Option<String>,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct MessageRef {
    pub id: String,
    #[serde(rename = "threadId")]
    pub thread_id: Option<String>,
}

impl MessageRef {
    pub fn new(id: &str) -> Self {
        MessageRef {
            id: id.to_string(),
            thread_id: None,
        }
    }
}

/// One batch of a paginated list call.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct MessagePage {
    pub messages: Vec<MessageRef>,
    pub next_page_token: Option<String>,
}

impl From<MessagesResponse> for MessagePage {
    fn from(response: MessagesResponse) -> Self {
        MessagePage {
            messages: response.messages.unwrap_or_default(),
            next_page_token: response.next_page_token.filter(|t| !t.is_empty()),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub expires_in: Option<i64>,
    pub refresh_token: Option<String>,
    pub scope: Option<String>,
}
