use tracing::{error, info};

use crate::errors::ApiError;
use crate::gmail_api::MailApi;

/// Messages that are neither marked important nor starred.
pub const DEFAULT_QUERY: &str = "-is:important -is:starred";

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DeleteSummary {
    pub deleted: usize,
    pub failed: usize,
    pub pages: usize,
}

/// Deletes every message matching `query`, one page at a time.
///
/// A failed delete is logged and counted in `failed`; it never stops the
/// run. A failed list call does, since there is no page to continue from.
/// The loop ends on the first empty batch or the first page without a
/// continuation token, whichever comes first.
pub async fn delete_matching<A>(api: &A, query: &str) -> Result<DeleteSummary, ApiError>
where
    A: MailApi + ?Sized,
{
    let mut summary = DeleteSummary::default();
    let mut page = api.list_messages(query, None).await?;

    while !page.messages.is_empty() {
        summary.pages += 1;
        info!("Found {} messages to delete", page.messages.len());

        for message in &page.messages {
            match api.delete_message(&message.id).await {
                Ok(()) => {
                    summary.deleted += 1;
                    info!("Deleted message {}", message.id);
                }
                Err(e) => {
                    summary.failed += 1;
                    error!("Error deleting message {}: {}", message.id, e);
                }
            }
        }

        match page.next_page_token.take() {
            Some(token) => page = api.list_messages(query, Some(token)).await?,
            None => break,
        }
    }

    info!("Deleted a total of {} messages", summary.deleted);
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gmail_api::messages::MockMailApi;
    use crate::types::{MessagePage, MessageRef};
    use mockall::predicate::eq;
    use mockall::Sequence;

    fn page(ids: &[&str], next: Option<&str>) -> MessagePage {
        MessagePage {
            messages: ids.iter().map(|id| MessageRef::new(id)).collect(),
            next_page_token: next.map(str::to_string),
        }
    }

    fn status_error() -> ApiError {
        ApiError::Status {
            status: 404,
            body: "Requested entity was not found.".to_string(),
        }
    }

    #[tokio::test]
    async fn test_no_matches_never_deletes() {
        let mut api = MockMailApi::new();
        api.expect_list_messages()
            .with(eq(DEFAULT_QUERY), eq(None))
            .times(1)
            .returning(|_, _| Ok(page(&[], None)));
        api.expect_delete_message().never();

        let summary = delete_matching(&api, DEFAULT_QUERY).await.unwrap();
        assert_eq!(summary, DeleteSummary::default());
    }

    #[tokio::test]
    async fn test_count_matches_successful_deletes() {
        let mut api = MockMailApi::new();
        api.expect_list_messages()
            .returning(|_, _| Ok(page(&["a", "b", "c"], None)));
        api.expect_delete_message().times(3).returning(|_| Ok(()));

        let summary = delete_matching(&api, DEFAULT_QUERY).await.unwrap();
        assert_eq!(summary.deleted, 3);
        assert_eq!(summary.failed, 0);
        assert_eq!(summary.pages, 1);
    }

    #[tokio::test]
    async fn test_single_failure_does_not_stop_the_batch() {
        let mut api = MockMailApi::new();
        api.expect_list_messages()
            .returning(|_, _| Ok(page(&["a", "b", "c", "d"], None)));
        api.expect_delete_message()
            .with(eq("b"))
            .times(1)
            .returning(|_| Err(status_error()));
        api.expect_delete_message()
            .withf(|id| id != "b")
            .times(3)
            .returning(|_| Ok(()));

        let summary = delete_matching(&api, DEFAULT_QUERY).await.unwrap();
        assert_eq!(summary.deleted, 3);
        assert_eq!(summary.failed, 1);
    }

    #[tokio::test]
    async fn test_pages_are_walked_in_order() {
        let mut seq = Sequence::new();
        let mut api = MockMailApi::new();

        api.expect_list_messages()
            .with(eq(DEFAULT_QUERY), eq(None))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(page(&["a", "b"], Some("page-2"))));
        for id in ["a", "b"] {
            api.expect_delete_message()
                .with(eq(id))
                .times(1)
                .in_sequence(&mut seq)
                .returning(|_| Ok(()));
        }
        api.expect_list_messages()
            .with(eq(DEFAULT_QUERY), eq(Some("page-2".to_string())))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(page(&["c"], None)));
        api.expect_delete_message()
            .with(eq("c"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));

        let summary = delete_matching(&api, DEFAULT_QUERY).await.unwrap();
        assert_eq!(summary.deleted, 3);
        assert_eq!(summary.pages, 2);
    }

    #[tokio::test]
    async fn test_empty_batch_with_token_ends_the_run() {
        let mut seq = Sequence::new();
        let mut api = MockMailApi::new();
        api.expect_list_messages()
            .with(eq(DEFAULT_QUERY), eq(None))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(page(&["a"], Some("page-2"))));
        api.expect_delete_message()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        api.expect_list_messages()
            .with(eq(DEFAULT_QUERY), eq(Some("page-2".to_string())))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(page(&[], Some("page-3"))));

        let summary = delete_matching(&api, DEFAULT_QUERY).await.unwrap();
        assert_eq!(summary.deleted, 1);
        assert_eq!(summary.pages, 1);
    }

    #[tokio::test]
    async fn test_list_failure_is_fatal() {
        let mut api = MockMailApi::new();
        api.expect_list_messages()
            .returning(|_, _| Err(status_error()));
        api.expect_delete_message().never();

        assert!(delete_matching(&api, DEFAULT_QUERY).await.is_err());
    }

    #[tokio::test]
    async fn test_failures_are_not_counted_as_deleted() {
        let mut api = MockMailApi::new();
        api.expect_list_messages()
            .returning(|_, _| Ok(page(&["a", "b"], None)));
        api.expect_delete_message()
            .times(2)
            .returning(|_| Err(status_error()));

        let summary = delete_matching(&api, DEFAULT_QUERY).await.unwrap();
        assert_eq!(summary.deleted, 0);
        assert_eq!(summary.failed, 2);
    }
}
