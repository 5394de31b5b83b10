//! Client-side listing helper.

use threadloom_core::error::StoreError;
use threadloom_core::pagination::MessagePage;
use threadloom_core::store::{ListMessagesRequest, MessageFetcher};

/// List one page of a thread's messages.
///
/// A request for zero items resolves immediately to an empty, final page —
/// the backend is never consulted. Callers that conditionally disable
/// history (a collapsed pane, `recent_messages = 0`) rely on this to stay
/// free of round trips.
pub async fn list_messages(
    fetcher: &dyn MessageFetcher,
    request: ListMessagesRequest,
) -> Result<MessagePage, StoreError> {
    if request.pagination.num_items == 0 {
        return Ok(MessagePage::done(request.pagination.cursor));
    }
    fetcher.list_thread_messages(request).await
}
