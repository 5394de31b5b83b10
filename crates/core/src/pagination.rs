//! Cursor pagination primitives shared by store backends.

use serde::{Deserialize, Serialize};

use crate::message::Message;

/// Which way to walk the `(order, step_order)` sequence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Oldest first
    Asc,
    /// Newest first (the default for listings)
    #[default]
    Desc,
}

/// A pagination request: page size plus an opaque continuation cursor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationOptions {
    /// Maximum items to return. Zero means "fetch nothing".
    pub num_items: usize,

    /// Opaque cursor from a previous page; `None` starts from the beginning.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
}

impl PaginationOptions {
    /// The first page of the given size.
    pub fn first(num_items: usize) -> Self {
        Self {
            num_items,
            cursor: None,
        }
    }
}

/// One page of messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagePage {
    /// The messages in this page
    pub page: Vec<Message>,

    /// Whether this is the last page
    pub is_done: bool,

    /// Cursor to pass back for the next page
    pub continue_cursor: String,
}

impl MessagePage {
    /// An empty, final page. Listing a page of zero items returns this
    /// without ever reaching the backend.
    pub fn done(cursor: Option<String>) -> Self {
        Self {
            page: Vec::new(),
            is_done: true,
            continue_cursor: cursor.unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn done_page_echoes_cursor() {
        let page = MessagePage::done(Some("cursor_42".into()));
        assert!(page.is_done);
        assert!(page.page.is_empty());
        assert_eq!(page.continue_cursor, "cursor_42");

        let fresh = MessagePage::done(None);
        assert_eq!(fresh.continue_cursor, "");
    }

    #[test]
    fn sort_order_defaults_to_desc() {
        assert_eq!(SortOrder::default(), SortOrder::Desc);
    }
}
