//! Tool-call integrity for assembled context.
//!
//! Model APIs reject a tool result whose originating call is missing from
//! the conversation. After merging search hits with recent history, the
//! combined list can contain a tool message whose assistant tool call fell
//! outside the fetched window or search range; those are scrubbed here.

use std::collections::HashSet;

use threadloom_core::message::{Message, Role};
use tracing::debug;

/// Drop tool messages whose calls are not present earlier in the list.
///
/// Single forward pass over an already-sorted list. Assistant messages
/// register the tool-call IDs they carry and are always kept. A tool
/// message survives only when every one of its tool results references an
/// already-registered call; one unknown ID drops the whole message. All
/// other roles pass through unconditionally.
///
/// A tool message positioned before its matching call is treated as
/// orphaned; callers sort by `(order, step_order)` first.
pub fn filter_orphaned_tool_messages(messages: Vec<Message>) -> Vec<Message> {
    let mut tool_call_ids: HashSet<String> = HashSet::new();
    let mut result = Vec::with_capacity(messages.len());

    for message in messages {
        match message.role {
            Role::Assistant => {
                for id in message.content.tool_call_ids() {
                    tool_call_ids.insert(id.to_string());
                }
                result.push(message);
            }
            Role::Tool => {
                if message
                    .content
                    .tool_result_ids()
                    .all(|id| tool_call_ids.contains(id))
                {
                    result.push(message);
                } else {
                    debug!(
                        message_id = %message.id,
                        order = message.order,
                        step_order = message.step_order,
                        "Filtering out orphaned tool message"
                    );
                }
            }
            _ => result.push(message),
        }
    }

    result
}
