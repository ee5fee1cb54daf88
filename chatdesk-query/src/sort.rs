//! Sort validation against per-entity whitelists.
//!
//! Rules:
//! - only a case-insensitive `asc` sorts ascending;
//! - a column outside the whitelist falls back to the default column *and*
//!   the default (descending) direction;
//! - an absent or empty column uses the default column with the requested
//!   direction.
//!
//! Every order also gets the primary identity as a tiebreaker so offset
//! windows are stable.

use crate::sql::{ColumnRef, OrderBy};
pub use crate::sql::SortDirection;

/// Sort inputs as received (`sort_by`, `sort_order`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SortRequest {
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

impl SortRequest {
    pub fn new(sort_by: impl Into<String>, sort_order: impl Into<String>) -> Self {
        Self {
            sort_by: Some(sort_by.into()),
            sort_order: Some(sort_order.into()),
        }
    }

    /// Read `sort_by` and `sort_order` from raw parameters.
    pub fn from_params(params: &crate::filter::RawParams) -> Self {
        Self {
            sort_by: params.text("sort_by"),
            sort_order: params.text("sort_order"),
        }
    }
}

/// A whitelisted sort column for one entity.
pub trait SortColumn: Copy + PartialEq + std::fmt::Debug {
    const DEFAULT: Self;

    /// Identity column used as the tiebreaker.
    const IDENTITY: &'static str;

    fn parse(raw: &str) -> Option<Self>;

    fn column(self) -> ColumnRef;
}

/// A validated sort.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sort<C> {
    pub column: C,
    pub direction: SortDirection,
}

impl<C: SortColumn> Sort<C> {
    pub fn resolve(request: &SortRequest) -> Self {
        let direction = SortDirection::parse(request.sort_order.as_deref());
        match request.sort_by.as_deref().map(str::trim) {
            None | Some("") => Self {
                column: C::DEFAULT,
                direction,
            },
            Some(raw) => match C::parse(raw) {
                Some(column) => Self { column, direction },
                None => Self::default(),
            },
        }
    }

    /// ORDER BY terms, tiebreaker included.
    pub fn order_by(&self) -> Vec<OrderBy> {
        let mut order = vec![OrderBy {
            column: self.column.column(),
            direction: self.direction,
        }];
        let identity = ColumnRef::primary(C::IDENTITY);
        if order[0].column != identity {
            order.push(OrderBy {
                column: identity,
                direction: self.direction,
            });
        }
        order
    }
}

impl<C: SortColumn> Default for Sort<C> {
    fn default() -> Self {
        Self {
            column: C::DEFAULT,
            direction: SortDirection::Desc,
        }
    }
}

// ============================================================================
// WHITELISTS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatSort {
    ConversationTimestamp,
    UnreadCount,
    CreatedAt,
    UpdatedAt,
}

impl SortColumn for ChatSort {
    const DEFAULT: Self = ChatSort::ConversationTimestamp;
    const IDENTITY: &'static str = "id";

    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "conversation_timestamp" => Some(ChatSort::ConversationTimestamp),
            "unread_count" => Some(ChatSort::UnreadCount),
            "created_at" => Some(ChatSort::CreatedAt),
            "updated_at" => Some(ChatSort::UpdatedAt),
            _ => None,
        }
    }

    fn column(self) -> ColumnRef {
        ColumnRef::primary(match self {
            ChatSort::ConversationTimestamp => "conversation_timestamp",
            ChatSort::UnreadCount => "unread_count",
            ChatSort::CreatedAt => "created_at",
            ChatSort::UpdatedAt => "updated_at",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactSort {
    CreatedAt,
    UpdatedAt,
    CustomName,
    PhoneNumber,
    /// Timestamp of the joined chat.
    LastConversationTimestamp,
}

impl SortColumn for ContactSort {
    const DEFAULT: Self = ContactSort::CreatedAt;
    const IDENTITY: &'static str = "id";

    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "created_at" => Some(ContactSort::CreatedAt),
            "updated_at" => Some(ContactSort::UpdatedAt),
            "custom_name" => Some(ContactSort::CustomName),
            "phone_number" => Some(ContactSort::PhoneNumber),
            "last_conversation_timestamp" => Some(ContactSort::LastConversationTimestamp),
            _ => None,
        }
    }

    fn column(self) -> ColumnRef {
        match self {
            ContactSort::CreatedAt => ColumnRef::primary("created_at"),
            ContactSort::UpdatedAt => ColumnRef::primary("updated_at"),
            ContactSort::CustomName => ColumnRef::primary("custom_name"),
            ContactSort::PhoneNumber => ColumnRef::primary("phone_number"),
            ContactSort::LastConversationTimestamp => ColumnRef::related("conversation_timestamp"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageSort {
    MessageTimestamp,
}

impl SortColumn for MessageSort {
    const DEFAULT: Self = MessageSort::MessageTimestamp;
    const IDENTITY: &'static str = "id";

    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "message_timestamp" => Some(MessageSort::MessageTimestamp),
            _ => None,
        }
    }

    fn column(self) -> ColumnRef {
        ColumnRef::primary("message_timestamp")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentSort {
    Id,
}

impl SortColumn for AgentSort {
    const DEFAULT: Self = AgentSort::Id;
    const IDENTITY: &'static str = "id";

    fn parse(raw: &str) -> Option<Self> {
        (raw == "id").then_some(AgentSort::Id)
    }

    fn column(self) -> ColumnRef {
        ColumnRef::primary("id")
    }
}
