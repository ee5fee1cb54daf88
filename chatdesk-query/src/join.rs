//! Chat and contact relations.
//!
//! Chats and contacts meet on `(phone_number, agent_id)`. The same relation
//! drives the enrichment join of a data query and the `EXISTS` probes that
//! stand in for it in count queries.

use crate::schema::{Table, TenantSchema};
use crate::sql::{Predicate, Probe, RelatedJoin};

/// How a primary table reaches its related table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Relation {
    pub related: Table,
    /// `(related column, primary column)` pairs.
    pub keys: &'static [(&'static str, &'static str)],
    /// Tiebreak when several related rows match.
    pub identity: &'static str,
    /// `(output name, related column)` pairs added to each row.
    pub columns: &'static [(&'static str, &'static str)],
    pub presence: &'static str,
}

const PHONE_AND_AGENT: &[(&str, &str)] = &[("phone_number", "phone_number"), ("agent_id", "agent_id")];

/// Chat rows enriched with their contact.
pub const CHAT_CONTACT: Relation = Relation {
    related: Table::Contacts,
    keys: PHONE_AND_AGENT,
    identity: "id",
    columns: &[
        ("contact_custom_name", "custom_name"),
        ("contact_assigned_to", "assigned_to"),
        ("contact_tags", "tags"),
        ("contact_avatar", "avatar"),
        ("contact_origin", "origin"),
    ],
    presence: "has_contact",
};

/// Contact rows enriched with their chat.
pub const CONTACT_CHAT: Relation = Relation {
    related: Table::Chats,
    keys: PHONE_AND_AGENT,
    identity: "id",
    columns: &[
        ("chat_push_name", "push_name"),
        ("chat_group_name", "group_name"),
        ("chat_is_group", "is_group"),
        ("last_conversation_timestamp", "conversation_timestamp"),
    ],
    presence: "has_chat",
};

impl Relation {
    /// Left join adding the related columns and presence flag.
    pub fn join(&self, schema: &TenantSchema) -> RelatedJoin {
        RelatedJoin {
            table: schema.table(self.related),
            keys: self.keys,
            identity: self.identity,
            columns: self.columns,
            presence: self.presence,
        }
    }

    /// `EXISTS` over related rows matching `predicates` (written against the
    /// probe alias).
    pub fn exists(&self, schema: &TenantSchema, predicates: Vec<Predicate>) -> Predicate {
        Predicate::Exists {
            probe: self.probe(schema, predicates),
            negated: false,
        }
    }

    /// `NOT EXISTS` over any related row.
    pub fn missing(&self, schema: &TenantSchema) -> Predicate {
        Predicate::Exists {
            probe: self.probe(schema, Vec::new()),
            negated: true,
        }
    }

    /// Presence test: `EXISTS` when `present`, `NOT EXISTS` otherwise.
    pub fn presence_filter(&self, schema: &TenantSchema, present: bool) -> Predicate {
        if present {
            self.exists(schema, Vec::new())
        } else {
            self.missing(schema)
        }
    }

    fn probe(&self, schema: &TenantSchema, predicates: Vec<Predicate>) -> Probe {
        Probe {
            table: schema.table(self.related),
            keys: self.keys,
            predicates,
        }
    }
}
