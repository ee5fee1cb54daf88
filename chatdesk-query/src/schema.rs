//! Schema resolution.
//!
//! Every tenant owns a schema named `<prefix><tenant_id>`. This module is the
//! only place identifiers are produced; everything else in a query is a
//! bound parameter or a compile-time column name.

use chatdesk_core::constants::{
    AGENTS_TABLE, CHATS_TABLE, CONTACTS_TABLE, MAX_IDENTIFIER_LEN, MESSAGES_TABLE,
};
use chatdesk_core::tenant::is_identifier_safe;
use chatdesk_core::{ConfigError, QueryConfig, QueryResult, TenantId};
use std::fmt;

/// Relations present in every tenant schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Table {
    Agents,
    Chats,
    Contacts,
    Messages,
}

impl Table {
    pub const ALL: [Table; 4] = [Table::Agents, Table::Chats, Table::Contacts, Table::Messages];

    pub fn name(self) -> &'static str {
        match self {
            Table::Agents => AGENTS_TABLE,
            Table::Chats => CHATS_TABLE,
            Table::Contacts => CONTACTS_TABLE,
            Table::Messages => MESSAGES_TABLE,
        }
    }
}

/// Fully qualified table, rendered as `"schema"."table"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QualifiedTable {
    schema: String,
    table: Table,
}

impl QualifiedTable {
    pub fn schema(&self) -> &str {
        &self.schema
    }

    pub fn table(&self) -> Table {
        self.table
    }
}

impl fmt::Display for QualifiedTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\".\"{}\"", self.schema, self.table.name())
    }
}

/// A tenant's resolved schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantSchema {
    tenant: TenantId,
    schema: String,
}

impl TenantSchema {
    /// Resolve the schema for `tenant` under the configured prefix.
    pub fn resolve(config: &QueryConfig, tenant: &TenantId) -> QueryResult<Self> {
        let prefix = config.schema_prefix.as_str();
        if !prefix.is_empty() && !is_identifier_safe(prefix) {
            return Err(ConfigError::InvalidValue {
                field: "schema_prefix".to_string(),
                value: prefix.to_string(),
                reason: "only ASCII letters, digits, '_' and '-' are allowed".to_string(),
            }
            .into());
        }

        let schema = format!("{}{}", prefix, tenant.as_str());
        if schema.len() > MAX_IDENTIFIER_LEN {
            return Err(ConfigError::InvalidTenant {
                tenant: tenant.to_string(),
                reason: format!(
                    "schema name {} exceeds {} bytes",
                    schema, MAX_IDENTIFIER_LEN
                ),
            }
            .into());
        }

        Ok(Self {
            tenant: tenant.clone(),
            schema,
        })
    }

    pub fn tenant(&self) -> &TenantId {
        &self.tenant
    }

    /// Unquoted schema name.
    pub fn name(&self) -> &str {
        &self.schema
    }

    pub fn table(&self, table: Table) -> QualifiedTable {
        QualifiedTable {
            schema: self.schema.clone(),
            table,
        }
    }

    pub fn agents(&self) -> QualifiedTable {
        self.table(Table::Agents)
    }

    pub fn chats(&self) -> QualifiedTable {
        self.table(Table::Chats)
    }

    pub fn contacts(&self) -> QualifiedTable {
        self.table(Table::Contacts)
    }

    pub fn messages(&self) -> QualifiedTable {
        self.table(Table::Messages)
    }
}
