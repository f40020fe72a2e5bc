//! SQL statements used by the Postgres source.
//!
//! The schema belongs to the database team, so statements are data: the
//! defaults below follow the catalog tables as deployed and can be replaced
//! wholesale from configuration.

use pricecache_core::{ProjectionKind, Scope};
use serde::{Deserialize, Serialize};

/// Statements for one projection kind.
///
/// Every statement returns rows of `(id BIGINT, projection JSONB)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectionQueries {
    /// One entity without price list. Binds `$1 = id`.
    pub by_id: String,
    /// One entity priced in a list. Binds `$1 = id`, `$2 = price_list_id`.
    pub by_id_priced: String,
    /// Every entity without price list.
    pub all: String,
    /// Every entity priced in a list. Binds `$1 = price_list_id`.
    pub all_priced: String,
}

/// Full statement set of `PgCatalogSource`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CatalogQueries {
    pub tests: ProjectionQueries,
    pub test_groups: ProjectionQueries,
    /// Returns `(id BIGINT)` rows.
    pub active_price_lists: String,
    /// Returns `(kind TEXT, entity_id BIGINT, price_list_id BIGINT NULL,
    /// occurred_at TIMESTAMPTZ)` rows. Binds `$1 = since`.
    pub changes_since: String,
}

impl CatalogQueries {
    /// Statements for a projection kind.
    pub fn for_kind(&self, kind: ProjectionKind) -> &ProjectionQueries {
        match kind {
            ProjectionKind::Test => &self.tests,
            ProjectionKind::TestGroup => &self.test_groups,
        }
    }

    /// The list statement for a scope.
    pub fn list_for(&self, kind: ProjectionKind, scope: Scope) -> &str {
        let q = self.for_kind(kind);
        match scope {
            Scope::Default => &q.all,
            Scope::PriceList(_) => &q.all_priced,
        }
    }
}

impl Default for CatalogQueries {
    fn default() -> Self {
        Self {
            tests: ProjectionQueries {
                by_id: "SELECT t.id, to_jsonb(t) FROM tests t WHERE t.id = $1".into(),
                by_id_priced: "SELECT t.id, to_jsonb(t) || jsonb_build_object(\
                               'price_list_id', e.price_list_id, 'price', e.price) \
                               FROM tests t JOIN price_list_entries e ON e.test_id = t.id \
                               WHERE t.id = $1 AND e.price_list_id = $2"
                    .into(),
                all: "SELECT t.id, to_jsonb(t) FROM tests t ORDER BY t.id".into(),
                all_priced: "SELECT t.id, to_jsonb(t) || jsonb_build_object(\
                             'price_list_id', e.price_list_id, 'price', e.price) \
                             FROM tests t JOIN price_list_entries e ON e.test_id = t.id \
                             WHERE e.price_list_id = $1 ORDER BY t.id"
                    .into(),
            },
            test_groups: ProjectionQueries {
                by_id: "SELECT g.id, to_jsonb(g) FROM test_groups g WHERE g.id = $1".into(),
                by_id_priced: "SELECT g.id, to_jsonb(g) || jsonb_build_object(\
                               'price_list_id', e.price_list_id, 'price', e.price) \
                               FROM test_groups g \
                               JOIN price_list_group_entries e ON e.test_group_id = g.id \
                               WHERE g.id = $1 AND e.price_list_id = $2"
                    .into(),
                all: "SELECT g.id, to_jsonb(g) FROM test_groups g ORDER BY g.id".into(),
                all_priced: "SELECT g.id, to_jsonb(g) || jsonb_build_object(\
                             'price_list_id', e.price_list_id, 'price', e.price) \
                             FROM test_groups g \
                             JOIN price_list_group_entries e ON e.test_group_id = g.id \
                             WHERE e.price_list_id = $1 ORDER BY g.id"
                    .into(),
            },
            active_price_lists: "SELECT id FROM price_lists WHERE active ORDER BY id".into(),
            changes_since: "SELECT kind, entity_id, price_list_id, occurred_at FROM (\
                            SELECT 'test' AS kind, id AS entity_id, NULL::BIGINT AS price_list_id, \
                            updated_at AS occurred_at FROM tests \
                            UNION ALL SELECT 'test_group', id, NULL, updated_at FROM test_groups \
                            UNION ALL SELECT 'price_list_entry', test_id, price_list_id, updated_at \
                            FROM price_list_entries \
                            UNION ALL SELECT 'price_list_group_entry', test_group_id, price_list_id, \
                            updated_at FROM price_list_group_entries\
                            ) c WHERE occurred_at >= $1 ORDER BY occurred_at"
                .into(),
        }
    }
}
