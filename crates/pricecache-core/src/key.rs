//! Cache key generation and parsing.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::event::EntityKind;

/// Segment used for the unscoped (list-price) projection.
pub const DEFAULT_SCOPE: &str = "default";

/// Segment that stands for "every entity of the kind".
pub const WILDCARD: &str = "*";

/// Kind of cached projection.
///
/// Price entries are projected onto the entity they price, so a
/// `PriceListEntry` change lands on a `test` key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectionKind {
    Test,
    TestGroup,
}

impl ProjectionKind {
    pub const ALL: [ProjectionKind; 2] = [ProjectionKind::Test, ProjectionKind::TestGroup];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Test => "test",
            Self::TestGroup => "test_group",
        }
    }

    /// Projection a change of the given entity kind affects, if any.
    pub fn for_entity(kind: &EntityKind) -> Option<Self> {
        match kind {
            EntityKind::Test | EntityKind::PriceListEntry => Some(Self::Test),
            EntityKind::TestGroup | EntityKind::PriceListGroupEntry => Some(Self::TestGroup),
            EntityKind::Unknown(_) => None,
        }
    }

    /// Glob matching this kind in every scope.
    pub fn pattern(&self) -> String {
        format!("{}:{}:{}", self.as_str(), WILDCARD, WILDCARD)
    }
}

impl FromStr for ProjectionKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "test" | "tests" => Ok(Self::Test),
            "test_group" | "test_groups" | "testgroup" => Ok(Self::TestGroup),
            other => Err(CoreError::invalid_key(
                other,
                "unknown projection kind",
            )),
        }
    }
}

impl fmt::Display for ProjectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Price-list scope of a projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Scope {
    /// Base catalog without a price list.
    Default,
    /// A specific price list.
    PriceList(i64),
}

impl Scope {
    pub fn from_price_list(price_list_id: Option<i64>) -> Self {
        price_list_id.map_or(Self::Default, Self::PriceList)
    }

    pub fn price_list_id(&self) -> Option<i64> {
        match self {
            Self::Default => None,
            Self::PriceList(id) => Some(*id),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => f.write_str(DEFAULT_SCOPE),
            Self::PriceList(id) => write!(f, "{id}"),
        }
    }
}

/// Entity segment of a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityRef {
    Id(i64),
    /// The whole category, e.g. every priced test of one price list.
    All,
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{id}"),
            Self::All => f.write_str(WILDCARD),
        }
    }
}

/// Deterministic key for a cached projection: `kind:scope:entity`.
///
/// # Examples
///
/// ```
/// use pricecache_core::{CacheKey, ProjectionKind};
///
/// let key = CacheKey::entity(ProjectionKind::Test, 1001, Some(27));
/// assert_eq!(key.to_string(), "test:27:1001");
///
/// let all = CacheKey::all(ProjectionKind::Test, Some(27));
/// assert_eq!(all.to_string(), "test:27:*");
/// assert_eq!(all.to_string().parse::<CacheKey>().unwrap(), all);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    kind: ProjectionKind,
    scope: Scope,
    entity: EntityRef,
}

impl CacheKey {
    pub fn new(kind: ProjectionKind, scope: Scope, entity: EntityRef) -> Self {
        Self {
            kind,
            scope,
            entity,
        }
    }

    /// Key of a single entity, optionally within a price list.
    pub fn entity(kind: ProjectionKind, entity_id: i64, price_list_id: Option<i64>) -> Self {
        Self::new(
            kind,
            Scope::from_price_list(price_list_id),
            EntityRef::Id(entity_id),
        )
    }

    /// Wildcard key addressing a whole category within a scope.
    pub fn all(kind: ProjectionKind, price_list_id: Option<i64>) -> Self {
        Self::new(kind, Scope::from_price_list(price_list_id), EntityRef::All)
    }

    pub fn kind(&self) -> ProjectionKind {
        self.kind
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    pub fn entity_ref(&self) -> EntityRef {
        self.entity
    }

    pub fn is_wildcard(&self) -> bool {
        self.entity == EntityRef::All
    }

    /// Glob matching every key of the same kind and scope.
    pub fn scope_pattern(&self) -> String {
        format!("{}:{}:{}", self.kind, self.scope, WILDCARD)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.kind, self.scope, self.entity)
    }
}

impl FromStr for CacheKey {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').collect();
        let [kind, scope, entity] = parts.as_slice() else {
            return Err(CoreError::invalid_key(s, "expected kind:scope:entity"));
        };

        let kind = kind.parse::<ProjectionKind>()?;

        let scope = if *scope == DEFAULT_SCOPE {
            Scope::Default
        } else {
            scope
                .parse::<i64>()
                .map(Scope::PriceList)
                .map_err(|_| CoreError::invalid_key(s, "scope must be 'default' or an integer"))?
        };

        let entity = if *entity == WILDCARD {
            EntityRef::All
        } else {
            entity
                .parse::<i64>()
                .map(EntityRef::Id)
                .map_err(|_| CoreError::invalid_key(s, "entity must be '*' or an integer"))?
        };

        Ok(Self::new(kind, scope, entity))
    }
}
