//! Translation of change events into cache invalidations.

use std::fmt;

use crate::event::{ChangeEvent, EntityKind};
use crate::key::{CacheKey, ProjectionKind};

/// A single cache invalidation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Invalidation {
    /// Remove exactly this key. A wildcard key is removed literally, the
    /// entries it would match as a glob are left alone.
    Key(CacheKey),
    /// Remove every key matching the glob.
    Pattern(String),
    /// Remove everything.
    All,
}

impl Invalidation {
    /// Invalidations required by a change event.
    ///
    /// Structural changes (`Test`, `TestGroup`) reach every price list, so
    /// they clear the kind across all scopes. Price changes touch one entity
    /// in one price list; the list projection of that price list is dropped
    /// as well because it embeds the changed price.
    ///
    /// # Examples
    ///
    /// ```
    /// use chrono::Utc;
    /// use pricecache_core::{ChangeEvent, EntityKind, Invalidation};
    ///
    /// let event = ChangeEvent::new(EntityKind::TestGroup, 4, Utc::now());
    /// assert_eq!(
    ///     Invalidation::for_event(&event),
    ///     vec![Invalidation::Pattern("test_group:*:*".to_string())]
    /// );
    /// ```
    pub fn for_event(event: &ChangeEvent) -> Vec<Invalidation> {
        let Some(projection) = ProjectionKind::for_entity(&event.kind) else {
            return Vec::new();
        };

        match event.kind {
            EntityKind::Test | EntityKind::TestGroup => {
                vec![Invalidation::Pattern(projection.pattern())]
            },
            EntityKind::PriceListEntry | EntityKind::PriceListGroupEntry => {
                // Decoding guarantees the scope, guard anyway for hand-built events.
                let Some(price_list_id) = event.price_list_id else {
                    return Vec::new();
                };
                vec![
                    Invalidation::Key(CacheKey::entity(
                        projection,
                        event.entity_id,
                        Some(price_list_id),
                    )),
                    Invalidation::Key(CacheKey::all(projection, Some(price_list_id))),
                ]
            },
            EntityKind::Unknown(_) => Vec::new(),
        }
    }

    /// Returns true if applying `self` also covers `other`.
    ///
    /// A kind-wide pattern (`test:*:*`) covers every key of that kind.
    pub fn covers(&self, other: &Invalidation) -> bool {
        match (self, other) {
            (Invalidation::All, _) => true,
            (Invalidation::Pattern(p), Invalidation::Key(k)) => *p == k.kind().pattern(),
            (a, b) => a == b,
        }
    }
}

impl fmt::Display for Invalidation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key(key) => write!(f, "key {key}"),
            Self::Pattern(p) => write!(f, "pattern {p}"),
            Self::All => f.write_str("all"),
        }
    }
}

/// Removes redundant invalidations while keeping arrival order.
///
/// Invalidation is idempotent, so dropping duplicates inside one burst
/// changes nothing but the work done. An `All` swallows everything, and a
/// kind-wide pattern swallows the keys of its kind.
pub fn coalesce<I>(invalidations: I) -> Vec<Invalidation>
where
    I: IntoIterator<Item = Invalidation>,
{
    let mut out: Vec<Invalidation> = Vec::new();

    for inv in invalidations {
        if inv == Invalidation::All {
            return vec![Invalidation::All];
        }
        if out.iter().any(|kept| kept.covers(&inv)) {
            continue;
        }
        out.retain(|kept| !inv.covers(kept));
        out.push(inv);
    }

    out
}
