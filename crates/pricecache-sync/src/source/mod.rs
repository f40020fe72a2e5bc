//! Read-only access to the authoritative catalog store.

mod postgres;
mod queries;
mod traits;

pub use postgres::PgCatalogSource;
pub use queries::{CatalogQueries, ProjectionQueries};
pub use traits::{CatalogSource, ChangeLog};
