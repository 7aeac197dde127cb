// Service exports
pub mod cache;
pub mod memory;
pub mod postgres;
pub mod purdue;
pub mod seed;
pub mod store;

pub use cache::{CacheError, CacheKey, CacheManager, CacheStats, CachedCatalog};
pub use memory::InMemoryStore;
pub use postgres::PgStore;
pub use purdue::{CatalogImportError, PurdueCatalogClient};
pub use seed::{seed_demo_data, SeedPlan, SeedReport};
pub use store::{CourseCatalog, ProfileStore, SeedStore, StoreError};
