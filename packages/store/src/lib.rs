//! Persistence for the acquisition pipeline: the relational link store
//! (sites, discovered links, attempt history, extracted articles,
//! daily stats), the vector store, and the coordinator that keeps the
//! two consistent through partial failures.

pub mod coordinator;
pub mod embedding;
pub mod health;
pub mod link_store;
pub mod memory;
pub mod models;
pub mod sync;
pub mod vector;

pub use coordinator::{CommitError, CommitReceipt, StoreCoordinator};
pub use embedding::{Embedder, HashEmbedder, OpenAiEmbedder};
pub use health::{check_health, StoreHealth};
pub use link_store::{LinkStore, NewArticle, NewAttempt, NewLink, PgLinkStore, StatsDelta};
pub use memory::MemoryLinkStore;
pub use models::link::{DiscoveredLink, LinkState};
pub use models::{article::ExtractedArticle, attempt::CrawlAttempt, site::SiteRow, stats::CrawlStats};
pub use sync::{run_sync, SyncReport};
pub use vector::{ArticleVector, MemoryVectorStore, PgVectorStore, VectorHit, VectorStore};

/// Embedded SQL migrations (`sqlx migrate run` equivalent, run at
/// startup by the binary).
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");
