//! Per-store health probes for the admin surface.

use std::sync::Arc;

use serde::Serialize;

use crate::link_store::LinkStore;
use crate::vector::VectorStore;

#[derive(Debug, Clone, Copy, Serialize)]
pub struct StoreHealth {
    pub relational: bool,
    pub vector: bool,
}

impl StoreHealth {
    pub fn healthy(&self) -> bool {
        self.relational && self.vector
    }
}

pub async fn check_health<L, V>(links: &Arc<L>, vectors: &Arc<V>) -> StoreHealth
where
    L: LinkStore,
    V: VectorStore,
{
    let relational = match links.ping().await {
        Ok(()) => true,
        Err(err) => {
            tracing::error!(error = %err, "Relational store unreachable");
            false
        }
    };
    let vector = match vectors.ping().await {
        Ok(()) => true,
        Err(err) => {
            tracing::error!(error = %err, "Vector store unreachable");
            false
        }
    };

    StoreHealth { relational, vector }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryLinkStore;
    use crate::vector::MemoryVectorStore;

    #[tokio::test]
    async fn memory_stores_report_healthy() {
        let links = Arc::new(MemoryLinkStore::new());
        let vectors = Arc::new(MemoryVectorStore::new());
        let health = check_health(&links, &vectors).await;
        assert!(health.relational);
        assert!(health.vector);
        assert!(health.healthy());
    }
}
