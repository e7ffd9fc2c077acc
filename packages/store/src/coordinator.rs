//! The dual-store write: vector first, relational second, link state
//! last. An article is either fully visible in both stores, fully
//! absent, or explicitly marked for repair — never silently half
//! written.

use std::sync::Arc;

use thiserror::Error;
use uuid::Uuid;

use crawler::extract::ExtractedContent;
use crawler::hash;
use crawler::FailureReason;

use crate::embedding::Embedder;
use crate::link_store::{LinkStore, NewArticle};
use crate::models::link::LinkState;
use crate::vector::{ArticleVector, VectorStore};

#[derive(Debug, Error)]
pub enum CommitError {
    /// The link was not in CRAWLING when the commit started; someone
    /// else owns it.
    #[error("link {0} is not in crawling state")]
    InvalidState(Uuid),

    #[error("link {0} not found")]
    LinkNotFound(Uuid),

    /// Another live link already carries this body.
    #[error("duplicate content of link {existing}")]
    DuplicateContent { existing: Uuid },

    /// Embedding or vector insert failed; nothing was written.
    #[error("vector write failed: {0}")]
    VectorWrite(#[source] anyhow::Error),

    /// Vector landed but the article row did not. `compensated` tells
    /// whether the vector was successfully deleted again; when false
    /// the Sync job owns the orphan.
    #[error("relational write failed (vector compensated: {compensated}): {source}")]
    RelationalWrite {
        compensated: bool,
        #[source]
        source: anyhow::Error,
    },

    /// Both writes landed but the CRAWLED transition failed; the Sync
    /// job will finish the promotion.
    #[error("link state transition failed: {0}")]
    Transition(#[source] anyhow::Error),

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl CommitError {
    /// How the failure is recorded on the link.
    pub fn failure_reason(&self) -> FailureReason {
        match self {
            CommitError::DuplicateContent { .. } => FailureReason::Duplicate,
            CommitError::RelationalWrite {
                compensated: false, ..
            } => FailureReason::Inconsistent,
            _ => FailureReason::StoreWrite,
        }
    }
}

/// What a successful commit produced.
#[derive(Debug, Clone)]
pub struct CommitReceipt {
    pub article_id: Uuid,
    pub vector_id: Uuid,
    pub content_hash: String,
}

/// Orchestrates the two-store write for one extracted article.
pub struct StoreCoordinator<L, V, E> {
    links: Arc<L>,
    vectors: Arc<V>,
    embedder: Arc<E>,
}

impl<L, V, E> StoreCoordinator<L, V, E>
where
    L: LinkStore,
    V: VectorStore,
    E: Embedder,
{
    pub fn new(links: Arc<L>, vectors: Arc<V>, embedder: Arc<E>) -> Self {
        Self {
            links,
            vectors,
            embedder,
        }
    }

    /// Commit one extraction. On success both stores have accepted the
    /// write and the link row reads CRAWLED; any error leaves the link
    /// for the caller to mark FAILED with [`CommitError::failure_reason`].
    pub async fn commit(
        &self,
        link_id: Uuid,
        collection: &str,
        content: &ExtractedContent,
    ) -> Result<CommitReceipt, CommitError> {
        let link = self
            .links
            .link_by_id(link_id)
            .await?
            .ok_or(CommitError::LinkNotFound(link_id))?;
        if link.state != LinkState::Crawling {
            return Err(CommitError::InvalidState(link_id));
        }

        let content_hash = hash::content_hash(&content.text);

        if let Some(existing) = self
            .links
            .find_live_by_content_hash(&content_hash, link_id)
            .await?
        {
            tracing::info!(
                link_id = %link_id,
                existing = %existing.id,
                "Duplicate content detected, skipping write"
            );
            return Err(CommitError::DuplicateContent {
                existing: existing.id,
            });
        }

        // Vector first. The embedding input mirrors what search will
        // see: title plus body.
        let embedding = self
            .embedder
            .embed(&format!("{}\n\n{}", content.title, content.text))
            .await
            .map_err(CommitError::VectorWrite)?;

        let article_vector = ArticleVector {
            title: content.title.clone(),
            body: content.text.clone(),
            url: content.url.to_string(),
            source_site: content.source.clone(),
            domain: content.domain.clone(),
            published_date: content.published_date,
            extracted_at: chrono::Utc::now(),
            quality_score: content.quality_score,
            keywords: content.keywords.clone(),
            link_id,
        };
        let vector_id = self
            .vectors
            .upsert(collection, &article_vector, &embedding)
            .await
            .map_err(CommitError::VectorWrite)?;

        // Relational second.
        let article = NewArticle {
            link_id,
            vector_id: Some(vector_id),
            title: content.title.clone(),
            author: content.author.clone(),
            published_date: content.published_date,
            content_length: content.content_length as i64,
            quality_score: content.quality_score,
            domain: content.domain.clone(),
            keywords: content.keywords.clone(),
            metadata: content.metadata.clone(),
        };
        let article_row = match self.links.insert_article(article).await {
            Ok(row) => row,
            Err(source) => {
                // Best-effort compensation; on failure the reconciler
                // will find the orphan through its back-pointer.
                let compensated = match self.vectors.delete(vector_id).await {
                    Ok(deleted) => deleted,
                    Err(delete_err) => {
                        tracing::error!(
                            vector_id = %vector_id,
                            error = %delete_err,
                            "Compensating vector delete failed, leaving orphan for sync"
                        );
                        false
                    }
                };
                return Err(CommitError::RelationalWrite {
                    compensated,
                    source,
                });
            }
        };

        // Link state last.
        if let Err(source) = self.links.mark_crawled(link_id, &content_hash).await {
            tracing::error!(
                link_id = %link_id,
                article_id = %article_row.id,
                "Link transition failed after both writes, sync will repair"
            );
            return Err(CommitError::Transition(source));
        }

        tracing::info!(
            link_id = %link_id,
            article_id = %article_row.id,
            vector_id = %vector_id,
            collection = collection,
            "Article committed to both stores"
        );
        Ok(CommitReceipt {
            article_id: article_row.id,
            vector_id,
            content_hash,
        })
    }
}
