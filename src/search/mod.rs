//! Search Adapter Boundary (§4.5).
//!
//! The core consumes a narrow interface — `upsertEmbedding`, `deleteByGroup`,
//! `search` — and resolves `auto` at the boundary: try semantic, fall back
//! to fulltext, else empty. The providers behind each backend (an
//! embeddings API, a vector store, a full-text index) are external; this
//! module only wires the core to whichever backends `SearchConfig` enables.

mod fulltext;
mod semantic;

use async_trait::async_trait;
use uuid::Uuid;

pub use fulltext::FulltextSearchBackend;
pub use semantic::{EmbeddingProvider, SemanticSearchBackend};

use crate::{config::SearchConfig, error::CoreResult, models::entry::Entry};

/// Which backend a caller asked for. `Auto` is resolved by
/// [`SearchResolver`]; `Semantic`/`Fulltext` request that backend
/// specifically and surface `unavailable` if it isn't wired up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchType {
    Auto,
    Semantic,
    Fulltext,
}

/// A search request. `group_ids` is the set of groups the caller already
/// has at least reader access to — this module performs no access checks
/// of its own (§4.6 draws that line at the caller).
#[derive(Debug, Clone)]
pub struct SearchQuery {
    pub query: String,
    pub group_ids: Vec<Uuid>,
    pub search_type: SearchType,
    pub group_by_conversation: bool,
    pub include_entry: bool,
    pub limit: u32,
}

/// A single search hit. `entry` is populated only when `include_entry` was
/// set on the query.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub conversation_id: Uuid,
    pub entry_id: Uuid,
    pub group_id: Uuid,
    pub score: f32,
    pub entry: Option<Entry>,
}

/// One pluggable search backend: semantic (vector), fulltext, or disabled.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    async fn upsert_embedding(
        &self,
        group_id: Uuid,
        conversation_id: Uuid,
        entry_id: Uuid,
        vector: Vec<f32>,
    ) -> CoreResult<()>;

    async fn delete_by_group(&self, group_id: Uuid) -> CoreResult<()>;

    async fn search(&self, query: &SearchQuery) -> CoreResult<Vec<SearchHit>>;
}

/// A backend that is simply not wired up. `search` returns empty rather
/// than an error so `auto` resolution can fall through silently.
pub struct DisabledSearchBackend;

#[async_trait]
impl SearchBackend for DisabledSearchBackend {
    async fn upsert_embedding(
        &self,
        _group_id: Uuid,
        _conversation_id: Uuid,
        _entry_id: Uuid,
        _vector: Vec<f32>,
    ) -> CoreResult<()> {
        Ok(())
    }

    async fn delete_by_group(&self, _group_id: Uuid) -> CoreResult<()> {
        Ok(())
    }

    async fn search(&self, _query: &SearchQuery) -> CoreResult<Vec<SearchHit>> {
        Ok(Vec::new())
    }
}

/// Resolves `auto` queries against whichever of semantic/fulltext are
/// configured (§4.5): try semantic first; if it's disabled or returns zero
/// results, fall through to fulltext; if neither is available, return
/// empty. `Semantic`/`Fulltext` queries go straight to that backend and
/// surface `unavailable` (naming the missing type, per §7) if it isn't
/// enabled.
pub struct SearchResolver {
    semantic: Option<Box<dyn SearchBackend>>,
    fulltext: Option<Box<dyn SearchBackend>>,
    config: SearchConfig,
}

impl SearchResolver {
    pub fn new(
        config: SearchConfig,
        semantic: Option<Box<dyn SearchBackend>>,
        fulltext: Option<Box<dyn SearchBackend>>,
    ) -> Self {
        Self {
            semantic,
            fulltext,
            config,
        }
    }

    pub async fn upsert_embedding(
        &self,
        group_id: Uuid,
        conversation_id: Uuid,
        entry_id: Uuid,
        vector: Vec<f32>,
    ) -> CoreResult<()> {
        if let Some(semantic) = &self.semantic {
            semantic
                .upsert_embedding(group_id, conversation_id, entry_id, vector)
                .await?;
        }
        Ok(())
    }

    pub async fn delete_by_group(&self, group_id: Uuid) -> CoreResult<()> {
        if let Some(semantic) = &self.semantic {
            semantic.delete_by_group(group_id).await?;
        }
        if let Some(fulltext) = &self.fulltext {
            fulltext.delete_by_group(group_id).await?;
        }
        Ok(())
    }

    pub async fn search(&self, query: &SearchQuery) -> CoreResult<Vec<SearchHit>> {
        match query.search_type {
            SearchType::Semantic => match &self.semantic {
                Some(backend) => backend.search(query).await,
                None => Err(self.unavailable("semantic")),
            },
            SearchType::Fulltext => match &self.fulltext {
                Some(backend) => backend.search(query).await,
                None => Err(self.unavailable("fulltext")),
            },
            SearchType::Auto => {
                if let Some(semantic) = &self.semantic {
                    let hits = semantic.search(query).await?;
                    if !hits.is_empty() {
                        return Ok(hits);
                    }
                }
                if let Some(fulltext) = &self.fulltext {
                    return fulltext.search(query).await;
                }
                Ok(Vec::new())
            }
        }
    }

    fn unavailable(&self, requested: &str) -> crate::error::CoreError {
        let available = self.config.available_types();
        crate::error::CoreError::Unavailable(format!(
            "search type '{requested}' is not available; available types: {}",
            if available.is_empty() {
                "none".to_string()
            } else {
                available.join(", ")
            }
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StaticBackend(Vec<SearchHit>);

    #[async_trait]
    impl SearchBackend for StaticBackend {
        async fn upsert_embedding(
            &self,
            _group_id: Uuid,
            _conversation_id: Uuid,
            _entry_id: Uuid,
            _vector: Vec<f32>,
        ) -> CoreResult<()> {
            Ok(())
        }

        async fn delete_by_group(&self, _group_id: Uuid) -> CoreResult<()> {
            Ok(())
        }

        async fn search(&self, _query: &SearchQuery) -> CoreResult<Vec<SearchHit>> {
            Ok(self.0.clone())
        }
    }

    fn query(search_type: SearchType) -> SearchQuery {
        SearchQuery {
            query: "hello".into(),
            group_ids: vec![Uuid::new_v4()],
            search_type,
            group_by_conversation: false,
            include_entry: false,
            limit: 10,
        }
    }

    #[tokio::test]
    async fn auto_falls_through_to_fulltext_when_semantic_is_empty() {
        let hit = SearchHit {
            conversation_id: Uuid::new_v4(),
            entry_id: Uuid::new_v4(),
            group_id: Uuid::new_v4(),
            score: 1.0,
            entry: None,
        };
        let resolver = SearchResolver::new(
            SearchConfig {
                semantic_enabled: true,
                fulltext_enabled: true,
            },
            Some(Box::new(StaticBackend(Vec::new()))),
            Some(Box::new(StaticBackend(vec![hit.clone()]))),
        );

        let hits = resolver.search(&query(SearchType::Auto)).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].entry_id, hit.entry_id);
    }

    #[tokio::test]
    async fn auto_prefers_nonempty_semantic_results() {
        let semantic_hit = SearchHit {
            conversation_id: Uuid::new_v4(),
            entry_id: Uuid::new_v4(),
            group_id: Uuid::new_v4(),
            score: 0.9,
            entry: None,
        };
        let fulltext_hit = SearchHit {
            conversation_id: Uuid::new_v4(),
            entry_id: Uuid::new_v4(),
            group_id: Uuid::new_v4(),
            score: 0.5,
            entry: None,
        };
        let resolver = SearchResolver::new(
            SearchConfig {
                semantic_enabled: true,
                fulltext_enabled: true,
            },
            Some(Box::new(StaticBackend(vec![semantic_hit.clone()]))),
            Some(Box::new(StaticBackend(vec![fulltext_hit]))),
        );

        let hits = resolver.search(&query(SearchType::Auto)).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].entry_id, semantic_hit.entry_id);
    }

    #[tokio::test]
    async fn auto_returns_empty_when_nothing_configured() {
        let resolver = SearchResolver::new(SearchConfig::default(), None, None);
        let hits = resolver.search(&query(SearchType::Auto)).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn explicit_semantic_request_without_backend_is_unavailable() {
        let resolver = SearchResolver::new(
            SearchConfig {
                semantic_enabled: false,
                fulltext_enabled: true,
            },
            None,
            Some(Box::new(StaticBackend(Vec::new()))),
        );

        let err = resolver
            .search(&query(SearchType::Semantic))
            .await
            .unwrap_err();
        assert!(matches!(err, crate::error::CoreError::Unavailable(_)));
    }
}
