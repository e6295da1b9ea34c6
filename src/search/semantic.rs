//! Semantic (vector) search backend.
//!
//! The embeddings API itself is external (§3.1 Non-goals); this backend
//! only owns the vector store side of the boundary — storing and
//! cosine-ranking the vectors an [`EmbeddingProvider`] produces. A
//! deployment wires a concrete `EmbeddingProvider` (an HTTP client to the
//! configured provider) in the shell that embeds this crate.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

use super::{SearchBackend, SearchHit, SearchQuery};
use crate::error::CoreResult;

/// Embeds free text into the same vector space as stored entries.
/// Implementations call out to whichever provider `EmbeddingConfig`
/// names; this crate only depends on the trait.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> CoreResult<Vec<f32>>;
}

#[derive(Clone)]
struct StoredVector {
    conversation_id: Uuid,
    entry_id: Uuid,
    vector: Vec<f32>,
}

/// In-process vector store keyed by group, ranked by cosine similarity
/// against the query embedding. Suitable for a single-instance deployment
/// or as the reference implementation a production vector store (pgvector,
/// Qdrant) would replace behind the same trait.
pub struct SemanticSearchBackend {
    provider: Arc<dyn EmbeddingProvider>,
    vectors: DashMap<Uuid, HashMap<Uuid, StoredVector>>,
}

impl SemanticSearchBackend {
    pub fn new(provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            provider,
            vectors: DashMap::new(),
        }
    }
}

#[async_trait]
impl SearchBackend for SemanticSearchBackend {
    async fn upsert_embedding(
        &self,
        group_id: Uuid,
        conversation_id: Uuid,
        entry_id: Uuid,
        vector: Vec<f32>,
    ) -> CoreResult<()> {
        self.vectors.entry(group_id).or_default().insert(
            entry_id,
            StoredVector {
                conversation_id,
                entry_id,
                vector,
            },
        );
        Ok(())
    }

    async fn delete_by_group(&self, group_id: Uuid) -> CoreResult<()> {
        self.vectors.remove(&group_id);
        Ok(())
    }

    async fn search(&self, query: &SearchQuery) -> CoreResult<Vec<SearchHit>> {
        let query_vector = self.provider.embed(&query.query).await?;

        let mut hits = Vec::new();
        for &group_id in &query.group_ids {
            let Some(group_vectors) = self.vectors.get(&group_id) else {
                continue;
            };
            for stored in group_vectors.values() {
                let score = cosine_similarity(&query_vector, &stored.vector);
                if score <= 0.0 {
                    continue;
                }
                hits.push(SearchHit {
                    conversation_id: stored.conversation_id,
                    entry_id: stored.entry_id,
                    group_id,
                    score,
                    entry: None,
                });
            }
        }

        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(query.limit as usize);
        Ok(hits)
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedEmbedding(Vec<f32>);

    #[async_trait]
    impl EmbeddingProvider for FixedEmbedding {
        async fn embed(&self, _text: &str) -> CoreResult<Vec<f32>> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn cosine_similarity_is_one_for_identical_vectors() {
        let a = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&a, &a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_similarity_is_zero_for_orthogonal_vectors() {
        let a = vec![1.0, 0.0];
        let b = vec![0.0, 1.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[tokio::test]
    async fn search_ranks_closer_vectors_first() {
        let backend = SemanticSearchBackend::new(Arc::new(FixedEmbedding(vec![1.0, 0.0])));
        let group_id = Uuid::new_v4();
        let close_entry = Uuid::new_v4();
        let far_entry = Uuid::new_v4();

        backend
            .upsert_embedding(group_id, Uuid::new_v4(), close_entry, vec![1.0, 0.1])
            .await
            .unwrap();
        backend
            .upsert_embedding(group_id, Uuid::new_v4(), far_entry, vec![0.1, 1.0])
            .await
            .unwrap();

        let hits = backend
            .search(&SearchQuery {
                query: "anything".into(),
                group_ids: vec![group_id],
                search_type: crate::search::SearchType::Semantic,
                group_by_conversation: false,
                include_entry: false,
                limit: 10,
            })
            .await
            .unwrap();

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].entry_id, close_entry);
    }

    #[tokio::test]
    async fn delete_by_group_clears_its_vectors() {
        let backend = SemanticSearchBackend::new(Arc::new(FixedEmbedding(vec![1.0, 0.0])));
        let group_id = Uuid::new_v4();
        backend
            .upsert_embedding(group_id, Uuid::new_v4(), Uuid::new_v4(), vec![1.0, 0.0])
            .await
            .unwrap();

        backend.delete_by_group(group_id).await.unwrap();

        let hits = backend
            .search(&SearchQuery {
                query: "anything".into(),
                group_ids: vec![group_id],
                search_type: crate::search::SearchType::Semantic,
                group_by_conversation: false,
                include_entry: false,
                limit: 10,
            })
            .await
            .unwrap();
        assert!(hits.is_empty());
    }
}
