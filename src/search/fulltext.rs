//! Fulltext search backend, scored by naive case-insensitive term
//! frequency over `indexed_content` (§4.2.6's plaintext index column —
//! never the encrypted `content`).

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use super::{SearchBackend, SearchHit, SearchQuery};
use crate::{db::repos::EntryRepo, error::CoreResult};

pub struct FulltextSearchBackend {
    entries: Arc<dyn EntryRepo>,
}

impl FulltextSearchBackend {
    pub fn new(entries: Arc<dyn EntryRepo>) -> Self {
        Self { entries }
    }
}

#[async_trait]
impl SearchBackend for FulltextSearchBackend {
    /// Fulltext has nothing to index ahead of time; it scans
    /// `indexed_content` at query time.
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

    async fn search(&self, query: &SearchQuery) -> CoreResult<Vec<SearchHit>> {
        let needle = query.query.to_lowercase();
        if needle.is_empty() {
            return Ok(Vec::new());
        }

        let mut hits = Vec::new();
        for &group_id in &query.group_ids {
            let rows = self.entries.list_by_group_ordered(group_id).await?;
            for row in rows {
                let Some(indexed) = row.indexed_content.as_ref() else {
                    continue;
                };
                let score = term_frequency_score(&indexed.to_lowercase(), &needle);
                if score <= 0.0 {
                    continue;
                }
                hits.push(SearchHit {
                    conversation_id: row.conversation_id,
                    entry_id: row.id,
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

/// Count of (possibly overlapping-free) occurrences of `needle` in
/// `haystack`, normalized by haystack length so longer documents don't
/// automatically outrank shorter, denser matches.
fn term_frequency_score(haystack: &str, needle: &str) -> f32 {
    if haystack.is_empty() {
        return 0.0;
    }
    let occurrences = haystack.matches(needle).count();
    if occurrences == 0 {
        return 0.0;
    }
    occurrences as f32 / (haystack.len() as f32).sqrt()
}
