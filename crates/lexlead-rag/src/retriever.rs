//! Query → candidate passages.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{AdvisorError, Result};
use crate::search::CorpusIndex;
use crate::types::Document;

pub const SCORE_KEY: &str = "score";
pub const PASSAGE_ID_KEY: &str = "passage_id";

/// Returns at most `k` passages, best first. Zero passages is a valid answer;
/// an unreachable backing store is [`AdvisorError::RetrievalUnavailable`].
#[async_trait]
pub trait Retriever: Send + Sync {
    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<Document>>;
}

/// BM25 retrieval over the local corpus index.
pub struct CorpusRetriever {
    index: Arc<CorpusIndex>,
}

impl CorpusRetriever {
    pub fn new(index: Arc<CorpusIndex>) -> Self {
        Self { index }
    }
}

#[async_trait]
impl Retriever for CorpusRetriever {
    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<Document>> {
        let index = self.index.clone();
        let query_owned = query.to_string();
        let hits = tokio::task::spawn_blocking(move || index.search(&query_owned, k))
            .await
            .map_err(|e| AdvisorError::retrieval("corpus", e))?
            .map_err(|e| AdvisorError::retrieval("corpus", format!("{:#}", e)))?;

        tracing::debug!(query = %query, k, hits = hits.len(), "Corpus retrieval");

        Ok(hits
            .into_iter()
            .map(|hit| {
                Document::new(hit.passage.text)
                    .with_title(hit.passage.title)
                    .with_source(hit.passage.source)
                    .with_meta(PASSAGE_ID_KEY, hit.passage.id)
                    .with_meta(SCORE_KEY, format!("{:.4}", hit.score))
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::Passage;

    #[tokio::test]
    async fn test_corpus_retriever_maps_hits_to_documents() {
        let dir = tempfile::tempdir().unwrap();
        let index = Arc::new(CorpusIndex::open(dir.path()).unwrap());
        for (i, text) in [
            "Adverse possession in Illinois requires 20 years of continuous possession.",
            "A written lease for more than one year must be signed.",
            "Possession of land openly and notoriously is required.",
        ]
        .iter()
        .enumerate()
        {
            index
                .add_passage(&Passage {
                    id: format!("p{}", i),
                    text: text.to_string(),
                    title: "Property".to_string(),
                    source: format!("corpus/property{}.txt", i),
                })
                .unwrap();
        }
        index.commit().unwrap();

        let retriever = CorpusRetriever::new(index);
        let docs = retriever.retrieve("adverse possession", 2).await.unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].metadata.get(PASSAGE_ID_KEY).map(String::as_str), Some("p0"));
        assert_eq!(docs[0].title(), Some("Property"));
        assert_eq!(docs[0].source(), Some("corpus/property0.txt"));

        let again = retriever.retrieve("adverse possession", 2).await.unwrap();
        assert_eq!(docs, again);

        assert!(retriever.retrieve("bankruptcy", 5).await.unwrap().is_empty());
    }
}
