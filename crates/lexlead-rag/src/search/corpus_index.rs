use anyhow::{Context, Result};
use std::path::Path;
use tantivy::collector::TopDocs;
use tantivy::query::QueryParser;
use tantivy::schema::{self, Schema, Value as TantivyValue, STORED, STRING, TEXT};
use tantivy::{doc, Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, Term};

/// A passage as stored in the corpus index.
#[derive(Debug, Clone, PartialEq)]
pub struct Passage {
    pub id: String,
    pub text: String,
    pub title: String,
    pub source: String,
}

/// A scored passage returned by [`CorpusIndex::search`].
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub score: f32,
    pub passage: Passage,
}

/// BM25 full-text index over the legal corpus.
pub struct CorpusIndex {
    index: Index,
    reader: IndexReader,
    /// Taken on first write so read-only users never hold the index lock.
    writer: parking_lot::Mutex<Option<IndexWriter>>,
    id_field: schema::Field,
    text_field: schema::Field,
    title_field: schema::Field,
    source_field: schema::Field,
}

impl CorpusIndex {
    /// `id` and `source` are STRING (indexed, not tokenized) so deletes by
    /// term hit exactly one passage or one file.
    fn build_schema() -> (Schema, schema::Field, schema::Field, schema::Field, schema::Field) {
        let mut sb = Schema::builder();
        let id_field = sb.add_text_field("id", STRING | STORED);
        let text_field = sb.add_text_field("text", TEXT | STORED);
        let title_field = sb.add_text_field("title", TEXT | STORED);
        let source_field = sb.add_text_field("source", STRING | STORED);
        (sb.build(), id_field, text_field, title_field, source_field)
    }

    /// Open the index under `dir`, creating it when missing.
    pub fn open(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create index directory {}", dir.display()))?;

        let (schema, id_field, text_field, title_field, source_field) = Self::build_schema();

        let mmap = tantivy::directory::MmapDirectory::open(dir)?;
        let index = if Index::exists(&mmap)? {
            Index::open_in_dir(dir).context("Failed to open corpus index")?
        } else {
            Index::create_in_dir(dir, schema).context("Failed to create corpus index")?
        };

        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::OnCommitWithDelay)
            .try_into()
            .context("Failed to create Tantivy reader")?;

        tracing::debug!(dir = %dir.display(), "Opened corpus index");

        Ok(Self {
            index,
            reader,
            writer: parking_lot::Mutex::new(None),
            id_field,
            text_field,
            title_field,
            source_field,
        })
    }

    fn with_writer<T>(&self, f: impl FnOnce(&mut IndexWriter) -> Result<T>) -> Result<T> {
        let mut guard = self.writer.lock();
        if guard.is_none() {
            let writer = self
                .index
                .writer(50_000_000)
                .context("Failed to create Tantivy writer (is another indexer running?)")?;
            *guard = Some(writer);
        }
        let writer = guard.as_mut().context("Tantivy writer unavailable")?;
        f(writer)
    }

    pub fn add_passage(&self, passage: &Passage) -> Result<()> {
        self.with_writer(|writer| {
            writer.add_document(doc!(
                self.id_field => passage.id.as_str(),
                self.text_field => passage.text.as_str(),
                self.title_field => passage.title.as_str(),
                self.source_field => passage.source.as_str(),
            ))?;
            Ok(())
        })
    }

    /// Drop every passage that came from `source`. Takes effect on commit.
    pub fn delete_by_source(&self, source: &str) -> Result<()> {
        self.with_writer(|writer| {
            writer.delete_term(Term::from_field_text(self.source_field, source));
            Ok(())
        })
    }

    pub fn clear(&self) -> Result<()> {
        self.with_writer(|writer| {
            writer.delete_all_documents()?;
            writer.commit().context("Tantivy commit failed")?;
            Ok(())
        })?;
        self.reader.reload()?;
        Ok(())
    }

    pub fn commit(&self) -> Result<()> {
        self.with_writer(|writer| {
            writer.commit().context("Tantivy commit failed")?;
            Ok(())
        })?;
        self.reader.reload()?;
        Ok(())
    }

    pub fn num_passages(&self) -> u64 {
        self.reader.searcher().num_docs()
    }

    /// Top-`k` passages for a free-text query, best first.
    pub fn search(&self, query: &str, k: usize) -> Result<Vec<SearchHit>> {
        if query.trim().is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let searcher = self.reader.searcher();
        let query_parser =
            QueryParser::for_index(&self.index, vec![self.text_field, self.title_field]);

        // Questions carry punctuation the query grammar rejects; retry on the bare terms.
        let parsed_query = match query_parser.parse_query(query) {
            Ok(q) => q,
            Err(_) => {
                let sanitized: String = query
                    .chars()
                    .map(|c| if c.is_alphanumeric() { c } else { ' ' })
                    .collect();
                if sanitized.trim().is_empty() {
                    return Ok(Vec::new());
                }
                query_parser
                    .parse_query(&sanitized)
                    .context("Failed to parse corpus query")?
            }
        };

        let top_docs = searcher.search(&parsed_query, &TopDocs::with_limit(k))?;

        let mut hits = Vec::with_capacity(top_docs.len());
        for (score, doc_address) in top_docs {
            let doc = searcher.doc::<TantivyDocument>(doc_address)?;
            let field = |f: schema::Field| {
                doc.get_first(f)
                    .and_then(|v| v.as_str())
                    .unwrap_or("")
                    .to_string()
            };
            hits.push(SearchHit {
                score,
                passage: Passage {
                    id: field(self.id_field),
                    text: field(self.text_field),
                    title: field(self.title_field),
                    source: field(self.source_field),
                },
            });
        }

        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn passage(id: &str, text: &str, source: &str) -> Passage {
        Passage {
            id: id.to_string(),
            text: text.to_string(),
            title: format!("Title {}", id),
            source: source.to_string(),
        }
    }

    fn seeded(dir: &Path) -> CorpusIndex {
        let index = CorpusIndex::open(dir).unwrap();
        index
            .add_passage(&passage(
                "deposit#0",
                "A landlord shall return the security deposit within 30 days after the tenant vacates.",
                "corpus/deposit.txt",
            ))
            .unwrap();
        index
            .add_passage(&passage(
                "eviction#0",
                "An eviction notice for nonpayment of rent must give the tenant 5 days to pay.",
                "corpus/eviction.txt",
            ))
            .unwrap();
        index.commit().unwrap();
        index
    }

    #[test]
    fn test_search_ranks_matching_passage_first() {
        let dir = tempfile::tempdir().unwrap();
        let index = seeded(dir.path());
        assert_eq!(index.num_passages(), 2);

        let hits = index.search("security deposit", 5).unwrap();
        assert!(!hits.is_empty());
        assert_eq!(hits[0].passage.id, "deposit#0");
        assert_eq!(hits[0].passage.source, "corpus/deposit.txt");
        assert_eq!(hits[0].passage.title, "Title deposit#0");
    }

    #[test]
    fn test_search_survives_query_syntax_errors() {
        let dir = tempfile::tempdir().unwrap();
        let index = seeded(dir.path());
        let hits = index
            .search("How long (in days) does a landlord have to return a \"deposit?", 5)
            .unwrap();
        assert!(hits.iter().any(|h| h.passage.id == "deposit#0"));
        assert!(index.search("   ", 5).unwrap().is_empty());
    }

    #[test]
    fn test_search_respects_k_and_is_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        let index = seeded(dir.path());
        let first = index.search("tenant", 1).unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(index.search("tenant", 1).unwrap(), first);
        assert!(index.search("tenant", 0).unwrap().is_empty());
    }

    #[test]
    fn test_delete_by_source_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let index = seeded(dir.path());
        index.delete_by_source("corpus/eviction.txt").unwrap();
        index.commit().unwrap();
        assert_eq!(index.num_passages(), 1);
        assert!(index.search("eviction", 5).unwrap().is_empty());

        index.clear().unwrap();
        assert_eq!(index.num_passages(), 0);
    }

    #[test]
    fn test_reopen_keeps_committed_passages() {
        let dir = tempfile::tempdir().unwrap();
        {
            seeded(dir.path());
        }
        let reopened = CorpusIndex::open(dir.path()).unwrap();
        assert_eq!(reopened.num_passages(), 2);
    }

    #[test]
    fn test_searching_does_not_lock_out_indexer() {
        let dir = tempfile::tempdir().unwrap();
        {
            seeded(dir.path());
        }
        let searcher = CorpusIndex::open(dir.path()).unwrap();
        assert!(!searcher.search("deposit", 5).unwrap().is_empty());

        let indexer = CorpusIndex::open(dir.path()).unwrap();
        indexer
            .add_passage(&passage("lease#0", "A written lease must be signed.", "corpus/lease.txt"))
            .unwrap();
        indexer.commit().unwrap();
        assert_eq!(indexer.num_passages(), 3);
    }
}
