use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;
use walkdir::WalkDir;

use super::chunker::TextChunker;
use crate::search::{CorpusIndex, Passage};

const CORPUS_EXTENSIONS: &[&str] = &["txt", "md", "markdown"];

/// Outcome of one indexing pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IndexReport {
    pub files_indexed: usize,
    pub passages_indexed: usize,
    pub files_skipped: usize,
}

/// Loads a directory of statute and case files into a [`CorpusIndex`].
pub struct CorpusIndexer<'a> {
    index: &'a CorpusIndex,
    chunker: TextChunker,
}

impl<'a> CorpusIndexer<'a> {
    pub fn new(index: &'a CorpusIndex, chunker: TextChunker) -> Self {
        Self { index, chunker }
    }

    /// Index every `.txt`/`.md` file under `dir`. Files already in the index
    /// are replaced, so re-running on an unchanged corpus is idempotent.
    pub fn index_dir(&self, dir: &Path) -> Result<IndexReport> {
        if !dir.is_dir() {
            anyhow::bail!("Corpus directory {} does not exist", dir.display());
        }

        let mut report = IndexReport::default();
        let mut files: Vec<_> = WalkDir::new(dir)
            .follow_links(true)
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping unreadable corpus entry");
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .collect();
        files.sort();

        for path in files {
            let supported = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| CORPUS_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
                .unwrap_or(false);
            if !supported {
                report.files_skipped += 1;
                continue;
            }

            match self.index_file(&path) {
                Ok(passages) => {
                    report.files_indexed += 1;
                    report.passages_indexed += passages;
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Failed to index corpus file");
                    report.files_skipped += 1;
                }
            }
        }

        self.index.commit()?;
        tracing::info!(
            dir = %dir.display(),
            files = report.files_indexed,
            passages = report.passages_indexed,
            skipped = report.files_skipped,
            "Indexed legal corpus"
        );
        Ok(report)
    }

    /// Chunk and stage one file. Changes become visible on the next commit.
    pub fn index_file(&self, path: &Path) -> Result<usize> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let source = path.to_string_lossy().to_string();
        let title = path
            .file_stem()
            .map(|s| s.to_string_lossy().replace(['_', '-'], " "))
            .unwrap_or_else(|| source.clone());

        self.index.delete_by_source(&source)?;

        let chunks = self.chunker.chunk(&text);
        for chunk in &chunks {
            let passage_title = match &chunk.heading {
                Some(heading) if heading != &title => format!("{} - {}", title, heading),
                _ => title.clone(),
            };
            self.index.add_passage(&Passage {
                id: format!("{}#{}", source, chunk.index),
                text: chunk.text.clone(),
                title: passage_title,
                source: source.clone(),
            })?;
        }

        tracing::debug!(path = %path.display(), passages = chunks.len(), "Staged corpus file");
        Ok(chunks.len())
    }
}
