pub mod chunker;
pub mod corpus;

pub use chunker::{Chunk, TextChunker};
pub use corpus::{CorpusIndexer, IndexReport};
