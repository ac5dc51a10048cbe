pub mod corpus_index;
pub mod web;

pub use corpus_index::{CorpusIndex, Passage, SearchHit};
pub use web::{SerpApiSearch, WebResult, WebSearch};
