// SPDX-License-Identifier: MIT OR Apache-2.0

//! Query module - keyword index and the search engine

pub mod keyword;
pub mod search;

pub use keyword::{tokenize, KeywordHit, KeywordIndex};
pub use search::{SearchEngine, SearchOptions, SearchResponse, SearchResult};
