// SPDX-License-Identifier: MIT OR Apache-2.0

//! Language detection and lightweight structural parsing for chunking

pub mod languages;
pub mod units;

pub use languages::{detect_language, LANGUAGES};
pub use units::{Unit, UnitExtractor, UnitKind};
