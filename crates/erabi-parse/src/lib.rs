//! Release-title enrichment.
//!
//! Turns a raw release title such as
//! `[Nekomoe kissaten][Sousou no Frieren][05][1080p][CHS&JPN]` into the
//! structured tags the selector filters on. Parsing never fails: anything
//! that is not recognised is simply left absent.

pub mod elements;
pub mod keyword;
pub mod parser;
pub mod tokenizer;

pub use elements::{Elements, EpisodeSpan, Languages, SubtitleMarker};
pub use parser::parse;
