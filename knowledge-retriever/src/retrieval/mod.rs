pub mod keyword_index;
pub mod scoring;
