pub mod annotation;
pub mod annotation_set;
pub mod ordering_guard;
pub mod transcript_aligner;
pub mod word_editor;
