pub mod catalog;
pub mod domain;
pub mod infrastructure;
pub mod sync_engine;
