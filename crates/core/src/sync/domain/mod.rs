pub mod annotation_store;
pub mod notice;
pub mod view_config;
