pub mod http_annotation_store;
pub mod view_query;
