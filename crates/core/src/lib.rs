pub mod annotation;
pub mod shared;
pub mod sync;
