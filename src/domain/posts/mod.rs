pub mod models;
pub mod queries;

pub use models::{GroupStatus, PlatformPost, PostGroup, PostStatus, aggregate_status};
