pub mod accounts;
pub mod connections;
pub mod media;
pub mod posts;
pub mod workspace;
