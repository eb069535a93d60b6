pub mod journal;
pub mod summary;
