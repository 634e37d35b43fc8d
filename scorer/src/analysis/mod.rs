pub mod aggregation;
pub mod combinations;
pub mod scoring;
pub mod summary;
