pub mod record_mapper;
pub mod summary_mapper;
