//! Model Repository (C6, §4.6): the catalog of locally materialized models.

mod repository;

pub use repository::ModelRepository;
