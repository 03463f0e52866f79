mod annotations;
mod common;
mod tags;

pub use annotations::PostgresAnnotationRepo;
pub use tags::PostgresTagRepo;
