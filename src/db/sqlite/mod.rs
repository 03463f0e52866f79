mod annotations;
mod common;
mod tags;

pub use annotations::SqliteAnnotationRepo;
pub use tags::SqliteTagRepo;
