mod annotation;
mod tag;

pub use annotation::*;
pub use tag::*;
