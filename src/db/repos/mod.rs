mod annotations;
mod tags;

pub use annotations::*;
pub use tags::*;

/// Default number of annotations returned by `find`.
pub const DEFAULT_FIND_LIMIT: i64 = 100;
