//! GST period summaries and return filing

pub mod filing;
pub mod summary;

pub use filing::*;
pub use summary::*;
