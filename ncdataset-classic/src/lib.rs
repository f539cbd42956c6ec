mod engine;
mod format;
mod model;

pub use engine::{ClassicEngine, MAX_NAME};

/// A session over the classic format engine.
pub type ClassicNetCdf = ncdataset::NetCdf<ClassicEngine>;
