mod dataset;
pub mod cache;
pub mod engine;
pub mod error;
pub mod mode;
pub mod types;
pub mod vfs;

pub use cache::{AttrScope, DimensionEntry, GroupEntry, MetadataCache, VariableEntry};
pub use dataset::{
    Dataset, DatasetState, Dimension, Download, Group, NetCdf, Variable, VariableOptions,
    DEFAULT_MIME_TYPE,
};
pub use engine::{DimId, EngineResult, FormatEngine, NcId, Status, VarId, VarInfo, NC_GLOBAL};
pub use error::{Error, ErrorKind, Result};
pub use mode::{AccessMode, EngineMode, Format, OpenOptions, Source, UnknownMode};
pub use types::{AttrValue, DimLen, NcType, UNLIMITED};
pub use vfs::{DiskFs, MemoryFs, VirtualFs};
