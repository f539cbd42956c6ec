mod status;

pub use status::Status;

use crate::mode::Format;
use crate::types::{AttrValue, NcType};
use crate::vfs::VirtualFs;

use std::path::Path;
use std::sync::Arc;

/// Resource identifier of an open dataset.
pub type NcId = i32;
/// Dimension identifier assigned by the engine. Stable for the life of a dataset.
pub type DimId = i32;
/// Variable identifier assigned by the engine. Stable for the life of a dataset.
pub type VarId = i32;

/// Pseudo variable id addressing dataset-level (global) attributes.
pub const NC_GLOBAL: VarId = -1;

pub type EngineResult<T> = std::result::Result<T, Status>;

/// Definition of a variable as reported by the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct VarInfo {
    pub name: String,
    pub nc_type: NcType,
    pub dimids: Vec<DimId>,
}

/// The binary-format reader/writer that dataset handles delegate to.
///
/// Every call either succeeds or returns the engine's numeric [`Status`].
/// Engines are not assumed to be reentrant; a session serializes access.
pub trait FormatEngine: Send + 'static {
    /// The name of the engine.
    const NAME: &'static str;

    /// Create a dataset at `path`. With `clobber == false` an existing file is an error.
    fn create(&mut self, path: &Path, clobber: bool, format: Format) -> EngineResult<NcId>;

    /// Open an existing dataset.
    fn open(&mut self, path: &Path, write: bool) -> EngineResult<NcId>;

    /// Flush and release the dataset. The id is invalid afterwards, whatever the outcome.
    fn close(&mut self, ncid: NcId) -> EngineResult<()>;

    /// Flush the dataset's current state to its file.
    fn sync(&mut self, ncid: NcId) -> EngineResult<()>;

    /// Enable or disable pre-filling of unwritten data.
    fn set_fill(&mut self, ncid: NcId, fill: bool) -> EngineResult<()>;

    fn inq_format(&self, ncid: NcId) -> EngineResult<Format>;

    /// Define a dimension. A length of 0 defines the unlimited dimension.
    fn def_dim(&mut self, ncid: NcId, name: &str, len: usize) -> EngineResult<DimId>;

    fn inq_dimids(&self, ncid: NcId) -> EngineResult<Vec<DimId>>;

    /// Name and current length of a dimension.
    fn inq_dim(&self, ncid: NcId, dimid: DimId) -> EngineResult<(String, usize)>;

    fn inq_unlimdim(&self, ncid: NcId) -> EngineResult<Option<DimId>>;

    fn def_var(
        &mut self,
        ncid: NcId,
        name: &str,
        nc_type: NcType,
        dimids: &[DimId],
    ) -> EngineResult<VarId>;

    fn inq_varids(&self, ncid: NcId) -> EngineResult<Vec<VarId>>;

    fn inq_var(&self, ncid: NcId, varid: VarId) -> EngineResult<VarInfo>;

    /// Write a whole variable from doubles, converting to the stored type.
    fn put_var_f64(&mut self, ncid: NcId, varid: VarId, data: &[f64]) -> EngineResult<()>;

    /// Read the first `count` elements of a variable as doubles.
    fn get_var_f64(&self, ncid: NcId, varid: VarId, count: usize) -> EngineResult<Vec<f64>>;

    fn put_var_f32(&mut self, ncid: NcId, varid: VarId, data: &[f32]) -> EngineResult<()>;

    fn get_var_f32(&self, ncid: NcId, varid: VarId, count: usize) -> EngineResult<Vec<f32>>;

    /// Write an attribute, replacing any existing one. `varid` may be [`NC_GLOBAL`].
    fn put_att(&mut self, ncid: NcId, varid: VarId, name: &str, value: &AttrValue)
        -> EngineResult<()>;

    fn get_att(&self, ncid: NcId, varid: VarId, name: &str) -> EngineResult<AttrValue>;

    /// Attribute names in definition order.
    fn inq_attnames(&self, ncid: NcId, varid: VarId) -> EngineResult<Vec<String>>;

    /// The filesystem this engine resolves paths through, if the runtime exposes it.
    fn vfs(&self) -> Option<Arc<dyn VirtualFs>>;
}
