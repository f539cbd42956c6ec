use crate::cache::{AttrScope, DimensionEntry, MetadataCache, VariableEntry};
use crate::engine::{DimId, EngineResult, FormatEngine, NcId, Status, VarId, NC_GLOBAL};
use crate::error::{Error, Result};
use crate::mode::{AccessMode, EngineMode, Format, OpenOptions, Source};
use crate::types::{AttrValue, DimLen, NcType, UNLIMITED};

use indexmap::IndexMap;
use itertools::Itertools;
use log::{debug, warn};
use ndarray::{ArrayD, IxDyn};
use parking_lot::{Mutex, MutexGuard};
use rand::{distributions::Alphanumeric, Rng};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

pub const DEFAULT_MIME_TYPE: &str = "application/x-netcdf";

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DatasetState {
    Unopened,
    Open,
    Closed,
}

impl std::fmt::Display for DatasetState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DatasetState::Unopened => write!(f, "unopened"),
            DatasetState::Open => write!(f, "open"),
            DatasetState::Closed => write!(f, "closed"),
        }
    }
}

/// Entry point owning a format engine. Cloning is cheap and every clone, and
/// every dataset opened from it, shares the same engine; calls into the
/// engine are serialized.
pub struct NetCdf<E: FormatEngine> {
    engine: Arc<Mutex<E>>,
}

impl<E: FormatEngine> Clone for NetCdf<E> {
    fn clone(&self) -> Self {
        NetCdf {
            engine: self.engine.clone(),
        }
    }
}

impl<E: FormatEngine> NetCdf<E> {
    pub fn new(engine: E) -> Self {
        NetCdf {
            engine: Arc::new(Mutex::new(engine)),
        }
    }

    /// Direct access to the engine. Holding the guard blocks every dataset
    /// opened from this session.
    pub fn engine(&self) -> MutexGuard<'_, E> {
        self.engine.lock()
    }

    pub fn open(&self, source: Source, mode: &str, options: OpenOptions) -> Result<Dataset<E>> {
        match source {
            Source::Path(path) => self.open_path(path, mode, options),
            Source::Bytes { bytes, filename } => {
                self.open_bytes(bytes, mode, options, filename.as_deref())
            }
        }
    }

    /// Open or create the dataset at `path`, as resolved by the engine's filesystem.
    pub fn open_path<P: AsRef<Path>>(
        &self,
        path: P,
        mode: &str,
        options: OpenOptions,
    ) -> Result<Dataset<E>> {
        let path = path.as_ref().to_path_buf();
        let mode = parse_mode("open_path", &path, mode)?;
        let mut dataset = Dataset::new(self.engine.clone(), path, mode, options, false);
        dataset.open()?;
        Ok(dataset)
    }

    /// Mount `bytes` into the engine's filesystem and open them as a dataset.
    ///
    /// The bytes are mounted under `filename`, relative to the mount
    /// directory, or under a synthesized unique name. A failed mount is
    /// logged and the open proceeds.
    pub fn open_bytes<B: Into<Vec<u8>>>(
        &self,
        bytes: B,
        mode: &str,
        options: OpenOptions,
        filename: Option<&str>,
    ) -> Result<Dataset<E>> {
        const OP: &str = "open_bytes";
        let bytes = bytes.into();
        let name = match filename {
            Some(f) => options.mount_dir.join(f),
            None => synthesize_name(&options.mount_dir),
        };
        let mode = parse_mode(OP, &name, mode)?;
        if bytes.is_empty() && !mode.creates() {
            return Err(Error::InvalidSource {
                op: OP,
                resource: name.display().to_string(),
                reason: format!("an empty buffer cannot be opened in mode '{}'", mode),
            });
        }

        self.mount(&name, &bytes);
        let mut dataset = Dataset::new(self.engine.clone(), name, mode, options, true);
        dataset.open()?;
        Ok(dataset)
    }

    fn mount(&self, name: &Path, bytes: &[u8]) {
        let fs = self.engine.lock().vfs();
        match fs {
            Some(fs) => match fs.mount(name, bytes) {
                Ok(()) => debug!("Mounted {} bytes at '{}'", bytes.len(), name.display()),
                Err(e) => warn!("Failed to mount '{}', continuing: {}", name.display(), e),
            },
            None => warn!(
                "The {} engine exposes no filesystem, '{}' was not mounted",
                E::NAME,
                name.display()
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Dimension {
    pub name: String,
    pub id: DimId,
    pub len: DimLen,
}

impl Dimension {
    pub fn is_unlimited(&self) -> bool {
        self.len.is_unlimited()
    }

    /// The declared size, or [`UNLIMITED`].
    pub fn size(&self) -> i64 {
        self.len.logical()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub name: String,
    pub id: VarId,
    pub nc_type: NcType,
    pub dimensions: Vec<String>,
    pub attributes: IndexMap<String, AttrValue>,
}

impl Variable {
    fn new(name: &str, entry: &VariableEntry) -> Self {
        Variable {
            name: name.to_string(),
            id: entry.id,
            nc_type: entry.nc_type,
            dimensions: entry.dims.to_vec(),
            attributes: entry.attrs.clone(),
        }
    }
}

/// Options applied when defining a variable.
#[derive(Debug, Clone, Default)]
pub struct VariableOptions {
    /// Written as a `_FillValue` attribute of the variable's own type.
    pub fill_value: Option<f64>,
}

/// A named namespace inside a dataset. Groups share the dataset's resource
/// identifier and their attributes live only in the metadata cache.
#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    pub name: String,
    pub ncid: NcId,
}

/// Exported bytes tagged with a MIME type.
#[derive(Debug, Clone, PartialEq)]
pub struct Download {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

/// A handle on one open dataset.
///
/// The handle mirrors structural definitions into a [`MetadataCache`] and
/// forwards everything else to the engine. Handles on distinct datasets can
/// be used from different threads; a single handle takes `&mut self` for
/// every mutating operation.
pub struct Dataset<E: FormatEngine> {
    engine: Arc<Mutex<E>>,
    path: PathBuf,
    mode: AccessMode,
    options: OpenOptions,
    state: DatasetState,
    ncid: Option<NcId>,
    from_memory: bool,
    cache: MetadataCache,
}

impl<E: FormatEngine> std::fmt::Debug for Dataset<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(self, f)
    }
}

impl<E: FormatEngine> std::fmt::Display for Dataset<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Dataset '{}' (mode '{}', {})",
            self.path.display(),
            self.mode,
            self.state
        )?;
        let dims = self
            .cache
            .dimensions()
            .map(|(name, d)| format!("{} = {}", name, d.len))
            .join(", ");
        if !dims.is_empty() {
            write!(f, "\n    dimensions: {}", dims)?;
        }
        let vars = self
            .cache
            .variables()
            .map(|(name, v)| format!("{} {}({})", v.nc_type, name, v.dims.iter().join(", ")))
            .join(", ");
        if !vars.is_empty() {
            write!(f, "\n    variables: {}", vars)?;
        }
        let groups = self.cache.group_names().join("', '");
        if !groups.is_empty() {
            write!(f, "\n    groups: '{}'", groups)?;
        }
        if let Some(attrs) = self.cache.attribute_names(AttrScope::Global) {
            if !attrs.is_empty() {
                write!(f, "\n    attributes: '{}'", attrs.join("', '"))?;
            }
        }
        Ok(())
    }
}

impl<E: FormatEngine> Dataset<E> {
    fn new(
        engine: Arc<Mutex<E>>,
        path: PathBuf,
        mode: AccessMode,
        options: OpenOptions,
        from_memory: bool,
    ) -> Self {
        Dataset {
            engine,
            path,
            mode,
            options,
            state: DatasetState::Unopened,
            ncid: None,
            from_memory,
            cache: MetadataCache::new(),
        }
    }

    fn open(&mut self) -> Result<()> {
        const OP: &str = "open";
        let handle = self.engine.clone();
        let mut engine = handle.lock();
        let ncid = match self.mode.engine_mode(self.options.format) {
            EngineMode::Create { clobber, format } => engine.create(&self.path, clobber, format),
            EngineMode::Open { write } => engine.open(&self.path, write),
        }
        .map_err(engine_error(OP, &self.path))?;
        self.ncid = Some(ncid);
        self.state = DatasetState::Open;

        if self.mode.creates() {
            if !self.options.fill {
                engine
                    .set_fill(ncid, false)
                    .map_err(engine_error(OP, &self.path))?;
            }
        } else {
            self.cache = read_metadata(&*engine, ncid).map_err(engine_error(OP, &self.path))?;
        }
        debug!(
            "Opened '{}' with mode '{}' as {} using the {} engine",
            self.path.display(),
            self.mode,
            ncid,
            E::NAME
        );
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mode(&self) -> AccessMode {
        self.mode
    }

    pub fn state(&self) -> DatasetState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == DatasetState::Open
    }

    /// Whether the dataset was opened from in-memory bytes.
    pub fn is_memory_backed(&self) -> bool {
        self.from_memory
    }

    /// The engine's resource identifier, while open.
    pub fn ncid(&self) -> Option<NcId> {
        self.ncid
    }

    pub fn cache(&self) -> &MetadataCache {
        &self.cache
    }

    /// The container format reported by the engine.
    pub fn format(&self) -> Result<Format> {
        const OP: &str = "format";
        let ncid = self.open_ncid(OP)?;
        self.engine
            .lock()
            .inq_format(ncid)
            .map_err(engine_error(OP, &self.path))
    }

    /// Define a dimension. `None` and `Some(UNLIMITED)` define an unlimited
    /// dimension, as does `Some(0)`, which the engine reserves for it.
    pub fn create_dimension(&mut self, name: &str, size: Option<i64>) -> Result<Dimension> {
        const OP: &str = "create_dimension";
        let ncid = self.open_ncid(OP)?;
        if self.cache.dimension(name).is_some() {
            return Err(Error::DuplicateName {
                op: OP,
                resource: self.resource(),
                name: name.to_string(),
            });
        }
        let len = match size {
            None | Some(UNLIMITED) | Some(0) => DimLen::Unlimited,
            Some(n) if n < 0 => {
                return Err(Error::InvalidSize {
                    op: OP,
                    resource: self.resource(),
                    name: name.to_string(),
                    size: n,
                })
            }
            Some(n) => DimLen::Fixed(n as usize),
        };

        let id = self
            .engine
            .lock()
            .def_dim(ncid, name, len.engine_len())
            .map_err(engine_error(OP, &self.path))?;
        self.cache.insert_dimension(name, DimensionEntry { id, len });
        Ok(Dimension {
            name: name.to_string(),
            id,
            len,
        })
    }

    /// Define a variable of type `type_name` (`f8`, `double`, `i4`, ...) over
    /// previously created dimensions.
    pub fn create_variable(
        &mut self,
        name: &str,
        type_name: &str,
        dimensions: &[&str],
        options: VariableOptions,
    ) -> Result<Variable> {
        const OP: &str = "create_variable";
        let ncid = self.open_ncid(OP)?;
        let nc_type = NcType::from_alias(type_name).ok_or_else(|| Error::UnsupportedType {
            op: OP,
            resource: self.resource(),
            name: name.to_string(),
            type_name: type_name.to_string(),
        })?;
        if self.cache.variable(name).is_some() {
            return Err(Error::DuplicateName {
                op: OP,
                resource: self.resource(),
                name: name.to_string(),
            });
        }
        let dimids = self
            .cache
            .resolve_dimids(dimensions)
            .map_err(|dimension| Error::UnknownDimension {
                op: OP,
                resource: self.resource(),
                variable: name.to_string(),
                dimension,
            })?;

        let mut engine = self.engine.lock();
        let id = engine
            .def_var(ncid, name, nc_type, &dimids)
            .map_err(engine_error(OP, &self.path))?;
        self.cache.insert_variable(
            name,
            VariableEntry {
                id,
                nc_type,
                dims: dimensions.iter().map(|d| d.to_string()).collect(),
                attrs: IndexMap::new(),
            },
        );

        if let Some(fill) = options.fill_value {
            let value = AttrValue::scalar_of(nc_type, fill).ok_or_else(|| {
                Error::UnsupportedType {
                    op: OP,
                    resource: self.path.display().to_string(),
                    name: format!("{}:_FillValue", name),
                    type_name: nc_type.to_string(),
                }
            })?;
            engine
                .put_att(ncid, id, "_FillValue", &value)
                .map_err(engine_error(OP, &self.path))?;
            self.cache
                .set_attribute(AttrScope::Variable(name), "_FillValue", value);
        }
        drop(engine);

        self.variable(name).ok_or_else(|| Error::UnknownVariable {
            op: OP,
            resource: self.resource(),
            name: name.to_string(),
        })
    }

    /// Read a whole variable. The element count is the product of the
    /// variable's dimension sizes; unlimited dimensions count as 0, so
    /// record variables read back empty.
    pub fn read_variable(&self, name: &str) -> Result<Vec<f64>> {
        const OP: &str = "read_variable";
        let ncid = self.open_ncid(OP)?;
        let entry = self.lookup_variable(OP, name)?;
        if !entry.nc_type.has_io_path() {
            return Err(self.no_io_path(OP, name, entry.nc_type));
        }
        let count = self.cache.element_count(name).unwrap_or(0);
        let engine = self.engine.lock();
        match entry.nc_type {
            NcType::Float => engine
                .get_var_f32(ncid, entry.id, count)
                .map(|v| v.into_iter().map(f64::from).collect()),
            _ => engine.get_var_f64(ncid, entry.id, count),
        }
        .map_err(engine_error(OP, &self.path))
    }

    /// [`Dataset::read_variable`] shaped by the variable's dimensions.
    pub fn read_variable_array(&self, name: &str) -> Result<ArrayD<f64>> {
        const OP: &str = "read_variable_array";
        let data = self.read_variable(name)?;
        let shape: Vec<usize> = self
            .cache
            .shape(name)
            .unwrap_or_default()
            .iter()
            .map(|d| d.readable_len())
            .collect();
        ArrayD::from_shape_vec(IxDyn(&shape), data).map_err(|_| Error::FormatEngine {
            op: OP,
            resource: self.resource(),
            status: Status::EEDGE,
        })
    }

    /// Write a whole variable, converting to the variable's element type.
    pub fn write_variable(&mut self, name: &str, data: &[f64]) -> Result<()> {
        const OP: &str = "write_variable";
        let ncid = self.open_ncid(OP)?;
        let entry = self.lookup_variable(OP, name)?;
        if !entry.nc_type.has_io_path() {
            return Err(self.no_io_path(OP, name, entry.nc_type));
        }
        let mut engine = self.engine.lock();
        match entry.nc_type {
            NcType::Float => {
                let data: Vec<f32> = data.iter().map(|&x| x as f32).collect();
                engine.put_var_f32(ncid, entry.id, &data)
            }
            _ => engine.put_var_f64(ncid, entry.id, data),
        }
        .map_err(engine_error(OP, &self.path))
    }

    pub fn dimension(&self, name: &str) -> Option<Dimension> {
        self.cache.dimension(name).map(|d| Dimension {
            name: name.to_string(),
            id: d.id,
            len: d.len,
        })
    }

    pub fn dimensions(&self) -> Vec<Dimension> {
        self.cache
            .dimensions()
            .map(|(name, d)| Dimension {
                name: name.clone(),
                id: d.id,
                len: d.len,
            })
            .collect()
    }

    pub fn variable(&self, name: &str) -> Option<Variable> {
        self.cache.variable(name).map(|v| Variable::new(name, v))
    }

    pub fn variables(&self) -> Vec<Variable> {
        self.cache
            .variables()
            .map(|(name, v)| Variable::new(name, v))
            .collect()
    }

    /// Set a dataset-level attribute.
    pub fn set_attribute<V: Into<AttrValue>>(&mut self, name: &str, value: V) -> Result<()> {
        const OP: &str = "set_attribute";
        let ncid = self.open_ncid(OP)?;
        let value = value.into();
        self.engine
            .lock()
            .put_att(ncid, NC_GLOBAL, name, &value)
            .map_err(engine_error(OP, &self.path))?;
        self.cache.set_attribute(AttrScope::Global, name, value);
        Ok(())
    }

    pub fn get_attribute(&self, name: &str) -> Option<&AttrValue> {
        self.cache.attribute(AttrScope::Global, name)
    }

    pub fn list_attributes(&self) -> Vec<String> {
        self.cache
            .attribute_names(AttrScope::Global)
            .unwrap_or_default()
    }

    pub fn set_variable_attribute<V: Into<AttrValue>>(
        &mut self,
        variable: &str,
        name: &str,
        value: V,
    ) -> Result<()> {
        const OP: &str = "set_variable_attribute";
        let ncid = self.open_ncid(OP)?;
        let varid = self.lookup_variable(OP, variable)?.id;
        let value = value.into();
        self.engine
            .lock()
            .put_att(ncid, varid, name, &value)
            .map_err(engine_error(OP, &self.path))?;
        self.cache
            .set_attribute(AttrScope::Variable(variable), name, value);
        Ok(())
    }

    pub fn get_variable_attribute(&self, variable: &str, name: &str) -> Option<&AttrValue> {
        self.cache.attribute(AttrScope::Variable(variable), name)
    }

    /// Attribute names of a variable, `None` if there is no such variable.
    pub fn list_variable_attributes(&self, variable: &str) -> Option<Vec<String>> {
        self.cache.attribute_names(AttrScope::Variable(variable))
    }

    pub fn create_group(&mut self, name: &str) -> Result<Group> {
        const OP: &str = "create_group";
        let ncid = self.open_ncid(OP)?;
        if !self.cache.insert_group(name) {
            return Err(Error::DuplicateName {
                op: OP,
                resource: self.resource(),
                name: name.to_string(),
            });
        }
        Ok(Group {
            name: name.to_string(),
            ncid,
        })
    }

    pub fn group(&self, name: &str) -> Option<Group> {
        match (self.cache.group(name), self.ncid) {
            (Some(_), Some(ncid)) => Some(Group {
                name: name.to_string(),
                ncid,
            }),
            _ => None,
        }
    }

    pub fn groups(&self) -> Vec<String> {
        self.cache.group_names().cloned().collect()
    }

    pub fn set_group_attribute<V: Into<AttrValue>>(
        &mut self,
        group: &str,
        name: &str,
        value: V,
    ) -> Result<()> {
        const OP: &str = "set_group_attribute";
        self.open_ncid(OP)?;
        if self
            .cache
            .set_attribute(AttrScope::Group(group), name, value.into())
        {
            Ok(())
        } else {
            Err(Error::UnknownGroup {
                op: OP,
                resource: self.resource(),
                name: group.to_string(),
            })
        }
    }

    pub fn get_group_attribute(&self, group: &str, name: &str) -> Option<&AttrValue> {
        self.cache.attribute(AttrScope::Group(group), name)
    }

    /// Flush the engine's state for this dataset to its file.
    pub fn sync(&mut self) -> Result<()> {
        const OP: &str = "sync";
        let ncid = self.open_ncid(OP)?;
        self.engine
            .lock()
            .sync(ncid)
            .map_err(engine_error(OP, &self.path))?;
        debug!("Synced '{}'", self.path.display());
        Ok(())
    }

    /// Close the dataset. Closing a handle that is not open does nothing.
    /// The handle is closed afterwards even if the engine reports an error.
    pub fn close(&mut self) -> Result<()> {
        const OP: &str = "close";
        if self.state != DatasetState::Open {
            return Ok(());
        }
        self.state = DatasetState::Closed;
        self.cache.clear();
        if let Some(ncid) = self.ncid.take() {
            self.engine
                .lock()
                .close(ncid)
                .map_err(engine_error(OP, &self.path))?;
            debug!("Closed '{}'", self.path.display());
        }
        Ok(())
    }

    /// Read the dataset's bytes back out of the engine's filesystem. Only
    /// datasets opened from bytes can be exported; an open, writable dataset
    /// is synced first.
    pub fn export_bytes(&self) -> Result<Vec<u8>> {
        const OP: &str = "export_bytes";
        let unavailable = |reason: String| Error::ExportUnavailable {
            op: OP,
            resource: self.resource(),
            reason,
        };
        if !self.from_memory {
            return Err(unavailable("the dataset was not opened from bytes".to_string()));
        }

        let mut engine = self.engine.lock();
        if let (DatasetState::Open, Some(ncid)) = (self.state, self.ncid) {
            if self.mode.is_writable() {
                engine.sync(ncid).map_err(engine_error(OP, &self.path))?;
            }
        }
        let fs = engine.vfs().ok_or_else(|| {
            unavailable(format!("the {} engine exposes no filesystem", E::NAME))
        })?;
        drop(engine);

        let bytes = fs.read(&self.path).map_err(|e| unavailable(e.to_string()))?;
        debug!("Exported {} bytes from '{}'", bytes.len(), self.path.display());
        Ok(bytes)
    }

    /// [`Dataset::export_bytes`] tagged with a MIME type,
    /// [`DEFAULT_MIME_TYPE`] if none is given.
    pub fn export_download(&self, mime_type: Option<&str>) -> Result<Download> {
        Ok(Download {
            bytes: self.export_bytes()?,
            mime_type: mime_type.unwrap_or(DEFAULT_MIME_TYPE).to_string(),
        })
    }

    fn open_ncid(&self, op: &'static str) -> Result<NcId> {
        match (self.state, self.ncid) {
            (DatasetState::Open, Some(ncid)) => Ok(ncid),
            _ => Err(Error::NotOpen {
                op,
                resource: self.resource(),
                state: self.state,
            }),
        }
    }

    fn lookup_variable(&self, op: &'static str, name: &str) -> Result<&VariableEntry> {
        self.cache.variable(name).ok_or_else(|| Error::UnknownVariable {
            op,
            resource: self.resource(),
            name: name.to_string(),
        })
    }

    fn no_io_path(&self, op: &'static str, name: &str, ty: NcType) -> Error {
        Error::UnsupportedType {
            op,
            resource: self.resource(),
            name: name.to_string(),
            type_name: ty.to_string(),
        }
    }

    fn resource(&self) -> String {
        self.path.display().to_string()
    }
}

impl<E: FormatEngine> Drop for Dataset<E> {
    fn drop(&mut self) {
        if self.state == DatasetState::Open {
            warn!("Dataset '{}' dropped while open, closing it", self.path.display());
            if let Err(e) = self.close() {
                warn!("{}", e);
            }
        }
    }
}

fn parse_mode(op: &'static str, path: &Path, mode: &str) -> Result<AccessMode> {
    mode.parse().map_err(|_| Error::UnsupportedMode {
        op,
        resource: path.display().to_string(),
        mode: mode.to_string(),
    })
}

fn engine_error<'a>(op: &'static str, path: &'a Path) -> impl Fn(Status) -> Error + 'a {
    move |status| Error::FormatEngine {
        op,
        resource: path.display().to_string(),
        status,
    }
}

/// Rebuild the metadata cache of an existing dataset from the engine.
fn read_metadata<E: FormatEngine>(engine: &E, ncid: NcId) -> EngineResult<MetadataCache> {
    let mut cache = MetadataCache::new();
    let unlimited = engine.inq_unlimdim(ncid)?;
    let mut dim_names: HashMap<DimId, String> = HashMap::new();
    for dimid in engine.inq_dimids(ncid)? {
        let (name, len) = engine.inq_dim(ncid, dimid)?;
        let len = if unlimited == Some(dimid) {
            DimLen::Unlimited
        } else {
            DimLen::Fixed(len)
        };
        cache.insert_dimension(&name, DimensionEntry { id: dimid, len });
        dim_names.insert(dimid, name);
    }

    for name in engine.inq_attnames(ncid, NC_GLOBAL)? {
        let value = engine.get_att(ncid, NC_GLOBAL, &name)?;
        cache.set_attribute(AttrScope::Global, &name, value);
    }

    for varid in engine.inq_varids(ncid)? {
        let info = engine.inq_var(ncid, varid)?;
        let dims = info
            .dimids
            .iter()
            .map(|id| dim_names.get(id).cloned().ok_or(Status::EBADDIM))
            .collect::<EngineResult<_>>()?;
        let mut attrs = IndexMap::new();
        for name in engine.inq_attnames(ncid, varid)? {
            let value = engine.get_att(ncid, varid, &name)?;
            attrs.insert(name, value);
        }
        cache.insert_variable(
            &info.name,
            VariableEntry {
                id: varid,
                nc_type: info.nc_type,
                dims,
                attrs,
            },
        );
    }
    Ok(cache)
}

fn synthesize_name(dir: &Path) -> PathBuf {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(9)
        .map(char::from)
        .collect::<String>()
        .to_lowercase();
    dir.join(format!("netcdf_{}_{}.nc", millis, suffix))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_synthesized_names_are_unique() {
        let dir = Path::new("/tmp");
        let names: HashSet<PathBuf> = (0..1000).map(|_| synthesize_name(dir)).collect();
        assert_eq!(names.len(), 1000);
        for name in names {
            assert_eq!(name.parent(), Some(dir));
            let file = name.file_name().unwrap().to_str().unwrap();
            assert!(file.starts_with("netcdf_"));
            assert!(file.ends_with(".nc"));
        }
    }

    #[test]
    fn test_parse_mode_error_context() {
        let err = parse_mode("open_path", Path::new("/data/x.nc"), "rw").unwrap_err();
        match err {
            Error::UnsupportedMode { op, resource, mode } => {
                assert_eq!(op, "open_path");
                assert_eq!(resource, "/data/x.nc");
                assert_eq!(mode, "rw");
            }
            e => panic!("unexpected error: {}", e),
        }
    }
}
