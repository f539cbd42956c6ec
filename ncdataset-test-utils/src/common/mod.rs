use ncdataset::*;

use anyhow::Result;
use parking_lot::Mutex;
use proptest::prelude::*;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::tempdir;

pub fn with_tmp_dir<T, F: FnMut(PathBuf) -> T>(mut func: F) -> T {
    let dir = tempdir().unwrap();
    let path = dir.path().to_path_buf();
    func(path)
}

/// A session whose engine runs over a fresh in-memory filesystem.
pub fn memory_session<E, F>(engine_gen: &F) -> NetCdf<E>
where
    E: FormatEngine,
    F: Fn(Arc<dyn VirtualFs>) -> E,
{
    NetCdf::new(engine_gen(Arc::new(MemoryFs::new())))
}

/// A new, empty, bytes-backed dataset.
pub fn new_dataset<E: FormatEngine>(nc: &NetCdf<E>) -> Dataset<E> {
    nc.open_bytes(Vec::new(), "w", OpenOptions::default(), None)
        .unwrap()
}

/// Bytes of a small dataset: dimension `x` of length 5, an `f8` variable
/// `v` over it holding 1 to 5, and a `title` attribute.
pub fn sample_bytes<E: FormatEngine>(nc: &NetCdf<E>) -> Result<Vec<u8>> {
    let mut ds = nc.open_bytes(Vec::new(), "w", OpenOptions::default(), None)?;
    ds.create_dimension("x", Some(5))?;
    ds.create_variable("v", "f8", &["x"], VariableOptions::default())?;
    ds.write_variable("v", &[1.0, 2.0, 3.0, 4.0, 5.0])?;
    ds.set_attribute("title", "sample")?;
    ds.close()?;
    Ok(ds.export_bytes()?)
}

////////////////////////////////////////////////////////////////////////////////
/// Engine and filesystem doubles
////////////////////////////////////////////////////////////////////////////////

/// Names of the engine calls made, in order. Clones share the same log.
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<&'static str>>>);

impl CallLog {
    fn push(&self, call: &'static str) {
        self.0.lock().push(call);
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.0.lock().clone()
    }

    pub fn count(&self, call: &str) -> usize {
        self.0.lock().iter().filter(|c| **c == call).count()
    }

    pub fn is_empty(&self) -> bool {
        self.0.lock().is_empty()
    }
}

/// Forwards every call to an inner engine and records its name.
pub struct RecordingEngine<E> {
    inner: E,
    log: CallLog,
    expose_vfs: bool,
}

impl<E: FormatEngine> RecordingEngine<E> {
    pub fn new(inner: E) -> Self {
        Self {
            inner,
            log: CallLog::default(),
            expose_vfs: true,
        }
    }

    /// Like [`RecordingEngine::new`], but reports that no filesystem is
    /// exposed. The inner engine still uses its own.
    pub fn without_vfs(inner: E) -> Self {
        Self {
            expose_vfs: false,
            ..Self::new(inner)
        }
    }

    pub fn log(&self) -> CallLog {
        self.log.clone()
    }
}

impl<E: FormatEngine> FormatEngine for RecordingEngine<E> {
    const NAME: &'static str = "recording";

    fn create(&mut self, path: &Path, clobber: bool, format: Format) -> EngineResult<NcId> {
        self.log.push("create");
        self.inner.create(path, clobber, format)
    }

    fn open(&mut self, path: &Path, write: bool) -> EngineResult<NcId> {
        self.log.push("open");
        self.inner.open(path, write)
    }

    fn close(&mut self, ncid: NcId) -> EngineResult<()> {
        self.log.push("close");
        self.inner.close(ncid)
    }

    fn sync(&mut self, ncid: NcId) -> EngineResult<()> {
        self.log.push("sync");
        self.inner.sync(ncid)
    }

    fn set_fill(&mut self, ncid: NcId, fill: bool) -> EngineResult<()> {
        self.log.push("set_fill");
        self.inner.set_fill(ncid, fill)
    }

    fn inq_format(&self, ncid: NcId) -> EngineResult<Format> {
        self.log.push("inq_format");
        self.inner.inq_format(ncid)
    }

    fn def_dim(&mut self, ncid: NcId, name: &str, len: usize) -> EngineResult<DimId> {
        self.log.push("def_dim");
        self.inner.def_dim(ncid, name, len)
    }

    fn inq_dimids(&self, ncid: NcId) -> EngineResult<Vec<DimId>> {
        self.log.push("inq_dimids");
        self.inner.inq_dimids(ncid)
    }

    fn inq_dim(&self, ncid: NcId, dimid: DimId) -> EngineResult<(String, usize)> {
        self.log.push("inq_dim");
        self.inner.inq_dim(ncid, dimid)
    }

    fn inq_unlimdim(&self, ncid: NcId) -> EngineResult<Option<DimId>> {
        self.log.push("inq_unlimdim");
        self.inner.inq_unlimdim(ncid)
    }

    fn def_var(
        &mut self,
        ncid: NcId,
        name: &str,
        nc_type: NcType,
        dimids: &[DimId],
    ) -> EngineResult<VarId> {
        self.log.push("def_var");
        self.inner.def_var(ncid, name, nc_type, dimids)
    }

    fn inq_varids(&self, ncid: NcId) -> EngineResult<Vec<VarId>> {
        self.log.push("inq_varids");
        self.inner.inq_varids(ncid)
    }

    fn inq_var(&self, ncid: NcId, varid: VarId) -> EngineResult<VarInfo> {
        self.log.push("inq_var");
        self.inner.inq_var(ncid, varid)
    }

    fn put_var_f64(&mut self, ncid: NcId, varid: VarId, data: &[f64]) -> EngineResult<()> {
        self.log.push("put_var_f64");
        self.inner.put_var_f64(ncid, varid, data)
    }

    fn get_var_f64(&self, ncid: NcId, varid: VarId, count: usize) -> EngineResult<Vec<f64>> {
        self.log.push("get_var_f64");
        self.inner.get_var_f64(ncid, varid, count)
    }

    fn put_var_f32(&mut self, ncid: NcId, varid: VarId, data: &[f32]) -> EngineResult<()> {
        self.log.push("put_var_f32");
        self.inner.put_var_f32(ncid, varid, data)
    }

    fn get_var_f32(&self, ncid: NcId, varid: VarId, count: usize) -> EngineResult<Vec<f32>> {
        self.log.push("get_var_f32");
        self.inner.get_var_f32(ncid, varid, count)
    }

    fn put_att(
        &mut self,
        ncid: NcId,
        varid: VarId,
        name: &str,
        value: &AttrValue,
    ) -> EngineResult<()> {
        self.log.push("put_att");
        self.inner.put_att(ncid, varid, name, value)
    }

    fn get_att(&self, ncid: NcId, varid: VarId, name: &str) -> EngineResult<AttrValue> {
        self.log.push("get_att");
        self.inner.get_att(ncid, varid, name)
    }

    fn inq_attnames(&self, ncid: NcId, varid: VarId) -> EngineResult<Vec<String>> {
        self.log.push("inq_attnames");
        self.inner.inq_attnames(ncid, varid)
    }

    fn vfs(&self) -> Option<Arc<dyn VirtualFs>> {
        self.log.push("vfs");
        if self.expose_vfs {
            self.inner.vfs()
        } else {
            None
        }
    }
}

/// A filesystem whose `mount` always fails. Everything else is forwarded.
pub struct FailingMountFs<F> {
    inner: F,
}

impl<F: VirtualFs> FailingMountFs<F> {
    pub fn new(inner: F) -> Self {
        Self { inner }
    }
}

impl<F: VirtualFs> VirtualFs for FailingMountFs<F> {
    fn mount(&self, name: &Path, _bytes: &[u8]) -> io::Result<()> {
        Err(io::Error::new(
            io::ErrorKind::PermissionDenied,
            format!("mounting '{}' is disabled", name.display()),
        ))
    }

    fn read(&self, name: &Path) -> io::Result<Vec<u8>> {
        self.inner.read(name)
    }

    fn write(&self, name: &Path, bytes: &[u8]) -> io::Result<()> {
        self.inner.write(name, bytes)
    }

    fn exists(&self, name: &Path) -> bool {
        self.inner.exists(name)
    }
}

////////////////////////////////////////////////////////////////////////////////
/// Strategies
////////////////////////////////////////////////////////////////////////////////

/// Valid dimension, variable and attribute names.
pub fn name_strat() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,7}"
}

/// Distinctly named fixed-size dimensions.
pub fn dims_strat(max_dims: usize, max_len: usize) -> impl Strategy<Value = Vec<(String, usize)>> {
    proptest::collection::hash_set(name_strat(), 1..=max_dims)
        .prop_flat_map(move |names| {
            let n = names.len();
            (
                Just(names.into_iter().collect::<Vec<_>>()),
                proptest::collection::vec(1..=max_len, n),
            )
        })
        .prop_map(|(names, lens)| names.into_iter().zip(lens).collect::<Vec<_>>())
}

/// Dimensions together with a shuffled ordering of their names.
pub fn dims_order_strat(
    max_dims: usize,
    max_len: usize,
) -> impl Strategy<Value = (Vec<(String, usize)>, Vec<String>)> {
    dims_strat(max_dims, max_len).prop_flat_map(|dims| {
        let names: Vec<String> = dims.iter().map(|(name, _)| name.clone()).collect();
        (Just(dims), Just(names).prop_shuffle())
    })
}

pub fn attr_value_strat() -> impl Strategy<Value = AttrValue> {
    use proptest::collection::vec;
    prop_oneof![
        "[ -~]{1,16}".prop_map(AttrValue::Text),
        vec(any::<i8>(), 1..4).prop_map(AttrValue::Byte),
        vec(any::<i16>(), 1..4).prop_map(AttrValue::Short),
        vec(any::<i32>(), 1..4).prop_map(AttrValue::Int),
        vec(-1e6f32..1e6, 1..4).prop_map(AttrValue::Float),
        vec(-1e12f64..1e12, 1..4).prop_map(AttrValue::Double),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failing_mount_fs() {
        let fs = MemoryFs::new();
        let failing = FailingMountFs::new(fs.clone());
        let name = Path::new("/tmp/a.nc");
        assert_eq!(
            failing.mount(name, b"x").unwrap_err().kind(),
            io::ErrorKind::PermissionDenied
        );
        assert!(!fs.exists(name));
        failing.write(name, b"y").unwrap();
        assert_eq!(failing.read(name).unwrap(), b"y");
    }

    #[test]
    fn test_call_log() {
        let log = CallLog::default();
        let other = log.clone();
        assert!(other.is_empty());
        log.push("open");
        other.push("close");
        log.push("open");
        assert_eq!(log.calls(), vec!["open", "close", "open"]);
        assert_eq!(other.count("open"), 2);
        assert!(!other.is_empty());
    }
}
