use crate::format;
use crate::model::{Dim, Model, Values, Var};

use indexmap::IndexMap;
use log::debug;
use ncdataset::{
    AttrValue, DimId, EngineResult, Format, FormatEngine, MemoryFs, NcId, NcType, Status, VarId,
    VarInfo, VirtualFs, NC_GLOBAL,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const MAX_NAME: usize = 256;
const FIRST_NCID: NcId = 1 << 16;

struct OpenFile {
    path: PathBuf,
    writable: bool,
    fill: bool,
    dirty: bool,
    model: Model,
}

impl OpenFile {
    fn writable(&mut self) -> EngineResult<&mut Model> {
        if self.writable {
            self.dirty = true;
            Ok(&mut self.model)
        } else {
            Err(Status::EPERM)
        }
    }
}

/// Format engine for the classic and 64-bit offset containers.
///
/// Files are read whole on open and written back on `sync` and `close`.
/// Define and data mode are not distinguished: definitions may follow data
/// writes.
pub struct ClassicEngine {
    fs: Arc<dyn VirtualFs>,
    files: HashMap<NcId, OpenFile>,
    next_ncid: NcId,
}

impl ClassicEngine {
    pub fn new(fs: Arc<dyn VirtualFs>) -> Self {
        ClassicEngine {
            fs,
            files: HashMap::new(),
            next_ncid: FIRST_NCID,
        }
    }

    /// An engine over a fresh [`MemoryFs`].
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryFs::new()))
    }

    /// Number of datasets currently open.
    pub fn open_count(&self) -> usize {
        self.files.len()
    }

    fn insert(&mut self, file: OpenFile) -> NcId {
        let ncid = self.next_ncid;
        self.next_ncid += 1;
        self.files.insert(ncid, file);
        ncid
    }

    fn file(&self, ncid: NcId) -> EngineResult<&OpenFile> {
        self.files.get(&ncid).ok_or(Status::EBADID)
    }

    fn file_mut(&mut self, ncid: NcId) -> EngineResult<&mut OpenFile> {
        self.files.get_mut(&ncid).ok_or(Status::EBADID)
    }

    fn flush(&self, file: &OpenFile) -> EngineResult<()> {
        let bytes = format::encode(&file.model).map_err(|e| {
            debug!("Cannot encode '{}': {:#}", file.path.display(), e);
            Status::EVARSIZE
        })?;
        self.fs
            .write(&file.path, &bytes)
            .map_err(|e| Status::from_io(&e))?;
        debug!("Wrote {} bytes to '{}'", bytes.len(), file.path.display());
        Ok(())
    }
}

fn check_name(name: &str) -> EngineResult<()> {
    let first_ok = name
        .chars()
        .next()
        .map_or(false, |c| c.is_alphanumeric() || c == '_');
    if !first_ok || name.contains('/') || name.ends_with(char::is_whitespace) {
        Err(Status::EBADNAME)
    } else if name.len() > MAX_NAME {
        Err(Status::EMAXNAME)
    } else {
        Ok(())
    }
}

fn var(model: &Model, varid: VarId) -> EngineResult<&Var> {
    model.var(varid).ok_or(Status::ENOTVAR)
}

fn attrs(model: &Model, varid: VarId) -> EngineResult<&IndexMap<String, AttrValue>> {
    if varid == NC_GLOBAL {
        Ok(&model.attrs)
    } else {
        var(model, varid).map(|v| &v.attrs)
    }
}

/// Write `data` over a whole variable. Record variables take as many
/// records as `data` holds and grow the record count if needed.
fn put_var(model: &mut Model, varid: VarId, data: &[f64], fill: bool) -> EngineResult<()> {
    let v = var(model, varid)?;
    if v.nc_type == NcType::Char {
        return Err(Status::ECHAR);
    }
    if model.is_record_var(v) {
        let slab = model.slab_len(v);
        if slab == 0 {
            return if data.is_empty() { Ok(()) } else { Err(Status::EEDGE) };
        }
        if data.len() % slab != 0 {
            return Err(Status::EEDGE);
        }
        model.numrecs = model.numrecs.max(data.len() / slab);
        model.conform(fill);
    } else if data.len() != model.var_len(v) {
        return Err(Status::EEDGE);
    }
    let v = model.var_mut(varid).ok_or(Status::ENOTVAR)?;
    v.data.overwrite_f64(data);
    Ok(())
}

fn get_var(model: &Model, varid: VarId, count: usize) -> EngineResult<Vec<f64>> {
    let v = var(model, varid)?;
    if count > model.var_len(v) {
        return Err(Status::EEDGE);
    }
    v.data.head_f64(count).ok_or(Status::ECHAR)
}

impl FormatEngine for ClassicEngine {
    const NAME: &'static str = "classic";

    fn create(&mut self, path: &Path, clobber: bool, format: Format) -> EngineResult<NcId> {
        if format == Format::Netcdf4 {
            return Err(Status::ENOTBUILT);
        }
        if !clobber && self.fs.exists(path) {
            return Err(Status::EEXIST);
        }
        let file = OpenFile {
            path: path.to_path_buf(),
            writable: true,
            fill: true,
            dirty: false,
            model: Model::new(format),
        };
        self.flush(&file)?;
        let ncid = self.insert(file);
        debug!("Created '{}' ({}) as {}", path.display(), format, ncid);
        Ok(ncid)
    }

    fn open(&mut self, path: &Path, write: bool) -> EngineResult<NcId> {
        let bytes = self.fs.read(path).map_err(|e| Status::from_io(&e))?;
        let model = format::decode(&bytes).map_err(|e| {
            debug!("Cannot decode '{}': {:#}", path.display(), e);
            if format::is_hdf5(&bytes) {
                Status::ENOTBUILT
            } else {
                Status::ENOTNC
            }
        })?;
        let ncid = self.insert(OpenFile {
            path: path.to_path_buf(),
            writable: write,
            fill: true,
            dirty: false,
            model,
        });
        debug!("Opened '{}' as {}", path.display(), ncid);
        Ok(ncid)
    }

    fn close(&mut self, ncid: NcId) -> EngineResult<()> {
        let file = self.files.remove(&ncid).ok_or(Status::EBADID)?;
        if file.writable && file.dirty {
            self.flush(&file)?;
        }
        Ok(())
    }

    fn sync(&mut self, ncid: NcId) -> EngineResult<()> {
        let file = self.file(ncid)?;
        if file.writable && file.dirty {
            self.flush(file)?;
            self.file_mut(ncid)?.dirty = false;
        }
        Ok(())
    }

    fn set_fill(&mut self, ncid: NcId, fill: bool) -> EngineResult<()> {
        let file = self.file_mut(ncid)?;
        if !file.writable {
            return Err(Status::EPERM);
        }
        file.fill = fill;
        Ok(())
    }

    fn inq_format(&self, ncid: NcId) -> EngineResult<Format> {
        Ok(self.file(ncid)?.model.format)
    }

    fn def_dim(&mut self, ncid: NcId, name: &str, len: usize) -> EngineResult<DimId> {
        check_name(name)?;
        let model = self.file_mut(ncid)?.writable()?;
        if model.dims.iter().any(|d| d.name == name) {
            return Err(Status::ENAMEINUSE);
        }
        if len > u32::MAX as usize {
            return Err(Status::EDIMSIZE);
        }
        if len == 0 && model.unlimdim().is_some() {
            return Err(Status::EUNLIMIT);
        }
        model.dims.push(Dim {
            name: name.to_string(),
            len,
        });
        Ok((model.dims.len() - 1) as DimId)
    }

    fn inq_dimids(&self, ncid: NcId) -> EngineResult<Vec<DimId>> {
        let model = &self.file(ncid)?.model;
        Ok((0..model.dims.len() as DimId).collect())
    }

    fn inq_dim(&self, ncid: NcId, dimid: DimId) -> EngineResult<(String, usize)> {
        let model = &self.file(ncid)?.model;
        let dim = model.dim(dimid).ok_or(Status::EBADDIM)?;
        let len = model.dim_len(dimid).ok_or(Status::EBADDIM)?;
        Ok((dim.name.clone(), len))
    }

    fn inq_unlimdim(&self, ncid: NcId) -> EngineResult<Option<DimId>> {
        Ok(self.file(ncid)?.model.unlimdim())
    }

    fn def_var(
        &mut self,
        ncid: NcId,
        name: &str,
        nc_type: NcType,
        dimids: &[DimId],
    ) -> EngineResult<VarId> {
        check_name(name)?;
        let file = self.file_mut(ncid)?;
        let fill = file.fill;
        let model = file.writable()?;
        if model.vars.iter().any(|v| v.name == name) {
            return Err(Status::ENAMEINUSE);
        }
        if dimids.iter().any(|id| model.dim(*id).is_none()) {
            return Err(Status::EBADDIM);
        }
        if let Some(unlim) = model.unlimdim() {
            if dimids.iter().skip(1).any(|id| *id == unlim) {
                return Err(Status::EUNLIMPOS);
            }
        }
        let var = Var {
            name: name.to_string(),
            nc_type,
            dimids: dimids.to_vec(),
            attrs: IndexMap::new(),
            data: Values::empty(nc_type),
        };
        // a slab must be describable by the header's 32-bit size field
        match model.slab_bytes(&var) {
            Some(n) if n <= u32::MAX as usize => {}
            _ => return Err(Status::EVARSIZE),
        }
        model.vars.push(var);
        model.conform(fill);
        Ok((model.vars.len() - 1) as VarId)
    }

    fn inq_varids(&self, ncid: NcId) -> EngineResult<Vec<VarId>> {
        let model = &self.file(ncid)?.model;
        Ok((0..model.vars.len() as VarId).collect())
    }

    fn inq_var(&self, ncid: NcId, varid: VarId) -> EngineResult<VarInfo> {
        let v = var(&self.file(ncid)?.model, varid)?;
        Ok(VarInfo {
            name: v.name.clone(),
            nc_type: v.nc_type,
            dimids: v.dimids.clone(),
        })
    }

    fn put_var_f64(&mut self, ncid: NcId, varid: VarId, data: &[f64]) -> EngineResult<()> {
        let file = self.file_mut(ncid)?;
        let fill = file.fill;
        put_var(file.writable()?, varid, data, fill)
    }

    fn get_var_f64(&self, ncid: NcId, varid: VarId, count: usize) -> EngineResult<Vec<f64>> {
        get_var(&self.file(ncid)?.model, varid, count)
    }

    fn put_var_f32(&mut self, ncid: NcId, varid: VarId, data: &[f32]) -> EngineResult<()> {
        let data: Vec<f64> = data.iter().map(|&x| x as f64).collect();
        self.put_var_f64(ncid, varid, &data)
    }

    fn get_var_f32(&self, ncid: NcId, varid: VarId, count: usize) -> EngineResult<Vec<f32>> {
        self.get_var_f64(ncid, varid, count)
            .map(|v| v.into_iter().map(|x| x as f32).collect())
    }

    fn put_att(
        &mut self,
        ncid: NcId,
        varid: VarId,
        name: &str,
        value: &AttrValue,
    ) -> EngineResult<()> {
        check_name(name)?;
        let file = self.file_mut(ncid)?;
        let fill = file.fill;
        let model = file.writable()?;
        if varid == NC_GLOBAL {
            model.attrs.insert(name.to_string(), value.clone());
            return Ok(());
        }
        let v = model.var_mut(varid).ok_or(Status::ENOTVAR)?;
        if name != "_FillValue" {
            v.attrs.insert(name.to_string(), value.clone());
            return Ok(());
        }
        if value.nc_type() != v.nc_type {
            return Err(Status::EBADTYPE);
        }
        let old = v.fill_value();
        v.attrs.insert(name.to_string(), value.clone());
        if fill {
            // unwritten elements still hold the previous fill value
            let new = v.fill_value();
            v.data.refill(old, new);
        }
        Ok(())
    }

    fn get_att(&self, ncid: NcId, varid: VarId, name: &str) -> EngineResult<AttrValue> {
        attrs(&self.file(ncid)?.model, varid)?
            .get(name)
            .cloned()
            .ok_or(Status::ENOTATT)
    }

    fn inq_attnames(&self, ncid: NcId, varid: VarId) -> EngineResult<Vec<String>> {
        Ok(attrs(&self.file(ncid)?.model, varid)?.keys().cloned().collect())
    }

    fn vfs(&self) -> Option<Arc<dyn VirtualFs>> {
        Some(self.fs.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FILL_DOUBLE;

    fn engine() -> (ClassicEngine, MemoryFs) {
        let fs = MemoryFs::new();
        (ClassicEngine::new(Arc::new(fs.clone())), fs)
    }

    #[test]
    fn test_create_and_reopen() {
        let (mut engine, fs) = engine();
        let path = Path::new("/tmp/a.nc");
        let ncid = engine.create(path, true, Format::Classic).unwrap();
        assert!(fs.exists(path));
        let x = engine.def_dim(ncid, "x", 3).unwrap();
        let v = engine.def_var(ncid, "v", NcType::Double, &[x]).unwrap();
        assert_eq!(engine.get_var_f64(ncid, v, 3).unwrap(), vec![FILL_DOUBLE; 3]);
        engine.put_var_f64(ncid, v, &[1.0, 2.0, 3.0]).unwrap();
        engine
            .put_att(ncid, NC_GLOBAL, "title", &AttrValue::from("t"))
            .unwrap();
        engine.close(ncid).unwrap();
        assert_eq!(engine.close(ncid), Err(Status::EBADID));

        let ncid = engine.open(path, false).unwrap();
        assert_eq!(engine.inq_dim(ncid, 0).unwrap(), ("x".to_string(), 3));
        assert_eq!(engine.get_var_f64(ncid, 0, 3).unwrap(), vec![1.0, 2.0, 3.0]);
        assert_eq!(
            engine.get_att(ncid, NC_GLOBAL, "title").unwrap(),
            AttrValue::from("t")
        );
        assert_eq!(engine.def_dim(ncid, "y", 1), Err(Status::EPERM));
        assert_eq!(engine.put_var_f64(ncid, 0, &[0.0; 3]), Err(Status::EPERM));
        engine.close(ncid).unwrap();
        assert_eq!(engine.open_count(), 0);
    }

    #[test]
    fn test_create_errors() {
        let (mut engine, _) = engine();
        let path = Path::new("/tmp/a.nc");
        engine.create(path, true, Format::Classic).unwrap();
        assert_eq!(engine.create(path, false, Format::Classic), Err(Status::EEXIST));
        assert_eq!(
            engine.create(Path::new("/tmp/b.nc"), true, Format::Netcdf4),
            Err(Status::ENOTBUILT)
        );
        assert_eq!(
            engine.create(Path::new("/missing/dir/c.nc"), true, Format::Classic),
            Err(Status::ENOENT)
        );
        assert_eq!(engine.open(Path::new("/tmp/none.nc"), false), Err(Status::ENOENT));
    }

    #[test]
    fn test_open_foreign_bytes() {
        let (mut engine, fs) = engine();
        fs.mount(Path::new("/tmp/junk.nc"), b"definitely not netcdf").unwrap();
        assert_eq!(engine.open(Path::new("/tmp/junk.nc"), false), Err(Status::ENOTNC));
        fs.mount(Path::new("/tmp/h5.nc"), format::HDF5_MAGIC).unwrap();
        assert_eq!(engine.open(Path::new("/tmp/h5.nc"), false), Err(Status::ENOTBUILT));
    }

    #[test]
    fn test_definition_errors() {
        let (mut engine, _) = engine();
        let ncid = engine.create(Path::new("/tmp/a.nc"), true, Format::Offset64).unwrap();
        let t = engine.def_dim(ncid, "time", 0).unwrap();
        let x = engine.def_dim(ncid, "x", 2).unwrap();
        assert_eq!(engine.def_dim(ncid, "x", 4), Err(Status::ENAMEINUSE));
        assert_eq!(engine.def_dim(ncid, "t2", 0), Err(Status::EUNLIMIT));
        assert_eq!(engine.def_dim(ncid, "", 1), Err(Status::EBADNAME));
        assert_eq!(engine.def_dim(ncid, "a/b", 1), Err(Status::EBADNAME));
        assert_eq!(
            engine.def_dim(ncid, &"n".repeat(MAX_NAME + 1), 1),
            Err(Status::EMAXNAME)
        );
        assert_eq!(engine.def_dim(ncid + 1, "y", 1), Err(Status::EBADID));
        assert_eq!(engine.def_dim(ncid, "big", 1 << 32), Err(Status::EDIMSIZE));
        let max = engine.def_dim(ncid, "max", u32::MAX as usize).unwrap();
        assert_eq!(
            engine.def_var(ncid, "huge", NcType::Short, &[max, max, max]),
            Err(Status::EVARSIZE)
        );
        assert_eq!(
            engine.def_var(ncid, "wide", NcType::Double, &[max]),
            Err(Status::EVARSIZE)
        );

        assert_eq!(
            engine.def_var(ncid, "bad", NcType::Float, &[x, t]),
            Err(Status::EUNLIMPOS)
        );
        assert_eq!(
            engine.def_var(ncid, "bad", NcType::Float, &[x, 9]),
            Err(Status::EBADDIM)
        );
        let v = engine.def_var(ncid, "v", NcType::Float, &[t, x]).unwrap();
        assert_eq!(
            engine.def_var(ncid, "v", NcType::Float, &[x]),
            Err(Status::ENAMEINUSE)
        );
        assert_eq!(
            engine.put_att(ncid, v, "_FillValue", &AttrValue::Double(vec![0.0])),
            Err(Status::EBADTYPE)
        );
        assert_eq!(engine.get_att(ncid, v, "units"), Err(Status::ENOTATT));
        assert_eq!(engine.get_att(ncid, 5, "units"), Err(Status::ENOTVAR));
        assert_eq!(engine.inq_format(ncid), Ok(Format::Offset64));
    }

    #[test]
    fn test_record_writes() {
        let (mut engine, _) = engine();
        let ncid = engine.create(Path::new("/tmp/r.nc"), true, Format::Classic).unwrap();
        let t = engine.def_dim(ncid, "time", 0).unwrap();
        let x = engine.def_dim(ncid, "x", 2).unwrap();
        let a = engine.def_var(ncid, "a", NcType::Double, &[t, x]).unwrap();
        let b = engine.def_var(ncid, "b", NcType::Int, &[t]).unwrap();
        assert_eq!(engine.inq_dim(ncid, t).unwrap().1, 0);

        assert_eq!(engine.put_var_f64(ncid, a, &[1.0, 2.0, 3.0]), Err(Status::EEDGE));
        engine.put_var_f64(ncid, a, &[1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(engine.inq_dim(ncid, t).unwrap().1, 2);
        assert_eq!(engine.inq_unlimdim(ncid), Ok(Some(t)));
        // the other record variable grew with fill values
        assert_eq!(
            engine.get_var_f64(ncid, b, 2).unwrap(),
            vec![model_fill_int(); 2]
        );
        assert_eq!(engine.get_var_f64(ncid, a, 0).unwrap(), Vec::<f64>::new());
        assert_eq!(engine.get_var_f64(ncid, a, 5), Err(Status::EEDGE));
    }

    fn model_fill_int() -> f64 {
        crate::model::FILL_INT as f64
    }

    #[test]
    fn test_char_io_rejected() {
        let (mut engine, _) = engine();
        let ncid = engine.create(Path::new("/tmp/c.nc"), true, Format::Classic).unwrap();
        let x = engine.def_dim(ncid, "x", 1).unwrap();
        let c = engine.def_var(ncid, "c", NcType::Char, &[x]).unwrap();
        assert_eq!(engine.put_var_f64(ncid, c, &[1.0]), Err(Status::ECHAR));
        assert_eq!(engine.get_var_f64(ncid, c, 1), Err(Status::ECHAR));
    }

    #[test]
    fn test_sync_and_nofill() {
        let (mut engine, fs) = engine();
        let path = Path::new("/tmp/s.nc");
        let ncid = engine.create(path, true, Format::Classic).unwrap();
        engine.set_fill(ncid, false).unwrap();
        let x = engine.def_dim(ncid, "x", 2).unwrap();
        let v = engine.def_var(ncid, "v", NcType::Short, &[x]).unwrap();
        assert_eq!(engine.get_var_f64(ncid, v, 2).unwrap(), vec![0.0, 0.0]);
        let before = fs.read(path).unwrap();
        engine.sync(ncid).unwrap();
        let after = fs.read(path).unwrap();
        assert!(after.len() > before.len());
        assert_eq!(format::decode(&after).unwrap().vars.len(), 1);
    }
}
