//! Byte layout of the classic (`CDF\x01`) and 64-bit offset (`CDF\x02`)
//! containers.
//!
//! A file is a big-endian header followed by the data of every fixed-size
//! variable, each padded to 4 bytes, and then the records. A record holds
//! one slab of every record variable in definition order. When there is
//! exactly one record variable its slabs are not padded.

use crate::model::{Dim, Model, Values, Var};

use anyhow::{bail, ensure, Context, Result};
use byteorder::{BigEndian, ByteOrder};
use indexmap::IndexMap;
use ncdataset::{AttrValue, DimId, Format, NcType};

pub const MAGIC: &[u8; 3] = b"CDF";
pub const HDF5_MAGIC: &[u8; 8] = b"\x89HDF\r\n\x1a\n";

const NC_DIMENSION: u32 = 0x0A;
const NC_VARIABLE: u32 = 0x0B;
const NC_ATTRIBUTE: u32 = 0x0C;
const STREAMING: u32 = 0xFFFF_FFFF;

fn padding(n: usize) -> usize {
    (4 - n % 4) % 4
}

fn padded(n: usize) -> usize {
    n + padding(n)
}

fn version(format: Format) -> u8 {
    match format {
        Format::Offset64 => 2,
        _ => 1,
    }
}

/// Whether `bytes` start like an HDF5-based (NetCDF-4) file.
pub fn is_hdf5(bytes: &[u8]) -> bool {
    bytes.starts_with(HDF5_MAGIC)
}

/// Where each variable's data lives.
struct Layout {
    begins: Vec<u64>,
    vsizes: Vec<usize>,
    record_begin: usize,
    recsize: usize,
}

impl Layout {
    fn new(model: &Model, header_len: usize) -> Self {
        let vsizes: Vec<usize> = model
            .vars
            .iter()
            .map(|v| padded(model.slab_len(v) * v.nc_type.size()))
            .collect();
        let mut begins = vec![0u64; model.vars.len()];

        let mut offset = header_len;
        for (i, var) in model.vars.iter().enumerate() {
            if !model.is_record_var(var) {
                begins[i] = offset as u64;
                offset += vsizes[i];
            }
        }
        let record_begin = offset;

        let record_vars: Vec<usize> = (0..model.vars.len())
            .filter(|&i| model.is_record_var(&model.vars[i]))
            .collect();
        let mut within = 0;
        for &i in &record_vars {
            begins[i] = (record_begin + within) as u64;
            within += vsizes[i];
        }
        let recsize = match record_vars.as_slice() {
            [only] => {
                let var = &model.vars[*only];
                model.slab_len(var) * var.nc_type.size()
            }
            _ => within,
        };

        Layout {
            begins,
            vsizes,
            record_begin,
            recsize,
        }
    }
}

struct Writer {
    buf: Vec<u8>,
    offset_size: usize,
}

impl Writer {
    fn u32(&mut self, v: u32) {
        let mut b = [0u8; 4];
        BigEndian::write_u32(&mut b, v);
        self.buf.extend_from_slice(&b);
    }

    /// A count or length field. Fails if `n` needs more than 32 bits.
    fn count(&mut self, n: usize, what: &str) -> Result<()> {
        let v = u32::try_from(n)
            .with_context(|| format!("{} {} does not fit in a 32-bit header field", what, n))?;
        self.u32(v);
        Ok(())
    }

    fn offset(&mut self, v: u64) -> Result<()> {
        if self.offset_size == 8 {
            let mut b = [0u8; 8];
            BigEndian::write_u64(&mut b, v);
            self.buf.extend_from_slice(&b);
        } else {
            let v = u32::try_from(v)
                .with_context(|| format!("offset {} needs the 64-bit offset format", v))?;
            self.u32(v);
        }
        Ok(())
    }

    fn pad(&mut self) {
        let n = padding(self.buf.len());
        self.buf.resize(self.buf.len() + n, 0);
    }

    fn name(&mut self, name: &str) -> Result<()> {
        self.count(name.len(), "name length")?;
        self.buf.extend_from_slice(name.as_bytes());
        self.pad();
        Ok(())
    }

    fn list_tag(&mut self, tag: u32, len: usize) -> Result<()> {
        if len == 0 {
            self.u32(0);
            self.u32(0);
            Ok(())
        } else {
            self.u32(tag);
            self.count(len, "list length")
        }
    }

    fn attrs(&mut self, attrs: &IndexMap<String, AttrValue>) -> Result<()> {
        self.list_tag(NC_ATTRIBUTE, attrs.len())?;
        for (name, value) in attrs {
            self.name(name)?;
            self.u32(value.nc_type().code());
            self.count(value.len(), "attribute length")?;
            self.attr_values(value);
            self.pad();
        }
        Ok(())
    }

    fn attr_values(&mut self, value: &AttrValue) {
        let start = self.buf.len();
        self.buf
            .resize(start + value.len() * value.nc_type().size(), 0);
        let out = &mut self.buf[start..];
        match value {
            AttrValue::Text(s) => out.copy_from_slice(s.as_bytes()),
            AttrValue::Byte(xs) => out
                .iter_mut()
                .zip(xs)
                .for_each(|(o, &x)| *o = x as u8),
            AttrValue::Short(xs) => BigEndian::write_i16_into(xs, out),
            AttrValue::Int(xs) => BigEndian::write_i32_into(xs, out),
            AttrValue::Float(xs) => BigEndian::write_f32_into(xs, out),
            AttrValue::Double(xs) => BigEndian::write_f64_into(xs, out),
        }
    }

    /// Write elements `start..end` of `values`. Missing elements are left as zeros.
    fn values(&mut self, values: &Values, start: usize, end: usize) {
        let size = values.nc_type().size();
        let at = self.buf.len();
        self.buf.resize(at + (end - start) * size, 0);
        let out = &mut self.buf[at..];
        fn range<T>(xs: &[T], start: usize, end: usize) -> &[T] {
            let end = end.min(xs.len());
            &xs[start.min(end)..end]
        }
        match values {
            Values::Byte(xs) => {
                let xs = range(xs, start, end);
                out.iter_mut().zip(xs).for_each(|(o, &x)| *o = x as u8)
            }
            Values::Char(xs) => {
                let xs = range(xs, start, end);
                out[..xs.len()].copy_from_slice(xs)
            }
            Values::Short(xs) => {
                let xs = range(xs, start, end);
                BigEndian::write_i16_into(xs, &mut out[..xs.len() * 2])
            }
            Values::Int(xs) => {
                let xs = range(xs, start, end);
                BigEndian::write_i32_into(xs, &mut out[..xs.len() * 4])
            }
            Values::Float(xs) => {
                let xs = range(xs, start, end);
                BigEndian::write_f32_into(xs, &mut out[..xs.len() * 4])
            }
            Values::Double(xs) => {
                let xs = range(xs, start, end);
                BigEndian::write_f64_into(xs, &mut out[..xs.len() * 8])
            }
        }
    }

    fn header(&mut self, model: &Model, layout: Option<&Layout>) -> Result<()> {
        self.buf.extend_from_slice(MAGIC);
        self.buf.push(version(model.format));
        self.count(model.numrecs, "record count")?;

        self.list_tag(NC_DIMENSION, model.dims.len())?;
        for dim in &model.dims {
            self.name(&dim.name)?;
            self.count(dim.len, "dimension length")?;
        }

        self.attrs(&model.attrs)?;

        self.list_tag(NC_VARIABLE, model.vars.len())?;
        for (i, var) in model.vars.iter().enumerate() {
            self.name(&var.name)?;
            self.count(var.dimids.len(), "rank")?;
            for id in &var.dimids {
                self.u32(*id as u32);
            }
            self.attrs(&var.attrs)?;
            self.u32(var.nc_type.code());
            self.count(layout.map_or(0, |l| l.vsizes[i]), "variable size")?;
            self.offset(layout.map_or(0, |l| l.begins[i]))?;
        }
        Ok(())
    }
}

/// Serialize a dataset. Fails if a size or offset cannot be represented in
/// the model's format.
pub fn encode(model: &Model) -> Result<Vec<u8>> {
    let offset_size = if version(model.format) == 2 { 8 } else { 4 };
    let mut sizing = Writer {
        buf: Vec::new(),
        offset_size,
    };
    sizing.header(model, None)?;
    let layout = Layout::new(model, sizing.buf.len());

    let mut w = Writer {
        buf: Vec::with_capacity(layout.record_begin + model.numrecs * layout.recsize),
        offset_size,
    };
    w.header(model, Some(&layout))?;

    for (i, var) in model.vars.iter().enumerate() {
        if !model.is_record_var(var) {
            w.values(&var.data, 0, model.slab_len(var));
            w.buf.resize(layout.begins[i] as usize + layout.vsizes[i], 0);
        }
    }
    w.buf.resize(layout.record_begin, 0);

    for r in 0..model.numrecs {
        for (i, var) in model.vars.iter().enumerate() {
            if model.is_record_var(var) {
                let slab = model.slab_len(var);
                let at = layout.begins[i] as usize + r * layout.recsize;
                w.buf.resize(at, 0);
                w.values(&var.data, r * slab, (r + 1) * slab);
            }
        }
        w.buf.resize(layout.record_begin + (r + 1) * layout.recsize, 0);
    }
    Ok(w.buf)
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
    offset_size: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        ensure!(
            self.pos.checked_add(n).map_or(false, |end| end <= self.data.len()),
            "header truncated: needed {} bytes at offset {}, file has {}",
            n,
            self.pos,
            self.data.len()
        );
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn u32(&mut self) -> Result<u32> {
        Ok(BigEndian::read_u32(self.take(4)?))
    }

    fn offset(&mut self) -> Result<u64> {
        match self.offset_size {
            8 => Ok(BigEndian::read_u64(self.take(8)?)),
            _ => Ok(self.u32()? as u64),
        }
    }

    fn skip_padding(&mut self, n: usize) -> Result<()> {
        self.take(padding(n)).map(|_| ())
    }

    fn name(&mut self) -> Result<String> {
        let len = self.u32()? as usize;
        let bytes = self.take(len)?;
        let name = std::str::from_utf8(bytes)
            .with_context(|| format!("name at offset {} is not UTF-8", self.pos - len))?
            .to_string();
        self.skip_padding(len)?;
        Ok(name)
    }

    /// Read a list tag, returning the element count.
    fn list(&mut self, tag: u32) -> Result<usize> {
        let found = self.u32()?;
        let len = self.u32()? as usize;
        match found {
            0 => {
                ensure!(len == 0, "absent list with {} elements", len);
                Ok(0)
            }
            t if t == tag => Ok(len),
            t => bail!("expected list tag {:#x}, found {:#x}", tag, t),
        }
    }

    fn nc_type(&mut self) -> Result<NcType> {
        let code = self.u32()?;
        NcType::from_code(code).with_context(|| format!("unknown type code {}", code))
    }

    fn attrs(&mut self) -> Result<IndexMap<String, AttrValue>> {
        let n = self.list(NC_ATTRIBUTE)?;
        let mut attrs = IndexMap::new();
        for _ in 0..n {
            let name = self.name()?;
            let ty = self.nc_type()?;
            let len = self.u32()? as usize;
            let n = len
                .checked_mul(ty.size())
                .with_context(|| format!("attribute '{}' overflows", name))?;
            let bytes = self.take(n)?;
            self.skip_padding(bytes.len())?;
            attrs.insert(name, attr_value(ty, bytes));
        }
        Ok(attrs)
    }
}

fn attr_value(ty: NcType, bytes: &[u8]) -> AttrValue {
    match decode_values(ty, bytes) {
        Values::Char(xs) => AttrValue::Text(String::from_utf8_lossy(&xs).into_owned()),
        Values::Byte(xs) => AttrValue::Byte(xs),
        Values::Short(xs) => AttrValue::Short(xs),
        Values::Int(xs) => AttrValue::Int(xs),
        Values::Float(xs) => AttrValue::Float(xs),
        Values::Double(xs) => AttrValue::Double(xs),
    }
}

fn decode_values(ty: NcType, bytes: &[u8]) -> Values {
    let mut values = Values::empty(ty);
    extend_values(&mut values, bytes);
    values
}

fn extend_values(values: &mut Values, bytes: &[u8]) {
    match values {
        Values::Byte(xs) => xs.extend(bytes.iter().map(|&b| b as i8)),
        Values::Char(xs) => xs.extend_from_slice(bytes),
        Values::Short(xs) => xs.extend(bytes.chunks_exact(2).map(BigEndian::read_i16)),
        Values::Int(xs) => xs.extend(bytes.chunks_exact(4).map(BigEndian::read_i32)),
        Values::Float(xs) => xs.extend(bytes.chunks_exact(4).map(BigEndian::read_f32)),
        Values::Double(xs) => xs.extend(bytes.chunks_exact(8).map(BigEndian::read_f64)),
    }
}

fn data_slice<'a>(bytes: &'a [u8], at: usize, len: usize, var: &str) -> Result<&'a [u8]> {
    let end = at.checked_add(len);
    end.and_then(|end| bytes.get(at..end)).with_context(|| {
        format!(
            "data of '{}' at offset {} ({} bytes) lies beyond the end of the file ({} bytes)",
            var,
            at,
            len,
            bytes.len()
        )
    })
}

fn slab_bytes(model: &Model, var: &Var) -> Result<usize> {
    model
        .slab_bytes(var)
        .with_context(|| format!("shape of '{}' overflows", var.name))
}

/// Parse a dataset.
pub fn decode(bytes: &[u8]) -> Result<Model> {
    ensure!(
        bytes.len() >= 4 && bytes.starts_with(MAGIC),
        "not a classic netCDF file"
    );
    let format = match bytes[3] {
        1 => Format::Classic,
        2 => Format::Offset64,
        v => bail!("unsupported classic format version {}", v),
    };
    let mut r = Reader {
        data: bytes,
        pos: 4,
        offset_size: if format == Format::Offset64 { 8 } else { 4 },
    };
    let numrecs = r.u32()?;

    let mut model = Model::new(format);
    let ndims = r.list(NC_DIMENSION)?;
    for _ in 0..ndims {
        let name = r.name()?;
        let len = r.u32()? as usize;
        model.dims.push(Dim { name, len });
    }
    ensure!(
        model.dims.iter().filter(|d| d.len == 0).count() <= 1,
        "more than one unlimited dimension"
    );

    model.attrs = r.attrs()?;

    let nvars = r.list(NC_VARIABLE)?;
    let mut placement = Vec::new();
    for _ in 0..nvars {
        let name = r.name()?;
        let rank = r.u32()? as usize;
        let dimids = (0..rank)
            .map(|_| -> Result<DimId> {
                let id = r.u32()? as usize;
                ensure!(id < model.dims.len(), "variable '{}' uses undefined dimension {}", name, id);
                Ok(id as DimId)
            })
            .collect::<Result<Vec<_>>>()?;
        let attrs = r.attrs()?;
        let nc_type = r.nc_type()?;
        let vsize = r.u32()? as usize;
        let begin = r.offset()? as usize;
        placement.push((vsize, begin));
        model.vars.push(Var {
            name,
            nc_type,
            dimids,
            attrs,
            data: Values::empty(nc_type),
        });
    }

    let record_vars: Vec<usize> = (0..nvars)
        .filter(|&i| model.is_record_var(&model.vars[i]))
        .collect();
    let recsize = match record_vars.as_slice() {
        [only] => slab_bytes(&model, &model.vars[*only])?,
        vars => vars
            .iter()
            .try_fold(0usize, |acc, &i| acc.checked_add(placement[i].0))
            .context("record size overflows")?,
    };
    model.numrecs = if numrecs == STREAMING {
        let record_begin = record_vars.iter().map(|&i| placement[i].1).min();
        match (record_begin, recsize) {
            (Some(begin), size) if size > 0 => bytes.len().saturating_sub(begin) / size,
            _ => 0,
        }
    } else {
        numrecs as usize
    };

    let mut data = Vec::with_capacity(nvars);
    for (i, var) in model.vars.iter().enumerate() {
        let (_, begin) = placement[i];
        let slab = slab_bytes(&model, var)?;
        let mut values = Values::empty(var.nc_type);
        if model.is_record_var(var) {
            for rec in (0..model.numrecs).take_while(|_| slab > 0) {
                let at = rec
                    .checked_mul(recsize)
                    .and_then(|x| x.checked_add(begin))
                    .with_context(|| format!("record {} of '{}' overflows", rec, var.name))?;
                extend_values(&mut values, data_slice(bytes, at, slab, &var.name)?);
            }
        } else {
            extend_values(&mut values, data_slice(bytes, begin, slab, &var.name)?);
        }
        data.push(values);
    }
    for (var, values) in model.vars.iter_mut().zip(data) {
        var.data = values;
    }
    Ok(model)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn var(name: &str, nc_type: NcType, dimids: Vec<DimId>, data: Values) -> Var {
        Var {
            name: name.to_string(),
            nc_type,
            dimids,
            attrs: IndexMap::new(),
            data,
        }
    }

    #[test]
    fn test_empty_file() {
        let bytes = encode(&Model::new(Format::Classic)).unwrap();
        assert_eq!(
            bytes,
            [&b"CDF\x01"[..], &[0u8; 4][..], &[0u8; 24][..]].concat()
        );
        assert_eq!(decode(&bytes).unwrap(), Model::new(Format::Classic));

        let bytes = encode(&Model::new(Format::Offset64)).unwrap();
        assert_eq!(&bytes[..4], b"CDF\x02");
        assert_eq!(decode(&bytes).unwrap().format, Format::Offset64);
    }

    #[test]
    fn test_header_layout() {
        let mut model = Model::new(Format::Classic);
        model.dims.push(Dim { name: "x".into(), len: 2 });
        model.vars.push(var("v", NcType::Short, vec![0], Values::Short(vec![1, -2])));
        let bytes = encode(&model).unwrap();

        // magic, numrecs
        assert_eq!(&bytes[..8], b"CDF\x01\0\0\0\0");
        // dim list: tag, count, name "x" padded, length 2
        assert_eq!(BigEndian::read_u32(&bytes[8..]), NC_DIMENSION);
        assert_eq!(BigEndian::read_u32(&bytes[12..]), 1);
        assert_eq!(&bytes[16..24], b"\0\0\0\x01x\0\0\0");
        assert_eq!(BigEndian::read_u32(&bytes[24..]), 2);
        // short data padded to 4 bytes at the end of the file
        let n = bytes.len();
        assert_eq!(&bytes[n - 4..], &[0, 1, 0xff, 0xfe]);
        assert_eq!(decode(&bytes).unwrap(), model);
    }

    #[test]
    fn test_records() {
        let mut model = Model::new(Format::Offset64);
        model.dims.push(Dim { name: "time".into(), len: 0 });
        model.dims.push(Dim { name: "x".into(), len: 3 });
        model.numrecs = 2;
        model.vars.push(var("fixed", NcType::Int, vec![1], Values::Int(vec![7, 8, 9])));
        model.vars.push(var(
            "a",
            NcType::Byte,
            vec![0, 1],
            Values::Byte(vec![1, 2, 3, 4, 5, 6]),
        ));
        model.vars.push(var(
            "b",
            NcType::Double,
            vec![0],
            Values::Double(vec![0.5, 1.5]),
        ));
        model
            .attrs
            .insert("title".into(), AttrValue::Text("records".into()));
        model.vars[2]
            .attrs
            .insert("_FillValue".into(), AttrValue::Double(vec![-1.0]));
        let decoded = decode(&encode(&model).unwrap()).unwrap();
        assert_eq!(decoded, model);
    }

    #[test]
    fn test_single_record_var_unpadded() {
        let mut model = Model::new(Format::Classic);
        model.dims.push(Dim { name: "t".into(), len: 0 });
        model.numrecs = 3;
        model.vars.push(var("c", NcType::Char, vec![0], Values::Char(b"abc".to_vec())));
        let bytes = encode(&model).unwrap();
        assert_eq!(&bytes[bytes.len() - 3..], b"abc");
        assert_eq!(decode(&bytes).unwrap(), model);
    }

    #[test]
    fn test_streaming_numrecs() {
        let mut model = Model::new(Format::Classic);
        model.dims.push(Dim { name: "t".into(), len: 0 });
        model.numrecs = 2;
        model.vars.push(var("v", NcType::Float, vec![0], Values::Float(vec![1.0, 2.0])));
        let mut bytes = encode(&model).unwrap();
        BigEndian::write_u32(&mut bytes[4..8], STREAMING);
        assert_eq!(decode(&bytes).unwrap().numrecs, 2);
    }

    #[test]
    fn test_reject_garbage() {
        assert!(decode(b"").is_err());
        assert!(decode(b"not a netcdf file").is_err());
        assert!(decode(b"CDF\x05\0\0\0\0").is_err());
        assert!(decode(HDF5_MAGIC).is_err());
        assert!(is_hdf5(HDF5_MAGIC));

        let mut model = Model::new(Format::Classic);
        model.dims.push(Dim { name: "x".into(), len: 4 });
        model.vars.push(var("v", NcType::Double, vec![0], Values::Double(vec![0.0; 4])));
        let bytes = encode(&model).unwrap();
        assert!(decode(&bytes[..bytes.len() - 1]).is_err());
        assert!(decode(&bytes[..20]).is_err());
    }

    #[test]
    fn test_reject_corrupt_sizes() {
        let mut model = Model::new(Format::Offset64);
        model.dims.push(Dim { name: "x".into(), len: 2 });
        model.vars.push(var("v", NcType::Short, vec![0], Values::Short(vec![1, -2])));
        let mut bytes = encode(&model).unwrap();
        // begin of "v" sits just before its 4 bytes of data
        let at = bytes.len() - 12;
        BigEndian::write_u64(&mut bytes[at..], u64::MAX);
        assert!(decode(&bytes).is_err());

        let mut model = Model::new(Format::Classic);
        for name in ["a", "b", "c"] {
            model.dims.push(Dim { name: name.into(), len: 1 });
        }
        model.vars.push(var("v", NcType::Byte, vec![0, 1, 2], Values::Byte(vec![7])));
        let mut bytes = encode(&model).unwrap();
        assert_eq!(decode(&bytes).unwrap().vars[0].data, Values::Byte(vec![7]));
        for i in 0..3 {
            BigEndian::write_u32(&mut bytes[24 + 12 * i..], u32::MAX);
        }
        assert!(decode(&bytes).is_err());

        // attribute claiming more values than the file holds
        let mut model = Model::new(Format::Classic);
        model.attrs.insert("t".into(), AttrValue::Double(vec![1.0]));
        let mut bytes = encode(&model).unwrap();
        let at = bytes.len() - 8 - 8 - 4;
        assert_eq!(BigEndian::read_u32(&bytes[at..]), 1);
        BigEndian::write_u32(&mut bytes[at..], u32::MAX);
        assert!(decode(&bytes).is_err());
    }

    #[test]
    fn test_encode_oversized_dimension() {
        let mut model = Model::new(Format::Offset64);
        model.dims.push(Dim {
            name: "x".into(),
            len: u32::MAX as usize + 1,
        });
        assert!(encode(&model).is_err());
    }

    proptest! {
        #[test]
        fn test_attribute_values(
            name in "[a-zA-Z_][a-zA-Z0-9_]{0,12}",
            text in "[ -~]{0,20}",
            ints in proptest::collection::vec(any::<i32>(), 1..6),
            shorts in proptest::collection::vec(any::<i16>(), 1..6),
            doubles in proptest::collection::vec(-1e12f64..1e12, 1..6),
        ) {
            let mut model = Model::new(Format::Classic);
            model.attrs.insert(name.clone(), AttrValue::Text(text));
            model.attrs.insert(format!("{}_i", name), AttrValue::Int(ints));
            model.attrs.insert(format!("{}_s", name), AttrValue::Short(shorts));
            model.attrs.insert(format!("{}_d", name), AttrValue::Double(doubles));
            prop_assert_eq!(decode(&encode(&model).unwrap()).unwrap(), model);
        }
    }
}
