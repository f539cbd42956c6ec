//! In-memory form of a classic-format dataset.

use ncdataset::{AttrValue, DimId, Format, NcType, VarId};

use indexmap::IndexMap;

pub const FILL_BYTE: i8 = -127;
pub const FILL_CHAR: u8 = 0;
pub const FILL_SHORT: i16 = -32767;
pub const FILL_INT: i32 = -2147483647;
pub const FILL_FLOAT: f32 = 9.969_209_968_386_869e36;
pub const FILL_DOUBLE: f64 = 9.969_209_968_386_869e36;

/// Typed variable data, stored flat in row-major order.
#[derive(Debug, Clone, PartialEq)]
pub enum Values {
    Byte(Vec<i8>),
    Char(Vec<u8>),
    Short(Vec<i16>),
    Int(Vec<i32>),
    Float(Vec<f32>),
    Double(Vec<f64>),
}

macro_rules! dispatch {
    ($values:expr, $xs:ident => $body:expr) => {
        match $values {
            Values::Byte($xs) => $body,
            Values::Char($xs) => $body,
            Values::Short($xs) => $body,
            Values::Int($xs) => $body,
            Values::Float($xs) => $body,
            Values::Double($xs) => $body,
        }
    };
}

impl Values {
    pub fn empty(ty: NcType) -> Self {
        match ty {
            NcType::Byte => Values::Byte(Vec::new()),
            NcType::Char => Values::Char(Vec::new()),
            NcType::Short => Values::Short(Vec::new()),
            NcType::Int => Values::Int(Vec::new()),
            NcType::Float => Values::Float(Vec::new()),
            NcType::Double => Values::Double(Vec::new()),
        }
    }

    pub fn nc_type(&self) -> NcType {
        match self {
            Values::Byte(_) => NcType::Byte,
            Values::Char(_) => NcType::Char,
            Values::Short(_) => NcType::Short,
            Values::Int(_) => NcType::Int,
            Values::Float(_) => NcType::Float,
            Values::Double(_) => NcType::Double,
        }
    }

    pub fn len(&self) -> usize {
        dispatch!(self, xs => xs.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Grow or shrink to `n` elements. New elements take `fill`, or zero.
    pub fn resize(&mut self, n: usize, fill: Option<f64>) {
        match self {
            Values::Byte(xs) => xs.resize(n, fill.map_or(0, |x| x as i8)),
            Values::Char(xs) => xs.resize(n, fill.map_or(0, |x| x as u8)),
            Values::Short(xs) => xs.resize(n, fill.map_or(0, |x| x as i16)),
            Values::Int(xs) => xs.resize(n, fill.map_or(0, |x| x as i32)),
            Values::Float(xs) => xs.resize(n, fill.map_or(0.0, |x| x as f32)),
            Values::Double(xs) => xs.resize(n, fill.unwrap_or(0.0)),
        }
    }

    /// Overwrite the leading elements with `data`, converted to this type.
    /// Returns `false` for character data.
    pub fn overwrite_f64(&mut self, data: &[f64]) -> bool {
        if data.len() > self.len() {
            self.resize(data.len(), None);
        }
        match self {
            Values::Char(_) => return false,
            Values::Byte(xs) => xs.iter_mut().zip(data).for_each(|(x, &v)| *x = v as i8),
            Values::Short(xs) => xs.iter_mut().zip(data).for_each(|(x, &v)| *x = v as i16),
            Values::Int(xs) => xs.iter_mut().zip(data).for_each(|(x, &v)| *x = v as i32),
            Values::Float(xs) => xs.iter_mut().zip(data).for_each(|(x, &v)| *x = v as f32),
            Values::Double(xs) => xs[..data.len()].copy_from_slice(data),
        }
        true
    }

    /// Replace every element equal to `old` with `new`.
    pub fn refill(&mut self, old: f64, new: f64) {
        if let Some(current) = self.head_f64(self.len()) {
            let replaced: Vec<f64> = current
                .into_iter()
                .map(|x| if x == old { new } else { x })
                .collect();
            self.overwrite_f64(&replaced);
        }
    }

    /// The first `count` elements widened to `f64`. `None` for character data.
    pub fn head_f64(&self, count: usize) -> Option<Vec<f64>> {
        let v = match self {
            Values::Char(_) => return None,
            Values::Byte(xs) => xs.iter().take(count).map(|&x| x as f64).collect(),
            Values::Short(xs) => xs.iter().take(count).map(|&x| x as f64).collect(),
            Values::Int(xs) => xs.iter().take(count).map(|&x| x as f64).collect(),
            Values::Float(xs) => xs.iter().take(count).map(|&x| x as f64).collect(),
            Values::Double(xs) => xs[..count.min(xs.len())].to_vec(),
        };
        Some(v)
    }
}

pub fn default_fill(ty: NcType) -> f64 {
    match ty {
        NcType::Byte => FILL_BYTE as f64,
        NcType::Char => FILL_CHAR as f64,
        NcType::Short => FILL_SHORT as f64,
        NcType::Int => FILL_INT as f64,
        NcType::Float => FILL_FLOAT as f64,
        NcType::Double => FILL_DOUBLE,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Dim {
    pub name: String,
    /// 0 marks the record (unlimited) dimension.
    pub len: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Var {
    pub name: String,
    pub nc_type: NcType,
    pub dimids: Vec<DimId>,
    pub attrs: IndexMap<String, AttrValue>,
    pub data: Values,
}

impl Var {
    /// The `_FillValue` attribute, or the type's default fill.
    pub fn fill_value(&self) -> f64 {
        self.attrs
            .get("_FillValue")
            .and_then(|v| v.as_f64())
            .unwrap_or_else(|| default_fill(self.nc_type))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    pub format: Format,
    pub dims: Vec<Dim>,
    pub attrs: IndexMap<String, AttrValue>,
    pub vars: Vec<Var>,
    pub numrecs: usize,
}

impl Model {
    pub fn new(format: Format) -> Self {
        Model {
            format,
            dims: Vec::new(),
            attrs: IndexMap::new(),
            vars: Vec::new(),
            numrecs: 0,
        }
    }

    pub fn unlimdim(&self) -> Option<DimId> {
        self.dims.iter().position(|d| d.len == 0).map(|i| i as DimId)
    }

    pub fn dim(&self, id: DimId) -> Option<&Dim> {
        usize::try_from(id).ok().and_then(|i| self.dims.get(i))
    }

    pub fn var(&self, id: VarId) -> Option<&Var> {
        usize::try_from(id).ok().and_then(|i| self.vars.get(i))
    }

    pub fn var_mut(&mut self, id: VarId) -> Option<&mut Var> {
        usize::try_from(id).ok().and_then(move |i| self.vars.get_mut(i))
    }

    pub fn is_record_var(&self, var: &Var) -> bool {
        match (var.dimids.first(), self.unlimdim()) {
            (Some(first), Some(unlim)) => *first == unlim,
            _ => false,
        }
    }

    /// Elements in one record of a record variable, or in the whole of a
    /// fixed-size variable.
    pub fn slab_len(&self, var: &Var) -> usize {
        let skip = if self.is_record_var(var) { 1 } else { 0 };
        var.dimids
            .iter()
            .skip(skip)
            .map(|id| self.dim(*id).map_or(0, |d| d.len))
            .product()
    }

    /// Bytes in one slab of `var`, or `None` if that does not fit in `usize`.
    pub fn slab_bytes(&self, var: &Var) -> Option<usize> {
        let skip = if self.is_record_var(var) { 1 } else { 0 };
        var.dimids
            .iter()
            .skip(skip)
            .try_fold(var.nc_type.size(), |acc, id| {
                acc.checked_mul(self.dim(*id).map_or(0, |d| d.len))
            })
    }

    /// Number of elements the variable currently holds.
    pub fn var_len(&self, var: &Var) -> usize {
        if self.is_record_var(var) {
            self.numrecs * self.slab_len(var)
        } else {
            self.slab_len(var)
        }
    }

    pub fn dim_len(&self, id: DimId) -> Option<usize> {
        let dim = self.dim(id)?;
        if dim.len == 0 {
            Some(self.numrecs)
        } else {
            Some(dim.len)
        }
    }

    /// Resize every variable's data to its current extent.
    pub fn conform(&mut self, fill: bool) {
        let lens: Vec<usize> = self.vars.iter().map(|v| self.var_len(v)).collect();
        for (var, n) in self.vars.iter_mut().zip(lens) {
            let value = if fill { Some(var.fill_value()) } else { None };
            var.data.resize(n, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> Model {
        let mut m = Model::new(Format::Classic);
        m.dims.push(Dim { name: "time".into(), len: 0 });
        m.dims.push(Dim { name: "x".into(), len: 3 });
        for (name, dimids) in [("a", vec![1]), ("r", vec![0, 1]), ("s", vec![])] {
            m.vars.push(Var {
                name: name.into(),
                nc_type: NcType::Short,
                dimids,
                attrs: IndexMap::new(),
                data: Values::empty(NcType::Short),
            });
        }
        m
    }

    #[test]
    fn test_extents() {
        let mut m = model();
        assert_eq!(m.unlimdim(), Some(0));
        assert!(m.is_record_var(&m.vars[1]));
        assert!(!m.is_record_var(&m.vars[0]));
        assert_eq!(m.slab_len(&m.vars[1]), 3);
        assert_eq!(m.var_len(&m.vars[1]), 0);
        assert_eq!(m.var_len(&m.vars[2]), 1);

        m.numrecs = 2;
        m.conform(true);
        assert_eq!(m.vars[1].data, Values::Short(vec![FILL_SHORT; 6]));
        assert_eq!(m.vars[0].data, Values::Short(vec![FILL_SHORT; 3]));
        assert_eq!(m.dim_len(0), Some(2));
    }

    #[test]
    fn test_slab_bytes_overflow() {
        let mut m = model();
        assert_eq!(m.slab_bytes(&m.vars[1]), Some(6));
        assert_eq!(m.slab_bytes(&m.vars[2]), Some(2));

        let big = m.dims.len() as DimId;
        m.dims.push(Dim { name: "big".into(), len: u32::MAX as usize });
        m.vars[0].dimids = vec![big, big, big];
        assert_eq!(m.slab_bytes(&m.vars[0]), None);
    }

    #[test]
    fn test_overwrite() {
        let mut v = Values::Int(vec![0; 4]);
        assert!(v.overwrite_f64(&[1.9, -2.0]));
        assert_eq!(v, Values::Int(vec![1, -2, 0, 0]));
        assert_eq!(v.head_f64(2), Some(vec![1.0, -2.0]));
        assert!(!Values::Char(vec![]).overwrite_f64(&[1.0]));

        let mut v = Values::Float(vec![FILL_FLOAT, 2.0]);
        v.refill(default_fill(NcType::Float), -1.0);
        assert_eq!(v, Values::Float(vec![-1.0, 2.0]));
    }
}
