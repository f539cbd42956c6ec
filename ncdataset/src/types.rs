use core::fmt::{Display, Formatter};

/// Logical size reported for unlimited dimensions. Also accepted by
/// `create_dimension` as an alternative to `None`.
pub const UNLIMITED: i64 = -1;

/// Element types a variable can be declared with.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum NcType {
    Byte,
    Char,
    Short,
    Int,
    Float,
    Double,
}

impl Display for NcType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            NcType::Byte => write!(f, "i1"),
            NcType::Char => write!(f, "S1"),
            NcType::Short => write!(f, "i2"),
            NcType::Int => write!(f, "i4"),
            NcType::Float => write!(f, "f4"),
            NcType::Double => write!(f, "f8"),
        }
    }
}

impl NcType {
    /// Parse a short (`f8`, `i4`, ...) or long (`double`, `int`, ...) alias.
    pub fn from_alias(alias: &str) -> Option<Self> {
        let ty = match alias {
            "f8" | "double" => NcType::Double,
            "f4" | "float" => NcType::Float,
            "i4" | "int" => NcType::Int,
            "i2" | "short" => NcType::Short,
            "i1" | "byte" => NcType::Byte,
            "S1" | "char" => NcType::Char,
            _ => return None,
        };
        Some(ty)
    }

    /// The external type code used by the classic container.
    pub fn code(&self) -> u32 {
        match self {
            NcType::Byte => 1,
            NcType::Char => 2,
            NcType::Short => 3,
            NcType::Int => 4,
            NcType::Float => 5,
            NcType::Double => 6,
        }
    }

    pub fn from_code(code: u32) -> Option<Self> {
        let ty = match code {
            1 => NcType::Byte,
            2 => NcType::Char,
            3 => NcType::Short,
            4 => NcType::Int,
            5 => NcType::Float,
            6 => NcType::Double,
            _ => return None,
        };
        Some(ty)
    }

    /// Size of one element in bytes.
    pub fn size(&self) -> usize {
        match self {
            NcType::Byte | NcType::Char => 1,
            NcType::Short => 2,
            NcType::Int | NcType::Float => 4,
            NcType::Double => 8,
        }
    }

    /// Whether dataset handles can read and write variables of this type.
    pub fn has_io_path(&self) -> bool {
        matches!(self, NcType::Float | NcType::Double)
    }
}

/// Size of a dimension as seen by callers.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum DimLen {
    Fixed(usize),
    Unlimited,
}

impl DimLen {
    pub fn is_unlimited(&self) -> bool {
        matches!(self, DimLen::Unlimited)
    }

    /// The length handed to the engine, which encodes unlimited as 0.
    pub fn engine_len(&self) -> usize {
        match self {
            DimLen::Fixed(n) => *n,
            DimLen::Unlimited => 0,
        }
    }

    /// The logical size: the fixed length, or [`UNLIMITED`].
    pub fn logical(&self) -> i64 {
        match self {
            DimLen::Fixed(n) => *n as i64,
            DimLen::Unlimited => UNLIMITED,
        }
    }

    /// Contribution of this dimension to a variable's readable element count.
    /// Unlimited dimensions contribute 0.
    pub fn readable_len(&self) -> usize {
        match self {
            DimLen::Fixed(n) => *n,
            DimLen::Unlimited => 0,
        }
    }
}

impl Display for DimLen {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            DimLen::Fixed(n) => write!(f, "{}", n),
            DimLen::Unlimited => write!(f, "unlimited"),
        }
    }
}

/// Attribute values. Numeric variants hold one or more elements; a scalar
/// attribute is a one-element vector.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Text(String),
    Byte(Vec<i8>),
    Short(Vec<i16>),
    Int(Vec<i32>),
    Float(Vec<f32>),
    Double(Vec<f64>),
}

impl Display for AttrValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        fn list<T: Display>(f: &mut Formatter<'_>, xs: &[T]) -> std::fmt::Result {
            match xs {
                [x] => write!(f, "{}", x),
                _ => write!(f, "[{}]", itertools::join(xs, ", ")),
            }
        }
        match self {
            AttrValue::Text(s) => write!(f, "{:?}", s),
            AttrValue::Byte(xs) => list(f, xs),
            AttrValue::Short(xs) => list(f, xs),
            AttrValue::Int(xs) => list(f, xs),
            AttrValue::Float(xs) => list(f, xs),
            AttrValue::Double(xs) => list(f, xs),
        }
    }
}

impl AttrValue {
    pub fn nc_type(&self) -> NcType {
        match self {
            AttrValue::Text(_) => NcType::Char,
            AttrValue::Byte(_) => NcType::Byte,
            AttrValue::Short(_) => NcType::Short,
            AttrValue::Int(_) => NcType::Int,
            AttrValue::Float(_) => NcType::Float,
            AttrValue::Double(_) => NcType::Double,
        }
    }

    /// Number of stored elements (bytes for text).
    pub fn len(&self) -> usize {
        match self {
            AttrValue::Text(s) => s.len(),
            AttrValue::Byte(xs) => xs.len(),
            AttrValue::Short(xs) => xs.len(),
            AttrValue::Int(xs) => xs.len(),
            AttrValue::Float(xs) => xs.len(),
            AttrValue::Double(xs) => xs.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            AttrValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// All numeric elements widened to `f64`. `None` for text.
    pub fn to_f64_vec(&self) -> Option<Vec<f64>> {
        let v = match self {
            AttrValue::Text(_) => return None,
            AttrValue::Byte(xs) => xs.iter().map(|&x| x as f64).collect(),
            AttrValue::Short(xs) => xs.iter().map(|&x| x as f64).collect(),
            AttrValue::Int(xs) => xs.iter().map(|&x| x as f64).collect(),
            AttrValue::Float(xs) => xs.iter().map(|&x| x as f64).collect(),
            AttrValue::Double(xs) => xs.clone(),
        };
        Some(v)
    }

    /// The first numeric element widened to `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        self.to_f64_vec().and_then(|v| v.first().copied())
    }

    /// Build a one-element attribute of the given numeric type, e.g. a
    /// `_FillValue` matching a variable's type. `None` for `Char`.
    pub fn scalar_of(ty: NcType, value: f64) -> Option<Self> {
        let v = match ty {
            NcType::Char => return None,
            NcType::Byte => AttrValue::Byte(vec![value as i8]),
            NcType::Short => AttrValue::Short(vec![value as i16]),
            NcType::Int => AttrValue::Int(vec![value as i32]),
            NcType::Float => AttrValue::Float(vec![value as f32]),
            NcType::Double => AttrValue::Double(vec![value]),
        };
        Some(v)
    }
}

macro_rules! impl_attr_from {
    ($($from:ty, $to:ident),*) => {
        $(
            impl From<$from> for AttrValue {
                fn from(x: $from) -> Self {
                    AttrValue::$to(vec![x])
                }
            }

            impl From<Vec<$from>> for AttrValue {
                fn from(xs: Vec<$from>) -> Self {
                    AttrValue::$to(xs)
                }
            }

            impl From<&[$from]> for AttrValue {
                fn from(xs: &[$from]) -> Self {
                    AttrValue::$to(xs.to_vec())
                }
            }
        )*
    };
}

impl_attr_from!(i8, Byte, i16, Short, i32, Int, f32, Float, f64, Double);

impl From<&str> for AttrValue {
    fn from(s: &str) -> Self {
        AttrValue::Text(s.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(s: String) -> Self {
        AttrValue::Text(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aliases() {
        for (short, long, ty) in [
            ("f8", "double", NcType::Double),
            ("f4", "float", NcType::Float),
            ("i4", "int", NcType::Int),
            ("i2", "short", NcType::Short),
            ("i1", "byte", NcType::Byte),
            ("S1", "char", NcType::Char),
        ] {
            assert_eq!(NcType::from_alias(short), Some(ty));
            assert_eq!(NcType::from_alias(long), Some(ty));
            assert_eq!(ty.to_string(), short);
        }
        assert_eq!(NcType::from_alias("i8"), None);
        assert_eq!(NcType::from_alias("F8"), None);
        assert_eq!(NcType::from_alias(""), None);
    }

    #[test]
    fn test_io_paths() {
        assert!(NcType::Double.has_io_path());
        assert!(NcType::Float.has_io_path());
        assert!(!NcType::Int.has_io_path());
        assert!(!NcType::Char.has_io_path());
    }

    #[test]
    fn test_dim_len() {
        assert_eq!(DimLen::Unlimited.engine_len(), 0);
        assert_eq!(DimLen::Unlimited.logical(), UNLIMITED);
        assert_ne!(DimLen::Unlimited.logical(), 0);
        assert_eq!(DimLen::Fixed(10).logical(), 10);
        assert_eq!(DimLen::Unlimited.readable_len(), 0);
    }

    #[test]
    fn test_attr_value() {
        let v: AttrValue = 3.5f64.into();
        assert_eq!(v, AttrValue::Double(vec![3.5]));
        assert_eq!(v.as_f64(), Some(3.5));
        assert_eq!(v.to_string(), "3.5");

        let v: AttrValue = vec![1i32, 2, 3].into();
        assert_eq!(v.nc_type(), NcType::Int);
        assert_eq!(v.len(), 3);
        assert_eq!(v.to_string(), "[1, 2, 3]");

        let v: AttrValue = "K".into();
        assert_eq!(v.as_text(), Some("K"));
        assert_eq!(v.as_f64(), None);

        assert_eq!(
            AttrValue::scalar_of(NcType::Float, -9999.0),
            Some(AttrValue::Float(vec![-9999.0]))
        );
        assert_eq!(AttrValue::scalar_of(NcType::Char, 0.0), None);
    }
}
