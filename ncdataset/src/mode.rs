use core::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::str::FromStr;

/// How a dataset is opened. Parsed from the mode strings `r`, `w`, `w-`, `a`
/// and `r+`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum AccessMode {
    /// `r`: open an existing dataset read-only.
    Read,
    /// `w`: create a dataset, replacing any existing one.
    WriteCreate,
    /// `w-`: create a dataset, failing if one exists.
    WriteCreateExclusive,
    /// `a`: open an existing dataset for appending.
    Append,
    /// `r+`: open an existing dataset for reading and writing.
    ReadWrite,
}

impl AccessMode {
    pub const ALL: [AccessMode; 5] = [
        AccessMode::Read,
        AccessMode::WriteCreate,
        AccessMode::WriteCreateExclusive,
        AccessMode::Append,
        AccessMode::ReadWrite,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AccessMode::Read => "r",
            AccessMode::WriteCreate => "w",
            AccessMode::WriteCreateExclusive => "w-",
            AccessMode::Append => "a",
            AccessMode::ReadWrite => "r+",
        }
    }

    /// Whether this mode creates a new dataset rather than opening one.
    pub fn creates(&self) -> bool {
        matches!(self, AccessMode::WriteCreate | AccessMode::WriteCreateExclusive)
    }

    pub fn is_writable(&self) -> bool {
        !matches!(self, AccessMode::Read)
    }

    /// The engine call this mode translates to.
    pub fn engine_mode(&self, format: Format) -> EngineMode {
        match self {
            AccessMode::Read => EngineMode::Open { write: false },
            AccessMode::WriteCreate => EngineMode::Create { clobber: true, format },
            AccessMode::WriteCreateExclusive => EngineMode::Create { clobber: false, format },
            AccessMode::Append | AccessMode::ReadWrite => EngineMode::Open { write: true },
        }
    }
}

impl Display for AccessMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Returned when a mode string is not one of the five recognized values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownMode(pub String);

impl FromStr for AccessMode {
    type Err = UnknownMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AccessMode::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| UnknownMode(s.to_string()))
    }
}

/// Engine-level translation of an [`AccessMode`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum EngineMode {
    Create { clobber: bool, format: Format },
    Open { write: bool },
}

/// On-disk container flavour requested at creation time.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub enum Format {
    #[default]
    Classic,
    Offset64,
    Netcdf4,
}

impl Display for Format {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Format::Classic => write!(f, "NETCDF3_CLASSIC"),
            Format::Offset64 => write!(f, "NETCDF3_64BIT_OFFSET"),
            Format::Netcdf4 => write!(f, "NETCDF4"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct OpenOptions {
    pub format: Format,
    /// Parent directory for synthesized in-memory dataset names.
    pub mount_dir: PathBuf,
    /// Pre-fill unwritten variable data with fill values.
    pub fill: bool,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            format: Format::default(),
            mount_dir: PathBuf::from("/tmp"),
            fill: true,
        }
    }
}

impl OpenOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn format(mut self, format: Format) -> Self {
        self.format = format;
        self
    }

    pub fn mount_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.mount_dir = dir.into();
        self
    }

    pub fn fill(mut self, fill: bool) -> Self {
        self.fill = fill;
        self
    }
}

/// Where a dataset's bytes come from.
#[derive(Debug, Clone)]
pub enum Source {
    /// A name the engine resolves through its filesystem.
    Path(PathBuf),
    /// In-memory bytes, mounted under `filename` or a synthesized name.
    Bytes {
        bytes: Vec<u8>,
        filename: Option<String>,
    },
}

impl From<PathBuf> for Source {
    fn from(path: PathBuf) -> Self {
        Source::Path(path)
    }
}

impl From<&str> for Source {
    fn from(path: &str) -> Self {
        Source::Path(PathBuf::from(path))
    }
}

impl From<Vec<u8>> for Source {
    fn from(bytes: Vec<u8>) -> Self {
        Source::Bytes { bytes, filename: None }
    }
}

impl From<&[u8]> for Source {
    fn from(bytes: &[u8]) -> Self {
        Source::Bytes { bytes: bytes.to_vec(), filename: None }
    }
}
