use core::fmt::{Display, Formatter};

/// Numeric status returned by a format engine. Negative values are engine
/// errors, positive values are system `errno` codes.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Status(pub i32);

impl Status {
    pub const NOERR: Status = Status(0);
    pub const ENOENT: Status = Status(2);
    pub const EIO: Status = Status(5);
    pub const EACCES: Status = Status(13);
    pub const EBADID: Status = Status(-33);
    pub const EEXIST: Status = Status(-35);
    pub const EINVAL: Status = Status(-36);
    pub const EPERM: Status = Status(-37);
    pub const ENAMEINUSE: Status = Status(-42);
    pub const ENOTATT: Status = Status(-43);
    pub const EBADTYPE: Status = Status(-45);
    pub const EBADDIM: Status = Status(-46);
    pub const EUNLIMPOS: Status = Status(-47);
    pub const ENOTVAR: Status = Status(-49);
    pub const ENOTNC: Status = Status(-51);
    pub const EMAXNAME: Status = Status(-53);
    pub const EUNLIMIT: Status = Status(-54);
    pub const ECHAR: Status = Status(-56);
    pub const EEDGE: Status = Status(-57);
    pub const EBADNAME: Status = Status(-59);
    pub const EVARSIZE: Status = Status(-62);
    pub const EDIMSIZE: Status = Status(-63);
    pub const ENOTBUILT: Status = Status(-128);

    pub fn code(&self) -> i32 {
        self.0
    }

    pub fn is_ok(&self) -> bool {
        self.0 == 0
    }

    pub fn message(&self) -> &'static str {
        match *self {
            Status::NOERR => "No error",
            Status::ENOENT => "No such file or directory",
            Status::EIO => "Input/output error",
            Status::EACCES => "Permission denied",
            Status::EBADID => "NetCDF: Not a valid ID",
            Status::EEXIST => "NetCDF: File exists && NC_NOCLOBBER",
            Status::EINVAL => "NetCDF: Invalid argument",
            Status::EPERM => "NetCDF: Write to read only",
            Status::ENAMEINUSE => "NetCDF: String match to name in use",
            Status::ENOTATT => "NetCDF: Attribute not found",
            Status::EBADTYPE => "NetCDF: Not a valid data type or _FillValue type mismatch",
            Status::EBADDIM => "NetCDF: Invalid dimension ID or name",
            Status::EUNLIMPOS => "NetCDF: NC_UNLIMITED in the wrong index",
            Status::ENOTVAR => "NetCDF: Variable not found",
            Status::ENOTNC => "NetCDF: Unknown file format",
            Status::EMAXNAME => "NetCDF: Name too long",
            Status::EUNLIMIT => "NetCDF: NC_UNLIMITED size already in use",
            Status::ECHAR => "NetCDF: Attempt to convert between text & numbers",
            Status::EEDGE => "NetCDF: Start+count exceeds dimension bound",
            Status::EBADNAME => "NetCDF: Name contains illegal characters",
            Status::EVARSIZE => "NetCDF: One or more variable sizes violate format constraints",
            Status::EDIMSIZE => "NetCDF: Invalid dimension size",
            Status::ENOTBUILT => {
                "NetCDF: Attempt to use feature that was not turned on when netCDF was built."
            }
            Status(code) if code > 0 => "Unknown system error",
            _ => "Unknown Error",
        }
    }

    /// Map a filesystem failure to its `errno`-style status.
    pub fn from_io(err: &std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Status::ENOENT,
            std::io::ErrorKind::PermissionDenied => Status::EACCES,
            _ => err.raw_os_error().map(Status).unwrap_or(Status::EIO),
        }
    }
}

impl Display for Status {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (status {})", self.message(), self.0)
    }
}

impl std::error::Error for Status {}
