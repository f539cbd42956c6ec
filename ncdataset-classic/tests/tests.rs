use ncdataset::*;
use ncdataset_classic::{ClassicEngine, ClassicNetCdf};
use ncdataset_test_utils::*;

#[test]
fn test_mode_validation_classic() {
    test_mode_validation(ClassicEngine::new)
}

#[test]
fn test_invalid_source_classic() {
    test_invalid_source(ClassicEngine::new)
}

#[test]
fn test_dimensions_classic() {
    test_dimensions(ClassicEngine::new)
}

#[test]
fn test_variables_classic() {
    test_variables(ClassicEngine::new)
}

#[test]
fn test_float_roundtrip_classic() {
    test_float_roundtrip(ClassicEngine::new)
}

#[test]
fn test_dimension_order_classic() {
    test_dimension_order(ClassicEngine::new)
}

#[test]
fn test_bytes_roundtrip_classic() {
    test_bytes_roundtrip(ClassicEngine::new)
}

#[test]
fn test_close_classic() {
    test_close(ClassicEngine::new)
}

#[test]
fn test_attributes_classic() {
    test_attributes(ClassicEngine::new)
}

#[test]
fn test_record_variables_classic() {
    test_record_variables(ClassicEngine::new)
}

#[test]
fn test_export_unavailable_classic() {
    test_export_unavailable(ClassicEngine::new)
}

#[test]
fn test_mount_failure_classic() {
    test_mount_failure(ClassicEngine::new)
}

#[test]
fn test_open_path_classic() {
    test_open_path(ClassicEngine::new)
}

#[test]
fn test_concurrent_handles_classic() {
    test_concurrent_handles(ClassicEngine::new)
}

#[test]
fn test_formats() {
    let nc = ClassicNetCdf::new(ClassicEngine::in_memory());

    let err = nc
        .open_bytes(Vec::new(), "w", OpenOptions::new().format(Format::Netcdf4), None)
        .unwrap_err();
    assert_eq!(err.status(), Some(Status::ENOTBUILT));

    let mut ds = nc
        .open_bytes(Vec::new(), "w", OpenOptions::new().format(Format::Offset64), None)
        .unwrap();
    assert_eq!(ds.format().unwrap(), Format::Offset64);
    ds.create_dimension("x", Some(2)).unwrap();
    ds.close().unwrap();
    let bytes = ds.export_bytes().unwrap();
    assert_eq!(&bytes[..4], b"CDF\x02");

    let ds = nc.open_bytes(bytes, "r", OpenOptions::default(), None).unwrap();
    assert_eq!(ds.format().unwrap(), Format::Offset64);

    let ds = new_dataset(&nc);
    assert_eq!(ds.format().unwrap(), Format::Classic);
}

#[test]
fn test_foreign_bytes() {
    let nc = ClassicNetCdf::new(ClassicEngine::in_memory());
    let err = nc
        .open_bytes(&b"definitely not netcdf"[..], "r", OpenOptions::default(), None)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::EngineRejected);
    assert_eq!(err.status(), Some(Status::ENOTNC));

    let hdf5 = b"\x89HDF\r\n\x1a\n\0\0\0\0";
    let err = nc
        .open_bytes(&hdf5[..], "r", OpenOptions::default(), None)
        .unwrap_err();
    assert_eq!(err.status(), Some(Status::ENOTBUILT));
}

#[test]
fn test_exclusive_create_over_bytes() {
    let nc = ClassicNetCdf::new(ClassicEngine::in_memory());
    let seed = sample_bytes(&nc).unwrap();
    let err = nc
        .open_bytes(seed, "w-", OpenOptions::default(), Some("seed.nc"))
        .unwrap_err();
    assert_eq!(err.status(), Some(Status::EEXIST));
    assert_eq!(err.resource(), "/tmp/seed.nc");

    // the buffer is mounted before the engine sees the name, even when empty
    let err = nc
        .open_bytes(Vec::new(), "w-", OpenOptions::default(), Some("fresh.nc"))
        .unwrap_err();
    assert_eq!(err.status(), Some(Status::EEXIST));

    let ds = nc
        .open_path("/tmp/other.nc", "w-", OpenOptions::default())
        .unwrap();
    assert!(ds.is_open());
}

#[test]
fn test_record_growth() {
    let nc = ClassicNetCdf::new(ClassicEngine::in_memory());
    let mut ds = new_dataset(&nc);
    let time = ds.create_dimension("time", None).unwrap();
    ds.create_dimension("x", Some(2)).unwrap();
    ds.create_variable("r", "f8", &["time", "x"], VariableOptions::default())
        .unwrap();
    ds.create_variable("q", "f4", &["time"], VariableOptions::default())
        .unwrap();
    let ncid = ds.ncid().unwrap();

    ds.write_variable("r", &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
    assert_eq!(nc.engine().inq_dim(ncid, time.id).unwrap().1, 3);
    // a shorter write keeps the record count
    ds.write_variable("q", &[0.5]).unwrap();
    assert_eq!(nc.engine().inq_dim(ncid, time.id).unwrap().1, 3);

    let err = ds.write_variable("r", &[1.0, 2.0, 3.0]).unwrap_err();
    assert_eq!(err.status(), Some(Status::EEDGE));

    // only the declared size is visible through the handle
    assert_eq!(ds.dimension("time").unwrap().size(), UNLIMITED);
    assert!(ds.read_variable("r").unwrap().is_empty());
    assert_eq!(
        nc.engine().get_var_f64(ncid, ds.variable("r").unwrap().id, 6).unwrap(),
        vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]
    );

    let err = ds.create_dimension("again", None).unwrap_err();
    assert_eq!(err.status(), Some(Status::EUNLIMIT));
    for size in [Some(0), Some(UNLIMITED)] {
        let err = ds.create_dimension("again", size).unwrap_err();
        assert_eq!(err.status(), Some(Status::EUNLIMIT), "{:?}", size);
    }
    assert!(ds.dimension("again").is_none());
    let err = ds
        .create_variable("bad", "f8", &["x", "time"], VariableOptions::default())
        .unwrap_err();
    assert_eq!(err.status(), Some(Status::EUNLIMPOS));
    assert!(ds.variable("bad").is_none());
}

#[test]
fn test_dimension_length_limit() {
    let nc = ClassicNetCdf::new(ClassicEngine::in_memory());
    let mut ds = new_dataset(&nc);
    let err = ds.create_dimension("big", Some(1 << 32)).unwrap_err();
    assert_eq!(err.status(), Some(Status::EDIMSIZE));
    assert!(ds.dimension("big").is_none());

    let max = ds.create_dimension("max", Some(u32::MAX as i64)).unwrap();
    assert_eq!(max.size(), u32::MAX as i64);
    let err = ds
        .create_variable("huge", "f8", &["max"], VariableOptions::default())
        .unwrap_err();
    assert_eq!(err.status(), Some(Status::EVARSIZE));
    assert!(ds.variable("huge").is_none());

    // the header written on close still holds every length
    ds.close().unwrap();
    let ds = nc
        .open_bytes(ds.export_bytes().unwrap(), "r", OpenOptions::default(), None)
        .unwrap();
    assert_eq!(ds.dimension("max").unwrap().size(), u32::MAX as i64);
}

#[test]
fn test_no_fill() {
    let nc = ClassicNetCdf::new(ClassicEngine::in_memory());
    let mut ds = nc
        .open_bytes(Vec::new(), "w", OpenOptions::new().fill(false), None)
        .unwrap();
    ds.create_dimension("x", Some(3)).unwrap();
    ds.create_variable("v", "f8", &["x"], VariableOptions::default())
        .unwrap();
    assert_eq!(ds.read_variable("v").unwrap(), vec![0.0; 3]);

    let mut ds = new_dataset(&nc);
    ds.create_dimension("x", Some(3)).unwrap();
    ds.create_variable("v", "f8", &["x"], VariableOptions::default())
        .unwrap();
    assert!(ds.read_variable("v").unwrap().iter().all(|x| *x > 9.9e36));
}

#[test]
fn test_engine_names() {
    let nc = ClassicNetCdf::new(ClassicEngine::in_memory());
    let mut ds = new_dataset(&nc);
    for bad in ["", "a/b", "trailing ", "-lead"] {
        let err = ds.create_dimension(bad, Some(1)).unwrap_err();
        assert_eq!(err.status(), Some(Status::EBADNAME), "{:?}", bad);
    }
    let long = "n".repeat(ncdataset_classic::MAX_NAME + 1);
    assert_eq!(
        ds.create_dimension(&long, Some(1)).unwrap_err().status(),
        Some(Status::EMAXNAME)
    );
    assert!(ds.dimensions().is_empty());
}

#[test]
fn test_open_count() {
    let nc = ClassicNetCdf::new(ClassicEngine::in_memory());
    let a = new_dataset(&nc);
    let mut b = new_dataset(&nc);
    assert_eq!(nc.engine().open_count(), 2);
    assert_ne!(a.ncid(), b.ncid());
    b.close().unwrap();
    assert_eq!(nc.engine().open_count(), 1);
    drop(a);
    assert_eq!(nc.engine().open_count(), 0);
}

#[test]
fn test_display() {
    let nc = ClassicNetCdf::new(ClassicEngine::in_memory());
    let mut ds = nc
        .open_bytes(Vec::new(), "w", OpenOptions::default(), Some("shown.nc"))
        .unwrap();
    ds.create_dimension("time", None).unwrap();
    ds.create_dimension("x", Some(4)).unwrap();
    ds.create_variable("temp", "f4", &["time", "x"], VariableOptions::default())
        .unwrap();
    ds.create_group("extra").unwrap();
    ds.set_attribute("title", "shown").unwrap();

    let text = ds.to_string();
    assert!(text.starts_with("Dataset '/tmp/shown.nc' (mode 'w', open)"));
    assert!(text.contains("time = unlimited, x = 4"));
    assert!(text.contains("f4 temp(time, x)"));
    assert!(text.contains("groups: 'extra'"));
    assert!(text.contains("attributes: 'title'"));

    ds.close().unwrap();
    assert_eq!(ds.to_string(), "Dataset '/tmp/shown.nc' (mode 'w', closed)");
}
