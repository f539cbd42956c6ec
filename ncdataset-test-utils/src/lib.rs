mod common;
pub use common::*;

use ncdataset::*;
use proptest::prelude::*;
use std::sync::Arc;

/// Every recognized mode reaches the engine; anything else is rejected
/// before the engine is touched.
pub fn test_mode_validation<E, F>(engine_gen: F)
where
    E: FormatEngine,
    F: Fn(Arc<dyn VirtualFs>) -> E,
{
    let seed = sample_bytes(&memory_session(&engine_gen)).unwrap();
    for mode in AccessMode::ALL {
        let nc = memory_session(&engine_gen);
        match nc.open_bytes(seed.clone(), mode.as_str(), OpenOptions::default(), Some("seed.nc")) {
            Ok(ds) => {
                assert_eq!(ds.mode(), mode);
                assert!(ds.is_open());
            }
            // w- finds the mounted bytes already in place
            Err(e) => assert_eq!(e.kind(), ErrorKind::EngineRejected, "mode {}: {}", mode, e),
        }
    }

    proptest!(ProptestConfig::with_cases(64), |(mode in "\\PC{0,3}")| {
        prop_assume!(mode.parse::<AccessMode>().is_err());
        let engine = RecordingEngine::new(engine_gen(Arc::new(MemoryFs::new())));
        let log = engine.log();
        let nc = NetCdf::new(engine);

        let err = nc.open_bytes(seed.clone(), &mode, OpenOptions::default(), None).unwrap_err();
        prop_assert!(matches!(err, Error::UnsupportedMode { .. }), "{}", err);
        let err = nc.open_path("/tmp/any.nc", &mode, OpenOptions::default()).unwrap_err();
        prop_assert!(matches!(err, Error::UnsupportedMode { .. }), "{}", err);
        let err = nc
            .open(Source::from(seed.clone()), &mode, OpenOptions::default())
            .unwrap_err();
        prop_assert_eq!(err.kind(), ErrorKind::InvalidInput);
        prop_assert!(log.is_empty(), "engine was called: {:?}", log.calls());
    });
}

/// Empty buffers can only be used to create datasets.
pub fn test_invalid_source<E, F>(engine_gen: F)
where
    E: FormatEngine,
    F: Fn(Arc<dyn VirtualFs>) -> E,
{
    let engine = RecordingEngine::new(engine_gen(Arc::new(MemoryFs::new())));
    let log = engine.log();
    let nc = NetCdf::new(engine);
    for mode in ["r", "a", "r+"] {
        let err = nc
            .open_bytes(Vec::new(), mode, OpenOptions::default(), None)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidSource { .. }), "{}", err);
        assert_eq!(err.op(), "open_bytes");
    }
    assert!(log.is_empty());

    let ds = nc
        .open(Source::Bytes { bytes: Vec::new(), filename: Some("empty.nc".into()) }, "w", OpenOptions::default())
        .unwrap();
    assert_eq!(ds.path(), std::path::Path::new("/tmp/empty.nc"));
    assert_eq!(log.count("create"), 1);
}

pub fn test_dimensions<E, F>(engine_gen: F)
where
    E: FormatEngine,
    F: Fn(Arc<dyn VirtualFs>) -> E,
{
    let nc = memory_session(&engine_gen);
    let mut ds = new_dataset(&nc);

    let x = ds.create_dimension("x", Some(10)).unwrap();
    assert_eq!(x.size(), 10);
    assert!(!x.is_unlimited());
    assert_eq!(ds.dimension("x"), Some(x));

    let t = ds.create_dimension("t", None).unwrap();
    assert!(t.is_unlimited());
    assert_ne!(t.size(), 0);
    assert_eq!(t.size(), UNLIMITED);
    assert_eq!(ds.dimension("t").unwrap().len, DimLen::Unlimited);

    let lat = ds.create_dimension("lat", Some(3)).unwrap();
    let err = ds.create_dimension("lat", Some(7)).unwrap_err();
    assert!(matches!(err, Error::DuplicateName { ref name, .. } if name == "lat"));
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
    assert_eq!(ds.dimension("lat"), Some(lat));

    let err = ds.create_dimension("bad", Some(-5)).unwrap_err();
    assert!(matches!(err, Error::InvalidSize { size: -5, .. }));
    assert!(ds.dimension("bad").is_none());

    assert_eq!(
        ds.dimensions().iter().map(|d| d.name.as_str()).collect::<Vec<_>>(),
        vec!["x", "t", "lat"]
    );
    assert!(ds.dimension("missing").is_none());

    // the sentinel and zero both request the unlimited dimension
    for (name, size) in [("u", UNLIMITED), ("z", 0)] {
        let mut ds = new_dataset(&nc);
        let d = ds.create_dimension(name, Some(size)).unwrap();
        assert!(d.is_unlimited(), "{}", name);
        assert_eq!(d.size(), UNLIMITED);
        assert_eq!(ds.dimension(name).unwrap().len, DimLen::Unlimited);
    }
}

pub fn test_variables<E, F>(engine_gen: F)
where
    E: FormatEngine,
    F: Fn(Arc<dyn VirtualFs>) -> E,
{
    let nc = memory_session(&engine_gen);
    let mut ds = new_dataset(&nc);
    ds.create_dimension("x", Some(5)).unwrap();

    // a missing dimension leaves nothing behind
    let err = ds
        .create_variable("v", "f8", &["x", "y"], VariableOptions::default())
        .unwrap_err();
    assert!(matches!(err, Error::UnknownDimension { ref dimension, .. } if dimension == "y"));
    assert!(ds.variable("v").is_none());
    assert!(ds.cache().variable("v").is_none());
    let v = ds
        .create_variable("v", "double", &["x"], VariableOptions::default())
        .unwrap();
    assert_eq!(v.nc_type, NcType::Double);
    assert_eq!(v.dimensions, vec!["x".to_string()]);
    assert!(v.attributes.is_empty());

    let err = ds
        .create_variable("w", "i8", &["x"], VariableOptions::default())
        .unwrap_err();
    assert!(matches!(err, Error::UnsupportedType { ref type_name, .. } if type_name == "i8"));
    let err = ds
        .create_variable("v", "f4", &["x"], VariableOptions::default())
        .unwrap_err();
    assert!(matches!(err, Error::DuplicateName { .. }));

    // declared, but without an I/O path
    for (i, alias) in ["i4", "int", "i2", "short", "i1", "byte", "S1", "char"].iter().enumerate() {
        let name = format!("n{}", i);
        ds.create_variable(&name, alias, &["x"], VariableOptions::default())
            .unwrap();
        let err = ds.write_variable(&name, &[0.0; 5]).unwrap_err();
        assert!(matches!(err, Error::UnsupportedType { .. }), "{}: {}", alias, err);
        let err = ds.read_variable(&name).unwrap_err();
        assert!(matches!(err, Error::UnsupportedType { .. }), "{}: {}", alias, err);
    }
    ds.write_variable("v", &[1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
    assert_eq!(ds.read_variable("v").unwrap(), vec![1.0, 2.0, 3.0, 4.0, 5.0]);

    let err = ds.read_variable("nope").unwrap_err();
    assert!(matches!(err, Error::UnknownVariable { .. }));

    // scalars hold one element
    ds.create_variable("s", "f8", &[], VariableOptions::default())
        .unwrap();
    ds.write_variable("s", &[2.5]).unwrap();
    assert_eq!(ds.read_variable("s").unwrap(), vec![2.5]);

    let f = ds
        .create_variable("f", "f4", &["x"], VariableOptions { fill_value: Some(-999.0) })
        .unwrap();
    assert_eq!(
        f.attributes.get("_FillValue"),
        Some(&AttrValue::Float(vec![-999.0]))
    );
    assert_eq!(ds.read_variable("f").unwrap(), vec![-999.0; 5]);
    ds.write_variable("f", &[0.5, 1.5, 2.5, 3.5, 4.5]).unwrap();
    assert_eq!(ds.read_variable("f").unwrap(), vec![0.5, 1.5, 2.5, 3.5, 4.5]);
}

pub fn test_float_roundtrip<E, F>(engine_gen: F)
where
    E: FormatEngine,
    F: Fn(Arc<dyn VirtualFs>) -> E,
{
    let nc = memory_session(&engine_gen);

    let mut ds = new_dataset(&nc);
    ds.create_dimension("x", Some(5)).unwrap();
    ds.create_variable("v", "f8", &["x"], VariableOptions::default())
        .unwrap();
    ds.write_variable("v", &[1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
    for (a, b) in ds.read_variable("v").unwrap().iter().zip([1.0, 2.0, 3.0, 4.0, 5.0]) {
        assert!((a - b).abs() < 1e-10);
    }

    let values = proptest::collection::vec(-1e12f64..1e12, 1..64);
    proptest!(ProptestConfig::with_cases(64), |(data in values)| {
        let mut ds = new_dataset(&nc);
        ds.create_dimension("x", Some(data.len() as i64)).unwrap();
        ds.create_variable("d", "f8", &["x"], VariableOptions::default()).unwrap();
        ds.create_variable("s", "f4", &["x"], VariableOptions::default()).unwrap();
        ds.write_variable("d", &data).unwrap();
        ds.write_variable("s", &data).unwrap();

        let d = ds.read_variable("d").unwrap();
        prop_assert_eq!(d.len(), data.len());
        for (a, b) in d.iter().zip(&data) {
            prop_assert!((a - b).abs() < 1e-10);
        }
        let s = ds.read_variable("s").unwrap();
        prop_assert_eq!(s.len(), data.len());
        for (a, b) in s.iter().zip(&data) {
            prop_assert!((a - b).abs() <= 1e-6 * b.abs().max(1.0));
        }
    });
}

/// Variables are defined through engine dimension ids, whatever order their
/// dimensions are named in.
pub fn test_dimension_order<E, F>(engine_gen: F)
where
    E: FormatEngine,
    F: Fn(Arc<dyn VirtualFs>) -> E,
{
    let nc = memory_session(&engine_gen);

    let mut ds = new_dataset(&nc);
    ds.create_dimension("a", Some(2)).unwrap();
    ds.create_dimension("b", Some(3)).unwrap();
    ds.create_variable("first", "f8", &["b"], VariableOptions::default())
        .unwrap();
    ds.create_dimension("c", Some(4)).unwrap();
    ds.create_variable("second", "f8", &["c", "a"], VariableOptions::default())
        .unwrap();
    ds.close().unwrap();
    let reopened = nc
        .open_bytes(ds.export_bytes().unwrap(), "r", OpenOptions::default(), None)
        .unwrap();
    assert_eq!(reopened.variable("first").unwrap().dimensions, vec!["b"]);
    assert_eq!(reopened.variable("second").unwrap().dimensions, vec!["c", "a"]);
    assert_eq!(reopened.read_variable("second").unwrap().len(), 8);

    proptest!(ProptestConfig::with_cases(32), |((dims, order) in dims_order_strat(4, 4))| {
        let mut ds = new_dataset(&nc);
        for (name, len) in &dims {
            ds.create_dimension(name, Some(*len as i64)).unwrap();
        }
        let names: Vec<&str> = order.iter().map(|s| s.as_str()).collect();
        let var = ds.create_variable("var", "f8", &names, VariableOptions::default()).unwrap();
        prop_assert_eq!(&var.dimensions, &order);

        let shape: Vec<usize> = order
            .iter()
            .map(|name| dims.iter().find(|(n, _)| n == name).map_or(0, |(_, len)| *len))
            .collect();
        let data: Vec<f64> = (0..shape.iter().product::<usize>()).map(|i| i as f64).collect();
        ds.write_variable("var", &data).unwrap();
        ds.close().unwrap();

        let reopened = nc.open_bytes(ds.export_bytes().unwrap(), "r", OpenOptions::default(), None).unwrap();
        prop_assert_eq!(&reopened.variable("var").unwrap().dimensions, &order);
        let arr = reopened.read_variable_array("var").unwrap();
        prop_assert_eq!(arr.shape(), shape.as_slice());
        prop_assert_eq!(arr.into_raw_vec(), data);
    });
}

/// Bytes in, bytes out, and the exported bytes open again with their
/// metadata intact.
pub fn test_bytes_roundtrip<E, F>(engine_gen: F)
where
    E: FormatEngine,
    F: Fn(Arc<dyn VirtualFs>) -> E,
{
    let nc = memory_session(&engine_gen);
    let mut ds = nc
        .open_bytes(Vec::new(), "w", OpenOptions::default(), None)
        .unwrap();
    assert!(ds.is_memory_backed());
    ds.create_dimension("x", Some(5)).unwrap();
    ds.create_variable("v", "f8", &["x"], VariableOptions::default())
        .unwrap();
    ds.write_variable("v", &[1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
    ds.set_attribute("title", "roundtrip").unwrap();
    ds.set_variable_attribute("v", "units", "K").unwrap();
    ds.close().unwrap();

    let bytes = ds.export_bytes().unwrap();
    assert!(!bytes.is_empty());
    let download = ds.export_download(None).unwrap();
    assert_eq!(download.mime_type, DEFAULT_MIME_TYPE);
    assert_eq!(download.bytes, bytes);
    assert_eq!(
        ds.export_download(Some("application/octet-stream")).unwrap().mime_type,
        "application/octet-stream"
    );

    // a separate session knows nothing of the first one's files
    let other = memory_session(&engine_gen);
    let mut reopened = other
        .open_bytes(bytes.clone(), "r", OpenOptions::default(), None)
        .unwrap();
    assert_eq!(reopened.dimension("x").unwrap().size(), 5);
    let v = reopened.variable("v").unwrap();
    assert_eq!(v.nc_type, NcType::Double);
    assert_eq!(v.dimensions, vec!["x"]);
    assert_eq!(reopened.read_variable("v").unwrap(), vec![1.0, 2.0, 3.0, 4.0, 5.0]);
    assert_eq!(reopened.get_attribute("title"), Some(&AttrValue::from("roundtrip")));
    assert_eq!(
        reopened.get_variable_attribute("v", "units"),
        Some(&AttrValue::from("K"))
    );
    let err = reopened.create_dimension("y", Some(1)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::EngineRejected);
    assert!(reopened.dimension("y").is_none());

    let mut appended = other
        .open_bytes(bytes, "a", OpenOptions::default(), Some("appended.nc"))
        .unwrap();
    appended.create_dimension("y", Some(2)).unwrap();
    appended
        .create_variable("w", "f4", &["y"], VariableOptions::default())
        .unwrap();
    appended.write_variable("w", &[0.5, 1.5]).unwrap();
    // exporting an open handle flushes it first
    let bytes = appended.export_bytes().unwrap();
    let again = other
        .open_bytes(bytes, "r+", OpenOptions::default(), None)
        .unwrap();
    assert_eq!(again.read_variable("v").unwrap(), vec![1.0, 2.0, 3.0, 4.0, 5.0]);
    assert_eq!(again.read_variable("w").unwrap(), vec![0.5, 1.5]);
    assert_eq!(again.list_attributes(), vec!["title"]);
}

pub fn test_close<E, F>(engine_gen: F)
where
    E: FormatEngine,
    F: Fn(Arc<dyn VirtualFs>) -> E,
{
    let engine = RecordingEngine::new(engine_gen(Arc::new(MemoryFs::new())));
    let log = engine.log();
    let nc = NetCdf::new(engine);

    let mut ds = new_dataset(&nc);
    ds.create_dimension("x", Some(2)).unwrap();
    ds.create_variable("v", "f8", &["x"], VariableOptions::default())
        .unwrap();
    assert!(ds.is_open());
    assert_eq!(ds.state(), DatasetState::Open);

    ds.close().unwrap();
    assert!(!ds.is_open());
    assert_eq!(ds.state(), DatasetState::Closed);
    assert!(ds.ncid().is_none());
    ds.close().unwrap();
    assert_eq!(log.count("close"), 1);

    let errors = vec![
        ds.create_dimension("y", Some(1)).unwrap_err(),
        ds.create_variable("w", "f8", &["x"], VariableOptions::default())
            .unwrap_err(),
        ds.read_variable("v").unwrap_err(),
        ds.write_variable("v", &[1.0, 2.0]).unwrap_err(),
        ds.set_attribute("a", 1i32).unwrap_err(),
        ds.create_group("g").unwrap_err(),
        ds.sync().unwrap_err(),
        ds.format().unwrap_err(),
    ];
    for err in errors {
        assert_eq!(err.kind(), ErrorKind::StateMisuse);
        assert!(matches!(err, Error::NotOpen { state: DatasetState::Closed, .. }));
    }
    assert!(ds.dimension("x").is_none());

    // dropping an open handle closes it
    {
        let _ds = new_dataset(&nc);
    }
    assert_eq!(log.count("close"), 2);
    drop(ds);
    assert_eq!(log.count("close"), 2);
}

pub fn test_attributes<E, F>(engine_gen: F)
where
    E: FormatEngine,
    F: Fn(Arc<dyn VirtualFs>) -> E,
{
    let nc = memory_session(&engine_gen);
    let mut ds = new_dataset(&nc);
    ds.create_dimension("x", Some(1)).unwrap();
    ds.create_variable("v", "f8", &["x"], VariableOptions::default())
        .unwrap();

    assert!(ds.get_attribute("title").is_none());
    ds.set_attribute("title", "first").unwrap();
    ds.set_attribute("version", 2i32).unwrap();
    ds.set_attribute("title", "second").unwrap();
    assert_eq!(ds.list_attributes(), vec!["title", "version"]);
    assert_eq!(ds.get_attribute("title").unwrap().as_text(), Some("second"));
    assert_eq!(ds.get_attribute("version").unwrap().as_f64(), Some(2.0));

    ds.set_variable_attribute("v", "valid_range", vec![0.0f64, 10.0])
        .unwrap();
    assert_eq!(ds.list_variable_attributes("v"), Some(vec!["valid_range".to_string()]));
    assert!(ds.list_variable_attributes("nope").is_none());
    let err = ds.set_variable_attribute("nope", "a", 1i32).unwrap_err();
    assert!(matches!(err, Error::UnknownVariable { .. }));

    let group = ds.create_group("forecast").unwrap();
    assert_eq!(Some(group.ncid), ds.ncid());
    assert_eq!(ds.group("forecast"), Some(group));
    assert!(matches!(
        ds.create_group("forecast").unwrap_err(),
        Error::DuplicateName { .. }
    ));
    ds.set_group_attribute("forecast", "source", "model").unwrap();
    assert_eq!(
        ds.get_group_attribute("forecast", "source"),
        Some(&AttrValue::from("model"))
    );
    assert!(matches!(
        ds.set_group_attribute("hindcast", "a", 1i32).unwrap_err(),
        Error::UnknownGroup { .. }
    ));
    assert_eq!(ds.groups(), vec!["forecast"]);

    let attrs = proptest::collection::hash_map(name_strat(), attr_value_strat(), 1..6);
    proptest!(ProptestConfig::with_cases(32), |(attrs in attrs)| {
        let mut ds = new_dataset(&nc);
        ds.create_dimension("x", Some(1)).unwrap();
        ds.create_variable("v", "f8", &["x"], VariableOptions::default()).unwrap();
        for (name, value) in &attrs {
            ds.set_attribute(name, value.clone()).unwrap();
            ds.set_variable_attribute("v", name, value.clone()).unwrap();
        }
        ds.close().unwrap();

        let reopened = nc.open_bytes(ds.export_bytes().unwrap(), "r", OpenOptions::default(), None).unwrap();
        prop_assert_eq!(reopened.list_attributes().len(), attrs.len());
        for (name, value) in &attrs {
            prop_assert_eq!(reopened.get_attribute(name), Some(value));
            prop_assert_eq!(reopened.get_variable_attribute("v", name), Some(value));
        }
    });
}

/// Unlimited dimensions contribute nothing to the readable element count.
pub fn test_record_variables<E, F>(engine_gen: F)
where
    E: FormatEngine,
    F: Fn(Arc<dyn VirtualFs>) -> E,
{
    let nc = memory_session(&engine_gen);
    let mut ds = new_dataset(&nc);
    ds.create_dimension("time", None).unwrap();
    ds.create_dimension("x", Some(2)).unwrap();
    ds.create_variable("r", "f8", &["time", "x"], VariableOptions::default())
        .unwrap();
    assert_eq!(ds.read_variable("r").unwrap(), Vec::<f64>::new());
    assert_eq!(ds.read_variable_array("r").unwrap().shape(), &[0, 2]);
    ds.close().unwrap();

    let reopened = nc
        .open_bytes(ds.export_bytes().unwrap(), "r", OpenOptions::default(), None)
        .unwrap();
    let time = reopened.dimension("time").unwrap();
    assert!(time.is_unlimited());
    assert_eq!(time.size(), UNLIMITED);
    assert_eq!(reopened.dimension("x").unwrap().size(), 2);
}

pub fn test_export_unavailable<E, F>(engine_gen: F)
where
    E: FormatEngine,
    F: Fn(Arc<dyn VirtualFs>) -> E,
{
    let nc = memory_session(&engine_gen);
    let ds = nc
        .open_path("/tmp/plain.nc", "w", OpenOptions::default())
        .unwrap();
    assert!(!ds.is_memory_backed());
    let err = ds.export_bytes().unwrap_err();
    assert!(matches!(err, Error::ExportUnavailable { .. }));
    assert_eq!(err.kind(), ErrorKind::Unavailable);

    let engine = RecordingEngine::without_vfs(engine_gen(Arc::new(MemoryFs::new())));
    let nc = NetCdf::new(engine);
    let mut ds = nc
        .open_bytes(Vec::new(), "w", OpenOptions::default(), None)
        .unwrap();
    ds.create_dimension("x", Some(1)).unwrap();
    let err = ds.export_download(None).unwrap_err();
    assert!(matches!(err, Error::ExportUnavailable { .. }));
}

/// A failed mount is not an error by itself.
pub fn test_mount_failure<E, F>(engine_gen: F)
where
    E: FormatEngine,
    F: Fn(Arc<dyn VirtualFs>) -> E,
{
    let fs = MemoryFs::new();
    let nc = NetCdf::new(engine_gen(Arc::new(FailingMountFs::new(fs.clone()))));

    let mut ds = nc
        .open_bytes(vec![1u8, 2, 3], "w", OpenOptions::default(), Some("created.nc"))
        .unwrap();
    ds.create_dimension("x", Some(1)).unwrap();
    ds.close().unwrap();
    assert!(!ds.export_bytes().unwrap().is_empty());
    assert!(fs.exists(std::path::Path::new("/tmp/created.nc")));

    let err = nc
        .open_bytes(vec![1u8, 2, 3], "r", OpenOptions::default(), Some("missing.nc"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::EngineRejected);
    assert_eq!(err.status(), Some(Status::ENOENT));
    assert_eq!(err.op(), "open");
    assert_eq!(err.resource(), "/tmp/missing.nc");
}

/// Datasets on the host filesystem.
pub fn test_open_path<E, F>(engine_gen: F)
where
    E: FormatEngine,
    F: Fn(Arc<dyn VirtualFs>) -> E,
{
    with_tmp_dir(|dir| {
        let nc = NetCdf::new(engine_gen(Arc::new(DiskFs::new())));
        let path = dir.join("disk.nc");

        let mut ds = nc.open_path(&path, "w", OpenOptions::default()).unwrap();
        ds.create_dimension("x", Some(3)).unwrap();
        ds.create_variable("v", "f8", &["x"], VariableOptions::default())
            .unwrap();
        ds.write_variable("v", &[0.1, 0.2, 0.3]).unwrap();
        ds.close().unwrap();
        assert!(path.is_file());

        let err = nc
            .open_path(&path, "w-", OpenOptions::default())
            .unwrap_err();
        assert_eq!(err.status(), Some(Status::EEXIST));

        let ds = nc
            .open(Source::Path(path.clone()), "r", OpenOptions::default())
            .unwrap();
        assert_eq!(ds.read_variable("v").unwrap(), vec![0.1, 0.2, 0.3]);

        let err = nc
            .open_path(dir.join("missing.nc"), "r", OpenOptions::default())
            .unwrap_err();
        assert_eq!(err.status(), Some(Status::ENOENT));
        assert!(err.resource().ends_with("missing.nc"));
    })
}

/// Handles on distinct datasets can be driven from different threads.
pub fn test_concurrent_handles<E, F>(engine_gen: F)
where
    E: FormatEngine,
    F: Fn(Arc<dyn VirtualFs>) -> E,
{
    let nc = memory_session(&engine_gen);
    let exported: Vec<(usize, Vec<u8>)> = std::thread::scope(|s| {
        let workers: Vec<_> = (0..4)
            .map(|i| {
                let nc = nc.clone();
                s.spawn(move || {
                    let mut ds = new_dataset(&nc);
                    ds.create_dimension("x", Some(3)).unwrap();
                    ds.create_variable("v", "f8", &["x"], VariableOptions::default())
                        .unwrap();
                    let data = vec![i as f64; 3];
                    ds.write_variable("v", &data).unwrap();
                    assert_eq!(ds.read_variable("v").unwrap(), data);
                    ds.close().unwrap();
                    (i, ds.export_bytes().unwrap())
                })
            })
            .collect();
        workers.into_iter().map(|w| w.join().unwrap()).collect()
    });

    for (i, bytes) in exported {
        let ds = nc
            .open_bytes(bytes, "r", OpenOptions::default(), None)
            .unwrap();
        assert_eq!(ds.read_variable("v").unwrap(), vec![i as f64; 3]);
    }
}
