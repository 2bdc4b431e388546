//! Whole-session scenarios: create, grow, annotate, reopen.

use planter::{Axis, ChannelSpec, MarkTags, Matrix, OpenMode, PlantedContainer, PlanterConfig, PlanterError};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn recording_session() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let mut p = PlantedContainer::new();
    let path = p.create(dir.path().join("dummy"), Some(2000.0)).unwrap();
    assert!(path.ends_with("dummy.h5"));
    assert!(p.is_writable());
    assert_eq!(p.mode(), Some(OpenMode::Exclusive));

    let spec = ChannelSpec::new()
        .names(&["ch_1", "ch_2", "ch_3", "ch_4"])
        .datacache("RAW")
        .units(&["mv", "mv", "Nm-1", "Pa"][..]);
    p.series().unwrap().create_dataset(Matrix::filled(4, 200, 1.0), &spec).unwrap();
    p.flush().unwrap();

    p.series().unwrap().add_samples(Matrix::filled(4, 200, 2.0), Axis::Samples).unwrap();
    let new_channel = ChannelSpec::new().names(&["ch_5"]).datacache("RAW").units("mV");
    p.series().unwrap().add_channels(Matrix::filled(1, 400, 3.0), &new_channel).unwrap();
    p.marks()
        .unwrap()
        .add_mark(Some(100), Some(250), &MarkTags::new().group("artifact").channel("ch_5"))
        .unwrap();
    p.close().unwrap();
    assert!(!p.is_open());

    p.open(&path, OpenMode::Append).unwrap();
    let s = p.series().unwrap();
    assert_eq!(s.shape(), Some((5, 400)));
    let data = s.data().unwrap();
    assert_eq!(data.get(0, 199), Some(1.0));
    assert_eq!(data.get(3, 200), Some(2.0));
    assert_eq!(data.get(4, 0), Some(3.0));
    assert_eq!(s.list_channels().unwrap().last().map(String::as_str), Some("ch_5"));
    assert_eq!(p.marks().unwrap().len(), 1);
    assert_eq!(p.attributes().unwrap().sampling_frequency(), Some(2000.0));

    assert!(matches!(p.file_from_mark("artifact", ""), Err(PlanterError::NotImplemented(_))));
    p.close().unwrap();
}

#[test]
fn create_refuses_to_overwrite() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let mut p = PlantedContainer::new();
    let path = p.create(dir.path().join("once.h5"), Some(1.0)).unwrap();
    p.close().unwrap();

    match p.create(&path, Some(2.0)) {
        Err(PlanterError::AlreadyExists(existing)) => assert_eq!(existing, path),
        other => panic!("expected AlreadyExists, got {other:?}"),
    }
    assert!(!p.is_open());

    p.open(&path, OpenMode::Read).unwrap();
    assert_eq!(p.attributes().unwrap().sampling_frequency(), Some(1.0));
}

#[test]
fn compressed_storage_reads_back() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let config = PlanterConfig::default().with_deflate(Some(6)).with_chunk_target_bytes(8 * 1024);
    let mut p = PlantedContainer::with_config(config);
    let path = p.create(dir.path().join("packed.h5"), Some(250.0)).unwrap();
    let values: Vec<f32> = (0..3 * 10_000).map(|i| (i % 17) as f32).collect();
    let matrix = Matrix::new(3, 10_000, values).unwrap();
    p.series().unwrap().create_dataset(matrix.clone(), &ChannelSpec::new()).unwrap();
    p.close().unwrap();

    assert!(std::fs::metadata(&path).unwrap().len() < (3 * 10_000 * 4) as u64);
    let mut reader = PlantedContainer::new();
    reader.open(&path, OpenMode::Read).unwrap();
    assert_eq!(reader.series().unwrap().data(), Some(&matrix));
}

#[test]
fn opening_a_missing_file_read_only_fails() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let mut p = PlantedContainer::new();
    let err = p.open(dir.path().join("absent.h5"), OpenMode::Read).unwrap_err();
    assert!(matches!(err, PlanterError::Io(_)));
    assert!(!p.is_open());
}
