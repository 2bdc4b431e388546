//! Marks and root attributes through the façade.

use planter::attributes::Value;
use planter::{AttrKind, AttrValue, Axis, MarkField, MarkTags, Matrix, OpenMode, PlantedContainer, PlanterError};
use planter_format::attribute::AttributeMessage;
use planter_format::dataspace::Dataspace;
use planter_format::datatype::Datatype;
use planter_format::type_builders::make_fixed_string_type;
use planter_format::FileWriter;
use serde_json::json;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn created(dir: &tempfile::TempDir, fs: Option<f32>) -> (PlantedContainer, std::path::PathBuf) {
    init_logging();
    let mut p = PlantedContainer::new();
    let path = p.create(dir.path().join("annotated.h5"), fs).unwrap();
    (p, path)
}

// ---------------------------------------------------------------------------
// Marks
// ---------------------------------------------------------------------------

#[test]
fn single_sample_mark_and_bad_range() {
    let dir = tempfile::tempdir().unwrap();
    let (mut p, path) = created(&dir, None);
    let mut m = p.marks().unwrap();
    m.add_mark(None, Some(3), &MarkTags::new()).unwrap();
    assert!(m.list().is_none());

    m.add_mark(Some(5), None, &MarkTags::new()).unwrap();
    let err = m.add_mark(Some(10), Some(3), &MarkTags::new()).unwrap_err();
    assert!(matches!(err, PlanterError::InvalidMarkRange { start: 10, end: 3 }));
    assert_eq!(m.len(), 1);
    p.close().unwrap();

    p.open(&path, OpenMode::Read).unwrap();
    let marks = p.marks().unwrap();
    let mark = &marks.list().unwrap()[0];
    assert_eq!((mark.sample_left, mark.sample_right), (5, 5));
    assert_eq!(mark.validity, 0.0);
    assert_eq!(mark.group, "");
}

#[test]
fn remove_marks_by_field_preserves_order() {
    let dir = tempfile::tempdir().unwrap();
    let (mut p, path) = created(&dir, Some(100.0));
    let mut m = p.marks().unwrap();
    for (i, group) in ["g1", "g2", "g1", "g3"].iter().enumerate() {
        let tags = MarkTags::new().group(*group).channel("ECG").info(format!("m{i}")).validity(1.0);
        m.add_mark(Some(i as i32 * 10), Some(i as i32 * 10 + 5), &tags).unwrap();
    }
    assert_eq!(m.remove_marks(Some("g1"), MarkField::Group).unwrap(), 2);
    assert_eq!(m.remove_marks(Some("absent"), "info".parse().unwrap()).unwrap(), 0);
    p.close().unwrap();

    p.open(&path, OpenMode::ReadWrite).unwrap();
    let mut m = p.marks().unwrap();
    let infos: Vec<&str> = m.list().unwrap().iter().map(|mk| mk.info.as_str()).collect();
    assert_eq!(infos, vec!["m1", "m3"]);

    assert_eq!(m.remove_marks(Some("ECG"), MarkField::Channel).unwrap(), 2);
    assert!(m.list().is_none());
}

#[test]
fn remove_all_marks_deletes_the_dataset() {
    let dir = tempfile::tempdir().unwrap();
    let (mut p, path) = created(&dir, None);
    let mut m = p.marks().unwrap();
    assert_eq!(m.remove_marks(None, MarkField::Group).unwrap(), 0);
    m.add_mark(Some(1), Some(2), &MarkTags::new()).unwrap();
    m.add_mark(Some(3), Some(4), &MarkTags::new()).unwrap();
    assert_eq!(m.remove_marks(None, MarkField::default()).unwrap(), 2);
    p.close().unwrap();

    p.open(&path, OpenMode::Read).unwrap();
    assert!(p.marks().unwrap().is_empty());
}

#[test]
fn marks_ignore_sample_removal() {
    let dir = tempfile::tempdir().unwrap();
    let (mut p, _) = created(&dir, None);
    p.series().unwrap().create_dataset(Matrix::zeros(1, 10), &Default::default()).unwrap();
    p.marks().unwrap().add_mark(Some(8), Some(9), &MarkTags::new()).unwrap();
    p.series().unwrap().remove_samples(0..10).unwrap();
    let marks = p.marks().unwrap();
    assert_eq!(marks.list().unwrap()[0].sample_right, 9);
}

#[test]
fn long_tags_are_truncated() {
    let dir = tempfile::tempdir().unwrap();
    let (mut p, _) = created(&dir, None);
    let mut m = p.marks().unwrap();
    m.add_mark(Some(0), None, &MarkTags::new().info("x".repeat(400))).unwrap();
    assert_eq!(m.list().unwrap()[0].info.len(), 256);
}

// ---------------------------------------------------------------------------
// Attributes
// ---------------------------------------------------------------------------

#[test]
fn create_stores_provenance() {
    let dir = tempfile::tempdir().unwrap();
    let (mut p, path) = created(&dir, Some(2000.0));
    p.close().unwrap();

    p.open(&path, OpenMode::Read).unwrap();
    let a = p.attributes().unwrap();
    assert_eq!(a.list(), vec!["Fs", "GeneratedBy", "LeftI", "RightI"]);
    assert_eq!(a.get("Fs"), Some(&AttrValue::F32Array(vec![2000.0])));
    assert_eq!(a.get("GeneratedBy"), Some(&AttrValue::String("planter".into())));
    assert_eq!(a.attr_type("LeftI"), Some(AttrKind::I64));
    assert_eq!(a.attr_type("missing"), None);
}

#[test]
fn missing_sampling_frequency_is_nan() {
    let dir = tempfile::tempdir().unwrap();
    let (mut p, _) = created(&dir, None);
    assert!(p.attributes().unwrap().sampling_frequency().unwrap().is_nan());
}

#[test]
fn only_numeric_attributes_are_added() {
    let dir = tempfile::tempdir().unwrap();
    let (mut p, path) = created(&dir, None);
    let mut a = p.attributes().unwrap();
    a.add_attributes(&json!({"a": 500, "b": "text", "c": 0.25, "flag": true})).unwrap();
    a.add_attributes(&json!([1, 2, 3])).unwrap();
    a.add_attributes(&Value::Null).unwrap();
    a.remove_attributes(["c", "missing"]).unwrap();
    p.close().unwrap();

    p.open(&path, OpenMode::Read).unwrap();
    let a = p.attributes().unwrap();
    assert_eq!(a.get("a"), Some(&AttrValue::F32Array(vec![500.0])));
    assert_eq!(a.get("b"), None);
    assert_eq!(a.get("c"), None);
    assert_eq!(a.attr_type("a"), Some(AttrKind::F32Array));
    assert_eq!(a.get("flag"), Some(&AttrValue::F32Array(vec![1.0])));
}

#[test]
fn set_replaces_a_value() {
    let dir = tempfile::tempdir().unwrap();
    let (mut p, _) = created(&dir, Some(1.0));
    let mut a = p.attributes().unwrap();
    a.set("Fs", AttrValue::F32Array(vec![256.0])).unwrap();
    assert_eq!(a.sampling_frequency(), Some(256.0));
}

/// A container whose root carries `Comment` as a variable-length string,
/// the way h5py stores a Python `str`. The global heap collection holding
/// the text is appended after the rest of the image.
fn with_vl_comment(text: &str) -> Vec<u8> {
    let vl = Datatype::VariableLength {
        is_string: true,
        base_type: Box::new(make_fixed_string_type(1)),
    };
    let image = |heap_address: u64| {
        let mut heap_id = (text.len() as u32).to_le_bytes().to_vec();
        heap_id.extend_from_slice(&heap_address.to_le_bytes());
        heap_id.extend_from_slice(&1u32.to_le_bytes());
        let mut writer = FileWriter::new();
        writer.add_root_attribute(AttributeMessage::new("Comment", vl.clone(), Dataspace::scalar(), heap_id));
        writer.add_root_attribute(AttrValue::F32Array(vec![500.0]).to_message("Fs"));
        writer.finish().unwrap()
    };
    let heap_address = image(0).len() as u64;
    let mut file = image(heap_address);

    let padded = (text.len() + 7) & !7;
    file.extend_from_slice(b"GCOL");
    file.extend_from_slice(&[1, 0, 0, 0]);
    file.extend_from_slice(&((16 + 16 + padded + 16) as u64).to_le_bytes());
    file.extend_from_slice(&1u16.to_le_bytes());
    file.extend_from_slice(&1u16.to_le_bytes());
    file.extend_from_slice(&[0; 4]);
    file.extend_from_slice(&(text.len() as u64).to_le_bytes());
    file.extend_from_slice(text.as_bytes());
    file.resize(file.len() + padded - text.len(), 0);
    file.extend_from_slice(&[0; 16]);
    file
}

#[test]
fn variable_length_string_attribute_survives_edits() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("h5py_style.h5");
    std::fs::write(&path, with_vl_comment("resting ECG, lead II")).unwrap();
    let comment = AttrValue::String("resting ECG, lead II".into());

    let mut p = PlantedContainer::new();
    p.open(&path, OpenMode::Append).unwrap();
    assert_eq!(p.attributes().unwrap().get("Comment"), Some(&comment));
    p.marks().unwrap().add_mark(Some(1), Some(2), &MarkTags::new()).unwrap();
    p.attributes().unwrap().add_attributes(&json!({"gain": 2})).unwrap();
    p.close().unwrap();

    p.open(&path, OpenMode::Read).unwrap();
    let a = p.attributes().unwrap();
    assert_eq!(a.get("Comment"), Some(&comment));
    assert_eq!(a.attr_type("Comment"), Some(AttrKind::String));
    assert_eq!(a.sampling_frequency(), Some(500.0));
    assert_eq!(a.list(), vec!["Comment", "Fs", "gain"]);
}

#[test]
fn edits_without_effect_leave_the_file_untouched() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("untouched.h5");
    let image = with_vl_comment("x");
    std::fs::write(&path, &image).unwrap();

    let mut p = PlantedContainer::new();
    p.open(&path, OpenMode::ReadWrite).unwrap();
    let mut a = p.attributes().unwrap();
    a.add_attributes(&json!({"note": "text only"})).unwrap();
    a.remove_attributes(["absent"]).unwrap();
    p.close().unwrap();
    assert_eq!(std::fs::read(&path).unwrap(), image);
}

#[test]
fn read_only_handle_rejects_every_edit() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let (mut p, path) = created(&dir, Some(100.0));
    p.close().unwrap();
    p.open(&path, OpenMode::Read).unwrap();

    let ro = |r: planter::Result<usize>| matches!(r, Err(PlanterError::ReadOnly));
    let mut s = p.series().unwrap();
    assert!(ro(s.remove_samples(0..1)));
    assert!(ro(s.remove_channels(["absent"], Default::default())));
    assert!(ro(s.remove_datacache("RAW")));
    assert!(matches!(s.add_samples(Matrix::zeros(1, 1), Axis::Samples), Err(PlanterError::ReadOnly)));
    assert!(matches!(s.create_dataset(Matrix::zeros(1, 1), &Default::default()), Err(PlanterError::ReadOnly)));

    let mut m = p.marks().unwrap();
    assert!(ro(m.remove_marks(None, MarkField::Group)));
    assert!(matches!(m.add_mark(None, None, &MarkTags::new()), Err(PlanterError::ReadOnly)));

    let mut a = p.attributes().unwrap();
    assert!(matches!(a.add_attributes(&Value::Null), Err(PlanterError::ReadOnly)));
    assert!(matches!(a.remove_attributes(["absent"]), Err(PlanterError::ReadOnly)));
    assert!(matches!(a.set("Fs", AttrValue::F64(1.0)), Err(PlanterError::ReadOnly)));
}
