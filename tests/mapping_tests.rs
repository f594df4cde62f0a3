//! Mapping file I/O against real files on disk.

use std::fs;

use reobf::common::consts::{DEOBF_NAMESPACE, SPIGOT_NAMESPACE};
use reobf::mapping::tiny::{read_mapping_file, write_mapping_file};
use reobf::mapping::{FieldKey, MappingSet};
use reobf::Error;
use tempfile::TempDir;

fn sample_set() -> MappingSet {
    let mut set = MappingSet::new();
    let class = set.get_or_create_class("a");
    class.deobf_name = Some("com/x/Foo".to_string());
    class.get_or_create_method("m", "(I)V").deobf_name = Some("doThing".to_string());
    class
        .get_or_create_field(FieldKey::new("x", Some("I".to_string())))
        .deobf_name = Some("count".to_string());
    set.get_or_create_class("a$b").deobf_name = Some("Inner".to_string());
    set
}

#[test]
fn file_round_trip() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("mappings.tiny");
    let set = sample_set();

    write_mapping_file(&set, &path, SPIGOT_NAMESPACE, DEOBF_NAMESPACE).unwrap();
    let reread = read_mapping_file(&path, SPIGOT_NAMESPACE, DEOBF_NAMESPACE).unwrap();
    assert_eq!(reread, set);
}

#[test]
fn inner_classes_are_written_with_full_names() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("mappings.tiny");

    write_mapping_file(&sample_set(), &path, SPIGOT_NAMESPACE, DEOBF_NAMESPACE).unwrap();
    let text = fs::read_to_string(&path).unwrap();
    assert!(text.contains("c\ta$b\tcom/x/Foo$Inner\n"));
}

#[test]
fn reversing_twice_is_identity() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("mappings.tiny");
    write_mapping_file(&sample_set(), &path, SPIGOT_NAMESPACE, DEOBF_NAMESPACE).unwrap();

    let set = read_mapping_file(&path, SPIGOT_NAMESPACE, DEOBF_NAMESPACE).unwrap();
    assert_eq!(set.reverse().reverse(), set);
}

#[test]
fn missing_file_is_an_io_error() {
    let tmp = TempDir::new().unwrap();
    let err = read_mapping_file(
        &tmp.path().join("nope.tiny"),
        SPIGOT_NAMESPACE,
        DEOBF_NAMESPACE,
    )
    .unwrap_err();
    assert!(matches!(err, Error::Io(_)));
}

#[test]
fn undeclared_namespace_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("mappings.tiny");
    write_mapping_file(&sample_set(), &path, SPIGOT_NAMESPACE, DEOBF_NAMESPACE).unwrap();

    let err = read_mapping_file(&path, "official", DEOBF_NAMESPACE).unwrap_err();
    assert!(matches!(err, Error::MalformedMapping { line: 1, .. }));
}
