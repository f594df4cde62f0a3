//! Classpath index construction from real containers: jar archives and
//! directory trees of assembled classfiles.

mod common;

use std::fs::File;
use std::io::Write;

use common::ClassFileBuilder;
use reobf::classpath::{BuildOptions, ClasspathIndex, ProviderRoot};
use reobf::common::consts::access_flags::ACC_PUBLIC;
use reobf::Error;
use tempfile::TempDir;
use zip::write::FileOptions;
use zip::ZipWriter;

#[test]
fn index_from_jar_container() {
    let tmp = TempDir::new().unwrap();
    let jar = tmp.path().join("input.jar");
    let mut writer = ZipWriter::new(File::create(&jar).unwrap());
    writer
        .start_file("com/x/Foo.class", FileOptions::default())
        .unwrap();
    writer
        .write_all(
            &ClassFileBuilder::new("com/x/Foo", "java/lang/Object")
                .field("flag", "I")
                .method("doThing", "(I)V", ACC_PUBLIC)
                .build(),
        )
        .unwrap();
    // non-class entries are ignored
    writer
        .start_file("META-INF/MANIFEST.MF", FileOptions::default())
        .unwrap();
    writer.write_all(b"Manifest-Version: 1.0\n").unwrap();
    writer.finish().unwrap();

    let index = ClasspathIndex::build(
        &[ProviderRoot::from_path(&jar)],
        &[],
        &BuildOptions::default(),
    )
    .unwrap();

    let foo = index.get("com/x/Foo").unwrap();
    assert_eq!(foo.super_name.as_deref(), Some("java/lang/Object"));
    assert!(foo.find_field("flag", Some("I")).is_some());
    assert!(foo.find_method("doThing", "(I)V").is_some());
}

#[test]
fn index_from_directory_tree() {
    let tmp = TempDir::new().unwrap();
    let classes = tmp.path().join("classes");
    ClassFileBuilder::new("com/x/Sub", "com/x/Foo")
        .write_to(&classes)
        .unwrap();
    ClassFileBuilder::new("com/x/Foo", "java/lang/Object")
        .write_to(&classes)
        .unwrap();

    let runtime = tmp.path().join("runtime");
    ClassFileBuilder::new("java/lang/Object", "")
        .write_to(&runtime)
        .unwrap();

    let index = ClasspathIndex::build(
        &[ProviderRoot::from_path(&classes)],
        &[ProviderRoot::from_path(&runtime)],
        &BuildOptions::default(),
    )
    .unwrap();

    // only the primary root's classes are iterated
    let primary: Vec<&str> = index.primary_classes().map(|c| c.name.as_str()).collect();
    assert_eq!(primary, vec!["com/x/Foo", "com/x/Sub"]);

    let sub = index.get("com/x/Sub").unwrap();
    let ancestors: Vec<&str> = index
        .ancestors(sub)
        .iter()
        .map(|c| c.name.as_str())
        .collect();
    assert_eq!(ancestors, vec!["com/x/Foo", "java/lang/Object"]);
}

#[test]
fn full_classpath_requirement_fails_on_missing_supertype() {
    let tmp = TempDir::new().unwrap();
    let classes = tmp.path().join("classes");
    ClassFileBuilder::new("com/x/Sub", "com/x/Missing")
        .write_to(&classes)
        .unwrap();

    let options = BuildOptions {
        parallelism: 1,
        require_full_classpath: true,
    };
    let err = ClasspathIndex::build(&[ProviderRoot::from_path(&classes)], &[], &options)
        .unwrap_err();
    assert!(matches!(err, Error::ClasspathResolution { .. }));
}

#[test]
fn sharded_parse_matches_serial_parse() {
    let tmp = TempDir::new().unwrap();
    let classes = tmp.path().join("classes");
    for name in ["a", "b", "c", "d", "e"] {
        ClassFileBuilder::new(name, "java/lang/Object")
            .write_to(&classes)
            .unwrap();
    }

    let roots = [ProviderRoot::from_path(&classes)];
    let serial = ClasspathIndex::build(&roots, &[], &BuildOptions::default()).unwrap();
    let sharded = ClasspathIndex::build(
        &roots,
        &[],
        &BuildOptions {
            parallelism: 4,
            require_full_classpath: false,
        },
    )
    .unwrap();

    let serial_names: Vec<&str> = serial.primary_classes().map(|c| c.name.as_str()).collect();
    let sharded_names: Vec<&str> = sharded.primary_classes().map(|c| c.name.as_str()).collect();
    assert_eq!(serial_names, sharded_names);
}
