//! Classpath index: structural facts for an input binary plus a baseline runtime
//!
//! The index is built once per reobfuscation run from a primary bytecode
//! container (the binary being remapped) and any number of context-only
//! roots (a reference runtime used purely for supertype resolution).
//! Contributors iterate the primary classes; context classes only answer
//! hierarchy queries. Container handles are released when the build
//! returns; the index itself holds no open files.

pub mod classfile;
pub mod descriptor;

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;
use zip::ZipArchive;

use crate::common::consts::{access_flags, CONSTRUCTOR_METHOD_NAME};
use crate::common::{Error, Result};
use crate::mapping::MemberRef;

/// Structural facts for one class, read from its classfile and never mutated
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassData {
    /// Internal name, e.g. `com/x/Foo` or `a$b`
    pub name: String,
    pub super_name: Option<String>,
    pub interfaces: Vec<String>,
    pub outer_class: Option<String>,
    pub access_flags: u16,
    pub fields: Vec<FieldData>,
    pub methods: Vec<MethodData>,
}

impl ClassData {
    /// Minimal synthetic class data, used by unit tests and by callers
    /// assembling an index without real classfiles.
    pub fn synthetic(name: impl Into<String>, super_name: Option<&str>) -> Self {
        let name = name.into();
        let outer_class = name.rfind('$').map(|idx| name[..idx].to_string());
        Self {
            name,
            super_name: super_name.map(str::to_string),
            interfaces: Vec::new(),
            outer_class,
            access_flags: access_flags::ACC_PUBLIC,
            fields: Vec::new(),
            methods: Vec::new(),
        }
    }

    pub fn find_method(&self, name: &str, descriptor: &str) -> Option<&MethodData> {
        self.methods
            .iter()
            .find(|m| m.name == name && m.descriptor == descriptor)
    }

    pub fn find_field(&self, name: &str, ty: Option<&str>) -> Option<&FieldData> {
        self.fields.iter().find(|f| {
            f.name == name
                && match ty {
                    Some(t) => f.descriptor == t,
                    None => true,
                }
        })
    }
}

/// Per-method structural facts, including the invocations scanned from the
/// Code attribute (consumed by hydration)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodData {
    pub name: String,
    pub descriptor: String,
    pub access_flags: u16,
    pub invocations: Vec<MemberRef>,
}

impl MethodData {
    pub fn is_bridge(&self) -> bool {
        self.access_flags & access_flags::ACC_BRIDGE != 0
    }

    pub fn is_synthetic(&self) -> bool {
        self.access_flags & access_flags::ACC_SYNTHETIC != 0
    }

    pub fn is_static(&self) -> bool {
        self.access_flags & access_flags::ACC_STATIC != 0
    }

    pub fn is_private(&self) -> bool {
        self.access_flags & access_flags::ACC_PRIVATE != 0
    }

    pub fn is_constructor(&self) -> bool {
        self.name == CONSTRUCTOR_METHOD_NAME
    }
}

/// Per-field structural facts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldData {
    pub name: String,
    pub descriptor: String,
    pub access_flags: u16,
}

/// Options controlling classpath construction
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Number of parsing shards. The reobfuscation pipeline forces 1 so
    /// that results are reproducible bit-for-bit.
    pub parallelism: usize,
    /// Fail the build when a supertype of a primary class cannot be
    /// located in either the primary binary or a context root.
    pub require_full_classpath: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            parallelism: 1,
            require_full_classpath: false,
        }
    }
}

/// One source of classfiles: a jar-like zip container or a directory tree
#[derive(Debug, Clone)]
pub enum ProviderRoot {
    Jar(PathBuf),
    Directory(PathBuf),
}

impl ProviderRoot {
    /// Pick the root kind from the path: `.jar`/`.zip` files are
    /// containers, everything else is treated as a directory tree.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("jar") | Some("zip") => Self::Jar(path.to_path_buf()),
            _ => Self::Directory(path.to_path_buf()),
        }
    }

    /// Load every classfile image under this root, sorted by entry name.
    /// The underlying container handle is closed before returning.
    fn class_images(&self) -> Result<Vec<Vec<u8>>> {
        let mut entries = Vec::new();
        match self {
            Self::Jar(path) => {
                let file = File::open(path)?;
                let mut archive = ZipArchive::new(file).map_err(|e| {
                    Error::classpath_resolution(path.display().to_string(), e.to_string())
                })?;
                let mut names: Vec<String> = (0..archive.len())
                    .filter_map(|i| archive.by_index(i).ok().map(|f| f.name().to_string()))
                    .filter(|n| n.ends_with(".class") && !n.ends_with("module-info.class"))
                    .collect();
                names.sort();
                for name in names {
                    let mut entry = archive.by_name(&name).map_err(|e| {
                        Error::classpath_resolution(name.clone(), e.to_string())
                    })?;
                    let mut buf = Vec::with_capacity(entry.size() as usize);
                    entry.read_to_end(&mut buf)?;
                    entries.push(buf);
                }
            }
            Self::Directory(path) => {
                let mut paths: Vec<PathBuf> = WalkDir::new(path)
                    .into_iter()
                    .filter_map(|e| e.ok())
                    .filter(|e| e.file_type().is_file())
                    .map(|e| e.into_path())
                    .filter(|p| {
                        p.extension().and_then(|e| e.to_str()) == Some("class")
                            && p.file_name().and_then(|n| n.to_str())
                                != Some("module-info.class")
                    })
                    .collect();
                paths.sort();
                for path in paths {
                    entries.push(std::fs::read(path)?);
                }
            }
        }
        Ok(entries)
    }
}

/// Queryable graph of classes, supertypes, and members
#[derive(Debug, Default)]
pub struct ClasspathIndex {
    classes: HashMap<String, ClassData>,
    /// Sorted names of the classes in the primary binary
    primary: Vec<String>,
}

impl ClasspathIndex {
    /// Scan the primary and context roots and build the index.
    ///
    /// With `require_full_classpath` set, every supertype reachable from a
    /// primary class must resolve or the build fails with
    /// [`Error::ClasspathResolution`] before any contributor can run.
    pub fn build(
        primary_roots: &[ProviderRoot],
        context_roots: &[ProviderRoot],
        options: &BuildOptions,
    ) -> Result<Self> {
        if options.parallelism == 0 {
            return Err(Error::classpath_resolution(
                "<options>",
                "parallelism must be at least 1",
            ));
        }
        log::debug!(
            "classpath build: {} primary roots, {} context roots, parallelism {}",
            primary_roots.len(),
            context_roots.len(),
            options.parallelism
        );

        let mut index = Self::default();
        for root in primary_roots {
            for class in parse_images(root.class_images()?, options.parallelism)? {
                if !index.classes.contains_key(&class.name) {
                    index.primary.push(class.name.clone());
                    index.classes.insert(class.name.clone(), class);
                }
            }
        }
        for root in context_roots {
            for class in parse_images(root.class_images()?, options.parallelism)? {
                index.classes.entry(class.name.clone()).or_insert(class);
            }
        }
        index.primary.sort();

        if options.require_full_classpath {
            index.verify_full_classpath()?;
        }
        log::debug!(
            "classpath build: {} primary classes, {} total",
            index.primary.len(),
            index.classes.len()
        );
        Ok(index)
    }

    /// Assemble an index directly from class data, without any containers.
    /// Used for synthetic classpaths in tests.
    pub fn from_class_data(primary: Vec<ClassData>, context: Vec<ClassData>) -> Self {
        let mut index = Self::default();
        for class in primary {
            index.primary.push(class.name.clone());
            index.classes.insert(class.name.clone(), class);
        }
        for class in context {
            index.classes.entry(class.name.clone()).or_insert(class);
        }
        index.primary.sort();
        index
    }

    pub fn get(&self, name: &str) -> Option<&ClassData> {
        self.classes.get(name)
    }

    /// Primary classes in sorted name order
    pub fn primary_classes(&self) -> impl Iterator<Item = &ClassData> {
        self.primary.iter().filter_map(|n| self.classes.get(n))
    }

    /// Direct supertypes (superclass first, then interfaces) that are
    /// present in the index
    pub fn direct_supertypes(&self, class: &ClassData) -> Vec<&ClassData> {
        class
            .super_name
            .iter()
            .chain(class.interfaces.iter())
            .filter_map(|n| self.classes.get(n.as_str()))
            .collect()
    }

    /// All ancestors of a class, nearest first, superclass chain before
    /// interfaces at each level. Unresolvable supertypes are skipped.
    pub fn ancestors(&self, class: &ClassData) -> Vec<&ClassData> {
        let mut out: Vec<&ClassData> = Vec::new();
        let mut queue: Vec<&ClassData> = self.direct_supertypes(class);
        while !queue.is_empty() {
            let mut next = Vec::new();
            for ancestor in queue {
                if out.iter().any(|c| c.name == ancestor.name) {
                    continue;
                }
                out.push(ancestor);
                next.extend(self.direct_supertypes(ancestor));
            }
            queue = next;
        }
        out
    }

    fn verify_full_classpath(&self) -> Result<()> {
        for name in &self.primary {
            let class = &self.classes[name];
            for super_name in class.super_name.iter().chain(class.interfaces.iter()) {
                if !self.classes.contains_key(super_name.as_str()) {
                    return Err(Error::classpath_resolution(
                        super_name.clone(),
                        format!("supertype of {} not found on the classpath", name),
                    ));
                }
            }
            // transitive closure over everything already resolved
            for ancestor in self.ancestors(class) {
                for super_name in ancestor.super_name.iter().chain(ancestor.interfaces.iter()) {
                    if !self.classes.contains_key(super_name.as_str()) {
                        return Err(Error::classpath_resolution(
                            super_name.clone(),
                            format!("supertype of {} not found on the classpath", ancestor.name),
                        ));
                    }
                }
            }
        }
        Ok(())
    }
}

/// Parse classfile images, optionally sharded across threads. Output order
/// is the input order either way.
fn parse_images(images: Vec<Vec<u8>>, parallelism: usize) -> Result<Vec<ClassData>> {
    if parallelism <= 1 || images.len() < 2 {
        return images.iter().map(|b| classfile::parse_class(b)).collect();
    }
    let shard_size = images.len().div_ceil(parallelism);
    let shards: Vec<&[Vec<u8>]> = images.chunks(shard_size).collect();
    let mut results: Vec<Result<Vec<ClassData>>> = Vec::new();
    std::thread::scope(|scope| {
        let handles: Vec<_> = shards
            .into_iter()
            .map(|shard| {
                scope.spawn(move || {
                    shard
                        .iter()
                        .map(|b| classfile::parse_class(b))
                        .collect::<Result<Vec<_>>>()
                })
            })
            .collect();
        for handle in handles {
            results.push(handle.join().expect("classfile parser thread panicked"));
        }
    });
    let mut out = Vec::with_capacity(images.len());
    for result in results {
        out.extend(result?);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn method(name: &str, descriptor: &str, flags: u16) -> MethodData {
        MethodData {
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            access_flags: flags,
            invocations: Vec::new(),
        }
    }

    #[test]
    fn test_ancestors_nearest_first() {
        let mut child = ClassData::synthetic("c", Some("b"));
        child.interfaces.push("i".to_string());
        let index = ClasspathIndex::from_class_data(
            vec![
                child,
                ClassData::synthetic("b", Some("a")),
                ClassData::synthetic("a", Some("java/lang/Object")),
                ClassData::synthetic("i", None),
            ],
            vec![ClassData::synthetic("java/lang/Object", None)],
        );

        let names: Vec<&str> = index
            .ancestors(index.get("c").unwrap())
            .iter()
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(names, vec!["b", "i", "a", "java/lang/Object"]);
    }

    #[test]
    fn test_require_full_classpath_missing_supertype() {
        let index = ClasspathIndex::from_class_data(
            vec![ClassData::synthetic("c", Some("gone"))],
            vec![],
        );
        let err = index.verify_full_classpath().unwrap_err();
        assert!(matches!(err, Error::ClasspathResolution { .. }));
    }

    #[test]
    fn test_primary_iteration_is_sorted() {
        let index = ClasspathIndex::from_class_data(
            vec![
                ClassData::synthetic("z", None),
                ClassData::synthetic("a", None),
                ClassData::synthetic("m", None),
            ],
            vec![],
        );
        let names: Vec<&str> = index.primary_classes().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["a", "m", "z"]);
    }

    #[test]
    fn test_method_flags() {
        let bridge = method("m", "()Ljava/lang/Object;", access_flags::ACC_BRIDGE | access_flags::ACC_SYNTHETIC);
        assert!(bridge.is_bridge());
        assert!(bridge.is_synthetic());
        assert!(!bridge.is_constructor());
        assert!(method("<init>", "()V", 0).is_constructor());
    }
}
