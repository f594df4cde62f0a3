//! Line-oriented tab-separated mapping format with a declared namespace header
//!
//! The format is tiny-v2-like: a header line `tiny\t2\t0\t<ns>...` declaring
//! the namespace columns, then class records (`c`), member records (`m` for
//! methods, `f` for fields) at one tab of indent, and parameter records
//! (`p`) at two tabs. Readers select one (source, target) namespace pair;
//! writers emit exactly the pair they are given.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use crate::common::{Error, Result};

use super::{FieldKey, MappingSet};

const HEADER_MAGIC: &str = "tiny";
const FORMAT_MAJOR: &str = "2";
const FORMAT_MINOR: &str = "0";

/// Read a mapping file, selecting the given namespace column pair.
///
/// Fails with [`Error::MalformedMapping`] on unparsable lines or when a
/// requested namespace is absent from the file header.
pub fn read_mapping_file(path: &Path, from_ns: &str, to_ns: &str) -> Result<MappingSet> {
    let file = File::open(path)?;
    read_mappings(BufReader::new(file), from_ns, to_ns)
}

/// Read mappings from any buffered reader; see [`read_mapping_file`]
pub fn read_mappings<R: BufRead>(reader: R, from_ns: &str, to_ns: &str) -> Result<MappingSet> {
    let mut lines = reader.lines();
    let header = lines
        .next()
        .ok_or_else(|| Error::malformed_mapping(1, "missing header line"))??;

    let columns: Vec<&str> = header.split('\t').collect();
    if columns.len() < 5 || columns[0] != HEADER_MAGIC || columns[1] != FORMAT_MAJOR {
        return Err(Error::malformed_mapping(1, format!("bad header: {}", header)));
    }
    let namespaces = &columns[3..];
    let from_col = namespace_column(namespaces, from_ns, &header)?;
    let to_col = namespace_column(namespaces, to_ns, &header)?;
    let ns_count = namespaces.len();

    let mut set = MappingSet::new();
    let mut current_class: Option<String> = None;
    let mut current_method: Option<(String, String)> = None;

    for (idx, line) in lines.enumerate() {
        let line_no = idx + 2;
        let line = line?;
        if line.is_empty() {
            continue;
        }
        let indent = line.bytes().take_while(|b| *b == b'\t').count();
        let parts: Vec<&str> = line[indent..].split('\t').collect();
        match (indent, parts[0]) {
            (0, "c") => {
                let names = record_names(&parts[1..], ns_count, line_no)?;
                let from_name = names[from_col];
                if from_name.is_empty() {
                    return Err(Error::malformed_mapping(line_no, "class with empty source name"));
                }
                let class = set.get_or_create_class(from_name);
                let to_name = names[to_col];
                if !to_name.is_empty() && to_name != from_name {
                    // Inner classes carry full names in the file; only the
                    // simple trailing segment is stored on the mapping.
                    let simple = if from_name.contains('$') {
                        to_name.rsplit('$').next().unwrap_or(to_name)
                    } else {
                        to_name
                    };
                    class.deobf_name = Some(simple.to_string());
                }
                current_class = Some(from_name.to_string());
                current_method = None;
            }
            (1, "m") => {
                let class_name = current_class
                    .as_deref()
                    .ok_or_else(|| Error::malformed_mapping(line_no, "method record before class"))?;
                if parts.len() < 2 {
                    return Err(Error::malformed_mapping(line_no, "method record missing descriptor"));
                }
                let descriptor = parts[1];
                let names = record_names(&parts[2..], ns_count, line_no)?;
                let from_name = names[from_col];
                let to_name = names[to_col];
                let class = set.get_or_create_class(class_name);
                let method = class.get_or_create_method(from_name, descriptor);
                if !to_name.is_empty() {
                    method.deobf_name = Some(to_name.to_string());
                }
                current_method = Some((from_name.to_string(), descriptor.to_string()));
            }
            (1, "f") => {
                let class_name = current_class
                    .as_deref()
                    .ok_or_else(|| Error::malformed_mapping(line_no, "field record before class"))?;
                if parts.len() < 2 {
                    return Err(Error::malformed_mapping(line_no, "field record missing type"));
                }
                let ty = parts[1];
                let names = record_names(&parts[2..], ns_count, line_no)?;
                let from_name = names[from_col];
                let to_name = names[to_col];
                let class = set.get_or_create_class(class_name);
                let field = class
                    .get_or_create_field(FieldKey::new(from_name, Some(ty.to_string())));
                if !to_name.is_empty() {
                    field.deobf_name = Some(to_name.to_string());
                }
                current_method = None;
            }
            (2, "p") => {
                let (class_name, method_key) = match (&current_class, &current_method) {
                    (Some(c), Some(m)) => (c.clone(), m.clone()),
                    _ => {
                        return Err(Error::malformed_mapping(line_no, "parameter record before method"))
                    }
                };
                if parts.len() < 2 {
                    return Err(Error::malformed_mapping(line_no, "parameter record missing index"));
                }
                let index: u16 = parts[1].parse().map_err(|_| {
                    Error::malformed_mapping(line_no, format!("bad parameter index: {}", parts[1]))
                })?;
                let names = record_names(&parts[2..], ns_count, line_no)?;
                let name = names[to_col];
                if !name.is_empty() {
                    let class = set.get_or_create_class(&class_name);
                    let method = class.get_or_create_method(&method_key.0, &method_key.1);
                    method.parameters.insert(index, name.to_string());
                }
            }
            _ => {
                return Err(Error::malformed_mapping(
                    line_no,
                    format!("unrecognized record: {}", line),
                ));
            }
        }
    }
    Ok(set)
}

/// Write a mapping set with the given namespace pair.
///
/// Members missing a target name are skipped. A class record is emitted
/// whenever the class carries a rename or owns anything writable; a class
/// named identically in both namespaces still anchors its member renames.
pub fn write_mapping_file(set: &MappingSet, path: &Path, from_ns: &str, to_ns: &str) -> Result<()> {
    let mut out = Vec::new();
    write_mappings(set, &mut out, from_ns, to_ns)?;
    // Serialize fully before touching the filesystem so a failed run never
    // leaves a partial output file.
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    writer.write_all(&out)?;
    writer.flush()?;
    Ok(())
}

/// Write mappings to any writer; see [`write_mapping_file`]
pub fn write_mappings<W: Write>(
    set: &MappingSet,
    writer: &mut W,
    from_ns: &str,
    to_ns: &str,
) -> Result<()> {
    writeln!(
        writer,
        "{}\t{}\t{}\t{}\t{}",
        HEADER_MAGIC, FORMAT_MAJOR, FORMAT_MINOR, from_ns, to_ns
    )?;
    for class in set.top_level_classes() {
        if !has_writable_content(class) {
            continue;
        }
        write_class(
            class,
            class.obf_name(),
            class.effective_deobf_name(),
            writer,
        )?;
    }
    Ok(())
}

fn write_class<W: Write>(
    class: &super::ClassMapping,
    full_obf: &str,
    full_deobf: &str,
    writer: &mut W,
) -> Result<()> {
    writeln!(writer, "c\t{}\t{}", full_obf, full_deobf)?;
    for (key, method) in class.methods() {
        let Some(deobf) = method.deobf_name.as_deref() else {
            continue;
        };
        writeln!(writer, "\tm\t{}\t{}\t{}", key.descriptor, key.name, deobf)?;
        for (index, name) in &method.parameters {
            writeln!(writer, "\t\tp\t{}\t\t{}", index, name)?;
        }
    }
    for (key, field) in class.fields() {
        let Some(deobf) = field.deobf_name.as_deref() else {
            continue;
        };
        let ty = key.ty.as_deref().unwrap_or("");
        writeln!(writer, "\tf\t{}\t{}\t{}", ty, key.name, deobf)?;
    }
    for inner in class.inner_classes() {
        if !has_writable_content(inner) {
            continue;
        }
        let inner_obf = format!("{}${}", full_obf, inner.obf_name());
        let inner_deobf = format!("{}${}", full_deobf, inner.effective_deobf_name());
        write_class(inner, &inner_obf, &inner_deobf, writer)?;
    }
    Ok(())
}

/// True when writing the class would emit more than a bare record: a class
/// rename, a renamed member, or a writable inner class.
fn has_writable_content(class: &super::ClassMapping) -> bool {
    class.deobf_name.is_some()
        || class.methods().any(|(_, m)| m.deobf_name.is_some())
        || class.fields().any(|(_, f)| f.deobf_name.is_some())
        || class.inner_classes().any(has_writable_content)
}

fn namespace_column(namespaces: &[&str], ns: &str, header: &str) -> Result<usize> {
    namespaces.iter().position(|n| *n == ns).ok_or_else(|| {
        Error::malformed_mapping(
            1,
            format!("namespace {} not declared in header: {}", ns, header),
        )
    })
}

fn record_names<'a>(names: &[&'a str], ns_count: usize, line_no: usize) -> Result<Vec<&'a str>> {
    if names.len() != ns_count {
        return Err(Error::malformed_mapping(
            line_no,
            format!("expected {} name columns, found {}", ns_count, names.len()),
        ));
    }
    Ok(names.to_vec())
}
