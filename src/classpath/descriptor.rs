//! Utilities to parse and remap method/field descriptors

/// Split a method descriptor into its parameter type descriptors.
///
/// Returns `None` when the descriptor is not a well-formed method
/// descriptor.
pub fn parameter_types(descriptor: &str) -> Option<Vec<&str>> {
    let rest = descriptor.strip_prefix('(')?;
    let end = rest.find(')')?;
    let mut params = Vec::new();
    let body = &rest[..end];
    let mut pos = 0;
    while pos < body.len() {
        let len = type_length(&body[pos..])?;
        params.push(&body[pos..pos + len]);
        pos += len;
    }
    Some(params)
}

/// Number of parameters declared by a method descriptor; `0` when the
/// descriptor is malformed.
pub fn parameter_count(descriptor: &str) -> usize {
    parameter_types(descriptor).map_or(0, |p| p.len())
}

/// Length in characters of the leading type descriptor of `s`
fn type_length(s: &str) -> Option<usize> {
    let mut chars = s.char_indices();
    let mut dims = 0;
    for (i, c) in &mut chars {
        match c {
            '[' => dims += 1,
            'B' | 'C' | 'D' | 'F' | 'I' | 'J' | 'S' | 'Z' | 'V' => return Some(i + 1),
            'L' => {
                let semi = s[i..].find(';')?;
                return Some(i + semi + 1);
            }
            _ => return None,
        }
        if dims > 255 {
            return None;
        }
    }
    None
}

/// Rewrite every class reference (`Lpkg/Name;`) in a field or method
/// descriptor through `map`. Names the map does not know are kept as-is.
pub fn remap_descriptor(descriptor: &str, map: impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(descriptor.len());
    let mut rest = descriptor;
    while let Some(start) = rest.find('L') {
        match rest[start..].find(';') {
            Some(semi) => {
                out.push_str(&rest[..start + 1]);
                let name = &rest[start + 1..start + semi];
                match map(name) {
                    Some(mapped) => out.push_str(&mapped),
                    None => out.push_str(name),
                }
                out.push(';');
                rest = &rest[start + semi + 1..];
            }
            None => break,
        }
    }
    out.push_str(rest);
    out
}
