//! Single-pass `${KEY}` / `$KEY` expansion.
//!
//! Each value is scanned once from left to right. A reference to a known key
//! is replaced by that key's value as it was before expansion started, and the
//! replacement text is never scanned again. Nested references are therefore
//! not followed, so a value that still contains `$` afterwards is either a
//! missing variable or a recursive one, and both are errors.

use crate::ConfigError;
use std::collections::BTreeMap;

pub fn expand_vars(entries: &mut BTreeMap<String, String>) -> Result<(), ConfigError> {
    let snapshot = entries.clone();

    for (key, val) in entries.iter_mut() {
        if !val.contains('$') {
            continue;
        }
        let expanded = substitute(val, &snapshot);
        if expanded.contains('$') {
            return Err(ConfigError::UnresolvedReference {
                key: key.clone(),
                value: expanded,
            });
        }
        *val = expanded;
    }
    Ok(())
}

/// Replace references to any key in `vars` within `input`.
///
/// A bare `$NAME` takes the longest key that matches, so `$AB` is not consumed
/// by a key named `A`. Unknown references are copied through unchanged.
pub(crate) fn substitute(input: &str, vars: &BTreeMap<String, String>) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];
        match reference(after, vars) {
            Some((val, len)) => {
                out.push_str(val);
                rest = &after[len..];
            }
            None => {
                out.push('$');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

/// The value referenced at the start of `after` (the text following a `$`)
/// and the number of bytes the reference spans.
fn reference<'a>(after: &str, vars: &'a BTreeMap<String, String>) -> Option<(&'a str, usize)> {
    if let Some(braced) = after.strip_prefix('{') {
        let end = braced.find('}')?;
        let val = vars.get(&braced[..end])?;
        return Some((val.as_str(), end + 2));
    }
    vars.iter()
        .filter(|(k, _)| !k.is_empty() && after.starts_with(k.as_str()))
        .max_by_key(|(k, _)| k.len())
        .map(|(k, v)| (v.as_str(), k.len()))
}
