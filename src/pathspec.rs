//! Path handling (spec.md §4.4, "dynamic path-element array").
//!
//! A container path is a finite ordered sequence of name components. This
//! mirrors the original's `PathElements` dynamic array, but as a thin
//! wrapper around `Vec<String>` rather than a hand-rolled growable buffer —
//! the growable-array-of-strings concern the original solved by hand is
//! exactly what `Vec` gives us for free.

use crate::error::{Error, Result};
use crate::record::{pad_name, SlotName};

/// An in-container path: an ordered list of validated name components. An
/// empty path denotes the root directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Path {
    components: Vec<String>,
}

impl Path {
    pub fn root() -> Self {
        Path {
            components: Vec::new(),
        }
    }

    /// Splits on `/`, dropping empty components so that leading/trailing/
    /// repeated slashes are ignored — matching `strtok(path, "/")`
    /// semantics in the original (a run of separators never produces an
    /// empty element).
    pub fn parse(raw: &str) -> Result<Self> {
        let mut components = Vec::new();
        for part in raw.split('/') {
            if part.is_empty() {
                continue;
            }
            validate_component(part)?;
            components.push(part.to_string());
        }
        Ok(Path { components })
    }

    pub fn is_root(&self) -> bool {
        self.components.is_empty()
    }

    pub fn components(&self) -> &[String] {
        &self.components
    }

    /// All but the last component (the containing directory's path).
    pub fn parent(&self) -> Path {
        Path {
            components: self.components[..self.components.len().saturating_sub(1)].to_vec(),
        }
    }

    /// The last component, if any.
    pub fn last(&self) -> Option<&str> {
        self.components.last().map(String::as_str)
    }

    pub fn last_padded(&self) -> Option<SlotName> {
        self.last().map(|s| pad_name(s.as_bytes()))
    }
}

/// A path component must be 1-9 bytes of printable ASCII, and may not
/// contain `/` or NUL (spec.md §4.4).
fn validate_component(s: &str) -> Result<()> {
    if s.is_empty() {
        return Err(Error::BadName {
            name: s.to_string(),
            reason: "component is empty",
        });
    }
    if s.len() > 9 {
        return Err(Error::BadName {
            name: s.to_string(),
            reason: "component longer than 9 bytes",
        });
    }
    if !s.bytes().all(|b| b.is_ascii_graphic() || b == b' ') {
        return Err(Error::BadName {
            name: s.to_string(),
            reason: "component contains non-printable-ASCII bytes",
        });
    }
    if s.contains('\0') {
        return Err(Error::BadName {
            name: s.to_string(),
            reason: "component contains NUL",
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leading_and_trailing_slashes_ignored() {
        let p = Path::parse("/a/b/").unwrap();
        assert_eq!(p.components(), &["a", "b"]);
    }

    #[test]
    fn repeated_slashes_collapse() {
        let p = Path::parse("a//b").unwrap();
        assert_eq!(p.components(), &["a", "b"]);
    }

    #[test]
    fn empty_path_is_root() {
        let p = Path::parse("").unwrap();
        assert!(p.is_root());
    }

    #[test]
    fn component_too_long_rejected() {
        assert!(matches!(
            Path::parse("toolongname"),
            Err(Error::BadName { .. })
        ));
    }

    #[test]
    fn parent_and_last() {
        let p = Path::parse("a/b/c").unwrap();
        assert_eq!(p.last(), Some("c"));
        assert_eq!(p.parent().components(), &["a", "b"]);
    }
}
