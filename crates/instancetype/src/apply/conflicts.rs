//! Conflict reporting
//!
//! A conflict is the path of a field that both the instance type and the
//! target spec claim, rendered dotted: `spec.domain.resources.requests.memory`.

use std::fmt;

/// Dotted path to a field of a resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldPath(String);

impl FieldPath {
    /// Starts a path at `root`.
    pub fn new(root: impl Into<String>) -> Self {
        Self(root.into())
    }

    /// Appends a child segment.
    #[must_use]
    pub fn child(&self, name: &str) -> Self {
        Self(format!("{}.{}", self.0, name))
    }

    /// Appends several child segments.
    #[must_use]
    pub fn children(&self, names: &[&str]) -> Self {
        names.iter().fold(self.clone(), |path, name| path.child(name))
    }

    /// Appends a list index.
    #[must_use]
    pub fn index(&self, index: usize) -> Self {
        Self(format!("{}[{}]", self.0, index))
    }

    /// Path as rendered in messages.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Ordered list of conflicting field paths.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Conflicts(Vec<FieldPath>);

impl Conflicts {
    /// No conflicts.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one conflicting path.
    pub fn push(&mut self, path: FieldPath) {
        self.0.push(path);
    }

    /// Appends every conflict of `other`, keeping order.
    pub fn extend(&mut self, other: Conflicts) {
        self.0.extend(other.0);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Conflicting paths in detection order.
    pub fn paths(&self) -> impl Iterator<Item = &FieldPath> {
        self.0.iter()
    }
}

impl From<Vec<FieldPath>> for Conflicts {
    fn from(paths: Vec<FieldPath>) -> Self {
        Self(paths)
    }
}

impl From<FieldPath> for Conflicts {
    fn from(path: FieldPath) -> Self {
        Self(vec![path])
    }
}

impl fmt::Display for Conflicts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, path) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            f.write_str(path.as_str())?;
        }
        Ok(())
    }
}
