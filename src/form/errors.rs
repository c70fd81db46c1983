use std::collections::BTreeMap;

use serde::Serialize;

use crate::path;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldErrorKind {
    /// Produced by a schema validation pass.
    Schema,
    /// Set explicitly through `set_field_error`.
    Manual,
    /// Raised by the submit handler as a validation-shaped error.
    Submit,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct FieldError {
    pub message: String,
    pub kind: FieldErrorKind,
}

impl FieldError {
    pub fn new(message: impl Into<String>, kind: FieldErrorKind) -> Self {
        Self {
            message: message.into(),
            kind,
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ErrorNode {
    Leaf(FieldError),
    Group(BTreeMap<String, ErrorNode>),
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct FlatFieldError {
    pub field: String,
    pub message: String,
}

/// Field errors keyed by path, stored as a nested tree so that `a.b` and
/// `a.c` share the `a` group.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors {
    root: BTreeMap<String, ErrorNode>,
}

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    pub fn len(&self) -> usize {
        self.flatten().len()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.node(field).is_some()
    }

    /// Leaf error at `field`. Groups have no message of their own.
    pub fn get(&self, field: &str) -> Option<&FieldError> {
        match self.node(field)? {
            ErrorNode::Leaf(error) => Some(error),
            ErrorNode::Group(_) => None,
        }
    }

    pub fn node(&self, field: &str) -> Option<&ErrorNode> {
        let mut segments = path::segments(field);
        let mut current = self.root.get(segments.next()?)?;
        for segment in segments {
            match current {
                ErrorNode::Group(children) => current = children.get(segment)?,
                ErrorNode::Leaf(_) => return None,
            }
        }
        Some(current)
    }

    /// Replaces whatever sits at `field` (leaf or group) with `error`. Leaves
    /// on the way are turned into groups.
    pub fn insert(&mut self, field: &str, error: FieldError) {
        let mut parts = path::segments(field).peekable();
        let mut level = &mut self.root;
        while let Some(segment) = parts.next() {
            if parts.peek().is_none() {
                level.insert(segment.to_string(), ErrorNode::Leaf(error));
                return;
            }
            let entry = level
                .entry(segment.to_string())
                .or_insert_with(|| ErrorNode::Group(BTreeMap::new()));
            if matches!(entry, ErrorNode::Leaf(_)) {
                *entry = ErrorNode::Group(BTreeMap::new());
            }
            level = match entry {
                ErrorNode::Group(children) => children,
                ErrorNode::Leaf(_) => return,
            };
        }
    }

    /// Removes the node at `field` and prunes groups left empty.
    pub fn remove(&mut self, field: &str) -> Option<ErrorNode> {
        let parts = path::segments(field).collect::<Vec<_>>();
        remove_in(&mut self.root, &parts)
    }

    pub fn clear(&mut self) {
        self.root.clear();
    }

    /// Depth-first list of leaf errors with their full paths.
    pub fn flatten(&self) -> Vec<FlatFieldError> {
        let mut out = Vec::new();
        flatten_into(&self.root, "", &mut out);
        out
    }

    pub fn first(&self) -> Option<FlatFieldError> {
        self.flatten().into_iter().next()
    }
}

fn remove_in(level: &mut BTreeMap<String, ErrorNode>, parts: &[&str]) -> Option<ErrorNode> {
    let (head, rest) = parts.split_first()?;
    if rest.is_empty() {
        return level.remove(*head);
    }
    let ErrorNode::Group(children) = level.get_mut(*head)? else {
        return None;
    };
    let removed = remove_in(children, rest);
    if children.is_empty() {
        level.remove(*head);
    }
    removed
}

fn flatten_into(level: &BTreeMap<String, ErrorNode>, prefix: &str, out: &mut Vec<FlatFieldError>) {
    for (key, node) in level {
        let field = path::join(prefix, key);
        match node {
            ErrorNode::Leaf(error) => out.push(FlatFieldError {
                field,
                message: error.message.clone(),
            }),
            ErrorNode::Group(children) => flatten_into(children, &field, out),
        }
    }
}
