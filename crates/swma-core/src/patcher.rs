//! Attribute lookup and replacement across loaded game files
//!
//! Units inherit values from the type named in `Variant_Of_Existing_Type`
//! and only carry the tags they override. Reads therefore follow the basis
//! chain, while writes always land on the target node: an inherited value is
//! overridden by a new child on the node itself, never by editing the shared
//! base that sibling units also inherit from.

use crate::document::{Document, Element};
use crate::error::{Error, Result};
use crate::report::DiffEntry;
use crate::spec::BASIS_TAG;
use indexmap::IndexMap;
use std::collections::HashSet;
use std::fmt;

/// Longest basis chain followed before giving up
const MAX_BASIS_DEPTH: usize = 16;

/// Logical location of an attribute: entity name plus tag
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AttributePath {
    pub entity: String,
    pub attribute: String,
}

impl AttributePath {
    pub fn new(entity: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            attribute: attribute.into(),
        }
    }
}

impl fmt::Display for AttributePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.entity, self.attribute)
    }
}

/// Where an attribute's effective value comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Slot {
    /// Defined on the node itself
    Own,
    /// Inherited from the named basis entity
    Inherited { from: String },
}

/// Effective value of an attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeValue {
    /// Trimmed text of the defining tag
    pub raw: String,
    /// Tag name as spelled where it is defined
    pub tag: String,
    pub slot: Slot,
}

/// The parsed XML files of one run, keyed by file id
#[derive(Debug, Clone, Default)]
pub struct DocumentSet {
    docs: IndexMap<String, Document>,
}

impl DocumentSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, doc: Document) {
        self.docs.insert(doc.file_id().to_string(), doc);
    }

    pub fn get(&self, file_id: &str) -> Option<&Document> {
        self.docs.get(file_id)
    }

    pub fn get_mut(&mut self, file_id: &str) -> Option<&mut Document> {
        self.docs.get_mut(file_id)
    }

    pub fn contains(&self, file_id: &str) -> bool {
        self.docs.contains_key(file_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Document> {
        self.docs.values()
    }

    pub fn document(&self, file_id: &str) -> Result<&Document> {
        self.get(file_id)
            .ok_or_else(|| Error::UnknownFile(file_id.to_string()))
    }

    pub fn document_mut(&mut self, file_id: &str) -> Result<&mut Document> {
        self.get_mut(file_id)
            .ok_or_else(|| Error::UnknownFile(file_id.to_string()))
    }

    /// Find an entity, preferring `preferred_file`, then every other file in load order
    pub fn locate(&self, entity: &str, preferred_file: &str) -> Option<(&Document, &Element)> {
        let preferred = self.get(preferred_file).into_iter();
        let others = self.docs.values().filter(|d| d.file_id() != preferred_file);
        preferred
            .chain(others)
            .find_map(|doc| doc.find_entity(entity).map(|el| (doc, el)))
    }
}

/// Effective value of `path` on the entity in `file_id`
pub fn read_attribute(docs: &DocumentSet, file_id: &str, path: &AttributePath) -> Result<AttributeValue> {
    let doc = docs.document(file_id)?;
    let node = doc.find_entity(&path.entity).ok_or_else(|| Error::UnitNotFound {
        unit: path.entity.clone(),
        file_id: file_id.to_string(),
    })?;

    if let Some(own) = node.child(&path.attribute) {
        return Ok(AttributeValue {
            raw: doc.text_of(own).to_string(),
            tag: own.name.clone(),
            slot: Slot::Own,
        });
    }

    let mut visited = HashSet::from([path.entity.clone()]);
    let mut basis = basis_of(doc, node);
    while let Some(base_name) = basis {
        if !visited.insert(base_name.clone()) || visited.len() > MAX_BASIS_DEPTH {
            break;
        }
        let Some((base_doc, base)) = docs.locate(&base_name, file_id) else {
            break;
        };
        if let Some(tag) = base.child(&path.attribute) {
            return Ok(AttributeValue {
                raw: base_doc.text_of(tag).to_string(),
                tag: tag.name.clone(),
                slot: Slot::Inherited { from: base_name },
            });
        }
        basis = basis_of(base_doc, base);
    }

    Err(Error::AttributeNotFound {
        file_id: file_id.to_string(),
        entity: path.entity.clone(),
        attribute: path.attribute.clone(),
    })
}

fn basis_of(doc: &Document, node: &Element) -> Option<String> {
    node.child(BASIS_TAG)
        .map(|b| doc.text_of(b).to_string())
        .filter(|b| !b.is_empty())
}

/// Write `new_value` to the slot of `path` that belongs to the entity in `file_id`
///
/// An own tag is rewritten in place. An inherited value gets an override tag
/// on the entity; the basis entity is left untouched.
pub fn apply(docs: &mut DocumentSet, file_id: &str, path: &AttributePath, new_value: &str) -> Result<DiffEntry> {
    let current = read_attribute(docs, file_id, path)?;
    let doc = docs.document_mut(file_id)?;

    match &current.slot {
        Slot::Own => {
            doc.set_child_text(&path.entity, &current.tag, new_value)?;
        }
        Slot::Inherited { from } => {
            tracing::debug!(entity = %path.entity, base = %from, tag = %current.tag, "overriding inherited value");
            doc.insert_child(&path.entity, &current.tag, new_value)?;
        }
    }

    Ok(DiffEntry {
        file_id: file_id.to_string(),
        entity: path.entity.clone(),
        attribute: current.tag,
        old: Some(current.raw),
        new: Some(new_value.to_string()),
    })
}
