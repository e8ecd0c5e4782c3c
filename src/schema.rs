// A minimal, read-only view of the schema-bearing archive store's type
// system: just enough shape to decide whether a quantity or sub-section is
// a reference that `ArchiveReader`/`DefinitionReader` should follow.
//
// The full type system (base sections, categories, constraints) lives in
// the schema registry behind `backend::SchemaRegistry`; this module only
// models what the traversal engine itself needs to inspect.

use serde::{Deserialize, Serialize};

/// A quantity's reference target, when the quantity's type is itself a
/// reference rather than a primitive value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuantityReference {
    /// The `m_def` id of the quantity definition being referenced.
    pub target_quantity_def: String,
}

/// A sub-section's reference target: the section definition that the
/// sub-section's contents must conform to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionReference {
    pub target_section_def: String,
}

/// Whichever kind of reference a definition turns out to carry.
/// `goto` unwraps the two differently: a quantity reference resolves to a
/// single scalar value, while a section reference resolves to an entire
/// sub-tree that itself may contain further references.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Reference {
    Quantity(QuantityReference),
    Section(SectionReference),
}

impl Reference {
    pub fn target_def(&self) -> &str {
        match self {
            Reference::Quantity(q) => &q.target_quantity_def,
            Reference::Section(s) => &s.target_section_def,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quantity {
    pub name: String,
    pub reference: Option<QuantityReference>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubSection {
    pub name: String,
    pub repeats: bool,
    pub reference: Option<SectionReference>,
}

/// A resolved section definition: enough of its shape to know which of its
/// quantities and sub-sections are references worth following when a
/// `RequestConfig` asks for `resolved` data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Section {
    pub definition_id: String,
    /// `m_def` ids of the sections this one extends. A `resolved` directive
    /// on `DefinitionReader` pulls each of these in alongside the section's
    /// own quantities and sub-sections.
    #[serde(default)]
    pub base_sections: Vec<String>,
    pub quantities: Vec<Quantity>,
    pub sub_sections: Vec<SubSection>,
}

impl Section {
    pub fn reference_for_key(&self, key: &str) -> Option<Reference> {
        if let Some(q) = self.quantities.iter().find(|q| q.name == key) {
            if let Some(r) = &q.reference {
                return Some(Reference::Quantity(r.clone()));
            }
        }
        if let Some(s) = self.sub_sections.iter().find(|s| s.name == key) {
            if let Some(r) = &s.reference {
                return Some(Reference::Section(r.clone()));
            }
        }
        None
    }
}
