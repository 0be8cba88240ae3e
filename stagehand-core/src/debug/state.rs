//! Debug state introspection trait
//!
//! Lets state types expose their contents as titled key/value sections for
//! diagnostics and overlays.

use std::fmt::Write as _;

/// A debug entry (key-value pair)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebugEntry {
    pub key: String,
    pub value: String,
}

impl DebugEntry {
    /// Create a new entry
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// A debug section with a title and entries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebugSection {
    pub title: String,
    pub entries: Vec<DebugEntry>,
}

impl DebugSection {
    /// Create a new section
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            entries: Vec::new(),
        }
    }

    /// Add an entry to the section
    pub fn entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.entries.push(DebugEntry::new(key, value));
        self
    }

    /// Add an entry (mutable)
    pub fn push_entry(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.push(DebugEntry::new(key, value));
    }

    /// Look up an entry's value by key
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.key == key)
            .map(|e| e.value.as_str())
    }
}

/// Trait for types that can provide debug state information
///
/// # Example
///
/// ```
/// use stagehand_core::debug::{DebugState, DebugSection};
///
/// struct Editor {
///     open: bool,
///     edits: usize,
/// }
///
/// impl DebugState for Editor {
///     fn debug_sections(&self) -> Vec<DebugSection> {
///         vec![DebugSection::new("Editor")
///             .entry("open", self.open.to_string())
///             .entry("edits", self.edits.to_string())]
///     }
/// }
///
/// let text = Editor { open: true, edits: 3 }.debug_text();
/// assert!(text.contains("edits: 3"));
/// ```
pub trait DebugState {
    /// Return state as sections with key-value pairs
    fn debug_sections(&self) -> Vec<DebugSection>;

    /// Render the sections as indented plain text
    fn debug_text(&self) -> String {
        let mut out = String::new();
        for section in self.debug_sections() {
            let _ = writeln!(out, "[{}]", section.title);
            for entry in section.entries {
                let _ = writeln!(out, "  {}: {}", entry.key, entry.value);
            }
        }
        out
    }
}

/// Implementation for tuples - combine multiple state sources
impl<A: DebugState, B: DebugState> DebugState for (A, B) {
    fn debug_sections(&self) -> Vec<DebugSection> {
        let mut sections = self.0.debug_sections();
        sections.extend(self.1.debug_sections());
        sections
    }
}

/// Implementation for references
impl<T: DebugState> DebugState for &T {
    fn debug_sections(&self) -> Vec<DebugSection> {
        (*self).debug_sections()
    }
}
