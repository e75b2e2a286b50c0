//! Admission policy for submitted work items.
//!
//! Format and safety validation live outside the engine; admission only
//! asks a caller-supplied predicate whether each item may enter the queue.

use crate::batch::types::WorkItem;

/// Per-item admissibility predicate consulted during admission.
pub trait AdmissionPolicy: Send + Sync {
    /// Whether the item may be admitted into a batch.
    fn is_admissible(&self, item: &WorkItem) -> bool;
}

/// Policy that admits every item.
///
/// For embedding applications that validate uploads before submission.
#[derive(Debug, Default)]
pub struct AcceptAll;

impl AdmissionPolicy for AcceptAll {
    fn is_admissible(&self, _item: &WorkItem) -> bool {
        true
    }
}

/// Policy that admits items by file extension allow-list.
#[derive(Debug)]
pub struct ExtensionPolicy {
    allowed: Vec<String>,
}

impl ExtensionPolicy {
    /// Creates a policy from an allow-list of extensions (without dots).
    #[must_use]
    pub fn new(allowed: &[&str]) -> Self {
        Self {
            allowed: allowed.iter().map(|e| e.to_lowercase()).collect(),
        }
    }

    /// The default document formats handled by the docflux pipeline.
    #[must_use]
    pub fn default_documents() -> Self {
        Self::new(&["docx", "pdf", "txt", "md", "pptx", "xlsx"])
    }
}

impl AdmissionPolicy for ExtensionPolicy {
    fn is_admissible(&self, item: &WorkItem) -> bool {
        item.file_name
            .rsplit_once('.')
            .is_some_and(|(_, ext)| self.allowed.contains(&ext.to_lowercase()))
    }
}
