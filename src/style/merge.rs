//! Layer configuration overrides over a reference style set.

use super::{builtin_properties, ReferenceStyleSet, StyleId, StyleProperties};
use crate::config::ConversionConfig;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Effective styles for one job: reference, then built-in defaults for what
/// the reference lacks, then non-null override fields on top.
///
/// The reference set is shared, never copied or mutated.
#[derive(Debug, Clone)]
pub struct ResolvedStyles {
    reference: Arc<ReferenceStyleSet>,
    effective: BTreeMap<StyleId, StyleProperties>,
    direct: BTreeMap<StyleId, StyleProperties>,
}

impl ResolvedStyles {
    pub fn merge(reference: Arc<ReferenceStyleSet>, config: &ConversionConfig) -> Self {
        let mut effective = BTreeMap::new();
        let mut direct = BTreeMap::new();
        for id in StyleId::all() {
            let base = reference.resolve(id);
            let overrides = config.style_overrides.get(&id);
            let merged = match overrides {
                Some(o) => o.layered_over(&base),
                None => base,
            };
            effective.insert(id, merged);

            // What the output's style part will not already say.
            let mut must_write = overrides.cloned().unwrap_or_default();
            if !reference.contains(id) && !falls_back_within_reference(&reference, id) {
                must_write = must_write.layered_over(&builtin_properties(id));
            }
            if !must_write.is_empty() {
                direct.insert(id, must_write);
            }
        }
        Self {
            reference,
            effective,
            direct,
        }
    }

    /// Effective properties for `id`.
    pub fn resolve(&self, id: StyleId) -> StyleProperties {
        self.effective
            .get(&id)
            .cloned()
            .unwrap_or_else(|| builtin_properties(id))
    }

    /// Properties that must be written as direct formatting for `id`.
    pub fn direct(&self, id: StyleId) -> StyleProperties {
        self.direct.get(&id).cloned().unwrap_or_default()
    }

    pub fn reference(&self) -> &ReferenceStyleSet {
        &self.reference
    }
}

/// `toc-heading` borrows the reference's `heading-1` when it has one.
fn falls_back_within_reference(reference: &ReferenceStyleSet, id: StyleId) -> bool {
    id == StyleId::TocHeading && reference.contains(StyleId::Heading(1))
}
