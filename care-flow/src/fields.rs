use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt::{Debug, Display};

/// Holder of a workflow's in-progress input.
///
/// Mutation happens only through [`FieldStore::set`]; section completeness and
/// the completeness percentage are projections over the stored values and are
/// never kept as separate flags.
pub trait FieldStore: Clone + Default + Debug + Serialize + Send + Sync + 'static {
    /// One typed field update, e.g. `{"field": "symptoms", "value": "..."}`.
    type Field: Debug + DeserializeOwned + Send + 'static;

    /// Logical group of required fields.
    type Section: Copy + Eq + Debug + Display + Send + Sync + 'static;

    /// Overwrite a single field. No validation beyond the type.
    fn set(&mut self, field: Self::Field);

    /// Every required section, in display order.
    fn sections() -> &'static [Self::Section];

    fn is_section_complete(&self, section: Self::Section) -> bool;

    fn missing_sections(&self) -> Vec<Self::Section> {
        Self::sections()
            .iter()
            .copied()
            .filter(|section| !self.is_section_complete(*section))
            .collect()
    }

    fn is_complete(&self) -> bool {
        Self::sections()
            .iter()
            .all(|section| self.is_section_complete(*section))
    }

    /// Sum of the weights of the complete sections, in `[0, 100]`.
    fn completeness_percent(&self) -> u8 {
        let sections = Self::sections();
        let total: u32 = sections
            .iter()
            .enumerate()
            .filter(|(_, section)| self.is_section_complete(**section))
            .map(|(index, _)| u32::from(section_weight(index, sections.len())))
            .sum();
        total.min(100) as u8
    }

    fn completeness_ratio(&self) -> f64 {
        f64::from(self.completeness_percent()) / 100.0
    }
}

/// Percentage weight of the section at `index` out of `count`.
///
/// Sections share 100 evenly and the last one absorbs the remainder, so three
/// sections weigh 33/33/34.
pub fn section_weight(index: usize, count: usize) -> u8 {
    if count == 0 || index >= count {
        return 0;
    }
    let share = 100 / count;
    let weight = if index + 1 == count {
        100 - share * (count - 1)
    } else {
        share
    };
    weight as u8
}

/// A string field counts as filled once it has non-whitespace content.
pub fn is_filled(value: &str) -> bool {
    !value.trim().is_empty()
}
