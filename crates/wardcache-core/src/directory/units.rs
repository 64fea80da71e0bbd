use std::collections::HashMap;

use thiserror::Error;

use crate::models::{Unit, UnitNumber};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LookupError {
    #[error("Household {household} references unknown unit {unit}")]
    UnknownUnit { household: String, unit: UnitNumber },
}

/// Unit number to display name, built once per run from the parent unit's
/// direct children.
#[derive(Debug, Clone, Default)]
pub struct UnitLookup {
    names: HashMap<UnitNumber, String>,
}

impl UnitLookup {
    pub fn from_units(units: &[Unit]) -> Self {
        let names = units
            .iter()
            .map(|unit| (unit.id, unit.name.clone()))
            .collect();
        Self { names }
    }

    /// Resolve the unit name for a household. An unknown unit is fatal for
    /// the run: the household cannot be reported without it.
    pub fn resolve(&self, household: &str, unit: UnitNumber) -> Result<&str, LookupError> {
        self.names
            .get(&unit)
            .map(String::as_str)
            .ok_or_else(|| LookupError::UnknownUnit {
                household: household.to_string(),
                unit,
            })
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
