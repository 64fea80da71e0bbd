//! Organizational units (wards, branches) and their parent stake.

use serde::{Deserialize, Serialize};

/// Unit numbers are issued as integers by the service.
pub type UnitNumber = i64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Unit {
    #[serde(rename = "unitNumber")]
    pub id: UnitNumber,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "childUnits", default)]
    pub child_units: Vec<Unit>,
}
