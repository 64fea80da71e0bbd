use serde::{Deserialize, Serialize};

use super::{RecordId, UnitNumber};

/// A household as listed in the unit directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Household {
    #[serde(rename = "uuid")]
    pub id: RecordId,
    #[serde(rename = "displayName", default)]
    pub display_name: String,
    #[serde(rename = "unitNumber")]
    pub unit_id: UnitNumber,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub members: Vec<Member>,
}

/// An individual person in a household.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    #[serde(rename = "uuid")]
    pub id: RecordId,
    #[serde(rename = "preferredName", default)]
    pub preferred_name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(rename = "birthDate", default)]
    pub birth_date: Option<String>,
    /// Callings held by the member. `None` and an empty list are distinct
    /// upstream but render identically.
    #[serde(default)]
    pub positions: Option<Vec<Position>>,
}

impl Member {
    /// Names of all positions held, in upstream order.
    pub fn position_names(&self) -> Vec<&str> {
        self.positions
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(|p| p.name.as_str())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub name: String,
}
