use serde::{Deserialize, Serialize};

use super::RecordId;

/// One entry of the flat member list. Only the household link is used for
/// the mailing export; the rest of the record is ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberListEntry {
    #[serde(rename = "householdMember")]
    pub household_member: HouseholdLink,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HouseholdLink {
    pub household: ListedHousehold,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListedHousehold {
    pub uuid: RecordId,
    #[serde(rename = "familyNameLocal", default)]
    pub family_name: String,
    #[serde(rename = "directoryPreferredLocal", default)]
    pub preferred_name: String,
    #[serde(default)]
    pub address: Option<PostalAddress>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PostalAddress {
    #[serde(rename = "addressLines", default)]
    pub address_lines: Vec<String>,
}

impl MemberListEntry {
    pub fn household(&self) -> &ListedHousehold {
        &self.household_member.household
    }
}

impl ListedHousehold {
    /// Address lines joined with embedded newlines, one per label line.
    pub fn mailing_address(&self) -> String {
        self.address
            .as_ref()
            .map(|a| a.address_lines.join("\n"))
            .unwrap_or_default()
    }
}
