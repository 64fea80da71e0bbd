//! Projection of nested directory records into fixed-width CSV rows.
//!
//! Every row is built before anything is written, so a failed projection
//! never leaves a truncated file behind.

use std::io::Write;

use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde::Serialize;

use crate::directory::{LookupError, UnitLookup};
use crate::models::{Household, ListedHousehold, RecordId};

/// Joins multiple position names inside a single CSV field.
pub const POSITION_SEPARATOR: &str = ",\n";

/// A serializable row with a fixed header. The header is written even when
/// there are no rows.
pub trait CsvRecord: Serialize {
    const HEADERS: &'static [&'static str];
}

/// One member of one household, in household-list mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HouseholdRow {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Household")]
    pub household: String,
    #[serde(rename = "Unit")]
    pub unit: String,
    #[serde(rename = "Address")]
    pub address: String,
    #[serde(rename = "Phone")]
    pub phone: String,
    #[serde(rename = "Email")]
    pub email: String,
    #[serde(rename = "Birthdate")]
    pub birthdate: String,
    #[serde(rename = "Positions")]
    pub positions: String,
}

impl CsvRecord for HouseholdRow {
    const HEADERS: &'static [&'static str] = &[
        "Name",
        "Household",
        "Unit",
        "Address",
        "Phone",
        "Email",
        "Birthdate",
        "Positions",
    ];
}

/// One household label, in member-list mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MailingRow {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Address")]
    pub address: String,
    #[serde(rename = "Full Name")]
    pub full_name: String,
}

impl CsvRecord for MailingRow {
    const HEADERS: &'static [&'static str] = &["Name", "Address", "Full Name"];
}

/// One row per (household, member) pair, in dedup order.
///
/// Fails on the first household whose unit is not in `units`.
pub fn project_households(
    households: &IndexMap<RecordId, Household>,
    units: &UnitLookup,
) -> Result<Vec<HouseholdRow>, LookupError> {
    let mut rows = Vec::new();
    for household in households.values() {
        let unit = units.resolve(household.id.as_str(), household.unit_id)?;
        let address = household.address.clone().unwrap_or_default();

        for member in &household.members {
            rows.push(HouseholdRow {
                name: member.preferred_name.clone(),
                household: household.display_name.clone(),
                unit: unit.to_string(),
                address: address.clone(),
                phone: member.phone.clone().unwrap_or_default(),
                email: member.email.clone().unwrap_or_default(),
                birthdate: member.birth_date.clone().unwrap_or_default(),
                positions: member.position_names().join(POSITION_SEPARATOR),
            });
        }
    }
    Ok(rows)
}

pub fn project_mailing_list(households: &IndexMap<RecordId, ListedHousehold>) -> Vec<MailingRow> {
    households
        .values()
        .map(|h| MailingRow {
            name: h.family_name.clone(),
            address: h.mailing_address(),
            full_name: h.preferred_name.clone(),
        })
        .collect()
}

/// Write a header plus `rows` with standard CSV quoting. Fields holding the
/// delimiter, a quote or a line break are quoted; inner quotes are doubled.
pub fn write_csv<W: Write, R: CsvRecord>(writer: W, rows: &[R]) -> Result<()> {
    let mut csv_writer = ::csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);
    csv_writer
        .write_record(R::HEADERS)
        .context("Failed to write CSV header")?;
    for row in rows {
        csv_writer.serialize(row).context("Failed to write CSV row")?;
    }
    csv_writer.flush().context("Failed to flush CSV output")?;
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
