//! Flat tabular exports of the deduplicated directory.

pub mod csv;

pub use self::csv::{
    project_households, project_mailing_list, write_csv, CsvRecord, HouseholdRow, MailingRow,
    POSITION_SEPARATOR,
};
