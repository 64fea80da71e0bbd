//! Data models for directory entities.
//!
//! These types decode the payloads returned by the directory service:
//!
//! - `Household`, `Member`, `Position`: the household directory
//! - `Unit`: the parent unit and its child units
//! - `MemberListEntry`: one row of the flat member list
//!
//! Optional upstream fields are decoded into `Option` when the record is
//! constructed, so nothing downstream inspects raw key presence.

pub mod household;
pub mod id;
pub mod member_list;
pub mod unit;

pub use household::{Household, Member, Position};
pub use id::RecordId;
pub use member_list::{ListedHousehold, MemberListEntry, PostalAddress};
pub use unit::{Unit, UnitNumber};
