use std::collections::HashSet;

use indexmap::map::Entry;
use indexmap::IndexMap;

use crate::models::{Household, ListedHousehold, Member, MemberListEntry, RecordId};

/// Collapse members sharing an id, keeping the first occurrence.
pub fn dedupe_members<I>(members: I) -> IndexMap<RecordId, Member>
where
    I: IntoIterator<Item = Member>,
{
    let mut unique = IndexMap::new();
    for member in members {
        unique.entry(member.id.clone()).or_insert(member);
    }
    unique
}

/// Collapse households sharing an id, in order of first appearance.
///
/// The first record for a household id supplies its fields. Member ids are
/// unique across the whole directory, so a member is kept only the first
/// time it is seen in any household. A repeated household contributes
/// members that were not seen before, appended after the ones already held.
pub fn dedupe_households<I>(households: I) -> IndexMap<RecordId, Household>
where
    I: IntoIterator<Item = Household>,
{
    let mut unique: IndexMap<RecordId, Household> = IndexMap::new();
    let mut seen_members: HashSet<RecordId> = HashSet::new();

    for household in households {
        let new_members: Vec<Member> = dedupe_members(household.members.iter().cloned())
            .into_values()
            .filter(|m| seen_members.insert(m.id.clone()))
            .collect();

        match unique.entry(household.id.clone()) {
            Entry::Occupied(mut existing) => {
                existing.get_mut().members.extend(new_members);
            }
            Entry::Vacant(slot) => {
                slot.insert(Household {
                    members: new_members,
                    ..household
                });
            }
        }
    }

    unique
}

/// Distinct households referenced by a member list, first occurrence wins.
pub fn dedupe_member_list_households<'a, I>(entries: I) -> IndexMap<RecordId, ListedHousehold>
where
    I: IntoIterator<Item = &'a MemberListEntry>,
{
    let mut unique = IndexMap::new();
    for entry in entries {
        let household = entry.household();
        unique
            .entry(household.uuid.clone())
            .or_insert_with(|| household.clone());
    }
    unique
}

// ============================================================================
// Tests
// ============================================================================
