//! Static group membership between columns.

use super::{GroupId, GroupIndex};
use crate::error::ConfigError;

/// Two-way group membership table.
///
/// Built once from the ordered member list of each group; the reverse
/// column → groups index is derived from it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AdjacencyMap {
    groups: Vec<Vec<usize>>,
    column_groups: Vec<Vec<GroupId>>,
}

impl AdjacencyMap {
    /// Builds the map for `columns` columns from group member lists.
    ///
    /// Members outside `[0, columns)` are kept in the group list but not
    /// indexed in reverse; [`validate`](Self::validate) reports them.
    #[must_use]
    pub fn from_groups(groups: Vec<Vec<usize>>, columns: usize) -> Self {
        let mut column_groups = vec![Vec::new(); columns];
        for (group, members) in groups.iter().enumerate() {
            for &m in members {
                if let Some(slot) = column_groups.get_mut(m) {
                    if !slot.contains(&group) {
                        slot.push(group);
                    }
                }
            }
        }
        Self {
            groups,
            column_groups,
        }
    }

    /// Builds the map from explicit tables in both directions.
    ///
    /// No consistency is assumed; run [`validate`](Self::validate).
    #[must_use]
    pub fn from_tables(groups: Vec<Vec<usize>>, column_groups: Vec<Vec<GroupId>>) -> Self {
        Self {
            groups,
            column_groups,
        }
    }

    /// Number of columns covered by the reverse index.
    #[must_use]
    pub fn column_count(&self) -> usize {
        self.column_groups.len()
    }

    /// Checks the map against a dataset of `len` columns.
    ///
    /// Fails on empty groups, members outside the dataset, and columns that
    /// reference groups that do not exist.
    pub fn validate(&self, len: usize) -> Result<(), ConfigError> {
        validate_index(self, len)?;
        // The reverse table may be longer than the dataset.
        for (index, groups) in self.column_groups.iter().enumerate().skip(len) {
            if let Some(&group) = groups.first() {
                return Err(ConfigError::DanglingMember { group, index, len });
            }
        }
        Ok(())
    }
}

/// Checks any [`GroupIndex`] against a dataset of `len` columns.
pub fn validate_index<A: GroupIndex + ?Sized>(adjacency: &A, len: usize) -> Result<(), ConfigError> {
    let count = adjacency.group_count();
    for group in 0..count {
        let members = adjacency.members_of(group);
        if members.is_empty() {
            return Err(ConfigError::EmptyGroup { group });
        }
        if let Some(&index) = members.iter().find(|&&m| m >= len) {
            return Err(ConfigError::DanglingMember { group, index, len });
        }
    }
    for index in 0..len {
        if let Some(&group) = adjacency.groups_of(index).iter().find(|&&g| g >= count) {
            return Err(ConfigError::UnknownGroup { index, group });
        }
    }
    Ok(())
}

impl GroupIndex for AdjacencyMap {
    fn group_count(&self) -> usize {
        self.groups.len()
    }

    fn groups_of(&self, index: usize) -> &[GroupId] {
        self.column_groups.get(index).map_or(&[][..], Vec::as_slice)
    }

    fn members_of(&self, group: GroupId) -> &[usize] {
        self.groups.get(group).map_or(&[][..], Vec::as_slice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reverse_index_derived() {
        let map = AdjacencyMap::from_groups(vec![vec![0, 1, 2], vec![2, 3]], 5);
        assert_eq!(map.group_count(), 2);
        assert_eq!(map.groups_of(2), &[0, 1]);
        assert_eq!(map.groups_of(4), &[] as &[usize]);
        assert_eq!(map.groups_of(100), &[] as &[usize]);
        assert_eq!(map.members_of(1), &[2, 3]);
        assert_eq!(map.members_of(9), &[] as &[usize]);
        assert!(map.validate(5).is_ok());
        assert!(validate_index(&map, 5).is_ok());
    }

    #[test]
    fn empty_group_rejected() {
        let map = AdjacencyMap::from_groups(vec![vec![0], vec![]], 2);
        assert!(matches!(map.validate(2), Err(ConfigError::EmptyGroup { group: 1 })));
        assert!(matches!(
            validate_index(&map, 2),
            Err(ConfigError::EmptyGroup { group: 1 })
        ));
    }

    #[test]
    fn dangling_member_rejected() {
        let map = AdjacencyMap::from_groups(vec![vec![0, 7]], 3);
        assert!(matches!(
            map.validate(3),
            Err(ConfigError::DanglingMember {
                group: 0,
                index: 7,
                len: 3
            })
        ));
    }

    #[test]
    fn unknown_group_rejected() {
        let map = AdjacencyMap::from_tables(vec![vec![0]], vec![vec![0], vec![4]]);
        assert!(matches!(
            map.validate(2),
            Err(ConfigError::UnknownGroup { index: 1, group: 4 })
        ));
        assert!(matches!(
            validate_index(&map, 2),
            Err(ConfigError::UnknownGroup { index: 1, group: 4 })
        ));
    }

    #[test]
    fn reverse_entries_past_dataset_rejected() {
        let map = AdjacencyMap::from_tables(vec![vec![0]], vec![vec![0], vec![], vec![0]]);
        assert!(validate_index(&map, 2).is_ok());
        assert!(matches!(
            map.validate(2),
            Err(ConfigError::DanglingMember {
                group: 0,
                index: 2,
                len: 2
            })
        ));
        assert!(map.validate(3).is_ok());
    }

    #[test]
    fn duplicate_membership_indexed_once() {
        let map = AdjacencyMap::from_groups(vec![vec![1, 1, 0]], 2);
        assert_eq!(map.groups_of(1), &[0]);
    }
}
