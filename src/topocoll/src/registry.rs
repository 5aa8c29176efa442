use std::sync::Arc;

use dashmap::DashMap;

use crate::comm::GroupId;
use crate::topology::TopologyAttributes;

struct Published {
    attributes: Arc<TopologyAttributes>,
    holders: usize,
}

/// Read-only depths and colors of live groups, for diagnostics.
///
/// Every local member of a group may publish; the entry lives until the last
/// of them retires.
#[derive(Default)]
pub struct AttributeCache {
    groups: DashMap<GroupId, Published>,
}

impl AttributeCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish<F>(&self, group: GroupId, attributes: F)
    where
        F: FnOnce() -> TopologyAttributes,
    {
        let mut entry = self.groups.entry(group).or_insert_with(|| Published {
            attributes: Arc::new(attributes()),
            holders: 0,
        });
        entry.holders += 1;
    }

    pub fn get(&self, group: GroupId) -> Option<Arc<TopologyAttributes>> {
        self.groups.get(&group).map(|p| Arc::clone(&p.attributes))
    }

    pub fn retire(&self, group: GroupId) {
        let emptied = match self.groups.get_mut(&group) {
            Some(mut entry) => {
                entry.holders -= 1;
                entry.holders == 0
            }
            None => false,
        };
        if emptied {
            self.groups.remove_if(&group, |_, p| p.holders == 0);
            log::debug!("Attributes of {} withdrawn", group);
        }
    }

    /// Drop `group` regardless of how many members still hold it.
    pub fn remove(&self, group: GroupId) -> Option<Arc<TopologyAttributes>> {
        self.groups.remove(&group).map(|(_, p)| p.attributes)
    }

    pub fn groups(&self) -> Vec<GroupId> {
        let mut groups: Vec<_> = self.groups.iter().map(|e| *e.key()).collect();
        groups.sort_unstable();
        groups
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs() -> TopologyAttributes {
        TopologyAttributes {
            depths: vec![3, 4],
            colors: vec![vec![0, 0, 0], vec![0, 1, 1, 0]],
        }
    }

    #[test]
    fn last_holder_withdraws() {
        let cache = AttributeCache::new();
        cache.publish(GroupId(2), attrs);
        cache.publish(GroupId(2), || unreachable!());
        assert_eq!(cache.get(GroupId(2)).unwrap().depths, vec![3, 4]);
        cache.retire(GroupId(2));
        assert!(cache.get(GroupId(2)).is_some());
        cache.retire(GroupId(2));
        assert!(cache.get(GroupId(2)).is_none());
        cache.retire(GroupId(2));
    }

    #[test]
    fn forced_removal() {
        let cache = AttributeCache::new();
        cache.publish(GroupId(1), attrs);
        cache.publish(GroupId(0), attrs);
        assert_eq!(cache.groups(), vec![GroupId(0), GroupId(1)]);
        assert!(cache.remove(GroupId(1)).is_some());
        assert_eq!(cache.groups(), vec![GroupId(0)]);
    }
}
