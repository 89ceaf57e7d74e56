//! Partition holder for one (interval, version) segment set

use crate::selector::ServerSelector;
use std::collections::BTreeMap;
use std::sync::Arc;

/// All known partitions of one (interval, version) segment set.
///
/// The announcing side declares how many partitions the set has in total;
/// the holder is complete only when every one of them is currently held by
/// at least one server. Incomplete holders stay in the index but are not
/// handed out as query routing targets.
#[derive(Clone)]
pub struct PartitionHolder {
    /// Declared partition count, recorded when the first partition arrives
    expected: u32,
    partitions: BTreeMap<u32, Arc<ServerSelector>>,
}

impl PartitionHolder {
    pub fn new(expected: u32) -> Self {
        Self {
            expected,
            partitions: BTreeMap::new(),
        }
    }

    /// Insert a partition's selector; returns false if the slot was occupied.
    pub fn insert(&mut self, partition_num: u32, selector: Arc<ServerSelector>) -> bool {
        if self.partitions.contains_key(&partition_num) {
            return false;
        }
        self.partitions.insert(partition_num, selector);
        true
    }

    pub fn remove(&mut self, partition_num: u32) -> Option<Arc<ServerSelector>> {
        self.partitions.remove(&partition_num)
    }

    pub fn get(&self, partition_num: u32) -> Option<&Arc<ServerSelector>> {
        self.partitions.get(&partition_num)
    }

    pub fn is_empty(&self) -> bool {
        self.partitions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.partitions.len()
    }

    pub fn expected(&self) -> u32 {
        self.expected
    }

    /// Whether every declared partition is present. A holder with an unknown
    /// declared count (zero) is complete as soon as any partition is present.
    pub fn is_complete(&self) -> bool {
        if self.expected == 0 {
            !self.partitions.is_empty()
        } else {
            self.partitions.len() == self.expected as usize
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &Arc<ServerSelector>)> {
        self.partitions.iter().map(|(num, sel)| (*num, sel))
    }
}
