use crate::channel::TreeShape;
use crate::topology::CommSet;

/// Parent/child relations of one CommSet laid out as a flat or binomial tree
/// rooted at the set root. All positions are indices into the set.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TreeSchedule {
    shape: TreeShape,
    size: usize,
    root: usize,
    me: usize,
}

#[inline]
fn lowbit(rel: usize) -> usize {
    rel & rel.wrapping_neg()
}

impl TreeSchedule {
    pub fn new(shape: TreeShape, size: usize, root: usize, me: usize) -> Self {
        debug_assert!(root < size && me < size);
        TreeSchedule {
            shape,
            size,
            root,
            me,
        }
    }

    pub fn for_set(set: &CommSet) -> Self {
        Self::new(set.shape, set.size(), set.root_index, set.my_index)
    }

    fn rel(&self, index: usize) -> usize {
        (index + self.size - self.root) % self.size
    }

    fn abs(&self, rel: usize) -> usize {
        (rel + self.root) % self.size
    }

    pub fn is_root(&self) -> bool {
        self.me == self.root
    }

    pub fn parent(&self) -> Option<usize> {
        self.parent_of(self.me)
    }

    pub fn parent_of(&self, index: usize) -> Option<usize> {
        let rel = self.rel(index);
        if rel == 0 {
            return None;
        }
        match self.shape {
            TreeShape::Flat => Some(self.root),
            TreeShape::Binomial => Some(self.abs(rel - lowbit(rel))),
        }
    }

    /// Children of the caller, smallest subtree first.
    pub fn children(&self) -> Vec<usize> {
        self.children_of(self.me)
    }

    pub fn children_of(&self, index: usize) -> Vec<usize> {
        let rel = self.rel(index);
        match self.shape {
            TreeShape::Flat if rel == 0 => (1..self.size).map(|r| self.abs(r)).collect(),
            TreeShape::Flat => Vec::new(),
            TreeShape::Binomial => {
                let limit = if rel == 0 {
                    self.size.next_power_of_two()
                } else {
                    lowbit(rel)
                };
                let mut children = Vec::new();
                let mut mask = 1;
                while mask < limit && rel + mask < self.size {
                    children.push(self.abs(rel + mask));
                    mask <<= 1;
                }
                children
            }
        }
    }

    /// Indices in the subtree hanging off `index`, itself included.
    pub fn subtree(&self, index: usize) -> Vec<usize> {
        let rel = self.rel(index);
        let span = if rel == 0 {
            self.size
        } else {
            match self.shape {
                TreeShape::Flat => 1,
                TreeShape::Binomial => lowbit(rel).min(self.size - rel),
            }
        };
        (rel..rel + span).map(|r| self.abs(r)).collect()
    }

    /// Rounds a fan-out from the root takes when each node serves one child
    /// per round, largest subtree first. A flat root posts all of its sends
    /// in a single round.
    pub fn rounds(&self) -> usize {
        let mut arrival = vec![0; self.size];
        let mut frontier = vec![self.root];
        let mut rounds = 0;
        while let Some(node) = frontier.pop() {
            for (k, child) in self.children_of(node).into_iter().rev().enumerate() {
                let wait = match self.shape {
                    TreeShape::Flat => 1,
                    TreeShape::Binomial => k + 1,
                };
                arrival[child] = arrival[node] + wait;
                rounds = rounds.max(arrival[child]);
                frontier.push(child);
            }
        }
        rounds
    }

    /// Hops between `index` and the root.
    pub fn hops(&self, index: usize) -> usize {
        let rel = self.rel(index);
        match self.shape {
            TreeShape::Flat => usize::from(rel != 0),
            TreeShape::Binomial => rel.count_ones() as usize,
        }
    }
}
