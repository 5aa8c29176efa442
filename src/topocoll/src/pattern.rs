use std::ops::Range;

/// A contiguous run of elements inside a buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Block {
    pub offset: usize,
    pub len: usize,
}

impl Block {
    pub fn range(&self) -> Range<usize> {
        self.offset..self.offset + self.len
    }
}

/// Indexed access pattern over a buffer: the ordered blocks one message
/// carries. Sender and receiver build the same pattern independently, so only
/// the selected elements travel.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IndexedPattern {
    blocks: Vec<Block>,
}

impl IndexedPattern {
    pub fn new(blocks: Vec<Block>) -> Self {
        IndexedPattern { blocks }
    }

    /// Blocks of `block_len` elements at each of `offsets`.
    pub fn uniform<I>(block_len: usize, offsets: I) -> Self
    where
        I: IntoIterator<Item = usize>,
    {
        let blocks = offsets
            .into_iter()
            .map(|offset| Block {
                offset,
                len: block_len,
            })
            .collect();
        IndexedPattern { blocks }
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Number of elements covered.
    pub fn len(&self) -> usize {
        self.blocks.iter().map(|b| b.len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn fits(&self, buf_len: usize) -> bool {
        self.blocks.iter().all(|b| b.offset + b.len <= buf_len)
    }

    pub fn pack<T: Clone>(&self, buf: &[T]) -> Vec<T> {
        let mut items = Vec::with_capacity(self.len());
        for block in &self.blocks {
            items.extend_from_slice(&buf[block.range()]);
        }
        items
    }

    /// Scatter `items` back into the blocks, in order. `items` must hold
    /// exactly `self.len()` elements.
    pub fn unpack<T>(&self, buf: &mut [T], items: Vec<T>) {
        debug_assert_eq!(items.len(), self.len());
        let mut items = items.into_iter();
        for block in &self.blocks {
            for (slot, item) in buf[block.range()].iter_mut().zip(items.by_ref()) {
                *slot = item;
            }
        }
    }
}

/// Where each group rank's block lives in a scratch buffer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockLayout {
    counts: Vec<usize>,
    displs: Vec<usize>,
}

impl BlockLayout {
    /// Blocks laid end to end in rank order.
    pub fn packed(counts: &[usize]) -> Self {
        let mut displs = Vec::with_capacity(counts.len());
        let mut offset = 0;
        for count in counts {
            displs.push(offset);
            offset += count;
        }
        BlockLayout {
            counts: counts.to_vec(),
            displs,
        }
    }

    pub fn uniform(num_ranks: usize, count: usize) -> Self {
        Self::packed(&vec![count; num_ranks])
    }

    pub fn with_displs(counts: &[usize], displs: &[usize]) -> Self {
        BlockLayout {
            counts: counts.to_vec(),
            displs: displs.to_vec(),
        }
    }

    pub fn num_ranks(&self) -> usize {
        self.counts.len()
    }

    pub fn total_len(&self) -> usize {
        self.counts
            .iter()
            .zip(&self.displs)
            .map(|(c, d)| c + d)
            .max()
            .unwrap_or(0)
    }

    pub fn block(&self, rank: usize) -> Block {
        Block {
            offset: self.displs[rank],
            len: self.counts[rank],
        }
    }

    /// Pattern over the blocks of `ranks`, in the given order.
    pub fn pattern(&self, ranks: &[usize]) -> IndexedPattern {
        IndexedPattern::new(ranks.iter().map(|&r| self.block(r)).collect())
    }
}
