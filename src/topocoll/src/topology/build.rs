use std::collections::HashSet;

use crate::channel::{ChannelInfoProvider, ChannelLevel, ProcessId};

use super::{Jagged, LevelInfo, TopologyError, TopologyModel};

const UNSET: usize = usize::MAX;

impl TopologyModel {
    /// Discover the topology of a group from its members' channel information.
    ///
    /// `members[i]` is the identity of group rank `i`. Any inconsistency in the
    /// provider's answers aborts construction.
    pub fn build<P>(members: &[ProcessId], provider: &P) -> Result<Self, TopologyError>
    where
        P: ChannelInfoProvider + ?Sized,
    {
        let size = members.len();
        if size == 0 {
            return Err(TopologyError::EmptyGroup);
        }
        let mut seen = HashSet::with_capacity(size);
        if let Some(&process) = members.iter().find(|&&process| !seen.insert(process)) {
            return Err(TopologyError::DuplicateMember(process));
        }

        let channels = members
            .iter()
            .map(|&process| provider.levels(process))
            .collect::<Result<Vec<_>, _>>()?;
        let depths: Vec<usize> = channels.iter().map(Vec::len).collect();
        let levels = describe_levels(&channels, provider)?;

        let (colors, cluster_sizes, ranks) =
            color_levels(&channels, &depths, levels.len(), provider);
        verify_coloring(&channels, &colors, provider)?;
        if cluster_sizes[0].len() != 1 {
            return Err(TopologyError::Disconnected(cluster_sizes[0].len()));
        }

        let (cluster_ids, cluster_counts) =
            assign_cluster_ids(&colors, &depths, levels.len(), &cluster_sizes);

        log::debug!(
            "Topology of {} ranks: max depth {}, colors per level {:?}",
            size,
            levels.len(),
            cluster_sizes.iter().map(Vec::len).collect::<Vec<_>>()
        );

        Ok(TopologyModel {
            size,
            depths,
            levels,
            colors,
            cluster_ids,
            ranks,
            cluster_sizes,
            cluster_counts,
        })
    }
}

fn describe_levels<P>(
    channels: &[Vec<ChannelLevel>],
    provider: &P,
) -> Result<Vec<LevelInfo>, TopologyError>
where
    P: ChannelInfoProvider + ?Sized,
{
    let max_depth = channels.iter().map(Vec::len).max().unwrap_or(0);
    let mut levels = Vec::with_capacity(max_depth);
    for lvl in 0..max_depth {
        let mut expected = None;
        for (rank, row) in channels.iter().enumerate() {
            let Some(level) = row.get(lvl) else {
                continue;
            };
            match expected {
                None => expected = Some(level.kind),
                Some(kind) if kind != level.kind => {
                    return Err(TopologyError::LevelKindMismatch {
                        level: lvl,
                        rank,
                        expected: kind,
                        found: level.kind,
                    })
                }
                Some(_) => {}
            }
        }
        // max_depth guarantees at least one process has this level
        if let Some(kind) = expected {
            levels.push(LevelInfo {
                kind,
                shape: provider.tree_shape(kind),
            });
        }
    }
    Ok(levels)
}

fn color_levels<P>(
    channels: &[Vec<ChannelLevel>],
    depths: &[usize],
    max_depth: usize,
    provider: &P,
) -> (Jagged<usize>, Vec<Vec<usize>>, Jagged<usize>)
where
    P: ChannelInfoProvider + ?Sized,
{
    let size = depths.len();
    let mut colors = Jagged::from_lengths(depths, UNSET);
    let mut ranks = Jagged::from_lengths(depths, UNSET);
    let mut cluster_sizes = Vec::with_capacity(max_depth);

    for lvl in 0..max_depth {
        let mut next_color = 0;
        for p in 0..size {
            if lvl >= depths[p] || colors.row(p)[lvl] != UNSET {
                continue;
            }
            let color = next_color;
            next_color += 1;
            colors.row_mut(p)[lvl] = color;
            for q in p + 1..size {
                if lvl < depths[q]
                    && colors.row(q)[lvl] == UNSET
                    && provider.level_match(&channels[p][lvl], &channels[q][lvl])
                {
                    colors.row_mut(q)[lvl] = color;
                }
            }
        }

        let mut sizes = vec![0; next_color];
        for p in 0..size {
            if lvl < depths[p] {
                let color = colors.row(p)[lvl];
                ranks.row_mut(p)[lvl] = sizes[color];
                sizes[color] += 1;
            }
        }
        log::trace!("Level {}: {} colors, sizes {:?}", lvl, next_color, sizes);
        cluster_sizes.push(sizes);
    }
    (colors, cluster_sizes, ranks)
}

// Greedy coloring only compares against the first member of a color, so the
// full pairwise relation is checked once here.
fn verify_coloring<P>(
    channels: &[Vec<ChannelLevel>],
    colors: &Jagged<usize>,
    provider: &P,
) -> Result<(), TopologyError>
where
    P: ChannelInfoProvider + ?Sized,
{
    let size = channels.len();
    for p in 0..size {
        for q in p + 1..size {
            let shared = channels[p].len().min(channels[q].len());
            for lvl in 0..shared {
                let forward = provider.level_match(&channels[p][lvl], &channels[q][lvl]);
                let backward = provider.level_match(&channels[q][lvl], &channels[p][lvl]);
                if forward != backward {
                    return Err(TopologyError::AsymmetricMatch { level: lvl, p, q });
                }
                let same_color = colors.row(p)[lvl] == colors.row(q)[lvl];
                if forward != same_color {
                    return Err(TopologyError::NonTransitiveMatch { level: lvl, p, q });
                }
                if same_color && lvl > 0 && colors.row(p)[lvl - 1] != colors.row(q)[lvl - 1] {
                    return Err(TopologyError::NonNestedLevels { level: lvl, p, q });
                }
            }
        }
    }
    Ok(())
}

// Deepest level first, so that the finer grouping at lvl + 1 is known when
// numbering lvl.
fn assign_cluster_ids(
    colors: &Jagged<usize>,
    depths: &[usize],
    max_depth: usize,
    cluster_sizes: &[Vec<usize>],
) -> (Jagged<usize>, Vec<Vec<usize>>) {
    let size = depths.len();
    let mut cluster_ids = Jagged::from_lengths(depths, UNSET);
    let mut cluster_counts = vec![Vec::new(); max_depth];

    for lvl in (0..max_depth).rev() {
        let mut counts = vec![0; cluster_sizes[lvl].len()];
        for p in 0..size {
            if lvl >= depths[p] || cluster_ids.row(p)[lvl] != UNSET {
                continue;
            }
            let color = colors.row(p)[lvl];
            cluster_ids.row_mut(p)[lvl] = 0;
            let mut next_id = 1;
            for q in p + 1..size {
                if lvl >= depths[q] || colors.row(q)[lvl] != color {
                    continue;
                }
                let inherited = if lvl + 1 < depths[q] {
                    let finer = colors.row(q)[lvl + 1];
                    (p..q)
                        .find(|&q2| {
                            lvl + 1 < depths[q2]
                                && colors.row(q2)[lvl] == color
                                && colors.row(q2)[lvl + 1] == finer
                        })
                        .map(|q2| cluster_ids.row(q2)[lvl])
                } else {
                    None
                };
                let id = match inherited {
                    Some(id) => id,
                    None => {
                        next_id += 1;
                        next_id - 1
                    }
                };
                cluster_ids.row_mut(q)[lvl] = id;
            }
            counts[color] = next_id;
        }
        cluster_counts[lvl] = counts;
    }
    (cluster_ids, cluster_counts)
}
