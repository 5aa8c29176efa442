mod common;

use common::{all_topologies, single_lan, two_lans, Group};
use topocoll::{Concat, LevelKind, Max, ReduceFn, Sum, TreeShape};

fn letter(rank: usize) -> String {
    ((b'a' + rank as u8) as char).to_string()
}

#[test]
fn sum_of_ones_is_group_size() {
    let mut cases = all_topologies();
    let (info, members) = two_lans(4, 3);
    let swapped = info
        .with_shape(LevelKind::Wan, TreeShape::Binomial)
        .with_shape(LevelKind::Lan, TreeShape::Flat);
    cases.push(("swapped shapes", (swapped, members)));

    for (name, (info, members)) in cases {
        let group = Group::new(&info, members);
        let n = group.size() as u64;
        for root in 0..group.size() {
            let results = group.run(|comm| async move { comm.reduce(&[1u64, 2], &Sum, root).await });
            for (rank, result) in results.into_iter().enumerate() {
                let reduced = result.unwrap();
                if rank == root {
                    assert_eq!(reduced, Some(vec![n, 2 * n]), "{} root {}", name, root);
                } else {
                    assert_eq!(reduced, None);
                }
            }
        }
    }
}

#[test]
fn concatenation_follows_rank_order() {
    for (name, (info, members)) in all_topologies() {
        let group = Group::new(&info, members);
        let n = group.size();
        let expected: String = (0..n).map(letter).collect();
        for root in [0, n - 1, n / 2] {
            let results = group.run(|comm| async move { comm.reduce(&[letter(comm.rank())], &Concat, root).await });
            let at_root = results.into_iter().nth(root).unwrap().unwrap();
            assert_eq!(at_root, Some(vec![expected.clone()]), "{} root {}", name, root);
        }
    }
}

#[test]
fn non_commutative_closure_goes_straight_to_root() {
    let (info, members) = two_lans(3, 4);
    let group = Group::new(&info, members);
    let op = ReduceFn::non_commutative(|acc: &mut u64, x: &u64| *acc = *acc * 10 + *x);
    let op = &op;
    let results = group.run(|comm| async move { comm.reduce(&[comm.rank() as u64 + 1], op, 5).await });
    assert_eq!(results[5].as_ref().unwrap(), &Some(vec![1234567]));
    // one direct message from every other rank
    for rank in (0..7).filter(|&r| r != 5) {
        assert_eq!(group.stats.link(rank, 5).messages, 1);
    }
    assert_eq!(group.stats.total_messages(), 6);
}

#[test]
fn allreduce_everywhere() {
    for (name, (info, members)) in all_topologies() {
        let group = Group::new(&info, members);
        let n = group.size() as i64;
        let results = group.run(|comm| async move {
            let rank = comm.rank() as i64;
            comm.allreduce(&[rank, -rank], &Max).await
        });
        for result in results {
            assert_eq!(result.unwrap(), vec![n - 1, 0], "{}", name);
        }
    }
}

#[test]
fn reduce_scatter_hands_out_reduced_blocks() {
    let (info, members) = two_lans(2, 3);
    let group = Group::new(&info, members);
    let counts = [2, 0, 1, 3, 1];
    let total: usize = counts.iter().sum();
    let counts = &counts;
    let results = group.run(|comm| async move {
        let send: Vec<u32> = (0..total as u32).map(|i| i + comm.rank() as u32).collect();
        comm.reduce_scatter(&send, counts, &Sum).await
    });
    // element i sums to 5 * i + (0 + 1 + 2 + 3 + 4)
    let reduced: Vec<u32> = (0..total as u32).map(|i| 5 * i + 10).collect();
    let mut offset = 0;
    for (rank, result) in results.into_iter().enumerate() {
        assert_eq!(result.unwrap(), reduced[offset..offset + counts[rank]]);
        offset += counts[rank];
    }
}

#[test]
fn scan_is_an_inclusive_prefix() {
    for (name, (info, members)) in all_topologies() {
        let group = Group::new(&info, members);
        let results = group.run(|comm| async move {
            let rank = comm.rank();
            let sums = comm.scan(&[rank as u64 + 1], &Sum).await?;
            let words = comm.scan(&[letter(rank)], &Concat).await?;
            Ok::<_, topocoll::CollectiveError>((sums, words))
        });
        for (rank, result) in results.into_iter().enumerate() {
            let (sums, words) = result.unwrap();
            let r = rank as u64;
            assert_eq!(sums, vec![(r + 1) * (r + 2) / 2], "{} rank {}", name, rank);
            assert_eq!(words, vec![(0..=rank).map(letter).collect::<String>()]);
        }
    }
}

#[test]
fn mismatched_lengths_are_a_protocol_violation() {
    let (info, members) = single_lan(2);
    let group = Group::new(&info, members);
    let results = group.run(|comm| async move {
        let len = if comm.rank() == 0 { 2 } else { 3 };
        comm.reduce(&vec![1u8; len], &Sum, 0).await
    });
    assert!(matches!(
        results[0],
        Err(topocoll::CollectiveError::Protocol(_))
    ));
    assert!(results[1].is_ok());
}
