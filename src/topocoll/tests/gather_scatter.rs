mod common;

use common::{all_topologies, mixed, single_lan, two_lans, wan_singletons, Group};
use topocoll::CollectiveError;

const COUNT: usize = 3;

#[test]
fn scatter_then_gather_restores_the_vector() {
    let cases = vec![
        ("flat", single_lan(6)),
        ("two-level", two_lans(3, 4)),
        ("all singletons", wan_singletons(6)),
        ("mixed", mixed()),
    ];
    for (name, (info, members)) in cases {
        let group = Group::new(&info, members);
        let n = group.size();
        let original: Vec<u64> = (0..(n * COUNT) as u64).map(|v| v * 7 + 1).collect();
        for root in 0..n {
            let original = &original;
            let results = group.run(|comm| async move {
                let send = (comm.rank() == root).then(|| original.as_slice());
                let mine = comm.scatter(send, COUNT, root).await?;
                assert_eq!(mine, original[comm.rank() * COUNT..][..COUNT]);
                comm.gather(&mine, root).await
            });
            for (rank, result) in results.into_iter().enumerate() {
                let gathered = result.unwrap();
                if rank == root {
                    assert_eq!(gathered.as_ref(), Some(original), "{} root {}", name, root);
                } else {
                    assert!(gathered.is_none());
                }
            }
        }
    }
}

#[test]
fn gather_only_ships_subtree_blocks() {
    let (info, members) = two_lans(3, 4);
    let group = Group::new(&info, members);
    let results = group.run(|comm| async move { comm.gather(&[comm.rank() as u32], 0).await });
    assert_eq!(results[0].as_ref().unwrap().as_deref(), Some(&[0, 1, 2, 3, 4, 5, 6][..]));
    // the WAN hop carries lan b's four blocks and nothing else
    let wan = group.stats.link(3, 0);
    assert_eq!(wan.messages, 1);
    assert!(wan.bytes > group.stats.link(4, 3).bytes);
    assert_eq!(group.stats.total_messages(), 6);
}

#[test]
fn gatherv_and_scatterv_respect_displacements() {
    for (name, (info, members)) in all_topologies() {
        let group = Group::new(&info, members);
        let n = group.size();
        let counts: Vec<usize> = (0..n).map(|r| r % 3).collect();
        // reverse rank order with a one-slot gap between blocks
        let mut displs = vec![0; n];
        let mut offset = 0;
        for r in (0..n).rev() {
            displs[r] = offset;
            offset += counts[r] + 1;
        }
        let root = n / 2;
        let (counts, displs) = (&counts, &displs);
        let results = group.run(|comm| async move {
            let rank = comm.rank();
            let send: Vec<i64> = (0..counts[rank]).map(|k| (rank * 10 + k) as i64).collect();
            let gathered = comm.gatherv(&send, counts, displs, root).await?;
            let back = comm
                .scatterv(gathered.as_deref(), counts, displs, root)
                .await?;
            Ok::<_, CollectiveError>((gathered, back, send))
        });
        for (rank, result) in results.into_iter().enumerate() {
            let (gathered, back, send) = result.unwrap();
            assert_eq!(back, send, "{} rank {}", name, rank);
            if let Some(buf) = gathered {
                assert_eq!(rank, root);
                for r in 0..n {
                    let block = &buf[displs[r]..displs[r] + counts[r]];
                    let expected: Vec<i64> = (0..counts[r]).map(|k| (r * 10 + k) as i64).collect();
                    assert_eq!(block, expected.as_slice());
                }
            }
        }
    }
}

#[test]
fn scatter_root_needs_a_buffer() {
    let (info, members) = single_lan(2);
    let group = Group::new(&info, members);
    let err = smol::block_on(group.comms[0].scatter::<u8>(None, 1, 0)).unwrap_err();
    assert!(matches!(err, CollectiveError::InvalidArgument(_)));
}

#[test]
fn out_of_range_root_is_rejected() {
    let (info, members) = single_lan(3);
    let group = Group::new(&info, members);
    let err = smol::block_on(group.comms[1].gather(&[1u8], 3)).unwrap_err();
    assert!(matches!(err, CollectiveError::InvalidRoot { root: 3, size: 3 }));
}
