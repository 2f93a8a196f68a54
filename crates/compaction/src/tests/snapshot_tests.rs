use crate::*;
use anyhow::Result;
use base::SEQ_NUM_MAX;

// -------------------- snapshot_index --------------------

#[test]
fn index_is_first_snapshot_above_seq() -> Result<()> {
    let snaps = [10, 20];
    assert_eq!(snapshot_index(0, &snaps), (0, 10));
    assert_eq!(snapshot_index(9, &snaps), (0, 10));
    // A snapshot at 10 does not see seq 10.
    assert_eq!(snapshot_index(10, &snaps), (1, 20));
    assert_eq!(snapshot_index(19, &snaps), (1, 20));
    assert_eq!(snapshot_index(20, &snaps), (2, SEQ_NUM_MAX));
    assert_eq!(snapshot_index(SEQ_NUM_MAX, &snaps), (2, SEQ_NUM_MAX));
    Ok(())
}

#[test]
fn no_snapshots_is_one_stripe() -> Result<()> {
    assert_eq!(snapshot_index(0, &[]), (0, SEQ_NUM_MAX));
    assert_eq!(snapshot_index(12345, &[]), (0, SEQ_NUM_MAX));
    Ok(())
}

// -------------------- Snapshots --------------------

#[test]
fn snapshots_are_sorted_and_deduped() -> Result<()> {
    let snaps = Snapshots::new(vec![20, 5, 20, 10]);
    assert_eq!(snaps.as_slice(), &[5, 10, 20]);
    assert_eq!(snaps.len(), 3);
    assert!(!snaps.is_empty());
    assert!(Snapshots::default().is_empty());
    assert_eq!(Snapshots::from([3, 1]).as_slice(), &[1, 3]);
    Ok(())
}

#[test]
fn classify_is_pure() -> Result<()> {
    let snaps = Snapshots::from(vec![8]);
    let before = snaps.classify(9);
    for seq in [0, 7, 8, 100, 3] {
        snaps.classify(seq);
    }
    assert_eq!(snaps.classify(9), before);
    assert_eq!(
        snaps.classify(7),
        Stripe {
            index: 0,
            ceiling: 8
        }
    );
    assert_eq!(
        snaps.classify(8),
        Stripe {
            index: 1,
            ceiling: SEQ_NUM_MAX
        }
    );
    Ok(())
}

#[test]
fn same_seq_same_stripe() -> Result<()> {
    let snaps = Snapshots::from([4, 9, 15]);
    for seq in 0..20 {
        let a = snaps.classify(seq);
        let b = snaps.classify(seq);
        assert_eq!(a, b);
        assert!(seq < a.ceiling);
    }
    Ok(())
}
