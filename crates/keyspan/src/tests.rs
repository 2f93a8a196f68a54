use super::*;
use anyhow::Result;
use base::{make_trailer, Comparer, InternalKey};

fn del(seq: u64) -> SpanKey {
    SpanKey::new(make_trailer(seq, InternalKeyKind::RangeDelete))
}

fn rendered(spans: &[Span]) -> Vec<String> {
    spans.iter().map(|s| s.to_string()).collect()
}

#[test]
fn overlapping_spans_fragment_at_each_boundary() {
    let mut f = SpanFragmenter::new(Comparer::default());
    assert!(f.add(Span::new("a", "e", vec![del(1)])).is_empty());
    let out = f.add(Span::new("c", "g", vec![del(2)]));
    assert_eq!(rendered(&out), ["a-c:[#1,RANGEDEL]"]);
    assert_eq!(f.start(), Some(&b"c"[..]));

    let out = f.finish();
    assert_eq!(
        rendered(&out),
        ["c-e:[#2,RANGEDEL, #1,RANGEDEL]", "e-g:[#2,RANGEDEL]"]
    );
    assert!(f.is_empty());
}

#[test]
fn same_start_spans_stack() {
    let mut f = SpanFragmenter::new(Comparer::default());
    f.add(Span::new("a", "c", vec![del(3)]));
    f.add(Span::new("a", "f", vec![del(7)]));
    let out = f.finish();
    assert_eq!(
        rendered(&out),
        ["a-c:[#7,RANGEDEL, #3,RANGEDEL]", "c-f:[#7,RANGEDEL]"]
    );
}

#[test]
fn empty_interval_is_ignored() {
    let mut f = SpanFragmenter::new(Comparer::default());
    assert!(f.add(Span::new("k", "k", vec![del(1)])).is_empty());
    assert!(f.add(Span::new("z", "a", vec![del(1)])).is_empty());
    assert!(f.is_empty());
    assert!(f.finish().is_empty());
}

#[test]
fn disjoint_span_flushes_predecessor_whole() {
    let mut f = SpanFragmenter::new(Comparer::default());
    f.add(Span::new("a", "b", vec![del(4)]));
    let out = f.add(Span::new("m", "n", vec![del(5)]));
    assert_eq!(rendered(&out), ["a-b:[#4,RANGEDEL]"]);
    assert_eq!(rendered(&f.finish()), ["m-n:[#5,RANGEDEL]"]);
}

#[test]
fn truncate_and_flush_to_splits_pending() {
    let mut f = SpanFragmenter::new(Comparer::default());
    f.add(Span::new("a", "z", vec![del(2)]));

    // At or before the pending start nothing is emitted.
    assert!(f.truncate_and_flush_to(b"a").is_empty());

    let out = f.truncate_and_flush_to(b"m");
    assert_eq!(rendered(&out), ["a-m:[#2,RANGEDEL]"]);
    assert_eq!(f.start(), Some(&b"m"[..]));
    assert_eq!(rendered(&f.finish()), ["m-z:[#2,RANGEDEL]"]);
}

#[test]
fn covers_respects_sequence_and_snapshot() -> Result<()> {
    let mut f = SpanFragmenter::new(Comparer::default());
    f.add(Span::new("a", "m", vec![del(10)]));

    let older: InternalKey = "c#5,SET".parse()?;
    let newer: InternalKey = "c#12,SET".parse()?;
    let outside: InternalKey = "m#1,SET".parse()?;

    // Stripe ceiling above the tombstone: same stripe, visibly deleted.
    assert_eq!(f.covers(older.as_ref(), 20), Coverage::Visibly);
    // A snapshot at 8 separates them; the older key must survive.
    assert_eq!(f.covers(older.as_ref(), 8), Coverage::Invisibly);
    assert_eq!(f.covers(newer.as_ref(), 20), Coverage::None);
    assert_eq!(f.covers(outside.as_ref(), 20), Coverage::None);
    Ok(())
}

#[test]
fn covers_equal_sequence_is_not_deleted() -> Result<()> {
    let mut f = SpanFragmenter::new(Comparer::default());
    f.add(Span::new("a", "m", vec![del(10)]));
    let same: InternalKey = "b#10,SET".parse()?;
    assert_eq!(f.covers(same.as_ref(), u64::MAX), Coverage::None);
    Ok(())
}

#[test]
#[should_panic(expected = "precedes pending start")]
fn out_of_order_add_panics() {
    let mut f = SpanFragmenter::new(Comparer::default());
    f.add(Span::new("m", "z", vec![del(1)]));
    f.add(Span::new("a", "c", vec![del(2)]));
}

#[test]
#[should_panic(expected = "after finish")]
fn add_after_finish_panics() {
    let mut f = SpanFragmenter::new(Comparer::default());
    f.finish();
    f.add(Span::new("a", "c", vec![del(2)]));
}

#[test]
fn range_key_payload_survives_fragmentation() {
    let mut f = SpanFragmenter::new(Comparer::default());
    let set = SpanKey::with_payload(
        make_trailer(6, InternalKeyKind::RangeKeySet),
        b"@3".to_vec(),
        b"v".to_vec(),
    );
    f.add(Span::new("a", "d", vec![set.clone()]));
    let out = f.truncate_and_flush_to(b"b");
    assert_eq!(out[0].keys, vec![set.clone()]);
    assert_eq!(rendered(&out), ["a-b:[#6,RANGEKEYSET(@3:v)]"]);
    assert_eq!(f.finish()[0].keys, vec![set]);
}
