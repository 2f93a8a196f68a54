use crate::*;
use anyhow::Result;
use keyspan::Span;

use super::helpers::*;

fn rendered(spans: &[Span]) -> Vec<String> {
    spans.iter().map(|s| s.to_string()).collect()
}

// -------------------- Range deletions --------------------

#[test]
fn newest_tombstone_per_stripe() -> Result<()> {
    let mut iter = CompactionIter::new(
        upstream(&[
            ("a#20,RANGEDEL", "b"),
            ("a#15,RANGEDEL", "b"),
            ("a#5,RANGEDEL", "b"),
        ])?,
        options(&[10]),
    );
    assert_eq!(
        drain(&mut iter)?,
        vec!["a#20,RANGEDEL=b", "a#15,RANGEDEL=b", "a#5,RANGEDEL=b"]
    );
    assert_eq!(
        rendered(&iter.tombstones(None)),
        vec!["a-b:[#20,RANGEDEL, #5,RANGEDEL]"]
    );
    Ok(())
}

#[test]
fn oldest_stripe_tombstone_elided() -> Result<()> {
    let mut iter = CompactionIter::new(
        upstream(&[("a#20,RANGEDEL", "b"), ("a#5,RANGEDEL", "b")])?,
        bottommost(&[10]),
    );
    drain(&mut iter)?;
    assert_eq!(rendered(&iter.tombstones(None)), vec!["a-b:[#20,RANGEDEL]"]);
    Ok(())
}

#[test]
fn fragment_with_only_elided_keys_dropped() -> Result<()> {
    let mut iter = CompactionIter::new(upstream(&[("a#5,RANGEDEL", "b")])?, bottommost(&[10]));
    drain(&mut iter)?;
    assert!(iter.tombstones(None).is_empty());
    Ok(())
}

#[test]
fn overlapping_tombstones_are_fragmented() -> Result<()> {
    let mut iter = CompactionIter::new(
        upstream(&[("a#1,RANGEDEL", "e"), ("c#2,RANGEDEL", "g")])?,
        options(&[]),
    );
    drain(&mut iter)?;
    // Without snapshots only the newest key of each fragment remains.
    assert_eq!(
        rendered(&iter.tombstones(None)),
        vec!["a-c:[#1,RANGEDEL]", "c-e:[#2,RANGEDEL]", "e-g:[#2,RANGEDEL]"]
    );
    Ok(())
}

#[test]
fn drain_includes_tombstone_just_returned() -> Result<()> {
    let mut iter = CompactionIter::new(
        upstream(&[("a#10,RANGEDEL", "z"), ("m#12,SET", "x")])?,
        options(&[]),
    );
    assert_eq!(iter.first()?.map(render).as_deref(), Some("a#10,RANGEDEL=z"));
    assert_eq!(
        rendered(&iter.tombstones(Some(b"m".as_slice()))),
        vec!["a-m:[#10,RANGEDEL]"]
    );

    assert_eq!(iter.next()?.map(render).as_deref(), Some("m#12,SET=x"));
    assert!(iter.next()?.is_none());
    assert_eq!(rendered(&iter.tombstones(None)), vec!["m-z:[#10,RANGEDEL]"]);
    Ok(())
}

#[test]
fn drain_before_pending_start_is_empty() -> Result<()> {
    let mut iter = CompactionIter::new(upstream(&[("m#10,RANGEDEL", "z")])?, options(&[]));
    assert!(iter.first()?.is_some());
    assert!(iter.tombstones(Some(b"c".as_slice())).is_empty());
    assert_eq!(rendered(&iter.tombstones(None)), vec!["m-z:[#10,RANGEDEL]"]);
    Ok(())
}

// -------------------- Range keys --------------------

#[test]
fn range_keys_are_fragmented() -> Result<()> {
    let a = range_key_body("c", "@1", "v");
    let b = range_key_body("d", "@2", "w");
    let mut iter = CompactionIter::new(
        upstream(&[("a#9,RANGEKEYSET", a.as_str()), ("b#8,RANGEKEYSET", b.as_str())])?,
        options(&[]),
    );

    let mut keys = Vec::new();
    let mut next = iter.first()?.map(|kv| kv.key.to_string());
    while let Some(k) = next {
        keys.push(k);
        next = iter.next()?.map(|kv| kv.key.to_string());
    }
    assert_eq!(keys, vec!["a#9,RANGEKEYSET", "b#8,RANGEKEYSET"]);

    assert_eq!(
        rendered(&iter.range_keys(None)),
        vec![
            "a-b:[#9,RANGEKEYSET(@1:v)]",
            "b-c:[#9,RANGEKEYSET(@1:v), #8,RANGEKEYSET(@2:w)]",
            "c-d:[#8,RANGEKEYSET(@2:w)]",
        ]
    );
    assert!(iter.tombstones(None).is_empty());
    Ok(())
}

#[test]
fn range_keys_keep_every_stripe() -> Result<()> {
    let set = range_key_body("c", "@1", "v");
    let unset = range_key_body("c", "@1", "");
    let mut iter = CompactionIter::new(
        upstream(&[("a#9,RANGEKEYUNSET", unset.as_str()), ("a#3,RANGEKEYSET", set.as_str())])?,
        bottommost(&[]),
    );
    drain(&mut iter)?;
    assert_eq!(
        rendered(&iter.range_keys(None)),
        vec!["a-c:[#9,RANGEKEYUNSET(@1:), #3,RANGEKEYSET(@1:v)]"]
    );
    Ok(())
}

#[test]
fn range_keys_and_tombstones_drain_separately() -> Result<()> {
    let body = range_key_body("k", "", "");
    let mut iter = CompactionIter::new(
        upstream(&[("a#7,RANGEDEL", "f"), ("b#9,RANGEKEYDEL", body.as_str())])?,
        options(&[]),
    );
    drain(&mut iter)?;
    assert_eq!(rendered(&iter.range_keys(Some(b"e".as_slice()))), vec!["b-e:[#9,RANGEKEYDEL]"]);
    assert_eq!(rendered(&iter.tombstones(None)), vec!["a-f:[#7,RANGEDEL]"]);
    assert_eq!(rendered(&iter.range_keys(None)), vec!["e-k:[#9,RANGEKEYDEL]"]);
    Ok(())
}
