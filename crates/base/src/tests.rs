use super::*;
use crate::rangekey::{decode_range_key_value, encode_range_key_value};
use crate::varint::{decode_uvarint, encode_uvarint};
use anyhow::Result;

// -------------------- Ordering --------------------

#[test]
fn user_key_ascending_then_seq_descending() -> Result<()> {
    let mut keys: Vec<InternalKey> = ["b#1,SET", "a#3,SET", "a#9,DEL", "c#2,MERGE"]
        .iter()
        .map(|s| s.parse())
        .collect::<Result<_>>()?;
    keys.sort();
    let rendered: Vec<String> = keys.iter().map(|k| k.to_string()).collect();
    assert_eq!(rendered, ["a#9,DEL", "a#3,SET", "b#1,SET", "c#2,MERGE"]);
    Ok(())
}

#[test]
fn rangedel_sorts_before_point_at_same_seq() -> Result<()> {
    let rangedel: InternalKey = "a#5,RANGEDEL".parse()?;
    let set: InternalKey = "a#5,SET".parse()?;
    assert!(rangedel < set);
    Ok(())
}

#[test]
fn exclusive_sentinel_precedes_every_real_key() -> Result<()> {
    let sentinel = InternalKey::exclusive_sentinel(b"m".to_vec());
    assert!(sentinel.is_exclusive_sentinel());
    let newest: InternalKey = format!("m#{},SET", SEQ_NUM_MAX - 1).parse()?;
    assert!(sentinel < newest);
    let before: InternalKey = "l#1,SET".parse()?;
    assert!(before < sentinel);
    Ok(())
}

// -------------------- Trailer manipulation --------------------

#[test]
fn set_kind_keeps_seq_and_set_seq_keeps_kind() {
    let mut k = InternalKey::new(b"k".to_vec(), 42, InternalKeyKind::Set);
    k.set_kind(InternalKeyKind::SetWithDelete);
    assert_eq!(k.seq_num(), 42);
    assert_eq!(k.kind(), InternalKeyKind::SetWithDelete);

    k.set_seq_num(SEQ_NUM_ZERO);
    assert_eq!(k.kind(), InternalKeyKind::SetWithDelete);
    assert!(k.trailer <= ZERO_SEQNUM_MAX_TRAILER);
}

#[test]
fn unknown_kind_bytes_decode_as_invalid() {
    assert_eq!(InternalKeyKind::from_u8(3), InternalKeyKind::Invalid);
    assert_eq!(InternalKeyKind::from_u8(200), InternalKeyKind::Invalid);
    let k = InternalKey {
        user_key: b"x".to_vec(),
        trailer: (7 << 8) | 99,
    };
    assert_eq!(k.kind(), InternalKeyKind::Invalid);
    assert_eq!(k.kind_byte(), 99);
    assert_eq!(k.to_string(), "x#7,INVALID(99)");
}

#[test]
fn parse_rejects_malformed_keys() {
    assert!("nohash".parse::<InternalKey>().is_err());
    assert!("a#1".parse::<InternalKey>().is_err());
    assert!("a#x,SET".parse::<InternalKey>().is_err());
    assert!("a#1,BOGUS".parse::<InternalKey>().is_err());
}

#[test]
fn copy_from_reuses_buffer() {
    let mut dst = InternalKey::new(b"a-long-key".to_vec(), 1, InternalKeyKind::Set);
    let cap = dst.user_key.capacity();
    let src = InternalKey::new(b"b".to_vec(), 2, InternalKeyKind::Merge);
    dst.copy_from(src.as_ref());
    assert_eq!(dst, src);
    assert_eq!(dst.user_key.capacity(), cap);
}

// -------------------- Varint --------------------

#[test]
fn uvarint_boundaries() {
    for value in [0u64, 1, 127, 128, 300, 16_384, u64::from(u32::MAX), u64::MAX] {
        let mut buf = Vec::new();
        encode_uvarint(&mut buf, value);
        assert_eq!(decode_uvarint(&buf), Some((value, buf.len())));
    }
}

#[test]
fn uvarint_truncated_or_overlong() {
    assert_eq!(decode_uvarint(&[]), None);
    assert_eq!(decode_uvarint(&[0x80]), None);
    assert_eq!(decode_uvarint(&[0xff; 11]), None);
}

// -------------------- Range key values --------------------

#[test]
fn range_key_value_layout() -> Result<()> {
    let raw = encode_range_key_value(b"zz", b"@5", b"payload");
    let decoded = decode_range_key_value(&raw)?;
    assert_eq!(decoded.end, b"zz");
    assert_eq!(decoded.suffix, b"@5");
    assert_eq!(decoded.value, b"payload");
    Ok(())
}

#[test]
fn range_key_value_rejects_truncation() {
    let raw = encode_range_key_value(b"end", b"", b"");
    assert!(decode_range_key_value(&raw[..5]).is_err());
    assert!(decode_range_key_value(&[1, 0]).is_err());
}

// -------------------- Merge operators --------------------

#[test]
fn concat_merger_folds_older_operands_in_front() -> Result<()> {
    let mut m = ConcatMerger.merge(b"k", b"c")?;
    m.merge_older(b"b")?;
    m.merge_older(b"a")?;
    let merged = m.finish(true)?;
    assert_eq!(merged.value, b"abc");
    assert!(!merged.delete);
    assert!(merged.closer.is_none());
    Ok(())
}

// -------------------- Lazy values --------------------

struct Failing;

impl ValueFetcher for Failing {
    fn fetch(&self, _buf: &mut Vec<u8>) -> Result<()> {
        anyhow::bail!("blob file missing")
    }
}

#[test]
fn lazy_value_fetch() {
    let mut buf = b"stale".to_vec();
    LazyValue::Inline(b"fresh").fetch_into(&mut buf).unwrap();
    assert_eq!(buf, b"fresh");

    let err = LazyValue::Deferred(&Failing).fetch_into(&mut buf).unwrap_err();
    assert!(err.to_string().contains("blob file missing"));
}

#[test]
fn bytewise_comparer() {
    let cmp = Comparer::default();
    assert!(cmp.equal(b"a", b"a"));
    assert_eq!(cmp.cmp(b"a", b"b"), std::cmp::Ordering::Less);
    assert_eq!(cmp.format(b"key"), "key");
}
