//! Key encoding seen from the mapping layer

use proptest::prelude::*;

use crate::common::*;
use wideorm::{Boundary, CompositeColumnName, CompositeKeyCodec};

#[test]
fn test_two_component_key_round_trip() {
    let meta = ClusteredEntity::meta();
    let codec = CompositeKeyCodec::new();
    let key = ClusteredKey::new(7, "a");

    let name = codec.build_exact(meta.id_meta(), Some(&key)).unwrap();
    assert!(name
        .components()
        .iter()
        .all(|c| c.boundary() == Boundary::Exact));

    let bytes = codec.encode(&name);
    let decoded = codec.decode(&bytes).unwrap();
    assert_eq!(decoded, name);

    let values = decoded.values(&meta.id_meta().codecs()).unwrap();
    assert_eq!(values, vec![Value::Long(7), Value::from("a")]);
    assert_eq!(ClusteredKey::recompose(values).unwrap(), key);
}

#[test]
fn test_single_key_42() {
    let meta = CompleteBean::meta();
    let name = CompositeKeyCodec::new()
        .build_exact(meta.id_meta(), Some(&42i64))
        .unwrap();
    assert_eq!(name.len(), 1);
    assert_eq!(
        name.values(&meta.id_meta().codecs()).unwrap(),
        vec![Value::Long(42)]
    );
}

#[test]
fn test_short_multi_key_rejected() {
    let meta = ClusteredEntity::meta();
    let err = CompositeKeyCodec::new()
        .build_exact(meta.id_meta(), Some(&vec![Value::Long(7)]))
        .unwrap_err();
    assert!(matches!(err, Error::InvalidKeyComponents { .. }));
}

#[test]
fn test_truncated_encoding_is_malformed() {
    let meta = ClusteredEntity::meta();
    let codec = CompositeKeyCodec::new();
    let bytes = codec
        .build_exact(meta.id_meta(), Some(&ClusteredKey::new(7, "a")))
        .unwrap()
        .encode();

    let err = CompositeColumnName::decode(&bytes[..bytes.len() - 2]).unwrap_err();
    assert!(matches!(err, Error::MalformedCompositeKey(_)));
}

#[test]
fn test_negative_partition_keys_round_trip() {
    let meta = ClusteredEntity::meta();
    let codec = CompositeKeyCodec::new();
    for id in [i64::MIN, -1, 0, i64::MAX] {
        let key = ClusteredKey::new(id, "x");
        let name = codec.build_exact(meta.id_meta(), Some(&key)).unwrap();
        let values = codec
            .decode(&name.encode())
            .unwrap()
            .values(&meta.id_meta().codecs())
            .unwrap();
        assert_eq!(ClusteredKey::recompose(values).unwrap(), key);
    }
}

proptest! {
    #[test]
    fn prop_encoded_keys_sort_like_tuples(
        a in (any::<i64>(), "[a-z]{0,6}"),
        b in (any::<i64>(), "[a-z]{0,6}"),
    ) {
        let meta = ClusteredEntity::meta();
        let codec = CompositeKeyCodec::new();
        let ea = codec
            .build_exact(meta.id_meta(), Some(&ClusteredKey::new(a.0, &a.1)))
            .unwrap()
            .encode();
        let eb = codec
            .build_exact(meta.id_meta(), Some(&ClusteredKey::new(b.0, &b.1)))
            .unwrap()
            .encode();
        prop_assert_eq!(CompositeKeyCodec::compare(&ea, &eb), a.cmp(&b));
    }
}
