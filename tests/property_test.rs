#![allow(missing_docs)]

use flexcode::{Builder, Flexcode, Value, reader};
use proptest::prelude::*;

fn arb_value() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::Int),
        any::<u64>().prop_map(Value::UInt),
        any::<f64>()
            .prop_filter("NaN never compares equal", |f| !f.is_nan())
            .prop_map(Value::Float),
        "[a-z0-9 ]{0,24}".prop_map(Value::String),
        prop::collection::vec(any::<u8>(), 0..40).prop_map(Value::Blob),
    ];
    leaf.prop_recursive(4, 64, 8, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..8).prop_map(Value::Vector),
            prop::collection::btree_map("[a-zA-Z_]{1,8}", inner, 0..8).prop_map(Value::Map),
        ]
    })
}

proptest! {
    #[test]
    fn value_round_trips(value in arb_value()) {
        let bytes = Flexcode::encode(&value)?;
        prop_assert_eq!(Flexcode::decode(&bytes)?, value);
    }

    #[test]
    fn encoding_is_deterministic(value in arb_value()) {
        prop_assert_eq!(Flexcode::encode(&value)?, Flexcode::encode(&value)?);
    }

    #[test]
    fn map_insertion_order_does_not_matter(
        entries in prop::collection::btree_map("[a-z]{1,6}", any::<i32>(), 1..16)
    ) {
        let forward: Vec<_> = entries.iter().collect();
        let mut a = Builder::new();
        let mut b = Builder::new();
        a.start_map()?;
        b.start_map()?;
        for (key, value) in &forward {
            a.add_key(key)?;
            a.add_int32(**value)?;
        }
        for (key, value) in forward.iter().rev() {
            b.add_key(key)?;
            b.add_int32(**value)?;
        }
        a.end_map()?;
        b.end_map()?;
        let a = a.into_bytes()?;
        let b = b.into_bytes()?;
        prop_assert_eq!(&a, &b);

        let map = reader::root(&a)?.as_map()?;
        for i in 1..map.len() {
            prop_assert!(map.key(i - 1)?.as_bytes() < map.key(i)?.as_bytes());
        }
    }

    #[test]
    fn vector_slots_are_aligned(values in prop::collection::vec(any::<i64>(), 1..64)) {
        let mut builder = Builder::new();
        builder.start_vector()?;
        builder.add_string("misalign")?;
        for v in &values {
            builder.add_int64(*v)?;
        }
        builder.end_vector()?;
        let bytes = builder.into_bytes()?;

        let vector = reader::root(&bytes)?.as_vector()?;
        prop_assert_eq!(vector.byte_width(), 8);
        prop_assert_eq!(vector.start() % 8, 0);
        for (i, v) in values.iter().enumerate() {
            prop_assert_eq!(vector.index(i + 1)?.as_i64()?, *v);
        }
    }

    #[test]
    fn scalars_use_the_narrowest_root_slot(v in any::<u64>()) {
        let bytes = Flexcode::encode(&Value::UInt(v))?;
        let width = usize::from(bytes[bytes.len() - 1]);
        let expected = match v {
            0..=0xFF => 1,
            0x100..=0xFFFF => 2,
            0x1_0000..=0xFFFF_FFFF => 4,
            _ => 8,
        };
        prop_assert_eq!(width, expected);
    }
}
