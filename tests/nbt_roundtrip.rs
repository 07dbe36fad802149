mod common;

use assert_matches::assert_matches;
use common::*;
use fastnbt::{ByteArray, IntArray, LongArray, Value};
use regionmap::nbt::{self, Tag, TagList, TagType};
use regionmap::MalformedTag;

/// 把参考编码器的值转换成期望的解码结果
fn expected(value: &Value) -> Tag {
    #[allow(unreachable_patterns)]
    match value {
        Value::Byte(v) => Tag::Byte(*v),
        Value::Short(v) => Tag::Short(*v),
        Value::Int(v) => Tag::Int(*v),
        Value::Long(v) => Tag::Long(*v),
        Value::Float(v) => Tag::Float(*v),
        Value::Double(v) => Tag::Double(*v),
        Value::String(s) => Tag::String(s.clone()),
        Value::ByteArray(arr) => Tag::ByteArray(arr.to_vec()),
        Value::IntArray(arr) => Tag::IntArray(arr.to_vec()),
        Value::LongArray(arr) => Tag::LongArray(arr.to_vec()),
        Value::List(items) => {
            Tag::List(TagList::new(items.iter().map(expected).collect()).unwrap())
        }
        Value::Compound(map) => Tag::Compound(
            map.iter()
                .map(|(k, v)| (k.clone(), expected(v)))
                .collect(),
        ),
        other => panic!("unexpected value {other:?}"),
    }
}

fn decode(value: &Value) -> Tag {
    let bytes = fastnbt::to_bytes(value).unwrap();
    nbt::from_bytes(&bytes).unwrap().tag
}

#[test]
fn scalars_and_strings() {
    let value = compound([
        ("byte", Value::Byte(-7)),
        ("short", Value::Short(i16::MIN)),
        ("int", Value::Int(123_456)),
        ("long", Value::Long(i64::MAX)),
        ("float", Value::Float(1.5)),
        ("double", Value::Double(-0.25)),
        ("empty", string("")),
        ("text", string("minecraft:oak_log")),
        ("unicode", string("ünïcödé 方块 😀")),
    ]);
    assert_eq!(decode(&value), expected(&value));
}

#[test]
fn arrays() {
    let value = compound([
        ("bytes", Value::ByteArray(ByteArray::new(vec![1, -1, 0, 127]))),
        ("ints", Value::IntArray(IntArray::new(vec![i32::MIN, 0, i32::MAX]))),
        ("longs", Value::LongArray(LongArray::new(vec![-1, 1 << 60, 42]))),
        ("no_bytes", Value::ByteArray(ByteArray::new(Vec::new()))),
    ]);
    assert_eq!(decode(&value), expected(&value));
}

#[test]
fn nested_lists_and_compounds() {
    let value = compound([
        (
            "sections",
            Value::List(vec![
                modern_section(-4, &["minecraft:air"], None),
                modern_section(0, &["minecraft:air", "minecraft:stone"], Some(vec![0x10; 256])),
            ]),
        ),
        (
            "ints",
            Value::List(vec![Value::Int(1), Value::Int(2), Value::Int(3)]),
        ),
        (
            "matrix",
            Value::List(vec![
                Value::List(vec![string("a"), string("b")]),
                Value::List(vec![string("c")]),
            ]),
        ),
    ]);

    let tag = decode(&value);
    assert_eq!(tag, expected(&value));

    let root = tag.as_compound().unwrap();
    let sections = root["sections"].as_list().unwrap();
    assert_eq!(sections.element_type(), TagType::Compound);
    assert_eq!(sections.len(), 2);
    assert_eq!(root["ints"].as_list().unwrap().element_type(), TagType::Int);
}

#[test]
fn whole_chunk_survives() {
    let value = modern_chunk(
        3465,
        Some((-3, 7)),
        vec![modern_section(
            2,
            &["minecraft:air", "minecraft:dirt", "minecraft:stone"],
            Some(pack_aligned(&[2; 4096], 4)),
        )],
    );
    let named = nbt::from_bytes(&fastnbt::to_bytes(&value).unwrap()).unwrap();
    assert_eq!(named.name, "");
    assert_eq!(named.tag, expected(&value));
    assert!(named.into_compound().is_some());
}

#[test]
fn every_truncation_is_malformed() {
    let value = compound([
        ("name", string("minecraft:stone")),
        ("longs", Value::LongArray(LongArray::new(vec![1, 2, 3]))),
        ("list", Value::List(vec![Value::Short(1), Value::Short(2)])),
    ]);
    let bytes = fastnbt::to_bytes(&value).unwrap();
    for len in 0..bytes.len() {
        assert!(
            nbt::from_bytes(&bytes[..len]).is_err(),
            "prefix of {len} bytes decoded"
        );
    }
    assert!(nbt::from_bytes(&bytes).is_ok());
}

#[test]
fn unknown_tag_inside_compound() {
    // 根 compound，内含一个类型为 99 的子标签
    let bytes = [10, 0, 0, 99, 0, 1, b'x', 0];
    assert_matches!(nbt::from_bytes(&bytes), Err(MalformedTag::UnknownType(99)));
}
