//! 集成测试共用的区域文件与区块构造工具
#![allow(dead_code)]

use fastnbt::{ByteArray, LongArray, Value};
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::Path;

pub const SECTOR_SIZE: usize = 4096;

/// 区块数据的压缩方式
#[derive(Debug, Clone, Copy)]
pub enum Codec {
    Gzip,
    Zlib,
    Raw,
}

impl Codec {
    pub fn id(self) -> u8 {
        match self {
            Codec::Gzip => 1,
            Codec::Zlib => 2,
            Codec::Raw => 3,
        }
    }

    pub fn compress(self, data: &[u8]) -> Vec<u8> {
        match self {
            Codec::Gzip => {
                let mut encoder =
                    flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
                encoder.write_all(data).unwrap();
                encoder.finish().unwrap()
            }
            Codec::Zlib => {
                let mut encoder =
                    flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
                encoder.write_all(data).unwrap();
                encoder.finish().unwrap()
            }
            Codec::Raw => data.to_vec(),
        }
    }
}

/// 区块在文件中的完整字节：长度、压缩类型、数据
pub fn chunk_body(codec: Codec, value: &Value) -> Vec<u8> {
    nbt_body(codec, &fastnbt::to_bytes(value).unwrap())
}

/// 用任意 NBT 字节构造区块
pub fn nbt_body(codec: Codec, nbt: &[u8]) -> Vec<u8> {
    let compressed = codec.compress(nbt);
    let mut body = Vec::with_capacity(compressed.len() + 5);
    body.extend_from_slice(&((compressed.len() + 1) as u32).to_be_bytes());
    body.push(codec.id());
    body.extend_from_slice(&compressed);
    body
}

/// 按槽位拼装一个区域文件，区块依次放在头部之后
#[derive(Default)]
pub struct RegionBuilder {
    chunks: Vec<(usize, Vec<u8>)>,
}

impl RegionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn chunk(self, x: usize, z: usize, codec: Codec, value: &Value) -> Self {
        self.raw(x, z, chunk_body(codec, value))
    }

    /// 任意字节，用于构造损坏的区块
    pub fn raw(mut self, x: usize, z: usize, body: Vec<u8>) -> Self {
        self.chunks.push((x + z * 32, body));
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut locations = vec![0u8; SECTOR_SIZE];
        let timestamps = vec![0u8; SECTOR_SIZE];
        let mut sectors = Vec::new();
        let mut current_sector = 2u32;

        for (index, body) in &self.chunks {
            let sector_count = body.len().div_ceil(SECTOR_SIZE).max(1);
            let mut data = body.clone();
            data.resize(sector_count * SECTOR_SIZE, 0);

            let offset_bytes = current_sector.to_be_bytes();
            let idx = index * 4;
            locations[idx..idx + 3].copy_from_slice(&offset_bytes[1..]);
            locations[idx + 3] = sector_count as u8;

            sectors.extend_from_slice(&data);
            current_sector += sector_count as u32;
        }

        let mut file = locations;
        file.extend_from_slice(&timestamps);
        file.extend_from_slice(&sectors);
        file
    }

    pub fn write(&self, path: &Path) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, self.build()).unwrap();
    }
}

pub fn compound<const N: usize>(entries: [(&str, Value); N]) -> Value {
    Value::Compound(
        entries
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect::<HashMap<_, _>>(),
    )
}

pub fn string(s: &str) -> Value {
    Value::String(s.to_string())
}

/// 对齐打包，一个索引不跨越两个 long
pub fn pack_aligned(indices: &[u16], bits: u32) -> Vec<i64> {
    let per_word = (64 / bits) as usize;
    let mut words = vec![0u64; indices.len().div_ceil(per_word)];
    for (i, &index) in indices.iter().enumerate() {
        let shift = (i % per_word) as u32 * bits;
        words[i / per_word] |= (index as u64) << shift;
    }
    words.into_iter().map(|w| w as i64).collect()
}

/// 1.18 之后的 section：`block_states.{palette,data}`
pub fn modern_section(y: i8, palette: &[&str], data: Option<Vec<i64>>) -> Value {
    let palette = Value::List(
        palette
            .iter()
            .map(|name| compound([("Name", string(name))]))
            .collect(),
    );
    let mut states = HashMap::from([("palette".to_string(), palette)]);
    if let Some(data) = data {
        states.insert("data".to_string(), Value::LongArray(LongArray::new(data)));
    }
    compound([("Y", Value::Byte(y)), ("block_states", Value::Compound(states))])
}

/// 1.18 之后的区块，位置字段缺失时由槽位推算
pub fn modern_chunk(data_version: i32, pos: Option<(i32, i32)>, sections: Vec<Value>) -> Value {
    let mut root = HashMap::from([
        ("DataVersion".to_string(), Value::Int(data_version)),
        ("sections".to_string(), Value::List(sections)),
    ]);
    if let Some((x, z)) = pos {
        root.insert("xPos".to_string(), Value::Int(x));
        root.insert("zPos".to_string(), Value::Int(z));
    }
    Value::Compound(root)
}

/// 旧版 section：`Blocks` + `Data`
pub fn legacy_section(y: i8, blocks: Vec<i8>, data: Vec<i8>) -> Value {
    compound([
        ("Y", Value::Byte(y)),
        ("Blocks", Value::ByteArray(ByteArray::new(blocks))),
        ("Data", Value::ByteArray(ByteArray::new(data))),
    ])
}

/// 旧版区块，内容包在 `Level` 里
pub fn legacy_chunk(x: i32, z: i32, sections: Vec<Value>) -> Value {
    compound([(
        "Level",
        compound([
            ("xPos", Value::Int(x)),
            ("zPos", Value::Int(z)),
            ("Sections", Value::List(sections)),
        ]),
    )])
}
