//! NBT 标签树解析
//!
//! 自描述的二进制格式：每个节点先写类型 ID，Compound 成员带名字，
//! List 元素不带名字。所有多字节数值均为大端序。

use crate::error::MalformedTag;
use byteorder::{BigEndian, ReadBytesExt};
use indexmap::IndexMap;
use std::io;

/// 最大嵌套深度
///
/// 解析是递归的，这个深度在 2 MiB 的线程栈上（rayon 工作线程与测试线程）
/// 也能安全返回 `TooDeep`。正常区块的嵌套远低于这个值。
pub const MAX_DEPTH: usize = 128;

/// 标签类型 ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagType {
    End,
    Byte,
    Short,
    Int,
    Long,
    Float,
    Double,
    ByteArray,
    String,
    List,
    Compound,
    IntArray,
    LongArray,
}

impl TagType {
    pub fn from_id(id: u8) -> Result<Self, MalformedTag> {
        Ok(match id {
            0 => TagType::End,
            1 => TagType::Byte,
            2 => TagType::Short,
            3 => TagType::Int,
            4 => TagType::Long,
            5 => TagType::Float,
            6 => TagType::Double,
            7 => TagType::ByteArray,
            8 => TagType::String,
            9 => TagType::List,
            10 => TagType::Compound,
            11 => TagType::IntArray,
            12 => TagType::LongArray,
            other => return Err(MalformedTag::UnknownType(other)),
        })
    }

    /// 单个负载至少占用的字节数
    fn min_payload_size(self) -> usize {
        match self {
            TagType::End => 0,
            TagType::Byte | TagType::Compound => 1,
            TagType::Short | TagType::String => 2,
            TagType::Int | TagType::Float => 4,
            TagType::ByteArray | TagType::IntArray | TagType::LongArray => 4,
            TagType::List => 5,
            TagType::Long | TagType::Double => 8,
        }
    }
}

/// Compound 的成员，保留读入顺序
pub type Compound = IndexMap<String, Tag>;

/// 同构列表，所有元素都是 `element_type`
#[derive(Debug, Clone, PartialEq)]
pub struct TagList {
    element_type: TagType,
    items: Vec<Tag>,
}

impl TagList {
    /// 元素类型取第一个元素的类型，类型不一致时返回 `None`
    pub fn new(items: Vec<Tag>) -> Option<Self> {
        let element_type = items.first().map_or(TagType::End, Tag::tag_type);
        if items.iter().any(|item| item.tag_type() != element_type) {
            return None;
        }
        Some(Self {
            element_type,
            items,
        })
    }

    pub fn element_type(&self) -> TagType {
        self.element_type
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Tag> {
        self.items.iter()
    }

    pub fn as_slice(&self) -> &[Tag] {
        &self.items
    }
}

impl<'a> IntoIterator for &'a TagList {
    type Item = &'a Tag;
    type IntoIter = std::slice::Iter<'a, Tag>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

/// NBT 标签
#[derive(Debug, Clone, PartialEq)]
pub enum Tag {
    End,
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    ByteArray(Vec<i8>),
    String(String),
    List(TagList),
    Compound(Compound),
    IntArray(Vec<i32>),
    LongArray(Vec<i64>),
}

impl Tag {
    pub fn tag_type(&self) -> TagType {
        match self {
            Tag::End => TagType::End,
            Tag::Byte(_) => TagType::Byte,
            Tag::Short(_) => TagType::Short,
            Tag::Int(_) => TagType::Int,
            Tag::Long(_) => TagType::Long,
            Tag::Float(_) => TagType::Float,
            Tag::Double(_) => TagType::Double,
            Tag::ByteArray(_) => TagType::ByteArray,
            Tag::String(_) => TagType::String,
            Tag::List(_) => TagType::List,
            Tag::Compound(_) => TagType::Compound,
            Tag::IntArray(_) => TagType::IntArray,
            Tag::LongArray(_) => TagType::LongArray,
        }
    }

    pub fn as_compound(&self) -> Option<&Compound> {
        match self {
            Tag::Compound(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&TagList> {
        match self {
            Tag::List(list) => Some(list),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Tag::String(s) => Some(s),
            _ => None,
        }
    }

    /// 任意数值标签转为 i32（浮点截断，长整型按位截断）
    pub fn as_i32(&self) -> Option<i32> {
        match *self {
            Tag::Byte(v) => Some(v.into()),
            Tag::Short(v) => Some(v.into()),
            Tag::Int(v) => Some(v),
            Tag::Long(v) => Some(v as i32),
            Tag::Float(v) => Some(v as i32),
            Tag::Double(v) => Some(v as i32),
            _ => None,
        }
    }

    pub fn as_byte_array(&self) -> Option<&[i8]> {
        match self {
            Tag::ByteArray(arr) => Some(arr),
            _ => None,
        }
    }

    pub fn as_long_array(&self) -> Option<&[i64]> {
        match self {
            Tag::LongArray(arr) => Some(arr),
            _ => None,
        }
    }
}

/// Compound 上的按类型取值
pub trait CompoundExt {
    fn get_compound(&self, key: &str) -> Option<&Compound>;
    fn get_list(&self, key: &str) -> Option<&TagList>;
    fn get_str(&self, key: &str) -> Option<&str>;
    fn get_i32(&self, key: &str) -> Option<i32>;
    fn get_byte_array(&self, key: &str) -> Option<&[i8]>;
    fn get_long_array(&self, key: &str) -> Option<&[i64]>;
}

impl CompoundExt for Compound {
    fn get_compound(&self, key: &str) -> Option<&Compound> {
        self.get(key).and_then(Tag::as_compound)
    }

    fn get_list(&self, key: &str) -> Option<&TagList> {
        self.get(key).and_then(Tag::as_list)
    }

    fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Tag::as_str)
    }

    fn get_i32(&self, key: &str) -> Option<i32> {
        self.get(key).and_then(Tag::as_i32)
    }

    fn get_byte_array(&self, key: &str) -> Option<&[i8]> {
        self.get(key).and_then(Tag::as_byte_array)
    }

    fn get_long_array(&self, key: &str) -> Option<&[i64]> {
        self.get(key).and_then(Tag::as_long_array)
    }
}

/// 带名字的根标签
#[derive(Debug, Clone, PartialEq)]
pub struct NamedTag {
    pub name: String,
    pub tag: Tag,
}

impl NamedTag {
    pub fn into_compound(self) -> Option<Compound> {
        match self.tag {
            Tag::Compound(map) => Some(map),
            _ => None,
        }
    }
}

/// 从字节中解析一个带名字的根标签
///
/// 根标签之后的多余字节会被忽略。
pub fn from_bytes(data: &[u8]) -> Result<NamedTag, MalformedTag> {
    let mut decoder = Decoder {
        input: data,
        depth: 0,
    };
    decoder.read_named()
}

struct Decoder<'a> {
    input: &'a [u8],
    depth: usize,
}

fn eof(kind: &'static str) -> impl FnOnce(io::Error) -> MalformedTag {
    move |_| MalformedTag::Truncated(kind)
}

impl<'a> Decoder<'a> {
    fn read_named(&mut self) -> Result<NamedTag, MalformedTag> {
        let tag_type = self.read_type()?;
        if tag_type == TagType::End {
            return Ok(NamedTag {
                name: String::new(),
                tag: Tag::End,
            });
        }
        let name = self.read_string()?;
        let tag = self.read_payload(tag_type)?;
        Ok(NamedTag { name, tag })
    }

    fn read_type(&mut self) -> Result<TagType, MalformedTag> {
        let id = self.input.read_u8().map_err(eof("标签类型"))?;
        TagType::from_id(id)
    }

    fn take(&mut self, len: usize, kind: &'static str) -> Result<&'a [u8], MalformedTag> {
        if len > self.input.len() {
            return Err(MalformedTag::LengthOutOfBounds {
                kind,
                length: len,
                remaining: self.input.len(),
            });
        }
        let (head, tail) = self.input.split_at(len);
        self.input = tail;
        Ok(head)
    }

    fn read_string(&mut self) -> Result<String, MalformedTag> {
        let len = self.input.read_u16::<BigEndian>().map_err(eof("字符串长度"))?;
        let bytes = self.take(len.into(), "字符串")?;
        Ok(decode_string(bytes))
    }

    /// 读取 i32 长度前缀，并确认剩余字节足够容纳 `length * elem_size`
    fn read_length(&mut self, kind: &'static str, elem_size: usize) -> Result<usize, MalformedTag> {
        let length = self.input.read_i32::<BigEndian>().map_err(eof(kind))?;
        if length < 0 {
            return Err(MalformedTag::NegativeLength { kind, length });
        }
        let length = length as usize;
        if length.saturating_mul(elem_size) > self.input.len() {
            return Err(MalformedTag::LengthOutOfBounds {
                kind,
                length,
                remaining: self.input.len(),
            });
        }
        Ok(length)
    }

    fn enter(&mut self) -> Result<(), MalformedTag> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(MalformedTag::TooDeep(MAX_DEPTH));
        }
        Ok(())
    }

    fn read_payload(&mut self, tag_type: TagType) -> Result<Tag, MalformedTag> {
        if let Some(tag) = self.read_scalar(tag_type)? {
            return Ok(tag);
        }
        match tag_type {
            TagType::List => {
                self.enter()?;
                let list = self.read_list()?;
                self.depth -= 1;
                Ok(Tag::List(list))
            }
            _ => {
                self.enter()?;
                let map = self.read_compound()?;
                self.depth -= 1;
                Ok(Tag::Compound(map))
            }
        }
    }

    /// 非容器类型的负载，List 与 Compound 返回 `None`
    ///
    /// 单独成帧，递归路径上的栈帧只剩容器相关的局部变量。
    #[inline(never)]
    fn read_scalar(&mut self, tag_type: TagType) -> Result<Option<Tag>, MalformedTag> {
        let tag = match tag_type {
            TagType::End => Tag::End,
            TagType::Byte => Tag::Byte(self.input.read_i8().map_err(eof("Byte"))?),
            TagType::Short => Tag::Short(self.input.read_i16::<BigEndian>().map_err(eof("Short"))?),
            TagType::Int => Tag::Int(self.input.read_i32::<BigEndian>().map_err(eof("Int"))?),
            TagType::Long => Tag::Long(self.input.read_i64::<BigEndian>().map_err(eof("Long"))?),
            TagType::Float => Tag::Float(self.input.read_f32::<BigEndian>().map_err(eof("Float"))?),
            TagType::Double => {
                Tag::Double(self.input.read_f64::<BigEndian>().map_err(eof("Double"))?)
            }
            TagType::ByteArray => {
                let len = self.read_length("ByteArray", 1)?;
                let bytes = self.take(len, "ByteArray")?;
                Tag::ByteArray(bytes.iter().map(|&b| b as i8).collect())
            }
            TagType::String => Tag::String(self.read_string()?),
            TagType::IntArray => {
                let len = self.read_length("IntArray", 4)?;
                let mut values = vec![0i32; len];
                self.input
                    .read_i32_into::<BigEndian>(&mut values)
                    .map_err(eof("IntArray"))?;
                Tag::IntArray(values)
            }
            TagType::LongArray => {
                let len = self.read_length("LongArray", 8)?;
                let mut values = vec![0i64; len];
                self.input
                    .read_i64_into::<BigEndian>(&mut values)
                    .map_err(eof("LongArray"))?;
                Tag::LongArray(values)
            }
            TagType::List | TagType::Compound => return Ok(None),
        };
        Ok(Some(tag))
    }

    #[inline(never)]
    fn read_list(&mut self) -> Result<TagList, MalformedTag> {
        let element_type = self.read_type()?;
        let len = self.read_length("List", element_type.min_payload_size())?;
        if element_type == TagType::End && len > 0 {
            return Err(MalformedTag::NonEmptyEndList(len as i32));
        }
        let mut items = Vec::with_capacity(len);
        for _ in 0..len {
            items.push(self.read_payload(element_type)?);
        }
        Ok(TagList {
            element_type,
            items,
        })
    }

    #[inline(never)]
    fn read_compound(&mut self) -> Result<Compound, MalformedTag> {
        let mut map = Compound::new();
        loop {
            let tag_type = self.read_type()?;
            if tag_type == TagType::End {
                break;
            }
            let name = self.read_string()?;
            let value = self.read_payload(tag_type)?;
            map.insert(name, value);
        }
        Ok(map)
    }
}

/// 字符串按 Java 的 modified UTF-8 解码，失败时退回宽松的 UTF-8
fn decode_string(bytes: &[u8]) -> String {
    match cesu8::from_java_cesu8(bytes) {
        Ok(s) => s.into_owned(),
        Err(_) => String::from_utf8_lossy(bytes).into_owned(),
    }
}
