//! Binary tags and the binary tag stream.
//!
//! Wire layout (big-endian):
//!
//! ```text
//! root     := [1B kind] [u16 name_len + name]? payload      # name only before 1.20.2
//! byte     := i8            short  := i16        int   := i32
//! long     := i64           float  := f32        double := f64
//! bytes    := [i32 len] [len * i8]
//! string   := [u16 len] [len * modified utf-8]   # surrogate pairs, NUL as C0 80
//! list     := [1B element kind] [i32 len] [len * payload]
//! compound := ([1B kind] [string key] payload)* [0x00]
//! ints     := [i32 len] [len * i32]
//! longs    := [i32 len] [len * i64]
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::io::{Read, Write};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use serde::Deserialize;

use crate::error::{CodecError, Result};
use crate::version::ProtocolVersion;
use crate::wire::ReadWireExt;

/// Kind byte carried by every tag on the wire.
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TagKind {
    End = 0,
    Byte = 1,
    Short = 2,
    Int = 3,
    Long = 4,
    Float = 5,
    Double = 6,
    ByteArray = 7,
    String = 8,
    List = 9,
    Compound = 10,
    IntArray = 11,
    LongArray = 12,
}

impl TagKind {
    pub fn from_u8(val: u8) -> Option<Self> {
        match val {
            0 => Some(TagKind::End),
            1 => Some(TagKind::Byte),
            2 => Some(TagKind::Short),
            3 => Some(TagKind::Int),
            4 => Some(TagKind::Long),
            5 => Some(TagKind::Float),
            6 => Some(TagKind::Double),
            7 => Some(TagKind::ByteArray),
            8 => Some(TagKind::String),
            9 => Some(TagKind::List),
            10 => Some(TagKind::Compound),
            11 => Some(TagKind::IntArray),
            12 => Some(TagKind::LongArray),
            _ => None,
        }
    }

    pub fn id(self) -> u8 {
        self as u8
    }
}

/// A strongly typed tag. Every value knows its [`TagKind`].
#[derive(Clone, Debug, PartialEq)]
pub enum BinaryTag {
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
    Compound(BTreeMap<String, BinaryTag>),
    IntArray(Vec<i32>),
    LongArray(Vec<i64>),
}

impl BinaryTag {
    pub fn kind(&self) -> TagKind {
        match self {
            BinaryTag::End => TagKind::End,
            BinaryTag::Byte(_) => TagKind::Byte,
            BinaryTag::Short(_) => TagKind::Short,
            BinaryTag::Int(_) => TagKind::Int,
            BinaryTag::Long(_) => TagKind::Long,
            BinaryTag::Float(_) => TagKind::Float,
            BinaryTag::Double(_) => TagKind::Double,
            BinaryTag::ByteArray(_) => TagKind::ByteArray,
            BinaryTag::String(_) => TagKind::String,
            BinaryTag::List(_) => TagKind::List,
            BinaryTag::Compound(_) => TagKind::Compound,
            BinaryTag::IntArray(_) => TagKind::IntArray,
            BinaryTag::LongArray(_) => TagKind::LongArray,
        }
    }

    /// Compound holding a single entry.
    pub fn single_entry(key: impl Into<String>, value: BinaryTag) -> BinaryTag {
        let mut map = BTreeMap::new();
        map.insert(key.into(), value);
        BinaryTag::Compound(map)
    }
}

/// A list of tags that all share one element kind.
#[derive(Clone, Debug, PartialEq)]
pub struct TagList {
    element_kind: TagKind,
    items: Vec<BinaryTag>,
}

impl TagList {
    /// The empty list, whose element kind is [`TagKind::End`].
    pub fn empty() -> Self {
        TagList {
            element_kind: TagKind::End,
            items: Vec::new(),
        }
    }

    /// Builds a list, inferring the element kind from the first item.
    pub fn new(items: Vec<BinaryTag>) -> Result<Self> {
        match items.first() {
            None => Ok(TagList::empty()),
            Some(first) => TagList::with_kind(first.kind(), items),
        }
    }

    /// Builds a list of `element_kind`, rejecting any item of another kind.
    pub fn with_kind(element_kind: TagKind, items: Vec<BinaryTag>) -> Result<Self> {
        if element_kind == TagKind::End && !items.is_empty() {
            return Err(CodecError::malformed("non-empty list of end tags"));
        }
        if let Some(stray) = items.iter().find(|item| item.kind() != element_kind) {
            return Err(CodecError::malformed(format!(
                "{:?} tag in list of {:?}",
                stray.kind(),
                element_kind
            )));
        }
        Ok(TagList {
            element_kind,
            items,
        })
    }

    pub fn element_kind(&self) -> TagKind {
        self.element_kind
    }

    pub fn items(&self) -> &[BinaryTag] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, BinaryTag> {
        self.items.iter()
    }
}

/// Bounds applied while reading a tag stream from an untrusted peer.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TagLimits {
    /// Deepest list/compound nesting accepted.
    pub max_depth: usize,
    /// Upper bound on the bytes one root tag may declare.
    pub max_bytes: usize,
}

impl Default for TagLimits {
    fn default() -> Self {
        TagLimits {
            max_depth: 512,
            max_bytes: 2 * 1024 * 1024,
        }
    }
}

/// Reads one root tag in the framing used by `version`.
pub fn read_root<R: Read + ?Sized>(
    reader: &mut R,
    version: ProtocolVersion,
    limits: TagLimits,
) -> Result<BinaryTag> {
    let mut tags = TagReader {
        inner: reader,
        limits,
        consumed: 0,
    };
    let kind = tags.read_kind()?;
    if kind == TagKind::End {
        return Ok(BinaryTag::End);
    }
    if version.less_than(ProtocolVersion::V1_20_2) {
        // Root name, always ignored.
        tags.read_tag_string()?;
    }
    tags.read_payload(kind, 0)
}

/// Writes one root tag in the framing used by `version`.
pub fn write_root<W: Write + ?Sized>(
    writer: &mut W,
    version: ProtocolVersion,
    tag: &BinaryTag,
) -> Result<()> {
    writer.write_u8(tag.kind().id())?;
    if tag.kind() == TagKind::End {
        return Ok(());
    }
    if version.less_than(ProtocolVersion::V1_20_2) {
        writer.write_u16::<BigEndian>(0)?;
    }
    write_payload(writer, tag)
}

struct TagReader<'a, R: Read + ?Sized> {
    inner: &'a mut R,
    limits: TagLimits,
    consumed: usize,
}

fn eof(err: std::io::Error) -> CodecError {
    CodecError::from_read(err, "binary tag")
}

impl<R: Read + ?Sized> TagReader<'_, R> {
    fn account(&mut self, bytes: usize) -> Result<()> {
        self.consumed = self.consumed.saturating_add(bytes);
        if self.consumed > self.limits.max_bytes {
            return Err(CodecError::malformed(format!(
                "binary tag exceeds {} bytes",
                self.limits.max_bytes
            )));
        }
        Ok(())
    }

    fn read_kind(&mut self) -> Result<TagKind> {
        self.account(1)?;
        let id = self.inner.read_u8().map_err(eof)?;
        TagKind::from_u8(id).ok_or_else(|| CodecError::malformed(format!("unknown tag kind {}", id)))
    }

    fn read_len(&mut self) -> Result<usize> {
        self.account(4)?;
        let len = self.inner.read_i32::<BigEndian>().map_err(eof)?;
        usize::try_from(len).map_err(|_| CodecError::malformed(format!("negative tag length {}", len)))
    }

    fn read_tag_string(&mut self) -> Result<String> {
        self.account(2)?;
        let len = self.inner.read_u16::<BigEndian>().map_err(eof)? as usize;
        self.account(len)?;
        let bytes = self.inner.read_raw(len, "binary tag")?;
        cesu8::from_java_cesu8(&bytes)
            .map(|text| text.into_owned())
            .map_err(|e| CodecError::malformed(format!("invalid modified utf-8 in tag: {}", e)))
    }

    fn read_payload(&mut self, kind: TagKind, depth: usize) -> Result<BinaryTag> {
        if depth > self.limits.max_depth {
            return Err(CodecError::malformed(format!(
                "binary tag nested deeper than {}",
                self.limits.max_depth
            )));
        }
        let tag = match kind {
            TagKind::End => return Err(CodecError::malformed("unexpected end tag")),
            TagKind::Byte => {
                self.account(1)?;
                BinaryTag::Byte(self.inner.read_i8().map_err(eof)?)
            }
            TagKind::Short => {
                self.account(2)?;
                BinaryTag::Short(self.inner.read_i16::<BigEndian>().map_err(eof)?)
            }
            TagKind::Int => {
                self.account(4)?;
                BinaryTag::Int(self.inner.read_i32::<BigEndian>().map_err(eof)?)
            }
            TagKind::Long => {
                self.account(8)?;
                BinaryTag::Long(self.inner.read_i64::<BigEndian>().map_err(eof)?)
            }
            TagKind::Float => {
                self.account(4)?;
                BinaryTag::Float(self.inner.read_f32::<BigEndian>().map_err(eof)?)
            }
            TagKind::Double => {
                self.account(8)?;
                BinaryTag::Double(self.inner.read_f64::<BigEndian>().map_err(eof)?)
            }
            TagKind::ByteArray => {
                let len = self.read_len()?;
                self.account(len)?;
                let bytes = self.inner.read_raw(len, "binary tag")?;
                BinaryTag::ByteArray(bytes.into_iter().map(|b| b as i8).collect())
            }
            TagKind::String => BinaryTag::String(self.read_tag_string()?),
            TagKind::List => {
                self.account(1)?;
                let id = self.inner.read_u8().map_err(eof)?;
                let element_kind = TagKind::from_u8(id)
                    .ok_or_else(|| CodecError::malformed(format!("unknown list element kind {}", id)))?;
                let len = self.read_len()?;
                if element_kind == TagKind::End && len > 0 {
                    return Err(CodecError::malformed("non-empty list of end tags"));
                }
                let mut items = Vec::new();
                for _ in 0..len {
                    items.push(self.read_payload(element_kind, depth + 1)?);
                }
                BinaryTag::List(TagList {
                    element_kind,
                    items,
                })
            }
            TagKind::Compound => {
                let mut entries = BTreeMap::new();
                loop {
                    let kind = self.read_kind()?;
                    if kind == TagKind::End {
                        break;
                    }
                    let key = self.read_tag_string()?;
                    let value = self.read_payload(kind, depth + 1)?;
                    entries.insert(key, value);
                }
                BinaryTag::Compound(entries)
            }
            TagKind::IntArray => {
                let len = self.read_len()?;
                self.account(len.saturating_mul(4))?;
                let mut values = Vec::with_capacity(len);
                for _ in 0..len {
                    values.push(self.inner.read_i32::<BigEndian>().map_err(eof)?);
                }
                BinaryTag::IntArray(values)
            }
            TagKind::LongArray => {
                let len = self.read_len()?;
                self.account(len.saturating_mul(8))?;
                let mut values = Vec::with_capacity(len);
                for _ in 0..len {
                    values.push(self.inner.read_i64::<BigEndian>().map_err(eof)?);
                }
                BinaryTag::LongArray(values)
            }
        };
        Ok(tag)
    }
}

fn write_len<W: Write + ?Sized>(writer: &mut W, len: usize) -> Result<()> {
    let len = i32::try_from(len).map_err(|_| CodecError::malformed(format!("tag length {} too large", len)))?;
    writer.write_i32::<BigEndian>(len)?;
    Ok(())
}

fn write_tag_string<W: Write + ?Sized>(writer: &mut W, text: &str) -> Result<()> {
    let encoded = cesu8::to_java_cesu8(text);
    let len = u16::try_from(encoded.len())
        .map_err(|_| CodecError::malformed(format!("tag string of {} bytes too long", encoded.len())))?;
    writer.write_u16::<BigEndian>(len)?;
    writer.write_all(&encoded)?;
    Ok(())
}

fn write_payload<W: Write + ?Sized>(writer: &mut W, tag: &BinaryTag) -> Result<()> {
    match tag {
        BinaryTag::End => {}
        BinaryTag::Byte(v) => writer.write_i8(*v)?,
        BinaryTag::Short(v) => writer.write_i16::<BigEndian>(*v)?,
        BinaryTag::Int(v) => writer.write_i32::<BigEndian>(*v)?,
        BinaryTag::Long(v) => writer.write_i64::<BigEndian>(*v)?,
        BinaryTag::Float(v) => writer.write_f32::<BigEndian>(*v)?,
        BinaryTag::Double(v) => writer.write_f64::<BigEndian>(*v)?,
        BinaryTag::ByteArray(values) => {
            write_len(writer, values.len())?;
            for v in values {
                writer.write_i8(*v)?;
            }
        }
        BinaryTag::String(text) => write_tag_string(writer, text)?,
        BinaryTag::List(list) => {
            writer.write_u8(list.element_kind.id())?;
            write_len(writer, list.items.len())?;
            for item in &list.items {
                write_payload(writer, item)?;
            }
        }
        BinaryTag::Compound(entries) => {
            for (key, value) in entries {
                // An end entry would terminate the compound early.
                if value.kind() == TagKind::End {
                    continue;
                }
                writer.write_u8(value.kind().id())?;
                write_tag_string(writer, key)?;
                write_payload(writer, value)?;
            }
            writer.write_u8(TagKind::End.id())?;
        }
        BinaryTag::IntArray(values) => {
            write_len(writer, values.len())?;
            for v in values {
                writer.write_i32::<BigEndian>(*v)?;
            }
        }
        BinaryTag::LongArray(values) => {
            write_len(writer, values.len())?;
            for v in values {
                writer.write_i64::<BigEndian>(*v)?;
            }
        }
    }
    Ok(())
}

fn write_joined<T>(
    f: &mut fmt::Formatter<'_>,
    items: impl IntoIterator<Item = T>,
    mut each: impl FnMut(&mut fmt::Formatter<'_>, T) -> fmt::Result,
) -> fmt::Result {
    for (i, item) in items.into_iter().enumerate() {
        if i > 0 {
            f.write_str(",")?;
        }
        each(f, item)?;
    }
    Ok(())
}

/// Compact textual rendering, used in diagnostics.
impl fmt::Display for BinaryTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BinaryTag::End => f.write_str("END"),
            BinaryTag::Byte(v) => write!(f, "{}b", v),
            BinaryTag::Short(v) => write!(f, "{}s", v),
            BinaryTag::Int(v) => write!(f, "{}", v),
            BinaryTag::Long(v) => write!(f, "{}L", v),
            BinaryTag::Float(v) => write!(f, "{}f", v),
            BinaryTag::Double(v) => write!(f, "{}d", v),
            BinaryTag::ByteArray(values) => {
                f.write_str("[B;")?;
                write_joined(f, values, |f, v| write!(f, "{}b", v))?;
                f.write_str("]")
            }
            BinaryTag::String(text) => write!(f, "{:?}", text),
            BinaryTag::List(list) => {
                f.write_str("[")?;
                write_joined(f, list.iter(), |f, v| write!(f, "{}", v))?;
                f.write_str("]")
            }
            BinaryTag::Compound(entries) => {
                f.write_str("{")?;
                write_joined(f, entries, |f, (k, v)| write!(f, "{:?}:{}", k, v))?;
                f.write_str("}")
            }
            BinaryTag::IntArray(values) => {
                f.write_str("[I;")?;
                write_joined(f, values, |f, v| write!(f, "{}", v))?;
                f.write_str("]")
            }
            BinaryTag::LongArray(values) => {
                f.write_str("[L;")?;
                write_joined(f, values, |f, v| write!(f, "{}L", v))?;
                f.write_str("]")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn sample() -> BinaryTag {
        let mut map = BTreeMap::new();
        map.insert("text".to_string(), BinaryTag::String("hi".into()));
        map.insert("bold".to_string(), BinaryTag::Byte(1));
        map.insert(
            "extra".to_string(),
            BinaryTag::List(TagList::new(vec![BinaryTag::Short(-2), BinaryTag::Short(7)]).unwrap()),
        );
        map.insert("ids".to_string(), BinaryTag::IntArray(vec![1, -1]));
        map.insert("seeds".to_string(), BinaryTag::LongArray(vec![i64::MIN]));
        map.insert("raw".to_string(), BinaryTag::ByteArray(vec![-128, 127]));
        map.insert("f".to_string(), BinaryTag::Float(1.5));
        map.insert("d".to_string(), BinaryTag::Double(-0.25));
        map.insert("n".to_string(), BinaryTag::Long(1 << 40));
        map.insert("empty".to_string(), BinaryTag::List(TagList::empty()));
        BinaryTag::Compound(map)
    }

    #[test]
    fn test_stream_roundtrip_nameless_and_named() {
        for version in [ProtocolVersion::V1_20_3, ProtocolVersion::V1_13] {
            let mut buf = Vec::new();
            write_root(&mut buf, version, &sample()).unwrap();
            let decoded = read_root(&mut Cursor::new(&buf), version, TagLimits::default()).unwrap();
            assert_eq!(decoded, sample());
        }
    }

    #[test]
    fn test_root_name_only_before_1_20_2() {
        let tag = BinaryTag::String("a".into());
        let mut nameless = Vec::new();
        write_root(&mut nameless, ProtocolVersion::V1_20_2, &tag).unwrap();
        assert_eq!(nameless, vec![8, 0, 1, b'a']);

        let mut named = Vec::new();
        write_root(&mut named, ProtocolVersion::V1_20_2.protocol().saturating_sub(1).into(), &tag).unwrap();
        assert_eq!(named, vec![8, 0, 0, 0, 1, b'a']);
    }

    #[test]
    fn test_compound_layout() {
        let tag = BinaryTag::single_entry("k", BinaryTag::Int(258));
        let mut buf = Vec::new();
        write_root(&mut buf, ProtocolVersion::V1_20_3, &tag).unwrap();
        assert_eq!(buf, vec![10, 3, 0, 1, b'k', 0, 0, 1, 2, 0]);
    }

    #[test]
    fn test_end_root() {
        let mut buf = Vec::new();
        write_root(&mut buf, ProtocolVersion::V1_12_2, &BinaryTag::End).unwrap();
        assert_eq!(buf, vec![0]);
        let decoded = read_root(&mut Cursor::new(&buf), ProtocolVersion::V1_12_2, TagLimits::default()).unwrap();
        assert_eq!(decoded, BinaryTag::End);
    }

    #[test]
    fn test_unknown_kind_is_malformed() {
        let err = read_root(&mut Cursor::new(&[13u8][..]), ProtocolVersion::V1_20_3, TagLimits::default())
            .unwrap_err();
        assert!(matches!(err, CodecError::MalformedWireValue(_)));
    }

    #[test]
    fn test_truncated_stream() {
        let mut buf = Vec::new();
        write_root(&mut buf, ProtocolVersion::V1_20_3, &sample()).unwrap();
        buf.truncate(buf.len() - 3);
        let err = read_root(&mut Cursor::new(&buf), ProtocolVersion::V1_20_3, TagLimits::default()).unwrap_err();
        assert!(matches!(err, CodecError::TruncatedBuffer { .. }));
    }

    #[test]
    fn test_negative_length_is_malformed() {
        let data = [7u8, 0xFF, 0xFF, 0xFF, 0xFF];
        let err = read_root(&mut Cursor::new(&data[..]), ProtocolVersion::V1_20_3, TagLimits::default())
            .unwrap_err();
        assert!(matches!(err, CodecError::MalformedWireValue(_)));
    }

    #[test]
    fn test_non_empty_end_list_is_malformed() {
        let data = [9u8, 0, 0, 0, 0, 1];
        let err = read_root(&mut Cursor::new(&data[..]), ProtocolVersion::V1_20_3, TagLimits::default())
            .unwrap_err();
        assert!(matches!(err, CodecError::MalformedWireValue(_)));
    }

    #[test]
    fn test_depth_limit() {
        let mut tag = BinaryTag::Int(0);
        for _ in 0..5 {
            tag = BinaryTag::single_entry("x", tag);
        }
        let mut buf = Vec::new();
        write_root(&mut buf, ProtocolVersion::V1_20_3, &tag).unwrap();

        let shallow = TagLimits { max_depth: 3, ..TagLimits::default() };
        let err = read_root(&mut Cursor::new(&buf), ProtocolVersion::V1_20_3, shallow).unwrap_err();
        assert!(matches!(err, CodecError::MalformedWireValue(_)));

        let deep = TagLimits { max_depth: 5, ..TagLimits::default() };
        assert_eq!(read_root(&mut Cursor::new(&buf), ProtocolVersion::V1_20_3, deep).unwrap(), tag);
    }

    #[test]
    fn test_byte_budget_rejects_oversized_declaration() {
        // Byte array declaring 1 MiB against a 1 KiB budget.
        let data = [7u8, 0x00, 0x10, 0x00, 0x00];
        let limits = TagLimits { max_bytes: 1024, ..TagLimits::default() };
        let err = read_root(&mut Cursor::new(&data[..]), ProtocolVersion::V1_20_3, limits).unwrap_err();
        assert!(matches!(err, CodecError::MalformedWireValue(_)));
    }

    #[test]
    fn test_list_rejects_mixed_kinds() {
        assert!(TagList::new(vec![BinaryTag::Int(1), BinaryTag::Byte(1)]).is_err());
        assert_eq!(TagList::new(vec![]).unwrap().element_kind(), TagKind::End);
    }

    #[test]
    fn test_supplementary_chars_use_surrogate_pairs() {
        let java = vec![8u8, 0, 6, 0xED, 0xA0, 0xBD, 0xED, 0xB8, 0x80];
        let decoded = read_root(&mut Cursor::new(&java), ProtocolVersion::V1_20_3, TagLimits::default()).unwrap();
        assert_eq!(decoded, BinaryTag::String("\u{1F600}".into()));

        let mut buf = Vec::new();
        write_root(&mut buf, ProtocolVersion::V1_20_3, &decoded).unwrap();
        assert_eq!(buf, java);
    }

    #[test]
    fn test_nul_is_two_bytes() {
        let tag = BinaryTag::single_entry("a\0", BinaryTag::String("\0".into()));
        let mut buf = Vec::new();
        write_root(&mut buf, ProtocolVersion::V1_20_3, &tag).unwrap();
        assert_eq!(buf, vec![10, 8, 0, 3, b'a', 0xC0, 0x80, 0, 2, 0xC0, 0x80, 0]);

        let decoded = read_root(&mut Cursor::new(&buf), ProtocolVersion::V1_20_3, TagLimits::default()).unwrap();
        assert_eq!(decoded, tag);
    }

    #[test]
    fn test_plain_four_byte_utf8_is_malformed() {
        let data = [8u8, 0, 4, 0xF0, 0x9F, 0x98, 0x80];
        let err = read_root(&mut Cursor::new(&data[..]), ProtocolVersion::V1_20_3, TagLimits::default())
            .unwrap_err();
        assert!(matches!(err, CodecError::MalformedWireValue(_)));
    }

    #[test]
    fn test_string_length_counts_encoded_bytes() {
        // 65535 encoded bytes is the most a u16 length can carry; NUL encodes as two.
        let fits = BinaryTag::String("\u{800}".repeat(21_845));
        assert!(write_root(&mut Vec::new(), ProtocolVersion::V1_20_3, &fits).is_ok());
        let over = BinaryTag::String("\0".repeat(32_768));
        let err = write_root(&mut Vec::new(), ProtocolVersion::V1_20_3, &over).unwrap_err();
        assert!(matches!(err, CodecError::MalformedWireValue(_)));
    }

    #[test]
    fn test_display() {
        let tag = BinaryTag::single_entry("a", BinaryTag::IntArray(vec![1, 2]));
        assert_eq!(tag.to_string(), "{\"a\":[I;1,2]}");
    }
}
