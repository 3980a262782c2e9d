//! Conversion between [`DynamicValue`] trees and [`BinaryTag`] trees.
//!
//! `to_binary` picks tags from the declared numeric kind of each value and
//! collapses homogeneous byte/int/long sequences into the packed array
//! tags. Sequences whose elements convert to different kinds become a list
//! of compounds, with every non-compound element wrapped as `{"": value}`.
//!
//! `to_dynamic` is the structural inverse except for one asymmetry: an
//! empty compound key comes back as `"text"`. `[{"text":"a"},"b"]` is sent
//! as `[{"text":"a"},{"":"b"}]` and read back as
//! `[{"text":"a"},{"text":"b"}]`, which is a valid chat component where
//! `{"":"b"}` would not be.

use std::collections::BTreeMap;

use crate::dynamic::{DynamicValue, Numeric};
use crate::error::{CodecError, Result};
use crate::tag::{BinaryTag, TagKind, TagList};

/// Key that wraps a non-compound element of a mixed list.
pub const WRAPPED_ELEMENT_KEY: &str = "";
/// Key an empty compound key is read back as.
pub const UNWRAPPED_ELEMENT_KEY: &str = "text";

pub fn to_binary(value: &DynamicValue) -> Result<BinaryTag> {
    match value {
        DynamicValue::Null => Ok(BinaryTag::End),
        DynamicValue::Bool(b) => Ok(BinaryTag::Byte(i8::from(*b))),
        DynamicValue::Number(n) => numeric_to_binary(n),
        DynamicValue::Text(s) => Ok(BinaryTag::String(s.clone())),
        DynamicValue::Mapping(entries) => {
            let mut compound = BTreeMap::new();
            for (key, value) in entries {
                if matches!(value, DynamicValue::Null) {
                    continue;
                }
                compound.insert(key.clone(), to_binary(value)?);
            }
            Ok(BinaryTag::Compound(compound))
        }
        DynamicValue::Sequence(items) => sequence_to_binary(items),
    }
}

fn numeric_to_binary(n: &Numeric) -> Result<BinaryTag> {
    Ok(match n {
        Numeric::Byte(v) => BinaryTag::Byte(*v),
        Numeric::Short(v) => BinaryTag::Short(*v),
        Numeric::Int(v) => BinaryTag::Int(*v),
        Numeric::Long(v) => BinaryTag::Long(*v),
        Numeric::Float(v) => BinaryTag::Float(*v),
        Numeric::Double(v) => BinaryTag::Double(*v),
        Numeric::Lazy(literal) => match literal.parse::<i32>() {
            Ok(v) => BinaryTag::Int(v),
            Err(_) => {
                return Err(CodecError::UnsupportedValueKind(format!(
                    "numeric literal {} does not narrow to a tag kind",
                    literal
                )))
            }
        },
    })
}

fn sequence_to_binary(items: &[DynamicValue]) -> Result<BinaryTag> {
    let tags = items
        .iter()
        .filter(|item| !matches!(item, DynamicValue::Null))
        .map(to_binary)
        .collect::<Result<Vec<_>>>()?;

    let Some(first) = tags.first() else {
        return Ok(BinaryTag::List(TagList::empty()));
    };
    let kind = first.kind();
    let uniform = tags.iter().all(|tag| tag.kind() == kind);

    if !uniform {
        let wrapped = tags
            .into_iter()
            .map(|tag| match tag {
                BinaryTag::Compound(_) => tag,
                other => BinaryTag::single_entry(WRAPPED_ELEMENT_KEY, other),
            })
            .collect();
        return Ok(BinaryTag::List(TagList::with_kind(TagKind::Compound, wrapped)?));
    }

    Ok(match kind {
        TagKind::Byte => BinaryTag::ByteArray(
            tags.iter()
                .filter_map(|tag| match tag {
                    BinaryTag::Byte(v) => Some(*v),
                    _ => None,
                })
                .collect(),
        ),
        TagKind::Int => BinaryTag::IntArray(
            tags.iter()
                .filter_map(|tag| match tag {
                    BinaryTag::Int(v) => Some(*v),
                    _ => None,
                })
                .collect(),
        ),
        TagKind::Long => BinaryTag::LongArray(
            tags.iter()
                .filter_map(|tag| match tag {
                    BinaryTag::Long(v) => Some(*v),
                    _ => None,
                })
                .collect(),
        ),
        _ => BinaryTag::List(TagList::with_kind(kind, tags)?),
    })
}

pub fn to_dynamic(tag: &BinaryTag) -> DynamicValue {
    match tag {
        BinaryTag::End => DynamicValue::Null,
        BinaryTag::Byte(v) => DynamicValue::Number(Numeric::Byte(*v)),
        BinaryTag::Short(v) => DynamicValue::Number(Numeric::Short(*v)),
        BinaryTag::Int(v) => DynamicValue::Number(Numeric::Int(*v)),
        BinaryTag::Long(v) => DynamicValue::Number(Numeric::Long(*v)),
        BinaryTag::Float(v) => DynamicValue::Number(Numeric::Float(*v)),
        BinaryTag::Double(v) => DynamicValue::Number(Numeric::Double(*v)),
        BinaryTag::ByteArray(values) => DynamicValue::Sequence(
            values.iter().map(|v| DynamicValue::Number(Numeric::Byte(*v))).collect(),
        ),
        BinaryTag::String(s) => DynamicValue::Text(s.clone()),
        BinaryTag::List(list) => DynamicValue::Sequence(list.iter().map(to_dynamic).collect()),
        BinaryTag::Compound(entries) => DynamicValue::Mapping(
            entries
                .iter()
                .map(|(key, value)| {
                    let key = if key.is_empty() {
                        UNWRAPPED_ELEMENT_KEY.to_string()
                    } else {
                        key.clone()
                    };
                    (key, to_dynamic(value))
                })
                .collect(),
        ),
        BinaryTag::IntArray(values) => DynamicValue::Sequence(
            values.iter().map(|v| DynamicValue::Number(Numeric::Int(*v))).collect(),
        ),
        BinaryTag::LongArray(values) => DynamicValue::Sequence(
            values.iter().map(|v| DynamicValue::Number(Numeric::Long(*v))).collect(),
        ),
    }
}
