//! Registry-key command argument properties and their serializers.
//!
//! All five variants share one wire shape, a single length-prefixed
//! identifier. Which variant a payload belongs to is decided by whoever
//! picked the serializer, never by a byte in the payload.

use std::io::{Read, Write};

use crate::error::{CodecError, Result};
use crate::version::ProtocolVersion;
use crate::wire::{ReadWireExt, WriteWireExt};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ArgumentKind {
    Resource,
    ResourceOrTag,
    ResourceOrTagKey,
    ResourceSelector,
    ResourceKey,
}

impl ArgumentKind {
    pub const ALL: [ArgumentKind; 5] = [
        ArgumentKind::Resource,
        ArgumentKind::ResourceOrTag,
        ArgumentKind::ResourceOrTagKey,
        ArgumentKind::ResourceSelector,
        ArgumentKind::ResourceKey,
    ];

    /// Family name the argument type is registered under.
    pub fn identifier(self) -> &'static str {
        match self {
            ArgumentKind::Resource => "minecraft:resource",
            ArgumentKind::ResourceOrTag => "minecraft:resource_or_tag",
            ArgumentKind::ResourceOrTagKey => "minecraft:resource_or_tag_key",
            ArgumentKind::ResourceSelector => "minecraft:resource_selector",
            ArgumentKind::ResourceKey => "minecraft:resource_key",
        }
    }

    pub fn from_identifier(identifier: &str) -> Option<Self> {
        ArgumentKind::ALL.into_iter().find(|kind| kind.identifier() == identifier)
    }

    pub fn construct(self, registry: String) -> RegistryKeyArgument {
        match self {
            ArgumentKind::Resource => RegistryKeyArgument::Resource(registry),
            ArgumentKind::ResourceOrTag => RegistryKeyArgument::ResourceOrTag(registry),
            ArgumentKind::ResourceOrTagKey => RegistryKeyArgument::ResourceOrTagKey(registry),
            ArgumentKind::ResourceSelector => RegistryKeyArgument::ResourceSelector(registry),
            ArgumentKind::ResourceKey => RegistryKeyArgument::ResourceKey(registry),
        }
    }
}

/// An argument property naming the registry the argument draws from.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum RegistryKeyArgument {
    Resource(String),
    ResourceOrTag(String),
    ResourceOrTagKey(String),
    ResourceSelector(String),
    ResourceKey(String),
}

impl RegistryKeyArgument {
    pub fn kind(&self) -> ArgumentKind {
        match self {
            RegistryKeyArgument::Resource(_) => ArgumentKind::Resource,
            RegistryKeyArgument::ResourceOrTag(_) => ArgumentKind::ResourceOrTag,
            RegistryKeyArgument::ResourceOrTagKey(_) => ArgumentKind::ResourceOrTagKey,
            RegistryKeyArgument::ResourceSelector(_) => ArgumentKind::ResourceSelector,
            RegistryKeyArgument::ResourceKey(_) => ArgumentKind::ResourceKey,
        }
    }

    /// The registry identifier, e.g. `minecraft:worldgen/biome`.
    pub fn identifier(&self) -> &str {
        match self {
            RegistryKeyArgument::Resource(id)
            | RegistryKeyArgument::ResourceOrTag(id)
            | RegistryKeyArgument::ResourceOrTagKey(id)
            | RegistryKeyArgument::ResourceSelector(id)
            | RegistryKeyArgument::ResourceKey(id) => id,
        }
    }
}

/// Reads and writes the properties of one argument type.
pub trait ArgumentPropertySerializer: Send + Sync {
    type Value;

    fn deserialize<R: Read + ?Sized>(&self, reader: &mut R, version: ProtocolVersion) -> Result<Self::Value>;

    fn serialize<W: Write + ?Sized>(&self, value: &Self::Value, writer: &mut W, version: ProtocolVersion) -> Result<()>;
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RegistryKeySerializer {
    kind: ArgumentKind,
}

impl RegistryKeySerializer {
    pub fn kind(&self) -> ArgumentKind {
        self.kind
    }
}

impl ArgumentPropertySerializer for RegistryKeySerializer {
    type Value = RegistryKeyArgument;

    fn deserialize<R: Read + ?Sized>(&self, reader: &mut R, _version: ProtocolVersion) -> Result<RegistryKeyArgument> {
        Ok(self.kind.construct(reader.read_string()?))
    }

    fn serialize<W: Write + ?Sized>(
        &self,
        value: &RegistryKeyArgument,
        writer: &mut W,
        _version: ProtocolVersion,
    ) -> Result<()> {
        if value.kind() != self.kind {
            return Err(CodecError::malformed(format!(
                "{:?} argument handed to the {} serializer",
                value.kind(),
                self.kind.identifier()
            )));
        }
        writer.write_string(value.identifier())
    }
}

static SERIALIZERS: [RegistryKeySerializer; 5] = [
    RegistryKeySerializer { kind: ArgumentKind::Resource },
    RegistryKeySerializer { kind: ArgumentKind::ResourceOrTag },
    RegistryKeySerializer { kind: ArgumentKind::ResourceOrTagKey },
    RegistryKeySerializer { kind: ArgumentKind::ResourceSelector },
    RegistryKeySerializer { kind: ArgumentKind::ResourceKey },
];

/// The fixed catalogue of registry-key argument serializers.
pub struct ArgumentRegistry;

impl ArgumentRegistry {
    pub fn serializer(kind: ArgumentKind) -> &'static RegistryKeySerializer {
        match kind {
            ArgumentKind::Resource => &SERIALIZERS[0],
            ArgumentKind::ResourceOrTag => &SERIALIZERS[1],
            ArgumentKind::ResourceOrTagKey => &SERIALIZERS[2],
            ArgumentKind::ResourceSelector => &SERIALIZERS[3],
            ArgumentKind::ResourceKey => &SERIALIZERS[4],
        }
    }

    pub fn serializers() -> &'static [RegistryKeySerializer] {
        &SERIALIZERS
    }

    pub fn lookup(identifier: &str) -> Option<&'static RegistryKeySerializer> {
        let serializer = ArgumentKind::from_identifier(identifier).map(Self::serializer);
        tracing::debug!(identifier, found = serializer.is_some(), "argument serializer lookup");
        serializer
    }

    /// Writes `family name` then the payload.
    pub fn write_with_identifier<W: Write + ?Sized>(
        argument: &RegistryKeyArgument,
        writer: &mut W,
        version: ProtocolVersion,
    ) -> Result<()> {
        let kind = argument.kind();
        writer.write_string(kind.identifier())?;
        Self::serializer(kind).serialize(argument, writer, version)
    }

    pub fn read_with_identifier<R: Read + ?Sized>(reader: &mut R, version: ProtocolVersion) -> Result<RegistryKeyArgument> {
        let identifier = reader.read_string()?;
        let Some(serializer) = Self::lookup(&identifier) else {
            tracing::warn!(%identifier, "unknown argument type");
            return Err(CodecError::malformed(format!("unknown argument type {}", identifier)));
        };
        serializer.deserialize(reader, version)
    }
}
