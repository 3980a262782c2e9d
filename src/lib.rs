//! Versioned value codecs for a protocol proxy.
//!
//! Clients and backends on either side of the proxy may speak different
//! protocol versions, so each value here is encoded for the version of the
//! side it is written to:
//!
//! - [`VersionedValueHolder`]: a structured value held as object, text or
//!   binary tag, sent as text or as a binary tag stream depending on version.
//! - [`to_binary`] / [`to_dynamic`]: conversion between loosely typed
//!   trees and binary tags.
//! - [`ArgumentRegistry`]: serializers for registry-key command arguments.
//! - [`AckWindow`]: the last-seen message acknowledgment window.

pub mod ack;
pub mod argument;
pub mod config;
pub mod convert;
pub mod dynamic;
pub mod error;
pub mod holder;
pub mod tag;
pub mod version;
pub mod wire;

pub use ack::{AckWindow, WINDOW_BYTES, WINDOW_SIZE};
pub use argument::{
    ArgumentKind, ArgumentPropertySerializer, ArgumentRegistry, RegistryKeyArgument, RegistryKeySerializer,
};
pub use config::{CodecConfig, ConfigError};
pub use convert::{to_binary, to_dynamic};
pub use dynamic::{DynamicValue, Numeric};
pub use error::{CodecError, Result};
pub use holder::{JsonTextCodec, JsonValueHolder, TextObjectCodec, VersionedValueHolder, WireForm};
pub use tag::{BinaryTag, TagKind, TagLimits, TagList};
pub use version::ProtocolVersion;
pub use wire::{ReadWireExt, WriteWireExt};
