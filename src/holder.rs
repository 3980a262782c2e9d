//! Lazily derived object/text/binary representations of one structured value.

use std::io::{Read, Write};
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;

use crate::config::CodecConfig;
use crate::convert::{to_binary, to_dynamic};
use crate::dynamic::DynamicValue;
use crate::error::{CodecError, Result};
use crate::tag::{self, BinaryTag};
use crate::version::ProtocolVersion;
use crate::wire::{ReadWireExt, WriteWireExt};

/// Parses and renders the semantic object behind a structured value.
///
/// Implementations are supplied by the value model (chat components, for
/// instance). Every call receives the protocol version the holder was
/// created for, since text renderings differ between releases.
pub trait TextObjectCodec: Send + Sync {
    type Object: Send + Sync;
    type Error: std::error::Error + Send + Sync + 'static;

    fn parse(&self, text: &str, version: ProtocolVersion) -> Result<Self::Object, Self::Error>;

    fn serialize(&self, object: &Self::Object, version: ProtocolVersion) -> Result<String, Self::Error>;

    /// Renders the object as a dynamic tree, the input of [`to_binary`].
    fn to_tree(&self, object: &Self::Object, version: ProtocolVersion) -> Result<DynamicValue, Self::Error>;
}

/// Codec whose objects are plain JSON values.
#[derive(Copy, Clone, Debug, Default)]
pub struct JsonTextCodec;

impl TextObjectCodec for JsonTextCodec {
    type Object = serde_json::Value;
    type Error = serde_json::Error;

    fn parse(&self, text: &str, _version: ProtocolVersion) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::from_str(text)
    }

    fn serialize(&self, object: &serde_json::Value, _version: ProtocolVersion) -> Result<String, serde_json::Error> {
        serde_json::to_string(object)
    }

    fn to_tree(&self, object: &serde_json::Value, _version: ProtocolVersion) -> Result<DynamicValue, serde_json::Error> {
        Ok(DynamicValue::from(object.clone()))
    }
}

/// How a structured value travels for a given protocol version.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum WireForm {
    /// Before 1.13: length-prefixed text, uncapped unless configured.
    LegacyText,
    /// 1.13 up to 1.20.3: length-prefixed text with a byte cap.
    CappedText,
    /// 1.20.3 and later: a binary tag stream.
    BinaryTag,
}

impl WireForm {
    pub fn for_version(version: ProtocolVersion) -> Self {
        if version.no_less_than(ProtocolVersion::V1_20_3) {
            WireForm::BinaryTag
        } else if version.no_less_than(ProtocolVersion::V1_13) {
            WireForm::CappedText
        } else {
            WireForm::LegacyText
        }
    }
}

/// One structured value held as whichever of object, text and binary tag
/// it arrived in, deriving the others on demand.
///
/// Each representation is computed at most once and then shared by every
/// caller. A derivation that fails leaves its slot empty so a later call
/// can try again.
pub struct VersionedValueHolder<C: TextObjectCodec> {
    version: ProtocolVersion,
    codec: Arc<C>,
    object: OnceLock<C::Object>,
    text: OnceLock<String>,
    binary: OnceLock<BinaryTag>,
    // Lock order: text or binary before object.
    object_guard: Mutex<()>,
    text_guard: Mutex<()>,
    binary_guard: Mutex<()>,
}

pub type JsonValueHolder = VersionedValueHolder<JsonTextCodec>;

impl<C: TextObjectCodec> VersionedValueHolder<C> {
    fn empty(version: ProtocolVersion, codec: Arc<C>) -> Self {
        VersionedValueHolder {
            version,
            codec,
            object: OnceLock::new(),
            text: OnceLock::new(),
            binary: OnceLock::new(),
            object_guard: Mutex::new(()),
            text_guard: Mutex::new(()),
            binary_guard: Mutex::new(()),
        }
    }

    pub fn from_object(version: ProtocolVersion, codec: Arc<C>, object: C::Object) -> Self {
        let holder = Self::empty(version, codec);
        let _ = holder.object.set(object);
        holder
    }

    pub fn from_text(version: ProtocolVersion, codec: Arc<C>, text: impl Into<String>) -> Self {
        let holder = Self::empty(version, codec);
        let _ = holder.text.set(text.into());
        holder
    }

    pub fn from_binary(version: ProtocolVersion, codec: Arc<C>, tag: BinaryTag) -> Self {
        let holder = Self::empty(version, codec);
        let _ = holder.binary.set(tag);
        holder
    }

    pub fn version(&self) -> ProtocolVersion {
        self.version
    }

    pub fn has_object(&self) -> bool {
        self.object.get().is_some()
    }

    pub fn has_text(&self) -> bool {
        self.text.get().is_some()
    }

    pub fn has_binary(&self) -> bool {
        self.binary.get().is_some()
    }

    pub fn as_object(&self) -> Result<&C::Object> {
        if let Some(object) = self.object.get() {
            return Ok(object);
        }
        let _guard = self.object_guard.lock();
        if let Some(object) = self.object.get() {
            return Ok(object);
        }
        let derived = self.derive_object()?;
        Ok(self.object.get_or_init(move || derived))
    }

    fn derive_object(&self) -> Result<C::Object> {
        if let Some(text) = self.text.get() {
            tracing::trace!(version = %self.version, "deriving object from text");
            return self.codec.parse(text, self.version).map_err(CodecError::conversion);
        }
        if let Some(tag) = self.binary.get() {
            tracing::trace!(version = %self.version, "deriving object from binary tag");
            let text = self.text.get_or_init(|| to_dynamic(tag).to_json().to_string());
            return self.codec.parse(text, self.version).map_err(|err| {
                tracing::error!(
                    binary = %tag,
                    text = %text,
                    error = %err,
                    "failed to convert binary value to object"
                );
                CodecError::conversion(err)
            });
        }
        Err(CodecError::malformed("value holder has no representation"))
    }

    pub fn as_text(&self) -> Result<&str> {
        if let Some(text) = self.text.get() {
            return Ok(text);
        }
        let _guard = self.text_guard.lock();
        if let Some(text) = self.text.get() {
            return Ok(text);
        }
        let object = self.as_object()?;
        // Deriving the object from a binary tag fills the text slot on the way.
        if let Some(text) = self.text.get() {
            return Ok(text);
        }
        tracing::trace!(version = %self.version, "deriving text from object");
        let derived = self
            .codec
            .serialize(object, self.version)
            .map_err(CodecError::conversion)?;
        Ok(self.text.get_or_init(move || derived))
    }

    pub fn as_binary(&self) -> Result<&BinaryTag> {
        if let Some(tag) = self.binary.get() {
            return Ok(tag);
        }
        let _guard = self.binary_guard.lock();
        if let Some(tag) = self.binary.get() {
            return Ok(tag);
        }
        let object = self.as_object()?;
        tracing::trace!(version = %self.version, "deriving binary tag from object");
        let tree = self
            .codec
            .to_tree(object, self.version)
            .map_err(CodecError::conversion)?;
        let derived = to_binary(&tree)?;
        Ok(self.binary.get_or_init(move || derived))
    }

    pub fn read_from_wire<R: Read + ?Sized>(
        reader: &mut R,
        version: ProtocolVersion,
        codec: Arc<C>,
    ) -> Result<Self> {
        Self::read_from_wire_with(reader, version, codec, &CodecConfig::default())
    }

    pub fn read_from_wire_with<R: Read + ?Sized>(
        reader: &mut R,
        version: ProtocolVersion,
        codec: Arc<C>,
        config: &CodecConfig,
    ) -> Result<Self> {
        let form = WireForm::for_version(version);
        tracing::debug!(%version, ?form, "reading structured value");
        Ok(match form {
            WireForm::BinaryTag => Self::from_binary(version, codec, tag::read_root(reader, version, config.tag)?),
            WireForm::CappedText => Self::from_text(
                version,
                codec,
                reader.read_string_capped(Some(config.text.component_max_len))?,
            ),
            WireForm::LegacyText => {
                Self::from_text(version, codec, reader.read_string_capped(config.text.legacy_max_len)?)
            }
        })
    }

    /// Writes the value in the form `version` expects, deriving that
    /// representation first if it is not cached yet.
    pub fn write_to_wire<W: Write + ?Sized>(&self, writer: &mut W, version: ProtocolVersion) -> Result<()> {
        let form = WireForm::for_version(version);
        tracing::debug!(%version, ?form, "writing structured value");
        match form {
            WireForm::BinaryTag => tag::write_root(writer, version, self.as_binary()?),
            WireForm::CappedText | WireForm::LegacyText => writer.write_string(self.as_text()?),
        }
    }
}

impl<C: TextObjectCodec> std::fmt::Debug for VersionedValueHolder<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VersionedValueHolder")
            .field("version", &self.version)
            .field("text", &self.text.get())
            .field("binary", &self.binary.get())
            .field("has_object", &self.has_object())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Cursor;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingCodec {
        parses: AtomicUsize,
        serializes: AtomicUsize,
        trees: AtomicUsize,
        failing: AtomicBool,
        serialize_failing: AtomicBool,
    }

    #[derive(Debug, thiserror::Error)]
    #[error("codec unavailable")]
    struct Unavailable;

    #[derive(Debug, thiserror::Error)]
    enum CountingError {
        #[error(transparent)]
        Json(#[from] serde_json::Error),
        #[error(transparent)]
        Unavailable(#[from] Unavailable),
    }

    impl TextObjectCodec for CountingCodec {
        type Object = serde_json::Value;
        type Error = CountingError;

        fn parse(&self, text: &str, _version: ProtocolVersion) -> Result<serde_json::Value, CountingError> {
            self.parses.fetch_add(1, Ordering::SeqCst);
            if self.failing.load(Ordering::SeqCst) {
                return Err(Unavailable.into());
            }
            Ok(serde_json::from_str(text)?)
        }

        fn serialize(&self, object: &serde_json::Value, _version: ProtocolVersion) -> Result<String, CountingError> {
            self.serializes.fetch_add(1, Ordering::SeqCst);
            if self.serialize_failing.load(Ordering::SeqCst) {
                return Err(Unavailable.into());
            }
            Ok(serde_json::to_string(object)?)
        }

        fn to_tree(&self, object: &serde_json::Value, _version: ProtocolVersion) -> Result<DynamicValue, CountingError> {
            self.trees.fetch_add(1, Ordering::SeqCst);
            Ok(DynamicValue::from(object.clone()))
        }
    }

    fn component() -> serde_json::Value {
        json!({"text": "hi"})
    }

    #[test]
    fn test_binary_is_derived_once() {
        let codec = Arc::new(CountingCodec::default());
        let holder = VersionedValueHolder::from_object(ProtocolVersion::V1_20_3, codec.clone(), component());

        let first = holder.as_binary().unwrap();
        let second = holder.as_binary().unwrap();
        assert!(std::ptr::eq(first, second));
        assert_eq!(codec.trees.load(Ordering::SeqCst), 1);
        assert_eq!(
            *first,
            BinaryTag::single_entry("text", BinaryTag::String("hi".into()))
        );
    }

    #[test]
    fn test_concurrent_readers_share_one_derivation() {
        let codec = Arc::new(CountingCodec::default());
        let holder = VersionedValueHolder::from_text(ProtocolVersion::V1_20_3, codec.clone(), r#"{"text":"hi"}"#);

        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    holder.as_binary().unwrap();
                });
            }
        });
        assert_eq!(codec.parses.load(Ordering::SeqCst), 1);
        assert_eq!(codec.trees.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_object_from_binary_caches_text() {
        let codec = Arc::new(CountingCodec::default());
        let tag = BinaryTag::single_entry("text", BinaryTag::String("hi".into()));
        let holder = VersionedValueHolder::from_binary(ProtocolVersion::V1_20_3, codec.clone(), tag);

        assert!(!holder.has_text());
        assert_eq!(*holder.as_object().unwrap(), component());
        assert!(holder.has_text());
        assert_eq!(holder.as_text().unwrap(), r#"{"text":"hi"}"#);
        assert_eq!(codec.serializes.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_text_from_binary_never_serializes() {
        let codec = Arc::new(CountingCodec::default());
        codec.serialize_failing.store(true, Ordering::SeqCst);
        let tag = BinaryTag::single_entry("text", BinaryTag::String("hi".into()));
        let holder = VersionedValueHolder::from_binary(ProtocolVersion::V1_20_3, codec.clone(), tag);

        let first = holder.as_text().unwrap();
        let second = holder.as_text().unwrap();
        assert!(std::ptr::eq(first, second));
        assert_eq!(first, r#"{"text":"hi"}"#);
        assert!(holder.has_object());
        assert_eq!(codec.parses.load(Ordering::SeqCst), 1);
        assert_eq!(codec.serializes.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_text_derived_from_object() {
        let codec = Arc::new(CountingCodec::default());
        let holder = VersionedValueHolder::from_object(ProtocolVersion::V1_13, codec.clone(), component());
        assert_eq!(holder.as_text().unwrap(), r#"{"text":"hi"}"#);
        assert_eq!(holder.as_text().unwrap(), r#"{"text":"hi"}"#);
        assert_eq!(codec.serializes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failed_derivation_can_be_retried() {
        let codec = Arc::new(CountingCodec::default());
        codec.failing.store(true, Ordering::SeqCst);
        let holder = VersionedValueHolder::from_text(ProtocolVersion::V1_20_3, codec.clone(), r#"{"text":"hi"}"#);

        assert!(matches!(holder.as_binary(), Err(CodecError::Conversion(_))));
        assert!(!holder.has_object());
        assert!(!holder.has_binary());

        codec.failing.store(false, Ordering::SeqCst);
        assert!(holder.as_binary().is_ok());
        assert_eq!(codec.parses.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_malformed_text_is_reported() {
        let holder = JsonValueHolder::from_text(ProtocolVersion::V1_13, Arc::new(JsonTextCodec), "{not json");
        assert!(matches!(holder.as_object(), Err(CodecError::Conversion(_))));
        assert!(!holder.has_object());
    }

    #[test]
    fn test_unsupported_number_fails_binary_derivation() {
        let holder = JsonValueHolder::from_object(
            ProtocolVersion::V1_20_3,
            Arc::new(JsonTextCodec),
            json!({"text": "hi", "n": u64::MAX}),
        );
        let mut out = Vec::new();
        let err = holder.write_to_wire(&mut out, ProtocolVersion::V1_20_3).unwrap_err();
        assert!(matches!(err, CodecError::UnsupportedValueKind(_)));
        assert!(!holder.has_binary());
    }

    #[test]
    fn test_wire_form_per_band() {
        assert_eq!(WireForm::for_version(ProtocolVersion::V1_12_2), WireForm::LegacyText);
        assert_eq!(WireForm::for_version(ProtocolVersion::V1_13), WireForm::CappedText);
        assert_eq!(WireForm::for_version(ProtocolVersion::V1_20_2), WireForm::CappedText);
        assert_eq!(WireForm::for_version(ProtocolVersion::V1_20_3), WireForm::BinaryTag);
    }

    #[test]
    fn test_version_gated_layouts() {
        let codec = Arc::new(JsonTextCodec);
        let holder = JsonValueHolder::from_object(ProtocolVersion::V1_20_3, codec.clone(), component());

        let mut text_bytes = vec![13u8];
        text_bytes.extend_from_slice(br#"{"text":"hi"}"#);
        let binary_bytes = vec![10u8, 8, 0, 4, b't', b'e', b'x', b't', 0, 2, b'h', b'i', 0];

        for (version, expected) in [
            (ProtocolVersion::V1_12_2, &text_bytes),
            (ProtocolVersion::V1_13, &text_bytes),
            (ProtocolVersion::V1_20_3, &binary_bytes),
        ] {
            let mut out = Vec::new();
            holder.write_to_wire(&mut out, version).unwrap();
            assert_eq!(&out, expected, "layout for {}", version);

            let decoded = JsonValueHolder::read_from_wire(&mut Cursor::new(&out), version, codec.clone()).unwrap();
            assert_eq!(*decoded.as_object().unwrap(), component());
        }
    }

    #[test]
    fn test_capped_text_band_rejects_oversized_text() {
        let codec = Arc::new(JsonTextCodec);
        let long = format!("\"{}\"", "a".repeat(262_143));
        let mut out = Vec::new();
        out.write_string(&long).unwrap();

        let err = JsonValueHolder::read_from_wire(&mut Cursor::new(&out), ProtocolVersion::V1_13, codec.clone())
            .unwrap_err();
        assert!(matches!(err, CodecError::MalformedWireValue(_)));

        let legacy = JsonValueHolder::read_from_wire(&mut Cursor::new(&out), ProtocolVersion::V1_12_2, codec).unwrap();
        assert_eq!(legacy.as_text().unwrap().len(), 262_145);
    }

    #[test]
    fn test_configured_legacy_cap() {
        let mut config = CodecConfig::default();
        config.text.legacy_max_len = Some(4);
        let mut out = Vec::new();
        out.write_string("\"hello\"").unwrap();
        let err = JsonValueHolder::read_from_wire_with(
            &mut Cursor::new(&out),
            ProtocolVersion::V1_12_2,
            Arc::new(JsonTextCodec),
            &config,
        )
        .unwrap_err();
        assert!(matches!(err, CodecError::MalformedWireValue(_)));
    }

    #[test]
    fn test_truncated_wire_value() {
        let codec = Arc::new(JsonTextCodec);
        let holder = JsonValueHolder::from_object(ProtocolVersion::V1_20_3, codec.clone(), component());
        let mut out = Vec::new();
        holder.write_to_wire(&mut out, ProtocolVersion::V1_20_3).unwrap();
        out.truncate(5);

        let err = JsonValueHolder::read_from_wire(&mut Cursor::new(&out), ProtocolVersion::V1_20_3, codec.clone())
            .unwrap_err();
        assert!(matches!(err, CodecError::TruncatedBuffer { .. }));

        let err = JsonValueHolder::read_from_wire(&mut Cursor::new(&[5u8, b'{'][..]), ProtocolVersion::V1_13, codec)
            .unwrap_err();
        assert!(matches!(err, CodecError::TruncatedBuffer { .. }));
    }

    #[test]
    fn test_mixed_list_component_reads_back_with_text_keys() {
        let codec = Arc::new(JsonTextCodec);
        let holder = JsonValueHolder::from_object(ProtocolVersion::V1_20_3, codec.clone(), json!([{"text": "a"}, "b"]));
        let mut out = Vec::new();
        holder.write_to_wire(&mut out, ProtocolVersion::V1_20_3).unwrap();

        let decoded = JsonValueHolder::read_from_wire(&mut Cursor::new(&out), ProtocolVersion::V1_20_3, codec).unwrap();
        assert_eq!(*decoded.as_object().unwrap(), json!([{"text": "a"}, {"text": "b"}]));
    }
}
