use std::io;

/// Errors raised while encoding, decoding or converting protocol values.
///
/// Every variant is reported to the immediate caller. Whether a malformed
/// value justifies dropping the peer is the caller's decision.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The bytes are structurally invalid (bad kind byte, oversized text, ...).
    #[error("malformed wire value: {0}")]
    MalformedWireValue(String),

    /// Fewer bytes remained than the format requires.
    #[error("truncated buffer while reading {context}")]
    TruncatedBuffer { context: &'static str },

    /// A dynamic value whose numeric representation has no tag kind.
    #[error("unsupported value kind: {0}")]
    UnsupportedValueKind(String),

    /// The external text/object codec rejected a value.
    #[error("conversion failed: {0}")]
    Conversion(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("i/o error: {0}")]
    Io(#[source] io::Error),
}

impl CodecError {
    pub fn malformed(message: impl Into<String>) -> Self {
        CodecError::MalformedWireValue(message.into())
    }

    pub fn conversion(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        CodecError::Conversion(Box::new(source))
    }

    /// Maps a reader error, turning an early end of input into
    /// [`CodecError::TruncatedBuffer`].
    pub fn from_read(err: io::Error, context: &'static str) -> Self {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            CodecError::TruncatedBuffer { context }
        } else {
            CodecError::Io(err)
        }
    }
}

impl From<io::Error> for CodecError {
    fn from(err: io::Error) -> Self {
        CodecError::from_read(err, "value")
    }
}

pub type Result<T, E = CodecError> = std::result::Result<T, E>;
