use rmp::encode::ValueWriteError;
use thiserror::Error as ThisError;

#[derive(ThisError, Debug, PartialEq, Eq)]
pub enum Error {
  #[error("unsupported type: {name}")]
  UnsupportedType { name: String },

  #[error("illegal msgpack format: {marker:#04X} at offset {offset}")]
  Format { marker: u8, offset: usize },
  #[error("trailing bytes after the value: {remaining} bytes at offset {offset}")]
  TrailingBytes { offset: usize, remaining: usize },
  #[error("should receive more data to restore the entire value: {required} bytes required, {remaining} remaining")]
  TruncatedInput { required: usize, remaining: usize },

  #[error("schema mismatch: {expected} expected, but {found} found")]
  SchemaMismatch { expected: String, found: String },

  #[error("cyclic reference detected in {name}")]
  CyclicReference { name: String },
  #[error("nesting too deep: max={maximum:?}")]
  NestingTooDeep { maximum: usize },
  #[error("{name} is mutably borrowed and cannot be serialized")]
  Borrowed { name: String },

  #[error("underlying I/O layer error: {message}")]
  Io { kind: std::io::ErrorKind, message: String },
}

impl Error {
  pub(crate) fn mismatch<E: Into<String>, F: Into<String>>(expected: E, found: F) -> Error {
    Error::SchemaMismatch { expected: expected.into(), found: found.into() }
  }

  pub(crate) fn unsupported<N: Into<String>>(name: N) -> Error {
    Error::UnsupportedType { name: name.into() }
  }
}

impl From<std::io::Error> for Error {
  fn from(err: std::io::Error) -> Error {
    Error::Io { kind: err.kind(), message: err.to_string() }
  }
}

impl From<ValueWriteError> for Error {
  fn from(err: ValueWriteError) -> Error {
    match err {
      ValueWriteError::InvalidMarkerWrite(err) | ValueWriteError::InvalidDataWrite(err) => Error::from(err),
    }
  }
}
