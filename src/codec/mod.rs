//! Object serialization seam and the remote-exception wire protocol.
//!
//! # Data Flow
//! ```text
//! Response classified as exception
//!     → dispatch collects the body bytes
//!     → Codec::reader with the reserved exception configuration
//!     → exception.rs (one exception object, count byte, key/value pairs)
//!     → RemoteException delivered to the caller
//! ```
//!
//! # Design Decisions
//! - The generic codec is consumed through narrow traits; this crate never
//!   defines its wire bytes
//! - Decoded objects are represented by the self-describing [`Value`] enum;
//!   the protocol core only inspects string keys and exception objects
//! - Exception payloads use a fixed codec configuration with no object
//!   table, because exceptions are shared across unrelated protocols

pub mod exception;
pub mod json;

use std::collections::HashMap;
use std::fmt;
use std::io;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use exception::{decode_exception, encode_exception, DecodedException};
pub use json::JsonCodec;

/// Codec configuration version reserved for exception payloads.
pub const EXCEPTION_CODEC_VERSION: u32 = 2;

/// Errors produced while encoding or decoding objects.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Underlying stream failure.
    #[error("codec I/O error: {0}")]
    Io(#[from] io::Error),

    /// The payload could not be interpreted.
    #[error("malformed payload: {0}")]
    Malformed(String),

    /// A decoded object had the wrong shape for its position in the
    /// protocol.
    #[error("unexpected object: expected {expected}, got {actual}")]
    UnexpectedObject {
        expected: &'static str,
        actual: &'static str,
    },
}

/// An application-level exception decoded from a remote response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
#[error("{class_name}: {message}")]
pub struct RemoteException {
    /// Remote type of the exception.
    pub class_name: String,
    /// Remote exception message.
    pub message: String,
    /// Keyed values bundled with the exception. `None` when the payload
    /// declared zero attachments; never an empty map.
    #[serde(skip)]
    pub attachments: Option<HashMap<String, Value>>,
}

impl RemoteException {
    pub fn new(class_name: &str, message: &str) -> Self {
        Self {
            class_name: class_name.to_string(),
            message: message.to_string(),
            attachments: None,
        }
    }
}

/// Object model of the codec. Self-describing so that values survive a
/// round trip without per-protocol type knowledge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    I64(i64),
    F64(f64),
    String(String),
    Bytes(Vec<u8>),
    List(Vec<Value>),
    Map(Vec<(Value, Value)>),
    Exception(RemoteException),
}

impl Value {
    /// Shape of this value, for error reporting.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::I64(_) => "i64",
            Value::F64(_) => "f64",
            Value::String(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Exception(_) => "exception",
        }
    }
}

/// Protocol-specific table of pre-registered objects. Opaque to this crate;
/// codec implementations that support tables interpret it.
pub trait ObjectTable: Send + Sync + fmt::Debug {}

/// Versioned codec configuration.
#[derive(Debug, Clone, Default)]
pub struct MarshallingConfig {
    pub version: u32,
    pub object_table: Option<Arc<dyn ObjectTable>>,
}

impl MarshallingConfig {
    /// The fixed configuration used for exception payloads: reserved
    /// version, no object table.
    pub fn exceptions() -> Self {
        Self {
            version: EXCEPTION_CODEC_VERSION,
            object_table: None,
        }
    }
}

/// Factory for object readers and writers.
pub trait Codec: Send + Sync {
    /// Open an object reader over `input`.
    fn reader<'a>(
        &self,
        config: &MarshallingConfig,
        input: Box<dyn io::Read + Send + 'a>,
    ) -> Result<Box<dyn ObjectInput + 'a>, CodecError>;

    /// Open an object writer over `output`.
    fn writer<'a>(
        &self,
        config: &MarshallingConfig,
        output: Box<dyn io::Write + Send + 'a>,
    ) -> Result<Box<dyn ObjectOutput + 'a>, CodecError>;
}

/// Decodes one object at a time from a byte stream.
pub trait ObjectInput: Send {
    /// Decode the next object.
    fn read_object(&mut self) -> Result<Value, CodecError>;

    /// Read one raw byte (used for the attachment count).
    fn read_u8(&mut self) -> Result<u8, CodecError>;

    /// True when the stream has no bytes left.
    fn at_end(&mut self) -> Result<bool, CodecError>;
}

/// Encodes one object at a time onto a byte stream.
pub trait ObjectOutput: Send {
    /// Encode one object.
    fn write_object(&mut self, value: &Value) -> Result<(), CodecError>;

    /// Write one raw byte.
    fn write_u8(&mut self, value: u8) -> Result<(), CodecError>;

    /// Flush buffered output to the underlying stream.
    fn flush(&mut self) -> Result<(), CodecError>;
}
