//! Remote-exception payload protocol.
//!
//! Wire layout: one serialized exception object, an attachment count byte
//! (0-255), then that many (string key, value) pairs each serialized as
//! one object. A conforming payload ends exactly after the last
//! attachment.

use std::collections::HashMap;

use crate::codec::{CodecError, ObjectInput, ObjectOutput, RemoteException, Value};

/// Result of decoding an exception payload.
#[derive(Debug)]
pub struct DecodedException {
    /// The decoded exception, with its attachments filled in.
    pub exception: RemoteException,
    /// Bytes remained after the last attachment. The payload is corrupted
    /// and the connection it arrived on must not be reused.
    pub trailing_data: bool,
}

/// Decode an exception payload from `input`.
///
/// A trailing-data condition does not fail the decode; the exception is
/// still returned so it can be delivered to the caller.
pub fn decode_exception(input: &mut dyn ObjectInput) -> Result<DecodedException, CodecError> {
    let mut exception = match input.read_object()? {
        Value::Exception(e) => e,
        other => {
            return Err(CodecError::UnexpectedObject {
                expected: "exception",
                actual: other.kind(),
            })
        }
    };
    exception.attachments = read_attachments(input)?;
    let trailing_data = !input.at_end()?;
    Ok(DecodedException {
        exception,
        trailing_data,
    })
}

fn read_attachments(
    input: &mut dyn ObjectInput,
) -> Result<Option<HashMap<String, Value>>, CodecError> {
    let count = input.read_u8()?;
    if count == 0 {
        return Ok(None);
    }
    let mut attachments = HashMap::with_capacity(count as usize);
    for _ in 0..count {
        let key = match input.read_object()? {
            Value::String(key) => key,
            other => {
                return Err(CodecError::UnexpectedObject {
                    expected: "string attachment key",
                    actual: other.kind(),
                })
            }
        };
        let value = input.read_object()?;
        attachments.insert(key, value);
    }
    Ok(Some(attachments))
}

/// Encode `exception` in the wire layout understood by
/// [`decode_exception`]. The server-side counterpart, also used by
/// round-trip tests.
pub fn encode_exception(
    output: &mut dyn ObjectOutput,
    exception: &RemoteException,
) -> Result<(), CodecError> {
    output.write_object(&Value::Exception(exception.clone()))?;
    match &exception.attachments {
        None => output.write_u8(0)?,
        Some(attachments) => {
            if attachments.is_empty() || attachments.len() > u8::MAX as usize {
                return Err(CodecError::Malformed(format!(
                    "attachment count {} out of range",
                    attachments.len()
                )));
            }
            output.write_u8(attachments.len() as u8)?;
            for (key, value) in attachments {
                output.write_object(&Value::String(key.clone()))?;
                output.write_object(value)?;
            }
        }
    }
    output.flush()
}
