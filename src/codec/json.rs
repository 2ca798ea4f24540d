//! Length-prefixed JSON codec.
//!
//! Each object is a big-endian u32 length followed by the JSON encoding of
//! a [`Value`]. This is the reference codec used by the test suite and by
//! embedders that do not bring a binary marshalling implementation; the
//! protocol core is indifferent to the wire format behind the traits.

use std::io::{self, Read, Write};

use crate::codec::{Codec, CodecError, MarshallingConfig, ObjectInput, ObjectOutput, Value};

/// [`Codec`] producing length-prefixed JSON objects.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn reader<'a>(
        &self,
        _config: &MarshallingConfig,
        input: Box<dyn Read + Send + 'a>,
    ) -> Result<Box<dyn ObjectInput + 'a>, CodecError> {
        Ok(Box::new(JsonReader {
            input,
            peeked: None,
        }))
    }

    fn writer<'a>(
        &self,
        _config: &MarshallingConfig,
        output: Box<dyn Write + Send + 'a>,
    ) -> Result<Box<dyn ObjectOutput + 'a>, CodecError> {
        Ok(Box::new(JsonWriter { output }))
    }
}

struct JsonReader<'a> {
    input: Box<dyn Read + Send + 'a>,
    /// One byte of lookahead, consumed by end-of-stream probing.
    peeked: Option<u8>,
}

impl JsonReader<'_> {
    fn fill(&mut self, buf: &mut [u8]) -> Result<(), CodecError> {
        let mut pos = 0;
        if let Some(byte) = self.peeked.take() {
            if buf.is_empty() {
                self.peeked = Some(byte);
                return Ok(());
            }
            buf[0] = byte;
            pos = 1;
        }
        self.input.read_exact(&mut buf[pos..]).map_err(|e| {
            if e.kind() == io::ErrorKind::UnexpectedEof {
                CodecError::Malformed("truncated payload".to_string())
            } else {
                CodecError::Io(e)
            }
        })
    }
}

impl ObjectInput for JsonReader<'_> {
    fn read_object(&mut self) -> Result<Value, CodecError> {
        let mut len = [0u8; 4];
        self.fill(&mut len)?;
        let len = u32::from_be_bytes(len) as usize;
        let mut buf = vec![0u8; len];
        self.fill(&mut buf)?;
        serde_json::from_slice(&buf).map_err(|e| CodecError::Malformed(e.to_string()))
    }

    fn read_u8(&mut self) -> Result<u8, CodecError> {
        let mut byte = [0u8; 1];
        self.fill(&mut byte)?;
        Ok(byte[0])
    }

    fn at_end(&mut self) -> Result<bool, CodecError> {
        if self.peeked.is_some() {
            return Ok(false);
        }
        let mut byte = [0u8; 1];
        loop {
            match self.input.read(&mut byte) {
                Ok(0) => return Ok(true),
                Ok(_) => {
                    self.peeked = Some(byte[0]);
                    return Ok(false);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(CodecError::Io(e)),
            }
        }
    }
}

struct JsonWriter<'a> {
    output: Box<dyn Write + Send + 'a>,
}

impl ObjectOutput for JsonWriter<'_> {
    fn write_object(&mut self, value: &Value) -> Result<(), CodecError> {
        let buf = serde_json::to_vec(value).map_err(|e| CodecError::Malformed(e.to_string()))?;
        self.output.write_all(&(buf.len() as u32).to_be_bytes())?;
        self.output.write_all(&buf)?;
        Ok(())
    }

    fn write_u8(&mut self, value: u8) -> Result<(), CodecError> {
        self.output.write_all(&[value])?;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), CodecError> {
        self.output.flush()?;
        Ok(())
    }
}
