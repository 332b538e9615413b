//! Strict DER primitives
//!
//! Only the handful of universal types the custody schemas need:
//! SEQUENCE, INTEGER (non-negative), OCTET STRING, BIT STRING,
//! OBJECT IDENTIFIER and UTF8String. Decoding rejects indefinite or
//! non-minimal lengths, non-minimal or negative integers, and trailing bytes.

use crate::error::{CustodyError, ErrorCode};

pub const TAG_INTEGER: u8 = 0x02;
pub const TAG_BIT_STRING: u8 = 0x03;
pub const TAG_OCTET_STRING: u8 = 0x04;
pub const TAG_OID: u8 = 0x06;
pub const TAG_UTF8_STRING: u8 = 0x0c;
pub const TAG_SEQUENCE: u8 = 0x30;

/// Errors raised by the DER codec
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DerError {
    #[error("DER decode error: {0}")]
    Decode(String),

    #[error("DER encode error: {0}")]
    Encode(String),
}

impl From<DerError> for CustodyError {
    fn from(e: DerError) -> Self {
        match e {
            DerError::Decode(msg) => CustodyError::new(ErrorCode::DerDecode, msg),
            DerError::Encode(msg) => CustodyError::new(ErrorCode::DerEncode, msg),
        }
    }
}

pub type DerResult<T> = Result<T, DerError>;

// Encoding

fn encode_length(len: usize, out: &mut Vec<u8>) {
    if len < 0x80 {
        out.push(len as u8);
        return;
    }
    let bytes = len.to_be_bytes();
    let leading_zeros = bytes.iter().take_while(|&&b| b == 0).count();
    let significant = &bytes[leading_zeros..];
    out.push(0x80 | significant.len() as u8);
    out.extend_from_slice(significant);
}

/// Encode a tag-length-value triple
pub fn encode_tlv(tag: u8, content: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(content.len() + 6);
    out.push(tag);
    encode_length(content.len(), &mut out);
    out.extend_from_slice(content);
    out
}

/// Encode already-encoded elements as a SEQUENCE
pub fn encode_sequence(elements: &[Vec<u8>]) -> Vec<u8> {
    let content: Vec<u8> = elements.concat();
    encode_tlv(TAG_SEQUENCE, &content)
}

/// Encode a non-negative integer given as big-endian magnitude bytes
pub fn encode_unsigned_integer(magnitude: &[u8]) -> Vec<u8> {
    let first_nonzero = magnitude.iter().position(|&b| b != 0);
    let mut content = match first_nonzero {
        Some(start) => magnitude[start..].to_vec(),
        None => vec![0x00],
    };
    if content[0] & 0x80 != 0 {
        content.insert(0, 0x00);
    }
    encode_tlv(TAG_INTEGER, &content)
}

pub fn encode_u64(value: u64) -> Vec<u8> {
    encode_unsigned_integer(&value.to_be_bytes())
}

pub fn encode_octet_string(bytes: &[u8]) -> Vec<u8> {
    encode_tlv(TAG_OCTET_STRING, bytes)
}

pub fn encode_utf8_string(value: &str) -> Vec<u8> {
    encode_tlv(TAG_UTF8_STRING, value.as_bytes())
}

/// BIT STRING with zero unused bits
pub fn encode_bit_string(bytes: &[u8]) -> Vec<u8> {
    let mut content = Vec::with_capacity(bytes.len() + 1);
    content.push(0x00);
    content.extend_from_slice(bytes);
    encode_tlv(TAG_BIT_STRING, &content)
}

/// OBJECT IDENTIFIER from its pre-encoded content bytes
pub fn encode_oid(content: &[u8]) -> Vec<u8> {
    encode_tlv(TAG_OID, content)
}

/// SEQUENCE OF INTEGER
pub fn encode_integer_sequence(values: &[u32]) -> Vec<u8> {
    let elements: Vec<Vec<u8>> = values.iter().map(|&v| encode_u64(v as u64)).collect();
    encode_sequence(&elements)
}

// Decoding

/// Cursor over a DER buffer
#[derive(Debug, Clone)]
pub struct DerReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> DerReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    pub fn peek_tag(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    /// Fail if any bytes remain unread
    pub fn finish(&self) -> DerResult<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(DerError::Decode(format!(
                "{} trailing bytes after DER value",
                self.data.len() - self.pos
            )))
        }
    }

    fn next_byte(&mut self) -> DerResult<u8> {
        let byte = self
            .data
            .get(self.pos)
            .copied()
            .ok_or_else(|| DerError::Decode("unexpected end of input".to_string()))?;
        self.pos += 1;
        Ok(byte)
    }

    fn read_length(&mut self) -> DerResult<usize> {
        let first = self.next_byte()?;
        if first < 0x80 {
            return Ok(first as usize);
        }
        if first == 0x80 {
            return Err(DerError::Decode("indefinite length is not DER".to_string()));
        }

        let count = (first & 0x7f) as usize;
        if count > 4 {
            return Err(DerError::Decode(format!("length of {} bytes is too large", count)));
        }

        let mut len = 0usize;
        for i in 0..count {
            let byte = self.next_byte()?;
            if i == 0 && byte == 0 {
                return Err(DerError::Decode("length has leading zero byte".to_string()));
            }
            len = (len << 8) | byte as usize;
        }
        if len < 0x80 {
            return Err(DerError::Decode("long-form length used for short value".to_string()));
        }
        Ok(len)
    }

    /// Read one element with the expected tag and return its content bytes
    pub fn read_tlv(&mut self, expected_tag: u8) -> DerResult<&'a [u8]> {
        let tag = self.next_byte()?;
        if tag != expected_tag {
            return Err(DerError::Decode(format!(
                "expected tag 0x{:02x}, found 0x{:02x}",
                expected_tag, tag
            )));
        }

        let len = self.read_length()?;
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.data.len())
            .ok_or_else(|| DerError::Decode(format!("length {} exceeds input", len)))?;

        let content = &self.data[self.pos..end];
        self.pos = end;
        Ok(content)
    }

    pub fn read_sequence(&mut self) -> DerResult<DerReader<'a>> {
        self.read_tlv(TAG_SEQUENCE).map(DerReader::new)
    }

    /// Read a non-negative INTEGER, returning its magnitude without sign padding
    pub fn read_unsigned_integer(&mut self) -> DerResult<&'a [u8]> {
        let content = self.read_tlv(TAG_INTEGER)?;
        if content.is_empty() {
            return Err(DerError::Decode("empty INTEGER".to_string()));
        }
        if content[0] & 0x80 != 0 {
            return Err(DerError::Decode("negative INTEGER".to_string()));
        }
        if content.len() > 1 && content[0] == 0 && content[1] & 0x80 == 0 {
            return Err(DerError::Decode("non-minimal INTEGER".to_string()));
        }

        if content.len() > 1 && content[0] == 0 {
            Ok(&content[1..])
        } else {
            Ok(content)
        }
    }

    pub fn read_u64(&mut self) -> DerResult<u64> {
        let magnitude = self.read_unsigned_integer()?;
        if magnitude.len() > 8 {
            return Err(DerError::Decode("INTEGER does not fit in 64 bits".to_string()));
        }
        Ok(magnitude.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64))
    }

    pub fn read_u32(&mut self) -> DerResult<u32> {
        let value = self.read_u64()?;
        u32::try_from(value)
            .map_err(|_| DerError::Decode(format!("INTEGER {} does not fit in 32 bits", value)))
    }

    pub fn read_octet_string(&mut self) -> DerResult<&'a [u8]> {
        self.read_tlv(TAG_OCTET_STRING)
    }

    pub fn read_utf8_string(&mut self) -> DerResult<&'a str> {
        let content = self.read_tlv(TAG_UTF8_STRING)?;
        std::str::from_utf8(content).map_err(|e| DerError::Decode(format!("invalid UTF8String: {}", e)))
    }

    /// Read a BIT STRING that has no unused bits
    pub fn read_bit_string(&mut self) -> DerResult<&'a [u8]> {
        let content = self.read_tlv(TAG_BIT_STRING)?;
        match content.split_first() {
            Some((0, rest)) => Ok(rest),
            Some((unused, _)) => Err(DerError::Decode(format!(
                "BIT STRING with {} unused bits",
                unused
            ))),
            None => Err(DerError::Decode("empty BIT STRING".to_string())),
        }
    }

    pub fn read_oid(&mut self) -> DerResult<&'a [u8]> {
        self.read_tlv(TAG_OID)
    }

    pub fn read_integer_sequence(&mut self) -> DerResult<Vec<u32>> {
        let mut inner = self.read_sequence()?;
        let mut values = Vec::new();
        while !inner.is_empty() {
            values.push(inner.read_u32()?);
        }
        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_encoding() {
        assert_eq!(encode_u64(0), vec![0x02, 0x01, 0x00]);
        assert_eq!(encode_u64(127), vec![0x02, 0x01, 0x7f]);
        assert_eq!(encode_u64(128), vec![0x02, 0x02, 0x00, 0x80]);
        assert_eq!(
            encode_u64(0x8000002c),
            vec![0x02, 0x05, 0x00, 0x80, 0x00, 0x00, 0x2c]
        );
    }

    #[test]
    fn test_long_form_length() {
        let content = vec![0xab; 200];
        let encoded = encode_octet_string(&content);
        assert_eq!(&encoded[..3], &[0x04, 0x81, 200]);

        let mut reader = DerReader::new(&encoded);
        assert_eq!(reader.read_octet_string().unwrap(), content.as_slice());
        reader.finish().unwrap();
    }

    #[test]
    fn test_rejects_non_minimal_integer() {
        let mut reader = DerReader::new(&[0x02, 0x02, 0x00, 0x05]);
        assert!(matches!(reader.read_u64(), Err(DerError::Decode(_))));
    }

    #[test]
    fn test_rejects_negative_integer() {
        let mut reader = DerReader::new(&[0x02, 0x01, 0x80]);
        assert!(reader.read_unsigned_integer().is_err());
    }

    #[test]
    fn test_rejects_indefinite_and_padded_lengths() {
        assert!(DerReader::new(&[0x04, 0x80, 0x00, 0x00]).read_octet_string().is_err());
        assert!(DerReader::new(&[0x04, 0x81, 0x01, 0xaa]).read_octet_string().is_err());
        assert!(DerReader::new(&[0x04, 0x82, 0x00, 0x81]).read_octet_string().is_err());
    }

    #[test]
    fn test_rejects_truncated_input() {
        let mut reader = DerReader::new(&[0x04, 0x05, 0x01, 0x02]);
        assert!(reader.read_octet_string().is_err());
    }

    #[test]
    fn test_trailing_bytes_detected() {
        let data = [0x02, 0x01, 0x01, 0x00];
        let mut reader = DerReader::new(&data);
        reader.read_u64().unwrap();
        assert!(reader.finish().is_err());
    }

    #[test]
    fn test_integer_sequence() {
        let path = [0x8000002c, 0x80000000, 0x80000000, 0, 0];
        let encoded = encode_integer_sequence(&path);
        assert_eq!(
            hex::encode(&encoded),
            "301b0205008000002c0205008000000002050080000000020100020100"
        );
        let decoded = DerReader::new(&encoded).read_integer_sequence().unwrap();
        assert_eq!(decoded, path);
    }

    #[test]
    fn test_decode_error_maps_to_codec_kind() {
        let err: CustodyError = DerError::Decode("bad".into()).into();
        assert_eq!(err.code, ErrorCode::DerDecode);
        let err: CustodyError = DerError::Encode("bad".into()).into();
        assert_eq!(err.code, ErrorCode::DerEncode);
    }
}
