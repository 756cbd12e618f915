//! The length-prefixed tag-value container format ONNX model files use.
//! A minimal hand-rolled decoder over an immutable byte slice — no
//! generated schema, no external protobuf crate.

use crate::error::{InferError, InferResult};

/// Wire types as encoded in the low three bits of a tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireType {
    Varint,
    Fixed64,
    LengthDelimited,
    Fixed32,
}

impl WireType {
    fn from_u64(v: u64) -> Option<Self> {
        match v {
            0 => Some(WireType::Varint),
            1 => Some(WireType::Fixed64),
            2 => Some(WireType::LengthDelimited),
            5 => Some(WireType::Fixed32),
            _ => None,
        }
    }
}

/// A cursor over a borrowed byte slice. Every read either advances `pos`
/// and returns a value, or fails with a `ParseError` carrying the offset
/// the read started at.
pub struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn has_remaining(&self) -> bool {
        self.pos < self.data.len()
    }

    fn fail(&self, at: usize, what: impl Into<String>) -> InferError {
        InferError::ParseError {
            offset: at,
            what: what.into(),
        }
    }

    /// Base-128 little-endian varint: 7 payload bits per byte, MSB is the
    /// continuation bit.
    pub fn read_varint(&mut self) -> InferResult<u64> {
        let start = self.pos;
        let mut value: u64 = 0;
        let mut shift = 0u32;
        loop {
            if self.pos >= self.data.len() {
                return Err(self.fail(start, "truncated varint"));
            }
            let byte = self.data[self.pos];
            self.pos += 1;
            value |= ((byte & 0x7F) as u64) << shift;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
            shift += 7;
            if shift >= 64 {
                return Err(self.fail(start, "varint too long"));
            }
        }
    }

    /// A tag is a varint whose low three bits are the wire type and whose
    /// remaining upper bits are the field number.
    pub fn read_tag(&mut self) -> InferResult<(u32, WireType)> {
        let start = self.pos;
        let key = self.read_varint()?;
        let field = (key >> 3) as u32;
        let wire = WireType::from_u64(key & 0x7)
            .ok_or_else(|| self.fail(start, format!("unknown wire type {}", key & 0x7)))?;
        Ok((field, wire))
    }

    pub fn read_length_delimited(&mut self) -> InferResult<&'a [u8]> {
        let start = self.pos;
        let len = self.read_varint()? as usize;
        if self.pos + len > self.data.len() {
            return Err(self.fail(start, "length-delimited field runs past end of buffer"));
        }
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    pub fn read_fixed32(&mut self) -> InferResult<[u8; 4]> {
        let start = self.pos;
        if self.pos + 4 > self.data.len() {
            return Err(self.fail(start, "truncated fixed32"));
        }
        let mut buf = [0u8; 4];
        buf.copy_from_slice(&self.data[self.pos..self.pos + 4]);
        self.pos += 4;
        Ok(buf)
    }

    pub fn read_fixed64(&mut self) -> InferResult<[u8; 8]> {
        let start = self.pos;
        if self.pos + 8 > self.data.len() {
            return Err(self.fail(start, "truncated fixed64"));
        }
        let mut buf = [0u8; 8];
        buf.copy_from_slice(&self.data[self.pos..self.pos + 8]);
        self.pos += 8;
        Ok(buf)
    }

    pub fn read_f32(&mut self) -> InferResult<f32> {
        Ok(f32::from_le_bytes(self.read_fixed32()?))
    }

    /// Consumes one value of the given wire type without interpreting it.
    /// Required for forward compatibility: fields this parser doesn't
    /// recognize must be skipped, never fail the parse.
    pub fn skip(&mut self, wire: WireType) -> InferResult<()> {
        match wire {
            WireType::Varint => {
                self.read_varint()?;
            }
            WireType::LengthDelimited => {
                self.read_length_delimited()?;
            }
            WireType::Fixed32 => {
                self.read_fixed32()?;
            }
            WireType::Fixed64 => {
                self.read_fixed64()?;
            }
        }
        Ok(())
    }

}

/// Reads a little-endian float32 vector from either encoding a repeated
/// scalar field may use: packed (one length-delimited payload of
/// concatenated values) or non-packed (the same tag repeated once per
/// value). Exporters differ on which they choose, so both must work.
pub fn read_packed_or_single_f32(reader: &mut Reader, wire: WireType, out: &mut Vec<f32>) -> InferResult<()> {
    match wire {
        WireType::Fixed32 => {
            out.push(reader.read_f32()?);
        }
        WireType::LengthDelimited => {
            let bytes = reader.read_length_delimited()?;
            if bytes.len() % 4 != 0 {
                return Err(InferError::ParseError {
                    offset: reader.pos(),
                    what: "packed float32 payload length not a multiple of 4".to_string(),
                });
            }
            for chunk in bytes.chunks_exact(4) {
                let mut b = [0u8; 4];
                b.copy_from_slice(chunk);
                out.push(f32::from_le_bytes(b));
            }
        }
        other => {
            return Err(InferError::ParseError {
                offset: reader.pos(),
                what: format!("unexpected wire type {other:?} for float32 field"),
            });
        }
    }
    Ok(())
}

/// Same duality as [`read_packed_or_single_f32`], for repeated int64 fields
/// (tensor dims, `ints` attributes).
pub fn read_packed_or_single_i64(reader: &mut Reader, wire: WireType, out: &mut Vec<i64>) -> InferResult<()> {
    match wire {
        WireType::Varint => {
            out.push(reader.read_varint()? as i64);
        }
        WireType::LengthDelimited => {
            let bytes = reader.read_length_delimited()?;
            let mut sub = Reader::new(bytes);
            while sub.has_remaining() {
                out.push(sub.read_varint()? as i64);
            }
        }
        other => {
            return Err(InferError::ParseError {
                offset: reader.pos(),
                what: format!("unexpected wire type {other:?} for int64 field"),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn varint_decodes_multibyte() {
        let mut r = Reader::new(&[0xAC, 0x02]);
        assert_eq!(r.read_varint().unwrap(), 300);
    }

    #[test]
    fn tag_decodes_field_number_and_wire_type() {
        let mut r = Reader::new(&[0x0A]);
        let (field, wire) = r.read_tag().unwrap();
        assert_eq!(field, 1);
        assert_eq!(wire, WireType::LengthDelimited);
    }

    #[test]
    fn varint_single_byte_roundtrips() {
        let mut r = Reader::new(&[0x01]);
        assert_eq!(r.read_varint().unwrap(), 1);
    }

    #[test]
    fn truncated_varint_is_parse_error() {
        let mut r = Reader::new(&[0x80]);
        let err = r.read_varint().unwrap_err();
        assert!(matches!(err, InferError::ParseError { .. }));
    }

    #[test]
    fn length_delimited_slices_correctly() {
        let mut r = Reader::new(&[0x03, b'a', b'b', b'c', 0xFF]);
        let bytes = r.read_length_delimited().unwrap();
        assert_eq!(bytes, b"abc");
        assert_eq!(r.pos(), 4);
    }

    #[test]
    fn skip_advances_past_unknown_fields_of_every_wire_type() {
        // varint(1) + fixed32(4 bytes) + length-delimited(2 bytes) + fixed64(8 bytes)
        let mut data = vec![0x01];
        data.extend_from_slice(&[0u8; 4]);
        data.push(0x02);
        data.extend_from_slice(&[0u8; 2]);
        data.extend_from_slice(&[0u8; 8]);
        let mut r = Reader::new(&data);
        r.skip(WireType::Varint).unwrap();
        r.skip(WireType::Fixed32).unwrap();
        r.skip(WireType::LengthDelimited).unwrap();
        r.skip(WireType::Fixed64).unwrap();
        assert!(!r.has_remaining());
    }

    #[test]
    fn packed_and_single_f32_both_decode() {
        let mut out = Vec::new();
        // Packed: length-delimited payload of two f32s.
        let mut packed = vec![8u8];
        packed.extend_from_slice(&1.5f32.to_le_bytes());
        packed.extend_from_slice(&2.5f32.to_le_bytes());
        let mut r = Reader::new(&packed);
        read_packed_or_single_f32(&mut r, WireType::LengthDelimited, &mut out).unwrap();
        assert_eq!(out, vec![1.5, 2.5]);

        // Non-packed: a single fixed32 value.
        let mut single = Vec::new();
        single.extend_from_slice(&3.5f32.to_le_bytes());
        let mut r2 = Reader::new(&single);
        read_packed_or_single_f32(&mut r2, WireType::Fixed32, &mut out).unwrap();
        assert_eq!(out, vec![1.5, 2.5, 3.5]);
    }

    #[test]
    fn packed_and_single_i64_both_decode() {
        let mut out = Vec::new();
        // Packed: two varints in a length-delimited payload.
        let mut r = Reader::new(&[0x02, 0x01, 0x02]);
        let (_field, wire) = (0u32, WireType::LengthDelimited);
        let _ = _field;
        read_packed_or_single_i64(&mut r, wire, &mut out).unwrap();
        assert_eq!(out, vec![1, 2]);

        let mut r2 = Reader::new(&[0x03]);
        read_packed_or_single_i64(&mut r2, WireType::Varint, &mut out).unwrap();
        assert_eq!(out, vec![1, 2, 3]);
    }
}
