use std::str;

use crate::error::{Error, Result};
use crate::value::{Dictionary, Structure, Value};

use super::marker as m;

/// Decodes one value starting at `bytes[0]`. Returns the value and the
/// number of bytes consumed; trailing bytes are the caller's problem
/// (§4.2). Never reads past a declared size.
pub fn decode(bytes: &[u8]) -> Result<(Value, usize)> {
    let marker = *bytes.first().ok_or_else(|| malformed("empty input"))?;
    match marker {
        m::NULL => Ok((Value::Null, 1)),
        m::FALSE => Ok((Value::Boolean(false), 1)),
        m::TRUE => Ok((Value::Boolean(true), 1)),
        m::FLOAT_64 => {
            let bits = take::<8>(bytes, 1)?;
            Ok((Value::Float(f64::from_be_bytes(bits)), 9))
        }
        m::INT_8 => {
            let b = take::<1>(bytes, 1)?;
            Ok((Value::Integer(b[0] as i8 as i64), 2))
        }
        m::INT_16 => {
            let b = take::<2>(bytes, 1)?;
            Ok((Value::Integer(i16::from_be_bytes(b) as i64), 3))
        }
        m::INT_32 => {
            let b = take::<4>(bytes, 1)?;
            Ok((Value::Integer(i32::from_be_bytes(b) as i64), 5))
        }
        m::INT_64 => {
            let b = take::<8>(bytes, 1)?;
            Ok((Value::Integer(i64::from_be_bytes(b)), 9))
        }
        m::BYTES_8 => decode_bytes(bytes, 1, 1),
        m::BYTES_16 => decode_bytes(bytes, 2, 1),
        m::BYTES_32 => decode_bytes(bytes, 4, 1),
        m::STRING_8 => decode_string(bytes, 1, 1),
        m::STRING_16 => decode_string(bytes, 2, 1),
        m::STRING_32 => decode_string(bytes, 4, 1),
        m::LIST_8 => decode_list(bytes, 1, 1),
        m::LIST_16 => decode_list(bytes, 2, 1),
        m::LIST_32 => decode_list(bytes, 4, 1),
        m::DICT_8 => decode_dictionary(bytes, 1, 1),
        m::DICT_16 => decode_dictionary(bytes, 2, 1),
        m::DICT_32 => decode_dictionary(bytes, 4, 1),
        other => decode_tiny_or_structure(other, bytes),
    }
}

fn decode_tiny_or_structure(marker: u8, bytes: &[u8]) -> Result<(Value, usize)> {
    if marker <= 0x7F {
        return Ok((Value::Integer(marker as i64), 1));
    }
    if marker >= m::TINY_INT_NEGATIVE_MIN {
        return Ok((Value::Integer(marker as i8 as i64), 1));
    }
    let nibble = marker & m::TINY_MASK;
    let count = (marker & m::TINY_COUNT_MASK) as usize;
    match nibble {
        m::TINY_STRING_NIBBLE => decode_string_body(bytes, 1, count),
        m::TINY_LIST_NIBBLE => decode_list_body(bytes, 1, count),
        m::TINY_DICT_NIBBLE => decode_dictionary_body(bytes, 1, count),
        m::TINY_STRUCT_NIBBLE => decode_structure(bytes, count),
        _ => Err(malformed(&format!("unrecognized marker {marker:#04x}"))),
    }
}

fn take<const N: usize>(bytes: &[u8], offset: usize) -> Result<[u8; N]> {
    let end = offset + N;
    if bytes.len() < end {
        return Err(Error::TruncatedChunk { expected: end - bytes.len() });
    }
    let mut buf = [0u8; N];
    buf.copy_from_slice(&bytes[offset..end]);
    Ok(buf)
}

fn read_len(bytes: &[u8], offset: usize, width: usize) -> Result<usize> {
    if bytes.len() < offset + width {
        return Err(Error::TruncatedChunk { expected: offset + width - bytes.len() });
    }
    let len = match width {
        1 => bytes[offset] as usize,
        2 => u16::from_be_bytes([bytes[offset], bytes[offset + 1]]) as usize,
        4 => u32::from_be_bytes([bytes[offset], bytes[offset + 1], bytes[offset + 2], bytes[offset + 3]]) as usize,
        _ => unreachable!("unsupported length width"),
    };
    Ok(len)
}

fn decode_bytes(bytes: &[u8], len_width: usize, header_len: usize) -> Result<(Value, usize)> {
    let len = read_len(bytes, header_len, len_width)?;
    let start = header_len + len_width;
    let end = start + len;
    if bytes.len() < end {
        return Err(Error::TruncatedChunk { expected: end - bytes.len() });
    }
    Ok((Value::Bytes(bytes[start..end].to_vec()), end))
}

fn decode_string(bytes: &[u8], len_width: usize, header_len: usize) -> Result<(Value, usize)> {
    let len = read_len(bytes, header_len, len_width)?;
    decode_string_body(bytes, header_len + len_width, len)
}

fn decode_string_body(bytes: &[u8], start: usize, len: usize) -> Result<(Value, usize)> {
    let end = start + len;
    if bytes.len() < end {
        return Err(Error::TruncatedChunk { expected: end - bytes.len() });
    }
    let s = str::from_utf8(&bytes[start..end])
        .map_err(|e| malformed(&format!("string is not valid UTF-8: {e}")))?;
    Ok((Value::String(s.to_owned()), end))
}

fn decode_list(bytes: &[u8], len_width: usize, header_len: usize) -> Result<(Value, usize)> {
    let count = read_len(bytes, header_len, len_width)?;
    decode_list_body(bytes, header_len + len_width, count)
}

fn decode_list_body(bytes: &[u8], start: usize, count: usize) -> Result<(Value, usize)> {
    let mut items = Vec::with_capacity(count.min(4096));
    let mut cursor = start;
    for _ in 0..count {
        let (value, consumed) = decode(&bytes[cursor..])?;
        items.push(value);
        cursor += consumed;
    }
    Ok((Value::List(items), cursor))
}

fn decode_dictionary(bytes: &[u8], len_width: usize, header_len: usize) -> Result<(Value, usize)> {
    let count = read_len(bytes, header_len, len_width)?;
    decode_dictionary_body(bytes, header_len + len_width, count)
}

fn decode_dictionary_body(bytes: &[u8], start: usize, count: usize) -> Result<(Value, usize)> {
    let mut entries = Vec::with_capacity(count.min(4096));
    let mut cursor = start;
    for _ in 0..count {
        let (key, consumed) = decode(&bytes[cursor..])?;
        cursor += consumed;
        let key = match key {
            Value::String(s) => s,
            other => return Err(malformed(&format!("dictionary key must be a string, found {}", other.kind()))),
        };
        let (value, consumed) = decode(&bytes[cursor..])?;
        cursor += consumed;
        entries.push((key, value));
    }
    Ok((Value::Dictionary(Dictionary(entries)), cursor))
}

fn decode_structure(bytes: &[u8], field_count: usize) -> Result<(Value, usize)> {
    let tag = *bytes.get(1).ok_or(Error::TruncatedChunk { expected: 1 })?;
    let mut fields = Vec::with_capacity(field_count);
    let mut cursor = 2;
    for _ in 0..field_count {
        let (value, consumed) = decode(&bytes[cursor..])?;
        fields.push(value);
        cursor += consumed;
    }
    if fields.len() != field_count {
        return Err(malformed("structure field count mismatch"));
    }
    Ok((Value::Structure(Structure { tag, fields }), cursor))
}

fn malformed(msg: &str) -> Error {
    Error::MalformedPackStream(msg.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    fn roundtrip(v: Value) {
        let mut buf = BytesMut::new();
        super::super::encode::encode(&mut buf, &v).unwrap();
        let (decoded, consumed) = decode(&buf).unwrap();
        assert_eq!(consumed, buf.len());
        assert_eq!(decoded, v);
    }

    #[test]
    fn integer_round_trip_across_width_boundaries() {
        for i in [-(2i64.pow(40)), -17, -16, -1, 0, 127, 128, i32::MAX as i64 + 1, i64::MAX, i64::MIN] {
            roundtrip(Value::Integer(i));
        }
    }

    #[test]
    fn string_round_trip_sizes() {
        roundtrip(Value::String(String::new()));
        roundtrip(Value::String("a".repeat(15)));
        roundtrip(Value::String("a".repeat(16)));
        roundtrip(Value::String("a".repeat(300)));
    }

    #[test]
    fn unknown_tag_decodes_as_generic_structure() {
        let s = Structure { tag: 0x99, fields: vec![Value::Integer(1)] };
        roundtrip(Value::Structure(s));
    }

    #[test]
    fn truncated_input_is_an_error_not_a_panic() {
        assert!(decode(&[m::STRING_8, 0x05, b'h', b'i']).is_err());
    }

    #[test]
    fn non_utf8_string_is_malformed() {
        let mut buf = vec![m::TINY_STRING_NIBBLE | 2];
        buf.extend_from_slice(&[0xFF, 0xFE]);
        assert!(decode(&buf).is_err());
    }
}
