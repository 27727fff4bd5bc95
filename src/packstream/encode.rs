use bytes::{BufMut, BytesMut};

use crate::error::{Error, Result};
use crate::value::{Structure, Value};

use super::marker as m;

/// Encodes `value` onto the end of `buf`, picking the narrowest marker
/// whose declared size fits the value (§4.2's "minimal encoding" rule).
pub fn encode(buf: &mut BytesMut, value: &Value) -> Result<()> {
    match value {
        Value::Null => buf.put_u8(m::NULL),
        Value::Boolean(b) => buf.put_u8(if *b { m::TRUE } else { m::FALSE }),
        Value::Integer(i) => encode_integer(buf, *i),
        Value::Float(f) => {
            buf.put_u8(m::FLOAT_64);
            buf.put_f64(*f);
        }
        Value::Bytes(bytes) => encode_bytes(buf, bytes)?,
        Value::String(s) => encode_string(buf, s)?,
        Value::List(items) => encode_list(buf, items)?,
        Value::Dictionary(dict) => encode_dictionary(buf, dict)?,
        Value::Structure(s) => encode_structure(buf, s)?,
    }
    Ok(())
}

fn encode_integer(buf: &mut BytesMut, i: i64) {
    if (-16..=127).contains(&i) {
        buf.put_u8(i as i8 as u8);
    } else if (i8::MIN as i64..=i8::MAX as i64).contains(&i) {
        buf.put_u8(m::INT_8);
        buf.put_i8(i as i8);
    } else if (i16::MIN as i64..=i16::MAX as i64).contains(&i) {
        buf.put_u8(m::INT_16);
        buf.put_i16(i as i16);
    } else if (i32::MIN as i64..=i32::MAX as i64).contains(&i) {
        buf.put_u8(m::INT_32);
        buf.put_i32(i as i32);
    } else {
        buf.put_u8(m::INT_64);
        buf.put_i64(i);
    }
}

fn encode_string(buf: &mut BytesMut, s: &str) -> Result<()> {
    let bytes = s.as_bytes();
    let len = bytes.len();
    if len > u32::MAX as usize {
        return Err(Error::InvalidMessage(format!("string of {len} bytes exceeds PackStream limit")));
    }
    if len <= 15 {
        buf.put_u8(m::TINY_STRING_NIBBLE | len as u8);
    } else if len <= u8::MAX as usize {
        buf.put_u8(m::STRING_8);
        buf.put_u8(len as u8);
    } else if len <= u16::MAX as usize {
        buf.put_u8(m::STRING_16);
        buf.put_u16(len as u16);
    } else {
        buf.put_u8(m::STRING_32);
        buf.put_u32(len as u32);
    }
    buf.put_slice(bytes);
    Ok(())
}

fn encode_bytes(buf: &mut BytesMut, payload: &[u8]) -> Result<()> {
    let len = payload.len();
    if len > u32::MAX as usize {
        return Err(Error::InvalidMessage(format!("byte string of {len} bytes exceeds PackStream limit")));
    }
    if len <= u8::MAX as usize {
        buf.put_u8(m::BYTES_8);
        buf.put_u8(len as u8);
    } else if len <= u16::MAX as usize {
        buf.put_u8(m::BYTES_16);
        buf.put_u16(len as u16);
    } else {
        buf.put_u8(m::BYTES_32);
        buf.put_u32(len as u32);
    }
    buf.put_slice(payload);
    Ok(())
}

fn encode_list(buf: &mut BytesMut, items: &[Value]) -> Result<()> {
    let len = items.len();
    if len > u32::MAX as usize {
        return Err(Error::InvalidMessage(format!("list of {len} elements exceeds PackStream limit")));
    }
    if len <= 15 {
        buf.put_u8(m::TINY_LIST_NIBBLE | len as u8);
    } else if len <= u8::MAX as usize {
        buf.put_u8(m::LIST_8);
        buf.put_u8(len as u8);
    } else if len <= u16::MAX as usize {
        buf.put_u8(m::LIST_16);
        buf.put_u16(len as u16);
    } else {
        buf.put_u8(m::LIST_32);
        buf.put_u32(len as u32);
    }
    for item in items {
        encode(buf, item)?;
    }
    Ok(())
}

fn encode_dictionary(buf: &mut BytesMut, dict: &crate::value::Dictionary) -> Result<()> {
    let len = dict.len();
    if len > u32::MAX as usize {
        return Err(Error::InvalidMessage(format!("dictionary of {len} entries exceeds PackStream limit")));
    }
    if len <= 15 {
        buf.put_u8(m::TINY_DICT_NIBBLE | len as u8);
    } else if len <= u8::MAX as usize {
        buf.put_u8(m::DICT_8);
        buf.put_u8(len as u8);
    } else if len <= u16::MAX as usize {
        buf.put_u8(m::DICT_16);
        buf.put_u16(len as u16);
    } else {
        buf.put_u8(m::DICT_32);
        buf.put_u32(len as u32);
    }
    for (key, value) in dict.iter() {
        encode_string(buf, key)?;
        encode(buf, value)?;
    }
    Ok(())
}

fn encode_structure(buf: &mut BytesMut, s: &Structure) -> Result<()> {
    if s.fields.len() > 15 {
        return Err(Error::InvalidMessage(format!(
            "structure tag {:#04x} has {} fields, max is 15",
            s.tag,
            s.fields.len()
        )));
    }
    buf.put_u8(m::TINY_STRUCT_NIBBLE | s.fields.len() as u8);
    buf.put_u8(s.tag);
    for field in &s.fields {
        encode(buf, field)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enc(v: Value) -> Vec<u8> {
        let mut buf = BytesMut::new();
        encode(&mut buf, &v).unwrap();
        buf.to_vec()
    }

    #[test]
    fn minimal_integer_encodings() {
        assert_eq!(enc(Value::Integer(0)), vec![0x00]);
        assert_eq!(enc(Value::Integer(-1)), vec![0xFF]);
        assert_eq!(enc(Value::Integer(-16)), vec![0xF0]);
        assert_eq!(enc(Value::Integer(-17)), vec![0xC8, 0xEF]);
        assert_eq!(enc(Value::Integer(127)), vec![0x7F]);
        assert_eq!(enc(Value::Integer(128)), vec![0xC9, 0x00, 0x80]);
    }

    #[test]
    fn empty_commit_structure() {
        let s = Structure::new(0x12, vec![]).unwrap();
        assert_eq!(enc(Value::Structure(s)), vec![0xB0, 0x12]);
    }

    #[test]
    fn tiny_string_marker() {
        assert_eq!(enc(Value::String("x/1".into())), vec![0x83, b'x', b'/', b'1']);
    }
}
