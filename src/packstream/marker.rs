//! PackStream marker byte constants (§4.2). The complete marker map that
//! determines decoding: every byte the wire can start a value with maps
//! to exactly one row here.

// Null
pub const NULL: u8 = 0xC0;

// Boolean
pub const FALSE: u8 = 0xC2;
pub const TRUE: u8 = 0xC3;

// Float (IEEE 754 double-precision, 8 big-endian bytes follow)
pub const FLOAT_64: u8 = 0xC1;

// Integer, beyond the TinyInt range
pub const INT_8: u8 = 0xC8;
pub const INT_16: u8 = 0xC9;
pub const INT_32: u8 = 0xCA;
pub const INT_64: u8 = 0xCB;

// TinyInt: single byte, range -16..=127.
// Positive: 0x00..=0x7F (0..127). Negative: 0xF0..=0xFF (-16..-1).
pub const TINY_INT_NEGATIVE_MIN: u8 = 0xF0;

// Bytes, with 8/16/32-bit big-endian length prefix
pub const BYTES_8: u8 = 0xCC;
pub const BYTES_16: u8 = 0xCD;
pub const BYTES_32: u8 = 0xCE;

// String. TinyString: 0x80..=0x8F (high nibble 0x8, low = byte length 0..15).
pub const STRING_8: u8 = 0xD0;
pub const STRING_16: u8 = 0xD1;
pub const STRING_32: u8 = 0xD2;

// List. TinyList: 0x90..=0x9F (high nibble 0x9, low = element count 0..15).
pub const LIST_8: u8 = 0xD4;
pub const LIST_16: u8 = 0xD5;
pub const LIST_32: u8 = 0xD6;

// Dictionary. TinyDict: 0xA0..=0xAF (high nibble 0xA, low = entry count 0..15).
pub const DICT_8: u8 = 0xD8;
pub const DICT_16: u8 = 0xD9;
pub const DICT_32: u8 = 0xDA;

// Structure. TinyStruct: 0xB0..=0xBF (high nibble 0xB, low = field count 0..15),
// followed by a one-byte tag.

pub const TINY_STRING_NIBBLE: u8 = 0x80;
pub const TINY_LIST_NIBBLE: u8 = 0x90;
pub const TINY_DICT_NIBBLE: u8 = 0xA0;
pub const TINY_STRUCT_NIBBLE: u8 = 0xB0;

pub const TINY_MASK: u8 = 0xF0;
pub const TINY_COUNT_MASK: u8 = 0x0F;
