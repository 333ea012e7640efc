//! Byte encodings for stored rows and index keys.
//!
//! Rows are stored as a tag-prefixed value list in schema order. Index keys
//! use an order-preserving encoding so that sled's byte order matches
//! `Constant` order.

use crate::error::Error;
use crate::query::Constant;

/// Type tag for encoded values.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ValueTag {
    Int = 1,
    Str = 2,
}

impl TryFrom<u8> for ValueTag {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(ValueTag::Int),
            2 => Ok(ValueTag::Str),
            _ => Err(Error::InvalidData(format!("Unknown value tag: {}", value))),
        }
    }
}

/// Encode a row of values.
///
/// Format:
/// - Value count (2 bytes, little-endian)
/// - For each value: tag (1 byte), then 4 bytes for an int, or a 4-byte
///   length followed by UTF-8 bytes for a string
pub fn encode_row(values: &[Constant]) -> Result<Vec<u8>, Error> {
    if values.len() > u16::MAX as usize {
        return Err(Error::InvalidData("Too many fields in row".into()));
    }
    let mut buf = Vec::with_capacity(2 + values.len() * 8);
    buf.extend_from_slice(&(values.len() as u16).to_le_bytes());

    for value in values {
        match value {
            Constant::Int(n) => {
                buf.push(ValueTag::Int as u8);
                buf.extend_from_slice(&n.to_le_bytes());
            }
            Constant::Str(s) => {
                buf.push(ValueTag::Str as u8);
                let bytes = s.as_bytes();
                if bytes.len() > u32::MAX as usize {
                    return Err(Error::InvalidData("String too long".into()));
                }
                buf.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
                buf.extend_from_slice(bytes);
            }
        }
    }

    Ok(buf)
}

/// Decode a row produced by [`encode_row`].
pub fn decode_row(data: &[u8]) -> Result<Vec<Constant>, Error> {
    let count = u16::from_le_bytes(read_array(data, 0)?) as usize;
    let mut cursor = 2;
    let mut values = Vec::with_capacity(count);

    for _ in 0..count {
        let tag = *data
            .get(cursor)
            .ok_or_else(|| Error::InvalidData("Data too short for value tag".into()))?;
        cursor += 1;

        match ValueTag::try_from(tag)? {
            ValueTag::Int => {
                values.push(Constant::Int(i32::from_le_bytes(read_array(data, cursor)?)));
                cursor += 4;
            }
            ValueTag::Str => {
                let len = u32::from_le_bytes(read_array(data, cursor)?) as usize;
                cursor += 4;
                let bytes = data
                    .get(cursor..cursor + len)
                    .ok_or_else(|| Error::InvalidData("Data too short for string".into()))?;
                let s = std::str::from_utf8(bytes)
                    .map_err(|_| Error::InvalidData("Invalid UTF-8 in string value".into()))?;
                values.push(Constant::Str(s.to_string()));
                cursor += len;
            }
        }
    }

    Ok(values)
}

fn read_array<const N: usize>(data: &[u8], at: usize) -> Result<[u8; N], Error> {
    data.get(at..at + N)
        .and_then(|slice| slice.try_into().ok())
        .ok_or_else(|| Error::InvalidData("Data too short".into()))
}

/// Encode a value so that byte order matches value order.
///
/// - Integers: tag, then big-endian with the sign bit flipped
/// - Strings: tag, UTF-8 bytes, then a 0x00 terminator so no key is a
///   prefix of a longer one
pub fn encode_sortable(value: &Constant, buf: &mut Vec<u8>) {
    match value {
        Constant::Int(n) => {
            buf.push(ValueTag::Int as u8);
            let sortable = (*n as u32) ^ 0x8000_0000;
            buf.extend_from_slice(&sortable.to_be_bytes());
        }
        Constant::Str(s) => {
            buf.push(ValueTag::Str as u8);
            buf.extend_from_slice(s.as_bytes());
            buf.push(0x00);
        }
    }
}

/// Build an index entry key: sortable value followed by the row id.
pub fn index_entry_key(value: &Constant, row_id: u64) -> Vec<u8> {
    let mut key = Vec::with_capacity(16);
    encode_sortable(value, &mut key);
    key.extend_from_slice(&row_id.to_be_bytes());
    key
}

/// Extract the row id from an index entry key.
pub fn row_id_from_index_key(key: &[u8]) -> Result<u64, Error> {
    if key.len() < 8 {
        return Err(Error::InvalidData("Index key too short".into()));
    }
    Ok(u64::from_be_bytes(read_array(key, key.len() - 8)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_codec() {
        let row = vec![
            Constant::Int(-7),
            Constant::from("Computer Science"),
            Constant::from(""),
            Constant::Int(2023),
        ];
        let bytes = encode_row(&row).unwrap();
        assert_eq!(decode_row(&bytes).unwrap(), row);
    }

    #[test]
    fn test_decode_truncated() {
        let bytes = encode_row(&[Constant::from("abc")]).unwrap();
        assert!(decode_row(&bytes[..bytes.len() - 1]).is_err());
        assert!(decode_row(&[]).is_err());
    }

    #[test]
    fn test_decode_unknown_tag() {
        let bytes = vec![1, 0, 9, 0, 0, 0, 0];
        assert!(matches!(decode_row(&bytes), Err(Error::InvalidData(_))));
    }

    #[test]
    fn test_sortable_ints() {
        let values = [i32::MIN, -100, -1, 0, 1, 42, i32::MAX];
        let keys: Vec<Vec<u8>> = values
            .iter()
            .map(|n| {
                let mut buf = Vec::new();
                encode_sortable(&Constant::Int(*n), &mut buf);
                buf
            })
            .collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
    }

    #[test]
    fn test_string_key_not_prefix() {
        let mut short = Vec::new();
        encode_sortable(&Constant::from("a"), &mut short);
        let long = index_entry_key(&Constant::from("ab"), 3);
        assert!(!long.starts_with(&short));
    }

    #[test]
    fn test_index_key_row_id() {
        let key = index_entry_key(&Constant::Int(5), 1234);
        assert_eq!(row_id_from_index_key(&key).unwrap(), 1234);
    }
}
