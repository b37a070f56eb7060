//! The binary message codec (C2, binary leg).
//!
//! Every value is preceded by a one-byte tag: the low nibble names the
//! variant, the high nibble's meaning depends on the variant (a byte-width
//! selector for Integer/String/Blob/Array/Map/Set, a run length for Double,
//! the packed boolean for Logical, or a fixed constant for Date/Time/
//! Address). Integers are written in the minimum number of bytes — 1, 2, 4,
//! or 8 — that preserves their signed value, big-endian; this matches the
//! two worked examples in the wire-format notes (`42` → tag `0x01`, payload
//! `0x2A`; `-129` → two payload bytes `0xFF 0x7F`).
//!
//! A [`Message`] wraps one or more top-level values between a fixed header
//! and trailer byte. Both markers use type nibble `0xE`, which is never
//! assigned to a real variant, so a reader can always tell a marker byte
//! from the start of another value.

use std::sync::Arc;

use nimo_value::{Array, Map, NimoAddress, NimoDate, NimoTime, Set, Shared, Value};

use crate::flaw::{Extraction, Flaw};

const TYPE_LOGICAL: u8 = 0;
const TYPE_INTEGER: u8 = 1;
const TYPE_DOUBLE: u8 = 2;
const TYPE_STRING: u8 = 3;
const TYPE_BLOB: u8 = 4;
const TYPE_DATE: u8 = 5;
const TYPE_TIME: u8 = 6;
const TYPE_ADDRESS: u8 = 7;
const TYPE_ARRAY: u8 = 8;
const TYPE_MAP: u8 = 9;
const TYPE_SET: u8 = 10;
const TYPE_MARKER: u8 = 0x0E;

const HEADER_BYTE: u8 = 0x40 | TYPE_MARKER;
const TRAILER_BYTE: u8 = 0x80 | TYPE_MARKER;

fn tag(width_nibble: u8, type_nibble: u8) -> u8 {
    (width_nibble << 4) | type_nibble
}

/// Smallest byte width in {1, 2, 4, 8} that preserves `v` under signed
/// two's-complement interpretation, returned as a width *code* (`0..=3`,
/// where the actual byte count is `1 << code`).
fn signed_width_code(v: i64) -> u8 {
    if v >= i8::MIN as i64 && v <= i8::MAX as i64 {
        0
    } else if v >= i16::MIN as i64 && v <= i16::MAX as i64 {
        1
    } else if v >= i32::MIN as i64 && v <= i32::MAX as i64 {
        2
    } else {
        3
    }
}

fn unsigned_width_code(v: u64) -> u8 {
    if v <= u8::MAX as u64 {
        0
    } else if v <= u16::MAX as u64 {
        1
    } else if v <= u32::MAX as u64 {
        2
    } else {
        3
    }
}

fn width_bytes(code: u8) -> usize {
    1usize << code
}

fn write_signed(buf: &mut Vec<u8>, v: i64, code: u8) {
    let n = width_bytes(code);
    let bytes = v.to_be_bytes();
    buf.extend_from_slice(&bytes[8 - n..]);
}

fn read_signed(bytes: &[u8], cursor: &mut usize, code: u8) -> Result<i64, Flaw> {
    let n = width_bytes(code);
    if *cursor + n > bytes.len() {
        return Err(Flaw::new("truncated integer payload"));
    }
    let slice = &bytes[*cursor..*cursor + n];
    *cursor += n;
    let mut full = [0u8; 8];
    let fill = if slice[0] & 0x80 != 0 { 0xFF } else { 0x00 };
    full.fill(fill);
    full[8 - n..].copy_from_slice(slice);
    Ok(i64::from_be_bytes(full))
}

fn write_unsigned(buf: &mut Vec<u8>, v: u64, code: u8) {
    let n = width_bytes(code);
    let bytes = v.to_be_bytes();
    buf.extend_from_slice(&bytes[8 - n..]);
}

fn read_unsigned(bytes: &[u8], cursor: &mut usize, code: u8) -> Result<u64, Flaw> {
    let n = width_bytes(code);
    if *cursor + n > bytes.len() {
        return Err(Flaw::new("truncated length payload"));
    }
    let slice = &bytes[*cursor..*cursor + n];
    *cursor += n;
    let mut full = [0u8; 8];
    full[8 - n..].copy_from_slice(slice);
    Ok(u64::from_be_bytes(full))
}

/// One element of an array as it will actually be written on the wire: a
/// run of consecutive `Double` children collapses into a single slot, since
/// the decoder expects a double-run header to occupy one counted slot but
/// expand into several elements on the way back out.
enum ArraySlot<'a> {
    Single(&'a Shared),
    DoubleRun(Vec<f64>),
}

/// Groups consecutive `Double` elements into runs of up to 16 (the header's
/// run-length nibble only has 4 bits), leaving every other element as its
/// own slot.
fn group_double_runs<'a>(elements: &[&'a Shared]) -> Vec<ArraySlot<'a>> {
    let mut slots = Vec::new();
    let mut i = 0;
    while i < elements.len() {
        if let Value::Double(first) = elements[i].as_ref() {
            let mut run = vec![*first];
            let mut j = i + 1;
            while run.len() < 16 {
                match elements.get(j).map(|v| v.as_ref()) {
                    Some(Value::Double(d)) => {
                        run.push(*d);
                        j += 1;
                    }
                    _ => break,
                }
            }
            slots.push(ArraySlot::DoubleRun(run));
            i = j;
        } else {
            slots.push(ArraySlot::Single(elements[i]));
            i += 1;
        }
    }
    slots
}

/// Reads `count` consecutive big-endian doubles starting at `*cursor`,
/// advancing it past all of them. Shared by the standalone `TYPE_DOUBLE` arm
/// of [`read_value`] and the array loop's run-splicing peek, since both read
/// the identical on-wire run body — only what happens to the result differs.
fn read_doubles(bytes: &[u8], cursor: &mut usize, count: usize) -> Extraction<Vec<f64>> {
    let mut doubles = Vec::with_capacity(count);
    for _ in 0..count {
        if *cursor + 8 > bytes.len() {
            return Extraction::Incomplete;
        }
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&bytes[*cursor..*cursor + 8]);
        *cursor += 8;
        doubles.push(f64::from_be_bytes(raw));
    }
    Extraction::Value(doubles)
}

fn write_double_run(buf: &mut Vec<u8>, run: &[f64]) {
    let code = (run.len() - 1) as u8;
    buf.push(tag(code, TYPE_DOUBLE));
    for d in run {
        buf.extend_from_slice(&d.to_be_bytes());
    }
}

/// Writes one value (and, recursively, its children) to `buf`.
pub fn write_value(buf: &mut Vec<u8>, value: &Value) {
    match value {
        Value::Logical(b) => {
            buf.push(tag(if *b { 1 } else { 0 }, TYPE_LOGICAL));
        }
        Value::Integer(i) => {
            let code = signed_width_code(*i);
            buf.push(tag(code, TYPE_INTEGER));
            write_signed(buf, *i, code);
        }
        Value::Double(d) => {
            buf.push(tag(0, TYPE_DOUBLE));
            buf.extend_from_slice(&d.to_be_bytes());
        }
        Value::String(s) => {
            let bytes = s.as_bytes();
            let code = unsigned_width_code(bytes.len() as u64);
            buf.push(tag(code, TYPE_STRING));
            write_unsigned(buf, bytes.len() as u64, code);
            buf.extend_from_slice(bytes);
        }
        Value::Blob(b) => {
            let code = unsigned_width_code(b.len() as u64);
            buf.push(tag(code, TYPE_BLOB));
            write_unsigned(buf, b.len() as u64, code);
            buf.extend_from_slice(b);
        }
        Value::Date(d) => {
            buf.push(tag(2, TYPE_DATE));
            buf.extend_from_slice(&d.pack().to_be_bytes());
        }
        Value::Time(t) => {
            buf.push(tag(2, TYPE_TIME));
            buf.extend_from_slice(&t.pack().to_be_bytes());
        }
        Value::Address(a) => {
            buf.push(tag(2, TYPE_ADDRESS));
            buf.extend_from_slice(&a.0.to_be_bytes());
        }
        Value::Array(a) => {
            let elements: Vec<&Shared> = a.iter().collect();
            let slots = group_double_runs(&elements);
            let code = unsigned_width_code(slots.len() as u64);
            buf.push(tag(code, TYPE_ARRAY));
            write_unsigned(buf, slots.len() as u64, code);
            for slot in slots {
                match slot {
                    ArraySlot::Single(v) => write_value(buf, v),
                    ArraySlot::DoubleRun(run) => write_double_run(buf, &run),
                }
            }
        }
        Value::Set(s) => {
            let code = unsigned_width_code(s.len() as u64);
            buf.push(tag(code, TYPE_SET));
            write_unsigned(buf, s.len() as u64, code);
            for member in s.iter() {
                write_value(buf, member);
            }
        }
        Value::Map(m) => {
            let code = unsigned_width_code(m.len() as u64);
            buf.push(tag(code, TYPE_MAP));
            write_unsigned(buf, m.len() as u64, code);
            for (k, v) in m.iter() {
                write_value(buf, k);
                write_value(buf, v);
            }
        }
    }
}

/// Reads exactly one value starting at `*cursor`, advancing it past the
/// value's tag and payload.
pub fn read_value(bytes: &[u8], cursor: &mut usize) -> Result<Extraction<Value>, Flaw> {
    if *cursor >= bytes.len() {
        return Ok(Extraction::Incomplete);
    }
    let tag_byte = bytes[*cursor];
    let width_nibble = tag_byte >> 4;
    let type_nibble = tag_byte & 0x0F;
    *cursor += 1;

    let value = match type_nibble {
        TYPE_LOGICAL => Value::Logical(width_nibble != 0),
        TYPE_INTEGER => Value::Integer(read_signed(bytes, cursor, width_nibble & 0x3)?),
        TYPE_DOUBLE => {
            let doubles = match read_doubles(bytes, cursor, (width_nibble as usize) + 1) {
                Extraction::Value(v) => v,
                Extraction::Flawed(f) => return Ok(Extraction::Flawed(f)),
                Extraction::Incomplete => return Ok(Extraction::Incomplete),
            };
            // A run length above one only ever occurs as the counted slot of
            // a parent array (see the TYPE_ARRAY arm below, which peeks the
            // tag and splices the run itself before calling here); seeing one
            // as a standalone value — a lone Map value, Set member, or
            // top-level value — means the data is corrupt, since there is no
            // parent array to receive the extra elements.
            if doubles.len() != 1 {
                return Ok(Extraction::Flawed(Flaw::new(
                    "double run with no parent array to receive it",
                )));
            }
            Value::Double(doubles[0])
        }
        TYPE_STRING => {
            let len = read_unsigned(bytes, cursor, width_nibble & 0x3)? as usize;
            if *cursor + len > bytes.len() {
                return Ok(Extraction::Incomplete);
            }
            let slice = &bytes[*cursor..*cursor + len];
            *cursor += len;
            match std::str::from_utf8(slice) {
                Ok(s) => Value::String(s.to_string()),
                Err(_) => return Ok(Extraction::Flawed(Flaw::new("string payload is not valid UTF-8"))),
            }
        }
        TYPE_BLOB => {
            let len = read_unsigned(bytes, cursor, width_nibble & 0x3)? as usize;
            if *cursor + len > bytes.len() {
                return Ok(Extraction::Incomplete);
            }
            let slice = bytes[*cursor..*cursor + len].to_vec();
            *cursor += len;
            Value::Blob(slice)
        }
        TYPE_DATE => {
            if *cursor + 4 > bytes.len() {
                return Ok(Extraction::Incomplete);
            }
            let mut raw = [0u8; 4];
            raw.copy_from_slice(&bytes[*cursor..*cursor + 4]);
            *cursor += 4;
            Value::Date(NimoDate::unpack(u32::from_be_bytes(raw)))
        }
        TYPE_TIME => {
            if *cursor + 4 > bytes.len() {
                return Ok(Extraction::Incomplete);
            }
            let mut raw = [0u8; 4];
            raw.copy_from_slice(&bytes[*cursor..*cursor + 4]);
            *cursor += 4;
            Value::Time(NimoTime::unpack(u32::from_be_bytes(raw)))
        }
        TYPE_ADDRESS => {
            if *cursor + 4 > bytes.len() {
                return Ok(Extraction::Incomplete);
            }
            let mut raw = [0u8; 4];
            raw.copy_from_slice(&bytes[*cursor..*cursor + 4]);
            *cursor += 4;
            Value::Address(NimoAddress(u32::from_be_bytes(raw)))
        }
        TYPE_ARRAY => {
            let count = read_unsigned(bytes, cursor, width_nibble & 0x3)? as usize;
            let mut array = Array::new();
            for _ in 0..count {
                if *cursor >= bytes.len() {
                    return Ok(Extraction::Incomplete);
                }
                // A double run occupies one counted slot but expands to
                // several actual elements; peek the child's tag so only a
                // genuine run is spliced, leaving a real nested array (same
                // `Value::Array` shape as `read_value`'s ordinary result)
                // intact as a single element.
                let child_tag = bytes[*cursor];
                if child_tag & 0x0F == TYPE_DOUBLE {
                    let run_len = ((child_tag >> 4) as usize) + 1;
                    *cursor += 1;
                    match read_doubles(bytes, cursor, run_len) {
                        Extraction::Value(doubles) => {
                            for d in doubles {
                                array.push(Arc::new(Value::Double(d)));
                            }
                        }
                        Extraction::Flawed(f) => return Ok(Extraction::Flawed(f)),
                        Extraction::Incomplete => return Ok(Extraction::Incomplete),
                    }
                    continue;
                }
                match read_value(bytes, cursor)? {
                    Extraction::Value(v) => array.push(Arc::new(v)),
                    Extraction::Flawed(f) => return Ok(Extraction::Flawed(f)),
                    Extraction::Incomplete => return Ok(Extraction::Incomplete),
                }
            }
            Value::Array(array)
        }
        TYPE_SET => {
            let count = read_unsigned(bytes, cursor, width_nibble & 0x3)? as usize;
            let mut set = Set::new();
            for _ in 0..count {
                match read_value(bytes, cursor)? {
                    Extraction::Value(v) => {
                        if let Err(e) = set.insert(Arc::new(v)) {
                            return Ok(Extraction::Flawed(Flaw::new(e.to_string())));
                        }
                    }
                    Extraction::Flawed(f) => return Ok(Extraction::Flawed(f)),
                    Extraction::Incomplete => return Ok(Extraction::Incomplete),
                }
            }
            Value::Set(set)
        }
        TYPE_MAP => {
            let count = read_unsigned(bytes, cursor, width_nibble & 0x3)? as usize;
            let mut map = Map::new();
            for _ in 0..count {
                let key = match read_value(bytes, cursor)? {
                    Extraction::Value(v) => v,
                    Extraction::Flawed(f) => return Ok(Extraction::Flawed(f)),
                    Extraction::Incomplete => return Ok(Extraction::Incomplete),
                };
                let val = match read_value(bytes, cursor)? {
                    Extraction::Value(v) => v,
                    Extraction::Flawed(f) => return Ok(Extraction::Flawed(f)),
                    Extraction::Incomplete => return Ok(Extraction::Incomplete),
                };
                if let Err(e) = map.insert(Arc::new(key), Arc::new(val)) {
                    return Ok(Extraction::Flawed(Flaw::new(e.to_string())));
                }
            }
            Value::Map(map)
        }
        TYPE_MARKER => {
            return Ok(Extraction::Flawed(Flaw::new("unexpected message marker where a value was expected")));
        }
        other => {
            return Ok(Extraction::Flawed(Flaw::new(format!(
                "unknown type tag {other}"
            ))));
        }
    };
    Ok(Extraction::Value(value))
}

/// A decoded binary message: the top-level values plus the framing flags
/// described by the wire-format notes. A decode is only considered clean
/// when all four of `closed`, `end_of_data`, and `read_at_end` hold (the
/// fourth, implicit one, is the absence of a [`Flaw`]).
#[derive(Debug, Clone)]
pub struct DecodedMessage {
    pub values: Vec<Shared>,
    pub closed: bool,
    pub end_of_data: bool,
    pub read_at_end: bool,
}

impl DecodedMessage {
    pub fn is_clean(&self) -> bool {
        self.closed && self.end_of_data && self.read_at_end
    }
}

/// Encodes one or more top-level values into a single framed message.
pub fn encode_message(values: &[Shared]) -> Vec<u8> {
    let mut buf = vec![HEADER_BYTE];
    for v in values {
        write_value(&mut buf, v);
    }
    buf.push(TRAILER_BYTE);
    buf
}

/// Encodes exactly one value as its own message — the common case for a
/// Registry request or response, which is always a single top-level Array.
pub fn encode_one(value: &Value) -> Vec<u8> {
    let mut buf = vec![HEADER_BYTE];
    write_value(&mut buf, value);
    buf.push(TRAILER_BYTE);
    buf
}

/// Decodes as many whole top-level values as `bytes` contains, stopping at
/// the trailer or at the end of the buffer, whichever comes first.
pub fn decode_message(bytes: &[u8]) -> Result<DecodedMessage, Flaw> {
    if bytes.is_empty() {
        return Ok(DecodedMessage {
            values: Vec::new(),
            closed: false,
            end_of_data: true,
            read_at_end: false,
        });
    }
    if bytes[0] != HEADER_BYTE {
        return Err(Flaw::new("message does not begin with the expected header byte"));
    }
    let mut cursor = 1;
    let mut values = Vec::new();
    loop {
        if cursor >= bytes.len() {
            return Ok(DecodedMessage {
                values,
                closed: false,
                end_of_data: true,
                read_at_end: false,
            });
        }
        if bytes[cursor] == TRAILER_BYTE {
            cursor += 1;
            return Ok(DecodedMessage {
                end_of_data: cursor == bytes.len(),
                values,
                closed: true,
                read_at_end: true,
            });
        }
        match read_value(bytes, &mut cursor)? {
            Extraction::Value(v) => values.push(Arc::new(v)),
            Extraction::Flawed(f) => return Err(f),
            Extraction::Incomplete => {
                return Ok(DecodedMessage {
                    values,
                    closed: false,
                    end_of_data: true,
                    read_at_end: false,
                })
            }
        }
    }
}

/// Decodes a message expected to carry exactly one top-level value (the
/// shape every Registry request and response takes).
pub fn decode_one(bytes: &[u8]) -> Result<Shared, Flaw> {
    let decoded = decode_message(bytes)?;
    if !decoded.is_clean() {
        return Err(Flaw::new("message was not terminated cleanly"));
    }
    let mut values = decoded.values;
    if values.len() != 1 {
        return Err(Flaw::new(format!(
            "expected exactly one top-level value, found {}",
            values.len()
        )));
    }
    Ok(values.remove(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use nimo_value::Value;

    fn encode_decode(v: Value) -> Shared {
        let bytes = encode_one(&v);
        decode_one(&bytes).expect("clean decode")
    }

    #[test]
    fn integer_round_trip() {
        let out = encode_decode(Value::Integer(42));
        assert_eq!(out.as_integer(), Some(42));
    }

    #[test]
    fn integer_42_matches_worked_example() {
        let bytes = encode_one(&Value::Integer(42));
        assert_eq!(&bytes[1..3], &[0x01, 0x2A]);
    }

    #[test]
    fn negative_one_is_single_byte() {
        let bytes = encode_one(&Value::Integer(-1));
        assert_eq!(&bytes[1..3], &[0x01, 0xFF]);
    }

    #[test]
    fn negative_129_needs_two_bytes() {
        let bytes = encode_one(&Value::Integer(-129));
        assert_eq!(&bytes[1..4], &[0x11, 0xFF, 0x7F]);
    }

    #[test]
    fn string_round_trip() {
        let out = encode_decode(Value::String("hello, nImO".to_string()));
        assert_eq!(out.as_str(), Some("hello, nImO"));
    }

    #[test]
    fn blob_round_trip() {
        let out = encode_decode(Value::Blob(vec![1, 2, 3, 4, 5]));
        match out.as_ref() {
            Value::Blob(b) => assert_eq!(b, &vec![1u8, 2, 3, 4, 5]),
            _ => panic!("expected blob"),
        }
    }

    #[test]
    fn array_round_trip() {
        let arr = Value::Array(Array::from_vec(vec![
            Arc::new(Value::Integer(1)),
            Arc::new(Value::String("x".to_string())),
            Arc::new(Value::Logical(true)),
        ]));
        let decoded = encode_decode(arr.clone());
        assert!(decoded.deep_equal(&arr));
    }

    #[test]
    fn array_nested_inside_array_stays_nested() {
        let inner = Value::Array(Array::from_vec(vec![
            Arc::new(Value::String("N1".to_string())),
            Arc::new(Value::String("/out".to_string())),
        ]));
        let outer = Value::Array(Array::from_vec(vec![
            Arc::new(Value::String("header".to_string())),
            Arc::new(inner.clone()),
        ]));
        let decoded = encode_decode(outer.clone());
        assert!(decoded.deep_equal(&outer));
        let decoded_array = decoded.as_array().expect("top-level value is an array");
        assert_eq!(decoded_array.len(), 2);
        let second = decoded_array.get(1).expect("second element present");
        assert!(second.as_array().is_some(), "nested array must not be flattened into the parent");
        assert!(second.deep_equal(&inner));
    }

    #[test]
    fn double_run_inside_array_does_not_swallow_a_following_nested_array() {
        let inner = Value::Array(Array::from_vec(vec![Arc::new(Value::Integer(7))]));
        let outer = Value::Array(Array::from_vec(vec![
            Arc::new(Value::Double(1.0)),
            Arc::new(Value::Double(2.0)),
            Arc::new(inner.clone()),
        ]));
        let decoded = encode_decode(outer.clone());
        assert!(decoded.deep_equal(&outer));
        let decoded_array = decoded.as_array().expect("top-level value is an array");
        assert_eq!(decoded_array.len(), 3);
        assert_eq!(decoded_array.get(0).unwrap().as_ref(), &Value::Double(1.0));
        assert_eq!(decoded_array.get(1).unwrap().as_ref(), &Value::Double(2.0));
        assert!(decoded_array.get(2).unwrap().deep_equal(&inner));
    }

    #[test]
    fn nested_map_round_trip() {
        let mut m = Map::new();
        m.insert(Arc::new(Value::String("a".to_string())), Arc::new(Value::Integer(1)))
            .unwrap();
        let v = Value::Map(m);
        let decoded = encode_decode(v.clone());
        assert!(decoded.deep_equal(&v));
    }

    #[test]
    fn prefix_of_encoding_never_decodes_to_a_different_value() {
        let v = Value::Array(Array::from_vec(vec![
            Arc::new(Value::Integer(1)),
            Arc::new(Value::Integer(2)),
        ]));
        let bytes = encode_one(&v);
        let truncated = &bytes[..bytes.len() - 2];
        let result = decode_message(truncated).unwrap();
        assert!(!result.is_clean());
    }

    #[test]
    fn trailing_bytes_after_the_trailer_are_not_clean() {
        let mut bytes = encode_one(&Value::Integer(1));
        bytes.push(0xAA);
        let decoded = decode_message(&bytes).unwrap();
        assert!(decoded.closed);
        assert!(decoded.read_at_end);
        assert!(!decoded.end_of_data);
        assert!(!decoded.is_clean());
        assert!(decode_one(&bytes).is_err());
    }

    #[test]
    fn incomplete_buffer_is_reported_not_flawed() {
        let bytes = encode_one(&Value::Integer(1000));
        let decoded = decode_message(&bytes[..bytes.len() - 1]).unwrap();
        assert!(!decoded.closed);
        assert!(decoded.end_of_data);
    }

    #[test]
    fn double_run_round_trips_through_parent_array() {
        let arr = Value::Array(Array::from_vec(vec![
            Arc::new(Value::Double(1.5)),
            Arc::new(Value::Double(2.5)),
        ]));
        let decoded = encode_decode(arr.clone());
        assert!(decoded.deep_equal(&arr));
    }

    #[test]
    fn consecutive_doubles_pack_into_one_run_header() {
        let arr = Value::Array(Array::from_vec(vec![
            Arc::new(Value::Double(1.0)),
            Arc::new(Value::Double(2.0)),
            Arc::new(Value::Double(3.0)),
        ]));
        let bytes = encode_one(&arr);
        // header, array tag, array-count byte, then a single double-run tag
        // whose width nibble is 2 (run length 3), not three separate tags.
        let array_tag = bytes[1];
        assert_eq!(array_tag & 0x0F, TYPE_ARRAY);
        let count_width = 1usize << ((array_tag >> 4) & 0x3);
        let run_tag_index = 2 + count_width;
        let run_tag = bytes[run_tag_index];
        assert_eq!(run_tag & 0x0F, TYPE_DOUBLE);
        assert_eq!(run_tag >> 4, 2);
    }

    #[test]
    fn double_run_does_not_merge_across_non_double_element() {
        let arr = Value::Array(Array::from_vec(vec![
            Arc::new(Value::Double(1.0)),
            Arc::new(Value::Integer(7)),
            Arc::new(Value::Double(2.0)),
        ]));
        let decoded = encode_decode(arr.clone());
        assert!(decoded.deep_equal(&arr));
    }
}
