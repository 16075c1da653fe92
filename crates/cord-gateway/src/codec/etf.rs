//! External Term Format codec (panic-free).
//!
//! Decodes the `etf` gateway encoding into the same value tree the JSON
//! encoding produces, and encodes outbound value trees back into it.
//!
//! Parsing rules:
//! - Never index (`buf[0]`); always check `remaining()` before a `get_*`.
//! - Lengths read from the wire are checked against the bytes left before
//!   anything is allocated.

use std::io::Read;

use bytes::{Buf, BufMut};
use flate2::read::ZlibDecoder;
use serde_json::{Map, Number, Value};
use thiserror::Error;

/// Leading byte of every encoded term
pub const FORMAT_VERSION: u8 = 131;

/// Deepest nesting of lists, tuples and maps accepted on decode
pub const MAX_DEPTH: usize = 128;

const NEW_FLOAT_EXT: u8 = 70;
const COMPRESSED: u8 = 80;
const SMALL_INTEGER_EXT: u8 = 97;
const INTEGER_EXT: u8 = 98;
const FLOAT_EXT: u8 = 99;
const ATOM_EXT: u8 = 100;
const SMALL_TUPLE_EXT: u8 = 104;
const LARGE_TUPLE_EXT: u8 = 105;
const NIL_EXT: u8 = 106;
const STRING_EXT: u8 = 107;
const LIST_EXT: u8 = 108;
const BINARY_EXT: u8 = 109;
const SMALL_BIG_EXT: u8 = 110;
const LARGE_BIG_EXT: u8 = 111;
const SMALL_ATOM_EXT: u8 = 115;
const MAP_EXT: u8 = 116;
const ATOM_UTF8_EXT: u8 = 118;
const SMALL_ATOM_UTF8_EXT: u8 = 119;

/// Errors raised by the term codec
#[derive(Debug, Error)]
pub enum EtfError {
    #[error("unsupported format version {0}")]
    UnsupportedVersion(u8),

    #[error("input ended inside a term")]
    UnexpectedEof,

    #[error("unknown term tag {0}")]
    UnknownTag(u8),

    #[error("string is not valid UTF-8")]
    InvalidUtf8,

    #[error("integer does not fit in 64 bits")]
    IntegerOverflow,

    #[error("float is not finite or not parseable")]
    InvalidFloat,

    #[error("improper list tail")]
    ImproperList,

    #[error("map key cannot be converted to a string")]
    InvalidMapKey,

    #[error("terms nested deeper than {MAX_DEPTH}")]
    DepthExceeded,

    #[error("{0} trailing bytes after term")]
    TrailingBytes(usize),

    #[error("compressed term: {0}")]
    Compressed(String),

    #[error("value too large to encode")]
    TooLarge,
}

type Result<T> = std::result::Result<T, EtfError>;

// === Decoding ===

/// Decode a complete payload, version byte included
pub fn decode(input: &[u8]) -> Result<Value> {
    let mut buf = input;
    if buf.remaining() < 1 {
        return Err(EtfError::UnexpectedEof);
    }
    let version = buf.get_u8();
    if version != FORMAT_VERSION {
        return Err(EtfError::UnsupportedVersion(version));
    }
    decode_exact(buf)
}

/// Decode one term that must span all of `buf`
fn decode_exact(mut buf: &[u8]) -> Result<Value> {
    let value = decode_term(&mut buf, 0)?;
    if buf.has_remaining() {
        return Err(EtfError::TrailingBytes(buf.remaining()));
    }
    Ok(value)
}

fn need(buf: &[u8], n: usize) -> Result<()> {
    if buf.remaining() < n {
        Err(EtfError::UnexpectedEof)
    } else {
        Ok(())
    }
}

fn take<'a>(buf: &mut &'a [u8], n: usize) -> Result<&'a [u8]> {
    let slice: &'a [u8] = *buf;
    need(slice, n)?;
    let (head, rest) = slice.split_at(n);
    *buf = rest;
    Ok(head)
}

fn read_u8(buf: &mut &[u8]) -> Result<u8> {
    need(buf, 1)?;
    Ok(buf.get_u8())
}

fn read_u16(buf: &mut &[u8]) -> Result<usize> {
    need(buf, 2)?;
    Ok(usize::from(buf.get_u16()))
}

fn read_u32(buf: &mut &[u8]) -> Result<usize> {
    need(buf, 4)?;
    usize::try_from(buf.get_u32()).map_err(|_| EtfError::TooLarge)
}

/// Reject element counts that cannot possibly fit in what is left
fn check_count(buf: &[u8], count: usize, min_size: usize) -> Result<()> {
    match count.checked_mul(min_size) {
        Some(n) if n <= buf.remaining() => Ok(()),
        _ => Err(EtfError::UnexpectedEof),
    }
}

fn decode_term(buf: &mut &[u8], depth: usize) -> Result<Value> {
    if depth > MAX_DEPTH {
        return Err(EtfError::DepthExceeded);
    }

    let tag = read_u8(buf)?;
    match tag {
        SMALL_INTEGER_EXT => Ok(Value::from(read_u8(buf)?)),
        INTEGER_EXT => {
            need(buf, 4)?;
            Ok(Value::from(buf.get_i32()))
        }
        NEW_FLOAT_EXT => {
            need(buf, 8)?;
            float(buf.get_f64())
        }
        FLOAT_EXT => {
            let raw = take(buf, 31)?;
            let text = std::str::from_utf8(raw).map_err(|_| EtfError::InvalidFloat)?;
            let parsed = text
                .trim_end_matches('\0')
                .trim()
                .parse::<f64>()
                .map_err(|_| EtfError::InvalidFloat)?;
            float(parsed)
        }
        ATOM_EXT | SMALL_ATOM_EXT => {
            let len = if tag == ATOM_EXT { read_u16(buf)? } else { usize::from(read_u8(buf)?) };
            // Latin-1 maps one byte to one code point
            let name: String = take(buf, len)?.iter().map(|&b| char::from(b)).collect();
            Ok(atom(name))
        }
        ATOM_UTF8_EXT | SMALL_ATOM_UTF8_EXT => {
            let len = if tag == ATOM_UTF8_EXT { read_u16(buf)? } else { usize::from(read_u8(buf)?) };
            Ok(atom(utf8(take(buf, len)?)?))
        }
        BINARY_EXT => {
            let len = read_u32(buf)?;
            Ok(Value::String(utf8(take(buf, len)?)?))
        }
        STRING_EXT => {
            let len = read_u16(buf)?;
            Ok(Value::String(utf8(take(buf, len)?)?))
        }
        NIL_EXT => Ok(Value::Array(Vec::new())),
        LIST_EXT => {
            let len = read_u32(buf)?;
            let items = decode_seq(buf, len, depth)?;
            if read_u8(buf)? != NIL_EXT {
                return Err(EtfError::ImproperList);
            }
            Ok(Value::Array(items))
        }
        SMALL_TUPLE_EXT => {
            let arity = usize::from(read_u8(buf)?);
            decode_seq(buf, arity, depth).map(Value::Array)
        }
        LARGE_TUPLE_EXT => {
            let arity = read_u32(buf)?;
            decode_seq(buf, arity, depth).map(Value::Array)
        }
        MAP_EXT => {
            let arity = read_u32(buf)?;
            check_count(buf, arity, 2)?;
            let mut map = Map::new();
            for _ in 0..arity {
                let key = map_key(decode_term(buf, depth + 1)?)?;
                let value = decode_term(buf, depth + 1)?;
                map.insert(key, value);
            }
            Ok(Value::Object(map))
        }
        SMALL_BIG_EXT => {
            let n = usize::from(read_u8(buf)?);
            big(buf, n)
        }
        LARGE_BIG_EXT => {
            let n = read_u32(buf)?;
            big(buf, n)
        }
        COMPRESSED => {
            let size = read_u32(buf)?;
            let inflated = inflate_term(*buf, size)?;
            *buf = &[];
            let mut inner = inflated.as_slice();
            let value = decode_term(&mut inner, depth)?;
            if inner.has_remaining() {
                return Err(EtfError::TrailingBytes(inner.remaining()));
            }
            Ok(value)
        }
        other => Err(EtfError::UnknownTag(other)),
    }
}

fn decode_seq(buf: &mut &[u8], len: usize, depth: usize) -> Result<Vec<Value>> {
    check_count(buf, len, 1)?;
    let mut items = Vec::with_capacity(len);
    for _ in 0..len {
        items.push(decode_term(buf, depth + 1)?);
    }
    Ok(items)
}

fn inflate_term(buf: &[u8], size: usize) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let limit = u64::try_from(size).map_err(|_| EtfError::TooLarge)?;
    ZlibDecoder::new(buf)
        .take(limit)
        .read_to_end(&mut out)
        .map_err(|e| EtfError::Compressed(e.to_string()))?;
    if out.len() != size {
        return Err(EtfError::Compressed(format!(
            "expected {size} bytes, inflated {}",
            out.len()
        )));
    }
    Ok(out)
}

fn utf8(bytes: &[u8]) -> Result<String> {
    std::str::from_utf8(bytes)
        .map(str::to_owned)
        .map_err(|_| EtfError::InvalidUtf8)
}

fn float(value: f64) -> Result<Value> {
    Number::from_f64(value)
        .map(Value::Number)
        .ok_or(EtfError::InvalidFloat)
}

fn atom(name: String) -> Value {
    match name.as_str() {
        "nil" | "null" => Value::Null,
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => Value::String(name),
    }
}

fn big(buf: &mut &[u8], n: usize) -> Result<Value> {
    let sign = read_u8(buf)?;
    let digits = take(buf, n)?;

    let mut magnitude: u64 = 0;
    for (i, &byte) in digits.iter().enumerate() {
        if byte == 0 {
            continue;
        }
        if i >= 8 {
            return Err(EtfError::IntegerOverflow);
        }
        magnitude |= u64::from(byte) << (8 * i);
    }

    if sign == 0 {
        Ok(Value::from(magnitude))
    } else {
        // i64::MIN has a magnitude one past i64::MAX
        let negated = 0i64.checked_sub_unsigned(magnitude).ok_or(EtfError::IntegerOverflow)?;
        Ok(Value::from(negated))
    }
}

fn map_key(key: Value) -> Result<String> {
    match key {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Null => Ok("nil".to_string()),
        Value::Array(_) | Value::Object(_) => Err(EtfError::InvalidMapKey),
    }
}

// === Encoding ===

/// Encode a value tree, version byte included
pub fn encode(value: &Value) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(64);
    out.put_u8(FORMAT_VERSION);
    encode_term(&mut out, value)?;
    Ok(out)
}

fn encode_term(out: &mut Vec<u8>, value: &Value) -> Result<()> {
    match value {
        Value::Null => put_atom(out, "nil"),
        Value::Bool(true) => put_atom(out, "true"),
        Value::Bool(false) => put_atom(out, "false"),
        Value::Number(n) => put_number(out, n)?,
        Value::String(s) => put_binary(out, s.as_bytes())?,
        Value::Array(items) if items.is_empty() => out.put_u8(NIL_EXT),
        Value::Array(items) => {
            out.put_u8(LIST_EXT);
            out.put_u32(len_u32(items.len())?);
            for item in items {
                encode_term(out, item)?;
            }
            out.put_u8(NIL_EXT);
        }
        Value::Object(map) => {
            out.put_u8(MAP_EXT);
            out.put_u32(len_u32(map.len())?);
            for (key, item) in map {
                put_binary(out, key.as_bytes())?;
                encode_term(out, item)?;
            }
        }
    }
    Ok(())
}

fn len_u32(len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| EtfError::TooLarge)
}

fn put_atom(out: &mut Vec<u8>, name: &str) {
    out.put_u8(SMALL_ATOM_UTF8_EXT);
    out.put_u8(name.len() as u8);
    out.put_slice(name.as_bytes());
}

fn put_binary(out: &mut Vec<u8>, bytes: &[u8]) -> Result<()> {
    out.put_u8(BINARY_EXT);
    out.put_u32(len_u32(bytes.len())?);
    out.put_slice(bytes);
    Ok(())
}

fn put_number(out: &mut Vec<u8>, n: &Number) -> Result<()> {
    if let Some(v) = n.as_u64() {
        if let Ok(small) = u8::try_from(v) {
            out.put_u8(SMALL_INTEGER_EXT);
            out.put_u8(small);
        } else if let Ok(int) = i32::try_from(v) {
            out.put_u8(INTEGER_EXT);
            out.put_i32(int);
        } else {
            put_big(out, false, v);
        }
    } else if let Some(v) = n.as_i64() {
        if let Ok(int) = i32::try_from(v) {
            out.put_u8(INTEGER_EXT);
            out.put_i32(int);
        } else {
            put_big(out, true, v.unsigned_abs());
        }
    } else {
        let v = n.as_f64().ok_or(EtfError::InvalidFloat)?;
        out.put_u8(NEW_FLOAT_EXT);
        out.put_f64(v);
    }
    Ok(())
}

fn put_big(out: &mut Vec<u8>, negative: bool, magnitude: u64) {
    let digits = magnitude.to_le_bytes();
    let len = 8 - (magnitude.leading_zeros() / 8) as usize;
    out.put_u8(SMALL_BIG_EXT);
    out.put_u8(len as u8);
    out.put_u8(u8::from(negative));
    out.put_slice(&digits[..len]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::{write::ZlibEncoder, Compression};
    use serde_json::json;
    use std::io::Write;

    fn small_atom(name: &str) -> Vec<u8> {
        let mut out = vec![SMALL_ATOM_UTF8_EXT, name.len() as u8];
        out.extend_from_slice(name.as_bytes());
        out
    }

    fn binary(s: &str) -> Vec<u8> {
        let mut out = vec![BINARY_EXT];
        out.extend_from_slice(&(s.len() as u32).to_be_bytes());
        out.extend_from_slice(s.as_bytes());
        out
    }

    #[test]
    fn test_decode_scalars() {
        assert_eq!(decode(&[131, SMALL_INTEGER_EXT, 7]).unwrap(), json!(7));
        assert_eq!(decode(&[131, INTEGER_EXT, 0xFF, 0xFF, 0xFF, 0xFE]).unwrap(), json!(-2));

        let mut float = vec![131, NEW_FLOAT_EXT];
        float.extend_from_slice(&1.5f64.to_be_bytes());
        assert_eq!(decode(&float).unwrap(), json!(1.5));

        let mut text = vec![131];
        text.extend(binary("héllo"));
        assert_eq!(decode(&text).unwrap(), json!("héllo"));
    }

    #[test]
    fn test_legacy_float() {
        let mut input = vec![131, FLOAT_EXT];
        let mut digits = b"2.50000000000000000000e+00".to_vec();
        digits.resize(31, 0);
        input.extend(digits);
        assert_eq!(decode(&input).unwrap(), json!(2.5));
    }

    #[test]
    fn test_decode_atoms() {
        for (name, expected) in [
            ("nil", Value::Null),
            ("null", Value::Null),
            ("true", json!(true)),
            ("false", json!(false)),
            ("online", json!("online")),
        ] {
            let mut input = vec![131];
            input.extend(small_atom(name));
            assert_eq!(decode(&input).unwrap(), expected, "atom {name}");
        }

        // Latin-1 ATOM_EXT
        assert_eq!(
            decode(&[131, ATOM_EXT, 0, 2, b'o', b'k']).unwrap(),
            json!("ok")
        );
    }

    #[test]
    fn test_decode_big_integers() {
        // 2^40 as SMALL_BIG_EXT
        let input = [131, SMALL_BIG_EXT, 6, 0, 0, 0, 0, 0, 0, 1];
        assert_eq!(decode(&input).unwrap(), json!(1u64 << 40));

        let input = [131, SMALL_BIG_EXT, 8, 0, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF];
        assert_eq!(decode(&input).unwrap(), json!(u64::MAX));

        let input = [131, SMALL_BIG_EXT, 5, 1, 0, 0, 0, 0, 1];
        assert_eq!(decode(&input).unwrap(), json!(-(1i64 << 32)));

        let input = [131, SMALL_BIG_EXT, 9, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1];
        assert!(matches!(decode(&input), Err(EtfError::IntegerOverflow)));
    }

    #[test]
    fn test_decode_containers() {
        // #{<<"op">> => 0, <<"d">> => [1, nil]}
        let mut input = vec![131, MAP_EXT, 0, 0, 0, 2];
        input.extend(binary("op"));
        input.extend([SMALL_INTEGER_EXT, 0]);
        input.extend(binary("d"));
        input.extend([LIST_EXT, 0, 0, 0, 2, SMALL_INTEGER_EXT, 1]);
        input.extend(small_atom("nil"));
        input.push(NIL_EXT);

        assert_eq!(decode(&input).unwrap(), json!({"op": 0, "d": [1, null]}));
    }

    #[test]
    fn test_atom_and_integer_keys_become_strings() {
        let mut input = vec![131, MAP_EXT, 0, 0, 0, 2];
        input.extend(small_atom("t"));
        input.extend(small_atom("nil"));
        input.extend([SMALL_INTEGER_EXT, 5, NIL_EXT]);

        assert_eq!(decode(&input).unwrap(), json!({"t": null, "5": []}));
    }

    #[test]
    fn test_tuples_and_strings() {
        let input = [131, SMALL_TUPLE_EXT, 2, SMALL_INTEGER_EXT, 1, STRING_EXT, 0, 2, b'h', b'i'];
        assert_eq!(decode(&input).unwrap(), json!([1, "hi"]));
    }

    #[test]
    fn test_compressed_term() {
        let mut term = vec![MAP_EXT, 0, 0, 0, 1];
        term.extend(binary("content"));
        term.extend(binary(&"x".repeat(200)));

        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&term).unwrap();
        let compressed = encoder.finish().unwrap();

        let mut input = vec![131, COMPRESSED];
        input.extend((term.len() as u32).to_be_bytes());
        input.extend(compressed);

        assert_eq!(decode(&input).unwrap(), json!({"content": "x".repeat(200)}));
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(matches!(decode(&[]), Err(EtfError::UnexpectedEof)));
        assert!(matches!(decode(&[130, NIL_EXT]), Err(EtfError::UnsupportedVersion(130))));
        assert!(matches!(decode(&[131, 1]), Err(EtfError::UnknownTag(1))));
        assert!(matches!(decode(&[131, INTEGER_EXT, 0]), Err(EtfError::UnexpectedEof)));
        assert!(matches!(
            decode(&[131, SMALL_INTEGER_EXT, 1, 0]),
            Err(EtfError::TrailingBytes(1))
        ));
        assert!(matches!(
            decode(&[131, BINARY_EXT, 0, 0, 0, 2, 0xC3, 0x28]),
            Err(EtfError::InvalidUtf8)
        ));
        assert!(matches!(
            decode(&[131, LIST_EXT, 0, 0, 0, 1, SMALL_INTEGER_EXT, 1, SMALL_INTEGER_EXT, 2]),
            Err(EtfError::ImproperList)
        ));
    }

    #[test]
    fn test_hostile_lengths_do_not_allocate() {
        assert!(matches!(
            decode(&[131, LIST_EXT, 0xFF, 0xFF, 0xFF, 0xFF]),
            Err(EtfError::UnexpectedEof)
        ));
        assert!(matches!(
            decode(&[131, MAP_EXT, 0xFF, 0xFF, 0xFF, 0xFF]),
            Err(EtfError::UnexpectedEof)
        ));
    }

    #[test]
    fn test_depth_limit() {
        let mut input = vec![131];
        for _ in 0..=MAX_DEPTH + 1 {
            input.extend([SMALL_TUPLE_EXT, 1]);
        }
        input.push(NIL_EXT);
        assert!(matches!(decode(&input), Err(EtfError::DepthExceeded)));
    }

    #[test]
    fn test_encode_layout() {
        assert_eq!(encode(&Value::Null).unwrap(), [vec![131], small_atom("nil")].concat());
        assert_eq!(encode(&json!(5)).unwrap(), vec![131, SMALL_INTEGER_EXT, 5]);
        assert_eq!(encode(&json!(300)).unwrap(), vec![131, INTEGER_EXT, 0, 0, 1, 44]);
        assert_eq!(encode(&json!([])).unwrap(), vec![131, NIL_EXT]);
        assert_eq!(encode(&json!("a")).unwrap(), [vec![131], binary("a")].concat());
    }

    #[test]
    fn test_encoded_frames_decode_back() {
        let value = json!({
            "op": 2,
            "d": {
                "token": "tok",
                "intents": 513,
                "shard": [0, 1],
                "big": 175_928_847_299_117_063u64,
                "neg": -5_000_000_000i64,
                "ratio": 0.25,
                "flag": true,
                "none": null
            }
        });
        assert_eq!(decode(&encode(&value).unwrap()).unwrap(), value);
    }
}
