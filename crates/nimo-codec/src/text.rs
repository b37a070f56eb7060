//! The human-readable text codec (C2, text leg): a single-pass reader and
//! printer over the value algebra.
//!
//! Bracket vocabulary: `( … )` for Array, `[ … ]` for Set, `{ k -> v, … }`
//! for Map, `!D` + `YYYY/MM/DD` for Date, `!T` + `HH:MM:SS.mmm` for Time,
//! and `%len:hex` for Blob (a length-prefixed hex dump — the only lead
//! character that keeps a blob readable as plain text). `squished` mode
//! omits every optional separator; non-squished mode adds a single space
//! between siblings and after `->` for legibility.

use std::sync::Arc;

use nimo_value::{Array, Map, NimoAddress, NimoDate, NimoTime, Set, Value};

use crate::flaw::Flaw;

const MAP_ARROW: &str = "->";

/// Appends the text form of `value` to `out`.
pub fn print_value(out: &mut String, value: &Value, squished: bool) {
    match value {
        Value::Logical(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Integer(i) => out.push_str(&i.to_string()),
        Value::Double(d) => out.push_str(&format_double(*d)),
        Value::String(s) => print_quoted_string(out, s),
        Value::Blob(b) => {
            out.push('%');
            out.push_str(&b.len().to_string());
            out.push(':');
            for byte in b {
                out.push_str(&format!("{byte:02x}"));
            }
        }
        Value::Date(d) => {
            out.push_str("!D");
            out.push_str(&d.to_string());
        }
        Value::Time(t) => {
            out.push_str("!T");
            out.push_str(&t.to_string());
        }
        Value::Address(a) => {
            out.push_str(&a.to_string());
        }
        Value::Array(a) => {
            out.push('(');
            let mut first = true;
            for child in a.iter() {
                // The inter-element space is the one mandatory separator:
                // without it, two adjacent bare numbers or keywords would
                // merge into one token on re-read. "Squished" drops only
                // the padding around brackets and punctuation, not this.
                if !first {
                    out.push(' ');
                }
                first = false;
                print_value(out, child, squished);
            }
            out.push(')');
        }
        Value::Set(s) => {
            out.push('[');
            let mut first = true;
            for member in s.iter() {
                if !first {
                    out.push(' ');
                }
                first = false;
                print_value(out, member, squished);
            }
            out.push(']');
        }
        Value::Map(m) => {
            out.push('{');
            let mut first = true;
            for (k, v) in m.iter() {
                if !first {
                    out.push(',');
                    if !squished {
                        out.push(' ');
                    }
                }
                first = false;
                print_value(out, k, squished);
                out.push_str(MAP_ARROW);
                if !squished {
                    out.push(' ');
                }
                print_value(out, v, squished);
            }
            out.push('}');
        }
    }
}

pub fn print_to_string(value: &Value, squished: bool) -> String {
    let mut out = String::new();
    print_value(&mut out, value, squished);
    out
}

fn format_double(d: f64) -> String {
    if d == d.trunc() && d.is_finite() && d.abs() < 1e15 {
        format!("{d:.1}")
    } else {
        format!("{d}")
    }
}

fn print_quoted_string(out: &mut String, s: &str) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            _ => out.push(c),
        }
    }
    out.push('"');
}

/// `true` for bytes that legally terminate a bare token: whitespace, comma,
/// or a closing bracket belonging to the enclosing container.
fn is_terminator(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | b'\r' | b',' | b')' | b']' | b'}')
}

struct Reader<'a> {
    bytes: &'a [u8],
    cursor: usize,
}

impl<'a> Reader<'a> {
    fn new(input: &'a str, cursor: usize) -> Self {
        Self {
            bytes: input.as_bytes(),
            cursor,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.cursor).copied()
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(b' ') | Some(b'\t') | Some(b'\n') | Some(b'\r')) {
            self.cursor += 1;
        }
    }

    fn advance(&mut self) -> Option<u8> {
        let b = self.peek();
        if b.is_some() {
            self.cursor += 1;
        }
        b
    }

    fn eat(&mut self, expected: u8) -> bool {
        if self.peek() == Some(expected) {
            self.cursor += 1;
            true
        } else {
            false
        }
    }

    fn read_value(&mut self) -> Result<Option<Value>, Flaw> {
        self.skip_ws();
        match self.peek() {
            None => Ok(None),
            Some(b'(') => self.read_array(),
            Some(b'[') => self.read_set(),
            Some(b'{') => self.read_map(),
            Some(b'"') => self.read_string(),
            Some(b'%') => self.read_blob(),
            Some(b'!') => self.read_date_or_time(),
            Some(b't') | Some(b'f') => self.read_logical(),
            Some(b) if b == b'-' || b == b'+' || b.is_ascii_digit() => self.read_number(),
            _ => Ok(None),
        }
    }

    fn read_logical(&mut self) -> Result<Option<Value>, Flaw> {
        if self.bytes[self.cursor..].starts_with(b"true") {
            self.cursor += 4;
            Ok(Some(Value::Logical(true)))
        } else if self.bytes[self.cursor..].starts_with(b"false") {
            self.cursor += 5;
            Ok(Some(Value::Logical(false)))
        } else {
            Ok(None)
        }
    }

    fn read_array(&mut self) -> Result<Option<Value>, Flaw> {
        self.cursor += 1; // '('
        let mut array = Array::new();
        loop {
            self.skip_ws();
            if self.eat(b')') {
                return Ok(Some(Value::Array(array)));
            }
            match self.read_value()? {
                Some(v) => array.push(Arc::new(v)),
                None => return Err(Flaw::new("malformed array element")),
            }
            self.skip_ws();
            self.eat(b',');
        }
    }

    fn read_set(&mut self) -> Result<Option<Value>, Flaw> {
        self.cursor += 1; // '['
        let mut set = Set::new();
        loop {
            self.skip_ws();
            if self.eat(b']') {
                return Ok(Some(Value::Set(set)));
            }
            match self.read_value()? {
                Some(v) => {
                    set.insert(Arc::new(v))
                        .map_err(|e| Flaw::new(e.to_string()))?;
                }
                None => return Err(Flaw::new("malformed set member")),
            }
            self.skip_ws();
            self.eat(b',');
        }
    }

    fn read_map(&mut self) -> Result<Option<Value>, Flaw> {
        self.cursor += 1; // '{'
        let mut map = Map::new();
        loop {
            self.skip_ws();
            if self.eat(b'}') {
                return Ok(Some(Value::Map(map)));
            }
            let key = match self.read_value()? {
                Some(v) => v,
                None => return Err(Flaw::new("malformed map key")),
            };
            self.skip_ws();
            if !(self.eat(b'-') && self.eat(b'>')) {
                return Err(Flaw::new("expected '->' after map key"));
            }
            self.skip_ws();
            let value = match self.read_value()? {
                Some(v) => v,
                None => return Err(Flaw::new("malformed map value")),
            };
            map.insert(Arc::new(key), Arc::new(value))
                .map_err(|e| Flaw::new(e.to_string()))?;
            self.skip_ws();
            self.eat(b',');
        }
    }

    fn read_string(&mut self) -> Result<Option<Value>, Flaw> {
        self.cursor += 1; // opening quote
        let mut s = String::new();
        loop {
            match self.advance() {
                None => return Err(Flaw::new("unterminated string literal")),
                Some(b'"') => return Ok(Some(Value::String(s))),
                Some(b'\\') => match self.advance() {
                    Some(b'"') => s.push('"'),
                    Some(b'\\') => s.push('\\'),
                    Some(other) => s.push(other as char),
                    None => return Err(Flaw::new("unterminated escape in string literal")),
                },
                Some(b) if b < 0x80 => s.push(b as char),
                Some(b) => {
                    // Multi-byte UTF-8 lead byte: recover the full
                    // sequence from the underlying bytes directly.
                    let start = self.cursor - 1;
                    let width = utf8_len(b);
                    let end = (start + width).min(self.bytes.len());
                    let chunk = std::str::from_utf8(&self.bytes[start..end])
                        .map_err(|_| Flaw::new("invalid UTF-8 in string literal"))?;
                    s.push_str(chunk);
                    self.cursor = end;
                }
            }
        }
    }

    fn read_blob(&mut self) -> Result<Option<Value>, Flaw> {
        self.cursor += 1; // '%'
        let start = self.cursor;
        while matches!(self.peek(), Some(b) if b.is_ascii_digit()) {
            self.cursor += 1;
        }
        if self.cursor == start {
            return Err(Flaw::new("blob literal is missing its length"));
        }
        let len: usize = std::str::from_utf8(&self.bytes[start..self.cursor])
            .unwrap()
            .parse()
            .map_err(|_| Flaw::new("blob length is not a valid integer"))?;
        if !self.eat(b':') {
            return Err(Flaw::new("blob literal is missing ':'"));
        }
        if self.cursor + len * 2 > self.bytes.len() {
            return Err(Flaw::new("blob literal is shorter than its declared length"));
        }
        let hex = std::str::from_utf8(&self.bytes[self.cursor..self.cursor + len * 2])
            .map_err(|_| Flaw::new("blob hex digits are not valid UTF-8"))?;
        let mut bytes = Vec::with_capacity(len);
        for i in 0..len {
            let byte = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16)
                .map_err(|_| Flaw::new("blob contains an invalid hex digit"))?;
            bytes.push(byte);
        }
        self.cursor += len * 2;
        Ok(Some(Value::Blob(bytes)))
    }

    fn read_date_or_time(&mut self) -> Result<Option<Value>, Flaw> {
        self.cursor += 1; // '!'
        match self.advance() {
            Some(b'D') => {
                let text = self.take_token();
                let parts: Vec<&str> = text.split('/').collect();
                if parts.len() != 3 {
                    return Err(Flaw::new("malformed date literal"));
                }
                let year = parts[0].parse().map_err(|_| Flaw::new("bad date year"))?;
                let month = parts[1].parse().map_err(|_| Flaw::new("bad date month"))?;
                let day = parts[2].parse().map_err(|_| Flaw::new("bad date day"))?;
                Ok(Some(Value::Date(NimoDate::new(year, month, day))))
            }
            Some(b'T') => {
                let text = self.take_token();
                let (hms, millis) = text.split_once('.').unwrap_or((text.as_str(), "0"));
                let parts: Vec<&str> = hms.split(':').collect();
                if parts.len() != 3 {
                    return Err(Flaw::new("malformed time literal"));
                }
                let hours = parts[0].parse().map_err(|_| Flaw::new("bad time hours"))?;
                let minutes = parts[1].parse().map_err(|_| Flaw::new("bad time minutes"))?;
                let seconds = parts[2].parse().map_err(|_| Flaw::new("bad time seconds"))?;
                let milliseconds = millis.parse().map_err(|_| Flaw::new("bad time milliseconds"))?;
                Ok(Some(Value::Time(NimoTime::new(hours, minutes, seconds, milliseconds))))
            }
            _ => Err(Flaw::new("unrecognized '!' lead character")),
        }
    }

    fn take_token(&mut self) -> String {
        let start = self.cursor;
        while matches!(self.peek(), Some(b) if !is_terminator(b)) {
            self.cursor += 1;
        }
        String::from_utf8_lossy(&self.bytes[start..self.cursor]).into_owned()
    }

    /// Consumes an IPv4 dotted-quad, or a number, depending on which
    /// parses; an address and a double share a leading digit, so this
    /// tries the stricter address grammar first and falls back to the
    /// documented number state machine.
    fn read_number(&mut self) -> Result<Option<Value>, Flaw> {
        let start = self.cursor;
        if let Some(addr) = self.try_read_address(start) {
            return Ok(Some(Value::Address(addr)));
        }
        self.cursor = start;
        self.read_numeric_literal()
    }

    fn try_read_address(&mut self, start: usize) -> Option<NimoAddress> {
        let token_end = {
            let mut i = start;
            while matches!(self.bytes.get(i), Some(b) if !is_terminator(*b)) {
                i += 1;
            }
            i
        };
        let text = std::str::from_utf8(&self.bytes[start..token_end]).ok()?;
        let octets: Vec<&str> = text.split('.').collect();
        if octets.len() != 4 {
            return None;
        }
        let mut parsed = [0u8; 4];
        for (i, o) in octets.iter().enumerate() {
            if o.is_empty() || !o.chars().all(|c| c.is_ascii_digit()) {
                return None;
            }
            parsed[i] = o.parse().ok()?;
        }
        self.cursor = token_end;
        Some(NimoAddress::from_ipv4(std::net::Ipv4Addr::from(parsed)))
    }

    /// The number state machine described in the wire-format notes:
    /// `{Initial, IntDigitSeen, FractionStart, ExponentStart,
    /// ExponentDigits}`. A sign may appear only once in the mantissa and
    /// once in the exponent; a bare `.` or a bare `e`/`E` is invalid.
    fn read_numeric_literal(&mut self) -> Result<Option<Value>, Flaw> {
        #[derive(PartialEq)]
        enum State {
            Initial,
            IntDigitSeen,
            FractionStart,
            FractionDigits,
            ExponentStart,
            ExponentDigits,
        }

        let start = self.cursor;
        let mut state = State::Initial;
        let mut is_double = false;

        if matches!(self.peek(), Some(b'+') | Some(b'-')) {
            self.cursor += 1;
        }

        loop {
            match self.peek() {
                Some(b) if b.is_ascii_digit() => {
                    self.cursor += 1;
                    state = match state {
                        State::Initial | State::IntDigitSeen => State::IntDigitSeen,
                        State::FractionStart | State::FractionDigits => State::FractionDigits,
                        State::ExponentStart | State::ExponentDigits => State::ExponentDigits,
                    };
                }
                Some(b'.') if state == State::IntDigitSeen => {
                    self.cursor += 1;
                    is_double = true;
                    state = State::FractionStart;
                }
                Some(b'e') | Some(b'E')
                    if matches!(state, State::IntDigitSeen | State::FractionDigits) =>
                {
                    self.cursor += 1;
                    is_double = true;
                    state = State::ExponentStart;
                    if matches!(self.peek(), Some(b'+') | Some(b'-')) {
                        self.cursor += 1;
                    }
                }
                _ => break,
            }
        }

        if !matches!(state, State::IntDigitSeen | State::FractionDigits | State::ExponentDigits) {
            return Err(Flaw::new("malformed numeric literal"));
        }

        let text = std::str::from_utf8(&self.bytes[start..self.cursor]).unwrap();
        if is_double {
            text.parse::<f64>()
                .map(|d| Some(Value::Double(d)))
                .map_err(|_| Flaw::new("malformed double literal"))
        } else {
            text.parse::<i64>()
                .map(|i| Some(Value::Integer(i)))
                .map_err(|_| Flaw::new("integer literal out of i64 range"))
        }
    }
}

fn utf8_len(lead: u8) -> usize {
    if lead & 0xE0 == 0xC0 {
        2
    } else if lead & 0xF0 == 0xE0 {
        3
    } else if lead & 0xF8 == 0xF0 {
        4
    } else {
        1
    }
}

/// Reads one value starting at `*cursor`, returning `None` (not an error)
/// on malformed input, per the reader's null-on-failure contract.
pub fn read_value(input: &str, cursor: &mut usize) -> Option<Value> {
    let mut reader = Reader::new(input, *cursor);
    match reader.read_value() {
        Ok(Some(v)) => {
            *cursor = reader.cursor;
            Some(v)
        }
        _ => None,
    }
}

pub fn parse(input: &str) -> Option<Value> {
    let mut cursor = 0;
    read_value(input, &mut cursor)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(v: Value) {
        let squished = print_to_string(&v, true);
        let parsed = parse(&squished).expect("parse should succeed");
        assert!(parsed.deep_equal(&v), "{squished} did not round-trip");
        let reprinted = print_to_string(&parsed, true);
        assert_eq!(reprinted, squished, "squished form is not stable");
    }

    #[test]
    fn integer_round_trip() {
        round_trip(Value::Integer(42));
        round_trip(Value::Integer(-129));
    }

    #[test]
    fn double_round_trip() {
        round_trip(Value::Double(3.5));
        round_trip(Value::Double(-0.25));
    }

    #[test]
    fn string_round_trip_with_escapes() {
        round_trip(Value::String("say \"hi\"\\bye".to_string()));
    }

    #[test]
    fn logical_round_trip() {
        round_trip(Value::Logical(true));
        round_trip(Value::Logical(false));
    }

    #[test]
    fn blob_round_trip() {
        round_trip(Value::Blob(vec![0xDE, 0xAD, 0xBE, 0xEF]));
    }

    #[test]
    fn date_round_trip() {
        round_trip(Value::Date(NimoDate::new(2026, 7, 28)));
    }

    #[test]
    fn time_round_trip() {
        round_trip(Value::Time(NimoTime::new(1, 2, 3, 4)));
    }

    #[test]
    fn address_round_trip() {
        round_trip(Value::Address(NimoAddress::from_ipv4(
            "192.168.1.5".parse().unwrap(),
        )));
    }

    #[test]
    fn array_round_trip() {
        round_trip(Value::Array(Array::from_vec(vec![
            Arc::new(Value::Integer(1)),
            Arc::new(Value::String("x".to_string())),
        ])));
    }

    #[test]
    fn map_round_trip() {
        let mut m = Map::new();
        m.insert(Arc::new(Value::String("a".to_string())), Arc::new(Value::Integer(1)))
            .unwrap();
        m.insert(Arc::new(Value::String("b".to_string())), Arc::new(Value::Integer(2)))
            .unwrap();
        round_trip(Value::Map(m));
    }

    #[test]
    fn bare_decimal_point_is_invalid() {
        assert!(parse(".").is_none());
    }

    #[test]
    fn exponent_without_digits_is_invalid() {
        assert!(parse("1e").is_none());
    }

    #[test]
    fn squished_keeps_the_mandatory_inter_element_space() {
        let v = Value::Array(Array::from_vec(vec![
            Arc::new(Value::Integer(1)),
            Arc::new(Value::Integer(2)),
        ]));
        assert_eq!(print_to_string(&v, false), "(1 2)");
        assert_eq!(print_to_string(&v, true), "(1 2)");
    }

    #[test]
    fn squished_map_omits_optional_padding() {
        let mut m = Map::new();
        m.insert(Arc::new(Value::String("a".to_string())), Arc::new(Value::Integer(1)))
            .unwrap();
        let v = Value::Map(m);
        assert_eq!(print_to_string(&v, true), "{\"a\"->1}");
        assert_eq!(print_to_string(&v, false), "{\"a\"-> 1}");
    }
}
