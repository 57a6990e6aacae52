//! The data-element signature grammar (spec §6): a compact, parseable
//! string form of a `DataElement` tree used to detect when two ports
//! share the same wire layout without comparing their compiled programs
//! byte-for-byte.
//!
//! Grammar (extension of spec §6's scalar-letter alphabet — see
//! `type_code.rs` for the letter table):
//!
//! ```text
//! element   := scalar | record
//! scalar    := letter [ range ] [ array ] [ queue ]
//! record    := '{' field* '}' [ array ] [ queue ]
//! field     := '"' name '"' element
//! range     := '(' integer ',' integer ')'
//! array     := '[' integer [ '*' ] ']'          ; '*' marks dynamic
//! queue     := ':' integer
//! ```

use crate::element::{DataElement, ElementAttributes, Field, RangeLimit};
use crate::error::{ApxError, Result};
use crate::type_code::TypeCode;

/// Renders `element`'s signature string.
pub fn element_signature(element: &DataElement) -> String {
    let mut out = String::new();
    write_element(&mut out, element);
    out
}

fn write_element(out: &mut String, element: &DataElement) {
    match element {
        DataElement::Scalar {
            type_code, range, ..
        } => {
            out.push(type_code.grammar_letter());
            if let Some(range) = range {
                write_range(out, *range);
            }
        }
        DataElement::Record { fields, .. } => {
            out.push('{');
            for field in fields {
                out.push('"');
                out.push_str(&field.name);
                out.push('"');
                write_element(out, &field.element);
            }
            out.push('}');
        }
    }
    write_attributes(out, element.attributes());
}

fn write_range(out: &mut String, range: RangeLimit) {
    match range {
        RangeLimit::Signed { lo, hi } => out.push_str(&format!("({lo},{hi})")),
        RangeLimit::Unsigned { lo, hi } => out.push_str(&format!("({lo},{hi})")),
    }
}

fn write_attributes(out: &mut String, attrs: &ElementAttributes) {
    if attrs.is_array() {
        out.push('[');
        out.push_str(&attrs.array_len.to_string());
        if attrs.dynamic {
            out.push('*');
        }
        out.push(']');
    }
    if attrs.is_queued() {
        out.push(':');
        out.push_str(&attrs.queue_len.to_string());
    }
}

/// Parses a signature string back into a `DataElement`.
pub fn parse_signature(input: &str) -> Result<DataElement> {
    let mut parser = Parser {
        chars: input.chars().collect(),
        pos: 0,
    };
    let element = parser.parse_element()?;
    if parser.pos != parser.chars.len() {
        return Err(ApxError::Parse(format!(
            "trailing characters in signature at offset {}",
            parser.pos
        )));
    }
    Ok(element)
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    fn expect(&mut self, expected: char) -> Result<()> {
        match self.bump() {
            Some(c) if c == expected => Ok(()),
            Some(c) => Err(ApxError::Parse(format!(
                "expected '{expected}', found '{c}' at offset {}",
                self.pos - 1
            ))),
            None => Err(ApxError::Parse(format!(
                "expected '{expected}', found end of signature"
            ))),
        }
    }

    fn parse_element(&mut self) -> Result<DataElement> {
        let mut element = match self.peek() {
            Some('{') => self.parse_record()?,
            Some(c) => {
                let type_code = TypeCode::ALL
                    .iter()
                    .find(|tc| tc.grammar_letter() == c)
                    .copied()
                    .ok_or_else(|| ApxError::Parse(format!("unknown grammar letter '{c}'")))?;
                self.bump();
                let mut scalar = DataElement::scalar(type_code);
                if self.peek() == Some('(') {
                    let range = self.parse_range(type_code)?;
                    scalar = scalar.with_range(range);
                }
                scalar
            }
            None => return Err(ApxError::Parse("unexpected end of signature".to_string())),
        };

        if self.peek() == Some('[') {
            self.bump();
            let len = self.parse_u32()?;
            let dynamic = if self.peek() == Some('*') {
                self.bump();
                true
            } else {
                false
            };
            self.expect(']')?;
            element = element.with_array(len, dynamic);
        }
        if self.peek() == Some(':') {
            self.bump();
            let len = self.parse_u32()?;
            element = element.with_queue(len);
        }
        Ok(element)
    }

    fn parse_record(&mut self) -> Result<DataElement> {
        self.expect('{')?;
        let mut fields = Vec::new();
        loop {
            if self.peek() == Some('}') {
                self.bump();
                break;
            }
            self.expect('"')?;
            let name = self.parse_name()?;
            self.expect('"')?;
            let element = self.parse_element()?;
            fields.push(Field { name, element });
        }
        Ok(DataElement::record(fields))
    }

    fn parse_name(&mut self) -> Result<String> {
        let mut name = String::new();
        loop {
            match self.peek() {
                Some('"') | None => break,
                Some(c) => {
                    name.push(c);
                    self.bump();
                }
            }
        }
        Ok(name)
    }

    fn parse_u32(&mut self) -> Result<u32> {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.bump();
        }
        if self.pos == start {
            return Err(ApxError::Parse(format!(
                "expected a number at offset {start}"
            )));
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        text.parse()
            .map_err(|_| ApxError::Parse(format!("invalid number '{text}'")))
    }

    fn parse_i64(&mut self) -> Result<i64> {
        let start = self.pos;
        if self.peek() == Some('-') {
            self.bump();
        }
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.bump();
        }
        if self.pos == start {
            return Err(ApxError::Parse(format!(
                "expected a number at offset {start}"
            )));
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        text.parse()
            .map_err(|_| ApxError::Parse(format!("invalid number '{text}'")))
    }

    fn parse_range(&mut self, type_code: TypeCode) -> Result<RangeLimit> {
        self.expect('(')?;
        let lo = self.parse_i64()?;
        self.expect(',')?;
        let hi = self.parse_i64()?;
        self.expect(')')?;
        let unsigned = matches!(
            type_code,
            TypeCode::U8 | TypeCode::U16 | TypeCode::U32 | TypeCode::U64
        );
        if unsigned {
            Ok(RangeLimit::Unsigned {
                lo: lo as u64,
                hi: hi as u64,
            })
        } else {
            Ok(RangeLimit::Signed { lo, hi })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::Field;

    #[test]
    fn scalar_signature_round_trips() {
        let element = DataElement::scalar(TypeCode::U16).with_array(8, true);
        let signature = element_signature(&element);
        assert_eq!(signature, "S[8*]");
        let parsed = parse_signature(&signature).unwrap();
        assert_eq!(parsed, element);
    }

    #[test]
    fn record_signature_round_trips_with_names_and_range() {
        let element = DataElement::record(vec![
            Field {
                name: "Speed".into(),
                element: DataElement::scalar(TypeCode::I16)
                    .with_range(RangeLimit::Signed { lo: -100, hi: 100 }),
            },
            Field {
                name: "Gear".into(),
                element: DataElement::scalar(TypeCode::U8),
            },
        ]);
        let signature = element_signature(&element);
        assert_eq!(signature, "{\"Speed\"s(-100,100)\"Gear\"C}");
        let parsed = parse_signature(&signature).unwrap();
        assert_eq!(parsed, element);
    }

    #[test]
    fn queued_port_signature_round_trips() {
        let element = DataElement::scalar(TypeCode::U32).with_queue(10);
        let signature = element_signature(&element);
        assert_eq!(signature, "L:10");
        assert_eq!(parse_signature(&signature).unwrap(), element);
    }

    #[test]
    fn unknown_grammar_letter_is_a_parse_error() {
        assert!(parse_signature("Z").is_err());
    }
}
