// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Entity attribute extraction using nom.
//!
//! Parses one record's byte range into a [`DecodedEntity`] with a closed,
//! exhaustively-matchable attribute union. A record whose nesting cannot be
//! closed (truncated file) yields an error the pipeline treats as a gap.

use nom::{
    branch::alt,
    character::complete::{char, digit1, one_of},
    combinator::{map, map_res, opt, recognize},
    multi::separated_list0,
    sequence::{delimited, pair, preceded, tuple},
    IResult,
};

use crate::error::{Error, Result};
use crate::index::EntitySpan;

/// IFC entity attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    /// Entity reference: #123
    Ref(u32),
    /// String literal with escapes decoded
    String(String),
    /// Integer: 42
    Integer(i64),
    /// Float: 3.14
    Float(f64),
    /// Enumeration token: .TRUE., .ELEMENT.
    Enum(String),
    /// Nested list: (1, 2, 3)
    List(Vec<AttributeValue>),
    /// Typed value wrapper: IFCTEXT('A'), IFCBOOLEAN(.T.)
    Typed(String, Vec<AttributeValue>),
    /// Undefined value: $
    Null,
    /// Inherited/derived value: *
    Derived,
}

impl AttributeValue {
    #[inline]
    pub fn as_entity_ref(&self) -> Option<u32> {
        match self {
            AttributeValue::Ref(id) => Some(*id),
            _ => None,
        }
    }

    #[inline]
    pub fn as_string(&self) -> Option<&str> {
        match self {
            AttributeValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Enum token with the dots stripped.
    #[inline]
    pub fn as_enum(&self) -> Option<&str> {
        match self {
            AttributeValue::Enum(s) => Some(s),
            _ => None,
        }
    }

    #[inline]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            AttributeValue::Float(f) => Some(*f),
            AttributeValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    #[inline]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            AttributeValue::Integer(i) => Some(*i),
            AttributeValue::Float(f) => Some(*f as i64),
            _ => None,
        }
    }

    #[inline]
    pub fn as_list(&self) -> Option<&[AttributeValue]> {
        match self {
            AttributeValue::List(items) => Some(items),
            _ => None,
        }
    }

    /// True for both `$` and `*`.
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, AttributeValue::Null | AttributeValue::Derived)
    }

    /// Unwrap typed-value shells: `IFCTEXT('A')` reads as `'A'`.
    pub fn innermost(&self) -> &AttributeValue {
        match self {
            AttributeValue::Typed(_, args) if args.len() == 1 => args[0].innermost(),
            other => other,
        }
    }
}

/// Decoded IFC entity with positional attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedEntity {
    pub id: u32,
    /// Type name as written in the file (typically all-caps).
    pub type_name: String,
    pub attributes: Vec<AttributeValue>,
}

impl DecodedEntity {
    pub fn new(id: u32, type_name: impl Into<String>, attributes: Vec<AttributeValue>) -> Self {
        Self {
            id,
            type_name: type_name.into(),
            attributes,
        }
    }

    pub fn get(&self, index: usize) -> Option<&AttributeValue> {
        self.attributes.get(index)
    }

    pub fn get_ref(&self, index: usize) -> Option<u32> {
        self.get(index).and_then(|v| v.as_entity_ref())
    }

    pub fn get_string(&self, index: usize) -> Option<&str> {
        self.get(index).and_then(|v| v.as_string())
    }

    pub fn get_enum(&self, index: usize) -> Option<&str> {
        self.get(index).and_then(|v| v.as_enum())
    }

    pub fn get_float(&self, index: usize) -> Option<f64> {
        self.get(index).and_then(|v| v.as_float())
    }

    pub fn get_list(&self, index: usize) -> Option<&[AttributeValue]> {
        self.get(index).and_then(|v| v.as_list())
    }
}

/// Parse entity reference: #123
fn entity_ref(input: &str) -> IResult<&str, AttributeValue> {
    map(
        preceded(
            char('#'),
            map_res(digit1, |s: &str| lexical_core::parse::<u32>(s.as_bytes())),
        ),
        AttributeValue::Ref,
    )(input)
}

/// Parse string literal: 'text'
/// Decodes the STEP '' quote escape and backslash escapes.
fn string_literal(input: &str) -> IResult<&str, AttributeValue> {
    let bytes = input.as_bytes();
    if bytes.first() != Some(&b'\'') {
        return Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Char,
        )));
    }

    let mut decoded = String::new();
    let mut i = 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\'' => {
                if bytes.get(i + 1) == Some(&b'\'') {
                    decoded.push('\'');
                    i += 2;
                } else {
                    return Ok((&input[i + 1..], AttributeValue::String(decoded)));
                }
            }
            b'\\' if i + 1 < bytes.len() => {
                decoded.push(bytes[i + 1] as char);
                i += 2;
            }
            _ => {
                // Multi-byte UTF-8 sequences pass through untouched.
                let ch_len = utf8_len(bytes[i]);
                decoded.push_str(&input[i..i + ch_len]);
                i += ch_len;
            }
        }
    }

    // No closing quote found.
    Err(nom::Err::Error(nom::error::Error::new(
        input,
        nom::error::ErrorKind::Char,
    )))
}

#[inline]
fn utf8_len(first: u8) -> usize {
    match first {
        b if b < 0x80 => 1,
        b if b < 0xE0 => 2,
        b if b < 0xF0 => 3,
        _ => 4,
    }
}

/// Parse integer: 42, -42
fn integer(input: &str) -> IResult<&str, AttributeValue> {
    map_res(recognize(tuple((opt(char('-')), digit1))), |s: &str| {
        lexical_core::parse::<i64>(s.as_bytes()).map(AttributeValue::Integer)
    })(input)
}

/// Parse float: 3.14, -3.14, 1.5E-10, 0.
/// IFC allows floats like "0." without decimal digits.
fn float(input: &str) -> IResult<&str, AttributeValue> {
    map_res(
        recognize(tuple((
            opt(char('-')),
            digit1,
            char('.'),
            opt(digit1),
            opt(tuple((one_of("eE"), opt(one_of("+-")), digit1))),
        ))),
        |s: &str| fast_float::parse::<f64, _>(s).map(AttributeValue::Float),
    )(input)
}

/// Parse enum token: .TRUE., .ELEMENT.
fn enum_value(input: &str) -> IResult<&str, AttributeValue> {
    map(
        delimited(
            char('.'),
            nom::bytes::complete::take_while1(|c: char| c.is_alphanumeric() || c == '_'),
            char('.'),
        ),
        |s: &str| AttributeValue::Enum(s.to_string()),
    )(input)
}

/// Parse null: $
fn null(input: &str) -> IResult<&str, AttributeValue> {
    map(char('$'), |_| AttributeValue::Null)(input)
}

/// Parse derived: *
fn derived(input: &str) -> IResult<&str, AttributeValue> {
    map(char('*'), |_| AttributeValue::Derived)(input)
}

/// Parse typed value: IFCPARAMETERVALUE(0.), IFCBOOLEAN(.T.)
fn typed_value(input: &str) -> IResult<&str, AttributeValue> {
    map(
        pair(
            nom::bytes::complete::take_while1(|c: char| c.is_alphanumeric() || c == '_'),
            delimited(
                char('('),
                separated_list0(delimited(ws, char(','), ws), token),
                char(')'),
            ),
        ),
        |(type_name, args): (&str, _)| AttributeValue::Typed(type_name.to_string(), args),
    )(input)
}

/// Skip whitespace
fn ws(input: &str) -> IResult<&str, ()> {
    map(
        nom::bytes::complete::take_while(|c: char| c.is_whitespace()),
        |_| (),
    )(input)
}

/// Parse a token with optional surrounding whitespace
fn token(input: &str) -> IResult<&str, AttributeValue> {
    delimited(
        ws,
        alt((
            float, // try float before integer (float includes '.')
            integer,
            entity_ref,
            string_literal,
            enum_value,
            list,
            typed_value,
            null,
            derived,
        )),
        ws,
    )(input)
}

/// Parse list: (1, 2, 3), recursively
fn list(input: &str) -> IResult<&str, AttributeValue> {
    map(
        delimited(
            char('('),
            separated_list0(delimited(ws, char(','), ws), token),
            char(')'),
        ),
        AttributeValue::List,
    )(input)
}

/// Parse a complete record span: `#123 = IFCWALL('guid', $, ...)`
pub fn parse_record(input: &str) -> Result<DecodedEntity> {
    let result: IResult<&str, (u32, &str, Vec<AttributeValue>)> = tuple((
        delimited(
            ws,
            preceded(
                char('#'),
                map_res(digit1, |s: &str| lexical_core::parse::<u32>(s.as_bytes())),
            ),
            ws,
        ),
        preceded(
            char('='),
            delimited(
                ws,
                nom::bytes::complete::take_while1(|c: char| c.is_alphanumeric() || c == '_'),
                ws,
            ),
        ),
        delimited(
            char('('),
            separated_list0(delimited(ws, char(','), ws), token),
            char(')'),
        ),
    ))(input);

    match result {
        Ok((_, (id, type_name, attributes))) => Ok(DecodedEntity::new(id, type_name, attributes)),
        Err(e) => {
            let preview: String = input.chars().take(80).collect();
            Err(Error::parse(
                0,
                format!("failed to decode record: {e:?}, input: {preview:?}"),
            ))
        }
    }
}

/// Extracts typed attribute lists from record byte ranges.
pub struct EntityExtractor<'a> {
    content: &'a str,
}

impl<'a> EntityExtractor<'a> {
    pub fn new(content: &'a str) -> Self {
        Self { content }
    }

    /// Decode the record at `span`. Truncated or garbled records return an
    /// error the caller records as a coverage gap.
    pub fn extract(&self, span: EntitySpan) -> Result<DecodedEntity> {
        let range = span.range();
        if range.end > self.content.len() {
            return Err(Error::parse(span.line, "record span past end of buffer"));
        }
        parse_record(&self.content[range]).map_err(|e| match e {
            Error::Parse { message, .. } => Error::Parse {
                line: span.line,
                message,
            },
            other => other,
        })
    }

    /// Random-access decode through a prebuilt index.
    pub fn extract_by_id(
        &self,
        index: &crate::index::EntityIndex,
        express_id: u32,
    ) -> Result<DecodedEntity> {
        let span = index
            .get(express_id)
            .ok_or(Error::EntityNotFound(express_id))?;
        self.extract(span)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_tokens() {
        assert_eq!(token("42").unwrap().1, AttributeValue::Integer(42));
        assert_eq!(token("-42").unwrap().1, AttributeValue::Integer(-42));
        assert_eq!(token("3.14").unwrap().1, AttributeValue::Float(3.14));
        assert_eq!(token("1.5E-10").unwrap().1, AttributeValue::Float(1.5e-10));
        assert_eq!(token("0.").unwrap().1, AttributeValue::Float(0.0));
        assert_eq!(token("#123").unwrap().1, AttributeValue::Ref(123));
        assert_eq!(token("$").unwrap().1, AttributeValue::Null);
        assert_eq!(token("*").unwrap().1, AttributeValue::Derived);
        assert_eq!(
            token(".ELEMENT.").unwrap().1,
            AttributeValue::Enum("ELEMENT".to_string())
        );
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(
            token("'hello'").unwrap().1,
            AttributeValue::String("hello".to_string())
        );
        assert_eq!(
            token("'it''s'").unwrap().1,
            AttributeValue::String("it's".to_string())
        );
        assert_eq!(
            token(r"'a\'b'").unwrap().1,
            AttributeValue::String("a'b".to_string())
        );
    }

    #[test]
    fn test_nested_list() {
        let (_, value) = list("(1,(2,3),4)").unwrap();
        let items = value.as_list().unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(items[1].as_list().unwrap().len(), 2);
    }

    #[test]
    fn test_typed_value() {
        let (_, value) = token("IFCBOOLEAN(.T.)").unwrap();
        match &value {
            AttributeValue::Typed(name, args) => {
                assert_eq!(name, "IFCBOOLEAN");
                assert_eq!(args[0], AttributeValue::Enum("T".to_string()));
            }
            other => panic!("expected typed value, got {other:?}"),
        }
        assert_eq!(value.innermost(), &AttributeValue::Enum("T".to_string()));
    }

    #[test]
    fn test_parse_record() {
        let entity = parse_record("#123=IFCWALL('guid','owner',$,$,'name',$,$,$)").unwrap();
        assert_eq!(entity.id, 123);
        assert_eq!(entity.type_name, "IFCWALL");
        assert_eq!(entity.attributes.len(), 8);
        assert_eq!(entity.get_string(0), Some("guid"));
        assert_eq!(entity.get_string(4), Some("name"));
        assert!(entity.get(2).unwrap().is_null());
    }

    #[test]
    fn test_parse_record_nested_list() {
        let entity = parse_record("#9=IFCDIRECTION((0.,0.,1.))").unwrap();
        assert_eq!(entity.attributes.len(), 1);
        let coords = entity.get_list(0).unwrap();
        assert_eq!(coords.len(), 3);
        assert_eq!(coords[2], AttributeValue::Float(1.0));
    }

    #[test]
    fn test_truncated_record_is_error() {
        assert!(parse_record("#1=IFCWALL('guid',$,(").is_err());
    }

    #[test]
    fn test_extractor_with_tokenizer_span() {
        use crate::index::{EntityIndexBuilder, EntitySpan};
        use crate::tokenizer::StepTokenizer;

        let content = "garbage #2=IFCWALL('2vq',$,'Wall-001',$,$,#3,#4,$); trailing";
        let mut builder = EntityIndexBuilder::new();
        for entity in StepTokenizer::new(content) {
            builder.add(&entity);
        }
        let index = builder.build();
        let extractor = EntityExtractor::new(content);

        let entity = extractor.extract(index.get(2).unwrap()).unwrap();
        assert_eq!(entity.id, 2);
        assert_eq!(entity.type_name, "IFCWALL");
        assert_eq!(entity.get_string(2), Some("Wall-001"));
        assert_eq!(entity.get_ref(5), Some(3));

        let bad = EntitySpan {
            offset: 0,
            len: 7,
            line: 1,
        };
        assert!(extractor.extract(bad).is_err());

        let by_id = extractor.extract_by_id(&index, 2).unwrap();
        assert_eq!(by_id.get_string(2), Some("Wall-001"));
        assert!(matches!(
            extractor.extract_by_id(&index, 404),
            Err(crate::error::Error::EntityNotFound(404))
        ));
    }
}
