// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! STEP/IFC Parser using nom
//!
//! Zero-copy tokenization and a string-aware entity scanner, used to read
//! back written models.

use nom::{
    branch::alt,
    bytes::complete::{take_while, take_while1},
    character::complete::{char, digit1, one_of},
    combinator::{map, map_res, opt, recognize},
    multi::separated_list0,
    sequence::{delimited, pair, preceded, tuple},
    IResult,
};
use rustc_hash::FxHashMap;

use crate::error::{Error, Result};
use crate::schema::IfcSchemaVersion;
use crate::step::decode_string;

/// STEP/IFC Token
#[derive(Debug, Clone, PartialEq)]
pub enum Token<'a> {
    /// Entity reference: #123
    EntityRef(u32),
    /// String literal body, still encoded: 'text'
    String(&'a str),
    /// Integer: 42
    Integer(i64),
    /// Float: 3.14
    Float(f64),
    /// Enum: .TRUE., .FALSE., .UNKNOWN.
    Enum(&'a str),
    /// List: (1, 2, 3)
    List(Vec<Token<'a>>),
    /// Typed value: IFCPARAMETERVALUE(0.), IFCBOOLEAN(.T.)
    TypedValue(&'a str, Vec<Token<'a>>),
    /// Null value: $
    Null,
    /// Asterisk (derived value): *
    Derived,
}

impl<'a> Token<'a> {
    pub fn as_entity_ref(&self) -> Option<u32> {
        match self {
            Token::EntityRef(id) => Some(*id),
            _ => None,
        }
    }

    /// Numeric value; integers are widened
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Token::Float(v) => Some(*v),
            Token::Integer(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Decoded string value
    pub fn as_string(&self) -> Option<String> {
        match self {
            Token::String(raw) => Some(decode_string(raw)),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Token<'a>]> {
        match self {
            Token::List(items) => Some(items),
            _ => None,
        }
    }
}

/// Parse entity reference: #123
fn entity_ref(input: &str) -> IResult<&str, Token> {
    map(
        preceded(char('#'), map_res(digit1, |s: &str| s.parse::<u32>())),
        Token::EntityRef,
    )(input)
}

/// Parse string literal: 'text'
/// '' escapes a single quote within a string
fn string_literal(input: &str) -> IResult<&str, Token> {
    fn parse_string_content(input: &str) -> IResult<&str, &str> {
        let bytes = input.as_bytes();
        let mut i = 0;

        while i < bytes.len() {
            if bytes[i] == b'\'' {
                if i + 1 < bytes.len() && bytes[i + 1] == b'\'' {
                    i += 2;
                    continue;
                }
                return Ok((&input[i..], &input[..i]));
            }
            i += 1;
        }

        Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Char,
        )))
    }

    map(
        delimited(char('\''), parse_string_content, char('\'')),
        Token::String,
    )(input)
}

/// Parse integer: 42, -42
fn integer(input: &str) -> IResult<&str, Token> {
    map_res(recognize(tuple((opt(one_of("+-")), digit1))), |s: &str| {
        s.parse::<i64>().map(Token::Integer)
    })(input)
}

/// Parse float: 3.14, -3.14, 1.5E-10, 0.
/// STEP allows reals like "0." without fraction digits
fn float(input: &str) -> IResult<&str, Token> {
    map_res(
        recognize(tuple((
            opt(one_of("+-")),
            digit1,
            char('.'),
            opt(digit1),
            opt(tuple((one_of("eE"), opt(one_of("+-")), digit1))),
        ))),
        |s: &str| s.parse::<f64>().map(Token::Float),
    )(input)
}

/// Parse enum: .TRUE., .F., .USERDEFINED.
fn enum_value(input: &str) -> IResult<&str, Token> {
    map(
        delimited(
            char('.'),
            take_while1(|c: char| c.is_alphanumeric() || c == '_'),
            char('.'),
        ),
        Token::Enum,
    )(input)
}

/// Parse null: $
fn null(input: &str) -> IResult<&str, Token> {
    map(char('$'), |_| Token::Null)(input)
}

/// Parse derived: *
fn derived(input: &str) -> IResult<&str, Token> {
    map(char('*'), |_| Token::Derived)(input)
}

/// Parse typed value: IFCLABEL('x'), IFCBOOLEAN(.T.)
fn typed_value(input: &str) -> IResult<&str, Token> {
    map(
        pair(
            take_while1(|c: char| c.is_alphanumeric() || c == '_'),
            delimited(
                char('('),
                separated_list0(delimited(ws, char(','), ws), token),
                char(')'),
            ),
        ),
        |(type_name, args)| Token::TypedValue(type_name, args),
    )(input)
}

/// Skip whitespace
fn ws(input: &str) -> IResult<&str, ()> {
    map(take_while(|c: char| c.is_whitespace()), |_| ())(input)
}

/// Parse a token with optional surrounding whitespace
fn token(input: &str) -> IResult<&str, Token> {
    delimited(
        ws,
        alt((
            float, // before integer, floats start with digits too
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

/// Parse list: (1, 2, 3) or nested lists
fn list(input: &str) -> IResult<&str, Token> {
    map(
        delimited(
            char('('),
            separated_list0(delimited(ws, char(','), ws), token),
            char(')'),
        ),
        Token::List,
    )(input)
}

/// Parenthesized argument list followed by `;`
fn arguments(input: &str) -> IResult<&str, Vec<Token>> {
    delimited(
        char('('),
        separated_list0(delimited(ws, char(','), ws), token),
        tuple((char(')'), ws, char(';'))),
    )(input)
}

fn keyword(input: &str) -> IResult<&str, &str> {
    delimited(
        ws,
        take_while1(|c: char| c.is_alphanumeric() || c == '_' || c == '-'),
        ws,
    )(input)
}

/// Parse a complete entity line
/// Example: #123=IFCPIPESEGMENT('guid',$,'name',$,$,#5,#9,$,.USERDEFINED.);
pub fn parse_entity(input: &str) -> Result<(u32, &str, Vec<Token>)> {
    let result: IResult<&str, (u32, &str, Vec<Token>)> = tuple((
        delimited(
            ws,
            preceded(char('#'), map_res(digit1, |s: &str| s.parse::<u32>())),
            ws,
        ),
        preceded(char('='), keyword),
        arguments,
    ))(input);

    match result {
        Ok((_, (id, type_name, args))) => Ok((id, type_name, args)),
        Err(e) => Err(Error::parse(0, format!("Failed to parse entity: {}", e))),
    }
}

/// Parse a header record such as `FILE_SCHEMA(('IFC4X3_ADD2'));`
pub fn parse_record(input: &str) -> Result<(&str, Vec<Token>)> {
    match tuple((keyword, arguments))(input) {
        Ok((_, (name, args))) => Ok((name, args)),
        Err(e) => Err(Error::parse(0, format!("Failed to parse record: {}", e))),
    }
}

/// Split `content` into `;`-terminated statements, ignoring `;` inside
/// string literals. Yields `(start, end)` byte ranges, `end` exclusive and
/// past the `;`.
fn next_statement(content: &str, from: usize) -> Option<(usize, usize)> {
    let bytes = content.as_bytes();
    let mut i = from;
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    if i >= bytes.len() {
        return None;
    }
    let start = i;
    let mut in_string = false;
    while i < bytes.len() {
        match bytes[i] {
            b'\'' => in_string = !in_string,
            b';' if !in_string => return Some((start, i + 1)),
            _ => {}
        }
        i += 1;
    }
    None
}

/// Fast entity scanner over the DATA section
/// Does not tokenize attributes; `;` and `#` inside strings are handled.
pub struct EntityScanner<'a> {
    content: &'a str,
    data_start: usize,
    position: usize,
}

impl<'a> EntityScanner<'a> {
    /// Create a new scanner. If the content has a `DATA;` section the
    /// scanner starts after it, otherwise at the beginning.
    pub fn new(content: &'a str) -> Self {
        let data_start = content.find("DATA;").map(|p| p + 5).unwrap_or(0);
        Self {
            content,
            data_start,
            position: data_start,
        }
    }

    /// Scan for the next entity
    /// Returns (entity_id, type_name, line_start, line_end)
    pub fn next_entity(&mut self) -> Option<(u32, &'a str, usize, usize)> {
        loop {
            let (start, end) = next_statement(self.content, self.position)?;
            self.position = end;
            let statement = &self.content[start..end];

            if statement == "ENDSEC;" {
                return None;
            }
            let Some(body) = statement.strip_prefix('#') else {
                continue;
            };

            let id_len = body.find(|c: char| !c.is_ascii_digit())?;
            let id = body[..id_len].parse::<u32>().ok()?;
            let after_id = body[id_len..].trim_start().strip_prefix('=')?.trim_start();
            let type_len = after_id.find(|c: char| c == '(' || c.is_whitespace())?;
            let type_name = &after_id[..type_len];

            return Some((id, type_name, start, end));
        }
    }

    /// Find all entities of a specific type
    pub fn find_by_type(&mut self, target_type: &str) -> Vec<(u32, usize, usize)> {
        let mut results = Vec::new();

        while let Some((id, type_name, start, end)) = self.next_entity() {
            if type_name.eq_ignore_ascii_case(target_type) {
                results.push((id, start, end));
            }
        }

        results
    }

    /// Reset scanner to the start of the DATA section
    pub fn reset(&mut self) {
        self.position = self.data_start;
    }
}

/// Values read from the HEADER section
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HeaderInfo {
    pub file_name: String,
    pub time_stamp: String,
    pub author: Vec<String>,
    pub organization: Vec<String>,
    pub authorization: String,
    pub schemas: Vec<String>,
}

fn string_list(token: Option<&Token>) -> Vec<String> {
    token
        .and_then(Token::as_list)
        .map(|items| items.iter().filter_map(Token::as_string).collect())
        .unwrap_or_default()
}

/// Parse the HEADER section
pub fn parse_header(content: &str) -> Result<HeaderInfo> {
    let header_start = content
        .find("HEADER;")
        .ok_or(Error::MissingSection("HEADER"))?
        + "HEADER;".len();
    let mut position = header_start;
    let mut info = HeaderInfo::default();

    while let Some((start, end)) = next_statement(content, position) {
        position = end;
        let statement = &content[start..end];
        if statement == "ENDSEC;" {
            return Ok(info);
        }
        let (name, args) = parse_record(statement).map_err(|e| match e {
            Error::Parse { message, .. } => Error::parse(start, message),
            other => other,
        })?;
        match name {
            "FILE_NAME" => {
                info.file_name = args.first().and_then(Token::as_string).unwrap_or_default();
                info.time_stamp = args.get(1).and_then(Token::as_string).unwrap_or_default();
                info.author = string_list(args.get(2));
                info.organization = string_list(args.get(3));
                info.authorization = args.get(6).and_then(Token::as_string).unwrap_or_default();
            }
            "FILE_SCHEMA" => info.schemas = string_list(args.first()),
            _ => {}
        }
    }

    Err(Error::MissingSection("ENDSEC after HEADER"))
}

/// Outcome of reading back a STEP file
#[derive(Debug, Clone)]
pub struct StepSummary {
    pub header: HeaderInfo,
    pub entity_count: usize,
    pub counts: FxHashMap<String, usize>,
}

impl StepSummary {
    pub fn count_of(&self, type_name: &str) -> usize {
        self.counts.get(type_name).copied().unwrap_or(0)
    }

    /// `FILE_SCHEMA` must name `schema`
    pub fn require_schema(&self, schema: IfcSchemaVersion) -> Result<()> {
        let expected = schema.identifier();
        if self.header.schemas.iter().any(|s| s == expected) {
            Ok(())
        } else {
            Err(Error::SchemaMismatch {
                expected: expected.to_string(),
                found: self.header.schemas.join(","),
            })
        }
    }
}

/// Read a whole STEP file: the header must parse, every DATA instance
/// must tokenize, and the trailer must be present.
pub fn read_step(content: &str) -> Result<StepSummary> {
    if !content.trim_start().starts_with("ISO-10303-21;") {
        return Err(Error::MissingSection("ISO-10303-21"));
    }
    if !content.trim_end().ends_with("END-ISO-10303-21;") {
        return Err(Error::MissingSection("END-ISO-10303-21"));
    }
    let header = parse_header(content)?;
    if !content.contains("DATA;") {
        return Err(Error::MissingSection("DATA"));
    }

    let mut scanner = EntityScanner::new(content);
    let mut counts: FxHashMap<String, usize> = FxHashMap::default();
    let mut entity_count = 0;
    while let Some((_, type_name, start, end)) = scanner.next_entity() {
        parse_entity(&content[start..end]).map_err(|e| match e {
            Error::Parse { message, .. } => Error::parse(start, message),
            other => other,
        })?;
        *counts.entry(type_name.to_string()).or_insert(0) += 1;
        entity_count += 1;
    }

    Ok(StepSummary {
        header,
        entity_count,
        counts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_ref() {
        assert_eq!(entity_ref("#123"), Ok(("", Token::EntityRef(123))));
        assert_eq!(entity_ref("#0"), Ok(("", Token::EntityRef(0))));
    }

    #[test]
    fn test_string_literal() {
        assert_eq!(string_literal("'hello'"), Ok(("", Token::String("hello"))));
        assert_eq!(string_literal("'it''s'"), Ok(("", Token::String("it''s"))));
        assert_eq!(
            Token::String("it''s").as_string().as_deref(),
            Some("it's")
        );
    }

    #[test]
    fn test_numbers() {
        assert_eq!(integer("-42"), Ok(("", Token::Integer(-42))));
        assert_eq!(float("0."), Ok(("", Token::Float(0.0))));
        assert_eq!(float("-3.14"), Ok(("", Token::Float(-3.14))));
        assert_eq!(float("1.5E-10"), Ok(("", Token::Float(1.5e-10))));
    }

    #[test]
    fn test_enum() {
        assert_eq!(enum_value(".T."), Ok(("", Token::Enum("T"))));
        assert_eq!(enum_value(".USERDEFINED."), Ok(("", Token::Enum("USERDEFINED"))));
    }

    #[test]
    fn test_nested_list() {
        let (_, token) = list("(1,(2.,3.),#4)").unwrap();
        let items = token.as_list().unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(items[1], Token::List(vec![Token::Float(2.0), Token::Float(3.0)]));
        assert_eq!(items[2].as_entity_ref(), Some(4));
    }

    #[test]
    fn test_parse_entity() {
        let input = "#12=IFCPIPESEGMENT('0abc',$,'NIS-1',$,'NIS_pipe_segment_type',#5,#9,$,.USERDEFINED.);";
        let (id, type_name, args) = parse_entity(input).unwrap();
        assert_eq!(id, 12);
        assert_eq!(type_name, "IFCPIPESEGMENT");
        assert_eq!(args.len(), 9);
        assert_eq!(args[8], Token::Enum("USERDEFINED"));
    }

    #[test]
    fn test_parse_typed_property() {
        let input = "#7=IFCPROPERTYSINGLEVALUE('Diameter',$,IFCREAL(0.15),$);";
        let (_, _, args) = parse_entity(input).unwrap();
        assert_eq!(args[2], Token::TypedValue("IFCREAL", vec![Token::Float(0.15)]));
    }

    #[test]
    fn test_scanner_ignores_semicolons_in_strings() {
        let content = "ISO-10303-21;\nHEADER;\nFILE_SCHEMA(('IFC4'));\nENDSEC;\nDATA;\n\
#1=IFCLABEL('a;b #2=X');\n#2=IFCWALL('g',$);\nENDSEC;\nEND-ISO-10303-21;\n";
        let mut scanner = EntityScanner::new(content);
        let (id, type_name, _, _) = scanner.next_entity().unwrap();
        assert_eq!((id, type_name), (1, "IFCLABEL"));
        let (id, type_name, _, _) = scanner.next_entity().unwrap();
        assert_eq!((id, type_name), (2, "IFCWALL"));
        assert!(scanner.next_entity().is_none());

        scanner.reset();
        assert_eq!(scanner.find_by_type("ifcwall").len(), 1);
    }

    #[test]
    fn test_read_step() {
        let content = "ISO-10303-21;\nHEADER;\n\
FILE_DESCRIPTION(('ViewDefinition [CoordinationView]'),'2;1');\n\
FILE_NAME('site.ifc','2024-11-07T10:24:00',('Jane','jane@example.org'),(''),'p','o','Nobody');\n\
FILE_SCHEMA(('IFC4X3_ADD2'));\nENDSEC;\nDATA;\n\
#1=IFCCARTESIANPOINT((0.,0.,0.));\n#2=IFCCARTESIANPOINT((1.,0.,0.));\nENDSEC;\nEND-ISO-10303-21;\n";
        let summary = read_step(content).unwrap();
        assert_eq!(summary.header.schemas, vec!["IFC4X3_ADD2".to_string()]);
        assert_eq!(summary.header.author, vec!["Jane".to_string(), "jane@example.org".to_string()]);
        assert_eq!(summary.header.authorization, "Nobody");
        assert_eq!(summary.entity_count, 2);
        assert_eq!(summary.count_of("IFCCARTESIANPOINT"), 2);
        assert!(summary.require_schema(IfcSchemaVersion::Ifc4x3Add2).is_ok());
        assert!(matches!(
            summary.require_schema(IfcSchemaVersion::Ifc4),
            Err(Error::SchemaMismatch { ref found, .. }) if found == "IFC4X3_ADD2"
        ));
    }

    #[test]
    fn test_read_step_rejects_truncated_file() {
        let content = "ISO-10303-21;\nHEADER;\nFILE_SCHEMA(('IFC4'));\nENDSEC;\nDATA;\n#1=IFCX((0.,";
        assert!(read_step(content).is_err());
    }

    #[test]
    fn test_read_step_reports_bad_instance() {
        let content = "ISO-10303-21;\nHEADER;\nFILE_SCHEMA(('IFC4'));\nENDSEC;\nDATA;\n\
#1=IFCX((0.,0.,?));\nENDSEC;\nEND-ISO-10303-21;\n";
        assert!(matches!(read_step(content), Err(Error::Parse { .. })));
    }
}
