// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! STEP (ISO 10303-21) writer
//!
//! Builds an exchange structure in memory, one instance per line, and
//! serializes it with a fixed layout so identical inputs produce identical
//! bytes.

use std::fmt::Write as _;
use std::io::Write;
use std::path::Path;

use crate::error::{Error, Result};
use crate::schema::IfcSchemaVersion;

/// Attribute value of an entity instance
#[derive(Debug, Clone, PartialEq)]
pub enum StepValue {
    /// `#12`
    Ref(u32),
    /// `'text'`
    Str(String),
    /// `1.5`, `0.`
    Real(f64),
    /// `42`
    Integer(i64),
    /// `.METRE.`
    Enum(&'static str),
    /// `.T.` / `.F.`
    Bool(bool),
    /// `(a,b,c)`
    List(Vec<StepValue>),
    /// `IFCLABEL('x')`
    Typed(&'static str, Box<StepValue>),
    /// `$`
    Null,
    /// `*`
    Derived,
}

impl StepValue {
    pub fn str(value: impl Into<String>) -> Self {
        StepValue::Str(value.into())
    }

    /// `$` for `None`, a string otherwise
    pub fn opt_str(value: Option<&str>) -> Self {
        value.map(StepValue::str).unwrap_or(StepValue::Null)
    }

    pub fn refs(ids: &[u32]) -> Self {
        StepValue::List(ids.iter().copied().map(StepValue::Ref).collect())
    }

    pub fn reals(values: &[f64]) -> Self {
        StepValue::List(values.iter().copied().map(StepValue::Real).collect())
    }

    pub fn typed(type_name: &'static str, value: StepValue) -> Self {
        StepValue::Typed(type_name, Box::new(value))
    }
}

/// Encode a string literal body: quotes and backslashes doubled, non-ASCII
/// characters as `\X2\....\X0\` UTF-16 runs.
pub fn encode_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    let mut wide: Vec<u16> = Vec::new();

    let flush = |out: &mut String, wide: &mut Vec<u16>| {
        if wide.is_empty() {
            return;
        }
        out.push_str("\\X2\\");
        for unit in wide.iter() {
            let _ = write!(out, "{unit:04X}");
        }
        out.push_str("\\X0\\");
        wide.clear();
    };

    for c in value.chars() {
        if c.is_ascii() && !c.is_ascii_control() {
            flush(&mut out, &mut wide);
            match c {
                '\'' => out.push_str("''"),
                '\\' => out.push_str("\\\\"),
                _ => out.push(c),
            }
        } else {
            let mut buf = [0u16; 2];
            wide.extend_from_slice(c.encode_utf16(&mut buf));
        }
    }
    flush(&mut out, &mut wide);
    out
}

/// Decode a string literal body produced by [`encode_string`]
pub fn decode_string(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while !rest.is_empty() {
        if let Some(tail) = rest.strip_prefix("''") {
            out.push('\'');
            rest = tail;
        } else if let Some(tail) = rest.strip_prefix("\\\\") {
            out.push('\\');
            rest = tail;
        } else if let Some(tail) = rest.strip_prefix("\\X2\\") {
            let end = tail.find("\\X0\\").unwrap_or(tail.len());
            let hex = &tail[..end];
            let units: Vec<u16> = (0..hex.len() / 4)
                .filter_map(|i| u16::from_str_radix(&hex[i * 4..i * 4 + 4], 16).ok())
                .collect();
            out.push_str(&String::from_utf16_lossy(&units));
            rest = tail.get(end + 4..).unwrap_or("");
        } else {
            let mut chars = rest.chars();
            if let Some(c) = chars.next() {
                out.push(c);
            }
            rest = chars.as_str();
        }
    }
    out
}

/// Format a real so that it always carries a decimal point (`3` -> `3.`).
pub fn format_real(value: f64) -> String {
    // -0.0 would print as "-0."
    let value = if value == 0.0 { 0.0 } else { value };
    let mut text = format!("{value}");
    if !text.contains('.') && !text.contains('e') && !text.contains("inf") && !text.contains("NaN") {
        text.push('.');
    }
    text
}

fn write_value(out: &mut String, value: &StepValue) {
    match value {
        StepValue::Ref(id) => {
            let _ = write!(out, "#{id}");
        }
        StepValue::Str(s) => {
            out.push('\'');
            out.push_str(&encode_string(s));
            out.push('\'');
        }
        StepValue::Real(v) => out.push_str(&format_real(*v)),
        StepValue::Integer(v) => {
            let _ = write!(out, "{v}");
        }
        StepValue::Enum(e) => {
            out.push('.');
            out.push_str(e);
            out.push('.');
        }
        StepValue::Bool(b) => out.push_str(if *b { ".T." } else { ".F." }),
        StepValue::List(items) => {
            out.push('(');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(out, item);
            }
            out.push(')');
        }
        StepValue::Typed(name, inner) => {
            out.push_str(name);
            out.push('(');
            write_value(out, inner);
            out.push(')');
        }
        StepValue::Null => out.push('$'),
        StepValue::Derived => out.push('*'),
    }
}

fn check_finite(type_name: &str, value: &StepValue) -> Result<()> {
    match value {
        StepValue::Real(v) if !v.is_finite() => Err(Error::NonFiniteReal(type_name.to_string())),
        StepValue::List(items) => items.iter().try_for_each(|v| check_finite(type_name, v)),
        StepValue::Typed(_, inner) => check_finite(type_name, inner),
        _ => Ok(()),
    }
}

/// HEADER section contents
#[derive(Debug, Clone, PartialEq)]
pub struct StepHeader {
    pub description: Vec<String>,
    pub implementation_level: String,
    pub name: String,
    pub time_stamp: String,
    pub author: Vec<String>,
    pub organization: Vec<String>,
    pub preprocessor_version: String,
    pub originating_system: String,
    pub authorization: String,
    pub schema: IfcSchemaVersion,
}

impl StepHeader {
    pub fn new(schema: IfcSchemaVersion, name: impl Into<String>, time_stamp: impl Into<String>) -> Self {
        let system = format!("geo2ifc {}", env!("CARGO_PKG_VERSION"));
        Self {
            description: vec!["ViewDefinition [CoordinationView]".to_string()],
            implementation_level: "2;1".to_string(),
            name: name.into(),
            time_stamp: time_stamp.into(),
            author: vec![String::new()],
            organization: vec![String::new()],
            preprocessor_version: system.clone(),
            originating_system: system,
            authorization: String::new(),
            schema,
        }
    }

    fn str_list(items: &[String]) -> StepValue {
        StepValue::List(items.iter().map(StepValue::str).collect())
    }

    fn write(&self, out: &mut String) {
        out.push_str("HEADER;\n");

        out.push_str("FILE_DESCRIPTION(");
        write_value(out, &Self::str_list(&self.description));
        out.push(',');
        write_value(out, &StepValue::str(self.implementation_level.as_str()));
        out.push_str(");\n");

        let file_name = [
            StepValue::str(self.name.as_str()),
            StepValue::str(self.time_stamp.as_str()),
            Self::str_list(&self.author),
            Self::str_list(&self.organization),
            StepValue::str(self.preprocessor_version.as_str()),
            StepValue::str(self.originating_system.as_str()),
            StepValue::str(self.authorization.as_str()),
        ];
        out.push_str("FILE_NAME(");
        for (i, value) in file_name.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            write_value(out, value);
        }
        out.push_str(");\n");

        out.push_str("FILE_SCHEMA(");
        write_value(out, &StepValue::List(vec![StepValue::str(self.schema.identifier())]));
        out.push_str(");\n");

        out.push_str("ENDSEC;\n");
    }
}

/// One instance line: `#id=TYPE(attrs);`
#[derive(Debug, Clone, PartialEq)]
pub struct StepEntity {
    pub id: u32,
    pub type_name: &'static str,
    pub attributes: Vec<StepValue>,
}

/// In-memory exchange structure
#[derive(Debug, Clone)]
pub struct StepFile {
    pub header: StepHeader,
    entities: Vec<StepEntity>,
}

impl StepFile {
    pub fn new(header: StepHeader) -> Self {
        Self {
            header,
            entities: Vec::new(),
        }
    }

    /// Append an instance and return its id. Ids are assigned sequentially
    /// from 1.
    pub fn add(&mut self, type_name: &'static str, attributes: Vec<StepValue>) -> u32 {
        let id = self.entities.len() as u32 + 1;
        self.entities.push(StepEntity {
            id,
            type_name,
            attributes,
        });
        id
    }

    pub fn entities(&self) -> &[StepEntity] {
        &self.entities
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Serialize to STEP text
    pub fn to_step_string(&self) -> Result<String> {
        let mut out = String::with_capacity(256 + self.entities.len() * 96);
        out.push_str("ISO-10303-21;\n");
        self.header.write(&mut out);
        out.push_str("DATA;\n");
        for entity in &self.entities {
            for attr in &entity.attributes {
                check_finite(entity.type_name, attr)?;
            }
            let _ = write!(out, "#{}={}(", entity.id, entity.type_name);
            for (i, attr) in entity.attributes.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(&mut out, attr);
            }
            out.push_str(");\n");
        }
        out.push_str("ENDSEC;\n");
        out.push_str("END-ISO-10303-21;\n");
        Ok(out)
    }

    /// Serialize and write to `path`, replacing any existing file
    pub fn write_to(&self, path: &Path) -> Result<()> {
        let content = self.to_step_string()?;
        let mut file = std::fs::File::create(path)?;
        file.write_all(content.as_bytes())?;
        file.flush()?;
        Ok(())
    }
}
