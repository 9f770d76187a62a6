// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! PLY (Stanford polygon) reader for custom terrain meshes
//!
//! Supports `ascii`, `binary_little_endian` and `binary_big_endian` bodies.
//! Only `vertex` x/y/z and `face` index lists are kept; any other element
//! or property is read and discarded. Polygons are fan-triangulated.

use crate::error::{Error, Result};
use crate::mesh::TerrainMesh;
use nalgebra::Point3;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Ascii,
    BinaryLittleEndian,
    BinaryBigEndian,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scalar {
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    F32,
    F64,
}

impl Scalar {
    fn parse(name: &str) -> Result<Self> {
        Ok(match name {
            "char" | "int8" => Scalar::I8,
            "uchar" | "uint8" => Scalar::U8,
            "short" | "int16" => Scalar::I16,
            "ushort" | "uint16" => Scalar::U16,
            "int" | "int32" => Scalar::I32,
            "uint" | "uint32" => Scalar::U32,
            "float" | "float32" => Scalar::F32,
            "double" | "float64" => Scalar::F64,
            other => return Err(Error::Ply(format!("unknown scalar type '{}'", other))),
        })
    }

    fn size(self) -> usize {
        match self {
            Scalar::I8 | Scalar::U8 => 1,
            Scalar::I16 | Scalar::U16 => 2,
            Scalar::I32 | Scalar::U32 | Scalar::F32 => 4,
            Scalar::F64 => 8,
        }
    }
}

#[derive(Debug, Clone)]
enum PropertyKind {
    Scalar(Scalar),
    List { count: Scalar, item: Scalar },
}

#[derive(Debug, Clone)]
struct Property {
    name: String,
    kind: PropertyKind,
}

#[derive(Debug, Clone)]
struct Element {
    name: String,
    count: usize,
    properties: Vec<Property>,
}

struct Header {
    format: Format,
    elements: Vec<Element>,
    body_offset: usize,
}

fn parse_header(data: &[u8]) -> Result<Header> {
    const END: &[u8] = b"end_header";
    let end = data
        .windows(END.len())
        .position(|w| w == END)
        .ok_or_else(|| Error::Ply("missing end_header".into()))?;
    // Body starts after the newline that terminates end_header
    let mut body_offset = end + END.len();
    while body_offset < data.len() && data[body_offset] != b'\n' {
        body_offset += 1;
    }
    body_offset = (body_offset + 1).min(data.len());

    let text = std::str::from_utf8(&data[..end])
        .map_err(|_| Error::Ply("header is not valid UTF-8".into()))?;
    let mut lines = text.lines().map(str::trim).filter(|l| !l.is_empty());

    if lines.next() != Some("ply") {
        return Err(Error::Ply("missing 'ply' magic".into()));
    }

    let mut format = None;
    let mut elements: Vec<Element> = Vec::new();

    for line in lines {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        match tokens.as_slice() {
            ["format", kind, _version] => {
                format = Some(match *kind {
                    "ascii" => Format::Ascii,
                    "binary_little_endian" => Format::BinaryLittleEndian,
                    "binary_big_endian" => Format::BinaryBigEndian,
                    other => return Err(Error::Ply(format!("unknown format '{}'", other))),
                });
            }
            ["comment", ..] | ["obj_info", ..] => {}
            ["element", name, count] => {
                let count = count
                    .parse()
                    .map_err(|_| Error::Ply(format!("invalid element count '{}'", count)))?;
                elements.push(Element {
                    name: name.to_string(),
                    count,
                    properties: Vec::new(),
                });
            }
            ["property", "list", count, item, name] => {
                let element = elements
                    .last_mut()
                    .ok_or_else(|| Error::Ply("property before element".into()))?;
                element.properties.push(Property {
                    name: name.to_string(),
                    kind: PropertyKind::List {
                        count: Scalar::parse(count)?,
                        item: Scalar::parse(item)?,
                    },
                });
            }
            ["property", ty, name] => {
                let element = elements
                    .last_mut()
                    .ok_or_else(|| Error::Ply("property before element".into()))?;
                element.properties.push(Property {
                    name: name.to_string(),
                    kind: PropertyKind::Scalar(Scalar::parse(ty)?),
                });
            }
            _ => return Err(Error::Ply(format!("unexpected header line '{}'", line))),
        }
    }

    Ok(Header {
        format: format.ok_or_else(|| Error::Ply("missing format line".into()))?,
        elements,
        body_offset,
    })
}

/// Sequential value source over an ASCII or binary body
enum Body<'a> {
    Ascii(std::str::SplitAsciiWhitespace<'a>),
    Binary {
        data: &'a [u8],
        pos: usize,
        big_endian: bool,
    },
}

impl<'a> Body<'a> {
    fn read(&mut self, ty: Scalar) -> Result<f64> {
        match self {
            Body::Ascii(tokens) => {
                let token = tokens
                    .next()
                    .ok_or_else(|| Error::Ply("unexpected end of data".into()))?;
                token
                    .parse::<f64>()
                    .map_err(|_| Error::Ply(format!("invalid number '{}'", token)))
            }
            Body::Binary {
                data,
                pos,
                big_endian,
            } => {
                let size = ty.size();
                let bytes = data
                    .get(*pos..*pos + size)
                    .ok_or_else(|| Error::Ply("unexpected end of data".into()))?;
                *pos += size;
                let mut buf = [0u8; 8];
                buf[..size].copy_from_slice(bytes);
                if *big_endian {
                    buf[..size].reverse();
                }
                Ok(match ty {
                    Scalar::I8 => buf[0] as i8 as f64,
                    Scalar::U8 => buf[0] as f64,
                    Scalar::I16 => i16::from_le_bytes([buf[0], buf[1]]) as f64,
                    Scalar::U16 => u16::from_le_bytes([buf[0], buf[1]]) as f64,
                    Scalar::I32 => i32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]) as f64,
                    Scalar::U32 => u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]) as f64,
                    Scalar::F32 => f32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]) as f64,
                    Scalar::F64 => f64::from_le_bytes(buf),
                })
            }
        }
    }
}

fn read_index(body: &mut Body, ty: Scalar) -> Result<u32> {
    let value = body.read(ty)?;
    if value < 0.0 || value.fract() != 0.0 || value > u32::MAX as f64 {
        return Err(Error::Ply(format!("invalid vertex index {}", value)));
    }
    Ok(value as u32)
}

/// Parse a PLY document into a triangle mesh
pub fn parse_ply(data: &[u8]) -> Result<TerrainMesh> {
    let header = parse_header(data)?;
    let body_bytes = &data[header.body_offset..];

    let mut body = match header.format {
        Format::Ascii => {
            let text = std::str::from_utf8(body_bytes)
                .map_err(|_| Error::Ply("ASCII body is not valid UTF-8".into()))?;
            Body::Ascii(text.split_ascii_whitespace())
        }
        Format::BinaryLittleEndian | Format::BinaryBigEndian => Body::Binary {
            data: body_bytes,
            pos: 0,
            big_endian: header.format == Format::BinaryBigEndian,
        },
    };

    let mut vertices = Vec::new();
    let mut triangles = Vec::new();

    for element in &header.elements {
        if element.properties.is_empty() {
            continue;
        }
        match element.name.as_str() {
            "vertex" => {
                let axis = |name: &str| element.properties.iter().position(|p| p.name == name);
                let (ix, iy, iz) = match (axis("x"), axis("y"), axis("z")) {
                    (Some(x), Some(y), Some(z)) => (x, y, z),
                    _ => return Err(Error::Ply("vertex element lacks x/y/z".into())),
                };
                // Every row takes at least one byte of body
                vertices.reserve(element.count.min(body_bytes.len()));
                let mut row = vec![0.0; element.properties.len()];
                for _ in 0..element.count {
                    for (slot, property) in row.iter_mut().zip(&element.properties) {
                        *slot = match property.kind {
                            PropertyKind::Scalar(ty) => body.read(ty)?,
                            PropertyKind::List { count, item } => {
                                skip_list(&mut body, count, item)?;
                                0.0
                            }
                        };
                    }
                    vertices.push(Point3::new(row[ix], row[iy], row[iz]));
                }
            }
            "face" => {
                let mut polygon: Vec<u32> = Vec::new();
                for _ in 0..element.count {
                    for property in &element.properties {
                        match property.kind {
                            PropertyKind::List { count, item }
                                if property.name == "vertex_indices"
                                    || property.name == "vertex_index" =>
                            {
                                let n = read_index(&mut body, count)? as usize;
                                polygon.clear();
                                for _ in 0..n {
                                    polygon.push(read_index(&mut body, item)?);
                                }
                            }
                            PropertyKind::List { count, item } => {
                                skip_list(&mut body, count, item)?;
                            }
                            PropertyKind::Scalar(ty) => {
                                body.read(ty)?;
                            }
                        }
                    }
                    for i in 1..polygon.len().saturating_sub(1) {
                        triangles.push([polygon[0], polygon[i], polygon[i + 1]]);
                    }
                }
            }
            _ => {
                for _ in 0..element.count {
                    for property in &element.properties {
                        match property.kind {
                            PropertyKind::Scalar(ty) => {
                                body.read(ty)?;
                            }
                            PropertyKind::List { count, item } => {
                                skip_list(&mut body, count, item)?;
                            }
                        }
                    }
                }
            }
        }
    }

    TerrainMesh::new(vertices, triangles)
}

fn skip_list(body: &mut Body, count: Scalar, item: Scalar) -> Result<()> {
    let n = read_index(body, count)?;
    for _ in 0..n {
        body.read(item)?;
    }
    Ok(())
}

/// Read a PLY file from disk
pub fn read_ply(path: &Path) -> Result<TerrainMesh> {
    let data = std::fs::read(path)?;
    parse_ply(&data)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ASCII_QUAD: &str = "ply
format ascii 1.0
comment exported terrain
element vertex 4
property double x
property double y
property double z
property uchar red
element face 1
property list uchar int vertex_indices
end_header
0 0 10 255
10 0 10 255
10 10 12 255
0 10 12 255
4 0 1 2 3
";

    #[test]
    fn ascii_quad_is_fan_triangulated() {
        let mesh = parse_ply(ASCII_QUAD.as_bytes()).unwrap();
        assert_eq!(mesh.vertex_count(), 4);
        assert_eq!(mesh.triangles, vec![[0, 1, 2], [0, 2, 3]]);
        assert_eq!(mesh.vertices[2], Point3::new(10.0, 10.0, 12.0));
    }

    fn binary_triangle(big_endian: bool) -> Vec<u8> {
        let format = if big_endian {
            "binary_big_endian"
        } else {
            "binary_little_endian"
        };
        let mut data = format!(
            "ply\nformat {} 1.0\nelement vertex 3\nproperty float x\nproperty float y\nproperty float z\nelement face 1\nproperty list uchar uint vertex_indices\nend_header\n",
            format
        )
        .into_bytes();
        for v in [[0.0f32, 0.0, 1.0], [2.0, 0.0, 1.0], [0.0, 2.0, 3.0]] {
            for c in v {
                data.extend(if big_endian {
                    c.to_be_bytes()
                } else {
                    c.to_le_bytes()
                });
            }
        }
        data.push(3);
        for i in [0u32, 1, 2] {
            data.extend(if big_endian {
                i.to_be_bytes()
            } else {
                i.to_le_bytes()
            });
        }
        data
    }

    #[test]
    fn binary_both_endians() {
        for big_endian in [false, true] {
            let mesh = parse_ply(&binary_triangle(big_endian)).unwrap();
            assert_eq!(mesh.triangles, vec![[0, 1, 2]]);
            assert_eq!(mesh.vertices[2], Point3::new(0.0, 2.0, 3.0));
        }
    }

    #[test]
    fn truncated_body_is_an_error() {
        let mut data = binary_triangle(false);
        data.truncate(data.len() - 2);
        assert!(matches!(parse_ply(&data), Err(Error::Ply(_))));
    }

    #[test]
    fn oversized_vertex_count_is_an_error() {
        let data = b"ply\nformat ascii 1.0\nelement vertex 18446744073709551615\nproperty float x\nproperty float y\nproperty float z\nend_header\n0 0 1\n";
        assert!(matches!(parse_ply(data), Err(Error::Ply(_))));

        let mut binary = binary_triangle(false);
        let header_end = binary.windows(10).position(|w| w == b"end_header").unwrap();
        let header = String::from_utf8(binary[..header_end].to_vec())
            .unwrap()
            .replace("element vertex 3", "element vertex 4294967295");
        binary.splice(..header_end, header.into_bytes());
        assert!(matches!(parse_ply(&binary), Err(Error::Ply(_))));
    }

    #[test]
    fn rejects_non_ply() {
        assert!(parse_ply(b"solid cube\nend_header\n").is_err());
    }
}
