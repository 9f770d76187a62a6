// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Supported IFC schema versions and the attribute layouts that differ
//! between them.

use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// IFC schema a model is written against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IfcSchemaVersion {
    Ifc4,
    Ifc4x3Add2,
}

impl IfcSchemaVersion {
    /// Identifier as written in `FILE_SCHEMA`
    pub fn identifier(&self) -> &'static str {
        match self {
            IfcSchemaVersion::Ifc4 => "IFC4",
            IfcSchemaVersion::Ifc4x3Add2 => "IFC4X3_ADD2",
        }
    }

    /// IfcCartesianPointList3D gained a `TagList` attribute in IFC4X3.
    #[inline]
    pub fn point_list_has_tags(&self) -> bool {
        matches!(self, IfcSchemaVersion::Ifc4x3Add2)
    }

    /// IfcMapConversion gained `ScaleY` and `ScaleZ` in IFC4X3.
    #[inline]
    pub fn map_conversion_has_axis_scales(&self) -> bool {
        matches!(self, IfcSchemaVersion::Ifc4x3Add2)
    }
}

impl fmt::Display for IfcSchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.identifier())
    }
}

impl FromStr for IfcSchemaVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "IFC4" => Ok(IfcSchemaVersion::Ifc4),
            "IFC4X3_ADD2" => Ok(IfcSchemaVersion::Ifc4x3Add2),
            other => Err(Error::UnsupportedSchema(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_identifiers() {
        assert_eq!(
            "IFC4X3_ADD2".parse::<IfcSchemaVersion>().unwrap(),
            IfcSchemaVersion::Ifc4x3Add2
        );
        assert_eq!("ifc4".parse::<IfcSchemaVersion>().unwrap(), IfcSchemaVersion::Ifc4);
    }

    #[test]
    fn rejects_ifc2x3() {
        let err = "IFC2X3".parse::<IfcSchemaVersion>().unwrap_err();
        assert!(err.to_string().contains("IFC2X3"));
    }

    #[test]
    fn identifier_round_trips_through_display() {
        for schema in [IfcSchemaVersion::Ifc4, IfcSchemaVersion::Ifc4x3Add2] {
            assert_eq!(schema.to_string().parse::<IfcSchemaVersion>().unwrap(), schema);
        }
    }
}
