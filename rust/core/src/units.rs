// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! SI units assigned to the project
//!
//! Coordinates are written in metres; no SI prefix is ever applied.

use crate::step::{StepFile, StepValue};

/// IfcSIUnit kinds used by generated models
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiUnit {
    Length,
    Area,
    Volume,
}

impl SiUnit {
    /// IfcUnitEnum value
    pub fn unit_type(&self) -> &'static str {
        match self {
            SiUnit::Length => "LENGTHUNIT",
            SiUnit::Area => "AREAUNIT",
            SiUnit::Volume => "VOLUMEUNIT",
        }
    }

    /// IfcSIUnitName value
    pub fn unit_name(&self) -> &'static str {
        match self {
            SiUnit::Length => "METRE",
            SiUnit::Area => "SQUARE_METRE",
            SiUnit::Volume => "CUBIC_METRE",
        }
    }

    /// Write `IFCSIUNIT(*,.TYPE.,$,.NAME.)` and return its id
    pub fn write(&self, file: &mut StepFile) -> u32 {
        file.add(
            "IFCSIUNIT",
            vec![
                StepValue::Derived,
                StepValue::Enum(self.unit_type()),
                StepValue::Null,
                StepValue::Enum(self.unit_name()),
            ],
        )
    }
}

/// Write metre-based length, area and volume units and their
/// IfcUnitAssignment; returns the assignment id.
pub fn write_metric_unit_assignment(file: &mut StepFile) -> u32 {
    let units: Vec<u32> = [SiUnit::Length, SiUnit::Area, SiUnit::Volume]
        .iter()
        .map(|unit| unit.write(file))
        .collect();
    file.add("IFCUNITASSIGNMENT", vec![StepValue::refs(&units)])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::IfcSchemaVersion;
    use crate::step::StepHeader;

    #[test]
    fn writes_three_units_and_assignment() {
        let mut file = StepFile::new(StepHeader::new(IfcSchemaVersion::Ifc4x3Add2, "u", "t"));
        let assignment = write_metric_unit_assignment(&mut file);
        assert_eq!(assignment, 4);

        let text = file.to_step_string().unwrap();
        assert!(text.contains("#1=IFCSIUNIT(*,.LENGTHUNIT.,$,.METRE.);"));
        assert!(text.contains("#2=IFCSIUNIT(*,.AREAUNIT.,$,.SQUARE_METRE.);"));
        assert!(text.contains("#3=IFCSIUNIT(*,.VOLUMEUNIT.,$,.CUBIC_METRE.);"));
        assert!(text.contains("#4=IFCUNITASSIGNMENT((#1,#2,#3));"));
    }
}
