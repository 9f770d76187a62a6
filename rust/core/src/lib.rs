// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # geo2ifc Core
//!
//! STEP/IFC authoring and reading for pipe network models.
//!
//! ## Overview
//!
//! - **STEP Writing**: an in-memory exchange structure serialized with a
//!   fixed layout ([`StepFile`])
//! - **Model Authoring**: project, site, georeferencing and swept-disk pipe
//!   segments from 3D polylines ([`build_pipe_network`])
//! - **GlobalIds**: deterministic 22-character ids ([`guid`])
//! - **Reading Back**: [nom](https://docs.rs/nom) tokenizer and entity
//!   scanner ([`read_step`])
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use geo2ifc_core::{build_pipe_network, read_step};
//!
//! let file = build_pipe_network(&spec)?;
//! let text = file.to_step_string()?;
//! let summary = read_step(&text)?;
//! assert_eq!(summary.count_of("IFCPIPESEGMENT"), spec.segments.len());
//! ```

pub mod error;
pub mod georef;
pub mod guid;
pub mod model;
pub mod parser;
pub mod schema;
pub mod step;
pub mod units;

pub use error::{Error, Result};
pub use georef::{GeoReference, OriginShift, ProjectedCrs};
pub use model::{
    build_pipe_network, HeaderMetadata, PipeNetworkSpec, PipeSegmentSpec, PropertyValue,
    PIPE_RADIUS, PIPE_SEGMENT_PSET_NAME, PIPE_SEGMENT_TYPE_NAME,
};
pub use parser::{parse_entity, parse_header, read_step, EntityScanner, HeaderInfo, StepSummary, Token};
pub use schema::IfcSchemaVersion;
pub use step::{StepFile, StepHeader, StepValue};
