// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Pipe network model authoring
//!
//! Turns a list of 3D polylines with properties into an IFC project:
//! project, units, contexts, georeferencing, one site, one pipe segment
//! type and one swept-disk pipe segment per polyline.

use crate::error::{Error, Result};
use crate::georef::GeoReference;
use crate::guid::stable_guid;
use crate::schema::IfcSchemaVersion;
use crate::step::{StepFile, StepHeader, StepValue};
use crate::units::write_metric_unit_assignment;

/// Radius of the swept disk around each pipe axis, in metres
pub const PIPE_RADIUS: f64 = 0.4;
/// Name of the shared IfcPipeSegmentType, also used as ObjectType
pub const PIPE_SEGMENT_TYPE_NAME: &str = "NIS_pipe_segment_type";
/// Property set carrying the trace attributes
pub const PIPE_SEGMENT_PSET_NAME: &str = "NIS_PipeSegmentCommon";
/// Precision of the model context
const CONTEXT_PRECISION: f64 = 1e-5;

/// Value of a single property in the segment property set
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Label(String),
    Integer(i64),
    Real(f64),
    Boolean(bool),
}

impl PropertyValue {
    fn to_step(&self) -> StepValue {
        match self {
            PropertyValue::Label(s) => StepValue::typed("IFCLABEL", StepValue::str(s.as_str())),
            PropertyValue::Integer(i) => StepValue::typed("IFCINTEGER", StepValue::Integer(*i)),
            PropertyValue::Real(r) => StepValue::typed("IFCREAL", StepValue::Real(*r)),
            PropertyValue::Boolean(b) => StepValue::typed("IFCBOOLEAN", StepValue::Bool(*b)),
        }
    }
}

/// One pipe segment to author
#[derive(Debug, Clone, PartialEq)]
pub struct PipeSegmentSpec {
    /// IfcPipeSegment Name; `None` writes `$`
    pub name: Option<String>,
    /// Axis vertices in model coordinates, at least two
    pub points: Vec<[f64; 3]>,
    /// Properties in output order
    pub properties: Vec<(String, PropertyValue)>,
}

/// Header metadata taken from the run configuration
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HeaderMetadata {
    /// `(name, email)`; only written when both are non-empty
    pub author: Option<(String, String)>,
    /// `(name, email)`; only written when both are non-empty
    pub organization: Option<(String, String)>,
    pub authorization: String,
}

impl HeaderMetadata {
    fn pair(pair: &Option<(String, String)>) -> Vec<String> {
        match pair {
            Some((name, email)) if !name.is_empty() && !email.is_empty() => {
                vec![name.clone(), email.clone()]
            }
            _ => vec![String::new()],
        }
    }
}

/// Everything needed to author one site model
#[derive(Debug, Clone)]
pub struct PipeNetworkSpec {
    pub schema: IfcSchemaVersion,
    /// FILE_NAME name field
    pub file_name: String,
    /// FILE_NAME time_stamp field
    pub time_stamp: String,
    pub metadata: HeaderMetadata,
    pub project_name: String,
    pub site_name: String,
    pub georef: GeoReference,
    pub segments: Vec<PipeSegmentSpec>,
}

/// Ids of the shared instances every segment refers to
struct Scaffold {
    identity_placement: u32,
    body_context: u32,
    site: u32,
    site_placement: u32,
}

fn point_list(schema: IfcSchemaVersion, points: &[[f64; 3]]) -> Vec<StepValue> {
    let coords = StepValue::List(points.iter().map(|p| StepValue::reals(p)).collect());
    if schema.point_list_has_tags() {
        vec![coords, StepValue::Null]
    } else {
        vec![coords]
    }
}

fn write_scaffold(file: &mut StepFile, spec: &PipeNetworkSpec) -> Scaffold {
    let scope = spec.site_name.as_str();
    let units = write_metric_unit_assignment(file);

    let origin = file.add("IFCCARTESIANPOINT", vec![StepValue::reals(&[0.0, 0.0, 0.0])]);
    let identity_placement = file.add(
        "IFCAXIS2PLACEMENT3D",
        vec![StepValue::Ref(origin), StepValue::Null, StepValue::Null],
    );

    let model_context = file.add(
        "IFCGEOMETRICREPRESENTATIONCONTEXT",
        vec![
            StepValue::Null,
            StepValue::str("Model"),
            StepValue::Integer(3),
            StepValue::Real(CONTEXT_PRECISION),
            StepValue::Ref(identity_placement),
            StepValue::Null,
        ],
    );
    let body_context = file.add(
        "IFCGEOMETRICREPRESENTATIONSUBCONTEXT",
        vec![
            StepValue::str("Body"),
            StepValue::str("Model"),
            StepValue::Derived,
            StepValue::Derived,
            StepValue::Derived,
            StepValue::Derived,
            StepValue::Ref(model_context),
            StepValue::Null,
            StepValue::Enum("MODEL_VIEW"),
            StepValue::Null,
        ],
    );

    let project = file.add(
        "IFCPROJECT",
        vec![
            StepValue::str(stable_guid(scope, "project")),
            StepValue::Null,
            StepValue::str(spec.project_name.as_str()),
            StepValue::Null,
            StepValue::Null,
            StepValue::Null,
            StepValue::Null,
            StepValue::refs(&[model_context]),
            StepValue::Ref(units),
        ],
    );

    let crs = &spec.georef.crs;
    let projected_crs = file.add(
        "IFCPROJECTEDCRS",
        vec![
            StepValue::str(crs.name.as_str()),
            StepValue::opt_str(crs.description.as_deref()),
            StepValue::opt_str(crs.geodetic_datum.as_deref()),
            StepValue::opt_str(crs.vertical_datum.as_deref()),
            StepValue::Null,
            StepValue::Null,
            StepValue::Null,
        ],
    );
    let g = &spec.georef;
    let mut conversion = vec![
        StepValue::Ref(model_context),
        StepValue::Ref(projected_crs),
        StepValue::Real(g.eastings),
        StepValue::Real(g.northings),
        StepValue::Real(g.orthogonal_height),
        StepValue::Real(g.x_axis_abscissa),
        StepValue::Real(g.x_axis_ordinate),
        StepValue::Real(g.scale),
    ];
    if spec.schema.map_conversion_has_axis_scales() {
        conversion.extend([StepValue::Null, StepValue::Null]);
    }
    file.add("IFCMAPCONVERSION", conversion);

    let site_placement = file.add(
        "IFCLOCALPLACEMENT",
        vec![StepValue::Null, StepValue::Ref(identity_placement)],
    );
    let site = file.add(
        "IFCSITE",
        vec![
            StepValue::str(stable_guid(scope, "site")),
            StepValue::Null,
            StepValue::str(spec.site_name.as_str()),
            StepValue::Null,
            StepValue::Null,
            StepValue::Ref(site_placement),
            StepValue::Null,
            StepValue::Null,
            StepValue::Enum("ELEMENT"),
            StepValue::Null,
            StepValue::Null,
            StepValue::Null,
            StepValue::Null,
            StepValue::Null,
        ],
    );
    file.add(
        "IFCRELAGGREGATES",
        vec![
            StepValue::str(stable_guid(scope, "aggregates/project")),
            StepValue::Null,
            StepValue::Null,
            StepValue::Null,
            StepValue::Ref(project),
            StepValue::refs(&[site]),
        ],
    );

    Scaffold {
        identity_placement,
        body_context,
        site,
        site_placement,
    }
}

fn write_segment(
    file: &mut StepFile,
    spec: &PipeNetworkSpec,
    scaffold: &Scaffold,
    index: usize,
    segment: &PipeSegmentSpec,
) -> Result<u32> {
    if segment.points.len() < 2 {
        return Err(Error::InvalidModel(format!(
            "pipe segment {} has {} point(s), at least 2 are required",
            index,
            segment.points.len()
        )));
    }
    let scope = spec.site_name.as_str();

    let points = file.add("IFCCARTESIANPOINTLIST3D", point_list(spec.schema, &segment.points));
    let curve = file.add(
        "IFCINDEXEDPOLYCURVE",
        vec![StepValue::Ref(points), StepValue::Null, StepValue::Bool(false)],
    );
    let solid = file.add(
        "IFCSWEPTDISKSOLID",
        vec![
            StepValue::Ref(curve),
            StepValue::Real(PIPE_RADIUS),
            StepValue::Null,
            StepValue::Null,
            StepValue::Null,
        ],
    );
    let representation = file.add(
        "IFCSHAPEREPRESENTATION",
        vec![
            StepValue::Ref(scaffold.body_context),
            StepValue::str("Body"),
            StepValue::str("AdvancedSweptSolid"),
            StepValue::refs(&[solid]),
        ],
    );
    let product_shape = file.add(
        "IFCPRODUCTDEFINITIONSHAPE",
        vec![StepValue::Null, StepValue::Null, StepValue::refs(&[representation])],
    );
    let placement = file.add(
        "IFCLOCALPLACEMENT",
        vec![
            StepValue::Ref(scaffold.site_placement),
            StepValue::Ref(scaffold.identity_placement),
        ],
    );
    let pipe_segment = file.add(
        "IFCPIPESEGMENT",
        vec![
            StepValue::str(stable_guid(scope, &format!("segment/{index}"))),
            StepValue::Null,
            StepValue::opt_str(segment.name.as_deref()),
            StepValue::Null,
            StepValue::str(PIPE_SEGMENT_TYPE_NAME),
            StepValue::Ref(placement),
            StepValue::Ref(product_shape),
            StepValue::Null,
            StepValue::Enum("USERDEFINED"),
        ],
    );

    if !segment.properties.is_empty() {
        let properties: Vec<u32> = segment
            .properties
            .iter()
            .map(|(name, value)| {
                file.add(
                    "IFCPROPERTYSINGLEVALUE",
                    vec![
                        StepValue::str(name.as_str()),
                        StepValue::Null,
                        value.to_step(),
                        StepValue::Null,
                    ],
                )
            })
            .collect();
        let pset = file.add(
            "IFCPROPERTYSET",
            vec![
                StepValue::str(stable_guid(scope, &format!("pset/{index}"))),
                StepValue::Null,
                StepValue::str(PIPE_SEGMENT_PSET_NAME),
                StepValue::Null,
                StepValue::refs(&properties),
            ],
        );
        file.add(
            "IFCRELDEFINESBYPROPERTIES",
            vec![
                StepValue::str(stable_guid(scope, &format!("defines-pset/{index}"))),
                StepValue::Null,
                StepValue::Null,
                StepValue::Null,
                StepValue::refs(&[pipe_segment]),
                StepValue::Ref(pset),
            ],
        );
    }

    Ok(pipe_segment)
}

/// Author the complete site model
pub fn build_pipe_network(spec: &PipeNetworkSpec) -> Result<StepFile> {
    let mut header = StepHeader::new(spec.schema, spec.file_name.as_str(), spec.time_stamp.as_str());
    header.author = HeaderMetadata::pair(&spec.metadata.author);
    header.organization = HeaderMetadata::pair(&spec.metadata.organization);
    header.authorization = spec.metadata.authorization.clone();

    let mut file = StepFile::new(header);
    let scaffold = write_scaffold(&mut file, spec);
    let scope = spec.site_name.as_str();

    let segment_type = file.add(
        "IFCPIPESEGMENTTYPE",
        vec![
            StepValue::str(stable_guid(scope, "segment-type")),
            StepValue::Null,
            StepValue::str(PIPE_SEGMENT_TYPE_NAME),
            StepValue::Null,
            StepValue::Null,
            StepValue::Null,
            StepValue::Null,
            StepValue::Null,
            StepValue::Null,
            StepValue::Enum("NOTDEFINED"),
        ],
    );

    let mut segments = Vec::with_capacity(spec.segments.len());
    for (index, segment) in spec.segments.iter().enumerate() {
        segments.push(write_segment(&mut file, spec, &scaffold, index, segment)?);
    }

    if !segments.is_empty() {
        file.add(
            "IFCRELDEFINESBYTYPE",
            vec![
                StepValue::str(stable_guid(scope, "defines-type")),
                StepValue::Null,
                StepValue::Null,
                StepValue::Null,
                StepValue::refs(&segments),
                StepValue::Ref(segment_type),
            ],
        );
        file.add(
            "IFCRELCONTAINEDINSPATIALSTRUCTURE",
            vec![
                StepValue::str(stable_guid(scope, "contained-in/site")),
                StepValue::Null,
                StepValue::Null,
                StepValue::Null,
                StepValue::refs(&segments),
                StepValue::Ref(scaffold.site),
            ],
        );
    }

    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::georef::{OriginShift, ProjectedCrs};
    use crate::parser::{parse_entity, read_step, EntityScanner, Token};

    fn spec(segments: Vec<PipeSegmentSpec>) -> PipeNetworkSpec {
        PipeNetworkSpec {
            schema: IfcSchemaVersion::Ifc4x3Add2,
            file_name: "/data/Site_A/OUTPUT/IFC/trace_3DIFC4X3_ADD2.ifc".to_string(),
            time_stamp: "2024-11-07T10:24:00".to_string(),
            metadata: HeaderMetadata {
                author: Some(("Jane Doe".to_string(), "jane@example.org".to_string())),
                organization: Some(("HEIG-VD".to_string(), String::new())),
                authorization: "Nobody".to_string(),
            },
            project_name: "SEPM".to_string(),
            site_name: "Site_A".to_string(),
            georef: GeoReference::with_offset(
                ProjectedCrs::lv95(),
                OriginShift::new(2600000.0, 1200000.0, 400.0),
            ),
            segments,
        }
    }

    fn segment(name: &str) -> PipeSegmentSpec {
        PipeSegmentSpec {
            name: Some(name.to_string()),
            points: vec![[0.0, 0.0, 0.0], [10.0, 0.0, -0.5], [10.0, 5.0, -1.0]],
            properties: vec![
                ("NIS_Nummer".to_string(), PropertyValue::Label(name.to_string())),
                ("Diameter".to_string(), PropertyValue::Real(0.15)),
                ("Year".to_string(), PropertyValue::Integer(1987)),
                ("Active".to_string(), PropertyValue::Boolean(true)),
            ],
        }
    }

    #[test]
    fn single_segment_model_parses() {
        let file = build_pipe_network(&spec(vec![segment("NIS-1")])).unwrap();
        let text = file.to_step_string().unwrap();
        let summary = read_step(&text).unwrap();

        assert_eq!(summary.header.schemas, vec!["IFC4X3_ADD2".to_string()]);
        assert_eq!(summary.header.author, vec!["Jane Doe".to_string(), "jane@example.org".to_string()]);
        assert_eq!(summary.header.organization, vec![String::new()]);
        assert_eq!(summary.header.authorization, "Nobody");
        assert_eq!(summary.count_of("IFCPIPESEGMENT"), 1);
        assert_eq!(summary.count_of("IFCPIPESEGMENTTYPE"), 1);
        assert_eq!(summary.count_of("IFCSITE"), 1);
        assert_eq!(summary.count_of("IFCPROJECT"), 1);
        assert_eq!(summary.count_of("IFCPROPERTYSINGLEVALUE"), 4);
        assert_eq!(summary.count_of("IFCMAPCONVERSION"), 1);
    }

    #[test]
    fn pipe_segment_skeleton() {
        let file = build_pipe_network(&spec(vec![segment("NIS-1")])).unwrap();
        let text = file.to_step_string().unwrap();
        let mut scanner = EntityScanner::new(&text);
        let (_, start, end) = scanner.find_by_type("IFCPIPESEGMENT")[0];
        let (_, _, args) = parse_entity(&text[start..end]).unwrap();

        assert_eq!(args.len(), 9);
        assert_eq!(args[0].as_string().map(|g| g.len()), Some(22));
        assert_eq!(args[2].as_string().as_deref(), Some("NIS-1"));
        assert_eq!(args[4].as_string().as_deref(), Some(PIPE_SEGMENT_TYPE_NAME));
        assert!(args[5].as_entity_ref().is_some());
        assert!(args[6].as_entity_ref().is_some());
        assert_eq!(args[8], Token::Enum("USERDEFINED"));
        assert!(text.contains("IFCSWEPTDISKSOLID(#"));
        assert!(text.contains(",0.4,$,$,$);"));
        assert!(text.contains("IFCPROPERTYSET("));
        assert!(text.contains(&format!("'{PIPE_SEGMENT_PSET_NAME}'")));
        assert!(text.contains("IFCREAL(0.15)"));
        assert!(text.contains("IFCBOOLEAN(.T.)"));
    }

    #[test]
    fn ifc4_layouts() {
        let mut s = spec(vec![segment("NIS-1")]);
        s.schema = IfcSchemaVersion::Ifc4;
        let text = build_pipe_network(&s).unwrap().to_step_string().unwrap();
        assert!(text.contains("FILE_SCHEMA(('IFC4'));"));
        assert!(text.contains("IFCCARTESIANPOINTLIST3D(((0.,0.,0.),(10.,0.,-0.5),(10.,5.,-1.)));"));
        assert!(text.contains(",2600000.,1200000.,400.,1.,0.,1.);"));
    }

    #[test]
    fn ifc4x3_layouts() {
        let text = build_pipe_network(&spec(vec![segment("NIS-1")]))
            .unwrap()
            .to_step_string()
            .unwrap();
        assert!(text.contains("IFCCARTESIANPOINTLIST3D(((0.,0.,0.),(10.,0.,-0.5),(10.,5.,-1.)),$);"));
        assert!(text.contains(",2600000.,1200000.,400.,1.,0.,1.,$,$);"));
    }

    #[test]
    fn relationships_group_all_segments() {
        let file = build_pipe_network(&spec(vec![segment("A"), segment("B"), segment("C")])).unwrap();
        let text = file.to_step_string().unwrap();
        let summary = read_step(&text).unwrap();
        assert_eq!(summary.count_of("IFCPIPESEGMENT"), 3);
        assert_eq!(summary.count_of("IFCRELDEFINESBYTYPE"), 1);
        assert_eq!(summary.count_of("IFCRELCONTAINEDINSPATIALSTRUCTURE"), 1);
        assert_eq!(summary.count_of("IFCRELDEFINESBYPROPERTIES"), 3);

        let mut scanner = EntityScanner::new(&text);
        let (_, start, end) = scanner.find_by_type("IFCRELCONTAINEDINSPATIALSTRUCTURE")[0];
        let (_, _, args) = parse_entity(&text[start..end]).unwrap();
        assert_eq!(args[4].as_list().map(|l| l.len()), Some(3));
    }

    #[test]
    fn unnamed_segment_without_properties() {
        let mut seg = segment("x");
        seg.name = None;
        seg.properties.clear();
        let text = build_pipe_network(&spec(vec![seg])).unwrap().to_step_string().unwrap();
        let summary = read_step(&text).unwrap();
        assert_eq!(summary.count_of("IFCPROPERTYSET"), 0);
        assert!(text.contains(",$,$,'NIS_pipe_segment_type',#"));
    }

    #[test]
    fn rejects_degenerate_segment() {
        let mut seg = segment("x");
        seg.points.truncate(1);
        assert!(matches!(
            build_pipe_network(&spec(vec![seg])),
            Err(Error::InvalidModel(_))
        ));
    }

    #[test]
    fn output_is_deterministic() {
        let a = build_pipe_network(&spec(vec![segment("A"), segment("B")])).unwrap();
        let b = build_pipe_network(&spec(vec![segment("A"), segment("B")])).unwrap();
        assert_eq!(a.to_step_string().unwrap(), b.to_step_string().unwrap());
    }

    #[test]
    fn georeference_reads_back() {
        let text = build_pipe_network(&spec(vec![segment("A")]))
            .unwrap()
            .to_step_string()
            .unwrap();
        let georef = GeoReference::from_step(&text).unwrap().unwrap();
        assert_eq!(georef.crs, ProjectedCrs::lv95());
        assert_eq!(georef.eastings, 2600000.0);
        assert_eq!(georef.northings, 1200000.0);
        assert_eq!(georef.orthogonal_height, 400.0);
    }
}
