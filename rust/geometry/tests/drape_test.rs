// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! End-to-end draping: GeoJSON trace + PLY terrain -> 3D GeoJSON

use approx::assert_relative_eq;
use geo2ifc_geometry::{
    drape_trace, read_ply, MeshTerrain, Terrain, Trace, VERTEX_VERTICAL_OFFSET,
};
use std::fs;

const TERRAIN_PLY: &str = "ply
format ascii 1.0
element vertex 4
property double x
property double y
property double z
element face 2
property list uchar int vertex_indices
end_header
2600000 1200000 500
2600100 1200000 510
2600100 1200100 510
2600000 1200100 500
3 0 1 2
3 0 2 3
";

const TRACE: &str = r#"{
  "type": "FeatureCollection",
  "features": [
    { "type": "Feature", "properties": { "obj-id": "A" },
      "geometry": { "type": "LineString", "coordinates": [[2600010, 1200050], [2600090, 1200050]] } },
    { "type": "Feature", "properties": { "obj-id": "B" },
      "geometry": { "type": "LineString", "coordinates": [[2700000, 1300000], [2700010, 1300000]] } }
  ]
}"#;

#[test]
fn drapes_trace_onto_ply_terrain() {
    let dir = tempfile::tempdir().unwrap();
    let ply_path = dir.path().join("terrain.ply");
    let trace_path = dir.path().join("trace.geojson");
    let out_path = dir.path().join("trace_3D.geojson");
    fs::write(&ply_path, TERRAIN_PLY).unwrap();
    fs::write(&trace_path, TRACE).unwrap();

    let mut mesh = read_ply(&ply_path).unwrap();
    mesh.translate_z(VERTEX_VERTICAL_OFFSET);
    let terrain = MeshTerrain::new(mesh).unwrap();
    assert!(terrain.bounds().is_some());

    let mut trace = Trace::load(&trace_path).unwrap();
    let stats = drape_trace(&terrain, &mut trace);
    assert_eq!(stats.draped_lines, 1);
    assert_eq!(stats.undraped_lines, 1);

    // Line A crosses the diagonal at x = 2600050
    let a = &trace.lines[0];
    assert_eq!(a.points.len(), 3);
    assert_relative_eq!(a.points[0].z, 501.0 - 0.8, epsilon = 1e-6);
    assert_relative_eq!(a.points[1].z, 505.0 - 0.8, epsilon = 1e-6);
    assert_relative_eq!(a.points[2].z, 509.0 - 0.8, epsilon = 1e-6);

    // Line B is outside the terrain and stays flat
    let b = &trace.lines[1];
    assert_eq!(b.points.len(), 2);
    assert!(b.points.iter().all(|p| p.z == 0.0));

    trace.write(&out_path).unwrap();
    let reread = Trace::load(&out_path).unwrap();
    assert_eq!(reread.lines.len(), 2);
    assert!(reread.lines[0].has_z);
    assert_eq!(reread.lines[0].properties["obj_id"], "A");
}
