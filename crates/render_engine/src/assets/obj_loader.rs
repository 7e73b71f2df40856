//! OBJ file loader for triangle meshes with material groups

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use thiserror::Error;

/// OBJ parsing errors
#[derive(Error, Debug)]
pub enum ObjError {
    /// Underlying file read failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// A line could not be parsed
    #[error("parse error: {0}")]
    Parse(String),
    /// A face references data that does not exist
    #[error("invalid format: {0}")]
    InvalidFormat(String),
}

/// One corner of a triangle: indices into the flat attribute arrays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaceVertex {
    /// Index into [`ObjMesh::positions`]
    pub position: u32,
    /// Index into [`ObjMesh::tex_coords`], when the face carries texcoords
    pub tex_coord: Option<u32>,
}

/// A run of triangles sharing one material.
#[derive(Debug, Clone)]
pub struct MaterialGroup {
    /// Material name from the `usemtl` statement
    pub material: String,
    /// First triangle of the group (index into [`ObjMesh::triangles`])
    pub start: usize,
    /// Number of triangles in the group
    pub count: usize,
}

/// Parsed OBJ data: flat attribute arrays plus per-face index triples.
///
/// Polygons are fan-triangulated during parsing, so `triangles` only ever
/// holds three-vertex faces.
#[derive(Debug, Default)]
pub struct ObjMesh {
    /// Vertex positions, one `[x, y, z]` per `v` statement
    pub positions: Vec<[f32; 3]>,
    /// Texture coordinates, one `[u, v]` per `vt` statement
    pub tex_coords: Vec<[f32; 2]>,
    /// Triangles as triples of attribute indices
    pub triangles: Vec<[FaceVertex; 3]>,
    /// Material groups in file order
    pub groups: Vec<MaterialGroup>,
}

/// Load and parse an OBJ file from disk.
pub fn load_obj<P: AsRef<Path>>(path: P) -> Result<ObjMesh, ObjError> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let mut source = String::new();
    for line in reader.lines() {
        source.push_str(&line?);
        source.push('\n');
    }
    parse_obj(&source)
}

/// Parse OBJ data from a string.
pub fn parse_obj(source: &str) -> Result<ObjMesh, ObjError> {
    let mut mesh = ObjMesh::default();
    let mut open_group: Option<(String, usize)> = None;

    for line in source.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let parts: Vec<&str> = line.split_whitespace().collect();
        match parts[0] {
            "v" => {
                if parts.len() < 4 {
                    return Err(ObjError::Parse(format!("short vertex line: {}", line)));
                }
                mesh.positions.push([
                    parse_float(parts[1])?,
                    parse_float(parts[2])?,
                    parse_float(parts[3])?,
                ]);
            }
            "vt" => {
                if parts.len() < 3 {
                    return Err(ObjError::Parse(format!("short texcoord line: {}", line)));
                }
                mesh.tex_coords
                    .push([parse_float(parts[1])?, parse_float(parts[2])?]);
            }
            "usemtl" => {
                if let Some((material, start)) = open_group.take() {
                    mesh.groups.push(MaterialGroup {
                        material,
                        start,
                        count: mesh.triangles.len() - start,
                    });
                }
                let name = parts.get(1).unwrap_or(&"").to_string();
                open_group = Some((name, mesh.triangles.len()));
            }
            "f" => {
                if parts.len() < 4 {
                    return Err(ObjError::Parse(format!("face with <3 vertices: {}", line)));
                }
                let corners: Result<Vec<FaceVertex>, ObjError> = parts[1..]
                    .iter()
                    .map(|corner| parse_face_vertex(corner, &mesh))
                    .collect();
                let corners = corners?;
                // Fan-triangulate polygons
                for i in 1..corners.len() - 1 {
                    mesh.triangles.push([corners[0], corners[i], corners[i + 1]]);
                }
            }
            // Normals, smoothing groups, object names and mtllib statements are
            // not consumed by the renderer.
            _ => {}
        }
    }

    if let Some((material, start)) = open_group {
        mesh.groups.push(MaterialGroup {
            material,
            start,
            count: mesh.triangles.len() - start,
        });
    }

    Ok(mesh)
}

fn parse_float(text: &str) -> Result<f32, ObjError> {
    text.parse()
        .map_err(|_| ObjError::Parse(format!("invalid float: {}", text)))
}

fn parse_face_vertex(corner: &str, mesh: &ObjMesh) -> Result<FaceVertex, ObjError> {
    let mut fields = corner.split('/');

    let position_field = fields.next().unwrap_or("");
    let position_index: usize = position_field
        .parse()
        .map_err(|_| ObjError::Parse(format!("invalid position index: {}", corner)))?;
    if position_index == 0 || position_index > mesh.positions.len() {
        return Err(ObjError::InvalidFormat(format!(
            "position index {} out of bounds",
            position_index
        )));
    }

    let tex_coord = match fields.next() {
        Some("") | None => None,
        Some(field) => {
            let index: usize = field
                .parse()
                .map_err(|_| ObjError::Parse(format!("invalid texcoord index: {}", corner)))?;
            if index == 0 || index > mesh.tex_coords.len() {
                return Err(ObjError::InvalidFormat(format!(
                    "texcoord index {} out of bounds",
                    index
                )));
            }
            Some((index - 1) as u32)
        }
    };

    Ok(FaceVertex {
        position: (position_index - 1) as u32,
        tex_coord,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_triangle_with_texcoords() {
        let obj = r#"
# simple triangle
v 0.0 0.0 0.0
v 1.0 0.0 0.0
v 0.0 1.0 0.0
vt 0.0 0.0
vt 1.0 0.0
vt 0.0 1.0
f 1/1 2/2 3/3
"#;
        let mesh = parse_obj(obj).unwrap();
        assert_eq!(mesh.positions.len(), 3);
        assert_eq!(mesh.tex_coords.len(), 3);
        assert_eq!(mesh.triangles.len(), 1);
        assert_eq!(mesh.triangles[0][0].position, 0);
        assert_eq!(mesh.triangles[0][2].tex_coord, Some(2));
    }

    #[test]
    fn fan_triangulates_quads() {
        let obj = r#"
v 0 0 0
v 1 0 0
v 1 1 0
v 0 1 0
f 1 2 3 4
"#;
        let mesh = parse_obj(obj).unwrap();
        assert_eq!(mesh.triangles.len(), 2);
        let first: Vec<u32> = mesh.triangles[0].iter().map(|c| c.position).collect();
        let second: Vec<u32> = mesh.triangles[1].iter().map(|c| c.position).collect();
        assert_eq!(first, vec![0, 1, 2]);
        assert_eq!(second, vec![0, 2, 3]);
    }

    #[test]
    fn records_material_groups() {
        let obj = r#"
v 0 0 0
v 1 0 0
v 0 1 0
usemtl stone
f 1 2 3
f 1 3 2
usemtl wood
f 2 1 3
"#;
        let mesh = parse_obj(obj).unwrap();
        assert_eq!(mesh.groups.len(), 2);
        assert_eq!(mesh.groups[0].material, "stone");
        assert_eq!(mesh.groups[0].count, 2);
        assert_eq!(mesh.groups[1].material, "wood");
        assert_eq!(mesh.groups[1].start, 2);
        assert_eq!(mesh.groups[1].count, 1);
    }

    #[test]
    fn rejects_out_of_bounds_indices() {
        let obj = "v 0 0 0\nf 1 2 3\n";
        assert!(parse_obj(obj).is_err());
    }

    #[test]
    fn rejects_zero_index() {
        let obj = "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 0 1 2\n";
        assert!(parse_obj(obj).is_err());
    }
}
