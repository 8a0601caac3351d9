// Wavefront OBJ loading
//
// A pure data producer: flat vertex positions plus triangulated indices.
// Supports `v x y z` and `f` lines whose tokens may be "v", "v/vt",
// "v//vn" or "v/vt/vn" (only the leading index is used). N-gons are
// triangulated by fan; vt/vn/usemtl/o/g/s and friends are ignored.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ObjError {
    #[error("failed to open {path:?}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("read error: {0}")]
    Read(#[from] std::io::Error),
    #[error("line {line}: {msg}")]
    Malformed { line: usize, msg: String },
    #[error("no vertex positions in {path:?}")]
    NoVertices { path: PathBuf },
    #[error("no faces in {path:?}")]
    NoFaces { path: PathBuf },
}

#[derive(Debug)]
pub struct ObjMesh {
    pub positions: Vec<[f32; 3]>,
    pub indices: Vec<u32>,
}

pub fn load_obj(path: &Path) -> Result<ObjMesh, ObjError> {
    let file = File::open(path).map_err(|source| ObjError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    parse_obj(BufReader::new(file), path)
}

fn parse_obj<R: BufRead>(reader: R, path: &Path) -> Result<ObjMesh, ObjError> {
    let mut positions: Vec<[f32; 3]> = Vec::new();
    let mut indices: Vec<u32> = Vec::new();

    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        let line_no = i + 1;

        let s = line.trim_start();
        if s.is_empty() || s.starts_with('#') {
            continue;
        }

        if let Some(rest) = s.strip_prefix("v ") {
            let mut tokens = rest.split_whitespace();
            let mut pos = [0.0f32; 3];
            for c in &mut pos {
                *c = tokens
                    .next()
                    .and_then(|t| t.parse().ok())
                    .ok_or_else(|| ObjError::Malformed {
                        line: line_no,
                        msg: "malformed vertex position".into(),
                    })?;
            }
            positions.push(pos);
        } else if let Some(rest) = s.strip_prefix("f ") {
            let face = rest
                .split_whitespace()
                .map(|tok| parse_vertex_index(tok, line_no))
                .collect::<Result<Vec<_>, _>>()?;

            if face.len() < 3 {
                return Err(ObjError::Malformed {
                    line: line_no,
                    msg: "face has fewer than 3 vertices".into(),
                });
            }

            let count = positions.len();
            let i0 = to_zero_based(face[0], count, line_no)?;
            for w in 1..face.len() - 1 {
                let i1 = to_zero_based(face[w], count, line_no)?;
                let i2 = to_zero_based(face[w + 1], count, line_no)?;
                indices.extend([i0, i1, i2]);
            }
        }
    }

    if positions.is_empty() {
        return Err(ObjError::NoVertices {
            path: path.to_path_buf(),
        });
    }
    if indices.is_empty() {
        return Err(ObjError::NoFaces {
            path: path.to_path_buf(),
        });
    }

    Ok(ObjMesh { positions, indices })
}

/// Leading signed integer of a face token ("7", "7/2", "7//3", "7/2/3").
fn parse_vertex_index(token: &str, line: usize) -> Result<i32, ObjError> {
    let head = token.split('/').next().unwrap_or("");
    head.parse::<i32>().map_err(|_| ObjError::Malformed {
        line,
        msg: format!("invalid vertex index {token:?}"),
    })
}

/// OBJ indices are 1-based; negative values count back from the end.
fn to_zero_based(obj_index: i32, vertex_count: usize, line: usize) -> Result<u32, ObjError> {
    if obj_index > 0 {
        let z = (obj_index - 1) as usize;
        if z >= vertex_count {
            return Err(ObjError::Malformed {
                line,
                msg: format!("vertex index {obj_index} out of range"),
            });
        }
        Ok(z as u32)
    } else if obj_index < 0 {
        let z = vertex_count as i64 + i64::from(obj_index);
        if z < 0 {
            return Err(ObjError::Malformed {
                line,
                msg: format!("vertex index {obj_index} out of range"),
            });
        }
        Ok(z as u32)
    } else {
        Err(ObjError::Malformed {
            line,
            msg: "vertex index 0 is invalid".into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn parse(input: &str) -> Result<ObjMesh, ObjError> {
        parse_obj(Cursor::new(input.as_bytes()), Path::new("test.obj"))
    }

    #[test]
    fn triangle_with_slash_tokens() {
        let mesh = parse("v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1/1 2//2 3/3/3\n").unwrap();
        assert_eq!(mesh.positions.len(), 3);
        assert_eq!(mesh.indices, vec![0, 1, 2]);
    }

    #[test]
    fn quads_are_fan_triangulated() {
        let mesh = parse("v 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\nf 1 2 3 4\n").unwrap();
        assert_eq!(mesh.indices, vec![0, 1, 2, 0, 2, 3]);
    }

    #[test]
    fn negative_indices_count_from_the_end() {
        let mesh = parse("v 0 0 0\nv 1 0 0\nv 0 1 0\nf -3 -2 -1\n").unwrap();
        assert_eq!(mesh.indices, vec![0, 1, 2]);
    }

    #[test]
    fn comments_and_other_directives_are_ignored() {
        let input = "# header\no thing\nvn 0 0 1\nvt 0 0\nv 0 0 0\nv 1 0 0\nv 0 1 0\ns off\nf 1 2 3\n";
        let mesh = parse(input).unwrap();
        assert_eq!(mesh.positions.len(), 3);
        assert_eq!(mesh.indices.len(), 3);
    }

    #[test]
    fn index_out_of_range_is_rejected() {
        let err = parse("v 0 0 0\nf 1 2 3\n").unwrap_err();
        assert!(matches!(err, ObjError::Malformed { .. }));
    }

    #[test]
    fn index_zero_is_rejected() {
        let err = parse("v 0 0 0\nv 1 0 0\nv 0 1 0\nf 0 1 2\n").unwrap_err();
        assert!(matches!(err, ObjError::Malformed { .. }));
    }

    #[test]
    fn face_with_two_vertices_is_rejected() {
        let err = parse("v 0 0 0\nv 1 0 0\nf 1 2\n").unwrap_err();
        assert!(matches!(err, ObjError::Malformed { .. }));
    }

    #[test]
    fn file_without_vertices_is_rejected() {
        assert!(matches!(parse("# nothing\n"), Err(ObjError::NoVertices { .. })));
    }

    #[test]
    fn file_without_faces_is_rejected() {
        assert!(matches!(
            parse("v 0 0 0\nv 1 0 0\nv 0 1 0\n"),
            Err(ObjError::NoFaces { .. })
        ));
    }

    #[test]
    fn malformed_position_is_rejected() {
        let err = parse("v 0 zero 0\n").unwrap_err();
        assert!(matches!(err, ObjError::Malformed { line: 1, .. }));
    }
}
