//! 测试用的合成数据: 二十面体细分球面网格与球壳分割.

use std::collections::HashMap;

use ndarray::Array3;

use crate::surface::Surface;
use crate::{Idx3d, Point3, SegVolume};

const PHI: f64 = 1.618_033_988_749_895;

/// 单位球面上的二十面体细分网格, 细分 `level` 次.
pub fn icosphere(level: usize) -> Surface {
    let mut vertices: Vec<Point3> = [
        [-1.0, PHI, 0.0],
        [1.0, PHI, 0.0],
        [-1.0, -PHI, 0.0],
        [1.0, -PHI, 0.0],
        [0.0, -1.0, PHI],
        [0.0, 1.0, PHI],
        [0.0, -1.0, -PHI],
        [0.0, 1.0, -PHI],
        [PHI, 0.0, -1.0],
        [PHI, 0.0, 1.0],
        [-PHI, 0.0, -1.0],
        [-PHI, 0.0, 1.0],
    ]
    .into_iter()
    .map(normalize)
    .collect();

    let mut faces: Vec<[usize; 3]> = vec![
        [0, 11, 5],
        [0, 5, 1],
        [0, 1, 7],
        [0, 7, 10],
        [0, 10, 11],
        [1, 5, 9],
        [5, 11, 4],
        [11, 10, 2],
        [10, 7, 6],
        [7, 1, 8],
        [3, 9, 4],
        [3, 4, 2],
        [3, 2, 6],
        [3, 6, 8],
        [3, 8, 9],
        [4, 9, 5],
        [2, 4, 11],
        [6, 2, 10],
        [8, 6, 7],
        [9, 8, 1],
    ];

    for _ in 0..level {
        let mut cache: HashMap<(usize, usize), usize> = HashMap::new();
        let mut midpoint = |a: usize, b: usize, vertices: &mut Vec<Point3>| -> usize {
            let key = (a.min(b), a.max(b));
            *cache.entry(key).or_insert_with(|| {
                let (p, q) = (vertices[a], vertices[b]);
                vertices.push(normalize([
                    (p[0] + q[0]) / 2.0,
                    (p[1] + q[1]) / 2.0,
                    (p[2] + q[2]) / 2.0,
                ]));
                vertices.len() - 1
            })
        };
        let mut next = Vec::with_capacity(faces.len() * 4);
        for [a, b, c] in faces {
            let ab = midpoint(a, b, &mut vertices);
            let bc = midpoint(b, c, &mut vertices);
            let ca = midpoint(c, a, &mut vertices);
            next.extend([[a, ab, ca], [b, bc, ab], [c, ca, bc], [ab, bc, ca]]);
        }
        faces = next;
    }

    Surface::new(vertices, faces)
}

fn normalize(p: Point3) -> Point3 {
    let n = (p[0] * p[0] + p[1] * p[1] + p[2] * p[2]).sqrt();
    [p[0] / n, p[1] / n, p[2] / n]
}

/// 以 `center` 为球心, `radius` 为半径的球面网格.
pub fn sphere(center: Point3, radius: f64, level: usize) -> Surface {
    let unit = icosphere(level);
    let vertices = unit
        .vertices()
        .iter()
        .map(|p| {
            [
                center[0] + radius * p[0],
                center[1] + radius * p[1],
                center[2] + radius * p[2],
            ]
        })
        .collect();
    Surface::new(vertices, unit.faces().to_vec())
}

/// 体素中心到 `center` 的距离.
pub fn radius_of((i, j, k): Idx3d, center: Point3) -> f64 {
    let d = [i as f64 - center[0], j as f64 - center[1], k as f64 - center[2]];
    (d[0] * d[0] + d[1] * d[1] + d[2] * d[2]).sqrt()
}

/// 球壳分割: `r_in <= r <= r_out` 为白质 `wm`, `r < r_in` 为脑室 `ventricle`.
pub fn shell_segmentation(
    shape: Idx3d,
    center: Point3,
    (r_in, r_out): (f64, f64),
    (wm, ventricle): (i32, i32),
) -> SegVolume {
    let mut data = Array3::<i32>::zeros(shape);
    fill_shell(&mut data, center, (r_in, r_out), (wm, ventricle));
    SegVolume::fake(data, [1.0; 3])
}

/// 在已有数据上绘制球壳, 见 [`shell_segmentation`].
pub fn fill_shell(
    data: &mut Array3<i32>,
    center: Point3,
    (r_in, r_out): (f64, f64),
    (wm, ventricle): (i32, i32),
) {
    for (pos, v) in data.indexed_iter_mut() {
        let r = radius_of(pos, center);
        if r < r_in {
            *v = ventricle;
        } else if r <= r_out {
            *v = wm;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_icosphere_counts() {
        for (level, (v, f)) in [(0, (12, 20)), (1, (42, 80)), (2, (162, 320))] {
            let s = icosphere(level);
            assert_eq!(s.n_vertices(), v);
            assert_eq!(s.n_faces(), f);
            assert!(s.validate().is_ok());
            for p in s.vertices() {
                assert!((radius_of((0, 0, 0), [-p[0], -p[1], -p[2]]) - 1.0).abs() < 1e-12);
            }
        }
    }
}
