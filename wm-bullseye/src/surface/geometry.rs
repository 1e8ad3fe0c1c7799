//! 点与三角形的基本几何运算.

use crate::Point3;

/// 三角形面积平方的 4 倍小于该值时视为退化.
const DEGENERATE_EPS: f64 = 1e-12;

#[inline]
fn sub(a: &Point3, b: &Point3) -> Point3 {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

#[inline]
fn add_scaled(a: &Point3, d: &Point3, s: f64) -> Point3 {
    [a[0] + d[0] * s, a[1] + d[1] * s, a[2] + d[2] * s]
}

#[inline]
fn dot(a: &Point3, b: &Point3) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

#[inline]
fn cross(a: &Point3, b: &Point3) -> Point3 {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

/// 两点间距离的平方.
#[inline]
pub fn dist2(a: &Point3, b: &Point3) -> f64 {
    let d = sub(a, b);
    dot(&d, &d)
}

/// 线段 `ab` 上距离 `p` 最近的点.
pub fn closest_point_on_segment(p: &Point3, a: &Point3, b: &Point3) -> Point3 {
    let ab = sub(b, a);
    let len2 = dot(&ab, &ab);
    if len2 <= 0.0 {
        return *a;
    }
    let t = (dot(&sub(p, a), &ab) / len2).clamp(0.0, 1.0);
    add_scaled(a, &ab, t)
}

/// 三角形 `tri` 上 (含内部) 距离 `p` 最近的点.
///
/// 按重心坐标的 Voronoi 区域分类求解. 退化三角形 (共线或重合顶点)
/// 退化为三条边上的最近点.
pub fn closest_point_on_triangle(p: &Point3, tri: &[Point3; 3]) -> Point3 {
    let [a, b, c] = tri;
    let ab = sub(b, a);
    let ac = sub(c, a);

    let n = cross(&ab, &ac);
    if dot(&n, &n) < DEGENERATE_EPS {
        return closest_on_edges(p, tri);
    }

    // 顶点 a 区域
    let ap = sub(p, a);
    let d1 = dot(&ab, &ap);
    let d2 = dot(&ac, &ap);
    if d1 <= 0.0 && d2 <= 0.0 {
        return *a;
    }

    // 顶点 b 区域
    let bp = sub(p, b);
    let d3 = dot(&ab, &bp);
    let d4 = dot(&ac, &bp);
    if d3 >= 0.0 && d4 <= d3 {
        return *b;
    }

    // 边 ab 区域
    let vc = d1 * d4 - d3 * d2;
    if vc <= 0.0 && d1 >= 0.0 && d3 <= 0.0 {
        return add_scaled(a, &ab, d1 / (d1 - d3));
    }

    // 顶点 c 区域
    let cp = sub(p, c);
    let d5 = dot(&ab, &cp);
    let d6 = dot(&ac, &cp);
    if d6 >= 0.0 && d5 <= d6 {
        return *c;
    }

    // 边 ac 区域
    let vb = d5 * d2 - d1 * d6;
    if vb <= 0.0 && d2 >= 0.0 && d6 <= 0.0 {
        return add_scaled(a, &ac, d2 / (d2 - d6));
    }

    // 边 bc 区域
    let va = d3 * d6 - d5 * d4;
    if va <= 0.0 && (d4 - d3) >= 0.0 && (d5 - d6) >= 0.0 {
        let bc = sub(c, b);
        return add_scaled(b, &bc, (d4 - d3) / ((d4 - d3) + (d5 - d6)));
    }

    // 面内
    let denom = 1.0 / (va + vb + vc);
    let v = vb * denom;
    let w = vc * denom;
    let on_ab = add_scaled(a, &ab, v);
    add_scaled(&on_ab, &ac, w)
}

fn closest_on_edges(p: &Point3, [a, b, c]: &[Point3; 3]) -> Point3 {
    [
        closest_point_on_segment(p, a, b),
        closest_point_on_segment(p, b, c),
        closest_point_on_segment(p, c, a),
    ]
    .into_iter()
    .min_by(|x, y| dist2(p, x).total_cmp(&dist2(p, y)))
    .unwrap_or(*a)
}

/// 点 `p` 到三角形 `tri` 距离的平方.
#[inline]
pub fn point_triangle_dist2(p: &Point3, tri: &[Point3; 3]) -> f64 {
    dist2(p, &closest_point_on_triangle(p, tri))
}
