//! 最近邻顶点查询.

use std::cmp::Ordering;

use ordered_float::OrderedFloat;

use crate::surface::geometry::dist2;
use crate::Point3;

/// 最近邻查询接口.
///
/// 多个候选等距时, 返回编号最小者, 因此结果与候选的排列顺序无关.
pub trait NearestIndex: Send + Sync {
    /// 返回距离 `p` 最近的候选编号. 没有候选时返回 `None`.
    fn query(&self, p: &Point3) -> Option<usize>;

    /// 候选个数.
    fn len(&self) -> usize;

    /// 是否没有候选?
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// 当前最优候选 `(距离平方, 编号)`.
type Best = Option<(f64, usize)>;

#[inline]
fn consider(best: &mut Best, d: f64, id: usize) {
    let better = match *best {
        None => true,
        Some((bd, bid)) => d < bd || (d == bd && id < bid),
    };
    if better {
        *best = Some((d, id));
    }
}

/// 暴力搜索. 用于验证和极小规模的网格.
#[derive(Debug, Clone, Default)]
pub struct BruteForce {
    entries: Vec<(usize, Point3)>,
}

impl BruteForce {
    /// 由 `(编号, 坐标)` 构建.
    pub fn build<I: IntoIterator<Item = (usize, Point3)>>(it: I) -> Self {
        Self {
            entries: it.into_iter().collect(),
        }
    }
}

impl NearestIndex for BruteForce {
    fn query(&self, p: &Point3) -> Option<usize> {
        let mut best = None;
        for (id, q) in self.entries.iter() {
            consider(&mut best, dist2(p, q), *id);
        }
        best.map(|(_, id)| id)
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// 隐式平衡 k-d 树.
///
/// 每个子区间 `[lo, hi)` 的中位元素 `lo + (hi - lo) / 2` 为划分节点,
/// 划分轴按深度在 `i, j, k` 间轮换.
#[derive(Debug, Clone, Default)]
pub struct KdTree {
    entries: Vec<(usize, Point3)>,
}

impl KdTree {
    /// 由 `(编号, 坐标)` 构建.
    pub fn build<I: IntoIterator<Item = (usize, Point3)>>(it: I) -> Self {
        let mut entries: Vec<_> = it.into_iter().collect();
        build_rec(&mut entries, 0);
        Self { entries }
    }

    fn search(&self, lo: usize, hi: usize, depth: usize, p: &Point3, best: &mut Best) {
        if lo >= hi {
            return;
        }
        let mid = lo + (hi - lo) / 2;
        let axis = depth % 3;
        let (id, q) = &self.entries[mid];
        consider(best, dist2(p, q), *id);

        let diff = p[axis] - q[axis];
        let (near, far) = if diff < 0.0 {
            ((lo, mid), (mid + 1, hi))
        } else {
            ((mid + 1, hi), (lo, mid))
        };
        self.search(near.0, near.1, depth + 1, p, best);
        // 等距也要搜索另一侧, 以便按编号决出并列.
        if best.map_or(true, |(bd, _)| diff * diff <= bd) {
            self.search(far.0, far.1, depth + 1, p, best);
        }
    }
}

fn by_axis(axis: usize) -> impl Fn(&(usize, Point3), &(usize, Point3)) -> Ordering {
    move |a, b| {
        OrderedFloat(a.1[axis])
            .cmp(&OrderedFloat(b.1[axis]))
            .then(a.0.cmp(&b.0))
    }
}

fn build_rec(entries: &mut [(usize, Point3)], depth: usize) {
    if entries.len() <= 1 {
        return;
    }
    let mid = entries.len() / 2;
    entries.select_nth_unstable_by(mid, by_axis(depth % 3));
    let (left, right) = entries.split_at_mut(mid);
    build_rec(left, depth + 1);
    build_rec(&mut right[1..], depth + 1);
}

impl NearestIndex for KdTree {
    fn query(&self, p: &Point3) -> Option<usize> {
        let mut best = None;
        self.search(0, self.entries.len(), 0, p, &mut best);
        best.map(|(_, id)| id)
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phantom;
    use itertools::iproduct;

    #[test]
    fn test_empty() {
        assert_eq!(KdTree::build([]).query(&[0.0; 3]), None);
        assert_eq!(BruteForce::build([]).query(&[0.0; 3]), None);
        assert!(KdTree::default().is_empty());
    }

    #[test]
    fn test_kdtree_matches_brute_force() {
        let s = phantom::sphere([8.0; 3], 6.0, 2);
        let points: Vec<_> = s.vertices().iter().copied().enumerate().collect();
        let tree = KdTree::build(points.iter().copied());
        let brute = BruteForce::build(points.iter().copied());
        assert_eq!(tree.len(), 162);

        for (i, j, k) in iproduct!(0..17, 0..17, 0..17) {
            let p = [i as f64, j as f64, k as f64];
            assert_eq!(tree.query(&p), brute.query(&p), "at {p:?}");
        }
    }

    #[test]
    fn test_ties_prefer_smaller_id() {
        // 格点上的大量等距候选.
        let points: Vec<_> = iproduct!(0..4, 0..4, 0..4)
            .map(|(i, j, k)| [i as f64 * 2.0, j as f64 * 2.0, k as f64 * 2.0])
            .enumerate()
            .collect();
        let tree = KdTree::build(points.iter().rev().copied());
        let brute = BruteForce::build(points.iter().copied());
        for (i, j, k) in iproduct!(0..7, 0..7, 0..7) {
            let p = [i as f64, j as f64, k as f64];
            assert_eq!(tree.query(&p), brute.query(&p), "at {p:?}");
        }
        // (1, 1, 1) 到 8 个格点等距, 取编号最小的原点.
        assert_eq!(tree.query(&[1.0, 1.0, 1.0]), Some(0));
    }
}
