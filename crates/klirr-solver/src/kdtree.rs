use crate::dist_sq;

const NONE: u32 = u32::MAX;

/// K-D tree over points in ℝᵈ with nearest-neighbour queries.
///
/// Axis cycles with depth. Bulk construction median-splits; later points are
/// appended as leaves without rebalancing, which is adequate for the
/// cache-warming workload where queries vastly outnumber inserts.
pub struct KdTree {
    dim: usize,
    pts: Vec<f64>,
    left: Vec<u32>,
    right: Vec<u32>,
    root: u32,
}

impl KdTree {
    pub fn new(dim: usize) -> Self {
        assert!(dim > 0, "zero-dimensional tree");
        KdTree {
            dim,
            pts: Vec::new(),
            left: Vec::new(),
            right: Vec::new(),
            root: NONE,
        }
    }

    /// Balanced construction by median split on the cycling axis.
    pub fn build(dim: usize, points: &[Vec<f64>]) -> Self {
        let mut tree = KdTree::new(dim);
        for p in points {
            assert_eq!(p.len(), dim);
            tree.pts.extend_from_slice(p);
            tree.left.push(NONE);
            tree.right.push(NONE);
        }
        let mut idx: Vec<usize> = (0..points.len()).collect();
        tree.root = tree.split(&mut idx, 0);
        tree
    }

    fn split(&mut self, idx: &mut [usize], depth: usize) -> u32 {
        if idx.is_empty() {
            return NONE;
        }
        let axis = depth % self.dim;
        idx.sort_by(|&a, &b| {
            self.coord(a, axis)
                .partial_cmp(&self.coord(b, axis))
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        let mid = idx.len() / 2;
        let node = idx[mid];
        let (lo, rest) = idx.split_at_mut(mid);
        let hi = &mut rest[1..];
        let l = self.split(lo, depth + 1);
        let r = self.split(hi, depth + 1);
        self.left[node] = l;
        self.right[node] = r;
        node as u32
    }

    pub fn len(&self) -> usize {
        self.left.len()
    }

    pub fn is_empty(&self) -> bool {
        self.left.is_empty()
    }

    pub fn point(&self, i: usize) -> &[f64] {
        &self.pts[i * self.dim..(i + 1) * self.dim]
    }

    fn coord(&self, i: usize, axis: usize) -> f64 {
        self.pts[i * self.dim + axis]
    }

    /// Append a point, returning its index.
    pub fn insert(&mut self, p: &[f64]) -> usize {
        assert_eq!(p.len(), self.dim);
        let idx = self.len();
        self.pts.extend_from_slice(p);
        self.left.push(NONE);
        self.right.push(NONE);
        if self.root == NONE {
            self.root = idx as u32;
            return idx;
        }
        let mut cur = self.root as usize;
        let mut depth = 0;
        loop {
            let axis = depth % self.dim;
            let link = if p[axis] < self.coord(cur, axis) {
                &mut self.left[cur]
            } else {
                &mut self.right[cur]
            };
            if *link == NONE {
                *link = idx as u32;
                return idx;
            }
            cur = *link as usize;
            depth += 1;
        }
    }

    /// Index and squared distance of the stored point closest to `q`.
    pub fn nearest(&self, q: &[f64]) -> Option<(usize, f64)> {
        if self.is_empty() {
            return None;
        }
        let mut best = (usize::MAX, f64::INFINITY);
        self.nearest_rec(self.root, q, 0, &mut best);
        Some(best)
    }

    fn nearest_rec(&self, node: u32, q: &[f64], depth: usize, best: &mut (usize, f64)) {
        if node == NONE {
            return;
        }
        let i = node as usize;
        let d2 = dist_sq(self.point(i), q);
        if d2 < best.1 {
            *best = (i, d2);
        }
        let axis = depth % self.dim;
        let delta = q[axis] - self.coord(i, axis);
        let (near, far) = if delta < 0.0 {
            (self.left[i], self.right[i])
        } else {
            (self.right[i], self.left[i])
        };
        self.nearest_rec(near, q, depth + 1, best);
        // the far subtree can only win if the splitting plane is closer
        // than the current best
        if delta * delta < best.1 {
            self.nearest_rec(far, q, depth + 1, best);
        }
    }
}
