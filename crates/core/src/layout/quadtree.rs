//! Barnes–Hut quadtree for the many-body force.

/// Subdivision stops here; deeper cells keep all their points in one leaf,
/// which also absorbs coincident nodes.
const MAX_DEPTH: usize = 24;

#[derive(Debug)]
pub(super) struct Quad {
    /// Side length of the square cell.
    pub size: f64,
    /// Number of points in the cell.
    pub count: f64,
    /// Centroid of the points in the cell.
    pub cx: f64,
    pub cy: f64,
    /// Child cells; empty for leaves.
    pub children: Vec<usize>,
    /// Point indices; only leaves hold points.
    pub points: Vec<usize>,
}

/// Arena-allocated quadtree; the root is `quads[0]`.
#[derive(Debug)]
pub(super) struct QuadTree {
    pub quads: Vec<Quad>,
}

impl QuadTree {
    /// Build over `positions`. Returns `None` for an empty point set.
    pub fn new(positions: &[(f64, f64)]) -> Option<Self> {
        if positions.is_empty() {
            return None;
        }
        let finite = |v: f64| if v.is_finite() { v } else { 0.0 };
        let (mut x0, mut y0) = (f64::INFINITY, f64::INFINITY);
        let (mut x1, mut y1) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
        for &(x, y) in positions {
            let (x, y) = (finite(x), finite(y));
            x0 = x0.min(x);
            y0 = y0.min(y);
            x1 = x1.max(x);
            y1 = y1.max(y);
        }
        let size = (x1 - x0).max(y1 - y0).max(1.0);

        let mut tree = Self { quads: Vec::new() };
        let points = (0..positions.len()).collect();
        tree.build(points, (x0, y0), size, 0, positions);
        Some(tree)
    }

    fn build(
        &mut self,
        points: Vec<usize>,
        origin: (f64, f64),
        size: f64,
        depth: usize,
        positions: &[(f64, f64)],
    ) -> usize {
        let count = points.len() as f64;
        let (sx, sy) = points.iter().fold((0.0, 0.0), |(sx, sy), &p| {
            (sx + positions[p].0, sy + positions[p].1)
        });
        let id = self.quads.len();
        self.quads.push(Quad {
            size,
            count,
            cx: sx / count,
            cy: sy / count,
            children: Vec::new(),
            points: Vec::new(),
        });
        if points.len() <= 1 || depth >= MAX_DEPTH {
            self.quads[id].points = points;
            return id;
        }

        let half = size / 2.0;
        let (mx, my) = (origin.0 + half, origin.1 + half);
        let mut parts: [Vec<usize>; 4] = Default::default();
        for p in points {
            let (x, y) = positions[p];
            parts[usize::from(x >= mx) + 2 * usize::from(y >= my)].push(p);
        }

        let mut children = Vec::new();
        for (k, part) in parts.into_iter().enumerate() {
            if part.is_empty() {
                continue;
            }
            let cx0 = if k & 1 == 1 { mx } else { origin.0 };
            let cy0 = if k & 2 == 2 { my } else { origin.1 };
            children.push(self.build(part, (cx0, cy0), half, depth + 1, positions));
        }
        self.quads[id].children = children;
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_aggregates_every_point() {
        let positions = [(0.0, 0.0), (10.0, 0.0), (0.0, 10.0), (10.0, 10.0)];
        let tree = QuadTree::new(&positions).unwrap();
        let root = &tree.quads[0];
        assert_eq!(root.count, 4.0);
        assert_eq!((root.cx, root.cy), (5.0, 5.0));
        assert_eq!(root.children.len(), 4);
        let leaves: usize = tree.quads.iter().map(|q| q.points.len()).sum();
        assert_eq!(leaves, 4);
    }

    #[test]
    fn coincident_points_share_a_leaf() {
        let positions = [(3.0, 3.0), (3.0, 3.0), (3.0, 3.0)];
        let tree = QuadTree::new(&positions).unwrap();
        assert!(tree.quads.iter().any(|q| q.points.len() == 3));
        assert!(QuadTree::new(&[]).is_none());
    }
}
