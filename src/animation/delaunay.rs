//! Delaunay 三角剖分（Bowyer-Watson）
//!
//! 只在混合树 finalize 时对 2D 混合节点的子节点位置做一次预计算，不在每帧调用。

use glam::Vec2;

/// 三角形及其外接圆
#[derive(Clone, Copy, Debug)]
struct Triangle {
    v: [usize; 3],
    center: Vec2,
    radius_sq: f32,
}

impl Triangle {
    fn new(v: [usize; 3], vertices: &[Vec2]) -> Option<Self> {
        let (a, b, c) = (vertices[v[0]], vertices[v[1]], vertices[v[2]]);
        let d = 2.0 * (a.x * (b.y - c.y) + b.x * (c.y - a.y) + c.x * (a.y - b.y));
        if d.abs() < f32::EPSILON {
            // 三点共线，没有外接圆
            return None;
        }
        let (a2, b2, c2) = (a.length_squared(), b.length_squared(), c.length_squared());
        let center = Vec2::new(
            (a2 * (b.y - c.y) + b2 * (c.y - a.y) + c2 * (a.y - b.y)) / d,
            (a2 * (c.x - b.x) + b2 * (a.x - c.x) + c2 * (b.x - a.x)) / d,
        );
        Some(Self {
            v,
            center,
            radius_sq: center.distance_squared(a),
        })
    }

    #[inline]
    fn circumcircle_contains(&self, p: Vec2) -> bool {
        self.center.distance_squared(p) < self.radius_sq
    }

    #[inline]
    fn edges(&self) -> [(usize, usize); 3] {
        [
            (self.v[0], self.v[1]),
            (self.v[1], self.v[2]),
            (self.v[2], self.v[0]),
        ]
    }
}

#[inline]
fn same_edge(a: (usize, usize), b: (usize, usize)) -> bool {
    (a.0 == b.0 && a.1 == b.1) || (a.0 == b.1 && a.1 == b.0)
}

/// 对点集做三角剖分，返回逆时针顶点索引
///
/// 少于 3 个点或全部共线时返回空
pub fn triangulate(points: &[Vec2]) -> Vec<[usize; 3]> {
    let n = points.len();
    if n < 3 {
        return Vec::new();
    }

    let (min, max) = points
        .iter()
        .fold((points[0], points[0]), |(lo, hi), p| (lo.min(*p), hi.max(*p)));
    let size = (max - min).max_element();
    if size <= 0.0 {
        return Vec::new();
    }
    let mid = (min + max) * 0.5;

    // 超级三角形包含所有点
    let mut vertices = points.to_vec();
    vertices.push(Vec2::new(mid.x - 20.0 * size, mid.y - size));
    vertices.push(Vec2::new(mid.x, mid.y + 20.0 * size));
    vertices.push(Vec2::new(mid.x + 20.0 * size, mid.y - size));

    let mut triangles: Vec<Triangle> = Triangle::new([n, n + 1, n + 2], &vertices)
        .into_iter()
        .collect();

    for (i, &p) in points.iter().enumerate() {
        let (bad, good): (Vec<Triangle>, Vec<Triangle>) = triangles
            .into_iter()
            .partition(|t| t.circumcircle_contains(p));
        triangles = good;

        // 空洞边界：只属于一个坏三角形的边
        let edges: Vec<(usize, usize)> = bad.iter().flat_map(|t| t.edges()).collect();
        for (k, &edge) in edges.iter().enumerate() {
            let shared = edges
                .iter()
                .enumerate()
                .any(|(j, &other)| j != k && same_edge(edge, other));
            if shared {
                continue;
            }
            if let Some(t) = Triangle::new([edge.0, edge.1, i], &vertices) {
                triangles.push(t);
            }
        }
    }

    triangles
        .into_iter()
        .filter(|t| t.v.iter().all(|&v| v < n))
        .map(|t| {
            let [a, b, c] = t.v;
            let cross = (points[b] - points[a]).perp_dot(points[c] - points[a]);
            if cross < 0.0 {
                [a, c, b]
            } else {
                [a, b, c]
            }
        })
        .collect()
}
