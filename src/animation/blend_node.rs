//! 混合树节点
//!
//! 节点是一个封闭的枚举；子节点通过混合树节点池中的索引引用。
//! 每个内部节点只负责把传入的权重分配给子节点：分配出去的权重之和必须等于传入权重。

use glam::Vec2;

use super::blend_tree::BlendContext;

/// 重心坐标判断“在三角形内”的容差
pub const BARYCENTRIC_TOLERANCE: f32 = 0.001;

/// 小于此值的重心坐标对应的子节点被丢弃，其余坐标重新归一化
pub const BARYCENTRIC_DROP_THRESHOLD: f32 = 0.001;

/// 节点池索引
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

/// 一维混合因子：常量或混合树局部参数索引
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum BlendFactor {
    Literal(f32),
    Parameter(usize),
}

impl BlendFactor {
    #[inline]
    pub fn value(&self, ctx: &BlendContext<'_>) -> f32 {
        match *self {
            BlendFactor::Literal(v) => v,
            BlendFactor::Parameter(index) => ctx.parameter(index),
        }
    }
}

/// 二维混合因子
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum BlendFactor2D {
    Literal(Vec2),
    Parameters { x: usize, y: usize },
}

impl BlendFactor2D {
    #[inline]
    pub fn value(&self, ctx: &BlendContext<'_>) -> Vec2 {
        match *self {
            BlendFactor2D::Literal(v) => v,
            BlendFactor2D::Parameters { x, y } => Vec2::new(ctx.parameter(x), ctx.parameter(y)),
        }
    }
}

/// 混合树节点
#[derive(Clone, Debug, PartialEq)]
pub enum BlendNode {
    /// 叶节点：混合树局部片段索引
    SingleClip { clip: usize },
    /// 两个输入线性混合
    Lerp {
        first: NodeId,
        second: NodeId,
        factor: BlendFactor,
    },
    /// 一维混合（finalize 后按位置升序）
    Blend1D {
        children: Vec<NodeId>,
        positions: Vec<f32>,
        factor: BlendFactor,
    },
    /// 二维混合（finalize 后带 Delaunay 三角形）
    Blend2D {
        children: Vec<NodeId>,
        positions: Vec<Vec2>,
        factor: BlendFactor2D,
        triangles: Vec<[usize; 3]>,
    },
}

impl BlendNode {
    /// 子节点列表（叶节点为空）
    pub fn children(&self) -> Vec<NodeId> {
        match self {
            BlendNode::SingleClip { .. } => Vec::new(),
            BlendNode::Lerp { first, second, .. } => vec![*first, *second],
            BlendNode::Blend1D { children, .. } | BlendNode::Blend2D { children, .. } => {
                children.clone()
            }
        }
    }

    /// 把 weight 分配给子节点
    ///
    /// 叶节点不调用 emit，由混合树直接处理
    pub fn distribute(&self, weight: f32, ctx: &BlendContext<'_>, mut emit: impl FnMut(NodeId, f32)) {
        match self {
            BlendNode::SingleClip { .. } => {}
            BlendNode::Lerp {
                first,
                second,
                factor,
            } => {
                let f = factor.value(ctx);
                if f <= 0.0 {
                    emit(*first, weight);
                } else if f >= 1.0 {
                    emit(*second, weight);
                } else {
                    emit(*first, weight * (1.0 - f));
                    emit(*second, weight * f);
                }
            }
            BlendNode::Blend1D {
                children,
                positions,
                factor,
            } => {
                for (i, w) in blend_1d_weights(positions, factor.value(ctx)) {
                    emit(children[i], weight * w);
                }
            }
            BlendNode::Blend2D {
                children,
                positions,
                factor,
                triangles,
            } => {
                for (i, w) in blend_2d_weights(positions, triangles, factor.value(ctx)) {
                    emit(children[i], weight * w);
                }
            }
        }
    }
}

/// 一维混合权重，positions 必须升序
///
/// 因子正好落在某个位置上或只有一侧存在时，退化为单个子节点
pub fn blend_1d_weights(positions: &[f32], factor: f32) -> Vec<(usize, f32)> {
    if positions.is_empty() {
        return Vec::new();
    }
    let second = positions.partition_point(|&p| p < factor);
    if second == 0 {
        return vec![(0, 1.0)];
    }
    if second == positions.len() {
        return vec![(positions.len() - 1, 1.0)];
    }
    if positions[second] == factor {
        return vec![(second, 1.0)];
    }

    let first = second - 1;
    let span = positions[second] - positions[first];
    let blend = (factor - positions[first]) / span;
    vec![(first, 1.0 - blend), (second, blend)]
}

/// 线段投影：返回 b 一侧的比例，已限制在 [0, 1]
#[inline]
fn segment_blend(a: Vec2, b: Vec2, p: Vec2) -> f32 {
    let e = b - a;
    let len_sq = e.dot(e);
    if len_sq <= 0.0 {
        return 0.0;
    }
    (e.dot(p - a) / len_sq).clamp(0.0, 1.0)
}

fn segment_weights(i: usize, j: usize, blend: f32) -> Vec<(usize, f32)> {
    if blend <= 0.0 {
        vec![(i, 1.0)]
    } else if blend >= 1.0 {
        vec![(j, 1.0)]
    } else {
        vec![(i, 1.0 - blend), (j, blend)]
    }
}

/// 重心坐标，三角形退化时返回 None
fn barycentric(a: Vec2, b: Vec2, c: Vec2, p: Vec2) -> Option<[f32; 3]> {
    let v0 = b - a;
    let v1 = c - a;
    let v2 = p - a;
    let d00 = v0.dot(v0);
    let d01 = v0.dot(v1);
    let d11 = v1.dot(v1);
    let d20 = v2.dot(v0);
    let d21 = v2.dot(v1);
    let denom = d00 * d11 - d01 * d01;
    if denom.abs() < f32::EPSILON {
        return None;
    }
    let v = (d11 * d20 - d01 * d21) / denom;
    let w = (d00 * d21 - d01 * d20) / denom;
    Some([1.0 - v - w, v, w])
}

/// 二维混合权重
///
/// - 1 个子节点：全部权重
/// - 2 个子节点：按线段投影，与一维两点情形一致
/// - 3 个及以上：取第一个包含因子的三角形的重心坐标；丢弃过小的坐标后重新归一化。
///   因子不在任何三角形内时，投影到最近的三角形边上
pub fn blend_2d_weights(positions: &[Vec2], triangles: &[[usize; 3]], factor: Vec2) -> Vec<(usize, f32)> {
    match positions.len() {
        0 => return Vec::new(),
        1 => return vec![(0, 1.0)],
        2 => return segment_weights(0, 1, segment_blend(positions[0], positions[1], factor)),
        _ => {}
    }

    for tri in triangles {
        let [a, b, c] = *tri;
        let Some(coords) = barycentric(positions[a], positions[b], positions[c], factor) else {
            continue;
        };
        let inside = coords
            .iter()
            .all(|&x| (-BARYCENTRIC_TOLERANCE..=1.0 + BARYCENTRIC_TOLERANCE).contains(&x));
        if !inside {
            continue;
        }

        let kept: Vec<(usize, f32)> = tri
            .iter()
            .zip(coords)
            .filter(|&(_, x)| x >= BARYCENTRIC_DROP_THRESHOLD)
            .map(|(&i, x)| (i, x))
            .collect();
        let total: f32 = kept.iter().map(|&(_, x)| x).sum();
        if total > 0.0 {
            return kept.into_iter().map(|(i, x)| (i, x / total)).collect();
        }
    }

    nearest_edge_weights(positions, triangles, factor)
}

/// 因子落在凸包外（或所有点共线）时，投影到最近的边
fn nearest_edge_weights(positions: &[Vec2], triangles: &[[usize; 3]], factor: Vec2) -> Vec<(usize, f32)> {
    let edges: Vec<(usize, usize)> = if triangles.is_empty() {
        (0..positions.len())
            .flat_map(|i| (i + 1..positions.len()).map(move |j| (i, j)))
            .collect()
    } else {
        triangles
            .iter()
            .flat_map(|&[a, b, c]| [(a, b), (b, c), (c, a)])
            .collect()
    };

    let mut best: Option<(f32, usize, usize, f32)> = None;
    for (i, j) in edges {
        let blend = segment_blend(positions[i], positions[j], factor);
        let closest = positions[i].lerp(positions[j], blend);
        let dist = closest.distance_squared(factor);
        if best.map_or(true, |(d, ..)| dist < d) {
            best = Some((dist, i, j, blend));
        }
    }

    match best {
        Some((_, i, j, blend)) => segment_weights(i, j, blend),
        None => vec![(0, 1.0)],
    }
}
