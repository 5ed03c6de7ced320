//! 混合树
//!
//! 混合树拥有所有节点，节点之间通过索引引用，根节点只是其中一个特殊索引。
//! 参数名与片段名在树内有各自的局部索引，求值时通过状态图的全局索引表映射。
//! 树通过 BlendTreeBuilder 一次性构建并 finalize，之后只读，可在多个实例之间共享。

use std::collections::HashMap;
use std::sync::Arc;

use glam::Vec2;

use super::blend_node::{BlendFactor, BlendFactor2D, BlendNode, NodeId};
use super::clip::AnimationClip;
use super::delaunay;
use crate::skeleton::{SkeletonDescription, SkeletonPose};
use crate::{AnimError, Result};

// ============================================================================
// 求值上下文
// ============================================================================

/// 求值上下文
///
/// - parameters: 参数值数组（按 parameter_map 映射后的索引访问）
/// - parameter_map / clip_map: 树局部索引 → 全局索引，None 表示恒等映射
/// - clips: 全局片段表，缺失的片段为 None
#[derive(Clone, Copy, Debug)]
pub struct BlendContext<'a> {
    pub parameters: &'a [f32],
    pub parameter_map: Option<&'a [usize]>,
    pub clip_map: Option<&'a [usize]>,
    pub clips: &'a [Option<Arc<AnimationClip>>],
}

impl<'a> BlendContext<'a> {
    /// 局部索引即全局索引
    pub fn local(parameters: &'a [f32], clips: &'a [Option<Arc<AnimationClip>>]) -> Self {
        Self {
            parameters,
            parameter_map: None,
            clip_map: None,
            clips,
        }
    }

    /// 读取参数，未知参数为 0
    #[inline]
    pub fn parameter(&self, local: usize) -> f32 {
        let global = match self.parameter_map {
            Some(map) => match map.get(local) {
                Some(&g) => g,
                None => return 0.0,
            },
            None => local,
        };
        self.parameters.get(global).copied().unwrap_or(0.0)
    }

    /// 查找片段，缺失时返回 None
    #[inline]
    pub fn clip(&self, local: usize) -> Option<&'a AnimationClip> {
        let global = match self.clip_map {
            Some(map) => *map.get(local)?,
            None => local,
        };
        self.clips.get(global)?.as_deref()
    }
}

/// 展开结果：片段及其权重
#[derive(Clone, Copy, Debug)]
pub struct WeightedClip<'a> {
    pub clip: &'a AnimationClip,
    pub weight: f32,
}

// ============================================================================
// 混合树
// ============================================================================

/// 混合树（finalize 后只读）
#[derive(Clone, Debug)]
pub struct AnimationBlendTree {
    name: String,
    nodes: Vec<BlendNode>,
    root: NodeId,
    parameter_names: Vec<String>,
    parameter_index: HashMap<String, usize>,
    clip_names: Vec<String>,
    clip_index: HashMap<String, usize>,
}

impl AnimationBlendTree {
    pub fn builder(name: impl Into<String>) -> BlendTreeBuilder {
        BlendTreeBuilder::new(name)
    }

    /// 只含一个片段的树
    pub fn single_clip(name: impl Into<String>, clip: &str) -> Self {
        let mut builder = BlendTreeBuilder::new(name);
        let root = builder.clip(clip);
        builder.finish(root)
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn root(&self) -> NodeId {
        self.root
    }

    #[inline]
    pub fn node(&self, id: NodeId) -> Option<&BlendNode> {
        self.nodes.get(id.0)
    }

    #[inline]
    pub fn nodes(&self) -> &[BlendNode] {
        &self.nodes
    }

    #[inline]
    pub fn parameter_names(&self) -> &[String] {
        &self.parameter_names
    }

    #[inline]
    pub fn clip_names(&self) -> &[String] {
        &self.clip_names
    }

    #[inline]
    pub fn find_parameter(&self, name: &str) -> Option<usize> {
        self.parameter_index.get(name).copied()
    }

    #[inline]
    pub fn find_clip(&self, name: &str) -> Option<usize> {
        self.clip_index.get(name).copied()
    }

    /// 根节点是否为单个片段
    pub fn as_single_clip(&self) -> Option<&str> {
        match self.node(self.root)? {
            BlendNode::SingleClip { clip } => self.clip_names.get(*clip).map(String::as_str),
            _ => None,
        }
    }

    /// 从根节点展开为 (片段, 权重) 列表
    ///
    /// 权重之和等于 weight；缺失的片段不贡献任何条目
    pub fn flatten<'a>(&self, ctx: &BlendContext<'a>, weight: f32) -> Vec<WeightedClip<'a>> {
        let mut out = Vec::new();
        self.flatten_into(ctx, weight, &mut out);
        out
    }

    pub fn flatten_into<'a>(
        &self,
        ctx: &BlendContext<'a>,
        weight: f32,
        out: &mut Vec<WeightedClip<'a>>,
    ) {
        self.flatten_recursive(self.root, weight, ctx, out);
    }

    fn flatten_recursive<'a>(
        &self,
        id: NodeId,
        weight: f32,
        ctx: &BlendContext<'a>,
        out: &mut Vec<WeightedClip<'a>>,
    ) {
        let Some(node) = self.nodes.get(id.0) else {
            return;
        };
        match node {
            BlendNode::SingleClip { clip } => {
                if let Some(clip) = ctx.clip(*clip) {
                    out.push(WeightedClip { clip, weight });
                }
            }
            _ => node.distribute(weight, ctx, |child, w| {
                self.flatten_recursive(child, w, ctx, out);
            }),
        }
    }

    /// 按权重平均的片段时长
    pub fn weighted_duration(&self, ctx: &BlendContext<'_>) -> f32 {
        let clips = self.flatten(ctx, 1.0);
        let total: f32 = clips.iter().map(|c| c.weight).sum();
        if total <= 0.0 {
            return 0.0;
        }
        clips.iter().map(|c| c.clip.duration() * c.weight).sum::<f32>() / total
    }

    /// 在归一化时间 time 上求混合姿态
    ///
    /// 没有任何可用片段时返回绑定姿态
    pub fn evaluate(
        &self,
        ctx: &BlendContext<'_>,
        time: f32,
        description: &Arc<SkeletonDescription>,
    ) -> Result<SkeletonPose> {
        blend_clips(&self.flatten(ctx, 1.0), time, description)
    }
}

/// 按权重累积混合片段姿态
///
/// 第 k 个片段以 w_k / (w_0 + ... + w_k) 的比例插值进累积结果，等价于加权平均
pub fn blend_clips(
    clips: &[WeightedClip<'_>],
    time: f32,
    description: &Arc<SkeletonDescription>,
) -> Result<SkeletonPose> {
    let mut pose: Option<SkeletonPose> = None;
    let mut accumulated = 0.0;

    for entry in clips.iter().filter(|c| c.weight > 0.0) {
        let sample = entry.clip.get_pose(time, true);
        accumulated += entry.weight;
        match pose.as_mut() {
            None => {
                if !Arc::ptr_eq(sample.description(), description) {
                    return Err(AnimError::SkeletonMismatch);
                }
                pose = Some(sample);
            }
            Some(p) => p.lerp_in_place(&sample, entry.weight / accumulated)?,
        }
    }

    Ok(pose.unwrap_or_else(|| SkeletonPose::bind(description)))
}

// ============================================================================
// 构建器
// ============================================================================

/// 构建时使用的一维因子（参数按名称引用）
#[derive(Clone, Debug, PartialEq)]
pub enum Factor {
    Literal(f32),
    Parameter(String),
}

/// 构建时使用的二维因子
#[derive(Clone, Debug, PartialEq)]
pub enum Factor2D {
    Literal(Vec2),
    Parameters(String, String),
}

/// 混合树构建器
///
/// 负责把参数名、片段名解析为树局部索引，build 时完成 finalize
#[derive(Clone, Debug)]
pub struct BlendTreeBuilder {
    name: String,
    nodes: Vec<BlendNode>,
    parameter_names: Vec<String>,
    parameter_index: HashMap<String, usize>,
    clip_names: Vec<String>,
    clip_index: HashMap<String, usize>,
}

impl BlendTreeBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nodes: Vec::new(),
            parameter_names: Vec::new(),
            parameter_index: HashMap::new(),
            clip_names: Vec::new(),
            clip_index: HashMap::new(),
        }
    }

    fn parameter(&mut self, name: &str) -> usize {
        if let Some(&index) = self.parameter_index.get(name) {
            return index;
        }
        let index = self.parameter_names.len();
        self.parameter_names.push(name.to_string());
        self.parameter_index.insert(name.to_string(), index);
        index
    }

    fn clip_slot(&mut self, name: &str) -> usize {
        if let Some(&index) = self.clip_index.get(name) {
            return index;
        }
        let index = self.clip_names.len();
        self.clip_names.push(name.to_string());
        self.clip_index.insert(name.to_string(), index);
        index
    }

    fn factor(&mut self, factor: Factor) -> BlendFactor {
        match factor {
            Factor::Literal(v) => BlendFactor::Literal(v),
            Factor::Parameter(name) => BlendFactor::Parameter(self.parameter(&name)),
        }
    }

    fn check(&self, id: NodeId) -> Result<()> {
        if id.0 < self.nodes.len() {
            Ok(())
        } else {
            Err(AnimError::BlendTree(format!(
                "tree '{}' references unknown node {}",
                self.name, id.0
            )))
        }
    }

    fn push(&mut self, node: BlendNode) -> NodeId {
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    /// 片段叶节点
    pub fn clip(&mut self, name: &str) -> NodeId {
        let clip = self.clip_slot(name);
        self.push(BlendNode::SingleClip { clip })
    }

    /// 线性混合节点
    pub fn lerp(&mut self, first: NodeId, second: NodeId, factor: Factor) -> Result<NodeId> {
        self.check(first)?;
        self.check(second)?;
        let factor = self.factor(factor);
        Ok(self.push(BlendNode::Lerp {
            first,
            second,
            factor,
        }))
    }

    /// 一维混合节点
    pub fn blend_1d(&mut self, children: Vec<(NodeId, f32)>, factor: Factor) -> Result<NodeId> {
        if children.is_empty() {
            return Err(AnimError::BlendTree(format!(
                "tree '{}': blend1D node needs at least one child",
                self.name
            )));
        }
        for (child, position) in &children {
            self.check(*child)?;
            if !position.is_finite() {
                return Err(AnimError::BlendTree(format!(
                    "tree '{}': blend1D position must be finite",
                    self.name
                )));
            }
        }
        let factor = self.factor(factor);
        let (children, positions): (Vec<NodeId>, Vec<f32>) = children.into_iter().unzip();
        Ok(self.push(BlendNode::Blend1D {
            children,
            positions,
            factor,
        }))
    }

    /// 二维混合节点
    pub fn blend_2d(&mut self, children: Vec<(NodeId, Vec2)>, factor: Factor2D) -> Result<NodeId> {
        if children.is_empty() {
            return Err(AnimError::BlendTree(format!(
                "tree '{}': blend2D node needs at least one child",
                self.name
            )));
        }
        for (child, position) in &children {
            self.check(*child)?;
            if !position.is_finite() {
                return Err(AnimError::BlendTree(format!(
                    "tree '{}': blend2D position must be finite",
                    self.name
                )));
            }
        }
        let factor = match factor {
            Factor2D::Literal(v) => BlendFactor2D::Literal(v),
            Factor2D::Parameters(x, y) => BlendFactor2D::Parameters {
                x: self.parameter(&x),
                y: self.parameter(&y),
            },
        };
        let (children, positions): (Vec<NodeId>, Vec<Vec2>) = children.into_iter().unzip();
        Ok(self.push(BlendNode::Blend2D {
            children,
            positions,
            factor,
            triangles: Vec::new(),
        }))
    }

    /// 设置根节点并 finalize
    pub fn build(self, root: NodeId) -> Result<AnimationBlendTree> {
        self.check(root)?;
        Ok(self.finish(root))
    }

    /// 一维子节点按位置排序；二维子节点做三角剖分
    fn finish(mut self, root: NodeId) -> AnimationBlendTree {
        for node in &mut self.nodes {
            match node {
                BlendNode::Blend1D {
                    children,
                    positions,
                    ..
                } => {
                    let mut pairs: Vec<(NodeId, f32)> =
                        children.iter().copied().zip(positions.iter().copied()).collect();
                    pairs.sort_by(|a, b| a.1.total_cmp(&b.1));
                    let (sorted_children, sorted_positions): (Vec<NodeId>, Vec<f32>) =
                        pairs.into_iter().unzip();
                    *children = sorted_children;
                    *positions = sorted_positions;
                }
                BlendNode::Blend2D {
                    positions,
                    triangles,
                    ..
                } => {
                    *triangles = delaunay::triangulate(positions);
                }
                _ => {}
            }
        }

        AnimationBlendTree {
            name: self.name,
            nodes: self.nodes,
            root,
            parameter_names: self.parameter_names,
            parameter_index: self.parameter_index,
            clip_names: self.clip_names,
            clip_index: self.clip_index,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Quat, Vec3};

    fn description() -> Arc<SkeletonDescription> {
        let mut desc = SkeletonDescription::new("rig");
        desc.add_joint("root", None, Quat::IDENTITY, Vec3::ZERO).unwrap();
        desc.compute_bind_transforms();
        Arc::new(desc)
    }

    /// 每个片段把根关节放在固定的 x 偏移上
    fn clips(desc: &Arc<SkeletonDescription>, names: &[&str]) -> Vec<Option<Arc<AnimationClip>>> {
        names
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let mut clip = AnimationClip::new(*name, Arc::clone(desc), true);
                let offset = Vec3::new(i as f32, 0.0, 0.0);
                clip.add_sample(0, 0.0, Quat::IDENTITY, offset).unwrap();
                clip.add_sample(0, 1.0, Quat::IDENTITY, offset).unwrap();
                Some(Arc::new(clip))
            })
            .collect()
    }

    fn weights(tree: &AnimationBlendTree, ctx: &BlendContext<'_>) -> HashMap<String, f32> {
        let mut out = HashMap::new();
        for entry in tree.flatten(ctx, 1.0) {
            *out.entry(entry.clip.name().to_string()).or_insert(0.0) += entry.weight;
        }
        out
    }

    fn total(tree: &AnimationBlendTree, ctx: &BlendContext<'_>, weight: f32) -> f32 {
        tree.flatten(ctx, weight).iter().map(|c| c.weight).sum()
    }

    #[test]
    fn test_lerp_node() {
        let desc = description();
        let clips = clips(&desc, &["a", "b"]);
        let mut builder = AnimationBlendTree::builder("lerp");
        let a = builder.clip("a");
        let b = builder.clip("b");
        let root = builder
            .lerp(a, b, Factor::Parameter("mix".to_string()))
            .unwrap();
        let tree = builder.build(root).unwrap();

        let params = [0.25];
        let w = weights(&tree, &BlendContext::local(&params, &clips));
        assert!((w["a"] - 0.75).abs() < 1e-6);
        assert!((w["b"] - 0.25).abs() < 1e-6);

        let params = [-3.0];
        let w = weights(&tree, &BlendContext::local(&params, &clips));
        assert_eq!(w.len(), 1);
        assert_eq!(w["a"], 1.0);
    }

    #[test]
    fn test_1d_children_sorted_on_build() {
        let desc = description();
        let clips = clips(&desc, &["slow", "fast", "mid"]);
        let mut builder = AnimationBlendTree::builder("speed");
        let slow = builder.clip("slow");
        let fast = builder.clip("fast");
        let mid = builder.clip("mid");
        let root = builder
            .blend_1d(vec![(fast, 2.0), (slow, 0.0), (mid, 1.0)], Factor::Literal(0.5))
            .unwrap();
        let tree = builder.build(root).unwrap();

        match tree.node(tree.root()).unwrap() {
            BlendNode::Blend1D { positions, .. } => assert_eq!(positions, &vec![0.0, 1.0, 2.0]),
            other => panic!("unexpected node {other:?}"),
        }

        let w = weights(&tree, &BlendContext::local(&[], &clips));
        assert!((w["slow"] - 0.5).abs() < 1e-6);
        assert!((w["mid"] - 0.5).abs() < 1e-6);
        assert!(!w.contains_key("fast"));
    }

    #[test]
    fn test_weight_conservation_nested() {
        let desc = description();
        let names = ["a", "b", "c", "d", "e", "f"];
        let clips = clips(&desc, &names);
        let mut builder = AnimationBlendTree::builder("nested");
        let ids: Vec<NodeId> = names.iter().map(|n| builder.clip(n)).collect();
        let line = builder
            .blend_1d(
                vec![(ids[0], 0.0), (ids[1], 1.0), (ids[2], 3.0)],
                Factor::Parameter("speed".to_string()),
            )
            .unwrap();
        let pair = builder
            .blend_2d(
                vec![(ids[3], Vec2::ZERO), (ids[4], Vec2::new(1.0, 1.0))],
                Factor2D::Parameters("x".to_string(), "y".to_string()),
            )
            .unwrap();
        let plane = builder
            .blend_2d(
                vec![
                    (line, Vec2::new(-1.0, -1.0)),
                    (pair, Vec2::new(1.0, -1.0)),
                    (ids[5], Vec2::new(0.0, 1.0)),
                    (ids[0], Vec2::new(2.0, 2.0)),
                ],
                Factor2D::Parameters("x".to_string(), "y".to_string()),
            )
            .unwrap();
        let root = builder
            .lerp(plane, ids[1], Factor::Parameter("mix".to_string()))
            .unwrap();
        let tree = builder.build(root).unwrap();

        // 参数顺序：speed, x, y, mix
        let samples = [
            [0.0, 0.0, 0.0, 0.0],
            [0.5, 0.3, -0.2, 0.4],
            [2.0, -5.0, 3.0, 0.9],
            [7.0, 1.5, 1.5, 1.2],
            [-1.0, 0.0, 1.0, -0.5],
        ];
        for params in samples {
            let ctx = BlendContext::local(&params, &clips);
            for weight in [1.0, 0.37, 4.0] {
                let sum = total(&tree, &ctx, weight);
                assert!((sum - weight).abs() < 1e-4, "{params:?}: {sum} != {weight}");
            }
            assert!(tree.flatten(&ctx, 1.0).iter().all(|c| c.weight >= 0.0));
        }
    }

    #[test]
    fn test_missing_clip_contributes_nothing() {
        let desc = description();
        let mut clips = clips(&desc, &["a", "b"]);
        clips[1] = None;
        let mut builder = AnimationBlendTree::builder("partial");
        let a = builder.clip("a");
        let b = builder.clip("b");
        let root = builder.lerp(a, b, Factor::Literal(0.5)).unwrap();
        let tree = builder.build(root).unwrap();

        let flat = tree.flatten(&BlendContext::local(&[], &clips), 1.0);
        assert_eq!(flat.len(), 1);
        assert_eq!(flat[0].clip.name(), "a");
        assert_eq!(flat[0].weight, 0.5);
    }

    #[test]
    fn test_global_index_mapping() {
        let desc = description();
        let clips = clips(&desc, &["x", "walk", "y", "run"]);
        let mut builder = AnimationBlendTree::builder("mapped");
        let walk = builder.clip("walk");
        let run = builder.clip("run");
        let root = builder
            .lerp(walk, run, Factor::Parameter("speed".to_string()))
            .unwrap();
        let tree = builder.build(root).unwrap();

        let parameters = [0.0, 0.0, 1.0];
        let ctx = BlendContext {
            parameters: &parameters,
            parameter_map: Some(&[2]),
            clip_map: Some(&[1, 3]),
            clips: &clips,
        };
        let flat = tree.flatten(&ctx, 1.0);
        assert_eq!(flat.len(), 1);
        assert_eq!(flat[0].clip.name(), "run");
    }

    #[test]
    fn test_evaluate_blends_poses() {
        let desc = description();
        let clips = clips(&desc, &["a", "b", "c"]);
        let mut builder = AnimationBlendTree::builder("tri");
        let a = builder.clip("a");
        let b = builder.clip("b");
        let c = builder.clip("c");
        let root = builder
            .blend_1d(vec![(a, 0.0), (b, 1.0), (c, 2.0)], Factor::Literal(1.5))
            .unwrap();
        let tree = builder.build(root).unwrap();

        let pose = tree
            .evaluate(&BlendContext::local(&[], &clips), 0.5, &desc)
            .unwrap();
        // b 偏移 1，c 偏移 2，各占一半
        assert!((pose.joint(0).unwrap().offset.x - 1.5).abs() < 1e-5);
    }

    #[test]
    fn test_evaluate_without_clips_is_bind_pose() {
        let desc = description();
        let tree = AnimationBlendTree::single_clip("lonely", "nowhere");
        let pose = tree.evaluate(&BlendContext::local(&[], &[]), 0.0, &desc).unwrap();
        assert_eq!(pose.joint(0).unwrap().offset, Vec3::ZERO);
        assert_eq!(tree.as_single_clip(), Some("nowhere"));
    }

    #[test]
    fn test_build_rejects_unknown_node() {
        let builder = AnimationBlendTree::builder("broken");
        assert!(builder.build(NodeId(3)).is_err());

        let mut builder = AnimationBlendTree::builder("broken");
        assert!(builder.blend_1d(Vec::new(), Factor::Literal(0.0)).is_err());
    }
}
