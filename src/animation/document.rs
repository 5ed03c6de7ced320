//! 状态图 JSON 文档
//!
//! 文档格式：
//! ```json
//! {
//!   "blend-trees": [{ "id": "move", "root": { "lerp": { "first": { "clip": "walk" }, "second": { "clip": "run" }, "parameter": "speed" } } }],
//!   "states": [{ "id": "idle", "clip": "idle", "loop": true }, { "id": "move", "blendtree-id": "move" }],
//!   "transitions": [{ "from-id": "any", "to-id": "idle", "trigger-flag": "stop", "duration": 0.2 }],
//!   "initial-state-id": "idle"
//! }
//! ```
//!
//! 加载尽力而为：无法解析的 JSON 返回错误，单个混合树、状态或过渡有问题时
//! 记录警告并跳过。

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::blend_node::{BlendFactor, BlendFactor2D, BlendNode, NodeId};
use super::blend_tree::{AnimationBlendTree, BlendTreeBuilder, Factor, Factor2D};
use super::state_graph::{
    AnimationStateGraph, StateDesc, StateTimeScale, TimeScale, TransitionDesc, TransitionType,
    ANY_STATE,
};
use crate::{AnimError, Result};

fn default_one() -> f32 {
    1.0
}

fn is_default_one(v: &f32) -> bool {
    *v == 1.0
}

fn is_zero(v: &f32) -> bool {
    *v == 0.0
}

fn is_false(v: &bool) -> bool {
    !*v
}

fn is_frozen(v: &TransitionType) -> bool {
    *v == TransitionType::Frozen
}

// ============================================================================
// 文档结构
// ============================================================================

/// 混合树节点
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum NodeDocument {
    #[serde(rename = "clip")]
    Clip(String),
    #[serde(rename = "lerp")]
    Lerp(LerpDocument),
    #[serde(rename = "blend1D")]
    Blend1D(Blend1DDocument),
    #[serde(rename = "blend2D")]
    Blend2D(Blend2DDocument),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LerpDocument {
    pub first: Box<NodeDocument>,
    pub second: Box<NodeDocument>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameter: Option<String>,
    /// 没有参数时使用的固定因子
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub factor: Option<f32>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Blend1DChild {
    pub node: NodeDocument,
    pub position: f32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Blend1DDocument {
    pub children: Vec<Blend1DChild>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub factor: Option<f32>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Blend2DChild {
    pub node: NodeDocument,
    pub position: [f32; 2],
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Blend2DDocument {
    pub children: Vec<Blend2DChild>,
    #[serde(default, rename = "parameter-x", skip_serializing_if = "Option::is_none")]
    pub parameter_x: Option<String>,
    #[serde(default, rename = "parameter-y", skip_serializing_if = "Option::is_none")]
    pub parameter_y: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub factor: Option<[f32; 2]>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BlendTreeDocument {
    pub id: String,
    pub root: NodeDocument,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StateDocument {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clip: Option<String>,
    #[serde(default, rename = "blendtree-id", skip_serializing_if = "Option::is_none")]
    pub blendtree_id: Option<String>,
    #[serde(default = "default_one", skip_serializing_if = "is_default_one")]
    pub timescale: f32,
    #[serde(default, rename = "timescale-parameter", skip_serializing_if = "Option::is_none")]
    pub timescale_parameter: Option<String>,
    #[serde(default, rename = "loop")]
    pub looping: bool,
    #[serde(default, rename = "timescale-absolute", skip_serializing_if = "is_false")]
    pub timescale_absolute: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransitionDocument {
    /// 源状态，"any" 表示任意状态
    #[serde(rename = "from-id")]
    pub from_id: String,
    #[serde(rename = "to-id")]
    pub to_id: String,
    #[serde(default, rename = "trigger-flag", skip_serializing_if = "Option::is_none")]
    pub trigger_flag: Option<String>,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub duration: f32,
    #[serde(default = "default_one", rename = "from-time")]
    pub from_time: f32,
    #[serde(default, rename = "to-time")]
    pub to_time: f32,
    #[serde(default)]
    pub wait: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub cancellable: bool,
    #[serde(default, rename = "in-type", skip_serializing_if = "is_frozen")]
    pub in_type: TransitionType,
    #[serde(default, rename = "out-type", skip_serializing_if = "is_frozen")]
    pub out_type: TransitionType,
}

/// 状态图文档
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, rename = "blend-trees", skip_serializing_if = "Vec::is_empty")]
    pub blend_trees: Vec<BlendTreeDocument>,
    #[serde(default)]
    pub states: Vec<StateDocument>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub transitions: Vec<TransitionDocument>,
    #[serde(default, rename = "initial-state-id", skip_serializing_if = "Option::is_none")]
    pub initial_state_id: Option<String>,
}

// ============================================================================
// 加载
// ============================================================================

/// 从 JSON 字符串加载状态图
pub fn load_graph_from_str(json: &str) -> Result<AnimationStateGraph> {
    let document: GraphDocument = serde_json::from_str(json)?;
    document.build("graph")
}

/// 从 JSON 文件加载状态图，文档未命名时使用文件名
pub fn load_graph_from_file<P: AsRef<Path>>(path: P) -> Result<AnimationStateGraph> {
    let path = path.as_ref();
    let json = fs::read_to_string(path)?;
    let document: GraphDocument = serde_json::from_str(&json)?;
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("graph");
    let graph = document.build(stem)?;
    log::info!(
        "[AnimGraph] 状态图加载完成: {:?}, 状态 {}, 过渡 {}",
        path,
        graph.states().len(),
        graph.transitions().len()
    );
    Ok(graph)
}

impl GraphDocument {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// 构建状态图，default_name 用于未命名的文档
    pub fn build(&self, default_name: &str) -> Result<AnimationStateGraph> {
        let name = self.name.as_deref().unwrap_or(default_name);
        let mut builder = AnimationStateGraph::builder(name);

        let mut trees: HashMap<&str, Arc<AnimationBlendTree>> = HashMap::new();
        for doc in &self.blend_trees {
            match build_tree(doc) {
                Ok(tree) => {
                    trees.insert(doc.id.as_str(), Arc::new(tree));
                }
                Err(e) => log::warn!("[AnimGraph] 混合树 '{}' 无效，跳过: {}", doc.id, e),
            }
        }

        for doc in &self.states {
            let tree = match (&doc.clip, &doc.blendtree_id) {
                (Some(clip), _) => Arc::new(AnimationBlendTree::single_clip(doc.id.as_str(), clip)),
                (None, Some(id)) => match trees.get(id.as_str()) {
                    Some(tree) => Arc::clone(tree),
                    None => {
                        log::warn!("[AnimGraph] 状态 '{}' 引用未知混合树 '{}'，跳过", doc.id, id);
                        continue;
                    }
                },
                (None, None) => {
                    log::warn!("[AnimGraph] 状态 '{}' 没有片段或混合树，跳过", doc.id);
                    continue;
                }
            };
            let time_scale = match &doc.timescale_parameter {
                Some(parameter) => StateTimeScale::Parameter(parameter.clone()),
                None => StateTimeScale::Literal(doc.timescale),
            };
            let desc = StateDesc {
                name: doc.id.clone(),
                tree,
                looping: doc.looping,
                time_scale,
                absolute_time_scale: doc.timescale_absolute,
            };
            if let Err(e) = builder.add_state(desc) {
                log::warn!("[AnimGraph] 状态 '{}' 跳过: {}", doc.id, e);
            }
        }

        for doc in &self.transitions {
            let desc = TransitionDesc {
                from: (doc.from_id != ANY_STATE).then(|| doc.from_id.clone()),
                to: doc.to_id.clone(),
                duration: doc.duration,
                in_type: doc.in_type,
                out_type: doc.out_type,
                from_time: doc.from_time,
                to_time: doc.to_time,
                trigger_flag: doc.trigger_flag.clone(),
                wait: doc.wait,
                cancellable: doc.cancellable,
            };
            if let Err(e) = builder.add_transition(desc) {
                log::warn!(
                    "[AnimGraph] 过渡 '{}' -> '{}' 跳过: {}",
                    doc.from_id,
                    doc.to_id,
                    e
                );
            }
        }

        if let Some(initial) = &self.initial_state_id {
            if let Err(e) = builder.set_initial_state(initial) {
                log::warn!("[AnimGraph] 初始状态无效，使用第一个状态: {}", e);
            }
        }

        builder.build()
    }
}

fn build_tree(doc: &BlendTreeDocument) -> Result<AnimationBlendTree> {
    let mut builder = AnimationBlendTree::builder(doc.id.as_str());
    let root = add_node(&mut builder, &doc.root)?;
    builder.build(root)
}

fn add_node(builder: &mut BlendTreeBuilder, node: &NodeDocument) -> Result<NodeId> {
    match node {
        NodeDocument::Clip(name) => Ok(builder.clip(name)),
        NodeDocument::Lerp(lerp) => {
            let first = add_node(builder, &lerp.first)?;
            let second = add_node(builder, &lerp.second)?;
            builder.lerp(first, second, factor_of(&lerp.parameter, lerp.factor))
        }
        NodeDocument::Blend1D(blend) => {
            let children = blend
                .children
                .iter()
                .map(|c| Ok((add_node(builder, &c.node)?, c.position)))
                .collect::<Result<Vec<_>>>()?;
            builder.blend_1d(children, factor_of(&blend.parameter, blend.factor))
        }
        NodeDocument::Blend2D(blend) => {
            let children = blend
                .children
                .iter()
                .map(|c| Ok((add_node(builder, &c.node)?, Vec2::from(c.position))))
                .collect::<Result<Vec<_>>>()?;
            let factor = match (&blend.parameter_x, &blend.parameter_y) {
                (Some(x), Some(y)) => Factor2D::Parameters(x.clone(), y.clone()),
                (None, None) => Factor2D::Literal(Vec2::from(blend.factor.unwrap_or([0.0, 0.0]))),
                _ => {
                    return Err(AnimError::GraphLoad(
                        "blend2D needs both parameter-x and parameter-y".to_string(),
                    ))
                }
            };
            builder.blend_2d(children, factor)
        }
    }
}

fn factor_of(parameter: &Option<String>, literal: Option<f32>) -> Factor {
    match parameter {
        Some(name) => Factor::Parameter(name.clone()),
        None => Factor::Literal(literal.unwrap_or(0.0)),
    }
}

// ============================================================================
// 导出
// ============================================================================

impl AnimationStateGraph {
    /// 导出为文档，单片段状态写为 "clip"，其余写为 "blendtree-id"
    pub fn to_document(&self) -> GraphDocument {
        let mut document = GraphDocument {
            name: Some(self.name().to_string()),
            initial_state_id: self
                .state(self.initial_state())
                .map(|s| s.name().to_string()),
            ..GraphDocument::default()
        };

        // 已导出的树（按 Arc 身份）及其 id
        let mut exported: Vec<(&Arc<AnimationBlendTree>, String)> = Vec::new();

        for state in self.states() {
            let tree = state.tree();
            let (clip, blendtree_id) = match tree.as_single_clip() {
                Some(clip) => (Some(clip.to_string()), None),
                None => {
                    let id = match exported.iter().find(|(t, _)| Arc::ptr_eq(t, tree)) {
                        Some((_, id)) => id.clone(),
                        None => {
                            let id = unique_tree_id(tree.name(), &document.blend_trees);
                            document.blend_trees.push(BlendTreeDocument {
                                id: id.clone(),
                                root: node_document(tree, tree.root()),
                            });
                            exported.push((tree, id.clone()));
                            id
                        }
                    };
                    (None, Some(id))
                }
            };
            let (timescale, timescale_parameter) = match state.time_scale() {
                TimeScale::Literal(v) => (v, None),
                TimeScale::Parameter(i) => (1.0, self.parameter_names().get(i).cloned()),
            };
            document.states.push(StateDocument {
                id: state.name().to_string(),
                clip,
                blendtree_id,
                timescale,
                timescale_parameter,
                looping: state.is_looping(),
                timescale_absolute: state.is_time_scale_absolute(),
            });
        }

        let state_name = |i: usize| self.state(i).map_or_else(String::new, |s| s.name().to_string());
        for transition in self.transitions() {
            document.transitions.push(TransitionDocument {
                from_id: transition
                    .from()
                    .map_or_else(|| ANY_STATE.to_string(), state_name),
                to_id: state_name(transition.to()),
                trigger_flag: transition
                    .trigger_flag()
                    .and_then(|f| self.flag_names().get(f).cloned()),
                duration: transition.duration(),
                from_time: transition.out_time(),
                to_time: transition.in_time(),
                wait: transition.wait_for_out_time(),
                cancellable: transition.is_cancellable(),
                in_type: transition.in_type(),
                out_type: transition.out_type(),
            });
        }

        document
    }
}

/// 同名的不同混合树依次命名为 name#1、name#2 ...
fn unique_tree_id(name: &str, trees: &[BlendTreeDocument]) -> String {
    let taken = |id: &str| trees.iter().any(|t| t.id == id);
    if !taken(name) {
        return name.to_string();
    }
    (1..)
        .map(|n| format!("{name}#{n}"))
        .find(|id| !taken(id))
        .unwrap_or_else(|| name.to_string())
}

fn node_document(tree: &AnimationBlendTree, id: NodeId) -> NodeDocument {
    let parameter = |i: usize| tree.parameter_names().get(i).cloned();
    let split = |factor: &BlendFactor| match *factor {
        BlendFactor::Literal(v) => (None, Some(v)),
        BlendFactor::Parameter(i) => (parameter(i), None),
    };

    match tree.node(id) {
        Some(BlendNode::SingleClip { clip }) => {
            NodeDocument::Clip(tree.clip_names().get(*clip).cloned().unwrap_or_default())
        }
        Some(BlendNode::Lerp {
            first,
            second,
            factor,
        }) => {
            let (parameter, factor) = split(factor);
            NodeDocument::Lerp(LerpDocument {
                first: Box::new(node_document(tree, *first)),
                second: Box::new(node_document(tree, *second)),
                parameter,
                factor,
            })
        }
        Some(BlendNode::Blend1D {
            children,
            positions,
            factor,
        }) => {
            let (parameter, factor) = split(factor);
            NodeDocument::Blend1D(Blend1DDocument {
                children: children
                    .iter()
                    .zip(positions)
                    .map(|(&child, &position)| Blend1DChild {
                        node: node_document(tree, child),
                        position,
                    })
                    .collect(),
                parameter,
                factor,
            })
        }
        Some(BlendNode::Blend2D {
            children,
            positions,
            factor,
            ..
        }) => {
            let (parameter_x, parameter_y, factor) = match *factor {
                BlendFactor2D::Literal(v) => (None, None, Some(v.to_array())),
                BlendFactor2D::Parameters { x, y } => (parameter(x), parameter(y), None),
            };
            NodeDocument::Blend2D(Blend2DDocument {
                children: children
                    .iter()
                    .zip(positions)
                    .map(|(&child, position)| Blend2DChild {
                        node: node_document(tree, child),
                        position: position.to_array(),
                    })
                    .collect(),
                parameter_x,
                parameter_y,
                factor,
            })
        }
        None => NodeDocument::Clip(String::new()),
    }
}
