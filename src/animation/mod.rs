//! 动画模块
//!
//! - clip: 关节采样片段
//! - blend_node / blend_tree: 混合树（单片段、线性、一维、二维）
//! - state_graph: 状态与过渡组成的状态机拓扑
//! - system: 批量驱动实例的动画系统
//! - document: JSON 文档的加载与导出

mod blend_node;
mod blend_tree;
mod clip;
mod clip_set;
mod delaunay;
mod document;
mod state_graph;
mod system;

pub use blend_node::{
    blend_1d_weights, blend_2d_weights, BlendFactor, BlendFactor2D, BlendNode, NodeId,
};
pub use blend_tree::{
    blend_clips, AnimationBlendTree, BlendContext, BlendTreeBuilder, Factor, Factor2D,
    WeightedClip,
};
pub use clip::{AnimationClip, ClipChannel, ClipSample};
pub use clip_set::ClipSet;
pub use delaunay::triangulate;
pub use document::{
    load_graph_from_file, load_graph_from_str, Blend1DChild, Blend1DDocument, Blend2DChild,
    Blend2DDocument, BlendTreeDocument, GraphDocument, LerpDocument, NodeDocument, StateDocument,
    TransitionDocument,
};
pub use state_graph::{
    advance_timeline, crossed_timeline, timeline_distance, AnimationStateGraph,
    AnimationStateNode, AnimationStateTransition, PendingTransition, StateDesc,
    StateGraphBuilder, StateTimeScale, TimeScale, TransitionCondition, TransitionDesc,
    TransitionFlags, TransitionType, TreeBinding, ANY_STATE,
};
pub use system::{AnimationSystem, InstanceId};
