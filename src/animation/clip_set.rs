//! 片段集
//!
//! 把状态图的全局片段索引解析为某个骨骼描述下的具体片段。
//! 同一 (骨骼描述, 状态图) 组合只解析一次，由 AnimationSystem 缓存共享。

use std::sync::Arc;

use super::blend_tree::BlendContext;
use super::clip::AnimationClip;
use super::state_graph::AnimationStateGraph;
use crate::skeleton::SkeletonDescription;

/// 全局片段索引 → 片段
#[derive(Debug)]
pub struct ClipSet {
    description: Arc<SkeletonDescription>,
    graph: Arc<AnimationStateGraph>,
    clips: Vec<Option<Arc<AnimationClip>>>,
}

impl ClipSet {
    /// 从片段库中按名称与骨骼描述匹配，后注册的片段优先
    ///
    /// 找不到的片段保留为 None，求值时不贡献权重
    pub fn resolve(
        description: Arc<SkeletonDescription>,
        graph: Arc<AnimationStateGraph>,
        library: &[Arc<AnimationClip>],
    ) -> Self {
        let clips: Vec<Option<Arc<AnimationClip>>> = graph
            .clip_names()
            .iter()
            .map(|name| {
                library
                    .iter()
                    .rev()
                    .find(|c| c.name() == name && Arc::ptr_eq(c.description(), &description))
                    .cloned()
            })
            .collect();

        let missing = clips.iter().filter(|c| c.is_none()).count();
        if missing > 0 {
            log::debug!(
                "[AnimSystem] 片段集 '{}' / '{}': {} 个片段缺失",
                description.name(),
                graph.name(),
                missing
            );
        }

        Self {
            description,
            graph,
            clips,
        }
    }

    #[inline]
    pub fn description(&self) -> &Arc<SkeletonDescription> {
        &self.description
    }

    #[inline]
    pub fn graph(&self) -> &Arc<AnimationStateGraph> {
        &self.graph
    }

    #[inline]
    pub fn clips(&self) -> &[Option<Arc<AnimationClip>>] {
        &self.clips
    }

    #[inline]
    pub fn clip(&self, index: usize) -> Option<&Arc<AnimationClip>> {
        self.clips.get(index)?.as_ref()
    }

    /// 状态 state 的混合树求值上下文
    pub fn context<'a>(&'a self, state: usize, parameters: &'a [f32]) -> BlendContext<'a> {
        let binding = self.graph.binding(state);
        BlendContext {
            parameters,
            parameter_map: Some(binding.map_or(&[][..], |b| b.parameters.as_slice())),
            clip_map: Some(binding.map_or(&[][..], |b| b.clips.as_slice())),
            clips: &self.clips,
        }
    }
}
