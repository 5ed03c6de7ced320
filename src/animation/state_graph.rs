//! 动画状态图
//!
//! 状态（每个状态拥有一棵混合树）与过渡组成的有向图。图本身不含任何运行时状态，
//! build 之后只读，可被任意多个动画实例共享。
//!
//! 构建时会把各混合树的局部参数名、片段名合并成全局索引表，
//! 过渡的触发标志也在此分配全局索引。

use std::collections::HashMap;
use std::sync::Arc;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use super::blend_tree::AnimationBlendTree;
use crate::{AnimError, Result};

/// 通配源状态名，不能用作状态名
pub const ANY_STATE: &str = "any";

// ============================================================================
// 过渡定义
// ============================================================================

bitflags! {
    /// 过渡标志位
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct TransitionFlags: u32 {
        /// 等到源时间线到达 out_time 才触发
        const WAIT_FOR_OUT_TIME = 1 << 0;
        /// 过渡进行中允许被目标状态的新过渡打断
        const CANCELLABLE = 1 << 1;
    }
}

/// 过渡期间某一侧时间线的行为
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransitionType {
    /// 时间线停止
    #[default]
    Frozen,
    /// 时间线继续播放
    Animated,
}

/// 触发条件（由是否设置触发标志推导）
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransitionCondition {
    /// 按时间线触发
    EndOfClip,
    /// 按标志触发
    Trigger,
}

/// 状态时间缩放
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TimeScale {
    Literal(f32),
    /// 全局参数索引
    Parameter(usize),
}

/// 状态节点
#[derive(Clone, Debug)]
pub struct AnimationStateNode {
    name: String,
    tree: Arc<AnimationBlendTree>,
    looping: bool,
    time_scale: TimeScale,
    absolute_time_scale: bool,
}

impl AnimationStateNode {
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn tree(&self) -> &Arc<AnimationBlendTree> {
        &self.tree
    }

    #[inline]
    pub fn is_looping(&self) -> bool {
        self.looping
    }

    #[inline]
    pub fn time_scale(&self) -> TimeScale {
        self.time_scale
    }

    /// 绝对时间缩放：缩放值直接是每秒归一化时间，不除以片段时长
    #[inline]
    pub fn is_time_scale_absolute(&self) -> bool {
        self.absolute_time_scale
    }
}

/// 状态过渡
#[derive(Clone, Debug, PartialEq)]
pub struct AnimationStateTransition {
    from: Option<usize>,
    to: usize,
    duration: f32,
    in_type: TransitionType,
    out_type: TransitionType,
    out_time: f32,
    in_time: f32,
    trigger_flag: Option<usize>,
    flags: TransitionFlags,
}

impl AnimationStateTransition {
    /// 源状态，None 表示任意状态（目标状态除外）
    #[inline]
    pub fn from(&self) -> Option<usize> {
        self.from
    }

    #[inline]
    pub fn to(&self) -> usize {
        self.to
    }

    #[inline]
    pub fn duration(&self) -> f32 {
        self.duration
    }

    /// 目标一侧的时间线行为
    #[inline]
    pub fn in_type(&self) -> TransitionType {
        self.in_type
    }

    /// 源一侧的时间线行为
    #[inline]
    pub fn out_type(&self) -> TransitionType {
        self.out_type
    }

    /// 源时间线上的触发位置（归一化）
    #[inline]
    pub fn out_time(&self) -> f32 {
        self.out_time
    }

    /// 目标时间线的起始位置（归一化）
    #[inline]
    pub fn in_time(&self) -> f32 {
        self.in_time
    }

    #[inline]
    pub fn trigger_flag(&self) -> Option<usize> {
        self.trigger_flag
    }

    #[inline]
    pub fn has_trigger_flag(&self) -> bool {
        self.trigger_flag.is_some()
    }

    #[inline]
    pub fn flags(&self) -> TransitionFlags {
        self.flags
    }

    #[inline]
    pub fn wait_for_out_time(&self) -> bool {
        self.flags.contains(TransitionFlags::WAIT_FOR_OUT_TIME)
    }

    #[inline]
    pub fn is_cancellable(&self) -> bool {
        self.flags.contains(TransitionFlags::CANCELLABLE)
    }

    #[inline]
    pub fn condition(&self) -> TransitionCondition {
        if self.has_trigger_flag() {
            TransitionCondition::Trigger
        } else {
            TransitionCondition::EndOfClip
        }
    }

    /// 是否是 state 的出边
    #[inline]
    pub fn applies_from(&self, state: usize) -> bool {
        match self.from {
            Some(from) => from == state,
            None => self.to != state,
        }
    }
}

// ============================================================================
// 时间线工具
// ============================================================================

/// 推进时间线，返回 (新时间, 是否循环回绕)
///
/// 非循环状态夹在 [0, 1]
pub fn advance_timeline(timer: f32, delta: f32, looping: bool) -> (f32, bool) {
    let t = timer + delta;
    if looping {
        if (0.0..1.0).contains(&t) {
            (t, false)
        } else {
            (t - t.floor(), true)
        }
    } else {
        (t.clamp(0.0, 1.0), false)
    }
}

/// 从 current 沿播放方向到 target 的距离
///
/// 循环状态考虑回绕（正好在 target 上算一整圈）；
/// 非循环状态已经越过 target 时距离为 0，下一次更新即触发
pub fn timeline_distance(current: f32, target: f32, rate: f32, looping: bool) -> f32 {
    let d = if rate >= 0.0 {
        target - current
    } else {
        current - target
    };
    if d > 0.0 {
        d
    } else if looping {
        d + 1.0
    } else {
        0.0
    }
}

/// 本帧是否越过 target
///
/// prev 为推进前时间，advanced 为未回绕的推进后时间。区间在播放方向上半开：
/// 不含起点，包含终点
pub fn crossed_timeline(prev: f32, advanced: f32, target: f32, looping: bool) -> bool {
    let forward = advanced >= prev;
    if !looping {
        return if forward {
            advanced.min(1.0) >= target
        } else {
            advanced.max(0.0) <= target
        };
    }
    [target - 1.0, target, target + 1.0].iter().any(|&p| {
        if forward {
            prev < p && p <= advanced
        } else {
            advanced <= p && p < prev
        }
    })
}

/// 状态的待定过渡
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PendingTransition {
    None,
    /// 立即触发
    Immediate(usize),
    /// 等待时间线到达 out_time
    Wait(usize),
}

// ============================================================================
// 状态图
// ============================================================================

/// 混合树局部索引 → 全局索引
#[derive(Clone, Debug, Default)]
pub struct TreeBinding {
    pub parameters: Vec<usize>,
    pub clips: Vec<usize>,
}

/// 动画状态图（build 后只读）
#[derive(Clone, Debug)]
pub struct AnimationStateGraph {
    name: String,
    states: Vec<AnimationStateNode>,
    state_index: HashMap<String, usize>,
    transitions: Vec<AnimationStateTransition>,
    /// 每个状态的出边（包含通配过渡）
    outgoing: Vec<Vec<usize>>,
    bindings: Vec<TreeBinding>,
    parameter_names: Vec<String>,
    parameter_index: HashMap<String, usize>,
    flag_names: Vec<String>,
    flag_index: HashMap<String, usize>,
    clip_names: Vec<String>,
    clip_index: HashMap<String, usize>,
    initial_state: usize,
}

impl AnimationStateGraph {
    pub fn builder(name: impl Into<String>) -> StateGraphBuilder {
        StateGraphBuilder::new(name)
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn states(&self) -> &[AnimationStateNode] {
        &self.states
    }

    #[inline]
    pub fn state(&self, index: usize) -> Option<&AnimationStateNode> {
        self.states.get(index)
    }

    #[inline]
    pub fn find_state(&self, name: &str) -> Option<usize> {
        self.state_index.get(name).copied()
    }

    #[inline]
    pub fn transitions(&self) -> &[AnimationStateTransition] {
        &self.transitions
    }

    #[inline]
    pub fn transition(&self, index: usize) -> Option<&AnimationStateTransition> {
        self.transitions.get(index)
    }

    /// state 的出边索引
    #[inline]
    pub fn outgoing(&self, state: usize) -> &[usize] {
        self.outgoing.get(state).map(Vec::as_slice).unwrap_or(&[])
    }

    #[inline]
    pub fn binding(&self, state: usize) -> Option<&TreeBinding> {
        self.bindings.get(state)
    }

    #[inline]
    pub fn parameter_names(&self) -> &[String] {
        &self.parameter_names
    }

    #[inline]
    pub fn find_parameter(&self, name: &str) -> Option<usize> {
        self.parameter_index.get(name).copied()
    }

    #[inline]
    pub fn flag_names(&self) -> &[String] {
        &self.flag_names
    }

    #[inline]
    pub fn find_flag(&self, name: &str) -> Option<usize> {
        self.flag_index.get(name).copied()
    }

    #[inline]
    pub fn clip_names(&self) -> &[String] {
        &self.clip_names
    }

    #[inline]
    pub fn find_clip(&self, name: &str) -> Option<usize> {
        self.clip_index.get(name).copied()
    }

    #[inline]
    pub fn initial_state(&self) -> usize {
        self.initial_state
    }

    /// 选择 state 的待定过渡（不含标志触发的过渡）
    ///
    /// 不等待的过渡立即生效并优先；否则选沿播放方向最先到达 out_time 的过渡
    pub fn select_pending_transition(&self, state: usize, timer: f32, rate: f32) -> PendingTransition {
        let looping = self.states.get(state).is_some_and(|s| s.looping);
        let mut best: Option<(usize, f32)> = None;

        for &index in self.outgoing(state) {
            let transition = &self.transitions[index];
            if transition.has_trigger_flag() {
                continue;
            }
            if !transition.wait_for_out_time() {
                return PendingTransition::Immediate(index);
            }
            let distance = timeline_distance(timer, transition.out_time, rate, looping);
            if best.map_or(true, |(_, d)| distance < d) {
                best = Some((index, distance));
            }
        }

        match best {
            Some((index, _)) => PendingTransition::Wait(index),
            None => PendingTransition::None,
        }
    }

    /// 两个等待过渡中谁先到达，相同时保留 current
    pub fn sooner_transition(&self, state: usize, timer: f32, rate: f32, current: usize, candidate: usize) -> usize {
        let looping = self.states.get(state).is_some_and(|s| s.looping);
        let distance = |index: usize| {
            self.transitions
                .get(index)
                .map_or(f32::INFINITY, |t| timeline_distance(timer, t.out_time, rate, looping))
        };
        if distance(candidate) < distance(current) {
            candidate
        } else {
            current
        }
    }
}

// ============================================================================
// 构建器
// ============================================================================

/// 构建时使用的时间缩放（参数按名称引用）
#[derive(Clone, Debug, PartialEq)]
pub enum StateTimeScale {
    Literal(f32),
    Parameter(String),
}

/// 状态描述
#[derive(Clone, Debug)]
pub struct StateDesc {
    pub name: String,
    pub tree: Arc<AnimationBlendTree>,
    pub looping: bool,
    pub time_scale: StateTimeScale,
    pub absolute_time_scale: bool,
}

impl StateDesc {
    pub fn new(name: impl Into<String>, tree: Arc<AnimationBlendTree>) -> Self {
        Self {
            name: name.into(),
            tree,
            looping: false,
            time_scale: StateTimeScale::Literal(1.0),
            absolute_time_scale: false,
        }
    }

    pub fn looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    pub fn time_scale(mut self, scale: f32) -> Self {
        self.time_scale = StateTimeScale::Literal(scale);
        self
    }

    pub fn time_scale_parameter(mut self, name: impl Into<String>) -> Self {
        self.time_scale = StateTimeScale::Parameter(name.into());
        self
    }

    pub fn absolute_time_scale(mut self, absolute: bool) -> Self {
        self.absolute_time_scale = absolute;
        self
    }
}

/// 过渡描述
#[derive(Clone, Debug, PartialEq)]
pub struct TransitionDesc {
    /// None 表示任意状态
    pub from: Option<String>,
    pub to: String,
    pub duration: f32,
    pub in_type: TransitionType,
    pub out_type: TransitionType,
    pub from_time: f32,
    pub to_time: f32,
    pub trigger_flag: Option<String>,
    pub wait: bool,
    pub cancellable: bool,
}

impl TransitionDesc {
    pub fn new(from: Option<&str>, to: impl Into<String>) -> Self {
        Self {
            from: from.map(str::to_string),
            to: to.into(),
            duration: 0.0,
            in_type: TransitionType::Frozen,
            out_type: TransitionType::Frozen,
            from_time: 1.0,
            to_time: 0.0,
            trigger_flag: None,
            wait: false,
            cancellable: false,
        }
    }

    pub fn duration(mut self, duration: f32) -> Self {
        self.duration = duration;
        self
    }

    pub fn trigger(mut self, flag: impl Into<String>) -> Self {
        self.trigger_flag = Some(flag.into());
        self
    }

    /// 等待源时间线到达 from_time
    pub fn wait_until(mut self, from_time: f32) -> Self {
        self.wait = true;
        self.from_time = from_time;
        self
    }

    pub fn to_time(mut self, to_time: f32) -> Self {
        self.to_time = to_time;
        self
    }

    pub fn types(mut self, out_type: TransitionType, in_type: TransitionType) -> Self {
        self.out_type = out_type;
        self.in_type = in_type;
        self
    }

    pub fn cancellable(mut self, cancellable: bool) -> Self {
        self.cancellable = cancellable;
        self
    }
}

/// 状态图构建器
#[derive(Clone, Debug)]
pub struct StateGraphBuilder {
    name: String,
    states: Vec<StateDesc>,
    state_index: HashMap<String, usize>,
    transitions: Vec<TransitionDesc>,
    initial_state: Option<usize>,
}

impl StateGraphBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            states: Vec::new(),
            state_index: HashMap::new(),
            transitions: Vec::new(),
            initial_state: None,
        }
    }

    pub fn add_state(&mut self, desc: StateDesc) -> Result<usize> {
        if desc.name == ANY_STATE {
            return Err(AnimError::ReservedStateName(desc.name));
        }
        if self.state_index.contains_key(&desc.name) {
            return Err(AnimError::DuplicateState(desc.name));
        }
        let index = self.states.len();
        self.state_index.insert(desc.name.clone(), index);
        self.states.push(desc);
        Ok(index)
    }

    pub fn add_transition(&mut self, desc: TransitionDesc) -> Result<usize> {
        if let Some(from) = &desc.from {
            if !self.state_index.contains_key(from) {
                return Err(AnimError::UnknownState(from.clone()));
            }
        }
        if !self.state_index.contains_key(&desc.to) {
            return Err(AnimError::UnknownState(desc.to.clone()));
        }
        self.transitions.push(desc);
        Ok(self.transitions.len() - 1)
    }

    pub fn set_initial_state(&mut self, name: &str) -> Result<()> {
        let index = self
            .state_index
            .get(name)
            .copied()
            .ok_or_else(|| AnimError::UnknownState(name.to_string()))?;
        self.initial_state = Some(index);
        Ok(())
    }

    /// finalize：建立全局参数、标志、片段索引表与出边表
    pub fn build(self) -> Result<AnimationStateGraph> {
        if self.states.is_empty() {
            return Err(AnimError::EmptyGraph(self.name));
        }

        let mut parameters = NameTable::default();
        let mut flags = NameTable::default();
        let mut clips = NameTable::default();
        let mut states = Vec::with_capacity(self.states.len());
        let mut bindings = Vec::with_capacity(self.states.len());

        for desc in self.states {
            let binding = TreeBinding {
                parameters: desc
                    .tree
                    .parameter_names()
                    .iter()
                    .map(|n| parameters.intern(n))
                    .collect(),
                clips: desc.tree.clip_names().iter().map(|n| clips.intern(n)).collect(),
            };
            let time_scale = match &desc.time_scale {
                StateTimeScale::Literal(v) => TimeScale::Literal(*v),
                StateTimeScale::Parameter(name) => TimeScale::Parameter(parameters.intern(name)),
            };
            bindings.push(binding);
            states.push(AnimationStateNode {
                name: desc.name,
                tree: desc.tree,
                looping: desc.looping,
                time_scale,
                absolute_time_scale: desc.absolute_time_scale,
            });
        }

        let transitions: Vec<AnimationStateTransition> = self
            .transitions
            .into_iter()
            .map(|desc| {
                let mut flag_bits = TransitionFlags::empty();
                flag_bits.set(TransitionFlags::WAIT_FOR_OUT_TIME, desc.wait);
                flag_bits.set(TransitionFlags::CANCELLABLE, desc.cancellable);
                AnimationStateTransition {
                    from: desc.from.as_ref().map(|n| self.state_index[n]),
                    to: self.state_index[&desc.to],
                    duration: desc.duration.max(0.0),
                    in_type: desc.in_type,
                    out_type: desc.out_type,
                    out_time: desc.from_time,
                    in_time: desc.to_time,
                    trigger_flag: desc.trigger_flag.as_deref().map(|n| flags.intern(n)),
                    flags: flag_bits,
                }
            })
            .collect();

        let outgoing = (0..states.len())
            .map(|state| {
                transitions
                    .iter()
                    .enumerate()
                    .filter(|(_, t)| t.applies_from(state))
                    .map(|(i, _)| i)
                    .collect()
            })
            .collect();

        Ok(AnimationStateGraph {
            name: self.name,
            states,
            state_index: self.state_index,
            transitions,
            outgoing,
            bindings,
            parameter_names: parameters.names,
            parameter_index: parameters.index,
            flag_names: flags.names,
            flag_index: flags.index,
            clip_names: clips.names,
            clip_index: clips.index,
            initial_state: self.initial_state.unwrap_or(0),
        })
    }
}

/// 名称 → 稳定索引
#[derive(Default)]
struct NameTable {
    names: Vec<String>,
    index: HashMap<String, usize>,
}

impl NameTable {
    fn intern(&mut self, name: &str) -> usize {
        if let Some(&i) = self.index.get(name) {
            return i;
        }
        let i = self.names.len();
        self.names.push(name.to_string());
        self.index.insert(name.to_string(), i);
        i
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::blend_tree::Factor;

    fn clip_state(name: &str) -> StateDesc {
        StateDesc::new(name, Arc::new(AnimationBlendTree::single_clip(name, name))).looping(true)
    }

    fn graph() -> AnimationStateGraph {
        let mut builder = AnimationStateGraph::builder("test");
        builder.add_state(clip_state("idle")).unwrap();

        let mut tree = AnimationBlendTree::builder("move");
        let walk = tree.clip("walk");
        let run = tree.clip("run");
        let root = tree
            .lerp(walk, run, Factor::Parameter("speed".to_string()))
            .unwrap();
        builder
            .add_state(
                StateDesc::new("move", Arc::new(tree.build(root).unwrap()))
                    .looping(true)
                    .time_scale_parameter("pace"),
            )
            .unwrap();
        builder.add_state(clip_state("fall")).unwrap();

        builder
            .add_transition(TransitionDesc::new(Some("idle"), "move").trigger("go"))
            .unwrap();
        builder
            .add_transition(TransitionDesc::new(Some("move"), "idle").wait_until(0.3))
            .unwrap();
        builder
            .add_transition(TransitionDesc::new(Some("move"), "fall").wait_until(0.7))
            .unwrap();
        builder
            .add_transition(TransitionDesc::new(None, "fall").trigger("trip"))
            .unwrap();
        builder.set_initial_state("move").unwrap();
        builder.build().unwrap()
    }

    #[test]
    fn test_global_tables() {
        let g = graph();
        assert_eq!(g.parameter_names(), &["speed".to_string(), "pace".to_string()]);
        assert_eq!(g.flag_names(), &["go".to_string(), "trip".to_string()]);
        assert_eq!(g.clip_names().len(), 4);
        assert_eq!(g.find_clip("run"), Some(2));
        assert_eq!(g.binding(1).unwrap().clips, vec![1, 2]);
        assert_eq!(g.initial_state(), 1);
        assert_eq!(g.state(1).unwrap().time_scale(), TimeScale::Parameter(1));
    }

    #[test]
    fn test_wildcard_transitions() {
        let g = graph();
        // 通配过渡出现在除目标外的所有状态
        assert_eq!(g.outgoing(0), &[0, 3]);
        assert_eq!(g.outgoing(1), &[1, 2, 3]);
        assert_eq!(g.outgoing(2), &[] as &[usize]);
        assert_eq!(g.transition(3).unwrap().condition(), TransitionCondition::Trigger);
        assert_eq!(g.transition(1).unwrap().condition(), TransitionCondition::EndOfClip);
    }

    #[test]
    fn test_initial_state_defaults_to_first() {
        let mut builder = AnimationStateGraph::builder("plain");
        builder.add_state(clip_state("a")).unwrap();
        builder.add_state(clip_state("b")).unwrap();
        assert_eq!(builder.build().unwrap().initial_state(), 0);
    }

    #[test]
    fn test_builder_errors() {
        let mut builder = AnimationStateGraph::builder("bad");
        assert!(matches!(
            builder.clone().build(),
            Err(AnimError::EmptyGraph(_))
        ));
        builder.add_state(clip_state("a")).unwrap();
        assert!(matches!(
            builder.add_state(clip_state("a")),
            Err(AnimError::DuplicateState(_))
        ));
        assert!(matches!(
            builder.add_transition(TransitionDesc::new(Some("a"), "nowhere")),
            Err(AnimError::UnknownState(_))
        ));
    }

    #[test]
    fn test_wildcard_name_is_reserved() {
        let mut builder = AnimationStateGraph::builder("reserved");
        assert!(matches!(
            builder.add_state(clip_state(ANY_STATE)),
            Err(AnimError::ReservedStateName(_))
        ));
        builder.add_state(clip_state("b")).unwrap();
        assert!(matches!(
            builder.add_transition(TransitionDesc::new(Some(ANY_STATE), "b")),
            Err(AnimError::UnknownState(_))
        ));
    }

    #[test]
    fn test_soonest_out_time_with_wraparound() {
        let g = graph();
        let move_state = 1;
        assert_eq!(g.select_pending_transition(move_state, 0.0, 1.0), PendingTransition::Wait(1));
        assert_eq!(g.select_pending_transition(move_state, 0.5, 1.0), PendingTransition::Wait(2));
        // 0.3 已经过去，但回绕后比 0.7 更近
        assert_eq!(g.select_pending_transition(move_state, 0.8, 1.0), PendingTransition::Wait(1));
        // 反向播放
        assert_eq!(g.select_pending_transition(move_state, 0.5, -1.0), PendingTransition::Wait(1));
        assert_eq!(g.sooner_transition(move_state, 0.5, 1.0, 1, 2), 2);
    }

    #[test]
    fn test_immediate_transition_wins() {
        let mut builder = AnimationStateGraph::builder("instant");
        builder.add_state(clip_state("a")).unwrap();
        builder.add_state(clip_state("b")).unwrap();
        builder.add_state(clip_state("c")).unwrap();
        builder
            .add_transition(TransitionDesc::new(Some("a"), "b").wait_until(0.1))
            .unwrap();
        builder.add_transition(TransitionDesc::new(Some("a"), "c")).unwrap();
        let g = builder.build().unwrap();
        assert_eq!(g.select_pending_transition(0, 0.0, 1.0), PendingTransition::Immediate(1));
    }

    #[test]
    fn test_timeline_helpers() {
        assert_eq!(advance_timeline(0.9, 0.2, true).1, true);
        assert!((advance_timeline(0.9, 0.2, true).0 - 0.1).abs() < 1e-6);
        assert!((advance_timeline(0.1, -0.2, true).0 - 0.9).abs() < 1e-6);
        assert_eq!(advance_timeline(0.9, 0.2, false), (1.0, false));

        assert!(crossed_timeline(0.2, 0.35, 0.3, true));
        assert!(!crossed_timeline(0.3, 0.4, 0.3, true));
        // 回绕：0.95 → 1.05 越过 0.0 / 1.0
        assert!(crossed_timeline(0.95, 1.05, 0.0, true));
        assert!(crossed_timeline(0.95, 1.05, 1.0, true));
        assert!(crossed_timeline(0.05, -0.05, 0.0, true));
        assert!(crossed_timeline(0.05, -0.05, 0.98, true));
        // 非循环在末尾保持
        assert!(crossed_timeline(1.0, 1.0, 1.0, false));
        assert!(!crossed_timeline(0.2, 0.25, 0.3, false));

        assert_eq!(timeline_distance(0.3, 0.3, 1.0, true), 1.0);
        assert_eq!(timeline_distance(0.5, 0.3, 1.0, false), 0.0);
    }
}
