//! 动画系统
//!
//! 批量驱动动画实例。每帧调用顺序固定：
//! 1. process_state_updates(dt)：参数 → 标志 → 计时器 → 过渡
//! 2. apply_poses_to_skeletons()：求姿态并写入骨骼，计算蒙皮矩阵
//!
//! 两步之间可以插入其他系统（例如物理同步）。

use std::collections::{HashMap, VecDeque};
use std::mem;
use std::sync::Arc;

use rayon::prelude::*;

use super::clip::AnimationClip;
use super::clip_set::ClipSet;
use super::state_graph::{
    advance_timeline, crossed_timeline, AnimationStateGraph, PendingTransition, TimeScale,
    TransitionType,
};
use crate::config::get_config;
use crate::skeleton::{Skeleton, SkeletonPose};
use crate::{AnimError, Result};

/// 片段时长小于此值时按绝对时间缩放处理
const MIN_CLIP_DURATION: f32 = 1e-6;

// ============================================================================
// 实例 ID
// ============================================================================

/// 动画实例 ID
///
/// 槽位索引 + 代数，槽位复用后旧 ID 失效
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct InstanceId {
    index: u32,
    generation: u32,
}

impl InstanceId {
    #[inline]
    pub fn index(&self) -> u32 {
        self.index
    }

    #[inline]
    pub fn generation(&self) -> u32 {
        self.generation
    }
}

// ============================================================================
// 实例状态
// ============================================================================

/// 单个实例的运行时状态
#[derive(Debug)]
struct AnimationInstance {
    skeleton: Skeleton,
    clip_set: Arc<ClipSet>,

    /// 已生效的参数值（按全局参数索引）
    parameters: Vec<f32>,
    pending_parameters: Vec<(usize, f32)>,
    pending_flags: Vec<usize>,

    current_state: usize,
    /// 归一化状态时间
    state_timer: f32,
    /// 每秒归一化时间增量
    state_rate: f32,
    did_loop: bool,

    current_transition: Option<usize>,
    transition_timer: f32,
    next_timer: f32,
    next_rate: f32,
    /// 已预备、等待时间线到达的过渡
    next_transition: Option<usize>,
    /// 本帧要触发的过渡
    update_transition: Option<usize>,
    /// 从被打断的过渡或任意状态出发时的姿态快照
    cached_pose: Option<SkeletonPose>,
}

impl AnimationInstance {
    fn new(skeleton: Skeleton, clip_set: Arc<ClipSet>) -> Self {
        let graph = Arc::clone(clip_set.graph());
        let mut instance = Self {
            skeleton,
            parameters: vec![0.0; graph.parameter_names().len()],
            clip_set,
            pending_parameters: Vec::new(),
            pending_flags: Vec::new(),
            current_state: graph.initial_state(),
            state_timer: 0.0,
            state_rate: 0.0,
            did_loop: false,
            current_transition: None,
            transition_timer: 0.0,
            next_timer: 0.0,
            next_rate: 0.0,
            next_transition: None,
            update_transition: None,
            cached_pose: None,
        };
        instance.state_rate = instance.rate_of(instance.current_state);
        instance.arm_pending_transition();
        instance
    }

    #[inline]
    fn graph(&self) -> &AnimationStateGraph {
        self.clip_set.graph()
    }

    /// 状态时间线的推进速率（每秒归一化时间）
    fn rate_of(&self, state: usize) -> f32 {
        let Some(node) = self.graph().state(state) else {
            return 0.0;
        };
        let scale = match node.time_scale() {
            TimeScale::Literal(v) => v,
            TimeScale::Parameter(i) => self.parameters.get(i).copied().unwrap_or(0.0),
        };
        if node.is_time_scale_absolute() {
            return scale;
        }
        let ctx = self.clip_set.context(state, &self.parameters);
        let duration = node.tree().weighted_duration(&ctx);
        if duration > MIN_CLIP_DURATION {
            scale / duration
        } else {
            scale
        }
    }

    /// 为当前状态预备下一个按时间触发的过渡
    ///
    /// 已由标志预备且仍然有效的过渡参与比较
    fn arm_pending_transition(&mut self) {
        let state = self.current_state;
        let armed = self
            .next_transition
            .filter(|&t| self.graph().transition(t).is_some_and(|tr| tr.applies_from(state)));

        match self
            .graph()
            .select_pending_transition(state, self.state_timer, self.state_rate)
        {
            PendingTransition::Immediate(t) => {
                if self.update_transition.is_none() {
                    self.update_transition = Some(t);
                }
                self.next_transition = None;
            }
            PendingTransition::Wait(t) => {
                self.next_transition = Some(match armed {
                    Some(current) => self.graph().sooner_transition(
                        state,
                        self.state_timer,
                        self.state_rate,
                        current,
                        t,
                    ),
                    None => t,
                });
            }
            PendingTransition::None => self.next_transition = armed,
        }
    }

    // ========== 每帧管线 ==========

    fn update_parameters(&mut self) {
        if self.pending_parameters.is_empty() {
            return;
        }
        for (index, value) in self.pending_parameters.drain(..) {
            if let Some(slot) = self.parameters.get_mut(index) {
                *slot = value;
            }
        }
        // 参数可能影响时间缩放或片段混合时长
        let previous_rate = self.state_rate;
        self.state_rate = self.rate_of(self.current_state);
        // 播放方向改变后重新选择最先到达的过渡
        if self.current_transition.is_none() && (previous_rate < 0.0) != (self.state_rate < 0.0) {
            self.arm_pending_transition();
        }
        if let Some(to) = self
            .current_transition
            .and_then(|t| self.graph().transition(t))
            .map(|tr| tr.to())
        {
            self.next_rate = self.rate_of(to);
        }
    }

    fn process_flag_triggers(&mut self) {
        if self.pending_flags.is_empty() {
            return;
        }
        let flags = mem::take(&mut self.pending_flags);
        if self.update_transition.is_some() {
            return;
        }

        let (source, timer, rate) = match self.current_transition {
            None => (self.current_state, self.state_timer, self.state_rate),
            Some(t) => match self.graph().transition(t) {
                Some(tr) if tr.is_cancellable() => (tr.to(), self.next_timer, self.next_rate),
                _ => return,
            },
        };

        let graph = Arc::clone(self.clip_set.graph());
        for flag in flags {
            for &index in graph.outgoing(source) {
                let transition = &graph.transitions()[index];
                if transition.trigger_flag() != Some(flag) {
                    continue;
                }
                if transition.wait_for_out_time() {
                    self.next_transition = Some(match self.next_transition {
                        Some(current) => graph.sooner_transition(source, timer, rate, current, index),
                        None => index,
                    });
                } else {
                    self.update_transition = Some(index);
                    return;
                }
            }
        }
    }

    fn update_state_timers(&mut self, dt: f32) {
        self.did_loop = false;

        if let Some(t) = self.current_transition {
            let Some(transition) = self.graph().transition(t).cloned() else {
                self.current_transition = None;
                return;
            };
            self.transition_timer += dt;

            if self.transition_timer >= transition.duration() {
                self.current_state = transition.to();
                self.state_timer = self.next_timer;
                self.state_rate = self.next_rate;
                self.current_transition = None;
                self.transition_timer = 0.0;
                self.cached_pose = None;
                self.arm_pending_transition();
                if get_config().debug_log {
                    log::debug!(
                        "[AnimSystem] 过渡完成，进入状态 '{}'",
                        self.graph().state(self.current_state).map_or("", |s| s.name())
                    );
                }
            } else {
                if transition.out_type() == TransitionType::Animated && self.cached_pose.is_none() {
                    let looping = self.is_looping(self.current_state);
                    self.state_timer =
                        advance_timeline(self.state_timer, self.state_rate * dt, looping).0;
                }
                if transition.in_type() == TransitionType::Animated {
                    let looping = self.is_looping(transition.to());
                    let prev = self.next_timer;
                    let delta = self.next_rate * dt;
                    self.next_timer = advance_timeline(prev, delta, looping).0;
                    self.check_crossing(prev, prev + delta, looping);
                }
                return;
            }
        }

        let looping = self.is_looping(self.current_state);
        let prev = self.state_timer;
        let delta = self.state_rate * dt;
        let (timer, looped) = advance_timeline(prev, delta, looping);
        self.state_timer = timer;
        self.did_loop = looped;
        self.check_crossing(prev, prev + delta, looping);
    }

    fn check_crossing(&mut self, prev: f32, advanced: f32, looping: bool) {
        if self.update_transition.is_some() {
            return;
        }
        let Some(next) = self.next_transition else {
            return;
        };
        let Some(out_time) = self.graph().transition(next).map(|t| t.out_time()) else {
            return;
        };
        if crossed_timeline(prev, advanced, out_time, looping) {
            self.update_transition = Some(next);
        }
    }

    fn update_transitions(&mut self) -> Result<()> {
        let Some(t) = self.update_transition.take() else {
            return Ok(());
        };
        let Some(transition) = self.graph().transition(t).cloned() else {
            return Ok(());
        };

        let snapshot = self.current_transition.is_some()
            || transition.from() != Some(self.current_state);
        self.cached_pose = if snapshot {
            Some(self.evaluate_pose()?)
        } else {
            None
        };

        // 打断进行中的过渡：原目标成为新的源状态
        if let Some(previous_to) = self
            .current_transition
            .and_then(|p| self.graph().transition(p))
            .map(|tr| tr.to())
        {
            self.current_state = previous_to;
            self.state_timer = self.next_timer;
            self.state_rate = self.next_rate;
        }

        self.current_transition = Some(t);
        self.transition_timer = 0.0;
        self.next_timer = transition.in_time();
        self.next_rate = self.rate_of(transition.to());
        self.next_transition = None;

        if get_config().debug_log {
            log::debug!(
                "[AnimSystem] 开始过渡 {} -> {} (时长 {:.3}s, 快照 {})",
                self.graph().state(self.current_state).map_or("", |s| s.name()),
                self.graph().state(transition.to()).map_or("", |s| s.name()),
                transition.duration(),
                snapshot
            );
        }
        Ok(())
    }

    #[inline]
    fn is_looping(&self, state: usize) -> bool {
        self.graph().state(state).is_some_and(|s| s.is_looping())
    }

    // ========== 姿态 ==========

    fn state_pose(&self, state: usize, timer: f32) -> Result<SkeletonPose> {
        let description = self.skeleton.description();
        match self.graph().state(state) {
            Some(node) => {
                let ctx = self.clip_set.context(state, &self.parameters);
                node.tree().evaluate(&ctx, timer, description)
            }
            None => Ok(SkeletonPose::bind(description)),
        }
    }

    /// 当前混合姿态
    fn evaluate_pose(&self) -> Result<SkeletonPose> {
        let Some(transition) = self
            .current_transition
            .and_then(|t| self.graph().transition(t))
        else {
            return self.state_pose(self.current_state, self.state_timer);
        };

        let from = match &self.cached_pose {
            Some(pose) => pose.clone(),
            None => self.state_pose(self.current_state, self.state_timer)?,
        };
        let to = self.state_pose(transition.to(), self.next_timer)?;
        let weight = if transition.duration() > 0.0 {
            (self.transition_timer / transition.duration()).clamp(0.0, 1.0)
        } else {
            1.0
        };
        from.lerp(&to, weight)
    }

    fn apply_pose(&mut self) -> Result<()> {
        self.skeleton.copy_last_skinning_matrices();
        let pose = self.evaluate_pose()?;
        self.skeleton.set_pose(&pose)?;
        self.skeleton.apply_current_pose();
        self.skeleton.compute_skinning_matrices();
        Ok(())
    }
}

// ============================================================================
// 动画系统
// ============================================================================

#[derive(Debug, Default)]
struct Slot {
    generation: u32,
    instance: Option<AnimationInstance>,
}

/// 动画系统
#[derive(Debug, Default)]
pub struct AnimationSystem {
    slots: Vec<Slot>,
    free_slots: VecDeque<u32>,
    clips: Vec<Arc<AnimationClip>>,
    clip_sets: HashMap<(usize, usize), Arc<ClipSet>>,
}

impl AnimationSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册片段
    ///
    /// 已缓存的片段集失效，之后创建的实例使用新的片段库
    pub fn add_clip(&mut self, clip: Arc<AnimationClip>) {
        log::debug!("[AnimSystem] 注册片段 '{}'", clip.name());
        self.clips.push(clip);
        self.clip_sets.clear();
    }

    #[inline]
    pub fn clips(&self) -> &[Arc<AnimationClip>] {
        &self.clips
    }

    /// 缓存的片段集数量
    #[inline]
    pub fn clip_set_count(&self) -> usize {
        self.clip_sets.len()
    }

    /// 存活实例数
    pub fn instance_count(&self) -> usize {
        self.slots.iter().filter(|s| s.instance.is_some()).count()
    }

    /// 获取 (骨骼描述, 状态图) 对应的片段集，首次使用时解析
    pub fn clip_set(
        &mut self,
        skeleton: &Skeleton,
        graph: &Arc<AnimationStateGraph>,
    ) -> Arc<ClipSet> {
        let description = skeleton.description();
        let key = (
            Arc::as_ptr(description) as usize,
            Arc::as_ptr(graph) as usize,
        );
        let clips = &self.clips;
        Arc::clone(self.clip_sets.entry(key).or_insert_with(|| {
            Arc::new(ClipSet::resolve(
                Arc::clone(description),
                Arc::clone(graph),
                clips,
            ))
        }))
    }

    // ========== 实例生命周期 ==========

    pub fn create_instance(
        &mut self,
        graph: &Arc<AnimationStateGraph>,
        skeleton: Skeleton,
    ) -> InstanceId {
        let clip_set = self.clip_set(&skeleton, graph);
        let instance = AnimationInstance::new(skeleton, clip_set);

        let index = match self.free_slots.pop_front() {
            Some(index) => index,
            None => {
                self.slots.push(Slot::default());
                (self.slots.len() - 1) as u32
            }
        };
        let slot = &mut self.slots[index as usize];
        slot.instance = Some(instance);

        log::debug!(
            "[AnimSystem] 创建实例 {} (状态图 '{}')",
            index,
            graph.name()
        );
        InstanceId {
            index,
            generation: slot.generation,
        }
    }

    /// 销毁实例并交还骨骼
    pub fn destroy_instance(&mut self, id: InstanceId) -> Result<Skeleton> {
        let slot = self
            .slots
            .get_mut(id.index as usize)
            .filter(|s| s.generation == id.generation && s.instance.is_some())
            .ok_or(AnimError::InvalidInstance(id))?;
        let instance = slot.instance.take().ok_or(AnimError::InvalidInstance(id))?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free_slots.push_back(id.index);

        let AnimationInstance {
            skeleton, clip_set, ..
        } = instance;
        drop(clip_set);
        // 释放不再被任何实例使用的片段集（及其持有的状态图与骨骼描述）
        self.clip_sets.retain(|_, set| Arc::strong_count(set) > 1);

        log::debug!("[AnimSystem] 销毁实例 {}", id.index);
        Ok(skeleton)
    }

    pub fn is_alive(&self, id: InstanceId) -> bool {
        self.instance(id).is_ok()
    }

    fn instance(&self, id: InstanceId) -> Result<&AnimationInstance> {
        self.slots
            .get(id.index as usize)
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.instance.as_ref())
            .ok_or(AnimError::InvalidInstance(id))
    }

    fn instance_mut(&mut self, id: InstanceId) -> Result<&mut AnimationInstance> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.instance.as_mut())
            .ok_or(AnimError::InvalidInstance(id))
    }

    // ========== 输入 ==========

    /// 设置一次性触发标志，下一次 process_state_updates 时消耗
    ///
    /// 状态图中不存在的标志名被忽略
    pub fn set_flag(&mut self, id: InstanceId, flag: &str) -> Result<()> {
        let instance = self.instance_mut(id)?;
        match instance.graph().find_flag(flag) {
            Some(index) => instance.pending_flags.push(index),
            None => log::debug!("[AnimSystem] 实例 {} 忽略未知标志 '{}'", id.index, flag),
        }
        Ok(())
    }

    /// 设置混合参数，下一次 process_state_updates 时生效
    ///
    /// 状态图中不存在的参数名被忽略
    pub fn set_blend_parameter(&mut self, id: InstanceId, name: &str, value: f32) -> Result<()> {
        let instance = self.instance_mut(id)?;
        match instance.graph().find_parameter(name) {
            Some(index) => instance.pending_parameters.push((index, value)),
            None => log::debug!("[AnimSystem] 实例 {} 忽略未知参数 '{}'", id.index, name),
        }
        Ok(())
    }

    // ========== 观察 ==========

    /// 已生效的参数值，未知参数为 None
    pub fn get_blend_parameter(&self, id: InstanceId, name: &str) -> Result<Option<f32>> {
        let instance = self.instance(id)?;
        Ok(instance
            .graph()
            .find_parameter(name)
            .and_then(|i| instance.parameters.get(i).copied()))
    }

    /// 当前状态（过渡期间为源状态）
    pub fn current_state(&self, id: InstanceId) -> Result<usize> {
        Ok(self.instance(id)?.current_state)
    }

    pub fn current_state_name(&self, id: InstanceId) -> Result<&str> {
        let instance = self.instance(id)?;
        Ok(instance
            .graph()
            .state(instance.current_state)
            .map_or("", |s| s.name()))
    }

    /// 进行中的过渡索引
    pub fn current_transition(&self, id: InstanceId) -> Result<Option<usize>> {
        Ok(self.instance(id)?.current_transition)
    }

    /// 当前状态的归一化时间
    pub fn state_time(&self, id: InstanceId) -> Result<f32> {
        Ok(self.instance(id)?.state_timer)
    }

    /// 上一帧是否发生循环回绕
    pub fn did_loop(&self, id: InstanceId) -> Result<bool> {
        Ok(self.instance(id)?.did_loop)
    }

    pub fn skeleton(&self, id: InstanceId) -> Result<&Skeleton> {
        Ok(&self.instance(id)?.skeleton)
    }

    pub fn skeleton_mut(&mut self, id: InstanceId) -> Result<&mut Skeleton> {
        Ok(&mut self.instance_mut(id)?.skeleton)
    }

    // ========== 每帧驱动 ==========

    /// 推进所有实例的状态机
    pub fn process_state_updates(&mut self, dt: f32) -> Result<()> {
        for instance in self.live_instances() {
            instance.update_parameters();
        }
        for instance in self.live_instances() {
            instance.process_flag_triggers();
        }
        for instance in self.live_instances() {
            instance.update_state_timers(dt);
        }
        // 单个实例失败不影响其他实例，返回第一个错误
        let mut first_error = None;
        for instance in self.live_instances() {
            if let Err(e) = instance.update_transitions() {
                log::warn!("[AnimSystem] 过渡提交失败: {}", e);
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    fn live_instances(&mut self) -> impl Iterator<Item = &mut AnimationInstance> {
        self.slots.iter_mut().filter_map(|s| s.instance.as_mut())
    }

    /// 求姿态并写入骨骼
    pub fn apply_poses_to_skeletons(&mut self) -> Result<()> {
        let config = get_config();
        let live = self.instance_count();

        let first_error = if config.parallel_pose_evaluation && live >= config.parallel_min_instances {
            self.slots
                .par_iter_mut()
                .filter_map(|s| s.instance.as_mut())
                .filter_map(|instance| instance.apply_pose().err())
                .collect::<Vec<AnimError>>()
                .into_iter()
                .next()
        } else {
            self.live_instances()
                .filter_map(|instance| instance.apply_pose().err())
                .fold(None, |first, e| first.or(Some(e)))
        };
        first_error.map_or(Ok(()), Err)
    }
}
