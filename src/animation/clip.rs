//! 动画片段
//!
//! 每个关节一条通道，通道内的采样按时间升序存放；求值时找到前后两个采样，
//! 旋转球面插值、偏移线性插值。时间落在通道范围之外时保持最近采样的值（不外推）。

use std::sync::Arc;

use glam::{Quat, Vec3};

use crate::skeleton::{JointTransform, SkeletonDescription, SkeletonPose};
use crate::{AnimError, Result};

/// 关节采样
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipSample {
    pub time: f32,
    pub rotation: Quat,
    pub offset: Vec3,
}

impl ClipSample {
    #[inline]
    pub fn transform(&self) -> JointTransform {
        JointTransform::new(self.rotation, self.offset)
    }
}

/// 单个关节的采样通道
#[derive(Debug, Clone, Default)]
pub struct ClipChannel {
    samples: Vec<ClipSample>,
}

impl ClipChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// 插入采样，保持时间升序
    ///
    /// 从尾部向前扫描，新采样排在同一时间的旧采样之前，因此在该时间点上新采样生效
    pub fn insert(&mut self, sample: ClipSample) {
        let mut pos = self.samples.len();
        while pos > 0 && self.samples[pos - 1].time >= sample.time {
            pos -= 1;
        }
        self.samples.insert(pos, sample);
    }

    /// 查找前后采样：前一个时间 < time，后一个时间 >= time
    pub fn search_closest(&self, time: f32) -> (Option<&ClipSample>, Option<&ClipSample>) {
        let next = self.samples.partition_point(|s| s.time < time);
        let prev = next.checked_sub(1).and_then(|i| self.samples.get(i));
        (prev, self.samples.get(next))
    }

    /// 求值指定时间
    pub fn seek(&self, time: f32) -> Option<JointTransform> {
        match self.search_closest(time) {
            (Some(prev), Some(next)) => {
                let span = next.time - prev.time;
                if span <= 0.0 {
                    return Some(next.transform());
                }
                let amount = (time - prev.time) / span;
                Some(prev.transform().lerp(&next.transform(), amount))
            }
            // 只有前采样（时间超过末尾）
            (Some(prev), None) => Some(prev.transform()),
            // 只有后采样（时间早于开头）
            (None, Some(next)) => Some(next.transform()),
            (None, None) => None,
        }
    }

    #[inline]
    pub fn samples(&self) -> &[ClipSample] {
        &self.samples
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// 动画片段
#[derive(Debug, Clone)]
pub struct AnimationClip {
    name: String,
    description: Arc<SkeletonDescription>,
    channels: Vec<ClipChannel>,
    begin_time: f32,
    end_time: f32,
    sample_count: usize,
    looping: bool,
}

impl AnimationClip {
    pub fn new(name: impl Into<String>, description: Arc<SkeletonDescription>, looping: bool) -> Self {
        let channels = vec![ClipChannel::new(); description.joint_count()];
        Self {
            name: name.into(),
            description,
            channels,
            begin_time: 0.0,
            end_time: 0.0,
            sample_count: 0,
            looping,
        }
    }

    /// 添加采样，同时更新片段起止时间
    pub fn add_sample(&mut self, joint: usize, time: f32, rotation: Quat, offset: Vec3) -> Result<()> {
        let count = self.channels.len();
        let channel = self
            .channels
            .get_mut(joint)
            .ok_or(AnimError::JointOutOfRange { joint, count })?;
        channel.insert(ClipSample {
            time,
            rotation,
            offset,
        });

        if self.sample_count == 0 {
            self.begin_time = time;
            self.end_time = time;
        } else {
            self.begin_time = self.begin_time.min(time);
            self.end_time = self.end_time.max(time);
        }
        self.sample_count += 1;
        Ok(())
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn description(&self) -> &Arc<SkeletonDescription> {
        &self.description
    }

    #[inline]
    pub fn is_looping(&self) -> bool {
        self.looping
    }

    #[inline]
    pub fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }

    #[inline]
    pub fn begin_time(&self) -> f32 {
        self.begin_time
    }

    #[inline]
    pub fn end_time(&self) -> f32 {
        self.end_time
    }

    #[inline]
    pub fn duration(&self) -> f32 {
        self.end_time - self.begin_time
    }

    #[inline]
    pub fn channel(&self, joint: usize) -> Option<&ClipChannel> {
        self.channels.get(joint)
    }

    /// 循环时间折叠，负时间从末尾倒回
    pub fn loop_time(&self, time: f32) -> f32 {
        let duration = self.duration();
        if duration <= 0.0 {
            return self.begin_time;
        }
        let ratio = (time - self.begin_time) / duration;
        self.begin_time + (ratio - ratio.floor()) * duration
    }

    /// 查询时间转换为片段时间
    ///
    /// normalized 时 [0, 1] 映射到 [begin, end]，优先于循环折叠
    pub fn local_time(&self, time: f32, normalized: bool) -> f32 {
        if normalized {
            self.begin_time + time * self.duration()
        } else if self.looping {
            self.loop_time(time)
        } else {
            time
        }
    }

    /// 求值单个关节，空通道返回绑定姿态
    pub fn sample_joint(&self, joint: usize, time: f32, normalized: bool) -> Option<JointTransform> {
        let channel = self.channels.get(joint)?;
        let local = self.local_time(time, normalized);
        channel
            .seek(local)
            .or_else(|| self.description.joint(joint).map(|j| j.bind_transform()))
    }

    /// 求值整个骨骼的姿态
    pub fn get_pose(&self, time: f32, normalized: bool) -> SkeletonPose {
        let local = self.local_time(time, normalized);
        let joints = self
            .channels
            .iter()
            .zip(self.description.joints())
            .map(|(channel, info)| channel.seek(local).unwrap_or_else(|| info.bind_transform()))
            .collect();
        SkeletonPose::from_parts(Arc::clone(&self.description), joints)
    }
}
