//! 检测评估 - 判断线检测事件中是否出现关注的目标
//!
//! 纯函数，不依赖网络和时钟。

use crate::event::{CameraEvent, DetectionRegion};
use std::collections::BTreeSet;

/// 线检测事件类型（固件输出的规范值，区分大小写）
pub const LINE_DETECTION: &str = "linedetection";

/// 默认关注的目标
pub const DEFAULT_TARGET: &str = "vehicle";

/// 关注目标白名单（小写）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowedTargets {
    targets: BTreeSet<String>,
}

impl AllowedTargets {
    /// 从目标名列表构建；空列表回退到默认目标
    pub fn new<I, S>(targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let targets: BTreeSet<String> = targets
            .into_iter()
            .map(|t| t.as_ref().trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();

        if targets.is_empty() {
            return Self::default();
        }
        Self { targets }
    }

    /// 解析逗号分隔的列表，如 `"vehicle, Truck"`
    pub fn parse(list: &str) -> Self {
        Self::new(list.split(','))
    }

    pub fn contains(&self, target: &str) -> bool {
        self.targets.contains(&target.trim().to_lowercase())
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.targets.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

impl Default for AllowedTargets {
    fn default() -> Self {
        Self {
            targets: BTreeSet::from([DEFAULT_TARGET.to_string()]),
        }
    }
}

impl std::fmt::Display for AllowedTargets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.iter().collect::<Vec<_>>().join(","))
    }
}

/// 评估结果
#[derive(Debug, Clone, PartialEq)]
pub enum MatchResult {
    /// 不是线检测事件，或没有检测区域
    NoMatch,
    /// 命中白名单的区域（保持源顺序，不去重）
    Matched(Vec<DetectionRegion>),
    /// 有区域但都不在白名单内（仅用于日志）
    OtherTargets(Vec<String>),
}

impl MatchResult {
    pub fn is_match(&self) -> bool {
        matches!(self, MatchResult::Matched(_))
    }
}

/// 评估事件
pub fn evaluate(event: &CameraEvent, allowed: &AllowedTargets) -> MatchResult {
    if event.event_type != LINE_DETECTION || event.detection_regions.is_empty() {
        return MatchResult::NoMatch;
    }

    let matched: Vec<DetectionRegion> = event
        .detection_regions
        .iter()
        .filter(|region| allowed.contains(&region.target_key()))
        .cloned()
        .collect();

    if matched.is_empty() {
        MatchResult::OtherTargets(
            event
                .detection_regions
                .iter()
                .map(|region| region.detection_target.clone())
                .collect(),
        )
    } else {
        MatchResult::Matched(matched)
    }
}
