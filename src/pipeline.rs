//! 事件处理流水线：规范化 → 评估 → 闸门 → 通知

use crate::config::GateConfig;
use crate::detection::{evaluate, AllowedTargets, MatchResult};
use crate::error::ParseError;
use crate::event::{CameraEvent, InboundRequest, PayloadNormalizer, DEFAULT_FIELD};
use crate::notification::{GateNotifier, GateOutcome, HttpGateNotifier, NotificationGate};
use anyhow::Result;
use std::sync::Arc;
use tracing::{debug, info};

/// 单个事件的评估结果
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub event: CameraEvent,
    pub result: MatchResult,
}

/// 事件处理流水线
pub struct EventPipeline {
    normalizer: PayloadNormalizer,
    allowed_targets: AllowedTargets,
    gate: NotificationGate,
    notifier: Arc<dyn GateNotifier>,
}

impl EventPipeline {
    pub fn new(
        normalizer: PayloadNormalizer,
        allowed_targets: AllowedTargets,
        gate: NotificationGate,
        notifier: Arc<dyn GateNotifier>,
    ) -> Self {
        Self {
            normalizer,
            allowed_targets,
            gate,
            notifier,
        }
    }

    /// 按配置组装（HTTP 通知器 + 系统时钟）
    pub fn from_config(config: &GateConfig) -> Result<Self> {
        let notifier = HttpGateNotifier::new(config.notifier_config())?;
        info!(
            gate_link = config.gate_link.as_deref().unwrap_or("<unset>"),
            method = %config.notify_method,
            allowed_targets = %config.allowed_targets,
            "Gate notifier configured"
        );

        Ok(Self::new(
            PayloadNormalizer::new(DEFAULT_FIELD)?,
            config.allowed_targets.clone(),
            NotificationGate::new(config.min_interval),
            Arc::new(notifier),
        ))
    }

    pub fn allowed_targets(&self) -> &AllowedTargets {
        &self.allowed_targets
    }

    pub fn gate(&self) -> &NotificationGate {
        &self.gate
    }

    /// 规范化并评估（纯逻辑，无网络）
    pub fn ingest(&self, request: &InboundRequest) -> Result<Evaluation, ParseError> {
        let event = self.normalizer.normalize(request)?;

        info!(
            event_type = %event.event_type,
            event_state = event.event_state.as_deref().unwrap_or(""),
            channel_name = event.channel_name.as_deref().unwrap_or(""),
            region_count = event.detection_regions.len(),
            "Camera data received and parsed"
        );

        let result = evaluate(&event, &self.allowed_targets);
        match &result {
            MatchResult::Matched(regions) => {
                for region in regions {
                    info!(
                        region_id = region.region_id,
                        event_type = %event.event_type,
                        detection_target = %region.detection_target,
                        "Target detected in linedetection event, sending notification"
                    );
                }
            }
            MatchResult::OtherTargets(targets) => {
                info!(targets = ?targets, "Linedetection event without allowed targets");
            }
            MatchResult::NoMatch => {
                debug!(event_type = %event.event_type, "Event does not require notification");
            }
        }

        Ok(Evaluation { event, result })
    }

    /// 命中时经闸门发送通知；未命中返回 `None`
    pub async fn dispatch(&self, evaluation: &Evaluation) -> Option<GateOutcome> {
        if !evaluation.result.is_match() {
            return None;
        }

        let notifier = self.notifier.as_ref();
        let outcome = self
            .gate
            .try_notify(&evaluation.event, |event| notifier.send(event))
            .await;
        debug!(outcome = ?outcome, "Notification dispatch finished");
        Some(outcome)
    }

    /// `ingest` + `dispatch`
    pub async fn process(&self, request: &InboundRequest) -> Result<(Evaluation, Option<GateOutcome>), ParseError> {
        let evaluation = self.ingest(request)?;
        let outcome = self.dispatch(&evaluation).await;
        Ok((evaluation, outcome))
    }
}
