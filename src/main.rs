//! Camera Gate CLI
//!
//! 接收摄像头线检测事件并通知闸机网关

use anyhow::{Context, Result};
use camera_gate::logging::LogSettings;
use camera_gate::{
    evaluate, parse_captured, AllowedTargets, AppState, CameraEvent, EventPipeline,
    GateConfig, GateNotifier, HttpGateNotifier, MatchResult, SendError,
};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "camera-gate")]
#[command(about = "Camera Gate - 接收摄像头线检测事件并通知闸机网关")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 启动 webhook 服务
    Serve {
        /// 监听地址（覆盖 HOST/PORT）
        #[arg(long)]
        bind: Option<std::net::SocketAddr>,
        /// 配置文件路径
        #[arg(long, short, env = "CAMERA_GATE_CONFIG")]
        config: Option<PathBuf>,
    },
    /// 离线解析抓取到的载荷文件（XML 或 JSON）
    Inspect {
        /// 载荷文件
        file: PathBuf,
        /// 关注目标，逗号分隔（默认读取配置）
        #[arg(long)]
        targets: Option<String>,
        /// 输出 JSON 格式
        #[arg(long)]
        json: bool,
    },
    /// 向网关发送一次测试通知（不经过限流）
    Ping {
        /// 配置文件路径
        #[arg(long, short, env = "CAMERA_GATE_CONFIG")]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG > LOG_LEVEL > info；serve 额外写入 LOG_FILE（默认 ./logs/app.log）
    let with_file = matches!(cli.command, Commands::Serve { .. });
    let settings = LogSettings::from_env(|key| std::env::var(key).ok(), with_file);
    let _log_guard = camera_gate::logging::init(&settings)?;

    match cli.command {
        Commands::Serve { bind, config } => {
            let mut config = GateConfig::load(config.as_deref())?;
            if let Some(bind) = bind {
                config.bind = bind;
            }
            if config.gate_link.is_none() {
                warn!("GATE_LINK not configured, notifications are disabled");
            }

            let pipeline = Arc::new(EventPipeline::from_config(&config)?);
            let state = AppState::new(pipeline, config.max_body_bytes);
            camera_gate::serve(config.bind, state).await?;
        }
        Commands::Inspect { file, targets, json } => {
            let allowed = match targets {
                Some(list) => AllowedTargets::parse(&list),
                None => GateConfig::load(None)?.allowed_targets,
            };

            let bytes = std::fs::read(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let event = parse_captured(bytes)?;
            let result = evaluate(&event, &allowed);

            if json {
                let output = serde_json::json!({
                    "event": event,
                    "allowedTargets": allowed.iter().collect::<Vec<_>>(),
                    "result": describe_result(&result),
                });
                println!("{}", serde_json::to_string_pretty(&output)?);
            } else {
                print_event(&event);
                println!("\n关注目标: {}", allowed);
                match &result {
                    MatchResult::Matched(regions) => {
                        println!("结果: 命中 {} 个区域，将发送通知", regions.len());
                        for region in regions {
                            println!("  区域 {} | 目标: {}", region.region_id, region.detection_target);
                        }
                    }
                    MatchResult::OtherTargets(targets) => {
                        println!("结果: 未命中（检测到: {}）", targets.join(", "));
                    }
                    MatchResult::NoMatch => println!("结果: 非线检测事件或无检测区域"),
                }
            }
        }
        Commands::Ping { config } => {
            let config = GateConfig::load(config.as_deref())?;
            let notifier = HttpGateNotifier::new(config.notifier_config())?;

            let mut event = CameraEvent::new(camera_gate::LINE_DETECTION);
            event.event_state = Some("active".to_string());
            event.event_description = Some("camera-gate ping".to_string());

            match notifier.send(&event).await {
                Ok(()) => {
                    info!(target_url = notifier.target().unwrap_or(""), "Ping delivered");
                    println!("✅ 通知已发送到 {}", notifier.target().unwrap_or(""));
                }
                Err(SendError::NotConfigured) => {
                    println!("⚠️ GATE_LINK 未配置，未发送");
                }
                Err(e) => {
                    error!(error = %e, "Ping failed");
                    anyhow::bail!("ping failed: {}", e);
                }
            }
        }
    }

    Ok(())
}

fn describe_result(result: &MatchResult) -> serde_json::Value {
    match result {
        MatchResult::NoMatch => serde_json::json!({ "kind": "no_match" }),
        MatchResult::Matched(regions) => serde_json::json!({ "kind": "matched", "regions": regions }),
        MatchResult::OtherTargets(targets) => serde_json::json!({ "kind": "other_targets", "targets": targets }),
    }
}

fn print_event(event: &CameraEvent) {
    println!("事件信息:");
    println!("  类型: {}", event.event_type);
    println!("  状态: {}", event.event_state.as_deref().unwrap_or("-"));
    println!("  描述: {}", event.event_description.as_deref().unwrap_or("-"));
    println!("  通道: {}", event.channel_name.as_deref().unwrap_or("-"));
    println!("  检测区域: {}", event.detection_regions.len());
    for region in &event.detection_regions {
        println!(
            "    区域 {} | 目标: {} | 灵敏度: {}",
            region.region_id,
            region.detection_target,
            region
                .sensitivity_level
                .map(|s| s.to_string())
                .unwrap_or_else(|| "-".to_string())
        );
    }
}
