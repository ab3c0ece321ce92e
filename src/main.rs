//! # skinscan — 命令行入口
//!
//! 本文件仅负责参数解析、日志初始化与终端展示。
//! 业务逻辑分布在 `scan` 模块中，详见 `lib.rs` 架构文档。

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use skinscan::error::AppError;
use skinscan::scan::{
    self, AnalysisBackend, ImageCandidate, Notification, ResultHandoff, ScanConfig, ScanSettings,
    StageEntry, UploadWorkflow, WorkflowState,
};
use skinscan::settings;
use tokio::sync::mpsc;

#[derive(Debug, Parser)]
#[command(name = "skinscan", version, about = "Analyze a skin image and show the result")]
struct Cli {
    /// 待分析的图片路径
    image: PathBuf,

    /// JSON 设置文件
    #[arg(long)]
    config: Option<PathBuf>,

    /// 分析后端：remote / catalog
    #[arg(long)]
    backend: Option<String>,

    /// 远程分析服务地址（隐含 --backend remote）
    #[arg(long)]
    endpoint: Option<String>,

    /// 覆盖按文件签名推断的 MIME 类型
    #[arg(long)]
    mime: Option<String>,

    /// 分析超时（毫秒）
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// catalog 后端的随机种子
    #[arg(long)]
    seed: Option<u64>,

    /// 以 JSON 输出结果
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let json = cli.json;

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            if json {
                let body = serde_json::json!({ "error": err });
                println!("{}", body);
            } else {
                eprintln!("error: {}", err);
            }
            ExitCode::FAILURE
        }
    }
}

/// 设置文件之上叠加命令行参数，两者走同一套范围校验。
fn build_config(cli: &Cli) -> Result<ScanConfig, AppError> {
    let mut config = settings::load_config(cli.config.as_deref())?;

    let backend = if cli.endpoint.is_some() {
        Some(AnalysisBackend::Remote.as_str().to_string())
    } else {
        cli.backend.clone()
    };
    config.apply_settings(ScanSettings {
        backend,
        endpoint: cli.endpoint.clone(),
        analysis_timeout_ms: cli.timeout_ms,
        catalog_seed: cli.seed,
        ..ScanSettings::default()
    })?;

    Ok(config)
}

/// 返回 `Ok(false)` 表示本次运行进入了 `Failed`。
async fn run(cli: Cli) -> Result<bool, AppError> {
    let config = build_config(&cli)?;

    log::info!("⚙️ 分析后端：{}", config.backend.as_str());

    let service = scan::build_service(&config)?;
    let max_file_size = config.max_file_size;
    let handoff = Arc::new(ResultHandoff::new());
    let (notice_tx, mut notice_rx) = mpsc::unbounded_channel::<Notification>();

    let quiet = cli.json;
    let printer = tokio::spawn(async move {
        while let Some(notice) = notice_rx.recv().await {
            if quiet {
                continue;
            }
            match &notice {
                Notification::Info(msg) => eprintln!("[info] {}", msg),
                Notification::Success(msg) => eprintln!("[success] {}", msg),
                Notification::Error(msg) => eprintln!("[error] {}", msg),
            }
        }
    });

    let mut workflow = UploadWorkflow::new(config, service, Arc::clone(&handoff))
        .with_notifier(Arc::new(notice_tx));

    let candidate = ImageCandidate::from_path(&cli.image, cli.mime.as_deref(), max_file_size).await?;
    workflow.select_file(candidate);
    let state = workflow.settle().await.clone();
    let ready = workflow.take_result_ready();

    // 销毁工作流后通知通道关闭，等待剩余通知输出完毕。
    drop(workflow);
    if let Err(err) = printer.await {
        log::warn!("通知输出任务异常退出: {err}");
    }

    if let WorkflowState::Failed(err) = &state {
        if cli.json {
            let body = serde_json::json!({
                "error": err.reason(),
                "code": err.code(),
                "stage": err.stage(),
            });
            println!("{}", body);
        } else {
            eprintln!("Analysis failed: {}", err.reason());
        }
        return Ok(false);
    }

    if ready.is_none() {
        log::warn!("⚠️ 工作流未产生结果就绪信号，状态：{:?}", state.phase());
    }

    match scan::result_stage::enter(&handoff) {
        StageEntry::Render(view) => {
            if cli.json {
                let body = serde_json::to_string_pretty(&view)
                    .map_err(|e| AppError::Output(format!("序列化结果失败: {}", e)))?;
                println!("{}", body);
            } else {
                print!("{}", view.render_text());
            }
            Ok(true)
        }
        StageEntry::Redirect => {
            eprintln!("No result to show; upload an image to start a new analysis.");
            Ok(false)
        }
    }
}
