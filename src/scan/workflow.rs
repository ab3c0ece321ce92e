//! # 上传→结果工作流（状态机）
//!
//! ## 设计思路
//!
//! `UploadWorkflow` 是一个显式的状态机实例，独占当前候选文件与运行状态：
//!
//! ```text
//! Idle ─select─▶ Validating ─accepted─▶ Loading ─loaded─▶ Analyzing ─result─▶ Complete
//!                    │                     │                  │
//!                 rejected             loadError         serviceError
//!                    └───────────────▶ Failed ◀──────────────┘
//!
//! Complete / Failed / Loading / Analyzing ─select─▶ Validating（开始新一轮）
//! ```
//!
//! ## 实现思路
//!
//! - 单一事件队列（FIFO），所有事件按到达顺序在同一逻辑线程中处理。
//! - 每次选择文件都会分配新的 `RunId`；异步任务完成时带回自己的 `RunId`，
//!   与当前运行不一致（或当前状态并不在等待它）的完成事件直接丢弃。
//!   外部服务没有取消原语，这就是取消机制。
//! - 进入 `Complete` 时发布交接结果，并置位一次性的“结果就绪”信号；
//!   重复读取状态不会再次触发。
//! - 所有异步操作都通过 `tokio::spawn` 启动，因此状态变更方法必须在 Tokio 运行时内调用。

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use super::analysis::AnalysisService;
use super::handoff::{HandoffPayload, ResultHandoff};
use super::loader::{ImageLoader, PreviewLoader};
use super::notify::{LogNotifier, Notification, Notifier};
use super::source::{AnalysisResult, ImageCandidate, LoadedImage};
use super::validator::{Validation, validate_with_limit};
use super::{ScanConfig, ScanError, ServiceError};

/// 运行编号，每次选择文件递增。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RunId(u64);

impl RunId {
    pub(crate) fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// 状态标签（不携带数据），用于观测与断言。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Validating,
    Loading,
    Analyzing,
    Complete,
    Failed,
}

/// 工作流当前状态。
#[derive(Debug, Clone)]
pub enum WorkflowState {
    Idle,
    Validating,
    Loading,
    Analyzing,
    Complete {
        result: AnalysisResult,
        image: Arc<LoadedImage>,
    },
    Failed(ScanError),
}

impl WorkflowState {
    pub fn phase(&self) -> Phase {
        match self {
            Self::Idle => Phase::Idle,
            Self::Validating => Phase::Validating,
            Self::Loading => Phase::Loading,
            Self::Analyzing => Phase::Analyzing,
            Self::Complete { .. } => Phase::Complete,
            Self::Failed(_) => Phase::Failed,
        }
    }

    /// 是否有进行中的操作。
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Validating | Self::Loading | Self::Analyzing)
    }

    pub fn failure_reason(&self) -> Option<&str> {
        match self {
            Self::Failed(err) => Some(err.reason()),
            _ => None,
        }
    }
}

/// 工作流事件。
#[derive(Debug)]
pub enum WorkflowEvent {
    /// 用户选择或拖入了一个文件。
    FileSelected(ImageCandidate),
    /// 加载任务完成。
    Loaded {
        run: RunId,
        outcome: Result<LoadedImage, ScanError>,
    },
    /// 分析任务完成。
    Analyzed {
        run: RunId,
        outcome: Result<AnalysisResult, ServiceError>,
    },
}

/// 单个事件的处理结果。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// 进入了新状态。
    Entered(Phase),
    /// 进入 `Complete`，交接结果已发布。每轮最多一次。
    ResultReady(RunId),
    /// 过期事件，已丢弃，状态未变。
    Stale(RunId),
}

/// 向工作流投递用户事件的句柄，可跨任务克隆。
#[derive(Debug, Clone)]
pub struct WorkflowInput {
    tx: mpsc::UnboundedSender<WorkflowEvent>,
}

impl WorkflowInput {
    /// 投递文件选择事件；工作流已销毁时返回 `false`。
    pub fn select_file(&self, candidate: ImageCandidate) -> bool {
        self.tx.send(WorkflowEvent::FileSelected(candidate)).is_ok()
    }
}

/// 上传→分析→交接工作流。
pub struct UploadWorkflow {
    config: ScanConfig,
    loader: Arc<dyn ImageLoader>,
    service: Arc<dyn AnalysisService>,
    handoff: Arc<ResultHandoff>,
    notifier: Arc<dyn Notifier>,
    state: WorkflowState,
    run: RunId,
    phases: Vec<Phase>,
    analyzing_image: Option<Arc<LoadedImage>>,
    last_candidate: Option<ImageCandidate>,
    ready: Option<RunId>,
    events_tx: mpsc::UnboundedSender<WorkflowEvent>,
    events_rx: mpsc::UnboundedReceiver<WorkflowEvent>,
}

impl UploadWorkflow {
    /// 创建工作流实例，初始状态为 `Idle`。
    ///
    /// 默认使用 `PreviewLoader` 与 `LogNotifier`。
    ///
    /// # 示例
    /// ```rust,no_run
    /// use std::sync::Arc;
    /// use skinscan::scan::{build_service, ImageCandidate, ResultHandoff, ScanConfig, UploadWorkflow};
    ///
    /// # async fn demo(png: Vec<u8>) -> Result<(), skinscan::scan::ScanError> {
    /// let config = ScanConfig::default();
    /// let handoff = Arc::new(ResultHandoff::new());
    /// let mut workflow = UploadWorkflow::new(config.clone(), build_service(&config)?, handoff);
    /// workflow.select_file(ImageCandidate::from_bytes("image/png", png));
    /// workflow.settle().await;
    /// # Ok(())
    /// # }
    /// ```
    pub fn new(
        config: ScanConfig,
        service: Arc<dyn AnalysisService>,
        handoff: Arc<ResultHandoff>,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let loader = Arc::new(PreviewLoader::new(&config));

        Self {
            config,
            loader,
            service,
            handoff,
            notifier: Arc::new(LogNotifier),
            state: WorkflowState::Idle,
            run: RunId::new(0),
            phases: vec![Phase::Idle],
            analyzing_image: None,
            last_candidate: None,
            ready: None,
            events_tx,
            events_rx,
        }
    }

    pub fn with_loader(mut self, loader: Arc<dyn ImageLoader>) -> Self {
        self.loader = loader;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn state(&self) -> &WorkflowState {
        &self.state
    }

    pub fn run_id(&self) -> RunId {
        self.run
    }

    /// 本轮经过的状态序列（新一轮开始时清空）。
    pub fn phases(&self) -> &[Phase] {
        &self.phases
    }

    pub fn input(&self) -> WorkflowInput {
        WorkflowInput {
            tx: self.events_tx.clone(),
        }
    }

    /// 取走一次性的“结果就绪”信号。
    pub fn take_result_ready(&mut self) -> Option<RunId> {
        self.ready.take()
    }

    /// 选择文件（等价于立即处理一个 `FileSelected` 事件）。
    pub fn select_file(&mut self, candidate: ImageCandidate) -> Dispatch {
        self.dispatch(WorkflowEvent::FileSelected(candidate))
    }

    /// 失败后重新提交上一次选择的文件；其他状态下不做任何事。
    pub fn resubmit(&mut self) -> Option<Dispatch> {
        if !matches!(self.state, WorkflowState::Failed(_)) {
            return None;
        }
        let candidate = self.last_candidate.clone()?;
        log::info!("🔁 重新提交上一次选择的文件");
        Some(self.select_file(candidate))
    }

    /// 等待并处理队列中的下一个事件。
    pub async fn next(&mut self) -> Option<Dispatch> {
        let event = self.events_rx.recv().await?;
        Some(self.dispatch(event))
    }

    /// 处理已排队的事件，然后一直推进到没有进行中的操作为止。
    pub async fn settle(&mut self) -> &WorkflowState {
        while let Ok(event) = self.events_rx.try_recv() {
            self.dispatch(event);
        }
        while self.state.is_busy() {
            if self.next().await.is_none() {
                break;
            }
        }
        &self.state
    }

    /// 处理单个事件。
    pub fn dispatch(&mut self, event: WorkflowEvent) -> Dispatch {
        match event {
            WorkflowEvent::FileSelected(candidate) => self.start_run(candidate),
            WorkflowEvent::Loaded { run, outcome } => {
                if self.is_stale(run, Phase::Loading) {
                    return self.discard(run, "load");
                }
                match outcome {
                    Ok(image) => self.start_analysis(Arc::new(image)),
                    Err(err) => self.fail(err),
                }
            }
            WorkflowEvent::Analyzed { run, outcome } => {
                if self.is_stale(run, Phase::Analyzing) {
                    return self.discard(run, "analyze");
                }
                match outcome {
                    Ok(result) => self.complete(result),
                    Err(err) => self.fail(ScanError::Service(err)),
                }
            }
        }
    }

    fn is_stale(&self, run: RunId, expected: Phase) -> bool {
        run != self.run || self.state.phase() != expected
    }

    fn discard(&self, run: RunId, stage: &str) -> Dispatch {
        log::debug!(
            "🗑️ 丢弃过期的 {} 结果 - 运行 {}（当前运行 {}，状态 {:?}）",
            stage,
            run,
            self.run,
            self.state.phase()
        );
        Dispatch::Stale(run)
    }

    fn enter(&mut self, state: WorkflowState) {
        let phase = state.phase();
        self.state = state;
        self.phases.push(phase);
    }

    fn start_run(&mut self, candidate: ImageCandidate) -> Dispatch {
        if self.state.is_busy() {
            log::info!("↪️ 新的选择替换进行中的运行 {}", self.run);
        }

        self.run = RunId::new(self.run.get() + 1);
        self.phases.clear();
        self.analyzing_image = None;
        self.ready = None;
        if self.handoff.clear().is_some() {
            log::info!("🧹 丢弃上一轮未被取走的交接结果");
        }
        self.last_candidate = Some(candidate.clone());

        log::info!(
            "📥 运行 {} 开始 - 类型: {} 体积: {}B",
            self.run,
            candidate.mime_type(),
            candidate.size_bytes()
        );

        self.enter(WorkflowState::Validating);
        match validate_with_limit(candidate.metadata(), self.config.max_file_size) {
            Validation::Accepted => {
                self.enter(WorkflowState::Loading);
                self.spawn_load(candidate);
                Dispatch::Entered(Phase::Loading)
            }
            Validation::Rejected(rejection) => self.fail(ScanError::Rejected(rejection)),
        }
    }

    fn spawn_load(&self, candidate: ImageCandidate) {
        let loader = Arc::clone(&self.loader);
        let tx = self.events_tx.clone();
        let run = self.run;

        tokio::spawn(async move {
            let task = tokio::spawn(async move { loader.load(candidate).await });
            let outcome = match task.await {
                Ok(outcome) => outcome,
                Err(err) => {
                    log::error!("💥 运行 {} 加载任务异常退出：{}", run, err);
                    Err(ScanError::load(format!("加载任务异常退出：{}", err)))
                }
            };
            let _ = tx.send(WorkflowEvent::Loaded { run, outcome });
        });
    }

    fn start_analysis(&mut self, image: Arc<LoadedImage>) -> Dispatch {
        self.analyzing_image = Some(Arc::clone(&image));
        self.enter(WorkflowState::Analyzing);
        self.notifier.notify(Notification::Info("analyzing".to_string()));

        let service = Arc::clone(&self.service);
        let tx = self.events_tx.clone();
        let run = self.run;
        let timeout = self.config.analysis_timeout_ms.map(Duration::from_millis);

        tokio::spawn(async move {
            let mut task = tokio::spawn(async move { service.analyze(&image).await });
            let joined = match timeout {
                Some(limit) => match tokio::time::timeout(limit, &mut task).await {
                    Ok(joined) => joined,
                    Err(_) => {
                        task.abort();
                        let _ = tx.send(WorkflowEvent::Analyzed {
                            run,
                            outcome: Err(ServiceError::Transient("timeout".to_string())),
                        });
                        return;
                    }
                },
                None => task.await,
            };
            let outcome = joined.unwrap_or_else(|err| {
                log::error!("💥 运行 {} 分析任务异常退出：{}", run, err);
                Err(ServiceError::Transient("service panicked".to_string()))
            });
            let _ = tx.send(WorkflowEvent::Analyzed { run, outcome });
        });

        Dispatch::Entered(Phase::Analyzing)
    }

    fn complete(&mut self, result: AnalysisResult) -> Dispatch {
        let Some(image) = self.analyzing_image.take() else {
            return self.fail(ScanError::load("分析完成时缺少已加载的图片"));
        };

        log::info!(
            "✅ 运行 {} 完成 - {} ({:.1})",
            self.run,
            result.prediction(),
            result.confidence()
        );

        self.handoff
            .publish(HandoffPayload::new(self.run, &result, Arc::clone(&image)));
        self.enter(WorkflowState::Complete { result, image });
        self.notifier
            .notify(Notification::Success("complete".to_string()));

        self.ready = Some(self.run);
        Dispatch::ResultReady(self.run)
    }

    fn fail(&mut self, err: ScanError) -> Dispatch {
        log::warn!(
            "❌ 运行 {} 失败 - 阶段: {} 代码: {} 原因: {}",
            self.run,
            err.stage(),
            err.code(),
            err
        );

        self.analyzing_image = None;
        self.notifier
            .notify(Notification::Error(err.reason().to_string()));
        self.enter(WorkflowState::Failed(err));
        Dispatch::Entered(Phase::Failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::analysis::FixedAnalysisService;
    use crate::scan::source::DisplayImage;
    use async_trait::async_trait;

    /// 不解码，直接包装成 `LoadedImage` 的加载器。
    struct PassthroughLoader;

    #[async_trait]
    impl ImageLoader for PassthroughLoader {
        async fn load(&self, candidate: ImageCandidate) -> Result<LoadedImage, ScanError> {
            Ok(LoadedImage::new(
                DisplayImage {
                    data_url: "data:image/png;base64,".to_string(),
                    width: 1,
                    height: 1,
                    source_width: 1,
                    source_height: 1,
                },
                candidate,
            ))
        }
    }

    fn acne() -> AnalysisResult {
        AnalysisResult::new("Acne", 92.5, "Cleanse gently twice daily.").expect("valid result")
    }

    fn workflow(service: Arc<dyn AnalysisService>) -> (UploadWorkflow, Arc<ResultHandoff>) {
        let handoff = Arc::new(ResultHandoff::new());
        let workflow = UploadWorkflow::new(ScanConfig::default(), service, Arc::clone(&handoff))
            .with_loader(Arc::new(PassthroughLoader));
        (workflow, handoff)
    }

    fn png(size: u64) -> ImageCandidate {
        ImageCandidate::new("image/png", size, vec![0u8; 8])
    }

    #[tokio::test]
    async fn starts_idle() {
        let (workflow, handoff) = workflow(Arc::new(FixedAnalysisService::succeed(acne())));

        assert_eq!(workflow.state().phase(), Phase::Idle);
        assert_eq!(workflow.phases(), &[Phase::Idle]);
        assert!(!handoff.is_pending());
    }

    #[tokio::test]
    async fn stale_events_do_not_change_state() {
        let service = Arc::new(FixedAnalysisService::succeed(acne()));
        let (mut workflow, _handoff) = workflow(service);

        workflow.select_file(png(10));
        let old_run = workflow.run_id();
        workflow.select_file(png(20));

        let dispatch = workflow.dispatch(WorkflowEvent::Analyzed {
            run: old_run,
            outcome: Err(ServiceError::Transient("late".to_string())),
        });

        assert_eq!(dispatch, Dispatch::Stale(old_run));
        assert_eq!(workflow.state().phase(), Phase::Loading);
    }

    #[tokio::test]
    async fn completion_for_wrong_phase_is_discarded() {
        let service = Arc::new(FixedAnalysisService::succeed(acne()));
        let (mut workflow, handoff) = workflow(service);

        workflow.select_file(png(10));
        let run = workflow.run_id();

        // 当前运行仍在 Loading，不应接受分析结果。
        let dispatch = workflow.dispatch(WorkflowEvent::Analyzed {
            run,
            outcome: Ok(acne()),
        });

        assert_eq!(dispatch, Dispatch::Stale(run));
        assert_eq!(workflow.state().phase(), Phase::Loading);
        assert!(!handoff.is_pending());
    }

    #[tokio::test]
    async fn result_ready_fires_once_per_run() {
        let service = Arc::new(FixedAnalysisService::succeed(acne()));
        let (mut workflow, _handoff) = workflow(service);

        workflow.select_file(png(10));
        workflow.settle().await;

        let run = workflow.run_id();
        assert_eq!(workflow.take_result_ready(), Some(run));
        assert_eq!(workflow.take_result_ready(), None);

        workflow.settle().await;
        assert_eq!(workflow.state().phase(), Phase::Complete);
        assert_eq!(workflow.take_result_ready(), None);
    }

    #[tokio::test]
    async fn analysis_timeout_is_layered_by_caller() {
        let service = Arc::new(
            FixedAnalysisService::succeed(acne()).with_delay(Duration::from_secs(30)),
        );
        let handoff = Arc::new(ResultHandoff::new());
        let config = ScanConfig {
            analysis_timeout_ms: Some(50),
            ..ScanConfig::default()
        };
        let mut workflow = UploadWorkflow::new(config, service, Arc::clone(&handoff))
            .with_loader(Arc::new(PassthroughLoader));

        workflow.select_file(png(10));
        let state = workflow.settle().await;

        assert_eq!(state.failure_reason(), Some("timeout"));
        assert!(!handoff.is_pending());
    }

    #[tokio::test]
    async fn resubmit_only_from_failed() {
        let service = Arc::new(FixedAnalysisService::fail(ServiceError::Transient(
            "service unreachable".to_string(),
        )));
        let (mut workflow, _handoff) = workflow(Arc::clone(&service) as Arc<dyn AnalysisService>);

        assert!(workflow.resubmit().is_none());

        workflow.select_file(png(10));
        workflow.settle().await;
        assert_eq!(workflow.state().failure_reason(), Some("service unreachable"));

        let dispatch = workflow.resubmit();
        assert_eq!(dispatch, Some(Dispatch::Entered(Phase::Loading)));
        workflow.settle().await;
        assert_eq!(service.calls(), 2);
    }

    #[tokio::test]
    async fn input_handle_events_are_processed_in_order() {
        let service = Arc::new(FixedAnalysisService::succeed(acne()));
        let (mut workflow, handoff) = workflow(service);
        let input = workflow.input();

        assert!(input.select_file(ImageCandidate::new("text/plain", 100, vec![0u8; 4])));
        assert!(input.select_file(png(10)));

        let state = workflow.settle().await;

        assert_eq!(state.phase(), Phase::Complete);
        assert_eq!(workflow.run_id().get(), 2);
        assert!(handoff.is_pending());
    }

    struct PanickingService;

    #[async_trait]
    impl AnalysisService for PanickingService {
        async fn analyze(&self, _image: &LoadedImage) -> Result<AnalysisResult, ServiceError> {
            panic!("analysis backend crashed");
        }
    }

    struct PanickingLoader;

    #[async_trait]
    impl ImageLoader for PanickingLoader {
        async fn load(&self, _candidate: ImageCandidate) -> Result<LoadedImage, ScanError> {
            panic!("decoder crashed");
        }
    }

    #[tokio::test]
    async fn panicking_service_fails_the_run() {
        let (mut workflow, handoff) = workflow(Arc::new(PanickingService));

        workflow.select_file(png(10));
        let state = tokio::time::timeout(Duration::from_secs(5), workflow.settle())
            .await
            .expect("settle must not hang")
            .clone();

        assert_eq!(state.failure_reason(), Some("service panicked"));
        assert!(!handoff.is_pending());
    }

    #[tokio::test]
    async fn panicking_loader_fails_with_load_error() {
        let handoff = Arc::new(ResultHandoff::new());
        let service = Arc::new(FixedAnalysisService::succeed(acne()));
        let mut workflow = UploadWorkflow::new(
            ScanConfig::default(),
            Arc::clone(&service) as Arc<dyn AnalysisService>,
            handoff,
        )
        .with_loader(Arc::new(PanickingLoader));

        workflow.select_file(png(10));
        let state = tokio::time::timeout(Duration::from_secs(5), workflow.settle())
            .await
            .expect("settle must not hang")
            .clone();

        assert_eq!(state.failure_reason(), Some("load error"));
        assert_eq!(service.calls(), 0);
    }

    #[tokio::test]
    async fn new_run_discards_unconsumed_result_of_previous_run() {
        let service = Arc::new(FixedAnalysisService::succeed(acne()));
        let (mut workflow, handoff) = workflow(service);

        workflow.select_file(png(10));
        workflow.settle().await;
        assert!(handoff.is_pending());

        workflow.select_file(ImageCandidate::new("text/plain", 100, vec![0u8; 4]));

        assert_eq!(workflow.state().failure_reason(), Some("not an image"));
        assert!(!handoff.is_pending());
        assert_eq!(workflow.take_result_ready(), None);
    }
}
