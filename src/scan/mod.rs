//! # 上传→分析→结果模块（scan）
//!
//! ## 设计思路
//!
//! 该模块将“输入校验 → 加载预览 → 远程分析 → 结果交接”按职责拆分为多个子模块，
//! 避免单文件膨胀与耦合。
//!
//! - `validator`：纯函数校验（MIME 前缀 + 体积上限）
//! - `loader` / `pipeline`：签名校验、解码、降采样、生成 data URL
//! - `analysis`：分析服务接口及 remote / catalog / fixed 三种实现
//! - `workflow`：状态机，编排整条链路并按运行编号丢弃过期结果
//! - `handoff`：单槽位结果交接
//! - `result_stage`：结果页入口（无结果时重定向）
//! - `config/error/source/notify`：配置、错误、中间数据模型、通知事件
//!
//! ## 新同事快速上手
//!
//! ```text
//! 用户选择/拖入文件
//!    ↓
//! workflow.rs（FileSelected → 新运行编号）
//!    ├─ validator.rs（Rejected → Failed）
//!    ├─ loader.rs + pipeline.rs（spawn_blocking 解码，Loaded 事件回队列）
//!    └─ analysis/（spawn 调用服务，Analyzed 事件回队列）
//!    ↓
//! handoff.rs（Complete 时 publish 一次）
//!    ↓
//! result_stage.rs（consume 一次；没有就 Redirect）
//! ```

mod analysis;
mod config;
mod error;
mod handoff;
mod loader;
mod notify;
mod pipeline;
pub mod result_stage;
mod source;
mod validator;
mod workflow;

pub use analysis::{
    AnalysisService,
    CatalogAnalysisService,
    FixedAnalysisService,
    HttpAnalysisService,
    build_service,
};
pub use config::{AnalysisBackend, ScanConfig, ScanSettings};
pub use error::{ScanError, ServiceError};
pub use handoff::{HandoffPayload, ResultHandoff};
pub use loader::{ImageLoader, PreviewLoader};
pub use notify::{LogNotifier, Notification, Notifier};
pub use result_stage::{ResultView, StageEntry};
pub use source::{AnalysisResult, DisplayImage, ImageCandidate, LoadedImage};
pub use validator::{FileMetadata, MAX_IMAGE_BYTES, Rejection, Validation, validate, validate_with_limit};
pub use workflow::{
    Dispatch,
    Phase,
    RunId,
    UploadWorkflow,
    WorkflowEvent,
    WorkflowInput,
    WorkflowState,
};
