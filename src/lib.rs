//! # skinscan — 库入口
//!
//! ## 架构总览
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                 入口（CLI / 界面层）                      │
//! │                                                          │
//! │   选择文件 ── 通知展示 ── 结果页（enter → Render/Redirect）│
//! └───────┼──────────────────────────────────────────────────┘
//!         ↕ ImageCandidate / Notification / HandoffPayload
//! ┌───────┼──────────────────────────────────────────────────┐
//! │       ↕            核心 (Rust)                           │
//! │                                                          │
//! │  ┌─ error ────── AppError (统一错误类型)                  │
//! │  ├─ settings ─── JSON 设置文件 → ScanConfig               │
//! │  └─ scan ─────── 校验·加载·分析·状态机·交接               │
//! │      ├─ workflow       Idle→Validating→Loading→Analyzing  │
//! │      ├─ analysis       remote / catalog / fixed           │
//! │      └─ handoff        单槽位，取一次即清空               │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## 模块职责
//!
//! | 模块 | 职责 |
//! |------|------|
//! | [`error`] | 统一错误类型 `AppError`，CLI 的返回类型 |
//! | [`settings`] | 读取 JSON 设置文件并应用到 `ScanConfig` |
//! | [`scan`] | 上传→分析→结果的完整链路 |

pub mod error;
pub mod scan;
pub mod settings;
