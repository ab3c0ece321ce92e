//! 面向用户的通知事件。
//!
//! 工作流只产出抽象事件，展示方式（toast / 终端 / 日志）由调用方决定。

use serde::Serialize;
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "level", content = "message", rename_all = "lowercase")]
pub enum Notification {
    Info(String),
    Success(String),
    Error(String),
}

impl Notification {
    pub fn message(&self) -> &str {
        match self {
            Self::Info(msg) | Self::Success(msg) | Self::Error(msg) => msg,
        }
    }
}

pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// 仅写日志的通知器（默认）。
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notification: Notification) {
        match &notification {
            Notification::Error(reason) => log::warn!("🔔 error: {}", reason),
            other => log::info!("🔔 {:?}", other),
        }
    }
}

/// 通过通道转发给界面层；接收端关闭后静默丢弃。
impl Notifier for mpsc::UnboundedSender<Notification> {
    fn notify(&self, notification: Notification) {
        let _ = self.send(notification);
    }
}
