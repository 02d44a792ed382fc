use std::sync::Arc;
use pdsfile::{Archive, PdsFile};

pub struct AppState {
    pub archive: Archive,
    /// 当前所在的节点
    pub cwd: Arc<PdsFile>,
    pub running: bool,
}

impl AppState {
    pub fn new(archive: Archive, cwd: Arc<PdsFile>) -> Self {
        Self { archive, cwd, running: true }
    }

    /// 提示符中显示的位置
    pub fn location(&self) -> &str {
        if self.cwd.logical_path.is_empty() {
            "/"
        } else {
            &self.cwd.logical_path
        }
    }
}
