use std::sync::Arc;

use crate::Relay;

/// 应用状态
pub struct AppState {
    /// 分析服务，内部的模型客户端在所有请求间共享
    pub relay: Relay,
    /// 上传大小限制，单位为字节
    pub upload_limit: usize,
}

impl AppState {
    /// 创建新的应用状态
    pub fn new(relay: Relay, upload_limit: usize) -> Arc<Self> {
        Arc::new(AppState { relay, upload_limit })
    }
}
