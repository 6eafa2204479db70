//! 进程级缓冲注册表。
//!
//! 固件通常在启动阶段调用一次 [`init`]，之后任务与中断处理函数经 [`global`]
//! 取得同一个注册表。测试或多实例场景可以直接构造 [`CpcBuffers`]。

use spin::Once;

use crate::{
    config::CpcConfig,
    error::{CpcError, Result},
    pool::PoolKind,
    registry::CpcBuffers,
};

static GLOBAL: Once<CpcBuffers> = Once::new();

/// 构造全局注册表。
///
/// # 契约说明（What）
/// - **前置条件**：`config` 通过 [`CpcConfig::validate`]；
/// - **返回值**：首次调用返回注册表引用；再次调用返回 [`CpcError::AlreadyInitialized`]，
///   已有注册表保持不变。
pub fn init(config: CpcConfig) -> Result<&'static CpcBuffers> {
    config.validate()?;
    let mut created = false;
    let buffers = GLOBAL.call_once(|| {
        created = true;
        CpcBuffers::new(config)
    });
    if !created {
        return Err(CpcError::AlreadyInitialized);
    }
    tracing::info!(
        frame_handles = config.limit(PoolKind::FrameHandle),
        rx_payloads = config.limit(PoolKind::RxPayload),
        "cpc buffer registry initialized"
    );
    Ok(buffers)
}

/// 已初始化的全局注册表；尚未调用 [`init`] 时返回 `None`。
pub fn global() -> Option<&'static CpcBuffers> {
    GLOBAL.get()
}
