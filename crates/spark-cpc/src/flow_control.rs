//! 接收负载归还时的流控通知。
//!
//! # 模块定位（Why）
//! - 物理层驱动在接收块耗尽时会暂停收包（拉高 RTS、停止 DMA 等），
//!   只有在某个接收块真正回到池中之后才能恢复；
//! - 本模块提供唯一的通知点 [`FlowControl::on_receive_buffer_freed`]，
//!   由接收负载池在槽位归还、台账锁释放之后触发。
//!
//! # 契约说明（What）
//! - 钩子类型为无捕获状态的普通函数指针 [`FlowControlHook`]，只能注册一次；
//! - 钩子可能在中断上下文中执行，**不得阻塞**，也不应在其中做耗时工作；
//!   钩子内部再次向同一池借出槽位是允许的，此时槽位已可用；
//! - 未注册钩子时通知为空操作。

use spin::Once;

use crate::error::{CpcError, Result};

/// 流控钩子：接收负载回到池中后被调用一次。
pub type FlowControlHook = fn();

/// 一次性注册的流控钩子槽位。
pub struct FlowControl {
    hook: Once<FlowControlHook>,
}

impl FlowControl {
    /// 创建未注册钩子的槽位。
    pub const fn new() -> Self {
        Self { hook: Once::new() }
    }

    /// 注册钩子。
    ///
    /// # 契约说明（What）
    /// - **前置条件**：此前未注册过钩子；
    /// - **返回值**：首次注册返回 `Ok(())`；之后的调用返回
    ///   [`CpcError::HookAlreadyRegistered`]，已注册的钩子保持不变。
    pub fn register(&self, hook: FlowControlHook) -> Result<()> {
        let mut installed = false;
        self.hook.call_once(|| {
            installed = true;
            hook
        });
        if installed {
            Ok(())
        } else {
            Err(CpcError::HookAlreadyRegistered)
        }
    }

    /// 是否已注册钩子。
    pub fn is_registered(&self) -> bool {
        self.hook.is_completed()
    }

    /// 通知上游已有接收负载回到池中。
    pub fn on_receive_buffer_freed(&self) {
        if let Some(hook) = self.hook.get() {
            hook();
        }
    }
}

impl Default for FlowControl {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::sync::atomic::{AtomicUsize, Ordering};

    static CALLS: AtomicUsize = AtomicUsize::new(0);

    fn count_call() {
        CALLS.fetch_add(1, Ordering::SeqCst);
    }

    fn other_hook() {}

    #[test]
    fn unregistered_notification_is_a_noop() {
        let flow = FlowControl::new();
        assert!(!flow.is_registered());
        flow.on_receive_buffer_freed();
    }

    #[test]
    fn hook_registers_once_and_fires_per_notification() {
        let flow = FlowControl::new();
        assert_eq!(flow.register(count_call), Ok(()));
        assert_eq!(
            flow.register(other_hook),
            Err(CpcError::HookAlreadyRegistered)
        );
        let before = CALLS.load(Ordering::SeqCst);
        flow.on_receive_buffer_freed();
        flow.on_receive_buffer_freed();
        assert_eq!(CALLS.load(Ordering::SeqCst), before + 2);
    }
}
