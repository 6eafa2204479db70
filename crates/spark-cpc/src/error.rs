//! # error 模块说明
//!
//! ## 角色定位（Why）
//! - 汇总缓冲引擎对外暴露的全部失败语义：资源耗尽、共享中（busy）、失效标识、参数误用与未实现特性；
//! - 每个变体都附带稳定错误码，便于协议层把耗尽映射为丢帧、把 busy 映射为延后释放。
//!
//! ## 设计要求（What）
//! - 使用 `thiserror` 派生，关闭 `std` 时依旧实现 `core::error::Error`；
//! - 错误类型为 `Copy`，可在中断上下文中返回而不触发任何分配；
//! - 引擎从不 panic、从不内部重试，重试策略完全交由调用方。

use thiserror::Error;

use crate::pool::PoolKind;

/// 本 crate 的结果类型别名。
pub type Result<T, E = CpcError> = core::result::Result<T, E>;

/// 稳定错误码，遵循 `<域>.<语义>` 命名。
pub mod codes {
    /// 池内无空闲槽位。
    pub const POOL_EXHAUSTED: &str = "cpc.pool.exhausted";
    /// 帧句柄仍被其他持有者引用。
    pub const FRAME_BUSY: &str = "cpc.frame.busy";
    /// 槽位标识已失效或已被释放。
    pub const BLOCK_STALE: &str = "cpc.block.stale";
    /// 帧已挂载负载，拒绝重复挂载。
    pub const PAYLOAD_OCCUPIED: &str = "cpc.frame.payload_occupied";
    /// 帧缺少必须的负载。
    pub const PAYLOAD_MISSING: &str = "cpc.frame.payload_missing";
    /// 声明的有效长度超出负载块容量。
    pub const LENGTH_OUT_OF_RANGE: &str = "cpc.frame.length_out_of_range";
    /// 帧已挂载头部，拒绝重复挂载。
    pub const HEADER_OCCUPIED: &str = "cpc.frame.header_occupied";
    /// 特性未实现。
    pub const UNSUPPORTED: &str = "cpc.feature.unsupported";
    /// 池限额超出编译期容量。
    pub const CONFIG_INVALID: &str = "cpc.config.invalid";
    /// 全局缓冲注册表重复初始化。
    pub const ALREADY_INITIALIZED: &str = "cpc.registry.already_initialized";
    /// 队列与帧来自不同的缓冲注册表。
    pub const FOREIGN_REGISTRY: &str = "cpc.registry.foreign";
    /// 流控钩子重复注册。
    pub const HOOK_REGISTERED: &str = "cpc.flow_control.already_registered";
}

/// 缓冲引擎错误域。
///
/// # 教案式说明
/// - **意图 (Why)**：区分“可通过背压恢复”的资源类错误与“调用方编程错误”，
///   让协议层可以按类别决定丢帧、延后或上报；
/// - **契约 (What)**：所有变体均为 `Copy + Send + Sync + 'static`；
///   [`is_retryable`](Self::is_retryable) 为 `true` 的变体不应被记为故障；
/// - **执行逻辑 (How)**：池与帧在检测到异常时直接构造对应变体返回，
///   不会在返回前留下任何部分分配。
#[derive(Clone, Copy, Debug, Eq, PartialEq, Error)]
pub enum CpcError {
    /// 池已耗尽，调用方应施加背压（拒帧、稍后重试或丢弃）。
    #[error("pool `{pool}` has no free slot")]
    Exhausted { pool: PoolKind },

    /// 帧仍被 `refs` 个其他持有者共享，最后一个持有者会完成释放。
    #[error("frame is still shared by {refs} other owner(s)")]
    Busy { refs: usize },

    /// 标识对应的槽位已被释放、已被重新借出，或从未处于分离状态。
    #[error("stale or already released block id in pool `{pool}`")]
    StaleBlock { pool: PoolKind },

    /// 帧已挂载负载。
    #[error("frame already carries a payload")]
    PayloadOccupied,

    /// 帧缺少负载，无法投递到接收队列。
    #[error("frame carries no payload")]
    PayloadMissing,

    /// 声明的有效长度超出负载块容量。
    #[error("length {length} exceeds payload capacity {capacity}")]
    LengthOutOfRange { length: usize, capacity: usize },

    /// 帧已挂载头部。
    #[error("frame already carries a header buffer")]
    HeaderOccupied,

    /// 特性在当前构建中未实现。
    #[error("`{feature}` buffers are not supported")]
    Unsupported { feature: &'static str },

    /// 池限额超过编译期容量。
    #[error("pool `{pool}` limit {requested} exceeds compile-time capacity {max}")]
    InvalidConfig {
        pool: PoolKind,
        requested: usize,
        max: usize,
    },

    /// 帧、队列或块不属于当前注册表。
    #[error("frame, queue or block belongs to another buffer registry")]
    ForeignRegistry,

    /// 全局注册表已初始化。
    #[error("global buffer registry is already initialized")]
    AlreadyInitialized,

    /// 流控钩子已注册。
    #[error("flow-control hook is already registered")]
    HookAlreadyRegistered,
}

impl CpcError {
    /// 返回稳定错误码。
    pub const fn code(&self) -> &'static str {
        match self {
            CpcError::Exhausted { .. } => codes::POOL_EXHAUSTED,
            CpcError::Busy { .. } => codes::FRAME_BUSY,
            CpcError::StaleBlock { .. } => codes::BLOCK_STALE,
            CpcError::PayloadOccupied => codes::PAYLOAD_OCCUPIED,
            CpcError::PayloadMissing => codes::PAYLOAD_MISSING,
            CpcError::LengthOutOfRange { .. } => codes::LENGTH_OUT_OF_RANGE,
            CpcError::HeaderOccupied => codes::HEADER_OCCUPIED,
            CpcError::Unsupported { .. } => codes::UNSUPPORTED,
            CpcError::InvalidConfig { .. } => codes::CONFIG_INVALID,
            CpcError::ForeignRegistry => codes::FOREIGN_REGISTRY,
            CpcError::AlreadyInitialized => codes::ALREADY_INITIALIZED,
            CpcError::HookAlreadyRegistered => codes::HOOK_REGISTERED,
        }
    }

    /// 是否属于可通过背压或等待自然恢复的瞬时状态。
    ///
    /// - 资源耗尽：释放任意同类槽位后即可恢复；
    /// - busy：最后一个持有者释放时自动完成回收；
    /// - 其余变体均表示调用方或集成配置存在缺陷，重试无意义。
    pub const fn is_retryable(&self) -> bool {
        matches!(self, CpcError::Exhausted { .. } | CpcError::Busy { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_follow_domain_convention() {
        let errors = [
            CpcError::Exhausted {
                pool: PoolKind::RxPayload,
            },
            CpcError::Busy { refs: 1 },
            CpcError::StaleBlock {
                pool: PoolKind::HeaderBuffer,
            },
            CpcError::PayloadOccupied,
            CpcError::PayloadMissing,
            CpcError::LengthOutOfRange {
                length: 300,
                capacity: 256,
            },
            CpcError::HeaderOccupied,
            CpcError::Unsupported {
                feature: "security",
            },
            CpcError::InvalidConfig {
                pool: PoolKind::Endpoint,
                requested: 9,
                max: 8,
            },
            CpcError::ForeignRegistry,
            CpcError::AlreadyInitialized,
            CpcError::HookAlreadyRegistered,
        ];
        for error in errors {
            assert!(error.code().starts_with("cpc."), "错误码需以 cpc. 开头");
        }
    }

    #[test]
    fn only_backpressure_errors_are_retryable() {
        assert!(
            CpcError::Exhausted {
                pool: PoolKind::TxQueueItem
            }
            .is_retryable()
        );
        assert!(CpcError::Busy { refs: 2 }.is_retryable());
        assert!(!CpcError::PayloadOccupied.is_retryable());
        assert!(
            !CpcError::StaleBlock {
                pool: PoolKind::RxPayload
            }
            .is_retryable()
        );
    }

    #[cfg(feature = "std")]
    #[test]
    fn display_names_the_pool() {
        let message = std::format!(
            "{}",
            CpcError::Exhausted {
                pool: PoolKind::RxPayload
            }
        );
        assert_eq!(message, "pool `rx_payload` has no free slot");
    }
}
