//! 编译期容量常量与运行期池限额配置。
//!
//! # 模块定位（Why）
//! - 固件侧的池容量必须在编译期确定，`BlockPool` 的槽位数组直接以这些常量为长度，
//!   保证链接后内存占用可静态审计；
//! - 运行期的 [`CpcConfig`] 只允许在编译期上限之内**收紧**各池限额，
//!   便于同一固件在不同板型、或在测试中以更小的池复现耗尽路径。
//!
//! # 契约说明（What）
//! - 任何池的运行期限额均满足 `limit <= capacity`；[`CpcConfig::validate`] 负责拒绝越界配置；
//! - [`CpcConfig::DEFAULT`] 将每个池的限额设为其编译期容量。

use crate::{
    error::{CpcError, Result},
    pool::PoolKind,
};

/// HDLC 头部原始长度：flag、address、length(2)、control、HCS(2)。
pub const HDLC_HEADER_RAW_SIZE: usize = 7;

/// 帧校验序列（FCS）长度。
pub const HDLC_FCS_SIZE: usize = 2;

/// 拒绝帧负载长度，仅承载一个拒绝原因字节。
pub const HDLC_REJECT_PAYLOAD_SIZE: usize = 1;

/// 单个接收负载块的最大长度。
pub const RX_PAYLOAD_MAX_LENGTH: usize = 256;

/// 系统命令缓冲的块长度。
pub const SYSTEM_COMMAND_BUFFER_SIZE: usize = 64;

/// 数据帧发送队列项数量。
pub const TX_QUEUE_ITEM_MAX_COUNT: usize = 16;

/// 监督帧（S-frame）发送队列项数量，与数据帧隔离以免 ACK/REJECT 被数据积压饿死。
pub const TX_QUEUE_ITEM_SFRAME_MAX_COUNT: usize = 8;

/// 接收负载块数量。
pub const RX_BUFFER_MAX_COUNT: usize = 16;

/// 帧句柄数量：每个在途的发送项、监督帧与接收块各需一个句柄。
pub const BUFFER_HANDLE_MAX_COUNT: usize =
    TX_QUEUE_ITEM_MAX_COUNT + TX_QUEUE_ITEM_SFRAME_MAX_COUNT + RX_BUFFER_MAX_COUNT;

/// HDLC 头部块数量，与句柄一一对应。
pub const HDLC_HEADER_MAX_COUNT: usize = BUFFER_HANDLE_MAX_COUNT;

/// 拒绝负载块数量。
pub const REJECT_BUFFER_MAX_COUNT: usize = 4;

/// 接收队列项数量；每个排队的接收负载占用一项。
pub const RX_QUEUE_ITEM_MAX_COUNT: usize = RX_BUFFER_MAX_COUNT;

/// 端点记录数量（含系统端点）。
pub const ENDPOINT_MAX_COUNT: usize = 8;

/// 端点关闭通知数量。
pub const ENDPOINT_CLOSED_NOTICE_MAX_COUNT: usize = ENDPOINT_MAX_COUNT;

/// 系统命令缓冲数量。
pub const SYSTEM_COMMAND_BUFFER_MAX_COUNT: usize = 4;

/// 各缓冲池的运行期限额。
///
/// # 设计背景（Why）
/// - 槽位存储在编译期固定，但集成方常需要在不重新编译的情况下压低某些池的可用量，
///   例如在压测中模拟接收块耗尽，或在低功耗板型上限制端点数；
/// - 限额只影响“可同时借出多少槽位”，不会改变存储布局。
///
/// # 契约说明（What）
/// - 每个字段的取值范围为 `0..=capacity(kind)`；
/// - 启用 `serde` Feature 后可从配置档案反序列化，缺省字段回退到 [`CpcConfig::DEFAULT`]。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Deserialize, serde::Serialize),
    serde(default, deny_unknown_fields)
)]
pub struct CpcConfig {
    pub frame_handles: usize,
    pub header_buffers: usize,
    pub reject_payloads: usize,
    pub rx_payloads: usize,
    pub endpoints: usize,
    pub rx_queue_items: usize,
    pub tx_queue_items: usize,
    pub supervisory_tx_queue_items: usize,
    pub endpoint_closed_notices: usize,
    pub system_commands: usize,
}

impl CpcConfig {
    /// 所有池均开放到编译期容量。
    pub const DEFAULT: Self = Self {
        frame_handles: BUFFER_HANDLE_MAX_COUNT,
        header_buffers: HDLC_HEADER_MAX_COUNT,
        reject_payloads: REJECT_BUFFER_MAX_COUNT,
        rx_payloads: RX_BUFFER_MAX_COUNT,
        endpoints: ENDPOINT_MAX_COUNT,
        rx_queue_items: RX_QUEUE_ITEM_MAX_COUNT,
        tx_queue_items: TX_QUEUE_ITEM_MAX_COUNT,
        supervisory_tx_queue_items: TX_QUEUE_ITEM_SFRAME_MAX_COUNT,
        endpoint_closed_notices: ENDPOINT_CLOSED_NOTICE_MAX_COUNT,
        system_commands: SYSTEM_COMMAND_BUFFER_MAX_COUNT,
    };

    /// 返回指定池的编译期容量。
    pub const fn capacity(kind: PoolKind) -> usize {
        match kind {
            PoolKind::FrameHandle => BUFFER_HANDLE_MAX_COUNT,
            PoolKind::HeaderBuffer => HDLC_HEADER_MAX_COUNT,
            PoolKind::RejectPayload => REJECT_BUFFER_MAX_COUNT,
            PoolKind::RxPayload => RX_BUFFER_MAX_COUNT,
            PoolKind::Endpoint => ENDPOINT_MAX_COUNT,
            PoolKind::RxQueueItem => RX_QUEUE_ITEM_MAX_COUNT,
            PoolKind::TxQueueItem => TX_QUEUE_ITEM_MAX_COUNT,
            PoolKind::SupervisoryTxQueueItem => TX_QUEUE_ITEM_SFRAME_MAX_COUNT,
            PoolKind::EndpointClosedNotice => ENDPOINT_CLOSED_NOTICE_MAX_COUNT,
            PoolKind::SystemCommand => SYSTEM_COMMAND_BUFFER_MAX_COUNT,
        }
    }

    /// 读取指定池的运行期限额。
    pub const fn limit(&self, kind: PoolKind) -> usize {
        match kind {
            PoolKind::FrameHandle => self.frame_handles,
            PoolKind::HeaderBuffer => self.header_buffers,
            PoolKind::RejectPayload => self.reject_payloads,
            PoolKind::RxPayload => self.rx_payloads,
            PoolKind::Endpoint => self.endpoints,
            PoolKind::RxQueueItem => self.rx_queue_items,
            PoolKind::TxQueueItem => self.tx_queue_items,
            PoolKind::SupervisoryTxQueueItem => self.supervisory_tx_queue_items,
            PoolKind::EndpointClosedNotice => self.endpoint_closed_notices,
            PoolKind::SystemCommand => self.system_commands,
        }
    }

    /// 以 Builder 风格覆盖单个池的限额。
    ///
    /// 该方法不做校验，越界值会在 [`validate`](Self::validate) 中被拒绝，
    /// 或在 `CpcBuffers::new` 中被截断到编译期容量。
    pub const fn with_limit(mut self, kind: PoolKind, limit: usize) -> Self {
        match kind {
            PoolKind::FrameHandle => self.frame_handles = limit,
            PoolKind::HeaderBuffer => self.header_buffers = limit,
            PoolKind::RejectPayload => self.reject_payloads = limit,
            PoolKind::RxPayload => self.rx_payloads = limit,
            PoolKind::Endpoint => self.endpoints = limit,
            PoolKind::RxQueueItem => self.rx_queue_items = limit,
            PoolKind::TxQueueItem => self.tx_queue_items = limit,
            PoolKind::SupervisoryTxQueueItem => self.supervisory_tx_queue_items = limit,
            PoolKind::EndpointClosedNotice => self.endpoint_closed_notices = limit,
            PoolKind::SystemCommand => self.system_commands = limit,
        }
        self
    }

    /// 校验所有限额均未超过编译期容量。
    ///
    /// # 契约说明（What）
    /// - **返回值**：全部合法时返回 `Ok(())`；否则返回首个越界池的
    ///   [`CpcError::InvalidConfig`]，携带请求值与上限；
    /// - **后置条件**：不修改配置本身。
    pub fn validate(&self) -> Result<()> {
        for kind in PoolKind::ALL {
            let requested = self.limit(kind);
            let max = Self::capacity(kind);
            if requested > max {
                return Err(CpcError::InvalidConfig {
                    pool: kind,
                    requested,
                    max,
                });
            }
        }
        Ok(())
    }
}

impl Default for CpcConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}
