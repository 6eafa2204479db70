//! 端点记录与端点关闭通知。
//!
//! 端点的协议状态机不在本 crate 范围内；这里只提供记录本身的借出/归还契约，
//! 以及帧句柄对端点的弱引用 [`EndpointRef`]。

use crate::{
    config::{ENDPOINT_CLOSED_NOTICE_MAX_COUNT, ENDPOINT_MAX_COUNT},
    pool::{BlockId, BlockLease, Zeroed},
};

/// 端点生命周期状态。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EndpointState {
    #[default]
    Freed,
    Open,
    Closing,
    Closed,
    ErrorDestinationUnreachable,
    ErrorFault,
}

/// 单个逻辑通道的记录。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EndpointRecord {
    pub id: u8,
    pub state: EndpointState,
    pub flags: u8,
}

impl Zeroed for EndpointRecord {
    const ZEROED: Self = Self {
        id: 0,
        state: EndpointState::Freed,
        flags: 0,
    };
}

/// 端点关闭通知，交由上层在任务上下文中完成清理。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EndpointClosedRecord {
    pub endpoint_id: u8,
}

impl Zeroed for EndpointClosedRecord {
    const ZEROED: Self = Self { endpoint_id: 0 };
}

/// 端点记录租约。
pub type EndpointHandle<'p> = BlockLease<'p, EndpointRecord, ENDPOINT_MAX_COUNT>;

/// 端点关闭通知租约。
pub type EndpointClosedNotice<'p> =
    BlockLease<'p, EndpointClosedRecord, ENDPOINT_CLOSED_NOTICE_MAX_COUNT>;

/// 指向端点记录的弱引用。
///
/// 不持有所有权；端点被释放后，经 `CpcBuffers::with_endpoint` 的访问返回 `None`，
/// 即便槽位已被新的端点复用也不会误读。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct EndpointRef(BlockId);

impl EndpointRef {
    pub(crate) fn id(&self) -> BlockId {
        self.0
    }
}

impl EndpointHandle<'_> {
    /// 生成弱引用。
    pub fn downgrade(&self) -> EndpointRef {
        EndpointRef(self.id())
    }
}
