//! 帧句柄：一帧在收发路径上的在途表示。
//!
//! # 模块定位（Why）
//! - 一帧由句柄槽位、可选的 HDLC 头部块、可选的负载块以及协议元数据组成；
//!   组装中的帧与组装完成的帧是两种类型：[`FrameBuilder`] 与 [`Frame`]；
//! - 组装完成的帧可被多个持有者共享（例如发送队列与重传窗口），
//!   最后一个持有者离开时才真正归还各块，“仍被占用”因而无法导致泄漏或重复释放。
//!
//! # 核心机制（How）
//! - 帧记录 `FrameRecord` 存放在句柄池的槽位中，头部与负载以分离标识的形式记录其内；
//! - `Frame` 的 `Clone` 与 `Drop` 在临界区内增减持有者计数，计数归零的那一次 `Drop`
//!   依次归还头部、句柄槽位与负载；负载最后归还，流控通知因此发生在所有块回池之后。
//!
//! # 契约说明（What）
//! - 元数据闭包作用于副本，执行期间不占用帧记录，中断可以照常共享或释放同一帧；
//! - 字节闭包在临界区内执行；嵌套访问同一块时返回 `None`；
//! - 负载一旦被转移进接收队列项，帧便不再引用它。

mod builder;
mod payload;

use core::fmt;

use crate::{
    blocks::{HeaderBuffer, RawRxBuffer},
    config::{BUFFER_HANDLE_MAX_COUNT, HDLC_FCS_SIZE},
    endpoint::EndpointRef,
    error::CpcError,
    pool::{BlockId, BlockLease, Zeroed},
    registry::CpcBuffers,
    sync::CriticalCell,
};

pub use self::builder::FrameBuilder;
pub use self::payload::Payload;
pub(crate) use self::payload::PayloadId;

/// 缓冲类型标签，决定负载归还到哪个池以及是否触发流控通知。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FrameKind {
    /// 负载不由本引擎管理（例如发送路径上的用户数据）。
    #[default]
    Unknown,
    /// 拒绝帧，负载为一个拒绝原因字节。
    Reject,
    /// 接收数据帧，负载来自接收负载池。
    RxData,
}

/// 拒绝帧携带的原因码。
#[repr(u8)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RejectReason {
    #[default]
    NoError = 0,
    ChecksumMismatch = 1,
    SequenceMismatch = 2,
    OutOfMemory = 3,
    SecurityIssue = 4,
    UnreachableEndpoint = 5,
    Error = 6,
}

/// 帧的协议元数据，由当前持有帧的层读写。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameMeta {
    /// 所属端点的弱引用。
    pub endpoint: Option<EndpointRef>,
    pub fcs: [u8; HDLC_FCS_SIZE],
    pub control: u8,
    pub address: u8,
    /// 调用方附带的不透明参数。
    pub arg: usize,
    pub reject_reason: RejectReason,
    /// 负载中有效数据的长度。
    pub data_length: u16,
}

impl Zeroed for FrameMeta {
    const ZEROED: Self = Self {
        endpoint: None,
        fcs: [0; HDLC_FCS_SIZE],
        control: 0,
        address: 0,
        arg: 0,
        reject_reason: RejectReason::NoError,
        data_length: 0,
    };
}

impl Default for FrameMeta {
    fn default() -> Self {
        Self::ZEROED
    }
}

/// 句柄池槽位中的帧记录。
pub(crate) struct FrameRecord {
    meta: FrameMeta,
    kind: FrameKind,
    header: Option<BlockId>,
    payload: Option<PayloadId>,
    owners: usize,
}

impl Zeroed for FrameRecord {
    const ZEROED: Self = Self {
        meta: FrameMeta::ZEROED,
        kind: FrameKind::Unknown,
        header: None,
        payload: None,
        owners: 0,
    };
}

pub(crate) type FrameLease<'p> = BlockLease<'p, FrameRecord, BUFFER_HANDLE_MAX_COUNT>;

/// 组装完成、可共享的帧句柄。
///
/// # 教案式说明
/// - **意图 (Why)**：以共享所有权替代手工引用计数，最后一个持有者负责回收；
/// - **契约 (What)**：`clone` 增加一个持有者；`drop` 减少一个，归零时按
///   头部 → 句柄槽位 → 负载的顺序归还，接收负载归还后触发一次流控通知；
///   [`try_release`](Self::try_release) 在仍有其他持有者时原样交还帧并报告 busy；
/// - **风险 (Trade-offs)**：[`update_meta`](Self::update_meta) 先取副本再整体写回，
///   多个持有者并发修改元数据时以最后一次写回为准。
pub struct Frame<'p> {
    buffers: &'p CpcBuffers,
    id: BlockId,
    record: &'p CriticalCell<FrameRecord>,
}

impl<'p> Frame<'p> {
    pub(crate) fn from_lease(buffers: &'p CpcBuffers, lease: FrameLease<'p>) -> Self {
        let record = lease.slot_ref();
        let id = lease.detach();
        Self {
            buffers,
            id,
            record,
        }
    }

    /// 句柄槽位标识。
    pub fn id(&self) -> BlockId {
        self.id
    }

    /// 缓冲类型标签。
    pub fn kind(&self) -> FrameKind {
        self.record.with(|record| record.kind)
    }

    /// 当前持有者总数（含自身）。
    pub fn owners(&self) -> usize {
        self.record.with(|record| record.owners)
    }

    /// 除自身之外的持有者数量。
    pub fn ref_count(&self) -> usize {
        self.owners().saturating_sub(1)
    }

    /// 只读访问元数据的副本。
    pub fn with_meta<R>(&self, f: impl FnOnce(&FrameMeta) -> R) -> R {
        let meta = self.record.with(|record| record.meta);
        f(&meta)
    }

    /// 修改元数据：闭包作用于副本，返回后整体写回。
    pub fn update_meta<R>(&self, f: impl FnOnce(&mut FrameMeta) -> R) -> R {
        let mut meta = self.record.with(|record| record.meta);
        let result = f(&mut meta);
        self.record.with(|record| record.meta = meta);
        result
    }

    /// 是否挂载了头部块。
    pub fn has_header(&self) -> bool {
        self.record.with(|record| record.header.is_some())
    }

    /// 是否挂载了负载块。
    pub fn has_payload(&self) -> bool {
        self.record.with(|record| record.payload.is_some())
    }

    /// 只读访问头部字节；未挂载头部时返回 `None`。
    pub fn with_header<R>(&self, f: impl FnOnce(&[u8]) -> R) -> Option<R> {
        self.with_header_mut(|bytes| f(bytes))
    }

    /// 可写访问头部字节。
    pub fn with_header_mut<R>(&self, f: impl FnOnce(&mut [u8]) -> R) -> Option<R> {
        critical_section::with(|_| {
            let id = self.record.with(|record| record.header)?;
            self.buffers.headers.with_live(id, |block| f(block))
        })
    }

    /// 只读访问负载字节；未挂载负载时返回 `None`。
    pub fn with_payload<R>(&self, f: impl FnOnce(&[u8]) -> R) -> Option<R> {
        self.with_payload_mut(|bytes| f(bytes))
    }

    /// 可写访问负载字节。
    pub fn with_payload_mut<R>(&self, f: impl FnOnce(&mut [u8]) -> R) -> Option<R> {
        critical_section::with(|_| {
            let payload = self.record.with(|record| record.payload)?;
            payload.with(self.buffers, f)
        })
    }

    /// 挂载头部块。
    ///
    /// 已有头部时原样交还 `header` 并返回 [`CpcError::HeaderOccupied`]；
    /// 头部来自其他注册表时返回 [`CpcError::ForeignRegistry`]。
    pub fn attach_header(
        &self,
        header: HeaderBuffer<'p>,
    ) -> Result<(), (CpcError, HeaderBuffer<'p>)> {
        if !header.is_from(&self.buffers.headers) {
            return Err((CpcError::ForeignRegistry, header));
        }
        let mut header = Some(header);
        self.record.with(|record| {
            if record.header.is_none() {
                record.header = header.take().map(HeaderBuffer::detach);
            }
        });
        match header {
            Some(header) => Err((CpcError::HeaderOccupied, header)),
            None => Ok(()),
        }
    }

    /// 挂载驱动自管的接收块（raw 模式）。
    ///
    /// # 契约说明（What）
    /// - **前置条件**：帧尚未挂载负载；
    /// - **返回值**：成功后帧标记为 [`FrameKind::RxData`]，负载随帧一同回收；
    ///   已有负载时原样交还 `buffer` 并返回 [`CpcError::PayloadOccupied`]；
    ///   接收块来自其他注册表时返回 [`CpcError::ForeignRegistry`]。
    pub fn attach_raw_payload(
        &self,
        buffer: RawRxBuffer<'p>,
    ) -> Result<(), (CpcError, RawRxBuffer<'p>)> {
        if !buffer.is_from(&self.buffers.rx_payloads) {
            return Err((CpcError::ForeignRegistry, buffer));
        }
        let mut buffer = Some(buffer);
        self.record.with(|record| {
            if record.payload.is_none() {
                record.payload = buffer.take().map(|buffer| PayloadId::Rx(buffer.detach()));
                record.kind = FrameKind::RxData;
            }
        });
        match buffer {
            Some(buffer) => Err((CpcError::PayloadOccupied, buffer)),
            None => Ok(()),
        }
    }

    /// 尝试立即释放帧。
    ///
    /// # 契约说明（What）
    /// - 若自身是唯一持有者，归还全部块并返回 `Ok(())`；
    /// - 否则不改变任何状态，返回 [`CpcError::Busy`] 并交还帧；
    ///   调用方可稍后重试，或直接 `drop` 让最后一个持有者完成回收。
    pub fn try_release(self) -> Result<(), (CpcError, Self)> {
        let owners = self.owners();
        if owners > 1 {
            tracing::trace!(slot = self.id.slot(), refs = owners - 1, "frame release deferred");
            return Err((CpcError::Busy { refs: owners - 1 }, self));
        }
        drop(self);
        Ok(())
    }

    pub(crate) fn buffers(&self) -> &'p CpcBuffers {
        self.buffers
    }

    /// 所挂负载块的容量；未挂载负载时返回 `None`。
    pub(crate) fn payload_capacity(&self) -> Option<usize> {
        self.record
            .with(|record| record.payload.map(PayloadId::capacity))
    }

    /// 取出负载标识，帧此后不再引用该负载。
    pub(crate) fn take_payload(&self) -> Option<PayloadId> {
        self.record.with(|record| record.payload.take())
    }

    /// 取出头部标识。
    pub(crate) fn take_header(&self) -> Option<BlockId> {
        self.record.with(|record| record.header.take())
    }

    /// 转为裸标识而不减少持有者计数，用于把一份持有权挂入队列。
    pub(crate) fn into_raw(self) -> BlockId {
        let id = self.id;
        core::mem::forget(self);
        id
    }

    /// 由 [`into_raw`](Self::into_raw) 得到的标识恢复一份持有权。
    pub(crate) fn from_raw(buffers: &'p CpcBuffers, id: BlockId) -> Option<Self> {
        if !buffers.handles.is_live(id) {
            return None;
        }
        let record = buffers.handles.slot(id)?;
        Some(Self {
            buffers,
            id,
            record,
        })
    }
}

impl Clone for Frame<'_> {
    fn clone(&self) -> Self {
        self.record.with(|record| record.owners += 1);
        Self {
            buffers: self.buffers,
            id: self.id,
            record: self.record,
        }
    }
}

impl Drop for Frame<'_> {
    fn drop(&mut self) {
        let last = self.record.with(|record| {
            record.owners = record.owners.saturating_sub(1);
            (record.owners == 0).then(|| (record.header.take(), record.payload.take()))
        });
        let Some((header, payload)) = last else {
            return;
        };
        if let Some(header) = header {
            let _ = self.buffers.headers.release_detached(header);
        }
        let _ = self.buffers.handles.release_detached(self.id);
        if let Some(payload) = payload {
            let _ = payload.release(self.buffers);
        }
    }
}

impl fmt::Debug for Frame<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (kind, owners, header, payload) = self.record.with(|record| {
            (
                record.kind,
                record.owners,
                record.header.is_some(),
                record.payload.map(|payload| payload.kind()),
            )
        });
        f.debug_struct("Frame")
            .field("id", &self.id)
            .field("kind", &kind)
            .field("owners", &owners)
            .field("header", &header)
            .field("payload", &payload)
            .finish()
    }
}
