use crate::{
    blocks::{RawRxBuffer, RejectBuffer},
    config::{HDLC_REJECT_PAYLOAD_SIZE, RX_PAYLOAD_MAX_LENGTH},
    error::Result,
    pool::BlockId,
    registry::CpcBuffers,
};

use super::FrameKind;

/// 帧或接收队列项独占的负载。
///
/// 变体即来源池，归还时总能回到正确的池；接收负载归还后会触发流控通知。
#[derive(Debug)]
pub enum Payload<'p> {
    Reject(RejectBuffer<'p>),
    Rx(RawRxBuffer<'p>),
}

impl<'p> Payload<'p> {
    /// 负载对应的缓冲类型标签。
    pub fn kind(&self) -> FrameKind {
        match self {
            Payload::Reject(_) => FrameKind::Reject,
            Payload::Rx(_) => FrameKind::RxData,
        }
    }

    /// 负载块长度。
    pub fn capacity(&self) -> usize {
        self.with(<[u8]>::len)
    }

    /// 只读访问负载字节。
    pub fn with<R>(&self, f: impl FnOnce(&[u8]) -> R) -> R {
        match self {
            Payload::Reject(block) => block.with(|bytes| f(bytes)),
            Payload::Rx(block) => block.with(|bytes| f(bytes)),
        }
    }

    /// 可写访问负载字节。
    pub fn with_mut<R>(&mut self, f: impl FnOnce(&mut [u8]) -> R) -> R {
        match self {
            Payload::Reject(block) => block.with_mut(|bytes| f(bytes)),
            Payload::Rx(block) => block.with_mut(|bytes| f(bytes)),
        }
    }

    /// 归还负载，等价于 `drop`。
    pub fn release(self) {
        drop(self);
    }

    /// 负载是否来自 `buffers` 的对应池。
    pub(crate) fn is_from(&self, buffers: &CpcBuffers) -> bool {
        match self {
            Payload::Reject(block) => block.is_from(&buffers.rejects),
            Payload::Rx(block) => block.is_from(&buffers.rx_payloads),
        }
    }

    pub(crate) fn detach(self) -> PayloadId {
        match self {
            Payload::Reject(block) => PayloadId::Reject(block.detach()),
            Payload::Rx(block) => PayloadId::Rx(block.detach()),
        }
    }
}

/// 分离状态的负载标识，由帧记录或接收队列项持有。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum PayloadId {
    Reject(BlockId),
    Rx(BlockId),
}

impl PayloadId {
    pub(crate) fn kind(&self) -> FrameKind {
        match self {
            PayloadId::Reject(_) => FrameKind::Reject,
            PayloadId::Rx(_) => FrameKind::RxData,
        }
    }

    pub(crate) fn capacity(self) -> usize {
        match self {
            PayloadId::Reject(_) => HDLC_REJECT_PAYLOAD_SIZE,
            PayloadId::Rx(_) => RX_PAYLOAD_MAX_LENGTH,
        }
    }

    pub(crate) fn reclaim(self, buffers: &CpcBuffers) -> Result<Payload<'_>> {
        match self {
            PayloadId::Reject(id) => buffers.rejects.reclaim(id).map(Payload::Reject),
            PayloadId::Rx(id) => buffers.rx_payloads.reclaim(id).map(Payload::Rx),
        }
    }

    pub(crate) fn release(self, buffers: &CpcBuffers) -> Result<()> {
        match self {
            PayloadId::Reject(id) => buffers.rejects.release_detached(id),
            PayloadId::Rx(id) => buffers.rx_payloads.release_detached(id),
        }
    }

    /// 访问仍然存活的负载槽位。
    pub(crate) fn with<R>(self, buffers: &CpcBuffers, f: impl FnOnce(&mut [u8]) -> R) -> Option<R> {
        match self {
            PayloadId::Reject(id) => buffers.rejects.with_live(id, |block| f(block)),
            PayloadId::Rx(id) => buffers.rx_payloads.with_live(id, |block| f(block)),
        }
    }
}
