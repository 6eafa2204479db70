use core::fmt;

use crate::{
    config::RX_QUEUE_ITEM_MAX_COUNT,
    frame::{FrameKind, Payload, PayloadId},
    pool::{BlockId, BlockLease, Zeroed},
    registry::CpcBuffers,
    sync::CriticalCell,
};

use super::{Linked, LinkedFifo};

/// 接收队列项槽位：负载标识、类型标签与有效长度。
pub struct RxQueueEntry {
    payload: Option<PayloadId>,
    kind: FrameKind,
    length: u16,
    next: Option<BlockId>,
}

impl Zeroed for RxQueueEntry {
    const ZEROED: Self = Self {
        payload: None,
        kind: FrameKind::Unknown,
        length: 0,
        next: None,
    };
}

impl RxQueueEntry {
    /// 负载来源。
    pub fn kind(&self) -> FrameKind {
        self.kind
    }

    pub fn length(&self) -> u16 {
        self.length
    }
}

impl Linked for RxQueueEntry {
    fn next(&self) -> Option<BlockId> {
        self.next
    }

    fn set_next(&mut self, next: Option<BlockId>) {
        self.next = next;
    }
}

/// 接收队列项租约。
pub type RxQueueItem<'p> = BlockLease<'p, RxQueueEntry, RX_QUEUE_ITEM_MAX_COUNT>;

/// 交给消费任务的接收队列。
///
/// # 契约说明（What）
/// - 入队只能经由 [`CpcBuffers::enqueue_received`]，那里完成负载所有权的转移；
/// - [`pop`](Self::pop) 取出的 [`RxItem`] 独占其负载；
/// - 队列被丢弃时，残留的队列项连同负载一并归还。
pub struct RxQueue<'p> {
    buffers: &'p CpcBuffers,
    list: CriticalCell<LinkedFifo>,
}

impl<'p> RxQueue<'p> {
    /// 创建绑定到 `buffers` 的空队列。
    pub const fn new(buffers: &'p CpcBuffers) -> Self {
        Self {
            buffers,
            list: CriticalCell::new(LinkedFifo::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.list.with(|list| list.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn buffers(&self) -> &'p CpcBuffers {
        self.buffers
    }

    /// 填好内容的队列项挂到队尾。
    pub(crate) fn push(&self, item: RxQueueItem<'p>) {
        let id = item.detach();
        self.list.with(|list| list.push_back(&self.buffers.rx_items, id));
    }

    /// 取出队首项。
    pub fn pop(&self) -> Option<RxItem<'p>> {
        loop {
            let id = self.list.with(|list| list.pop_front(&self.buffers.rx_items))?;
            let Ok(mut item) = self.buffers.rx_items.reclaim(id) else {
                continue;
            };
            let (payload, length) = item.with_mut(|entry| (entry.payload.take(), entry.length));
            let Some(payload) = payload.and_then(|id| id.reclaim(self.buffers).ok()) else {
                continue;
            };
            return Some(RxItem {
                payload,
                length,
                item,
            });
        }
    }
}

impl Drop for RxQueue<'_> {
    fn drop(&mut self) {
        while let Some(item) = self.pop() {
            drop(item);
        }
    }
}

impl fmt::Debug for RxQueue<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RxQueue").field("len", &self.len()).finish()
    }
}

/// 从接收队列取出的项，独占负载。
///
/// 丢弃时先按负载来源归还负载（接收负载触发流控通知），再归还队列项槽位。
#[derive(Debug)]
pub struct RxItem<'p> {
    payload: Payload<'p>,
    length: u16,
    item: RxQueueItem<'p>,
}

impl<'p> RxItem<'p> {
    /// 负载来源。
    pub fn kind(&self) -> FrameKind {
        self.payload.kind()
    }

    /// 负载中有效数据的长度。
    pub fn length(&self) -> u16 {
        self.length
    }

    pub fn payload(&self) -> &Payload<'p> {
        &self.payload
    }

    pub fn payload_mut(&mut self) -> &mut Payload<'p> {
        &mut self.payload
    }

    /// 拆出负载与长度，队列项槽位随即归还。
    pub fn dequeue_owned(self) -> (Payload<'p>, u16) {
        let Self {
            payload,
            length,
            item,
        } = self;
        drop(item);
        (payload, length)
    }

    /// 填写入队内容，供转换路径使用。
    pub(crate) fn fill(item: &mut RxQueueItem<'p>, payload: PayloadId, length: u16) {
        item.with_mut(|entry| {
            entry.kind = payload.kind();
            entry.payload = Some(payload);
            entry.length = length;
            entry.next = None;
        });
    }
}
