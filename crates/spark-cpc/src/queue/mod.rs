//! 接收与发送队列。
//!
//! # 模块定位（Why）
//! - 队列项是比帧句柄更轻的节点：接收路径上它只携带负载与长度，
//!   句柄与头部在入队时即可归还，长时间排队的数据不会占住句柄池；
//! - 发送路径上它持有帧的一份共享引用，数据帧与监督帧各用一个池，
//!   监督帧（确认、复位）不会被积压的数据帧饿死。
//!
//! # 核心机制（How）
//! - 节点存放在各自池的槽位中，以分离的 [`BlockId`] 串成单向链表，
//!   队列本身只保存头、尾与长度，整个结构无需堆；
//! - 链表状态放在临界区单元中，入队与出队各是一次 O(1) 的临界区，
//!   任务与中断可以同时操作同一队列。

mod rx;
mod tx;

use crate::pool::{BlockId, BlockPool, Zeroed};

pub use self::rx::{RxItem, RxQueue, RxQueueEntry, RxQueueItem};
pub use self::tx::{
    DataTxQueue, SupervisoryTxQueue, SupervisoryTxQueueItem, TxClass, TxItem, TxQueue,
    TxQueueEntry, TxQueueItem,
};

/// 可串入 [`LinkedFifo`] 的节点。
pub(crate) trait Linked: Zeroed {
    fn next(&self) -> Option<BlockId>;
    fn set_next(&mut self, next: Option<BlockId>);
}

/// 以池槽位为存储的先进先出链表。
pub(crate) struct LinkedFifo {
    head: Option<BlockId>,
    tail: Option<BlockId>,
    len: usize,
}

impl LinkedFifo {
    pub(crate) const fn new() -> Self {
        Self {
            head: None,
            tail: None,
            len: 0,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    /// 追加一个处于分离状态的节点。
    pub(crate) fn push_back<T: Linked, const N: usize>(
        &mut self,
        pool: &BlockPool<T, N>,
        id: BlockId,
    ) {
        if let Some(slot) = pool.slot(id) {
            slot.with(|node| node.set_next(None));
        }
        match self.tail {
            Some(tail) => {
                if let Some(slot) = pool.slot(tail) {
                    slot.with(|node| node.set_next(Some(id)));
                }
            }
            None => self.head = Some(id),
        }
        self.tail = Some(id);
        self.len += 1;
    }

    /// 摘下队首节点，节点仍处于分离状态，由调用方恢复所有权。
    pub(crate) fn pop_front<T: Linked, const N: usize>(
        &mut self,
        pool: &BlockPool<T, N>,
    ) -> Option<BlockId> {
        let head = self.head?;
        let next = pool.slot(head).and_then(|slot| {
            slot.with(|node| {
                let next = node.next();
                node.set_next(None);
                next
            })
        });
        self.head = next;
        if next.is_none() {
            self.tail = None;
        }
        self.len -= 1;
        Some(head)
    }
}
