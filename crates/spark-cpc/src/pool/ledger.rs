use super::BlockId;

const NIL: usize = usize::MAX;

/// 槽位在台账中的归属状态。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum SlotState {
    /// 位于自由链表中。
    Free,
    /// 由某个 `BlockLease` 独占持有。
    Owned,
    /// 已通过 `BlockLease::detach` 转为裸标识，由帧记录、队列或驱动描述符持有。
    Detached,
}

#[derive(Clone, Copy, Debug)]
struct Entry {
    generation: u32,
    state: SlotState,
    next_free: usize,
}

impl Entry {
    const FREE: Self = Self {
        generation: 0,
        state: SlotState::Free,
        next_free: NIL,
    };
}

/// 台账拒绝操作的原因：标识越界、代数不符或状态不符。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct StaleId;

/// `Ledger` 维护单个池的自由链表、代数计数与借出数量。
///
/// - 自由链表以数组下标串联，借出与归还均为 O(1)；
/// - 每次归还都会递增该槽位的代数，使旧的 [`BlockId`] 立即失效；
/// - `limit` 为运行期限额，`in_use == limit` 时即视为耗尽，即便链表中仍有槽位。
pub(crate) struct Ledger<const N: usize> {
    entries: [Entry; N],
    free_head: usize,
    in_use: usize,
    limit: usize,
}

impl<const N: usize> Ledger<N> {
    pub(crate) const fn new(limit: usize) -> Self {
        let mut entries = [Entry::FREE; N];
        let mut index = 0;
        while index < N {
            entries[index].next_free = if index + 1 < N { index + 1 } else { NIL };
            index += 1;
        }
        Self {
            entries,
            free_head: if N == 0 { NIL } else { 0 },
            in_use: 0,
            limit: if limit > N { N } else { limit },
        }
    }

    pub(crate) fn in_use(&self) -> usize {
        self.in_use
    }

    pub(crate) fn limit(&self) -> usize {
        self.limit
    }

    /// 从自由链表头部取出一个槽位并标记为 `Owned`。
    pub(crate) fn take(&mut self) -> Option<BlockId> {
        if self.in_use >= self.limit || self.free_head == NIL {
            return None;
        }
        let index = self.free_head;
        let entry = &mut self.entries[index];
        self.free_head = entry.next_free;
        entry.next_free = NIL;
        entry.state = SlotState::Owned;
        self.in_use += 1;
        Some(BlockId::new(index as u32, entry.generation))
    }

    /// 将处于 `expected` 状态的槽位归还自由链表，并使该代数失效。
    pub(crate) fn give_back(&mut self, id: BlockId, expected: SlotState) -> Result<(), StaleId> {
        let index = self.check(id, expected)?;
        let entry = &mut self.entries[index];
        entry.state = SlotState::Free;
        entry.generation = entry.generation.wrapping_add(1);
        entry.next_free = self.free_head;
        self.free_head = index;
        self.in_use -= 1;
        Ok(())
    }

    /// 在 `from` 与 `to` 两种借出状态之间切换。
    pub(crate) fn transition(
        &mut self,
        id: BlockId,
        from: SlotState,
        to: SlotState,
    ) -> Result<(), StaleId> {
        let index = self.check(id, from)?;
        self.entries[index].state = to;
        Ok(())
    }

    /// 标识是否仍指向一个已借出的槽位。
    pub(crate) fn is_live(&self, id: BlockId) -> bool {
        self.entries
            .get(id.slot())
            .is_some_and(|entry| entry.generation == id.generation() && entry.state != SlotState::Free)
    }

    fn check(&self, id: BlockId, expected: SlotState) -> Result<usize, StaleId> {
        let index = id.slot();
        match self.entries.get(index) {
            Some(entry) if entry.generation == id.generation() && entry.state == expected => {
                Ok(index)
            }
            _ => Err(StaleId),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn take_respects_limit_before_capacity() {
        let mut ledger = Ledger::<4>::new(2);
        assert!(ledger.take().is_some());
        assert!(ledger.take().is_some());
        assert!(ledger.take().is_none(), "限额为 2 时第三次借出必须失败");
        assert_eq!(ledger.in_use(), 2);
    }

    #[test]
    fn limit_is_clamped_to_capacity() {
        let ledger = Ledger::<3>::new(10);
        assert_eq!(ledger.limit(), 3);
    }

    #[test]
    fn give_back_bumps_generation_and_rejects_repeat() {
        let mut ledger = Ledger::<2>::new(2);
        let id = ledger.take().expect("首次借出");
        assert_eq!(ledger.give_back(id, SlotState::Owned), Ok(()));
        assert_eq!(
            ledger.give_back(id, SlotState::Owned),
            Err(StaleId),
            "重复归还必须被代数校验拦截"
        );
        let again = ledger.take().expect("归还后可再次借出");
        assert_eq!(again.slot(), id.slot(), "自由链表为后进先出");
        assert_ne!(again.generation(), id.generation());
    }

    #[test]
    fn detached_slot_requires_matching_state() {
        let mut ledger = Ledger::<1>::new(1);
        let id = ledger.take().expect("借出");
        assert_eq!(
            ledger.transition(id, SlotState::Owned, SlotState::Detached),
            Ok(())
        );
        assert_eq!(ledger.give_back(id, SlotState::Owned), Err(StaleId));
        assert!(ledger.is_live(id));
        assert_eq!(ledger.give_back(id, SlotState::Detached), Ok(()));
        assert!(!ledger.is_live(id));
    }

    #[test]
    fn out_of_range_id_is_stale() {
        let mut ledger = Ledger::<1>::new(1);
        let bogus = BlockId::new(7, 0);
        assert_eq!(ledger.give_back(bogus, SlotState::Owned), Err(StaleId));
        assert!(!ledger.is_live(bogus));
    }
}
