//! 中断安全的内部可变单元。
//!
//! # 模块定位（Why）
//! - 池台账、帧记录与队列链表会同时被任务与中断处理函数修改；
//!   自旋锁在单核上一旦被中断抢占持有者就会永远等待，因此这里一律改用临界区；
//! - 临界区由 `critical-section` crate 提供：嵌入式目标上屏蔽中断，
//!   宿主机（`std` 特性）上退化为进程级互斥。
//!
//! # 契约说明（What）
//! - 每次访问都是一个独立的临界区，闭包内只做 O(1) 的簿记，不调用外部代码；
//! - 同一单元不得在闭包内嵌套访问；需要嵌套时使用 `try_*` 版本，冲突时返回 `None`。

use core::cell::RefCell;

use critical_section::Mutex;

pub(crate) struct CriticalCell<T> {
    inner: Mutex<RefCell<T>>,
}

impl<T> CriticalCell<T> {
    pub(crate) const fn new(value: T) -> Self {
        Self {
            inner: Mutex::new(RefCell::new(value)),
        }
    }

    /// 在临界区内独占访问内容。
    pub(crate) fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        critical_section::with(|cs| f(&mut self.inner.borrow_ref_mut(cs)))
    }

    /// 在临界区内只读访问内容。
    pub(crate) fn read<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        critical_section::with(|cs| f(&self.inner.borrow_ref(cs)))
    }

    /// 同 [`with`](Self::with)，内容已被借用时返回 `None`。
    pub(crate) fn try_with<R>(&self, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        critical_section::with(|cs| {
            let mut value = self.inner.borrow(cs).try_borrow_mut().ok()?;
            Some(f(&mut value))
        })
    }
}
