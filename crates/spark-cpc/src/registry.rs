//! 缓冲注册表：每个缓冲类别一个池，外加组合借出与所有权转换入口。
//!
//! # 设计背景（Why）
//! - 固件中所有池都是进程级单例，生命周期覆盖整个运行期；
//!   [`CpcBuffers::new`] 是 `const fn`，既可以放进 `static`，也可以在测试里按需构造独立实例；
//! - 组合借出（句柄 + 头部 + 负载）必须是全有或全无，中途任一步耗尽都要完整回滚。
//!
//! # 核心机制（How）
//! - 组合过程以 [`FrameBuilder`] 承载：已借出的块都由构建器独占，
//!   失败时 `?` 提前返回，构建器离开作用域即归还全部已借出块，无需手工回滚分支；
//! - 接收负载池注册流控钩子，任何路径上的接收负载归还都会触发通知。
//!
//! # 契约说明（What）
//! - 所有借出函数在耗尽时立即返回 [`CpcError::Exhausted`]，不阻塞、不重试；
//! - 释放函数取走所有权，重复释放在类型层面不可表达；
//!   经裸标识的释放路径会以 [`CpcError::StaleBlock`] 拒绝重复或过期标识。

use core::fmt;

use crate::{
    blocks::{
        HeaderBlock, HeaderBuffer, RawRxBuffer, RejectBlock, RxPayloadBlock, SystemCommandBlock,
        SystemCommandBuffer,
    },
    config::{
        BUFFER_HANDLE_MAX_COUNT, CpcConfig, ENDPOINT_CLOSED_NOTICE_MAX_COUNT, ENDPOINT_MAX_COUNT,
        HDLC_HEADER_MAX_COUNT, HDLC_REJECT_PAYLOAD_SIZE, REJECT_BUFFER_MAX_COUNT,
        RX_BUFFER_MAX_COUNT, RX_QUEUE_ITEM_MAX_COUNT, SYSTEM_COMMAND_BUFFER_MAX_COUNT,
        TX_QUEUE_ITEM_MAX_COUNT, TX_QUEUE_ITEM_SFRAME_MAX_COUNT,
    },
    driver::RxBufferMode,
    endpoint::{
        EndpointClosedNotice, EndpointClosedRecord, EndpointHandle, EndpointRecord, EndpointRef,
    },
    error::{CpcError, Result},
    flow_control::FlowControlHook,
    frame::{Frame, FrameBuilder, FrameKind, FrameRecord, Payload},
    pool::{BlockId, BlockPool, PoolKind, PoolStats},
    queue::{
        DataTxQueue, RxItem, RxQueue, RxQueueEntry, RxQueueItem, SupervisoryTxQueue,
        SupervisoryTxQueueItem, TxClass, TxQueue, TxQueueEntry, TxQueueItem,
    },
};

/// `CpcBuffers` 汇总链路核心的全部定长池。
///
/// # 教案式说明
/// - **意图 (Why)**：为帧句柄、头部、拒绝负载、接收负载、端点、队列项、
///   端点关闭通知与系统命令各提供一个隔离的池，控制面流量不会被数据面饿死；
/// - **契约 (What)**：各池容量由 [`crate::config`] 中的常量在编译期固定，
///   运行期限额来自 [`CpcConfig`]；
/// - **风险 (Trade-offs)**：全部池静态占用内存，即便从未使用也不会回收给系统。
pub struct CpcBuffers {
    config: CpcConfig,
    pub(crate) handles: BlockPool<FrameRecord, BUFFER_HANDLE_MAX_COUNT>,
    pub(crate) headers: BlockPool<HeaderBlock, HDLC_HEADER_MAX_COUNT>,
    pub(crate) rejects: BlockPool<RejectBlock, REJECT_BUFFER_MAX_COUNT>,
    pub(crate) rx_payloads: BlockPool<RxPayloadBlock, RX_BUFFER_MAX_COUNT>,
    endpoints: BlockPool<EndpointRecord, ENDPOINT_MAX_COUNT>,
    pub(crate) rx_items: BlockPool<RxQueueEntry, RX_QUEUE_ITEM_MAX_COUNT>,
    tx_items: BlockPool<TxQueueEntry, TX_QUEUE_ITEM_MAX_COUNT>,
    supervisory_tx_items: BlockPool<TxQueueEntry, TX_QUEUE_ITEM_SFRAME_MAX_COUNT>,
    closed_notices: BlockPool<EndpointClosedRecord, ENDPOINT_CLOSED_NOTICE_MAX_COUNT>,
    system_commands: BlockPool<SystemCommandBlock, SYSTEM_COMMAND_BUFFER_MAX_COUNT>,
}

impl CpcBuffers {
    /// 按配置构造全部池；超出编译期容量的限额被截断。
    pub const fn new(config: CpcConfig) -> Self {
        Self {
            handles: BlockPool::new(PoolKind::FrameHandle, config.frame_handles),
            headers: BlockPool::new(PoolKind::HeaderBuffer, config.header_buffers),
            rejects: BlockPool::new(PoolKind::RejectPayload, config.reject_payloads),
            rx_payloads: BlockPool::new(PoolKind::RxPayload, config.rx_payloads),
            endpoints: BlockPool::new(PoolKind::Endpoint, config.endpoints),
            rx_items: BlockPool::new(PoolKind::RxQueueItem, config.rx_queue_items),
            tx_items: BlockPool::new(PoolKind::TxQueueItem, config.tx_queue_items),
            supervisory_tx_items: BlockPool::new(
                PoolKind::SupervisoryTxQueueItem,
                config.supervisory_tx_queue_items,
            ),
            closed_notices: BlockPool::new(
                PoolKind::EndpointClosedNotice,
                config.endpoint_closed_notices,
            ),
            system_commands: BlockPool::new(PoolKind::SystemCommand, config.system_commands),
            config,
        }
    }

    /// 校验配置后构造。
    pub fn try_new(config: CpcConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::new(config))
    }

    /// 构造时使用的配置。
    pub fn config(&self) -> &CpcConfig {
        &self.config
    }

    /// 借出一个零初始化的帧句柄，进入组装阶段。
    pub fn acquire_handle(&self) -> Result<FrameBuilder<'_>> {
        let record = self.handles.acquire()?;
        Ok(FrameBuilder::new(self, record))
    }

    /// 借出一个 HDLC 头部块。
    pub fn acquire_header_buffer(&self) -> Result<HeaderBuffer<'_>> {
        self.headers.acquire()
    }

    /// 借出一个携带 1 字节拒绝负载的帧。
    ///
    /// 负载池耗尽时已借出的句柄随构建器一同归还，错误原样上抛。
    pub fn acquire_reject_handle(&self) -> Result<Frame<'_>> {
        let builder = self.acquire_handle()?;
        let payload = self.rejects.acquire()?;
        let mut builder = builder.with_payload(Payload::Reject(payload));
        builder.meta_mut().data_length = HDLC_REJECT_PAYLOAD_SIZE as u16;
        Ok(builder.finish())
    }

    /// 组装一个接收帧：句柄 + 头部，`Pooled` 模式下另加一块接收负载。
    ///
    /// # 契约说明（What）
    /// - **返回值**：成功时帧标记为 [`FrameKind::RxData`]；
    ///   `Raw` 模式下帧不带负载，由驱动稍后通过 [`Frame::attach_raw_payload`] 挂载；
    /// - **后置条件**：任一步耗尽都会归还本次已借出的全部块，各池占用与调用前一致。
    pub fn acquire_receive_handle(&self, mode: RxBufferMode) -> Result<Frame<'_>> {
        let builder = self
            .acquire_handle()?
            .with_kind(FrameKind::RxData)
            .with_header(self.acquire_header_buffer()?);
        let builder = match mode {
            RxBufferMode::Pooled => builder.with_payload(Payload::Rx(self.rx_payloads.acquire()?)),
            RxBufferMode::Raw => builder,
        };
        Ok(builder.finish())
    }

    /// 绕过帧句柄，直接借出一块接收负载（驱动自管模式）。
    pub fn acquire_raw_receive_buffer(&self) -> Result<RawRxBuffer<'_>> {
        self.rx_payloads.acquire()
    }

    /// 归还驱动自管的接收负载；触发流控通知。
    pub fn release_raw_receive_buffer(&self, buffer: RawRxBuffer<'_>) {
        drop(buffer);
    }

    /// 按分离标识归还驱动自管的接收负载（例如从 DMA 描述符中取回的标识）。
    ///
    /// 标识过期或已被归还时返回 [`CpcError::StaleBlock`]，不触发流控通知。
    pub fn release_raw_receive_buffer_id(&self, id: BlockId) -> Result<()> {
        self.rx_payloads.release_detached(id)
    }

    /// 由分离标识恢复驱动自管的接收负载租约。
    pub fn reclaim_raw_receive_buffer(&self, id: BlockId) -> Result<RawRxBuffer<'_>> {
        self.rx_payloads.reclaim(id)
    }

    pub fn acquire_endpoint(&self) -> Result<EndpointHandle<'_>> {
        self.endpoints.acquire()
    }

    pub fn acquire_receive_queue_item(&self) -> Result<RxQueueItem<'_>> {
        self.rx_items.acquire()
    }

    pub fn acquire_transmit_queue_item(&self) -> Result<TxQueueItem<'_>> {
        self.tx_items.acquire()
    }

    pub fn acquire_supervisory_transmit_queue_item(&self) -> Result<SupervisoryTxQueueItem<'_>> {
        self.supervisory_tx_items.acquire()
    }

    pub fn acquire_endpoint_closed_notice(&self) -> Result<EndpointClosedNotice<'_>> {
        self.closed_notices.acquire()
    }

    pub fn acquire_system_command_buffer(&self) -> Result<SystemCommandBuffer<'_>> {
        self.system_commands.acquire()
    }

    /// 安全标签缓冲未实现，总是返回 [`CpcError::Unsupported`]。
    pub fn acquire_security_tag_buffer(&self) -> Result<()> {
        Err(CpcError::Unsupported {
            feature: "security",
        })
    }

    /// 释放帧句柄。
    ///
    /// 仍有其他持有者时返回 [`CpcError::Busy`] 并交还帧，所有块保持原状；
    /// 接收数据帧的负载归还后流控钩子恰好触发一次。
    pub fn release_handle<'p>(&self, frame: Frame<'p>) -> Result<(), (CpcError, Frame<'p>)> {
        frame.try_release()
    }

    pub fn release_header_buffer(&self, header: HeaderBuffer<'_>) {
        drop(header);
    }

    pub fn release_endpoint(&self, endpoint: EndpointHandle<'_>) {
        drop(endpoint);
    }

    pub fn release_receive_queue_item(&self, item: RxQueueItem<'_>) {
        drop(item);
    }

    pub fn release_transmit_queue_item(&self, item: TxQueueItem<'_>) {
        drop(item);
    }

    pub fn release_supervisory_transmit_queue_item(&self, item: SupervisoryTxQueueItem<'_>) {
        drop(item);
    }

    pub fn release_endpoint_closed_notice(&self, notice: EndpointClosedNotice<'_>) {
        drop(notice);
    }

    pub fn release_system_command_buffer(&self, buffer: SystemCommandBuffer<'_>) {
        drop(buffer);
    }

    /// 把接收帧转换为接收队列项并挂到队尾。
    ///
    /// # 契约说明（What）
    /// - **前置条件**：帧带有负载，`length` 不超过负载块容量，且帧与队列均属于本注册表；
    /// - **后置条件**：负载的所有权转入队列项，帧不再引用它；
    ///   头部立即归还，帧句柄在最后一个持有者离开时归还；
    /// - **失败**：队列项池耗尽或前置条件不满足时，帧原样交还，状态不变。
    pub fn enqueue_received<'p>(
        &'p self,
        frame: Frame<'p>,
        queue: &RxQueue<'p>,
        length: u16,
    ) -> Result<(), (CpcError, Frame<'p>)> {
        if !core::ptr::eq(frame.buffers(), self) || !core::ptr::eq(queue.buffers(), self) {
            return Err((CpcError::ForeignRegistry, frame));
        }
        let Some(capacity) = frame.payload_capacity() else {
            return Err((CpcError::PayloadMissing, frame));
        };
        if usize::from(length) > capacity {
            return Err((
                CpcError::LengthOutOfRange {
                    length: usize::from(length),
                    capacity,
                },
                frame,
            ));
        }
        let mut item = match self.rx_items.acquire() {
            Ok(item) => item,
            Err(error) => return Err((error, frame)),
        };
        let Some(payload) = frame.take_payload() else {
            return Err((CpcError::PayloadMissing, frame));
        };
        RxItem::fill(&mut item, payload, length);
        if let Some(header) = frame.take_header() {
            let _ = self.headers.release_detached(header);
        }
        queue.push(item);
        drop(frame);
        Ok(())
    }

    /// 消费者取走负载与长度，队列项槽位随即归还；负载此后由调用方负责归还。
    pub fn dequeue_owned<'p>(&self, item: RxItem<'p>) -> (Payload<'p>, u16) {
        item.dequeue_owned()
    }

    /// 丢弃队列项：先按来源归还负载，再归还队列项槽位；`None` 时为空操作。
    pub fn drop_item(&self, item: Option<RxItem<'_>>) {
        drop(item);
    }

    /// 访问仍然存活的端点记录；端点已释放时返回 `None`。
    pub fn with_endpoint<R>(
        &self,
        endpoint: EndpointRef,
        f: impl FnOnce(&mut EndpointRecord) -> R,
    ) -> Option<R> {
        self.endpoints.with_live(endpoint.id(), f)
    }

    /// 注册接收负载归还时的流控钩子，只能注册一次。
    pub fn register_flow_control_hook(&self, hook: FlowControlHook) -> Result<()> {
        self.rx_payloads.flow_control().register(hook)?;
        tracing::debug!(pool = PoolKind::RxPayload.as_str(), "flow-control hook registered");
        Ok(())
    }

    /// 创建绑定到本注册表的接收队列。
    pub fn receive_queue(&self) -> RxQueue<'_> {
        RxQueue::new(self)
    }

    /// 创建数据帧发送队列。
    pub fn transmit_queue(&self) -> DataTxQueue<'_> {
        TxQueue::new(self, &self.tx_items, TxClass::Data)
    }

    /// 创建监督帧发送队列。
    pub fn supervisory_transmit_queue(&self) -> SupervisoryTxQueue<'_> {
        TxQueue::new(self, &self.supervisory_tx_items, TxClass::Supervisory)
    }

    /// 单个池的诊断快照。
    pub fn pool_stats(&self, kind: PoolKind) -> PoolStats {
        match kind {
            PoolKind::FrameHandle => self.handles.stats(),
            PoolKind::HeaderBuffer => self.headers.stats(),
            PoolKind::RejectPayload => self.rejects.stats(),
            PoolKind::RxPayload => self.rx_payloads.stats(),
            PoolKind::Endpoint => self.endpoints.stats(),
            PoolKind::RxQueueItem => self.rx_items.stats(),
            PoolKind::TxQueueItem => self.tx_items.stats(),
            PoolKind::SupervisoryTxQueueItem => self.supervisory_tx_items.stats(),
            PoolKind::EndpointClosedNotice => self.closed_notices.stats(),
            PoolKind::SystemCommand => self.system_commands.stats(),
        }
    }

    /// 全部池的诊断快照，顺序同 [`PoolKind::ALL`]。
    pub fn statistics(&self) -> [PoolStats; PoolKind::COUNT] {
        PoolKind::ALL.map(|kind| self.pool_stats(kind))
    }

    /// 单个池当前借出数量。
    pub fn in_use(&self, kind: PoolKind) -> usize {
        self.pool_stats(kind).in_use
    }
}

impl Default for CpcBuffers {
    fn default() -> Self {
        Self::new(CpcConfig::DEFAULT)
    }
}

impl fmt::Debug for CpcBuffers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for kind in PoolKind::ALL {
            map.entry(&kind.as_str(), &self.in_use(kind));
        }
        map.finish()
    }
}
