//! `queue_contract` 集成测试：接收/发送队列与所有权转换。
//!
//! # 测试目标（Why）
//! - `enqueue_received` 是负载所有权唯一的转移点：成功后帧不再触碰负载，
//!   队列项独占负载，头部与句柄立即回池；
//! - 消费端可以取走负载（`dequeue_owned`）或整体丢弃（`drop_item`），两条路径都恰好归还一次；
//! - 发送队列持有帧的一份共享引用，数据帧与监督帧互不挤占。

use spark_cpc::{
    CpcBuffers, CpcConfig, CpcError, FrameKind, PoolKind, RxBufferMode, TxClass,
};

fn receive_frame_with(buffers: &CpcBuffers, first_byte: u8) -> spark_cpc::Frame<'_> {
    let frame = buffers
        .acquire_receive_handle(RxBufferMode::Pooled)
        .expect("组装接收帧");
    frame.with_payload_mut(|bytes| bytes[0] = first_byte);
    frame
}

/// 入队后句柄与头部回池，负载由队列项持有。
#[test]
fn enqueue_transfers_payload_to_queue_item() {
    let buffers = CpcBuffers::default();
    let queue = buffers.receive_queue();
    let frame = receive_frame_with(&buffers, 0x42);

    buffers.enqueue_received(frame, &queue, 17).expect("入队成功");
    assert_eq!(queue.len(), 1);
    assert_eq!(buffers.in_use(PoolKind::FrameHandle), 0);
    assert_eq!(buffers.in_use(PoolKind::HeaderBuffer), 0);
    assert_eq!(buffers.in_use(PoolKind::RxPayload), 1, "负载仍在队列项手中");
    assert_eq!(buffers.in_use(PoolKind::RxQueueItem), 1);

    let item = queue.pop().expect("取出队首项");
    assert_eq!(item.kind(), FrameKind::RxData);
    assert_eq!(item.length(), 17);
    let (payload, length) = buffers.dequeue_owned(item);
    assert_eq!(length, 17);
    assert_eq!(payload.with(|bytes| bytes[0]), 0x42);
    assert_eq!(buffers.in_use(PoolKind::RxQueueItem), 0, "队列项槽位随即归还");
    assert_eq!(buffers.in_use(PoolKind::RxPayload), 1, "负载此时归调用方");
    payload.release();
    assert_eq!(buffers.in_use(PoolKind::RxPayload), 0);
}

/// 共享中的帧入队后，其余持有者不再看到负载，释放时也不会触碰负载池。
#[test]
fn remaining_owner_no_longer_references_payload() {
    let buffers = CpcBuffers::default();
    let queue = buffers.receive_queue();
    let frame = receive_frame_with(&buffers, 1);
    let observer = frame.clone();

    buffers.enqueue_received(frame, &queue, 1).expect("入队成功");
    assert!(!observer.has_payload());
    assert!(!observer.has_header());
    assert_eq!(buffers.in_use(PoolKind::FrameHandle), 1, "句柄由剩余持有者保留");

    drop(observer);
    assert_eq!(buffers.in_use(PoolKind::FrameHandle), 0);
    assert_eq!(buffers.in_use(PoolKind::RxPayload), 1, "负载只归队列项所有");
    buffers.drop_item(queue.pop());
    assert_eq!(buffers.in_use(PoolKind::RxPayload), 0);
}

/// 队列项池耗尽时帧原样交还，状态不变。
#[test]
fn enqueue_exhaustion_hands_frame_back() {
    let buffers = CpcBuffers::new(CpcConfig::DEFAULT.with_limit(PoolKind::RxQueueItem, 0));
    let queue = buffers.receive_queue();
    let frame = receive_frame_with(&buffers, 9);
    let (error, frame) = buffers
        .enqueue_received(frame, &queue, 1)
        .expect_err("队列项耗尽必须失败");
    assert_eq!(
        error,
        CpcError::Exhausted {
            pool: PoolKind::RxQueueItem
        }
    );
    assert!(frame.has_payload() && frame.has_header());
    assert_eq!(frame.with_payload(|bytes| bytes[0]), Some(9));
    assert!(queue.is_empty());
}

/// 无负载的帧不能入队。
#[test]
fn payloadless_frame_is_refused() {
    let buffers = CpcBuffers::default();
    let queue = buffers.receive_queue();
    let frame = buffers
        .acquire_receive_handle(RxBufferMode::Raw)
        .expect("raw 模式组装");
    let (error, _frame) = buffers
        .enqueue_received(frame, &queue, 0)
        .expect_err("无负载必须失败");
    assert_eq!(error, CpcError::PayloadMissing);
    assert_eq!(buffers.in_use(PoolKind::RxQueueItem), 0);
}

/// 接收队列按先进先出交付，拒绝帧负载回到拒绝池。
#[test]
fn receive_queue_is_fifo_and_tags_origin() {
    let buffers = CpcBuffers::default();
    let queue = buffers.receive_queue();
    for byte in [1u8, 2, 3] {
        buffers
            .enqueue_received(receive_frame_with(&buffers, byte), &queue, u16::from(byte))
            .expect("入队成功");
    }
    let reject = buffers.acquire_reject_handle().expect("借出拒绝帧");
    buffers.enqueue_received(reject, &queue, 1).expect("拒绝帧入队");
    assert_eq!(queue.len(), 4);

    let order: Vec<u16> = (0..3)
        .map(|_| queue.pop().expect("按序取出").length())
        .collect();
    assert_eq!(order, [1, 2, 3]);

    let last = queue.pop().expect("取出拒绝帧项");
    assert_eq!(last.kind(), FrameKind::Reject);
    assert_eq!(buffers.in_use(PoolKind::RejectPayload), 1);
    buffers.drop_item(Some(last));
    assert_eq!(buffers.in_use(PoolKind::RejectPayload), 0);
    assert!(queue.pop().is_none());
    buffers.drop_item(None);
}

/// 丢弃队列时残留项连同负载一起归还。
#[test]
fn dropping_receive_queue_drains_items() {
    let buffers = CpcBuffers::default();
    {
        let queue = buffers.receive_queue();
        for byte in 0..4 {
            buffers
                .enqueue_received(receive_frame_with(&buffers, byte), &queue, 1)
                .expect("入队成功");
        }
        assert_eq!(buffers.in_use(PoolKind::RxPayload), 4);
    }
    assert_eq!(buffers.in_use(PoolKind::RxPayload), 0);
    assert_eq!(buffers.in_use(PoolKind::RxQueueItem), 0);
}

/// 发送队列持有帧的一份引用，可与重传窗口共享同一帧。
#[test]
fn transmit_queue_shares_frame_with_retransmit_window() {
    let buffers = CpcBuffers::default();
    let queue = buffers.transmit_queue();
    assert_eq!(queue.class(), TxClass::Data);

    let frame = buffers
        .acquire_handle()
        .expect("借出句柄")
        .with_header(buffers.acquire_header_buffer().expect("借出头部"))
        .finish();
    frame.update_meta(|meta| meta.control = 0x05);
    let window = frame.clone();
    queue.push(frame).expect("入发送队列");
    assert_eq!(queue.len(), 1);
    assert_eq!(window.owners(), 2);

    let item = queue.pop().expect("取出待发送帧");
    assert_eq!(item.frame().with_meta(|meta| meta.control), 0x05);
    drop(item);
    assert_eq!(buffers.in_use(PoolKind::TxQueueItem), 0);
    assert_eq!(window.owners(), 1, "发送完成后仅剩重传窗口持有");
    buffers.release_handle(window).expect("最后一个持有者释放");
    assert_eq!(buffers.in_use(PoolKind::FrameHandle), 0);
    assert_eq!(buffers.in_use(PoolKind::HeaderBuffer), 0);
}

/// 发送队列项耗尽时帧原样交还；监督帧队列不受影响。
#[test]
fn transmit_exhaustion_returns_frame_and_spares_supervisory() {
    let buffers = CpcBuffers::new(CpcConfig::DEFAULT.with_limit(PoolKind::TxQueueItem, 1));
    let data = buffers.transmit_queue();
    let supervisory = buffers.supervisory_transmit_queue();

    data.push(buffers.acquire_handle().expect("句柄").finish())
        .expect("第一帧入队");
    let frame = buffers.acquire_handle().expect("句柄").finish();
    let (error, frame) = data.push(frame).expect_err("数据帧队列项耗尽");
    assert_eq!(
        error,
        CpcError::Exhausted {
            pool: PoolKind::TxQueueItem
        }
    );
    assert_eq!(frame.owners(), 1);

    let ack = buffers.acquire_reject_handle().expect("借出拒绝帧");
    supervisory.push(ack).expect("监督帧入队不受数据帧积压影响");
    assert_eq!(supervisory.class(), TxClass::Supervisory);

    let sent = supervisory.pop().expect("取出监督帧").into_frame();
    assert_eq!(buffers.in_use(PoolKind::SupervisoryTxQueueItem), 0);
    assert_eq!(sent.kind(), FrameKind::Reject);
}

/// 丢弃发送队列时释放其持有的帧引用。
#[test]
fn dropping_transmit_queue_releases_frames() {
    let buffers = CpcBuffers::default();
    {
        let queue = buffers.supervisory_transmit_queue();
        for _ in 0..3 {
            queue
                .push(buffers.acquire_reject_handle().expect("借出拒绝帧"))
                .expect("入队");
        }
    }
    for kind in PoolKind::ALL {
        assert_eq!(buffers.in_use(kind), 0, "{kind} 必须全部归还");
    }
}

/// 其他注册表的帧不能进入本注册表的发送队列，本地共享帧的计数不受影响。
#[test]
fn transmit_queue_refuses_foreign_frame() {
    let ours = CpcBuffers::default();
    let theirs = CpcBuffers::default();
    let queue = ours.transmit_queue();

    let local = ours.acquire_reject_handle().expect("借出本地拒绝帧");
    let local_clone = local.clone();
    let foreign = theirs.acquire_reject_handle().expect("借出外部拒绝帧");
    assert_eq!(local.id(), foreign.id(), "两个注册表中处于同一槽位");

    let (error, foreign) = queue.push(foreign).expect_err("外部帧必须被拒绝");
    assert_eq!(error, CpcError::ForeignRegistry);
    assert!(queue.is_empty());
    assert_eq!(ours.in_use(PoolKind::TxQueueItem), 0);
    assert_eq!(local.owners(), 2, "本地帧的持有者计数不得被外部帧改变");

    drop(foreign);
    assert_eq!(theirs.in_use(PoolKind::FrameHandle), 0, "外部帧交还后正常回收");

    drop(local);
    assert_eq!(local_clone.owners(), 1);
    assert_eq!(ours.in_use(PoolKind::FrameHandle), 1, "仍有克隆存活时句柄不得回收");
    drop(local_clone);
    assert_eq!(ours.in_use(PoolKind::FrameHandle), 0);
}
