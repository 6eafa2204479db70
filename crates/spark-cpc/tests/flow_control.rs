//! `flow_control` 集成测试：接收负载回池后的通知语义。
//!
//! # 测试目标（Why）
//! - 每归还一块接收负载，钩子恰好触发一次；拒绝负载、头部与句柄的归还不触发；
//! - 钩子触发时槽位已经回到池中：在钩子内部借出必须立即成功；
//! - 所有权转移（入队、取走负载）本身不归还负载，因此不触发。
//!
//! # 结构安排（How）
//! - 钩子是无捕获状态的 `fn()`，每个测试使用独立的静态注册表与计数器，互不干扰。

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use spark_cpc::{CpcBuffers, CpcConfig, CpcError, PoolKind, RxBufferMode};

static PROBE_BUFFERS: CpcBuffers =
    CpcBuffers::new(CpcConfig::DEFAULT.with_limit(PoolKind::RxPayload, 1));
static PROBE_CALLS: AtomicUsize = AtomicUsize::new(0);
static PROBE_HITS: AtomicUsize = AtomicUsize::new(0);
static PROBING: AtomicBool = AtomicBool::new(false);

fn probe_hook() {
    PROBE_CALLS.fetch_add(1, Ordering::SeqCst);
    if PROBING.swap(false, Ordering::SeqCst)
        && let Ok(buffer) = PROBE_BUFFERS.acquire_raw_receive_buffer()
    {
        PROBE_HITS.fetch_add(1, Ordering::SeqCst);
        drop(buffer);
    }
}

/// 钩子内部的借出必须成功：证明通知发生在槽位归还之后。
#[test]
fn hook_runs_after_slot_is_back() {
    PROBE_BUFFERS
        .register_flow_control_hook(probe_hook)
        .expect("首次注册");
    let frame = PROBE_BUFFERS
        .acquire_receive_handle(RxBufferMode::Pooled)
        .expect("占满唯一的接收负载");
    assert!(PROBE_BUFFERS.acquire_raw_receive_buffer().is_err());

    PROBING.store(true, Ordering::SeqCst);
    PROBE_BUFFERS.release_handle(frame).expect("释放接收帧");
    assert_eq!(PROBE_HITS.load(Ordering::SeqCst), 1, "钩子内借出必须成功");
    // 一次来自帧释放，一次来自钩子内借出块的归还。
    assert_eq!(PROBE_CALLS.load(Ordering::SeqCst), 2);
    assert_eq!(PROBE_BUFFERS.in_use(PoolKind::RxPayload), 0);
}

static ONCE_BUFFERS: CpcBuffers = CpcBuffers::new(CpcConfig::DEFAULT);
static ONCE_CALLS: AtomicUsize = AtomicUsize::new(0);

fn once_hook() {
    ONCE_CALLS.fetch_add(1, Ordering::SeqCst);
}

fn unused_hook() {}

/// 每块接收负载恰好触发一次；其他池的归还不触发；钩子只能注册一次。
#[test]
fn hook_fires_once_per_receive_payload() {
    ONCE_BUFFERS
        .register_flow_control_hook(once_hook)
        .expect("首次注册");
    assert_eq!(
        ONCE_BUFFERS.register_flow_control_hook(unused_hook),
        Err(CpcError::HookAlreadyRegistered)
    );

    let reject = ONCE_BUFFERS.acquire_reject_handle().expect("借出拒绝帧");
    let header = ONCE_BUFFERS.acquire_header_buffer().expect("借出头部");
    drop(reject);
    drop(header);
    assert_eq!(ONCE_CALLS.load(Ordering::SeqCst), 0, "非接收负载不触发");

    let frames: Vec<_> = (0..3)
        .map(|_| {
            ONCE_BUFFERS
                .acquire_receive_handle(RxBufferMode::Pooled)
                .expect("组装接收帧")
        })
        .collect();
    let shared = frames[0].clone();
    drop(frames);
    assert_eq!(ONCE_CALLS.load(Ordering::SeqCst), 2, "共享中的帧尚未归还负载");
    drop(shared);
    assert_eq!(ONCE_CALLS.load(Ordering::SeqCst), 3);

    let raw = ONCE_BUFFERS.acquire_raw_receive_buffer().expect("驱动借出");
    ONCE_BUFFERS.release_raw_receive_buffer(raw);
    assert_eq!(ONCE_CALLS.load(Ordering::SeqCst), 4);
}

static QUEUE_BUFFERS: CpcBuffers = CpcBuffers::new(CpcConfig::DEFAULT);
static QUEUE_CALLS: AtomicUsize = AtomicUsize::new(0);

fn queue_hook() {
    QUEUE_CALLS.fetch_add(1, Ordering::SeqCst);
}

/// 所有权转移不归还负载；最终归还时才触发。
#[test]
fn ownership_transfer_defers_notification() {
    QUEUE_BUFFERS
        .register_flow_control_hook(queue_hook)
        .expect("首次注册");
    let queue = QUEUE_BUFFERS.receive_queue();
    for _ in 0..2 {
        let frame = QUEUE_BUFFERS
            .acquire_receive_handle(RxBufferMode::Pooled)
            .expect("组装接收帧");
        QUEUE_BUFFERS
            .enqueue_received(frame, &queue, 8)
            .expect("入队成功");
    }
    assert_eq!(QUEUE_CALLS.load(Ordering::SeqCst), 0, "入队不归还负载");

    QUEUE_BUFFERS.drop_item(queue.pop());
    assert_eq!(QUEUE_CALLS.load(Ordering::SeqCst), 1, "丢弃队列项归还负载");

    let item = queue.pop().expect("取出第二项");
    let (payload, _) = QUEUE_BUFFERS.dequeue_owned(item);
    assert_eq!(QUEUE_CALLS.load(Ordering::SeqCst), 1, "负载转交调用方时不触发");
    payload.release();
    assert_eq!(QUEUE_CALLS.load(Ordering::SeqCst), 2);
}

/// 未注册钩子时归还接收负载为空操作。
#[test]
fn unregistered_hook_is_noop() {
    let buffers = CpcBuffers::default();
    let frame = buffers
        .acquire_receive_handle(RxBufferMode::Pooled)
        .expect("组装接收帧");
    buffers.release_handle(frame).expect("释放接收帧");
    assert_eq!(buffers.in_use(PoolKind::RxPayload), 0);
}
