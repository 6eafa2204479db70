use criterion::{Criterion, black_box};
use spark_cpc::{CpcBuffers, RxBufferMode};
use std::{env, time::Duration};

/// 基准：接收路径上一帧的完整生命周期成本。
///
/// # 设计背景（Why）
/// - 接收完成中断里要在有界时间内组装句柄、入队并在消费后归还，
///   这里度量“组装 → 入队 → 出队 → 丢弃”一轮的开销，便于发现台账或锁路径上的回归。
///
/// # 逻辑解析（How）
/// - `receive_cycle`：组装接收帧、入队、出队并丢弃队列项；
/// - `shared_release`：组装后克隆一份，再依次释放两个持有者。
fn bench_pool_cycle(c: &mut Criterion) {
    let buffers = CpcBuffers::default();
    let queue = buffers.receive_queue();

    c.bench_function("receive_cycle", |b| {
        b.iter(|| {
            let frame = buffers
                .acquire_receive_handle(RxBufferMode::Pooled)
                .expect("组装接收帧");
            buffers
                .enqueue_received(frame, &queue, 64)
                .expect("入队成功");
            let item = queue.pop();
            black_box(item.as_ref().map(|item| item.length()));
            buffers.drop_item(item);
        });
    });

    c.bench_function("shared_release", |b| {
        b.iter(|| {
            let frame = buffers.acquire_reject_handle().expect("借出拒绝帧");
            let shared = frame.clone();
            let (_, frame) = buffers.release_handle(frame).expect_err("共享中");
            drop(shared);
            black_box(buffers.release_handle(frame).is_ok());
        });
    });
}

fn main() {
    let mut quick_mode = false;
    for arg in env::args().skip(1) {
        if arg == "--quick" {
            quick_mode = true;
        }
    }

    let mut criterion = Criterion::default();
    if quick_mode {
        criterion = criterion
            .sample_size(10)
            .warm_up_time(Duration::from_millis(100))
            .measurement_time(Duration::from_millis(250));
    }

    bench_pool_cycle(&mut criterion);
    criterion.final_summary();
}
