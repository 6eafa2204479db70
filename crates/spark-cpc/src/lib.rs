#![cfg_attr(not(feature = "std"), no_std)]
#![deny(unsafe_code)]

//! `spark-cpc` 是主控与协处理器之间多路复用帧链路的缓冲与队列生命周期引擎。
//!
//! # 模块定位（Why）
//! - 链路上的每一帧都要经历“借出句柄 → 挂载头部与负载 → 入队或发送 → 归还”的过程，
//!   这一过程必须同时满足：零动态分配、可在中断上下文调用、共享持有下恰好释放一次、
//!   接收块归还时把背压解除信号传回物理层驱动；
//! - 帧编解码、FCS 计算、滑动窗口与重传、端点状态机均属于外部协作者，本 crate 只提供
//!   它们赖以运行的内存与所有权基座。
//!
//! # 设计概要（How）
//! - [`pool`]：编译期定长、带代数标识的块池，租约在 `Drop` 时归还槽位；
//! - [`registry`]：每个缓冲类别一个池，以及全有或全无的组合借出与所有权转换入口；
//! - [`frame`]：组装中的 [`FrameBuilder`] 与可共享的 [`Frame`]，最后一个持有者负责回收；
//! - [`queue`]：以池槽位串联的接收/发送队列；
//! - [`flow_control`]：接收负载回池后的一次性通知钩子。
//!
//! # 命名约定（Consistency）
//! - 借出统一称 `acquire_*`，归还统一称 `release_*`；
//!   所有失败均以 [`CpcError`] 表达，错误码遵循 `cpc.<域>.<语义>`。

pub mod blocks;
pub mod config;
pub mod driver;
pub mod endpoint;
pub mod error;
pub mod flow_control;
pub mod frame;
mod global;
pub mod pool;
pub mod queue;
pub mod registry;
mod sync;

pub use blocks::{HeaderBuffer, RawRxBuffer, RejectBuffer, SystemCommandBuffer};
pub use config::CpcConfig;
pub use driver::{DriverCapabilities, RxBufferMode};
pub use endpoint::{EndpointClosedNotice, EndpointHandle, EndpointRecord, EndpointRef, EndpointState};
pub use error::{CpcError, Result};
pub use flow_control::{FlowControl, FlowControlHook};
pub use frame::{Frame, FrameBuilder, FrameKind, FrameMeta, Payload, RejectReason};
pub use global::{global, init};
pub use pool::{BlockId, BlockLease, BlockPool, PoolKind, PoolStats, Zeroed};
pub use queue::{DataTxQueue, RxItem, RxQueue, SupervisoryTxQueue, TxClass, TxItem, TxQueue};
pub use registry::CpcBuffers;
