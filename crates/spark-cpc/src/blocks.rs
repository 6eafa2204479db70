//! 定长字节块及其在各池中的具体化类型。

use core::ops::{Deref, DerefMut};

use crate::{
    config::{
        HDLC_HEADER_MAX_COUNT, HDLC_HEADER_RAW_SIZE, HDLC_REJECT_PAYLOAD_SIZE,
        REJECT_BUFFER_MAX_COUNT, RX_BUFFER_MAX_COUNT, RX_PAYLOAD_MAX_LENGTH,
        SYSTEM_COMMAND_BUFFER_MAX_COUNT, SYSTEM_COMMAND_BUFFER_SIZE,
    },
    pool::{BlockLease, Zeroed},
};

/// 长度为 `SIZE` 的字节块，解引用为 `[u8]`。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ByteBlock<const SIZE: usize> {
    bytes: [u8; SIZE],
}

impl<const SIZE: usize> ByteBlock<SIZE> {
    /// 块长度。
    pub const LEN: usize = SIZE;

    /// 以字节数组视图访问。
    pub fn as_array(&self) -> &[u8; SIZE] {
        &self.bytes
    }

    /// 以可写字节数组视图访问。
    pub fn as_array_mut(&mut self) -> &mut [u8; SIZE] {
        &mut self.bytes
    }
}

impl<const SIZE: usize> Zeroed for ByteBlock<SIZE> {
    const ZEROED: Self = Self { bytes: [0; SIZE] };
}

impl<const SIZE: usize> Deref for ByteBlock<SIZE> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.bytes
    }
}

impl<const SIZE: usize> DerefMut for ByteBlock<SIZE> {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }
}

/// HDLC 头部块。
pub type HeaderBlock = ByteBlock<HDLC_HEADER_RAW_SIZE>;

/// 拒绝帧负载块。
pub type RejectBlock = ByteBlock<HDLC_REJECT_PAYLOAD_SIZE>;

/// 接收负载块。
pub type RxPayloadBlock = ByteBlock<RX_PAYLOAD_MAX_LENGTH>;

/// 系统命令块。
pub type SystemCommandBlock = ByteBlock<SYSTEM_COMMAND_BUFFER_SIZE>;

/// HDLC 头部租约。
pub type HeaderBuffer<'p> = BlockLease<'p, HeaderBlock, HDLC_HEADER_MAX_COUNT>;

/// 拒绝负载租约。
pub type RejectBuffer<'p> = BlockLease<'p, RejectBlock, REJECT_BUFFER_MAX_COUNT>;

/// 接收负载租约；归还时触发流控通知。
pub type RawRxBuffer<'p> = BlockLease<'p, RxPayloadBlock, RX_BUFFER_MAX_COUNT>;

/// 系统命令缓冲租约，不经帧句柄包装，借出与归还成对调用。
pub type SystemCommandBuffer<'p> =
    BlockLease<'p, SystemCommandBlock, SYSTEM_COMMAND_BUFFER_MAX_COUNT>;
