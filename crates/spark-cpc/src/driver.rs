//! 物理层驱动向缓冲引擎声明的能力。

/// 接收负载的来源。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RxBufferMode {
    /// 由引擎在组装接收句柄时从接收负载池借出。
    #[default]
    Pooled,
    /// 驱动自行管理接收块（例如 DMA 直接写入），组装时不附带负载，
    /// 稍后通过 `Frame::attach_raw_payload` 挂载。
    Raw,
}

/// 驱动能力描述。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DriverCapabilities {
    /// 驱动是否自行提供接收存储。
    pub use_raw_rx_buffer: bool,
}

impl DriverCapabilities {
    /// 由能力位推导接收负载来源。
    pub const fn rx_buffer_mode(&self) -> RxBufferMode {
        if self.use_raw_rx_buffer {
            RxBufferMode::Raw
        } else {
            RxBufferMode::Pooled
        }
    }
}
