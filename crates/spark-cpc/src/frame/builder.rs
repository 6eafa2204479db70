use core::fmt;

use crate::{blocks::HeaderBuffer, error::CpcError, registry::CpcBuffers};

use super::{Frame, FrameKind, FrameLease, FrameMeta, FrameRecord, Payload};

/// 组装中的帧：已持有句柄槽位，头部与负载逐个挂入。
///
/// # 契约说明（What）
/// - 构建器独占其持有的所有块；在 [`finish`](Self::finish) 之前被丢弃时，
///   句柄、头部与负载各自回到所属池，部分组装不会留下任何占用；
/// - `finish` 之后所有块的归属转交给返回的 [`Frame`]，初始持有者为 1；
///   来自其他注册表的块不会进入帧，而是直接回到其所属池；
///   需要感知这种情况时改用 [`try_finish`](Self::try_finish)。
pub struct FrameBuilder<'p> {
    buffers: &'p CpcBuffers,
    record: FrameLease<'p>,
    kind: FrameKind,
    meta: FrameMeta,
    header: Option<HeaderBuffer<'p>>,
    payload: Option<Payload<'p>>,
}

impl<'p> FrameBuilder<'p> {
    pub(crate) fn new(buffers: &'p CpcBuffers, record: FrameLease<'p>) -> Self {
        Self {
            buffers,
            record,
            kind: FrameKind::Unknown,
            meta: FrameMeta::default(),
            header: None,
            payload: None,
        }
    }

    /// 句柄槽位标识，`finish` 后与帧的标识一致。
    pub fn id(&self) -> crate::pool::BlockId {
        self.record.id()
    }

    /// 设置缓冲类型标签。
    pub fn with_kind(mut self, kind: FrameKind) -> Self {
        self.kind = kind;
        self
    }

    /// 挂入头部块，替换已有头部（被替换者随即归还）。
    pub fn with_header(mut self, header: HeaderBuffer<'p>) -> Self {
        self.header = Some(header);
        self
    }

    /// 挂入负载，并以负载来源作为缓冲类型标签。
    pub fn with_payload(mut self, payload: Payload<'p>) -> Self {
        self.kind = payload.kind();
        self.payload = Some(payload);
        self
    }

    pub fn meta(&self) -> &FrameMeta {
        &self.meta
    }

    pub fn meta_mut(&mut self) -> &mut FrameMeta {
        &mut self.meta
    }

    pub fn has_header(&self) -> bool {
        self.header.is_some()
    }

    pub fn has_payload(&self) -> bool {
        self.payload.is_some()
    }

    /// 完成组装；头部或负载来自其他注册表时返回 [`CpcError::ForeignRegistry`]
    /// 并原样交还构建器。
    pub fn try_finish(self) -> Result<Frame<'p>, (CpcError, Self)> {
        let header_local = self
            .header
            .as_ref()
            .is_none_or(|header| header.is_from(&self.buffers.headers));
        let payload_local = self
            .payload
            .as_ref()
            .is_none_or(|payload| payload.is_from(self.buffers));
        if header_local && payload_local {
            Ok(self.finish())
        } else {
            Err((CpcError::ForeignRegistry, self))
        }
    }

    /// 完成组装，返回可共享的帧。
    pub fn finish(self) -> Frame<'p> {
        let Self {
            buffers,
            mut record,
            kind,
            meta,
            header,
            payload,
        } = self;
        // 来自其他注册表的块直接回到其所属池，记录中只保存本注册表的标识。
        let header = header
            .filter(|header| keep_local(header.is_from(&buffers.headers), "header"))
            .map(HeaderBuffer::detach);
        let payload = payload
            .filter(|payload| keep_local(payload.is_from(buffers), "payload"))
            .map(Payload::detach);
        record.with_mut(|slot| {
            *slot = FrameRecord {
                meta,
                kind,
                header,
                payload,
                owners: 1,
            }
        });
        Frame::from_lease(buffers, record)
    }
}

fn keep_local(local: bool, block: &'static str) -> bool {
    if !local {
        tracing::error!(block, "block from another buffer registry dropped from frame");
    }
    local
}

impl fmt::Debug for FrameBuilder<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameBuilder")
            .field("id", &self.record.id())
            .field("kind", &self.kind)
            .field("meta", &self.meta)
            .field("header", &self.header.is_some())
            .field("payload", &self.payload.as_ref().map(Payload::kind))
            .finish()
    }
}
