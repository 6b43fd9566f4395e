//! Batched uploads from host-visible staging buffers to device resources
//! through the dedicated transfer queue.
//!
//! Upload requests are collected into a [TransferBatch] over the course of a
//! frame. Once per frame the [TransferQueue] turns the batch into a
//! [TransferPlan], records and submits it, and hands back the
//! [AcquireBarriers] the graphics queue must execute before reading any of
//! the uploaded resources.

mod barriers;
mod byte_range;
mod dedup;
mod plan;
mod transfer_queue;

use ash::vk;

pub use self::{
    barriers::{AcquireBarriers, QueueFamilies},
    byte_range::{merge_ranges, ByteRange, Remainder},
    dedup::dedup_buffer_copies,
    plan::{BufferTransfer, ImageCopyBatch, ImageTransfer, TransferPlan},
    transfer_queue::TransferQueue,
};

/// How much synchronization an upload needs with the graphics work already
/// in flight.
///
/// Methods are ordered from weakest to strictest. A batch is submitted with
/// the strictest method requested during the frame.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum TransferMethod {
    /// The destination is not in use by any frame in flight.
    #[default]
    Unsynchronized,

    /// The destination is duplicated per frame in flight. Only the frame
    /// which last used this copy must be finished.
    DoubleBuffered,

    /// The destination is shared by every frame in flight. The previous
    /// frame must be finished before the copy can run.
    SingleBuffered,
}

impl TransferMethod {
    /// The graphics timeline value the transfer submission must wait for
    /// when recording frame `current_frame`.
    ///
    /// DoubleBuffered only depends on frame `current_frame - 2`, which the
    /// frame timeline already waits for on the host before the frame begins.
    pub fn graphics_wait_value(&self, current_frame: u64) -> Option<u64> {
        match self {
            TransferMethod::Unsynchronized => None,
            TransferMethod::DoubleBuffered => None,
            TransferMethod::SingleBuffered => {
                current_frame.checked_sub(1).filter(|&value| value > 0)
            }
        }
    }
}

/// The graphics pipeline stage and access which first read an uploaded
/// resource.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct Consumer {
    pub stage: vk::PipelineStageFlags2,
    pub access: vk::AccessFlags2,
}

impl Consumer {
    pub const VERTEX_INPUT: Consumer = Consumer {
        stage: vk::PipelineStageFlags2::VERTEX_ATTRIBUTE_INPUT,
        access: vk::AccessFlags2::VERTEX_ATTRIBUTE_READ,
    };

    pub const INDEX_INPUT: Consumer = Consumer {
        stage: vk::PipelineStageFlags2::INDEX_INPUT,
        access: vk::AccessFlags2::INDEX_READ,
    };

    pub const VERTEX_SHADER_STORAGE: Consumer = Consumer {
        stage: vk::PipelineStageFlags2::VERTEX_SHADER,
        access: vk::AccessFlags2::SHADER_STORAGE_READ,
    };

    pub const FRAGMENT_SHADER_SAMPLED: Consumer = Consumer {
        stage: vk::PipelineStageFlags2::FRAGMENT_SHADER,
        access: vk::AccessFlags2::SHADER_SAMPLED_READ,
    };

    pub fn new(
        stage: vk::PipelineStageFlags2,
        access: vk::AccessFlags2,
    ) -> Self {
        Self { stage, access }
    }

    /// A consumer which covers both `self` and `other`.
    pub fn merge(self, other: Consumer) -> Self {
        Self {
            stage: self.stage | other.stage,
            access: self.access | other.access,
        }
    }
}

/// A copy from a staging buffer into a region of a device buffer.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct BufferUpload {
    pub src: vk::Buffer,
    pub dst: vk::Buffer,
    pub src_offset: u64,
    pub dst_offset: u64,
    pub size: u64,
    pub consumer: Consumer,
}

impl BufferUpload {
    /// The bytes written in the destination buffer.
    pub fn dst_range(&self) -> ByteRange {
        ByteRange::new(self.dst_offset, self.size)
    }

    pub(super) fn as_buffer_copy(&self) -> vk::BufferCopy {
        vk::BufferCopy {
            src_offset: self.src_offset,
            dst_offset: self.dst_offset,
            size: self.size,
        }
    }
}

/// A copy from a staging buffer into one subresource of a device image.
#[derive(Debug, Copy, Clone)]
pub struct ImageUpload {
    pub src: vk::Buffer,
    pub dst: vk::Image,
    pub region: vk::BufferImageCopy,
    pub consumer: Consumer,
}

impl ImageUpload {
    /// The image subresources written by this upload.
    pub fn subresource_range(&self) -> vk::ImageSubresourceRange {
        let layers = self.region.image_subresource;
        vk::ImageSubresourceRange {
            aspect_mask: layers.aspect_mask,
            base_mip_level: layers.mip_level,
            level_count: 1,
            base_array_layer: layers.base_array_layer,
            layer_count: layers.layer_count,
        }
    }
}

/// Upload requests collected over the course of one frame.
#[derive(Debug, Default)]
pub struct TransferBatch {
    buffer_uploads: Vec<BufferUpload>,
    image_uploads: Vec<ImageUpload>,
    strictest: TransferMethod,
}

// Public API
// ----------

impl TransferBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a buffer copy. Requests are ordered: when two copies write
    /// the same destination bytes the later request wins.
    pub fn request_buffer_upload(
        &mut self,
        upload: BufferUpload,
        method: TransferMethod,
    ) {
        if upload.size == 0 {
            return;
        }
        self.buffer_uploads.push(upload);
        self.strictest = self.strictest.max(method);
    }

    /// Request a buffer-to-image copy.
    ///
    /// The destination image's previous contents are discarded by the
    /// transition into TRANSFER_DST_OPTIMAL.
    pub fn request_image_upload(
        &mut self,
        upload: ImageUpload,
        method: TransferMethod,
    ) {
        self.image_uploads.push(upload);
        self.strictest = self.strictest.max(method);
    }

    /// The strictest transfer method requested since the last clear.
    pub fn strictest_method(&self) -> TransferMethod {
        self.strictest
    }

    pub fn buffer_uploads(&self) -> &[BufferUpload] {
        &self.buffer_uploads
    }

    pub fn image_uploads(&self) -> &[ImageUpload] {
        &self.image_uploads
    }

    pub fn is_empty(&self) -> bool {
        self.buffer_uploads.is_empty() && self.image_uploads.is_empty()
    }

    /// Build the deduplicated copies and merged barriers for every request
    /// in the batch.
    pub fn plan(&self) -> TransferPlan {
        TransferPlan::new(
            &self.buffer_uploads,
            &self.image_uploads,
            self.strictest,
        )
    }

    /// Forget every request. The backing storage is kept for the next frame.
    pub fn clear(&mut self) {
        self.buffer_uploads.clear();
        self.image_uploads.clear();
        self.strictest = TransferMethod::Unsynchronized;
    }
}

#[cfg(test)]
mod tests {
    use {super::*, ash::vk::Handle};

    fn upload(dst: u64, offset: u64, size: u64) -> BufferUpload {
        BufferUpload {
            src: vk::Buffer::from_raw(1),
            dst: vk::Buffer::from_raw(dst),
            src_offset: 0,
            dst_offset: offset,
            size,
            consumer: Consumer::VERTEX_INPUT,
        }
    }

    #[test]
    fn methods_are_ordered_by_strictness() {
        assert!(TransferMethod::Unsynchronized < TransferMethod::DoubleBuffered);
        assert!(TransferMethod::DoubleBuffered < TransferMethod::SingleBuffered);
    }

    #[test]
    fn only_single_buffered_waits_on_the_graphics_timeline() {
        assert_eq!(TransferMethod::Unsynchronized.graphics_wait_value(7), None);
        assert_eq!(TransferMethod::DoubleBuffered.graphics_wait_value(7), None);
        assert_eq!(
            TransferMethod::SingleBuffered.graphics_wait_value(7),
            Some(6)
        );
        assert_eq!(TransferMethod::SingleBuffered.graphics_wait_value(1), None);
    }

    #[test]
    fn batch_tracks_the_strictest_method() {
        let mut batch = TransferBatch::new();
        batch.request_buffer_upload(
            upload(2, 0, 16),
            TransferMethod::SingleBuffered,
        );
        batch.request_buffer_upload(
            upload(2, 16, 16),
            TransferMethod::Unsynchronized,
        );
        assert_eq!(batch.strictest_method(), TransferMethod::SingleBuffered);
    }

    #[test]
    fn clear_resets_requests_and_keeps_storage() {
        let mut batch = TransferBatch::new();
        for i in 0..8 {
            batch.request_buffer_upload(
                upload(2, i * 16, 16),
                TransferMethod::DoubleBuffered,
            );
        }
        let capacity = batch.buffer_uploads.capacity();

        batch.clear();

        assert!(batch.is_empty());
        assert_eq!(batch.strictest_method(), TransferMethod::Unsynchronized);
        assert_eq!(batch.buffer_uploads.capacity(), capacity);
    }

    #[test]
    fn empty_uploads_are_ignored() {
        let mut batch = TransferBatch::new();
        batch.request_buffer_upload(upload(2, 0, 0), TransferMethod::SingleBuffered);
        assert!(batch.is_empty());
        assert_eq!(batch.strictest_method(), TransferMethod::Unsynchronized);
    }

    #[test]
    fn consumers_merge_stages_and_access() {
        let merged = Consumer::VERTEX_INPUT.merge(Consumer::INDEX_INPUT);
        assert!(merged
            .stage
            .contains(vk::PipelineStageFlags2::VERTEX_ATTRIBUTE_INPUT));
        assert!(merged.stage.contains(vk::PipelineStageFlags2::INDEX_INPUT));
        assert!(merged.access.contains(vk::AccessFlags2::INDEX_READ));
    }
}
