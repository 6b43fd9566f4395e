use {
    super::{BufferTransfer, ImageTransfer, TransferPlan},
    ash::vk,
};

/// The queue families on either side of an upload.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct QueueFamilies {
    pub transfer: u32,
    pub graphics: u32,
}

impl QueueFamilies {
    /// Resources only change owners when the queues are in different
    /// families.
    pub fn needs_ownership_transfer(&self) -> bool {
        self.transfer != self.graphics
    }

    fn src_and_dst(&self) -> (u32, u32) {
        if self.needs_ownership_transfer() {
            (self.transfer, self.graphics)
        } else {
            (vk::QUEUE_FAMILY_IGNORED, vk::QUEUE_FAMILY_IGNORED)
        }
    }
}

/// The barriers and semaphore wait the graphics queue needs before it can
/// read resources uploaded by the transfer queue.
#[derive(Debug, Default)]
pub struct AcquireBarriers {
    pub buffer_barriers: Vec<vk::BufferMemoryBarrier2>,
    pub image_barriers: Vec<vk::ImageMemoryBarrier2>,

    /// The transfer timeline semaphore and the value signaled by the upload
    /// submission.
    pub transfer_wait: Option<(vk::Semaphore, u64)>,
}

// Public API
// ----------

impl AcquireBarriers {
    /// An empty bundle for frames without uploads.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer_barriers.is_empty()
            && self.image_barriers.is_empty()
            && self.transfer_wait.is_none()
    }

    /// Record the acquire barriers into a graphics command buffer.
    ///
    /// # Safety
    ///
    /// Unsafe because:
    ///   - the command buffer must be in the recording state
    ///   - the command buffer must be submitted to the graphics queue with
    ///     the semaphore wait from [Self::wait_semaphore_submit_info]
    pub unsafe fn record(
        &self,
        device: &ash::Device,
        command_buffer: vk::CommandBuffer,
    ) {
        record_pipeline_barrier(
            device,
            command_buffer,
            &self.buffer_barriers,
            &self.image_barriers,
        );
    }

    /// The wait the graphics submission needs so the uploads finish before
    /// the acquire barriers execute.
    pub fn wait_semaphore_submit_info(&self) -> Option<vk::SemaphoreSubmitInfo> {
        self.transfer_wait
            .map(|(semaphore, value)| vk::SemaphoreSubmitInfo {
                semaphore,
                value,
                stage_mask: vk::PipelineStageFlags2::ALL_COMMANDS,
                ..Default::default()
            })
    }
}

impl TransferPlan {
    /// Transition every written subresource to TRANSFER_DST_OPTIMAL. The
    /// old contents of those subresources are discarded. Subresources which
    /// were not written keep their layout and contents.
    pub fn transfer_dst_barriers(&self) -> Vec<vk::ImageMemoryBarrier2> {
        self.image_transfers
            .iter()
            .map(|transfer| vk::ImageMemoryBarrier2 {
                src_stage_mask: vk::PipelineStageFlags2::NONE,
                src_access_mask: vk::AccessFlags2::NONE,
                dst_stage_mask: vk::PipelineStageFlags2::COPY,
                dst_access_mask: vk::AccessFlags2::TRANSFER_WRITE,
                old_layout: vk::ImageLayout::UNDEFINED,
                new_layout: vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                src_queue_family_index: vk::QUEUE_FAMILY_IGNORED,
                dst_queue_family_index: vk::QUEUE_FAMILY_IGNORED,
                image: transfer.image,
                subresource_range: transfer.range,
                ..Default::default()
            })
            .collect()
    }

    /// Barriers recorded on the transfer queue after the copies.
    ///
    /// Buffers only need a release when ownership moves between families.
    /// Images always get one because it carries the layout transition.
    pub fn release_barriers(
        &self,
        families: QueueFamilies,
    ) -> (Vec<vk::BufferMemoryBarrier2>, Vec<vk::ImageMemoryBarrier2>) {
        let buffer_barriers = if families.needs_ownership_transfer() {
            self.buffer_transfers
                .iter()
                .map(|transfer| transfer.release_barrier(families))
                .collect()
        } else {
            vec![]
        };
        let image_barriers = self
            .image_transfers
            .iter()
            .map(|transfer| transfer.release_barrier(families))
            .collect();
        (buffer_barriers, image_barriers)
    }

    /// The graphics side of every release barrier.
    ///
    /// When both queues share a family the semaphore wait alone makes the
    /// copies visible, so the acquire barriers only cover the consumer
    /// stages.
    pub fn acquire_barriers(
        &self,
        families: QueueFamilies,
        transfer_wait: Option<(vk::Semaphore, u64)>,
    ) -> AcquireBarriers {
        AcquireBarriers {
            buffer_barriers: self
                .buffer_transfers
                .iter()
                .map(|transfer| transfer.acquire_barrier(families))
                .collect(),
            image_barriers: self
                .image_transfers
                .iter()
                .map(|transfer| transfer.acquire_barrier(families))
                .collect(),
            transfer_wait,
        }
    }
}

/// Record one pipeline barrier holding every buffer and image barrier. Does
/// nothing when there are no barriers.
pub(super) unsafe fn record_pipeline_barrier(
    device: &ash::Device,
    command_buffer: vk::CommandBuffer,
    buffer_barriers: &[vk::BufferMemoryBarrier2],
    image_barriers: &[vk::ImageMemoryBarrier2],
) {
    if buffer_barriers.is_empty() && image_barriers.is_empty() {
        return;
    }
    let dependency_info = vk::DependencyInfo {
        buffer_memory_barrier_count: buffer_barriers.len() as u32,
        p_buffer_memory_barriers: buffer_barriers.as_ptr(),
        image_memory_barrier_count: image_barriers.len() as u32,
        p_image_memory_barriers: image_barriers.as_ptr(),
        ..Default::default()
    };
    device.cmd_pipeline_barrier2(command_buffer, &dependency_info);
}

/// Order a copy after earlier copies which wrote the same subresources.
pub(super) fn write_after_write_barrier(
    image: vk::Image,
    subresource_range: vk::ImageSubresourceRange,
) -> vk::ImageMemoryBarrier2 {
    vk::ImageMemoryBarrier2 {
        src_stage_mask: vk::PipelineStageFlags2::COPY,
        src_access_mask: vk::AccessFlags2::TRANSFER_WRITE,
        dst_stage_mask: vk::PipelineStageFlags2::COPY,
        dst_access_mask: vk::AccessFlags2::TRANSFER_WRITE,
        old_layout: vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        new_layout: vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        src_queue_family_index: vk::QUEUE_FAMILY_IGNORED,
        dst_queue_family_index: vk::QUEUE_FAMILY_IGNORED,
        image,
        subresource_range,
        ..Default::default()
    }
}

// Private API
// -----------

impl BufferTransfer {
    fn release_barrier(&self, families: QueueFamilies) -> vk::BufferMemoryBarrier2 {
        let (src_queue_family_index, dst_queue_family_index) =
            families.src_and_dst();
        vk::BufferMemoryBarrier2 {
            src_stage_mask: vk::PipelineStageFlags2::COPY,
            src_access_mask: vk::AccessFlags2::TRANSFER_WRITE,
            dst_stage_mask: vk::PipelineStageFlags2::NONE,
            dst_access_mask: vk::AccessFlags2::NONE,
            src_queue_family_index,
            dst_queue_family_index,
            buffer: self.buffer,
            offset: self.range.start,
            size: self.range.size(),
            ..Default::default()
        }
    }

    fn acquire_barrier(&self, families: QueueFamilies) -> vk::BufferMemoryBarrier2 {
        let (src_queue_family_index, dst_queue_family_index) =
            families.src_and_dst();
        vk::BufferMemoryBarrier2 {
            src_stage_mask: vk::PipelineStageFlags2::NONE,
            src_access_mask: vk::AccessFlags2::NONE,
            dst_stage_mask: self.consumer.stage,
            dst_access_mask: self.consumer.access,
            src_queue_family_index,
            dst_queue_family_index,
            buffer: self.buffer,
            offset: self.range.start,
            size: self.range.size(),
            ..Default::default()
        }
    }
}

impl ImageTransfer {
    fn release_barrier(&self, families: QueueFamilies) -> vk::ImageMemoryBarrier2 {
        let (src_queue_family_index, dst_queue_family_index) =
            families.src_and_dst();
        vk::ImageMemoryBarrier2 {
            src_stage_mask: vk::PipelineStageFlags2::COPY,
            src_access_mask: vk::AccessFlags2::TRANSFER_WRITE,
            dst_stage_mask: vk::PipelineStageFlags2::NONE,
            dst_access_mask: vk::AccessFlags2::NONE,
            old_layout: vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            new_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            src_queue_family_index,
            dst_queue_family_index,
            image: self.image,
            subresource_range: self.range,
            ..Default::default()
        }
    }

    fn acquire_barrier(&self, families: QueueFamilies) -> vk::ImageMemoryBarrier2 {
        let (src_queue_family_index, dst_queue_family_index) =
            families.src_and_dst();
        let (old_layout, new_layout) = if families.needs_ownership_transfer() {
            // must match the release barrier exactly
            (
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            )
        } else {
            (
                vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            )
        };
        vk::ImageMemoryBarrier2 {
            src_stage_mask: vk::PipelineStageFlags2::NONE,
            src_access_mask: vk::AccessFlags2::NONE,
            dst_stage_mask: self.consumer.stage,
            dst_access_mask: self.consumer.access,
            old_layout,
            new_layout,
            src_queue_family_index,
            dst_queue_family_index,
            image: self.image,
            subresource_range: self.range,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::graphics::vulkan_api::transfer::{
            BufferUpload, Consumer, ImageUpload, TransferMethod,
        },
        ash::vk::Handle,
    };

    const SEPARATE: QueueFamilies = QueueFamilies {
        transfer: 1,
        graphics: 0,
    };
    const SHARED: QueueFamilies = QueueFamilies {
        transfer: 0,
        graphics: 0,
    };

    fn plan() -> TransferPlan {
        let buffer_uploads = [
            BufferUpload {
                src: vk::Buffer::from_raw(1),
                dst: vk::Buffer::from_raw(10),
                src_offset: 0,
                dst_offset: 0,
                size: 64,
                consumer: Consumer::VERTEX_INPUT,
            },
            BufferUpload {
                src: vk::Buffer::from_raw(1),
                dst: vk::Buffer::from_raw(10),
                src_offset: 64,
                dst_offset: 64,
                size: 64,
                consumer: Consumer::VERTEX_INPUT,
            },
        ];
        let image_uploads = [ImageUpload {
            src: vk::Buffer::from_raw(1),
            dst: vk::Image::from_raw(20),
            region: vk::BufferImageCopy {
                image_subresource: vk::ImageSubresourceLayers {
                    aspect_mask: vk::ImageAspectFlags::COLOR,
                    mip_level: 0,
                    base_array_layer: 0,
                    layer_count: 1,
                },
                ..Default::default()
            },
            consumer: Consumer::FRAGMENT_SHADER_SAMPLED,
        }];
        TransferPlan::new(
            &buffer_uploads,
            &image_uploads,
            TransferMethod::Unsynchronized,
        )
    }

    #[test]
    fn release_and_acquire_barriers_pair_up_across_families() {
        let plan = plan();

        let (buffers, images) = plan.release_barriers(SEPARATE);
        let acquire = plan.acquire_barriers(SEPARATE, None);

        assert_eq!(buffers.len(), 1);
        assert_eq!(acquire.buffer_barriers.len(), 1);
        assert_eq!(buffers[0].size, 128);
        assert_eq!(buffers[0].src_queue_family_index, 1);
        assert_eq!(buffers[0].dst_queue_family_index, 0);
        assert_eq!(acquire.buffer_barriers[0].src_queue_family_index, 1);
        assert_eq!(
            acquire.buffer_barriers[0].dst_stage_mask,
            vk::PipelineStageFlags2::VERTEX_ATTRIBUTE_INPUT
        );

        assert_eq!(images.len(), 1);
        assert_eq!(images[0].old_layout, acquire.image_barriers[0].old_layout);
        assert_eq!(images[0].new_layout, acquire.image_barriers[0].new_layout);
        assert_eq!(
            acquire.image_barriers[0].new_layout,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL
        );
    }

    #[test]
    fn shared_family_skips_buffer_release_barriers() {
        let plan = plan();

        let (buffers, images) = plan.release_barriers(SHARED);
        let acquire = plan.acquire_barriers(SHARED, None);

        assert!(buffers.is_empty());
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].src_queue_family_index, vk::QUEUE_FAMILY_IGNORED);
        assert_eq!(
            acquire.image_barriers[0].old_layout,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL
        );
    }

    #[test]
    fn destination_images_are_transitioned_together() {
        let barriers = plan().transfer_dst_barriers();
        assert_eq!(barriers.len(), 1);
        assert_eq!(barriers[0].old_layout, vk::ImageLayout::UNDEFINED);
        assert_eq!(
            barriers[0].new_layout,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL
        );
    }

    #[test]
    fn every_image_barrier_skips_unwritten_mip_levels() {
        let upload = |mip_level| ImageUpload {
            src: vk::Buffer::from_raw(1),
            dst: vk::Image::from_raw(20),
            region: vk::BufferImageCopy {
                image_subresource: vk::ImageSubresourceLayers {
                    aspect_mask: vk::ImageAspectFlags::COLOR,
                    mip_level,
                    base_array_layer: 0,
                    layer_count: 1,
                },
                ..Default::default()
            },
            consumer: Consumer::FRAGMENT_SHADER_SAMPLED,
        };
        let plan = TransferPlan::new(
            &[],
            &[upload(0), upload(2)],
            TransferMethod::Unsynchronized,
        );

        let transitions = plan.transfer_dst_barriers();
        let (_, releases) = plan.release_barriers(SEPARATE);
        let acquires = plan.acquire_barriers(SEPARATE, None).image_barriers;

        for barriers in [&transitions, &releases, &acquires] {
            assert_eq!(barriers.len(), 2);
            for barrier in barriers.iter() {
                let range = barrier.subresource_range;
                assert_eq!(range.level_count, 1);
                assert_ne!(range.base_mip_level, 1);
            }
        }
    }

    #[test]
    fn wait_info_uses_the_transfer_timeline_value() {
        let semaphore = vk::Semaphore::from_raw(99);
        let acquire = plan().acquire_barriers(SEPARATE, Some((semaphore, 4)));

        let info = acquire.wait_semaphore_submit_info().unwrap();
        assert_eq!(info.semaphore, semaphore);
        assert_eq!(info.value, 4);
        assert!(AcquireBarriers::empty().wait_semaphore_submit_info().is_none());
    }
}
