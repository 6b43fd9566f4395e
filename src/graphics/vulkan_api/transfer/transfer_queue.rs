use {
    super::{
        barriers::record_pipeline_barrier, AcquireBarriers, QueueFamilies,
        TransferBatch, TransferPlan,
    },
    crate::graphics::vulkan_api::{
        CommandPool, RenderDevice, TimelineSemaphore, VulkanError,
        MAX_FRAMES_IN_FLIGHT,
    },
    ash::vk,
    indoc::indoc,
    std::sync::Arc,
};

struct TransferSlot {
    command_pool: CommandPool,
    command_buffer: vk::CommandBuffer,

    /// The transfer timeline value signaled by the slot's last submission.
    last_signal_value: u64,
}

/// Records and submits each frame's uploads on the transfer queue.
pub struct TransferQueue {
    slots: Vec<TransferSlot>,
    semaphore: TimelineSemaphore,
    last_signal_value: u64,
    families: QueueFamilies,
    render_device: Arc<RenderDevice>,
}

// Public API
// ----------

impl TransferQueue {
    /// Create one command pool per frame in flight on the transfer queue's
    /// family, and the transfer timeline semaphore.
    ///
    /// # Safety
    ///
    /// Unsafe because:
    ///   - the transfer queue must be dropped before the render device
    ///   - the device must be idle before the transfer queue is dropped
    pub unsafe fn new(render_device: Arc<RenderDevice>) -> Result<Self, VulkanError> {
        let families = render_device.queue_families();
        let mut slots = Vec::with_capacity(MAX_FRAMES_IN_FLIGHT as usize);
        for _ in 0..MAX_FRAMES_IN_FLIGHT {
            let mut command_pool = CommandPool::new(
                render_device.clone(),
                families.transfer,
                vk::CommandPoolCreateFlags::TRANSIENT,
            )?;
            let index = command_pool.allocate_primary_command_buffers(1)?;
            let command_buffer = command_pool.primary_command_buffer(index);
            slots.push(TransferSlot {
                command_pool,
                command_buffer,
                last_signal_value: 0,
            });
        }
        let semaphore = TimelineSemaphore::new(render_device.clone(), 0)?;
        Ok(Self {
            slots,
            semaphore,
            last_signal_value: 0,
            families,
            render_device,
        })
    }

    /// Submit every request in the batch and clear it.
    ///
    /// # Params
    ///
    /// * `batch` - the frame's upload requests, empty afterwards
    /// * `frame` - the frame being recorded
    /// * `graphics_timeline` - the semaphore which graphics submissions
    ///   signal with their frame number
    ///
    /// # Returns
    ///
    /// The barriers and semaphore wait which the frame's graphics submission
    /// must include before reading any uploaded resource. Empty when the
    /// batch had no requests, in which case nothing is submitted.
    ///
    /// # Safety
    ///
    /// Unsafe because:
    ///   - every source and destination in the batch must stay alive until
    ///     the frame's graphics work completes
    ///   - destination images are transitioned from UNDEFINED, their previous
    ///     contents are lost
    pub unsafe fn commit(
        &mut self,
        batch: &mut TransferBatch,
        frame: u64,
        graphics_timeline: vk::Semaphore,
    ) -> Result<AcquireBarriers, VulkanError> {
        if batch.is_empty() {
            batch.clear();
            return Ok(AcquireBarriers::empty());
        }
        let plan = batch.plan();
        batch.clear();

        let slot_index = (frame % self.slots.len() as u64) as usize;
        let slot_value = self.slots[slot_index].last_signal_value;
        if slot_value > 0 {
            self.semaphore.wait_for_value(slot_value)?;
        }

        let command_buffer = self.record(slot_index, &plan)?;

        let signal_value = self.last_signal_value + 1;
        let wait_infos: Vec<vk::SemaphoreSubmitInfo> = plan
            .method
            .graphics_wait_value(frame)
            .map(|value| vk::SemaphoreSubmitInfo {
                semaphore: graphics_timeline,
                value,
                stage_mask: vk::PipelineStageFlags2::ALL_COMMANDS,
                ..Default::default()
            })
            .into_iter()
            .collect();
        let signal_infos = [self.semaphore.signal_info(signal_value)];
        let command_buffer_infos = [vk::CommandBufferSubmitInfo {
            command_buffer,
            ..Default::default()
        }];
        let submit_info = vk::SubmitInfo2 {
            wait_semaphore_info_count: wait_infos.len() as u32,
            p_wait_semaphore_infos: wait_infos.as_ptr(),
            command_buffer_info_count: command_buffer_infos.len() as u32,
            p_command_buffer_infos: command_buffer_infos.as_ptr(),
            signal_semaphore_info_count: signal_infos.len() as u32,
            p_signal_semaphore_infos: signal_infos.as_ptr(),
            ..Default::default()
        };
        self.render_device
            .device()
            .queue_submit2(
                self.render_device.transfer_queue().raw(),
                &[submit_info],
                vk::Fence::null(),
            )
            .map_err(|source| VulkanError::UnableToSubmitCommands {
                queue: "transfer",
                source,
            })?;

        self.last_signal_value = signal_value;
        self.slots[slot_index].last_signal_value = signal_value;

        log::debug!(
            indoc!(
                "
                Submitted uploads for frame {}
                  - buffer copies: {}
                  - buffer barriers: {}
                  - image copies: {}
                  - method: {:?}
                  - transfer value: {}"
            ),
            frame,
            plan.buffer_copies.len(),
            plan.buffer_transfers.len(),
            plan.image_copies.len(),
            plan.method,
            signal_value,
        );

        Ok(plan.acquire_barriers(
            self.families,
            Some((self.semaphore.raw(), signal_value)),
        ))
    }
}

// Private API
// -----------

impl TransferQueue {
    /// Record the plan into the slot's command buffer.
    unsafe fn record(
        &self,
        slot_index: usize,
        plan: &TransferPlan,
    ) -> Result<vk::CommandBuffer, VulkanError> {
        let slot = &self.slots[slot_index];
        let device = self.render_device.device();
        slot.command_pool.reset()?;

        let begin_info = vk::CommandBufferBeginInfo {
            flags: vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT,
            ..Default::default()
        };
        device
            .begin_command_buffer(slot.command_buffer, &begin_info)
            .map_err(VulkanError::UnableToBeginCommandBuffer)?;

        record_pipeline_barrier(
            device,
            slot.command_buffer,
            &[],
            &plan.transfer_dst_barriers(),
        );

        for (src, dst, regions) in plan.buffer_copy_groups() {
            device.cmd_copy_buffer(slot.command_buffer, src, dst, &regions);
        }

        for batch in plan.image_copy_batches() {
            record_pipeline_barrier(
                device,
                slot.command_buffer,
                &[],
                &batch.barriers,
            );
            for copy in batch.copies {
                device.cmd_copy_buffer_to_image(
                    slot.command_buffer,
                    copy.src,
                    copy.dst,
                    vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                    &[copy.region],
                );
            }
        }

        let (buffer_barriers, image_barriers) =
            plan.release_barriers(self.families);
        record_pipeline_barrier(
            device,
            slot.command_buffer,
            &buffer_barriers,
            &image_barriers,
        );

        device
            .end_command_buffer(slot.command_buffer)
            .map_err(VulkanError::UnableToEndCommandBuffer)?;

        Ok(slot.command_buffer)
    }
}

impl std::fmt::Debug for TransferQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransferQueue")
            .field("semaphore", &self.semaphore)
            .field("last_signal_value", &self.last_signal_value)
            .field("families", &self.families)
            .finish()
    }
}
