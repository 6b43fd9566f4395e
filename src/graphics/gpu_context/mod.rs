mod uploads;

use {
    crate::{
        graphics::{
            vulkan_api::{
                AcquireBarriers, Allocation, AllocatorStats, BufferUpload,
                DestroyAfter, DestructionQueue, FrameTimeline, ImageUpload,
                MemoryConfig, MemoryLocation, MemorySystem,
                PassthroughAllocator, PendingResource, RenderDevice,
                ResourceReclaimer, TransferBatch, TransferMethod,
                TransferQueue, UsageClass,
            },
            GraphicsError,
        },
        logging::PrettyList,
    },
    ash::vk,
    indoc::indoc,
    std::sync::Arc,
};

/// Tunables for the GPU context.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct GpuContextConfig {
    pub memory: MemoryConfig,

    /// Destruction requests which fit without allocating.
    pub destruction_ring_capacity: usize,

    /// The capacity the destruction overflow list shrinks back to once it
    /// drains.
    pub destruction_overflow_baseline: usize,
}

impl Default for GpuContextConfig {
    fn default() -> Self {
        Self {
            memory: MemoryConfig::default(),
            destruction_ring_capacity: 256,
            destruction_overflow_baseline: 16,
        }
    }
}

/// The memory system, destruction queue, frame timeline, and transfer
/// batching for one render device.
///
/// Everything here is driven from the render thread, once per frame:
///
/// 1. `begin_frame` waits for the oldest frame in flight and destroys the
///    resources the GPU is done with
/// 2. resources are created, released, and uploaded to
/// 3. `commit_transfers` submits the frame's uploads and returns the
///    barriers the graphics commands need
/// 4. the graphics submission signals `graphics_signal_submit_info`
pub struct GpuContext {
    transfer_batch: TransferBatch,
    transfer_queue: TransferQueue,
    frame_timeline: FrameTimeline,
    destruction_queue: DestructionQueue,
    memory: MemorySystem<PassthroughAllocator>,
    render_device: Arc<RenderDevice>,
}

// Public API
// ----------

impl GpuContext {
    /// Create the GPU context.
    ///
    /// # Safety
    ///
    /// Unsafe because:
    ///   - the render device must have timeline semaphores and
    ///     synchronization2 enabled
    ///   - resources created through the context must be released through
    ///     the context before it is dropped
    pub unsafe fn new(
        render_device: Arc<RenderDevice>,
        config: GpuContextConfig,
    ) -> Result<Self, GraphicsError> {
        let memory = MemorySystem::new(
            PassthroughAllocator::new(
                render_device.device().clone(),
                *render_device.memory_properties(),
            ),
            *render_device.memory_properties(),
            config.memory,
        );
        let destruction_queue = DestructionQueue::new(
            config.destruction_ring_capacity,
            config.destruction_overflow_baseline,
        );
        let frame_timeline = FrameTimeline::new(render_device.clone())?;
        let transfer_queue = TransferQueue::new(render_device.clone())?;

        let properties = render_device
            .instance()
            .get_physical_device_properties(render_device.physical_device());
        let device_name =
            std::ffi::CStr::from_ptr(properties.device_name.as_ptr())
                .to_string_lossy();
        log::info!(
            indoc!(
                "
                Created GPU context
                  - device: {}
                  - graphics: {}
                  - transfer: {}
                  - config: {:#?}"
            ),
            device_name,
            render_device.graphics_queue(),
            render_device.transfer_queue(),
            config,
        );

        Ok(Self {
            transfer_batch: TransferBatch::new(),
            transfer_queue,
            frame_timeline,
            destruction_queue,
            memory,
            render_device,
        })
    }

    pub fn render_device(&self) -> &Arc<RenderDevice> {
        &self.render_device
    }

    /// Start the next frame.
    ///
    /// Blocks until the frame which last used this frame's slot has finished
    /// on the GPU, then destroys every released resource the GPU is done
    /// with.
    ///
    /// # Returns
    ///
    /// The new frame's number. The frame's graphics submission must signal
    /// it using [Self::graphics_signal_submit_info].
    pub fn begin_frame(&mut self) -> Result<u64, GraphicsError> {
        let frame = self.frame_timeline.begin_frame()?;
        self.poll_destructions()?;
        Ok(frame)
    }

    /// The frame currently being recorded.
    pub fn current_frame(&self) -> u64 {
        self.frame_timeline.current_frame()
    }

    /// Destroy every released resource whose frame has finished on the GPU.
    ///
    /// # Returns
    ///
    /// The number of resources destroyed.
    pub fn poll_destructions(&mut self) -> Result<usize, GraphicsError> {
        let completed_value = self.frame_timeline.completed_value()?;
        let mut reclaimer = ResourceReclaimer::new(
            self.render_device.device(),
            &mut self.memory,
        );
        let destroyed = unsafe {
            // SAFE because the completed value is read from the GPU timeline
            self.destruction_queue.poll(completed_value, &mut reclaimer)?
        };
        if destroyed > 0 {
            log::trace!(
                "Destroyed {} resources at timeline value {}",
                destroyed,
                completed_value
            );
        }
        Ok(destroyed)
    }

    /// Create a buffer bound to memory from the memory system.
    ///
    /// # Params
    ///
    /// * `size_in_bytes` - the buffer's size
    /// * `usage` - how the buffer will be used. Include TRANSFER_DST for
    ///   buffers which receive uploads.
    /// * `location` - where the buffer's memory should live
    ///
    /// # Safety
    ///
    /// Unsafe because:
    ///   - the buffer must be released with [Self::destroy_buffer]
    pub unsafe fn create_buffer(
        &mut self,
        size_in_bytes: u64,
        usage: vk::BufferUsageFlags,
        location: MemoryLocation,
    ) -> Result<(vk::Buffer, Allocation), GraphicsError> {
        let buffer_and_allocation = self.memory.create_buffer(
            self.render_device.device(),
            size_in_bytes,
            usage,
            location,
        )?;
        Ok(buffer_and_allocation)
    }

    /// Create an image bound to memory from the memory system.
    ///
    /// # Safety
    ///
    /// Unsafe because:
    ///   - the image must be released with [Self::destroy_image]
    pub unsafe fn create_image(
        &mut self,
        create_info: &vk::ImageCreateInfo,
        location: MemoryLocation,
    ) -> Result<(vk::Image, Allocation), GraphicsError> {
        let image_and_allocation = self.memory.create_image(
            self.render_device.device(),
            create_info,
            location,
        )?;
        Ok(image_and_allocation)
    }

    /// Release a buffer once the current frame finishes on the GPU.
    pub fn destroy_buffer(&mut self, buffer: vk::Buffer, allocation: Allocation) {
        self.destroy_buffer_after(buffer, allocation, DestroyAfter::CurrentFrame);
    }

    /// Release a buffer once the chosen frame finishes on the GPU.
    pub fn destroy_buffer_after(
        &mut self,
        buffer: vk::Buffer,
        allocation: Allocation,
        when: DestroyAfter,
    ) {
        self.enqueue_destruction(PendingResource::Buffer(buffer), allocation, when);
    }

    /// Release an image and its view once the current frame finishes on the
    /// GPU.
    pub fn destroy_image(
        &mut self,
        image: vk::Image,
        view: Option<vk::ImageView>,
        allocation: Allocation,
    ) {
        self.destroy_image_after(image, view, allocation, DestroyAfter::CurrentFrame);
    }

    /// Release an image and its view once the chosen frame finishes on the
    /// GPU.
    pub fn destroy_image_after(
        &mut self,
        image: vk::Image,
        view: Option<vk::ImageView>,
        allocation: Allocation,
        when: DestroyAfter,
    ) {
        self.enqueue_destruction(
            PendingResource::Image { image, view },
            allocation,
            when,
        );
    }

    /// Queue a buffer copy for this frame's transfer submission.
    pub fn request_buffer_upload(
        &mut self,
        upload: BufferUpload,
        method: TransferMethod,
    ) {
        self.transfer_batch.request_buffer_upload(upload, method);
    }

    /// Queue a buffer-to-image copy for this frame's transfer submission.
    pub fn request_image_upload(
        &mut self,
        upload: ImageUpload,
        method: TransferMethod,
    ) {
        self.transfer_batch.request_image_upload(upload, method);
    }

    /// Submit every upload requested this frame.
    ///
    /// # Returns
    ///
    /// The barriers and semaphore wait the frame's graphics submission must
    /// include before it reads any uploaded resource.
    ///
    /// # Safety
    ///
    /// Unsafe because:
    ///   - every buffer and image referenced by the uploads must still be
    ///     alive. Resources released this frame are safe because they are
    ///     destroyed no earlier than the end of the frame.
    pub unsafe fn commit_transfers(
        &mut self,
    ) -> Result<AcquireBarriers, GraphicsError> {
        let acquire = self.transfer_queue.commit(
            &mut self.transfer_batch,
            self.frame_timeline.current_frame(),
            self.frame_timeline.semaphore(),
        )?;
        Ok(acquire)
    }

    /// The signal the frame's graphics submission must include so the
    /// context knows when the frame finishes.
    pub fn graphics_signal_submit_info(&self) -> vk::SemaphoreSubmitInfo {
        self.frame_timeline.signal_submit_info()
    }

    /// Usage statistics for every allocator.
    pub fn memory_stats(&self) -> Vec<(UsageClass, AllocatorStats)> {
        self.memory.stats()
    }

    /// The number of released resources still waiting on the GPU.
    pub fn pending_destructions(&self) -> usize {
        self.destruction_queue.pending_count()
    }

    /// Log the current memory statistics.
    pub fn log_memory_stats(&self) {
        let allocators: Vec<String> = self
            .memory
            .stats()
            .iter()
            .map(|(usage, stats)| format!("{:?} {}", usage, stats))
            .collect();
        let heaps: Vec<String> = self
            .memory
            .heaps()
            .iter()
            .map(|heap| {
                format!(
                    "heap {}: {} reserved, {} allocated, {} budget",
                    heap.heap_index(),
                    heap.reserved(),
                    heap.allocated(),
                    heap.capacity()
                )
            })
            .collect();
        log::info!(
            indoc!(
                "
                Memory at frame {}
                Allocators:{}
                Heaps:{}
                Pending destructions: {}"
            ),
            self.frame_timeline.current_frame(),
            PrettyList(&allocators),
            PrettyList(&heaps),
            self.destruction_queue.pending_count(),
        );
    }
}

// Private API
// -----------

impl GpuContext {
    fn enqueue_destruction(
        &mut self,
        resource: PendingResource,
        allocation: Allocation,
        when: DestroyAfter,
    ) {
        // resources released before the first frame wait for it
        let frame = self.frame_timeline.current_frame().max(1);
        self.destruction_queue
            .enqueue(resource, allocation, frame, when);
    }
}

impl Drop for GpuContext {
    fn drop(&mut self) {
        unsafe {
            self.render_device
                .wait_idle()
                .expect("Error while waiting for the device to idle!");
            let mut reclaimer = ResourceReclaimer::new(
                self.render_device.device(),
                &mut self.memory,
            );
            self.destruction_queue
                .flush(&mut reclaimer)
                .expect("Error while destroying pending resources!");
            self.memory
                .destroy()
                .expect("Error while freeing device memory blocks!");
        }
    }
}
