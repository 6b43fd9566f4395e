//! Deferred destruction of GPU resources.
//!
//! Resources released by the application may still be referenced by
//! command buffers which the GPU has not finished executing. Instead of
//! destroying them immediately, they are queued along with the frame
//! timeline value which the GPU will reach once every frame which could
//! reference them has retired.

mod reclaimer;

use {
    crate::graphics::vulkan_api::{Allocation, VulkanError},
    ash::vk,
    std::collections::VecDeque,
};

pub use self::reclaimer::ResourceReclaimer;

/// When a released resource becomes safe to destroy, relative to the frame
/// which is currently being recorded.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum DestroyAfter {
    /// Destroy once the current frame's submission has completed.
    CurrentFrame,

    /// Destroy once the frame after the current frame has completed. Use this
    /// when commands recorded this frame are submitted with the next frame.
    NextFrame,
}

impl DestroyAfter {
    /// The number of frames to add to the current frame counter.
    pub fn frame_offset(&self) -> u64 {
        match self {
            DestroyAfter::CurrentFrame => 0,
            DestroyAfter::NextFrame => 1,
        }
    }
}

/// The raw Vulkan handles which are destroyed alongside an allocation.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PendingResource {
    Buffer(vk::Buffer),
    Image {
        image: vk::Image,
        view: Option<vk::ImageView>,
    },
}

/// Types which can destroy a pending resource and free its memory.
pub trait DestroyResource {
    /// Destroy the resource handles and free the allocation.
    ///
    /// # Safety
    ///
    /// Unsafe because the GPU must be finished with the resource.
    unsafe fn destroy(
        &mut self,
        resource: PendingResource,
        allocation: Allocation,
    ) -> Result<(), VulkanError>;
}

#[derive(Debug)]
struct DestructionRequest {
    resource: PendingResource,
    allocation: Allocation,
    timeline_value: u64,
}

/// A queue of resources waiting for the GPU to finish with them.
///
/// Requests go into a bounded ring buffer which never reallocates and is
/// kept sorted by timeline value. When the ring is full, for example when
/// the swapchain is rebuilt and many resources are released at once,
/// requests spill into an overflow list which is shrunk back to its
/// baseline capacity once drained. Requests which would be destroyed
/// before the ring's newest entry also go to the overflow list, which is
/// scanned in full on every poll.
#[derive(Debug)]
pub struct DestructionQueue {
    ring: VecDeque<DestructionRequest>,
    ring_capacity: usize,
    overflow: Vec<DestructionRequest>,
    overflow_baseline: usize,
    last_completed_value: u64,
}

// Public API
// ----------

impl DestructionQueue {
    /// Create an empty destruction queue.
    ///
    /// # Params
    ///
    /// * `ring_capacity` - the number of requests held without allocating
    /// * `overflow_baseline` - the capacity the overflow list returns to once
    ///   it has been drained
    pub fn new(ring_capacity: usize, overflow_baseline: usize) -> Self {
        Self {
            ring: VecDeque::with_capacity(ring_capacity),
            ring_capacity,
            overflow: Vec::with_capacity(overflow_baseline),
            overflow_baseline,
            last_completed_value: 0,
        }
    }

    /// Queue a resource for destruction.
    ///
    /// # Params
    ///
    /// * `resource` - the Vulkan handles to destroy
    /// * `allocation` - the memory to free once the handles are destroyed
    /// * `current_frame` - the frame timeline value of the frame currently
    ///   being recorded
    /// * `when` - how many frames after the current one the resource may
    ///   still be used
    ///
    /// # Returns
    ///
    /// The timeline value at which the resource will be destroyed.
    ///
    /// # Panics
    ///
    /// Panics if the GPU has already been observed past the destruction
    /// value. That means the caller's frame counter is behind the GPU, which
    /// is a bug in the frame loop.
    pub fn enqueue(
        &mut self,
        resource: PendingResource,
        allocation: Allocation,
        current_frame: u64,
        when: DestroyAfter,
    ) -> u64 {
        let timeline_value = current_frame + when.frame_offset();
        assert!(
            timeline_value > self.last_completed_value,
            "Destruction scheduled for timeline value {} but the GPU already \
             reached {}",
            timeline_value,
            self.last_completed_value
        );

        let request = DestructionRequest {
            resource,
            allocation,
            timeline_value,
        };
        let out_of_order = self
            .ring
            .back()
            .map(|back| timeline_value < back.timeline_value)
            .unwrap_or(false);
        if out_of_order {
            self.overflow.push(request);
        } else if self.ring.len() < self.ring_capacity {
            self.ring.push_back(request);
        } else {
            if self.overflow.is_empty() {
                log::warn!(
                    "Destruction ring is full ({} entries), using overflow",
                    self.ring_capacity
                );
            }
            self.overflow.push(request);
        }
        timeline_value
    }

    /// Destroy every queued resource whose timeline value has been reached.
    ///
    /// # Params
    ///
    /// * `completed_value` - the GPU's current completion timeline value.
    ///   Every frame with a value at or below this has finished executing.
    /// * `destroyer` - destroys resources and frees their memory
    ///
    /// # Returns
    ///
    /// The number of resources destroyed.
    ///
    /// # Safety
    ///
    /// Unsafe because `completed_value` must come from the GPU. Passing a
    /// value the GPU has not reached destroys resources which are in use.
    pub unsafe fn poll<D>(
        &mut self,
        completed_value: u64,
        destroyer: &mut D,
    ) -> Result<usize, VulkanError>
    where
        D: DestroyResource + ?Sized,
    {
        debug_assert!(completed_value >= self.last_completed_value);
        self.last_completed_value = completed_value.max(self.last_completed_value);

        let mut destroyed = 0;
        while self
            .ring
            .front()
            .map(|request| request.timeline_value <= completed_value)
            .unwrap_or(false)
        {
            if let Some(request) = self.ring.pop_front() {
                Self::destroy_request(request, destroyer)?;
                destroyed += 1;
            }
        }

        // back-to-front so swap_remove only moves entries already checked
        for index in (0..self.overflow.len()).rev() {
            if self.overflow[index].timeline_value <= completed_value {
                let request = self.overflow.swap_remove(index);
                Self::destroy_request(request, destroyer)?;
                destroyed += 1;
            }
        }
        if self.overflow.is_empty()
            && self.overflow.capacity() > self.overflow_baseline
        {
            self.overflow.shrink_to(self.overflow_baseline);
        }

        Ok(destroyed)
    }

    /// Destroy every queued resource regardless of its timeline value.
    ///
    /// # Safety
    ///
    /// Unsafe because the device must be idle.
    pub unsafe fn flush<D>(&mut self, destroyer: &mut D) -> Result<usize, VulkanError>
    where
        D: DestroyResource + ?Sized,
    {
        let mut destroyed = 0;
        for request in self.ring.drain(..).chain(self.overflow.drain(..)) {
            Self::destroy_request(request, destroyer)?;
            destroyed += 1;
        }
        self.overflow.shrink_to(self.overflow_baseline);
        Ok(destroyed)
    }

    /// The number of resources waiting to be destroyed.
    pub fn pending_count(&self) -> usize {
        self.ring.len() + self.overflow.len()
    }

    /// The number of resources which did not fit in the ring.
    pub fn overflow_count(&self) -> usize {
        self.overflow.len()
    }

    /// The current capacity of the overflow list.
    pub fn overflow_capacity(&self) -> usize {
        self.overflow.capacity()
    }

    /// The highest completion value passed to `poll`.
    pub fn last_completed_value(&self) -> u64 {
        self.last_completed_value
    }
}

// Private API
// -----------

impl DestructionQueue {
    unsafe fn destroy_request<D>(
        request: DestructionRequest,
        destroyer: &mut D,
    ) -> Result<(), VulkanError>
    where
        D: DestroyResource + ?Sized,
    {
        log::trace!(
            "Destroying {:?} at timeline value {}",
            request.resource,
            request.timeline_value
        );
        destroyer.destroy(request.resource, request.allocation)
    }
}

#[cfg(test)]
mod tests {
    use {super::*, ash::vk::Handle};

    #[derive(Default)]
    struct RecordingDestroyer {
        destroyed: Vec<PendingResource>,
    }

    impl DestroyResource for RecordingDestroyer {
        unsafe fn destroy(
            &mut self,
            resource: PendingResource,
            _allocation: Allocation,
        ) -> Result<(), VulkanError> {
            self.destroyed.push(resource);
            Ok(())
        }
    }

    fn buffer(raw: u64) -> PendingResource {
        PendingResource::Buffer(vk::Buffer::from_raw(raw))
    }

    fn allocation() -> Allocation {
        unsafe { Allocation::new(vk::DeviceMemory::from_raw(1), 0, 64, 0, None) }
    }

    #[test]
    fn resources_wait_for_their_timeline_value() {
        let mut queue = DestructionQueue::new(8, 2);
        let mut destroyer = RecordingDestroyer::default();

        let value =
            queue.enqueue(buffer(1), allocation(), 10, DestroyAfter::NextFrame);
        assert_eq!(value, 11);

        let destroyed = unsafe { queue.poll(10, &mut destroyer) }.unwrap();
        assert_eq!(destroyed, 0);
        assert!(destroyer.destroyed.is_empty());

        let destroyed = unsafe { queue.poll(11, &mut destroyer) }.unwrap();
        assert_eq!(destroyed, 1);
        assert_eq!(destroyer.destroyed, vec![buffer(1)]);
        assert_eq!(queue.pending_count(), 0);
    }

    #[test]
    fn current_frame_resources_are_destroyed_when_the_frame_completes() {
        let mut queue = DestructionQueue::new(8, 2);
        let mut destroyer = RecordingDestroyer::default();
        queue.enqueue(buffer(1), allocation(), 5, DestroyAfter::CurrentFrame);
        queue.enqueue(buffer(2), allocation(), 6, DestroyAfter::CurrentFrame);

        unsafe { queue.poll(4, &mut destroyer) }.unwrap();
        assert!(destroyer.destroyed.is_empty());

        unsafe { queue.poll(5, &mut destroyer) }.unwrap();
        assert_eq!(destroyer.destroyed, vec![buffer(1)]);

        unsafe { queue.poll(7, &mut destroyer) }.unwrap();
        assert_eq!(destroyer.destroyed, vec![buffer(1), buffer(2)]);
    }

    #[test]
    fn a_full_ring_spills_into_the_overflow_list() {
        let mut queue = DestructionQueue::new(2, 1);
        let mut destroyer = RecordingDestroyer::default();

        for raw in 1..=6 {
            queue.enqueue(buffer(raw), allocation(), 3, DestroyAfter::CurrentFrame);
        }
        assert_eq!(queue.pending_count(), 6);
        assert_eq!(queue.overflow_count(), 4);
        assert!(queue.overflow_capacity() >= 4);

        let destroyed = unsafe { queue.poll(2, &mut destroyer) }.unwrap();
        assert_eq!(destroyed, 0);

        let destroyed = unsafe { queue.poll(3, &mut destroyer) }.unwrap();
        assert_eq!(destroyed, 6);
        assert_eq!(queue.pending_count(), 0);
        assert!(queue.overflow_capacity() < 4);
    }

    #[test]
    fn overflow_entries_are_destroyed_independently() {
        let mut queue = DestructionQueue::new(1, 4);
        let mut destroyer = RecordingDestroyer::default();
        queue.enqueue(buffer(1), allocation(), 10, DestroyAfter::NextFrame);
        queue.enqueue(buffer(2), allocation(), 10, DestroyAfter::NextFrame);
        queue.enqueue(buffer(3), allocation(), 10, DestroyAfter::CurrentFrame);

        unsafe { queue.poll(10, &mut destroyer) }.unwrap();

        assert_eq!(destroyer.destroyed, vec![buffer(3)]);
        assert_eq!(queue.pending_count(), 2);
    }

    #[test]
    fn earlier_requests_are_not_held_back_by_later_ones() {
        let mut queue = DestructionQueue::new(8, 2);
        let mut destroyer = RecordingDestroyer::default();
        queue.enqueue(buffer(1), allocation(), 10, DestroyAfter::NextFrame);
        queue.enqueue(buffer(2), allocation(), 10, DestroyAfter::CurrentFrame);
        queue.enqueue(buffer(3), allocation(), 10, DestroyAfter::NextFrame);
        assert_eq!(queue.overflow_count(), 1);

        let destroyed = unsafe { queue.poll(10, &mut destroyer) }.unwrap();
        assert_eq!(destroyed, 1);
        assert_eq!(destroyer.destroyed, vec![buffer(2)]);

        let destroyed = unsafe { queue.poll(11, &mut destroyer) }.unwrap();
        assert_eq!(destroyed, 2);
        assert_eq!(destroyer.destroyed, vec![buffer(2), buffer(1), buffer(3)]);
        assert_eq!(queue.pending_count(), 0);
    }

    #[test]
    fn flush_destroys_everything() {
        let mut queue = DestructionQueue::new(1, 1);
        let mut destroyer = RecordingDestroyer::default();
        queue.enqueue(buffer(1), allocation(), 1, DestroyAfter::NextFrame);
        queue.enqueue(
            PendingResource::Image {
                image: vk::Image::from_raw(2),
                view: Some(vk::ImageView::from_raw(3)),
            },
            allocation(),
            1,
            DestroyAfter::NextFrame,
        );

        let destroyed = unsafe { queue.flush(&mut destroyer) }.unwrap();

        assert_eq!(destroyed, 2);
        assert_eq!(queue.pending_count(), 0);
    }

    #[test]
    #[should_panic]
    fn scheduling_behind_the_gpu_panics() {
        let mut queue = DestructionQueue::new(4, 1);
        let mut destroyer = RecordingDestroyer::default();
        unsafe { queue.poll(20, &mut destroyer) }.unwrap();

        queue.enqueue(buffer(1), allocation(), 15, DestroyAfter::NextFrame);
    }
}
