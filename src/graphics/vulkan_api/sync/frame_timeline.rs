use {
    crate::graphics::vulkan_api::{
        RenderDevice, TimelineSemaphore, VulkanError, MAX_FRAMES_IN_FLIGHT,
    },
    ash::vk,
    std::sync::Arc,
};

/// Counts frames and tracks their completion on the GPU.
///
/// Frame `F`'s graphics submission signals value `F` on the timeline. A value
/// of N on the timeline means every frame up to and including N is finished.
pub struct FrameTimeline {
    semaphore: TimelineSemaphore,
    current_frame: u64,
}

// Public API
// ----------

impl FrameTimeline {
    /// Create the graphics timeline starting before the first frame.
    ///
    /// # Safety
    ///
    /// Unsafe because:
    ///   - the timeline must be dropped before the render device
    pub unsafe fn new(render_device: Arc<RenderDevice>) -> Result<Self, VulkanError> {
        Ok(Self {
            semaphore: TimelineSemaphore::new(render_device, 0)?,
            current_frame: 0,
        })
    }

    /// Advance to the next frame.
    ///
    /// Blocks until the frame which last used this frame's slot has finished,
    /// which keeps at most [MAX_FRAMES_IN_FLIGHT] frames on the GPU.
    ///
    /// # Returns
    ///
    /// The new frame's number. Frame numbers start at 1.
    pub fn begin_frame(&mut self) -> Result<u64, VulkanError> {
        self.current_frame += 1;
        if let Some(value) = oldest_frame_to_wait_for(self.current_frame) {
            self.semaphore.wait_for_value(value)?;
        }
        Ok(self.current_frame)
    }

    /// The frame currently being recorded. Zero before the first frame.
    pub fn current_frame(&self) -> u64 {
        self.current_frame
    }

    /// The most recent frame the GPU has finished.
    pub fn completed_value(&self) -> Result<u64, VulkanError> {
        self.semaphore.counter_value()
    }

    /// The signal the current frame's graphics submission must include.
    pub fn signal_submit_info(&self) -> vk::SemaphoreSubmitInfo {
        self.semaphore.signal_info(self.current_frame)
    }

    /// The raw graphics timeline semaphore.
    pub fn semaphore(&self) -> vk::Semaphore {
        self.semaphore.raw()
    }
}

impl std::fmt::Debug for FrameTimeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameTimeline")
            .field("semaphore", &self.semaphore)
            .field("current_frame", &self.current_frame)
            .finish()
    }
}

// Private API
// -----------

/// The frame which must be complete before `frame` can start recording.
fn oldest_frame_to_wait_for(frame: u64) -> Option<u64> {
    frame
        .checked_sub(MAX_FRAMES_IN_FLIGHT)
        .filter(|&value| value > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn early_frames_do_not_wait() {
        assert_eq!(oldest_frame_to_wait_for(1), None);
        assert_eq!(oldest_frame_to_wait_for(2), None);
    }

    #[test]
    fn later_frames_wait_for_the_frame_which_used_their_slot() {
        assert_eq!(oldest_frame_to_wait_for(3), Some(1));
        assert_eq!(oldest_frame_to_wait_for(10), Some(8));
    }
}
