use {
    super::AllocatorError,
    ash::vk,
    std::ffi::c_void,
};

/// An allocated chunk of GPU memory.
///
/// An allocation is a view into a larger block of device memory. The
/// aligned offset is what resources bind to. The padding which was skipped
/// to reach that alignment is remembered so the whole region can be returned
/// to the block's freelist when the allocation is freed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Allocation {
    device_memory: vk::DeviceMemory,
    offset_in_bytes: vk::DeviceSize,
    size_in_bytes: vk::DeviceSize,
    padding_in_bytes: vk::DeviceSize,
    memory_type_index: u32,
    cpu_mapped_ptr: Option<*mut c_void>,
}

// Public API
// ----------

impl Allocation {
    /// Get the size of the allocation in bytes.
    pub fn size_in_bytes(&self) -> u64 {
        self.size_in_bytes
    }

    /// Get the aligned offset from the start of the backing device memory.
    /// This is the offset used when binding the memory to a resource.
    pub fn offset_in_bytes(&self) -> u64 {
        self.offset_in_bytes
    }

    /// The number of bytes skipped before the aligned offset to satisfy the
    /// alignment requirement.
    pub fn padding_in_bytes(&self) -> u64 {
        self.padding_in_bytes
    }

    /// Get the device's memory type index.
    pub fn memory_type_index(&self) -> u32 {
        self.memory_type_index
    }

    /// Get the underlying device memory handle.
    ///
    /// # Safety
    ///
    /// Unsafe because:
    ///   - ownership is not transferred, the memory block still owns the
    ///     device memory and will destroy it when the allocator is destroyed
    pub unsafe fn device_memory(&self) -> vk::DeviceMemory {
        self.device_memory
    }

    /// The host pointer to the start of this allocation, if the backing
    /// memory is host visible.
    pub fn mapped_ptr(&self) -> Option<*mut c_void> {
        self.cpu_mapped_ptr
    }

    /// Copy bytes into the persistently mapped memory for this allocation.
    ///
    /// # Params
    ///
    /// * `offset` - the byte offset from the start of the allocation
    /// * `data` - the bytes to copy
    ///
    /// # Safety
    ///
    /// Unsafe because:
    ///  - the application must ensure the GPU is not reading or writing the
    ///    range while the host writes it
    pub unsafe fn write_bytes(
        &self,
        offset: u64,
        data: &[u8],
    ) -> Result<(), AllocatorError> {
        let mapped_ptr =
            self.cpu_mapped_ptr.ok_or(AllocatorError::MemoryNotMapped)?;
        let len = data.len() as u64;
        if offset + len > self.size_in_bytes {
            return Err(AllocatorError::WriteOutOfBounds {
                offset,
                len,
                size: self.size_in_bytes,
            });
        }
        std::ptr::copy_nonoverlapping(
            data.as_ptr(),
            (mapped_ptr as *mut u8).add(offset as usize),
            data.len(),
        );
        Ok(())
    }

    /// Access the mapped device memory as a slice of T.
    ///
    /// # Safety
    ///
    /// Unsafe because:
    ///  - the application must ensure the GPU is not accessing the memory and
    ///    that no other clone of this allocation is used to alias the slice
    ///  - errors if the host-mapped pointer and offset are not correctly
    ///    aligned for the type T. Use #[repr(C, packed)] on types which will be
    ///    written into GPU buffers to have maximum control over memory layout.
    pub unsafe fn as_slice_mut<T>(
        &mut self,
    ) -> Result<&mut [T], AllocatorError> {
        let mapped_ptr =
            self.cpu_mapped_ptr.ok_or(AllocatorError::MemoryNotMapped)?;

        if (mapped_ptr as usize % std::mem::align_of::<T>()) != 0 {
            return Err(AllocatorError::MemoryNotAlignedForType(
                std::any::type_name::<T>().to_owned(),
            ));
        }

        let number_of_elements =
            self.size_in_bytes as usize / std::mem::size_of::<T>();

        Ok(std::slice::from_raw_parts_mut(
            mapped_ptr as *mut T,
            number_of_elements,
        ))
    }
}

// Internal API
// ------------

impl Allocation {
    /// Create a new memory allocation with the given Vulkan memory handle.
    ///
    /// # Safety
    ///
    /// Unsafe because the memory object is *not* freed automatically. The
    /// application is responsible for freeing the allocation when it is no
    /// longer in use.
    ///
    /// [super::GPUMemoryAllocator] implementations use this to wrap the
    /// device memory they allocate.
    pub unsafe fn new(
        device_memory: vk::DeviceMemory,
        offset_in_bytes: vk::DeviceSize,
        size_in_bytes: vk::DeviceSize,
        memory_type_index: u32,
        cpu_mapped_ptr: Option<*mut c_void>,
    ) -> Self {
        Self {
            device_memory,
            offset_in_bytes,
            size_in_bytes,
            padding_in_bytes: 0,
            memory_type_index,
            cpu_mapped_ptr,
        }
    }

    /// Carve a sub-allocation out of this allocation.
    ///
    /// # Params
    ///
    /// * `offset_in_bytes` - the aligned offset relative to this allocation
    /// * `size_in_bytes` - the size requested by the caller
    /// * `padding_in_bytes` - bytes in front of the offset which belong to the
    ///   sub-allocation's region but are unusable because of alignment
    pub(super) fn suballocate(
        &self,
        offset_in_bytes: u64,
        size_in_bytes: u64,
        padding_in_bytes: u64,
    ) -> Allocation {
        debug_assert!(padding_in_bytes <= offset_in_bytes);
        debug_assert!(offset_in_bytes + size_in_bytes <= self.size_in_bytes);
        let cpu_mapped_ptr = self.cpu_mapped_ptr.map(|ptr| unsafe {
            // SAFE because the offset is within the mapped range of this
            // allocation.
            (ptr as *mut u8).add(offset_in_bytes as usize) as *mut c_void
        });
        Allocation {
            device_memory: self.device_memory,
            offset_in_bytes: self.offset_in_bytes + offset_in_bytes,
            size_in_bytes,
            padding_in_bytes,
            memory_type_index: self.memory_type_index,
            cpu_mapped_ptr,
        }
    }

    /// The start of the region this allocation occupies, including padding.
    pub(super) fn region_offset(&self) -> u64 {
        self.offset_in_bytes - self.padding_in_bytes
    }

    /// The number of bytes this allocation occupies, including padding.
    pub(super) fn region_size(&self) -> u64 {
        self.padding_in_bytes + self.size_in_bytes
    }
}
