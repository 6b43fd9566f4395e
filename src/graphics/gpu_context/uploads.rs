use {
    super::GpuContext,
    crate::graphics::{
        vulkan_api::{
            BufferUpload, Consumer, ImageUpload, MemoryLocation,
            TransferMethod,
        },
        GraphicsError,
    },
    ash::vk,
};

impl GpuContext {
    /// Copy bytes into a device buffer through a temporary staging buffer.
    ///
    /// The staging buffer is released at the end of the current frame.
    ///
    /// # Params
    ///
    /// * `dst` - the destination buffer, created with TRANSFER_DST usage
    /// * `dst_offset` - the byte offset in the destination to write
    /// * `data` - the bytes to upload
    /// * `consumer` - the first graphics stage and access to read the bytes
    /// * `method` - how the upload synchronizes with frames in flight
    ///
    /// # Safety
    ///
    /// Unsafe because:
    ///   - the destination range must be inside the destination buffer
    pub unsafe fn upload_buffer_data(
        &mut self,
        dst: vk::Buffer,
        dst_offset: u64,
        data: &[u8],
        consumer: Consumer,
        method: TransferMethod,
    ) -> Result<(), GraphicsError> {
        if data.is_empty() {
            return Ok(());
        }
        let src = self.create_staging_buffer(data)?;
        self.request_buffer_upload(
            BufferUpload {
                src,
                dst,
                src_offset: 0,
                dst_offset,
                size: data.len() as u64,
                consumer,
            },
            method,
        );
        Ok(())
    }

    /// Copy tightly packed texel data into one subresource of a device image
    /// through a temporary staging buffer.
    ///
    /// # Params
    ///
    /// * `dst` - the destination image, created with TRANSFER_DST usage
    /// * `subresource` - the mip level and array layers to write
    /// * `extent` - the size of the written region in texels, starting at
    ///   the origin
    /// * `data` - the texel bytes
    /// * `consumer` - the first graphics stage and access to read the image
    /// * `method` - how the upload synchronizes with frames in flight
    ///
    /// # Safety
    ///
    /// Unsafe because:
    ///   - the image's previous contents are discarded
    ///   - `data` must hold every texel in the region for the image's format
    pub unsafe fn upload_image_data(
        &mut self,
        dst: vk::Image,
        subresource: vk::ImageSubresourceLayers,
        extent: vk::Extent3D,
        data: &[u8],
        consumer: Consumer,
        method: TransferMethod,
    ) -> Result<(), GraphicsError> {
        if data.is_empty() {
            return Ok(());
        }
        let src = self.create_staging_buffer(data)?;
        self.request_image_upload(
            ImageUpload {
                src,
                dst,
                region: vk::BufferImageCopy {
                    buffer_offset: 0,
                    buffer_row_length: 0,
                    buffer_image_height: 0,
                    image_subresource: subresource,
                    image_offset: vk::Offset3D::default(),
                    image_extent: extent,
                },
                consumer,
            },
            method,
        );
        Ok(())
    }
}

// Private API
// -----------

impl GpuContext {
    /// Create a host-visible buffer holding `data` which is released at the
    /// end of the current frame.
    unsafe fn create_staging_buffer(
        &mut self,
        data: &[u8],
    ) -> Result<vk::Buffer, GraphicsError> {
        let (buffer, allocation) = self.create_buffer(
            data.len() as u64,
            vk::BufferUsageFlags::TRANSFER_SRC,
            MemoryLocation::HostVisible,
        )?;
        let written = allocation.write_bytes(0, data);
        self.destroy_buffer(buffer, allocation);
        written?;
        Ok(buffer)
    }
}
