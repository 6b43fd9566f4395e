//! Runs a few frames of uploads and releases without a window.
//!
//! Every frame rewrites a shared uniform buffer, uploads a short-lived vertex
//! buffer, and releases the vertex buffer from two frames earlier. The first
//! frame also uploads a texture. Graphics submissions only contain the
//! acquire barriers, which is enough to drive the frame timeline.

use {
    anyhow::{Context, Result},
    ash::vk,
    ccthw_gpu_memory::{
        graphics::{
            vulkan_api::{
                Allocation, CommandPool, Consumer, DestroyAfter,
                MemoryLocation, QueueFinder, RenderDevice, TransferMethod,
                MAX_FRAMES_IN_FLIGHT,
            },
            GpuContext, GpuContextConfig,
        },
        logging,
    },
    scopeguard::ScopeGuard,
    std::{collections::VecDeque, ffi::CString, sync::Arc},
};

const FRAME_COUNT: u64 = 8;
const TEXTURE_SIZE: u32 = 64;

fn main() -> Result<()> {
    let _logger = logging::setup()?;

    let entry = unsafe { ash::Entry::load()? };
    let render_device = Arc::new(unsafe { create_render_device(&entry)? });
    let mut context = unsafe {
        GpuContext::new(render_device.clone(), GpuContextConfig::default())?
    };

    let mut graphics_pools = vec![];
    for _ in 0..MAX_FRAMES_IN_FLIGHT {
        let mut pool = unsafe {
            CommandPool::new(
                render_device.clone(),
                render_device.graphics_queue().family_index(),
                vk::CommandPoolCreateFlags::TRANSIENT,
            )?
        };
        pool.allocate_primary_command_buffers(1)?;
        graphics_pools.push(pool);
    }

    let (uniforms, uniforms_allocation) = unsafe {
        context.create_buffer(
            256,
            vk::BufferUsageFlags::TRANSFER_DST
                | vk::BufferUsageFlags::UNIFORM_BUFFER,
            MemoryLocation::DeviceLocal,
        )?
    };
    let (texture, texture_allocation) = unsafe {
        context.create_image(&texture_create_info(), MemoryLocation::DeviceLocal)?
    };

    let mut vertex_buffers: VecDeque<(vk::Buffer, Allocation)> = VecDeque::new();
    for _ in 0..FRAME_COUNT {
        let frame = context.begin_frame()?;

        // the uniform buffer is shared by every frame in flight
        let uniform_data: Vec<u8> =
            (0..256).map(|i| (i as u64 + frame) as u8).collect();
        unsafe {
            context.upload_buffer_data(
                uniforms,
                0,
                &uniform_data,
                Consumer::new(
                    vk::PipelineStageFlags2::VERTEX_SHADER,
                    vk::AccessFlags2::UNIFORM_READ,
                ),
                TransferMethod::SingleBuffered,
            )?;
        }

        let vertices: Vec<u8> = vec![frame as u8; 4096];
        let (vertex_buffer, vertex_allocation) = unsafe {
            context.create_buffer(
                vertices.len() as u64,
                vk::BufferUsageFlags::TRANSFER_DST
                    | vk::BufferUsageFlags::VERTEX_BUFFER,
                MemoryLocation::DeviceLocal,
            )?
        };
        unsafe {
            context.upload_buffer_data(
                vertex_buffer,
                0,
                &vertices,
                Consumer::VERTEX_INPUT,
                TransferMethod::Unsynchronized,
            )?;
        }
        vertex_buffers.push_back((vertex_buffer, vertex_allocation));
        if vertex_buffers.len() > 2 {
            if let Some((buffer, allocation)) = vertex_buffers.pop_front() {
                context.destroy_buffer(buffer, allocation);
            }
        }

        if frame == 1 {
            let texels = vec![255u8; (TEXTURE_SIZE * TEXTURE_SIZE * 4) as usize];
            unsafe {
                context.upload_image_data(
                    texture,
                    vk::ImageSubresourceLayers {
                        aspect_mask: vk::ImageAspectFlags::COLOR,
                        mip_level: 0,
                        base_array_layer: 0,
                        layer_count: 1,
                    },
                    vk::Extent3D {
                        width: TEXTURE_SIZE,
                        height: TEXTURE_SIZE,
                        depth: 1,
                    },
                    &texels,
                    Consumer::FRAGMENT_SHADER_SAMPLED,
                    TransferMethod::Unsynchronized,
                )?;
            }
        }

        let acquire = unsafe { context.commit_transfers()? };

        let pool = &graphics_pools[(frame % MAX_FRAMES_IN_FLIGHT) as usize];
        let command_buffer = pool.primary_command_buffer(0);
        let device = render_device.device();
        unsafe {
            // SAFE because begin_frame waited for the frame which last used
            // this pool
            pool.reset()?;
            device.begin_command_buffer(
                command_buffer,
                &vk::CommandBufferBeginInfo {
                    flags: vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT,
                    ..Default::default()
                },
            )?;
            acquire.record(device, command_buffer);
            device.end_command_buffer(command_buffer)?;

            let wait_infos: Vec<vk::SemaphoreSubmitInfo> =
                acquire.wait_semaphore_submit_info().into_iter().collect();
            let signal_infos = [context.graphics_signal_submit_info()];
            let command_buffer_infos = [vk::CommandBufferSubmitInfo {
                command_buffer,
                ..Default::default()
            }];
            let submit_info = vk::SubmitInfo2 {
                wait_semaphore_info_count: wait_infos.len() as u32,
                p_wait_semaphore_infos: wait_infos.as_ptr(),
                command_buffer_info_count: 1,
                p_command_buffer_infos: command_buffer_infos.as_ptr(),
                signal_semaphore_info_count: 1,
                p_signal_semaphore_infos: signal_infos.as_ptr(),
                ..Default::default()
            };
            device.queue_submit2(
                render_device.graphics_queue().raw(),
                &[submit_info],
                vk::Fence::null(),
            )?;
        }

        log::info!(
            "Frame {} submitted, {} resources waiting for destruction",
            frame,
            context.pending_destructions()
        );
    }

    context.log_memory_stats();

    render_device.wait_idle()?;
    drop(graphics_pools);
    for (buffer, allocation) in vertex_buffers.drain(..) {
        context.destroy_buffer_after(buffer, allocation, DestroyAfter::NextFrame);
    }
    context.destroy_buffer(uniforms, uniforms_allocation);
    context.destroy_image(texture, None, texture_allocation);

    Ok(())
}

fn texture_create_info() -> vk::ImageCreateInfo {
    vk::ImageCreateInfo {
        image_type: vk::ImageType::TYPE_2D,
        format: vk::Format::R8G8B8A8_UNORM,
        extent: vk::Extent3D {
            width: TEXTURE_SIZE,
            height: TEXTURE_SIZE,
            depth: 1,
        },
        mip_levels: 1,
        array_layers: 1,
        samples: vk::SampleCountFlags::TYPE_1,
        tiling: vk::ImageTiling::OPTIMAL,
        usage: vk::ImageUsageFlags::TRANSFER_DST | vk::ImageUsageFlags::SAMPLED,
        sharing_mode: vk::SharingMode::EXCLUSIVE,
        initial_layout: vk::ImageLayout::UNDEFINED,
        ..Default::default()
    }
}

/// Create a Vulkan 1.3 instance and device with timeline semaphores and
/// synchronization2 enabled.
unsafe fn create_render_device(entry: &ash::Entry) -> Result<RenderDevice> {
    let app_name = CString::new("headless uploads")?;
    let engine_name = CString::new("no engine")?;
    let app_info = vk::ApplicationInfo {
        p_application_name: app_name.as_ptr(),
        p_engine_name: engine_name.as_ptr(),
        application_version: vk::make_api_version(0, 1, 0, 0),
        engine_version: vk::make_api_version(0, 1, 0, 0),
        api_version: vk::make_api_version(0, 1, 3, 0),
        ..Default::default()
    };
    let instance = entry.create_instance(
        &vk::InstanceCreateInfo {
            p_application_info: &app_info,
            ..Default::default()
        },
        None,
    )?;
    let instance = scopeguard::guard(instance, |instance| {
        instance.destroy_instance(None);
    });

    let (physical_device, queue_finder) = instance
        .enumerate_physical_devices()?
        .into_iter()
        .filter(|&physical_device| {
            let properties =
                instance.get_physical_device_properties(physical_device);
            properties.api_version >= vk::API_VERSION_1_3
        })
        .find_map(|physical_device| {
            let families = instance
                .get_physical_device_queue_family_properties(physical_device);
            QueueFinder::new(&families)
                .map(|queue_finder| (physical_device, queue_finder))
        })
        .context("No Vulkan 1.3 device with a graphics queue")?;

    let mut vulkan13_features = vk::PhysicalDeviceVulkan13Features {
        synchronization2: vk::TRUE,
        ..Default::default()
    };
    let mut vulkan12_features = vk::PhysicalDeviceVulkan12Features {
        p_next: &mut vulkan13_features as *mut vk::PhysicalDeviceVulkan13Features
            as *mut std::ffi::c_void,
        timeline_semaphore: vk::TRUE,
        ..Default::default()
    };
    let features = vk::PhysicalDeviceFeatures2 {
        p_next: &mut vulkan12_features as *mut vk::PhysicalDeviceVulkan12Features
            as *mut std::ffi::c_void,
        ..Default::default()
    };
    let queue_create_infos = queue_finder.queue_create_infos();
    let create_info = vk::DeviceCreateInfo {
        p_next: &features as *const vk::PhysicalDeviceFeatures2
            as *const std::ffi::c_void,
        queue_create_info_count: queue_create_infos.len() as u32,
        p_queue_create_infos: queue_create_infos.as_ptr(),
        ..Default::default()
    };
    let logical_device =
        instance.create_device(physical_device, &create_info, None)?;

    Ok(RenderDevice::from_raw(
        ScopeGuard::into_inner(instance),
        physical_device,
        logical_device,
        &queue_finder,
    ))
}
