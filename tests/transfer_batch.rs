use {
    ash::vk::{self, Handle},
    ccthw_gpu_memory::graphics::vulkan_api::{
        BufferUpload, ByteRange, Consumer, QueueFamilies, TransferBatch,
        TransferMethod,
    },
};

const FAMILIES: QueueFamilies = QueueFamilies {
    transfer: 2,
    graphics: 0,
};

fn upload(src: u64, dst: u64, dst_offset: u64, size: u64) -> BufferUpload {
    BufferUpload {
        src: vk::Buffer::from_raw(src),
        dst: vk::Buffer::from_raw(dst),
        src_offset: 0,
        dst_offset,
        size,
        consumer: Consumer::VERTEX_INPUT,
    }
}

#[test]
fn overlapping_copies_keep_the_later_write() {
    let mut batch = TransferBatch::new();
    batch.request_buffer_upload(upload(1, 10, 0, 100), TransferMethod::Unsynchronized);
    batch.request_buffer_upload(upload(2, 10, 50, 100), TransferMethod::Unsynchronized);

    let plan = batch.plan();

    assert_eq!(plan.buffer_copies.len(), 2);
    assert_eq!(plan.buffer_copies[0].src, vk::Buffer::from_raw(1));
    assert_eq!(plan.buffer_copies[0].dst_range(), ByteRange { start: 0, end: 50 });
    assert_eq!(plan.buffer_copies[1], upload(2, 10, 50, 100));

    // one barrier covers both writes
    assert_eq!(plan.buffer_transfers.len(), 1);
    assert_eq!(plan.buffer_transfers[0].range, ByteRange { start: 0, end: 150 });
}

#[test]
fn many_small_updates_produce_one_barrier_pair() {
    let mut batch = TransferBatch::new();
    for i in 0..256 {
        batch.request_buffer_upload(
            upload(1, 10, i * 64, 64),
            TransferMethod::DoubleBuffered,
        );
    }

    let plan = batch.plan();
    let (release_buffers, release_images) = plan.release_barriers(FAMILIES);
    let acquire = plan.acquire_barriers(FAMILIES, None);

    assert_eq!(plan.method, TransferMethod::DoubleBuffered);
    assert_eq!(plan.buffer_copy_groups().len(), 1);
    assert_eq!(release_buffers.len(), 1);
    assert!(release_images.is_empty());
    assert_eq!(acquire.buffer_barriers.len(), 1);
    assert_eq!(acquire.buffer_barriers[0].size, 256 * 64);
    assert_eq!(acquire.buffer_barriers[0].src_queue_family_index, 2);
    assert_eq!(acquire.buffer_barriers[0].dst_queue_family_index, 0);
}

#[test]
fn cleared_batch_plans_nothing() {
    let mut batch = TransferBatch::new();
    batch.request_buffer_upload(upload(1, 10, 0, 16), TransferMethod::SingleBuffered);
    batch.clear();

    let plan = batch.plan();

    assert!(plan.is_empty());
    assert_eq!(plan.method, TransferMethod::Unsynchronized);
}
