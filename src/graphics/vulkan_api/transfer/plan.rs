use {
    super::{
        barriers::write_after_write_barrier, dedup_buffer_copies,
        merge_ranges, BufferUpload, ByteRange, Consumer, ImageUpload,
        TransferMethod,
    },
    ash::vk::{self, Handle},
    std::collections::BTreeMap,
};

/// A merged region of a destination buffer which changes queue ownership
/// after the transfer.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct BufferTransfer {
    pub buffer: vk::Buffer,
    pub range: ByteRange,
    pub consumer: Consumer,
}

/// A range of destination image subresources which were all written by the
/// transfer.
#[derive(Debug, Copy, Clone)]
pub struct ImageTransfer {
    pub image: vk::Image,
    pub range: vk::ImageSubresourceRange,
    pub consumer: Consumer,
}

/// Image copies which can be recorded back to back.
#[derive(Debug)]
pub struct ImageCopyBatch<'a> {
    /// Barriers which order this batch's copies after earlier copies to the
    /// same subresources.
    pub barriers: Vec<vk::ImageMemoryBarrier2>,
    pub copies: &'a [ImageUpload],
}

/// The commands and barriers for one frame's uploads.
#[derive(Debug, Default)]
pub struct TransferPlan {
    /// Deduplicated buffer copies in submission order.
    pub buffer_copies: Vec<BufferUpload>,

    /// One entry per merged destination range.
    pub buffer_transfers: Vec<BufferTransfer>,

    /// Image copies in submission order. Only the last request for each
    /// image region is kept.
    pub image_copies: Vec<ImageUpload>,

    /// Disjoint subresource ranges covering exactly the subresources which
    /// were written.
    pub image_transfers: Vec<ImageTransfer>,

    /// The strictest method requested for the frame.
    pub method: TransferMethod,
}

impl TransferPlan {
    pub fn new(
        buffer_uploads: &[BufferUpload],
        image_uploads: &[ImageUpload],
        method: TransferMethod,
    ) -> Self {
        Self {
            buffer_copies: dedup_buffer_copies(buffer_uploads),
            buffer_transfers: merge_buffer_transfers(buffer_uploads),
            image_copies: dedup_image_copies(image_uploads),
            image_transfers: merge_image_transfers(image_uploads),
            method,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.buffer_copies.is_empty() && self.image_copies.is_empty()
    }

    /// Group consecutive copies which share a source and destination so
    /// each group can be recorded with one vkCmdCopyBuffer.
    pub fn buffer_copy_groups(
        &self,
    ) -> Vec<(vk::Buffer, vk::Buffer, Vec<vk::BufferCopy>)> {
        let mut groups: Vec<(vk::Buffer, vk::Buffer, Vec<vk::BufferCopy>)> =
            vec![];
        for copy in &self.buffer_copies {
            match groups.last_mut() {
                Some((src, dst, regions))
                    if *src == copy.src && *dst == copy.dst =>
                {
                    regions.push(copy.as_buffer_copy());
                }
                _ => groups.push((copy.src, copy.dst, vec![copy.as_buffer_copy()])),
            }
        }
        groups
    }

    /// Split the image copies into batches with no overlapping writes.
    ///
    /// Copy commands are not ordered against each other, so a copy which
    /// overlaps an earlier one starts a new batch. Each batch carries a
    /// barrier for every subresource it writes which an earlier batch also
    /// wrote.
    pub fn image_copy_batches(&self) -> Vec<ImageCopyBatch<'_>> {
        let mut batches = vec![];
        let mut batch_start = 0;
        let mut barriers: Vec<vk::ImageMemoryBarrier2> = vec![];
        for (index, copy) in self.image_copies.iter().enumerate() {
            let current = &self.image_copies[batch_start..index];
            if current.iter().any(|other| regions_overlap(other, copy)) {
                batches.push(ImageCopyBatch {
                    barriers: std::mem::take(&mut barriers),
                    copies: current,
                });
                batch_start = index;
            }

            let earlier = &self.image_copies[..batch_start];
            if earlier.iter().any(|other| regions_overlap(other, copy)) {
                let range = copy.subresource_range();
                let already_ordered = barriers.iter().any(|barrier| {
                    barrier.image == copy.dst
                        && same_subresources(&barrier.subresource_range, &range)
                });
                if !already_ordered {
                    barriers.push(write_after_write_barrier(copy.dst, range));
                }
            }
        }
        if batch_start < self.image_copies.len() {
            batches.push(ImageCopyBatch {
                barriers,
                copies: &self.image_copies[batch_start..],
            });
        }
        batches
    }
}

// Private API
// -----------

/// Merge the ranges written in each destination buffer. The barrier covers
/// every byte written, including bytes a deduplicated copy skips, so the
/// consumer of every request is included.
fn merge_buffer_transfers(uploads: &[BufferUpload]) -> Vec<BufferTransfer> {
    let mut per_buffer: Vec<(vk::Buffer, Vec<ByteRange>, Consumer)> = vec![];
    for upload in uploads {
        let existing = per_buffer
            .iter_mut()
            .find(|(buffer, _, _)| *buffer == upload.dst);
        match existing {
            Some((_, ranges, consumer)) => {
                ranges.push(upload.dst_range());
                *consumer = consumer.merge(upload.consumer);
            }
            None => per_buffer.push((
                upload.dst,
                vec![upload.dst_range()],
                upload.consumer,
            )),
        }
    }

    let mut transfers = vec![];
    for (buffer, mut ranges, consumer) in per_buffer {
        merge_ranges(&mut ranges);
        transfers.extend(ranges.into_iter().map(|range| BufferTransfer {
            buffer,
            range,
            consumer,
        }));
    }
    transfers
}

/// Drop every image copy which a later copy to the same region replaces.
fn dedup_image_copies(uploads: &[ImageUpload]) -> Vec<ImageUpload> {
    uploads
        .iter()
        .enumerate()
        .filter(|(index, upload)| {
            !uploads[index + 1..]
                .iter()
                .any(|later| same_region(upload, later))
        })
        .map(|(_, upload)| *upload)
        .collect()
}

/// Split every write into single subresources, then rebuild ranges which
/// cover exactly those subresources. Layers are joined first within each
/// mip level, then mip levels whose layer runs are identical.
fn merge_image_transfers(uploads: &[ImageUpload]) -> Vec<ImageTransfer> {
    // (image, aspect, mip level, array layer)
    let mut written: BTreeMap<(u64, u32, u32, u32), Consumer> = BTreeMap::new();
    for upload in uploads {
        let range = upload.subresource_range();
        let layers =
            range.base_array_layer..range.base_array_layer + range.layer_count;
        for layer in layers {
            let key = (
                upload.dst.as_raw(),
                range.aspect_mask.as_raw(),
                range.base_mip_level,
                layer,
            );
            written
                .entry(key)
                .and_modify(|consumer| *consumer = consumer.merge(upload.consumer))
                .or_insert(upload.consumer);
        }
    }

    let mut layer_runs: Vec<ImageTransfer> = vec![];
    for ((image, aspect, mip_level, layer), consumer) in written {
        let image = vk::Image::from_raw(image);
        let aspect_mask = vk::ImageAspectFlags::from_raw(aspect);
        match layer_runs.last_mut() {
            Some(run)
                if run.image == image
                    && run.range.aspect_mask == aspect_mask
                    && run.range.base_mip_level == mip_level
                    && run.range.base_array_layer + run.range.layer_count
                        == layer =>
            {
                run.range.layer_count += 1;
                run.consumer = run.consumer.merge(consumer);
            }
            _ => layer_runs.push(ImageTransfer {
                image,
                range: vk::ImageSubresourceRange {
                    aspect_mask,
                    base_mip_level: mip_level,
                    level_count: 1,
                    base_array_layer: layer,
                    layer_count: 1,
                },
                consumer,
            }),
        }
    }

    layer_runs.sort_by_key(|run| {
        (
            run.image.as_raw(),
            run.range.aspect_mask.as_raw(),
            run.range.base_array_layer,
            run.range.layer_count,
            run.range.base_mip_level,
        )
    });
    let mut transfers: Vec<ImageTransfer> = vec![];
    for run in layer_runs {
        match transfers.last_mut() {
            Some(transfer)
                if transfer.image == run.image
                    && transfer.range.aspect_mask == run.range.aspect_mask
                    && transfer.range.base_array_layer
                        == run.range.base_array_layer
                    && transfer.range.layer_count == run.range.layer_count
                    && transfer.range.base_mip_level
                        + transfer.range.level_count
                        == run.range.base_mip_level =>
            {
                transfer.range.level_count += 1;
                transfer.consumer = transfer.consumer.merge(run.consumer);
            }
            _ => transfers.push(run),
        }
    }
    transfers
}

fn same_subresources(
    a: &vk::ImageSubresourceRange,
    b: &vk::ImageSubresourceRange,
) -> bool {
    a.aspect_mask == b.aspect_mask
        && a.base_mip_level == b.base_mip_level
        && a.level_count == b.level_count
        && a.base_array_layer == b.base_array_layer
        && a.layer_count == b.layer_count
}

/// True when both copies write exactly the same texels.
fn same_region(a: &ImageUpload, b: &ImageUpload) -> bool {
    let (a_region, b_region) = (&a.region, &b.region);
    a.dst == b.dst
        && same_subresources(&a.subresource_range(), &b.subresource_range())
        && a_region.image_offset.x == b_region.image_offset.x
        && a_region.image_offset.y == b_region.image_offset.y
        && a_region.image_offset.z == b_region.image_offset.z
        && a_region.image_extent.width == b_region.image_extent.width
        && a_region.image_extent.height == b_region.image_extent.height
        && a_region.image_extent.depth == b_region.image_extent.depth
}

/// True when both copies write at least one common texel.
fn regions_overlap(a: &ImageUpload, b: &ImageUpload) -> bool {
    let (a_range, b_range) = (a.subresource_range(), b.subresource_range());
    let layers_overlap = a_range.base_array_layer
        < b_range.base_array_layer + b_range.layer_count
        && b_range.base_array_layer
            < a_range.base_array_layer + a_range.layer_count;
    a.dst == b.dst
        && a_range.aspect_mask.intersects(b_range.aspect_mask)
        && a_range.base_mip_level == b_range.base_mip_level
        && layers_overlap
        && axis_overlaps(
            a.region.image_offset.x,
            a.region.image_extent.width,
            b.region.image_offset.x,
            b.region.image_extent.width,
        )
        && axis_overlaps(
            a.region.image_offset.y,
            a.region.image_extent.height,
            b.region.image_offset.y,
            b.region.image_extent.height,
        )
        && axis_overlaps(
            a.region.image_offset.z,
            a.region.image_extent.depth,
            b.region.image_offset.z,
            b.region.image_extent.depth,
        )
}

fn axis_overlaps(a_offset: i32, a_extent: u32, b_offset: i32, b_extent: u32) -> bool {
    let (a_start, b_start) = (a_offset as i64, b_offset as i64);
    a_start < b_start + b_extent as i64 && b_start < a_start + a_extent as i64
}
