use {
    super::{merge_ranges, BufferUpload, ByteRange},
    ash::vk,
    std::collections::HashMap,
};

/// Remove every destination byte which a later upload overwrites.
///
/// Uploads are walked newest first. Each upload is cut against the ranges
/// already claimed by newer uploads to the same destination buffer, leaving
/// zero, one, or more pieces. Each piece keeps its source offset aligned with
/// its destination offset. The result is in submission order and no two
/// returned uploads write the same destination byte, so executing them in any
/// order gives the same contents as executing every request in order.
pub fn dedup_buffer_copies(uploads: &[BufferUpload]) -> Vec<BufferUpload> {
    let mut claimed: HashMap<vk::Buffer, Vec<ByteRange>> = HashMap::new();
    let mut kept = Vec::with_capacity(uploads.len());
    let mut pieces = vec![];
    let mut scratch = vec![];

    for upload in uploads.iter().rev() {
        let dst_range = upload.dst_range();
        if dst_range.is_empty() {
            continue;
        }
        let claimed_ranges = claimed.entry(upload.dst).or_default();

        pieces.clear();
        pieces.push(dst_range);
        for cut in claimed_ranges.iter() {
            scratch.clear();
            for piece in pieces.iter() {
                scratch.extend(piece.subtract(cut).pieces());
            }
            std::mem::swap(&mut pieces, &mut scratch);
            if pieces.is_empty() {
                break;
            }
        }

        // pieces are produced in address order, reversing here keeps the
        // final list in submission order after the outer reverse
        for piece in pieces.iter().rev() {
            kept.push(BufferUpload {
                src_offset: upload.src_offset + (piece.start - upload.dst_offset),
                dst_offset: piece.start,
                size: piece.size(),
                ..*upload
            });
        }

        claimed_ranges.push(dst_range);
        merge_ranges(claimed_ranges);
    }

    kept.reverse();
    kept
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::graphics::vulkan_api::transfer::Consumer,
        ash::vk::Handle,
        proptest::prelude::*,
    };

    fn upload(src: u64, dst: u64, dst_offset: u64, size: u64) -> BufferUpload {
        BufferUpload {
            src: vk::Buffer::from_raw(src),
            dst: vk::Buffer::from_raw(dst),
            src_offset: 1000,
            dst_offset,
            size,
            consumer: Consumer::VERTEX_INPUT,
        }
    }

    #[test]
    fn later_overlapping_copy_truncates_earlier_copy() {
        let a = upload(1, 10, 0, 100);
        let b = upload(2, 10, 50, 100);

        let copies = dedup_buffer_copies(&[a, b]);

        assert_eq!(copies.len(), 2);
        assert_eq!(copies[0].src, a.src);
        assert_eq!(copies[0].dst_range(), ByteRange { start: 0, end: 50 });
        assert_eq!(copies[0].src_offset, 1000);
        assert_eq!(copies[1], b);
    }

    #[test]
    fn interior_overwrite_splits_the_earlier_copy() {
        let a = upload(1, 10, 0, 100);
        let b = upload(2, 10, 40, 20);

        let copies = dedup_buffer_copies(&[a, b]);

        assert_eq!(copies.len(), 3);
        assert_eq!(copies[0].dst_range(), ByteRange { start: 0, end: 40 });
        assert_eq!(copies[0].src_offset, 1000);
        assert_eq!(copies[1].dst_range(), ByteRange { start: 60, end: 100 });
        assert_eq!(copies[1].src_offset, 1060);
        assert_eq!(copies[2], b);
    }

    #[test]
    fn fully_shadowed_copy_is_dropped() {
        let a = upload(1, 10, 20, 10);
        let b = upload(2, 10, 0, 100);

        assert_eq!(dedup_buffer_copies(&[a, b]), vec![b]);
    }

    #[test]
    fn different_destinations_do_not_interact() {
        let a = upload(1, 10, 0, 100);
        let b = upload(2, 11, 0, 100);

        assert_eq!(dedup_buffer_copies(&[a, b]), vec![a, b]);
    }

    // Simulate the destination bytes as the id of the last source which wrote
    // them.
    fn execute(copies: &[BufferUpload], len: usize) -> Vec<u64> {
        let mut bytes = vec![0; len];
        for copy in copies {
            for i in copy.dst_range().start..copy.dst_range().end {
                let src_byte = copy.src_offset + (i - copy.dst_offset);
                bytes[i as usize] = copy.src.as_raw() * 10_000 + src_byte;
            }
        }
        bytes
    }

    proptest! {
        #[test]
        fn dedup_preserves_last_writer_wins(
            writes in prop::collection::vec((0u64..200, 1u64..64), 1..24)
        ) {
            let uploads: Vec<BufferUpload> = writes
                .iter()
                .enumerate()
                .map(|(i, (offset, size))| {
                    upload(i as u64 + 1, 10, *offset, *size)
                })
                .collect();

            let copies = dedup_buffer_copies(&uploads);

            prop_assert_eq!(execute(&copies, 264), execute(&uploads, 264));
            for (i, a) in copies.iter().enumerate() {
                for b in &copies[i + 1..] {
                    prop_assert!(!a.dst_range().overlaps(&b.dst_range()));
                }
            }
        }
    }
}
