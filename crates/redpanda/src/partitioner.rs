//! Partition routing for jobs.
//!
//! Jobs with the same key always land in the same partition, which is what
//! keeps the insert jobs of one import in send order.

/// Maps a key to a partition in `0..num_partitions`.
///
/// FNV-1a, so the mapping is stable across processes and releases; the
/// producer of one deployment and the consumers of another must agree.
pub fn partition_for(key: &str, num_partitions: u32) -> u32 {
    if num_partitions <= 1 {
        return 0;
    }

    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in key.as_bytes() {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    (hash % u64::from(num_partitions)) as u32
}
