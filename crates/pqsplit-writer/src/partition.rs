//! Partition file naming
//!
//! File names depend on the partition index alone:
//! `output_part_{index}.parquet`, the index zero-padded so that a directory
//! listing sorts in partition order.

/// Prefix shared by every partition file
pub const PARTITION_FILE_PREFIX: &str = "output_part_";

/// Default number of digits the index is padded to
pub const DEFAULT_INDEX_WIDTH: usize = 5;

/// Build the file name for partition `index`.
///
/// A `width` of 0 renders the bare index. Indices wider than `width` are
/// never truncated.
pub fn partition_file_name(index: u64, width: usize) -> String {
    format!(
        "{}{:0width$}.parquet",
        PARTITION_FILE_PREFIX,
        index,
        width = width
    )
}

/// Name of the scratch file a partition is staged in before commit
pub(crate) fn staging_file_name(index: u64, width: usize) -> String {
    format!(".{}.tmp", partition_file_name(index, width))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pads_to_width() {
        assert_eq!(partition_file_name(0, 5), "output_part_00000.parquet");
        assert_eq!(partition_file_name(42, 5), "output_part_00042.parquet");
        assert_eq!(partition_file_name(123_456, 5), "output_part_123456.parquet");
    }

    #[test]
    fn zero_width_is_unpadded() {
        assert_eq!(partition_file_name(3, 0), "output_part_3.parquet");
    }

    #[test]
    fn staging_name_is_hidden() {
        let name = staging_file_name(1, 3);
        assert_eq!(name, ".output_part_001.parquet.tmp");
    }
}
