//! Split a resolved file list into contiguous, balanced shards.
//!
//! Shards are contiguous runs of the input so adjacently named files stay
//! together. With `len` paths and a target of `t`, there are `min(t, len)`
//! shards of `len / count` paths each; the trailing `len % count` shards take one
//! extra path. Sizes therefore never differ by more than one.
//!
//! ```
//! use ironferry::partition::split_into_shards;
//!
//! let paths: Vec<u32> = (0..7).collect();
//! let shards = split_into_shards(paths, 3);
//! let sizes: Vec<usize> = shards.iter().map(Vec::len).collect();
//! assert_eq!(sizes, vec![2, 2, 3]);
//! ```

/// Partition `items` into at most `target` shards, preserving order.
///
/// A `target` of zero is treated as one. An empty input yields no shards.
#[must_use]
pub fn split_into_shards<T>(items: Vec<T>, target: usize) -> Vec<Vec<T>> {
    let len = items.len();
    if len == 0 {
        return Vec::new();
    }
    let count = target.max(1).min(len);
    let stride = (len / count).max(1);
    let remainder = len - stride * count;

    let mut shards = Vec::with_capacity(count);
    let mut rest = items.into_iter();
    for index in 0..count {
        let size = if index >= count - remainder { stride + 1 } else { stride };
        shards.push(rest.by_ref().take(size).collect());
    }
    debug_assert!(rest.next().is_none());
    shards
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sizes(len: usize, target: usize) -> Vec<usize> {
        split_into_shards((0..len).collect::<Vec<_>>(), target)
            .iter()
            .map(Vec::len)
            .collect()
    }

    #[test]
    fn seven_into_three() {
        assert_eq!(sizes(7, 3), vec![2, 2, 3]);
    }

    #[test]
    fn remainder_spreads_over_trailing_shards() {
        assert_eq!(sizes(8, 3), vec![2, 3, 3]);
        assert_eq!(sizes(10, 4), vec![2, 2, 3, 3]);
    }

    #[test]
    fn fewer_paths_than_target() {
        assert_eq!(sizes(2, 5), vec![1, 1]);
    }

    #[test]
    fn zero_target_is_one_shard() {
        assert_eq!(sizes(4, 0), vec![4]);
    }

    #[test]
    fn empty_input_has_no_shards() {
        assert!(split_into_shards(Vec::<String>::new(), 3).is_empty());
    }

    #[test]
    fn every_item_lands_exactly_once() {
        for len in 1..40 {
            for target in 1..12 {
                let shards = split_into_shards((0..len).collect::<Vec<_>>(), target);
                assert!(shards.len() <= target.min(len));
                let flat: Vec<usize> = shards.iter().flatten().copied().collect();
                assert_eq!(flat, (0..len).collect::<Vec<_>>());
                let max = shards.iter().map(Vec::len).max().unwrap();
                let min = shards.iter().map(Vec::len).min().unwrap();
                assert!(max - min <= 1, "len={len} target={target}");
            }
        }
    }
}
