//! Splitting an exam's pages into request-sized chunks.

/// Partition `pages` into consecutive chunks of at most `max_pages` items.
///
/// Yields `ceil(N / max_pages)` chunks; all but the last are full. Order is
/// preserved, so concatenating the chunks gives back `pages`. A `max_pages`
/// of 0 is treated as 1.
pub fn chunk_pages<T>(pages: &[T], max_pages: usize) -> Vec<&[T]> {
    pages.chunks(max_pages.max(1)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_counts_and_sizes() {
        for n in 0..=20usize {
            for m in 1..=9usize {
                let pages: Vec<usize> = (1..=n).collect();
                let chunks = chunk_pages(&pages, m);
                assert_eq!(chunks.len(), n.div_ceil(m), "n={n} m={m}");
                assert!(chunks.iter().all(|c| !c.is_empty() && c.len() <= m));
                if let Some((last, full)) = chunks.split_last() {
                    assert!(full.iter().all(|c| c.len() == m));
                    assert!(last.len() <= m);
                }
                let rebuilt: Vec<usize> = chunks.concat();
                assert_eq!(rebuilt, pages, "n={n} m={m}");
            }
        }
    }

    #[test]
    fn default_size_splits_nineteen_pages() {
        let pages: Vec<usize> = (1..=19).collect();
        let sizes: Vec<usize> = chunk_pages(&pages, 8).iter().map(|c| c.len()).collect();
        assert_eq!(sizes, vec![8, 8, 3]);
    }

    #[test]
    fn zero_size_behaves_like_one() {
        let pages = ["a", "b"];
        assert_eq!(chunk_pages(&pages, 0), vec![&["a"][..], &["b"][..]]);
    }
}
