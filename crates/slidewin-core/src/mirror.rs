//! Before-stream history.
//!
//! A stream has no samples before index 0, but transforms that look back
//! (overlap crossfades, derivatives, correlations) need some. The mirror
//! reflects the first real samples about time zero: index `-k` takes the
//! value of `x[k - 1]`, so `x[-1] == x[0]` and the extended stream has no
//! jump at the origin. When fewer real samples exist than the mirror is
//! long, the reflection repeats with period `2n` (symmetric extension).

/// Source index for the `j`-th before-stream sample (`j = 0` is index -1).
#[inline]
pub fn reflect_index(j: usize, n: usize) -> usize {
    debug_assert!(n > 0);
    let m = j % (2 * n);
    if m < n {
        m
    } else {
        2 * n - 1 - m
    }
}

/// Fill `mirror` (oldest first) by reflecting `first` about time zero.
///
/// With no real samples to reflect, the mirror holds `fill`.
pub fn fill_mirror(mirror: &mut [f32], first: &[f32], fill: f32) {
    if first.is_empty() {
        mirror.fill(fill);
        return;
    }
    let len = mirror.len();
    for j in 0..len {
        mirror[len - 1 - j] = first[reflect_index(j, first.len())];
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_reflect_index_symmetric() {
        let n = 3;
        let seq: Vec<usize> = (0..9).map(|j| reflect_index(j, n)).collect();
        assert_eq!(seq, vec![0, 1, 2, 2, 1, 0, 0, 1, 2]);
    }

    #[test]
    fn test_mirror_continuous_at_origin() {
        let first = [0.5, 0.6, 0.7, 0.8];
        let mut mirror = [0.0; 4];
        fill_mirror(&mut mirror, &first, 0.0);

        // Newest before-stream sample equals the first real sample
        assert_eq!(mirror[3], 0.5);
        assert_eq!(mirror, [0.8, 0.7, 0.6, 0.5]);
    }

    #[test]
    fn test_mirror_longer_than_source() {
        let first = [1.0, 2.0];
        let mut mirror = [0.0; 6];
        fill_mirror(&mut mirror, &first, 0.0);
        // index -1..-6 -> x0 x1 x1 x0 x0 x1
        assert_eq!(mirror, [2.0, 1.0, 1.0, 2.0, 2.0, 1.0]);
    }

    #[test]
    fn test_mirror_without_samples() {
        let mut mirror = [3.0; 4];
        fill_mirror(&mut mirror, &[], 0.25);
        assert_eq!(mirror, [0.25; 4]);
    }

    proptest! {
        #[test]
        fn prop_reflect_index_in_range(j in 0usize..10_000, n in 1usize..512) {
            let k = reflect_index(j, n);
            prop_assert!(k < n);
            // Mirror pairs around each period boundary
            prop_assert_eq!(reflect_index(2 * n - 1 - (j % (2 * n)), n), k);
        }
    }
}
