//! Contiguous random windows over a resource pool.

use permload_core::{Error, Result};
use rand::Rng;

/// Pick `k` contiguous items from `pool`.
///
/// The start index is drawn uniformly from `[0, min(len - k, len))`. When
/// `k == len` that range is empty and the whole pool is returned. A window
/// of zero items or one larger than the pool is an error; callers skip
/// selection entirely when they need no items.
pub fn select_window<'a, T, R>(rng: &mut R, pool: &'a [T], k: usize) -> Result<&'a [T]>
where
    R: Rng + ?Sized,
{
    let len = pool.len();
    if k == 0 {
        return Err(Error::Window("window size must be at least 1".into()));
    }
    if k > len {
        return Err(Error::Window(format!(
            "window of {k} requested from a pool of {len}"
        )));
    }

    let max_start = (len - k).min(len);
    if max_start == 0 {
        return Ok(pool);
    }
    let start = rng.gen_range(0..max_start);
    Ok(&pool[start..start + k])
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_window_is_contiguous() {
        let pool: Vec<usize> = (0..10).collect();
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..200 {
            let window = select_window(&mut rng, &pool, 3).unwrap();
            assert_eq!(window.len(), 3);
            let start = window[0];
            assert!(start <= 7);
            assert_eq!(window, &[start, start + 1, start + 2]);
        }
    }

    #[test]
    fn test_full_window_is_whole_pool() {
        let pool = vec!["a", "b", "c"];
        let mut rng = StdRng::seed_from_u64(2);
        assert_eq!(select_window(&mut rng, &pool, 3).unwrap(), &pool[..]);
    }

    #[test]
    fn test_oversized_window_rejected() {
        let pool = vec![1, 2];
        let mut rng = StdRng::seed_from_u64(3);
        assert!(matches!(
            select_window(&mut rng, &pool, 3),
            Err(Error::Window(_))
        ));
    }

    #[test]
    fn test_empty_window_rejected() {
        let pool = vec![1, 2];
        let mut rng = StdRng::seed_from_u64(4);
        assert!(select_window(&mut rng, &pool, 0).is_err());
        let empty: Vec<i32> = Vec::new();
        assert!(select_window(&mut rng, &empty, 0).is_err());
    }

    #[test]
    fn test_seeded_selection_repeats() {
        let pool: Vec<usize> = (0..50).collect();
        let mut a = StdRng::seed_from_u64(9);
        let mut b = StdRng::seed_from_u64(9);
        for _ in 0..20 {
            assert_eq!(
                select_window(&mut a, &pool, 5).unwrap(),
                select_window(&mut b, &pool, 5).unwrap()
            );
        }
    }
}
