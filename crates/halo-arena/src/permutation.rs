//! Reversible reorderings of particle-parallel arrays.
//!
//! A [`Permutation`] stores the saved order: after [`apply`](Permutation::apply),
//! slot `k` holds the element that was at `order[k]` before. The same
//! permutation is applied to every array that must stay index-aligned with
//! the particles (the membership map in particular), and
//! [`inverse`](Permutation::inverse) restores all of them exactly.

use crate::error::ArenaError;

/// A bijection on `0..len` in gather form.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Permutation {
    order: Vec<usize>,
}

impl Permutation {
    /// The identity permutation on `len` elements.
    pub fn identity(len: usize) -> Self {
        Self {
            order: (0..len).collect(),
        }
    }

    /// Wrap a saved-order vector after checking it is a bijection.
    pub fn from_order(order: Vec<usize>) -> Result<Self, ArenaError> {
        let mut seen = vec![false; order.len()];
        for (k, &src) in order.iter().enumerate() {
            match seen.get_mut(src) {
                Some(s) if !*s => *s = true,
                _ => return Err(ArenaError::InvalidPermutation { position: k }),
            }
        }
        Ok(Self { order })
    }

    /// The stable ordering of `keys`: ties keep their original relative order.
    pub fn sort_by_key<K: Ord>(keys: &[K]) -> Self {
        let mut order: Vec<usize> = (0..keys.len()).collect();
        order.sort_by(|&a, &b| keys[a].cmp(&keys[b]));
        Self { order }
    }

    /// Number of elements permuted.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether the permutation is empty.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// The saved order: slot `k` receives the element at `order()[k]`.
    pub fn order(&self) -> &[usize] {
        &self.order
    }

    /// Whether this is the identity.
    pub fn is_identity(&self) -> bool {
        self.order.iter().enumerate().all(|(k, &src)| k == src)
    }

    /// The permutation that undoes this one.
    pub fn inverse(&self) -> Self {
        let mut inv = vec![0usize; self.order.len()];
        for (k, &src) in self.order.iter().enumerate() {
            inv[src] = k;
        }
        Self { order: inv }
    }

    /// Reorder `data` in place so that `data[k]` becomes the old
    /// `data[order[k]]`.
    ///
    /// Follows each cycle once with swaps, so no element is cloned.
    pub fn apply<T>(&self, data: &mut [T]) -> Result<(), ArenaError> {
        if data.len() != self.order.len() {
            return Err(ArenaError::LengthMismatch {
                expected: self.order.len(),
                found: data.len(),
            });
        }
        let mut visited = vec![false; data.len()];
        for start in 0..data.len() {
            if visited[start] {
                continue;
            }
            let mut j = start;
            loop {
                visited[j] = true;
                let next = self.order[j];
                if next == start {
                    break;
                }
                data.swap(j, next);
                j = next;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn apply_gathers() {
        let p = Permutation::from_order(vec![2, 0, 1]).unwrap();
        let mut data = vec!['a', 'b', 'c'];
        p.apply(&mut data).unwrap();
        assert_eq!(data, vec!['c', 'a', 'b']);
        p.inverse().apply(&mut data).unwrap();
        assert_eq!(data, vec!['a', 'b', 'c']);
    }

    #[test]
    fn sort_by_key_is_stable() {
        let keys = [3, 1, 3, 1, 2];
        let p = Permutation::sort_by_key(&keys);
        assert_eq!(p.order(), &[1, 3, 4, 0, 2]);
    }

    #[test]
    fn from_order_rejects_duplicates_and_out_of_range() {
        assert_eq!(
            Permutation::from_order(vec![0, 0]),
            Err(ArenaError::InvalidPermutation { position: 1 })
        );
        assert_eq!(
            Permutation::from_order(vec![0, 5]),
            Err(ArenaError::InvalidPermutation { position: 1 })
        );
    }

    #[test]
    fn apply_rejects_wrong_length() {
        let p = Permutation::identity(3);
        let mut data = vec![1, 2];
        assert!(matches!(
            p.apply(&mut data),
            Err(ArenaError::LengthMismatch {
                expected: 3,
                found: 2
            })
        ));
    }

    #[test]
    fn empty_permutation() {
        let p = Permutation::sort_by_key::<u32>(&[]);
        assert!(p.is_empty());
        assert!(p.is_identity());
        let mut data: Vec<u8> = Vec::new();
        assert!(p.apply(&mut data).is_ok());
    }

    proptest! {
        #[test]
        fn inverse_restores_original(keys in prop::collection::vec(0u32..8, 0..200)) {
            let p = Permutation::sort_by_key(&keys);
            let original: Vec<usize> = (0..keys.len()).collect();
            let mut data = original.clone();
            p.apply(&mut data).unwrap();
            prop_assert_eq!(&data[..], p.order());
            p.inverse().apply(&mut data).unwrap();
            prop_assert_eq!(data, original);
        }

        #[test]
        fn sorted_keys_are_non_decreasing(keys in prop::collection::vec(0u32..8, 0..200)) {
            let p = Permutation::sort_by_key(&keys);
            let mut sorted = keys.clone();
            p.apply(&mut sorted).unwrap();
            prop_assert!(sorted.windows(2).all(|w| w[0] <= w[1]));
        }
    }
}
