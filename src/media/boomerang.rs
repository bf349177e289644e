// SPDX-License-Identifier: GPL-3.0-only

//! Boomerang frame arrangement

/// Lay a burst out as alternating passes: forward, reverse, forward, ...
///
/// Turning frames are repeated so every pass has the burst's full length.
/// `passes` of 0 is treated as 1.
pub fn arrange_boomerang<T: Clone>(frames: &[T], passes: u32) -> Vec<T> {
    let passes = passes.max(1) as usize;
    let mut arranged = Vec::with_capacity(frames.len() * passes);

    for pass in 0..passes {
        if pass % 2 == 0 {
            arranged.extend(frames.iter().cloned());
        } else {
            arranged.extend(frames.iter().rev().cloned());
        }
    }

    arranged
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_three_passes() {
        assert_eq!(
            arrange_boomerang(&[1, 2, 3], 3),
            vec![1, 2, 3, 3, 2, 1, 1, 2, 3]
        );
    }

    #[test]
    fn test_forward_and_back() {
        assert_eq!(arrange_boomerang(&['a', 'b'], 2), vec!['a', 'b', 'b', 'a']);
    }

    #[test]
    fn test_zero_passes_is_forward_once() {
        assert_eq!(arrange_boomerang(&[7, 8], 0), vec![7, 8]);
    }

    #[test]
    fn test_empty_burst() {
        assert!(arrange_boomerang::<u8>(&[], 3).is_empty());
    }
}
