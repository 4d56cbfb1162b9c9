//! Load order around the focus chunk.

use glam::IVec2;

/// Offsets of every grid cell within `radius` of the origin, nearest first.
///
/// Ties at equal distance are broken by angle so the order is stable. The
/// result is in grid cells; scale by the chunk unit size before adding to a
/// chunk coordinate.
#[must_use]
pub fn spiral_offsets(radius: u32) -> Vec<IVec2> {
    let r = radius as i32;
    let limit = i64::from(r) * i64::from(r);
    let mut offsets: Vec<IVec2> = (-r..=r)
        .flat_map(|y| (-r..=r).map(move |x| IVec2::new(x, y)))
        .filter(|o| distance_sq(*o) <= limit)
        .collect();

    offsets.sort_by(|a, b| {
        distance_sq(*a)
            .cmp(&distance_sq(*b))
            .then_with(|| angle(*a).total_cmp(&angle(*b)))
    });
    offsets
}

fn distance_sq(offset: IVec2) -> i64 {
    let (x, y) = (i64::from(offset.x), i64::from(offset.y));
    x * x + y * y
}

fn angle(offset: IVec2) -> f32 {
    (offset.y as f32).atan2(offset.x as f32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_origin_first() {
        let offsets = spiral_offsets(3);
        assert_eq!(offsets[0], IVec2::ZERO);
        assert!(offsets[1..5].iter().all(|o| distance_sq(*o) == 1));
    }

    #[test]
    fn test_sorted_by_distance() {
        let offsets = spiral_offsets(4);
        assert!(offsets.windows(2).all(|w| distance_sq(w[0]) <= distance_sq(w[1])));
    }

    #[test]
    fn test_disc_membership() {
        assert_eq!(spiral_offsets(0), vec![IVec2::ZERO]);
        assert_eq!(spiral_offsets(1).len(), 5);
        // 3×3 square plus the four axis cells at distance 2.
        assert_eq!(spiral_offsets(2).len(), 13);
        assert!(!spiral_offsets(2).contains(&IVec2::new(2, 1)));
    }

    #[test]
    fn test_deterministic() {
        assert_eq!(spiral_offsets(5), spiral_offsets(5));
    }

    proptest! {
        #[test]
        fn prop_offsets_cover_disc_exactly_once(radius in 0u32..12) {
            let offsets = spiral_offsets(radius);
            let r = radius as i32;
            let expected = (-r..=r)
                .flat_map(|y| (-r..=r).map(move |x| (x, y)))
                .filter(|&(x, y)| x * x + y * y <= r * r)
                .count();
            prop_assert_eq!(offsets.len(), expected);

            let mut sorted = offsets.clone();
            sorted.sort_by_key(|o| (o.x, o.y));
            sorted.dedup();
            prop_assert_eq!(sorted.len(), offsets.len());
        }
    }
}
