// THEORY:
// The merge pass coalesces blobs that probably belong to the same object but
// were labeled separately: split across two thresholds, or broken by a thin
// gap of failing pixels.
//
// Two blobs are candidates when the first one's box overlaps the second one's
// box grown by the caller's margins. Margins are signed, so a negative margin
// demands real overlap deeper than mere touching. The caller's predicate then
// has the final say.
//
// The pass is a fixed-point loop over two queues:
// 1.  Pop the front blob `A` from the current queue.
// 2.  Pop every other blob `B` still in the queue exactly once. Absorb it into
//     `A` if it qualifies, otherwise push it back for a later `A`.
// 3.  Move `A` to the next queue, and repeat until the current one is empty.
// 4.  Swap the queues. If anything merged, run another pass.
//
// Every pass either shrinks the list or changes nothing, so the loop ends.
// Cost is quadratic per pass; blob lists here are tens of entries long.

use std::collections::VecDeque;
use std::mem;

use log::debug;

use crate::core_modules::blob::Blob;
use crate::core_modules::geometry::Margins;

/// Whether `candidate`, grown by `margins`, touches `anchor`'s box.
#[inline]
pub fn within_margins(anchor: &Blob, candidate: &Blob, margins: &Margins) -> bool {
    anchor.rect.overlaps(&candidate.rect.expanded(margins))
}

/// Repeatedly unions overlapping blobs until no pair qualifies. Survivors keep
/// the relative order of the blobs that anchored them.
pub fn merge_blobs(
    blobs: Vec<Blob>,
    margins: &Margins,
    mut can_merge: impl FnMut(&Blob, &Blob) -> bool,
) -> Vec<Blob> {
    let before = blobs.len();
    let mut current: VecDeque<Blob> = blobs.into();
    let mut next: VecDeque<Blob> = VecDeque::with_capacity(current.len());
    let mut passes = 0usize;

    loop {
        passes += 1;
        let mut merged_any = false;

        while let Some(mut anchor) = current.pop_front() {
            for _ in 0..current.len() {
                let Some(candidate) = current.pop_front() else {
                    break;
                };
                if within_margins(&anchor, &candidate, margins) && can_merge(&anchor, &candidate) {
                    anchor.absorb(&candidate);
                    merged_any = true;
                } else {
                    current.push_back(candidate);
                }
            }
            next.push_back(anchor);
        }

        mem::swap(&mut current, &mut next);
        if !merged_any {
            break;
        }
    }

    debug!(
        "merge pass: {} blobs -> {} in {} pass(es)",
        before,
        current.len(),
        passes
    );
    current.into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::geometry::{Point, Rect};

    fn blob(x: i32, y: i32, w: i32, h: i32, code: u32) -> Blob {
        let pixels = (w * h) as u32;
        Blob {
            rect: Rect::new(x, y, w, h),
            pixels,
            perimeter: pixels,
            centroid: Point::new(x + w / 2, y + h / 2),
            rotation: 0.0,
            code,
            count: 1,
        }
    }

    fn always(_: &Blob, _: &Blob) -> bool {
        true
    }

    #[test]
    fn disjoint_blobs_are_untouched() {
        let blobs = vec![blob(0, 0, 2, 2, 1), blob(5, 5, 2, 2, 1)];
        let merged = merge_blobs(blobs.clone(), &Margins::default(), always);
        assert_eq!(merged, blobs);
    }

    #[test]
    fn touching_boxes_need_a_margin() {
        // Adjacent but not overlapping under half-open intervals.
        let blobs = vec![blob(0, 0, 2, 2, 1), blob(2, 0, 2, 2, 1)];
        assert_eq!(merge_blobs(blobs.clone(), &Margins::default(), always).len(), 2);

        let merged = merge_blobs(blobs, &Margins::new(1, 0, 0, 0), always);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].rect, Rect::new(0, 0, 4, 2));
        assert_eq!(merged[0].count, 2);
    }

    #[test]
    fn negative_margins_demand_deeper_overlap() {
        let blobs = vec![blob(0, 0, 4, 4, 1), blob(3, 0, 4, 4, 1)];
        assert_eq!(merge_blobs(blobs.clone(), &Margins::default(), always).len(), 1);
        assert_eq!(merge_blobs(blobs, &Margins::uniform(-1), always).len(), 2);
    }

    #[test]
    fn chains_resolve_over_several_passes() {
        // `a` only reaches `c` through the grown box of `a + b`, and `c` was
        // already examined in the first pass by then.
        let a = blob(0, 0, 2, 2, 0b001);
        let c = blob(6, 0, 2, 2, 0b100);
        let b = blob(3, 0, 2, 2, 0b010);
        let merged = merge_blobs(vec![a, c, b], &Margins::new(2, 0, 0, 0), always);

        assert_eq!(merged.len(), 1);
        let only = merged[0];
        assert_eq!(only.rect, Rect::new(0, 0, 8, 2));
        assert_eq!(only.pixels, 12);
        assert_eq!(only.code, 0b111);
        assert_eq!(only.count, 3);
    }

    #[test]
    fn predicate_can_veto() {
        let blobs = vec![blob(0, 0, 4, 4, 0b01), blob(1, 1, 4, 4, 0b10)];
        let merged = merge_blobs(blobs, &Margins::default(), |a, b| a.code == b.code);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn result_is_a_fixed_point() {
        let blobs: Vec<Blob> = (0..12).map(|i| blob((i * 7) % 40, (i * 11) % 30, 3, 3, 1)).collect();
        let margins = Margins::uniform(2);
        let merged = merge_blobs(blobs, &margins, always);

        for (i, a) in merged.iter().enumerate() {
            for b in &merged[i + 1..] {
                assert!(!within_margins(a, b, &margins), "{a:?} still overlaps {b:?}");
            }
        }
        assert_eq!(merged.iter().map(|b| b.count).sum::<u32>(), 12);
    }

    #[test]
    fn empty_input_stays_empty() {
        assert!(merge_blobs(Vec::new(), &Margins::uniform(5), always).is_empty());
    }
}
