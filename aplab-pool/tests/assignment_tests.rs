//! Properties of the position → (slot, source) mapping

use aplab_pool::playback::assignment::{assign, slot_for, source_for};
use aplab_pool::playback::playlist::{expand, PlaylistItem};
use std::collections::BTreeSet;

#[test]
fn test_slot_is_position_mod_pool_size() {
    for k in 1..=8 {
        for position in 0..200 {
            assert_eq!(slot_for(position, k), position % k);
            assert_eq!(assign(position, k, 3).slot_index, position % k);
        }
    }
}

#[test]
fn test_rotation_advances_once_per_cycle() {
    for k in 1..=6 {
        for base_len in 1..=6 {
            for cycle in 0..10 {
                let start = cycle * k;
                let sources: Vec<usize> = (start..start + k)
                    .map(|p| source_for(p, k, base_len))
                    .collect();

                // Depends only on the cycle: slot s gets (s + cycle) mod base_len
                let expected: Vec<usize> = (0..k).map(|s| (s + cycle) % base_len).collect();
                assert_eq!(sources, expected, "k={} base_len={} cycle={}", k, base_len, cycle);

                // Next cycle is the same pattern shifted by one
                let next: Vec<usize> = (start + k..start + 2 * k)
                    .map(|p| source_for(p, k, base_len))
                    .collect();
                let shifted: Vec<usize> = sources.iter().map(|s| (s + 1) % base_len).collect();
                assert_eq!(next, shifted);
            }
        }
    }
}

#[test]
fn test_cycle_with_pool_equal_to_base_is_permutation() {
    let k = 3;
    for cycle in 0..10 {
        let set: BTreeSet<usize> = (cycle * k..cycle * k + k)
            .map(|p| source_for(p, k, 3))
            .collect();
        assert_eq!(set, BTreeSet::from([0, 1, 2]));
    }
}

#[test]
fn test_resolved_content_matches_assignment() {
    let base = vec![
        PlaylistItem::new("a.mp4", "Escapes", 15),
        PlaylistItem::new("b.mp4", "Joyrides", 15),
        PlaylistItem::new("c.mp4", "Meltdowns", 15),
    ];
    let playlist = expand(&base, 30);

    for position in 0..30 {
        let resolved = playlist.resolve(position, 3).unwrap();
        let assignment = assign(position, 3, base.len());
        assert_eq!(resolved.item, base[assignment.source_index]);
        assert_eq!(resolved.label, format!("#{}", position + 1));
    }
}
