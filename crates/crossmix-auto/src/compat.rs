//! Track compatibility scoring and smart ordering
//!
//! Pure functions mapping two track analyses to BPM/key/energy sub-scores
//! and a weighted overall score with a textual recommendation, plus a greedy
//! ordering over a whole collection. Nothing here fails: unknown keys and
//! degenerate BPMs score neutral so the UI always has a number to show.

use crossmix_core::analysis::TrackAnalysis;
use crossmix_core::music::{wheel_distance, CamelotKey, MusicalKey};
use crossmix_core::types::TrackId;

/// Sub-score weights for the overall compatibility score
const BPM_WEIGHT: f64 = 0.40;
const KEY_WEIGHT: f64 = 0.35;
const ENERGY_WEIGHT: f64 = 0.25;

/// Neutral score used when an input is unknown or degenerate
const NEUTRAL_SCORE: u32 = 50;

/// Camelot coordinate of a key string, `None` for unrecognized keys
pub fn camelot_of(key: &str) -> Option<CamelotKey> {
    MusicalKey::parse(key).map(|k| k.camelot())
}

/// Harmonic compatibility of two key strings, 0-100
///
/// Scored on Camelot wheel geometry: identical coordinate 100, relative
/// major/minor 80, wheel-adjacent same mode 90, the distance-5 "energy
/// boost" jump 70, adjacent cross-mode 65, within two steps 55, then
/// falling off with distance. Unknown keys score a neutral 50.
pub fn key_compatibility(key_a: &str, key_b: &str) -> u32 {
    let (Some(a), Some(b)) = (camelot_of(key_a), camelot_of(key_b)) else {
        return NEUTRAL_SCORE;
    };

    if a == b {
        return 100;
    }
    if a.number == b.number {
        // Relative major/minor - same notes, different mood
        return 80;
    }

    let distance = wheel_distance(a.number, b.number);
    let same_mode = a.mode == b.mode;

    if distance == 1 && same_mode {
        return 90;
    }
    if distance == 5 {
        // The "energy boost" move (raw wheel distances 5 and 7 both land here)
        return 70;
    }
    if distance == 1 {
        return 65;
    }
    if distance <= 2 {
        return 55;
    }
    (50 - 5 * distance as i32).max(20) as u32
}

/// Tempo compatibility of two BPMs, 0-100
///
/// Percent difference of the ratio from 1, with a half/double-time check
/// before giving up: 128 against 64 or 256 is still an 80 because the beats
/// interleave cleanly. Non-positive BPMs score a neutral 50.
pub fn bpm_compatibility(bpm_a: f64, bpm_b: f64) -> u32 {
    if bpm_a <= 0.0 || bpm_b <= 0.0 {
        return NEUTRAL_SCORE;
    }

    let ratio = bpm_a / bpm_b;
    let diff = (1.0 - ratio).abs() * 100.0;

    if diff < 1.0 {
        100
    } else if diff < 3.0 {
        95
    } else if diff < 6.0 {
        85
    } else if diff < 10.0 {
        70
    } else {
        let double_diff = (1.0 - ratio * 2.0).abs() * 100.0;
        let half_diff = (1.0 - ratio / 2.0).abs() * 100.0;
        if double_diff.min(half_diff) < 6.0 {
            80
        } else if diff < 15.0 {
            50
        } else {
            (40.0 - diff).max(10.0).round() as u32
        }
    }
}

/// Energy transition quality from track A into track B, 0-100
///
/// Asymmetric: a gentle build (slightly more energy) is ideal, a drop off
/// a cliff is not.
pub fn energy_flow(energy_a: f64, energy_b: f64) -> u32 {
    let diff = energy_b - energy_a;

    if (0.0..0.15).contains(&diff) {
        100
    } else if diff.abs() < 0.1 {
        95
    } else if (0.15..0.3).contains(&diff) {
        85
    } else if (-0.15..0.0).contains(&diff) {
        80
    } else if diff.abs() < 0.3 {
        70
    } else if diff.abs() < 0.5 {
        55
    } else {
        40
    }
}

/// Full compatibility verdict for a track pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MixCompatibility {
    /// Weighted overall score, 0-100
    pub score: u32,
    pub bpm_match: u32,
    pub key_match: u32,
    pub energy_flow: u32,
    /// Display copy for the score tier
    pub recommendation: &'static str,
}

fn recommendation_for(score: u32) -> &'static str {
    if score >= 90 {
        "Perfect match! These tracks will blend seamlessly."
    } else if score >= 80 {
        "Great mix! Minor adjustments may be needed."
    } else if score >= 70 {
        "Good mix. Consider tempo sync and EQ adjustments."
    } else if score >= 60 {
        "Challenging mix. Use longer transition or different technique."
    } else if score >= 50 {
        "Difficult mix. Consider using a bridge track."
    } else {
        "Not recommended. These tracks may clash."
    }
}

/// Score mixing from track A into track B
///
/// The overall score is the rounded weighted sum of the three sub-scores
/// (0.40 bpm + 0.35 key + 0.25 energy).
pub fn mix_compatibility(a: &TrackAnalysis, b: &TrackAnalysis) -> MixCompatibility {
    let bpm_match = bpm_compatibility(a.bpm, b.bpm);
    let key_match = key_compatibility(&a.key, &b.key);
    let energy = energy_flow(a.energy, b.energy);

    let score = (bpm_match as f64 * BPM_WEIGHT
        + key_match as f64 * KEY_WEIGHT
        + energy as f64 * ENERGY_WEIGHT)
        .round() as u32;

    MixCompatibility {
        score,
        bpm_match,
        key_match,
        energy_flow: energy,
        recommendation: recommendation_for(score),
    }
}

/// Result of [`smart_order`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmartOrder {
    /// Track ids in play order
    pub order: Vec<TrackId>,
    /// Mean of the chosen transition scores (100 for a singleton, 0 empty)
    pub total_score: u32,
}

/// Greedy nearest-neighbor sequencing of a collection
///
/// Starts with the first input track and repeatedly appends the remaining
/// track with the best transition score from the current one. Ties keep the
/// first remaining candidate - input order, which is implementation-defined
/// behavior callers must not rely on.
pub fn smart_order(tracks: &[(TrackId, &TrackAnalysis)]) -> SmartOrder {
    if tracks.is_empty() {
        return SmartOrder {
            order: Vec::new(),
            total_score: 0,
        };
    }
    if tracks.len() == 1 {
        return SmartOrder {
            order: vec![tracks[0].0],
            total_score: 100,
        };
    }

    let mut remaining: Vec<usize> = (1..tracks.len()).collect();
    let mut order = vec![tracks[0].0];
    let mut current = 0usize;
    let mut score_sum = 0u64;
    let mut transitions = 0u64;

    while !remaining.is_empty() {
        let mut best_pos = 0usize;
        let mut best_score = 0u32;
        for (pos, &candidate) in remaining.iter().enumerate() {
            let score = mix_compatibility(tracks[current].1, tracks[candidate].1).score;
            if score > best_score {
                best_score = score;
                best_pos = pos;
            }
        }
        current = remaining.remove(best_pos);
        order.push(tracks[current].0);
        score_sum += best_score as u64;
        transitions += 1;
    }

    SmartOrder {
        order,
        total_score: (score_sum as f64 / transitions as f64).round() as u32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossmix_core::analysis::BeatGrid;

    fn analysis(track_id: TrackId, bpm: f64, key: &str, energy: f64) -> TrackAnalysis {
        TrackAnalysis {
            track_id,
            bpm,
            key: key.to_string(),
            key_number: camelot_of(key).map(|c| c.number).unwrap_or(0),
            key_mode: "minor".to_string(),
            energy,
            energy_curve: Vec::new(),
            beat_grid: BeatGrid::default(),
            drops: Vec::new(),
            peaks: Vec::new(),
            phrase_markers: Vec::new(),
        }
    }

    // --- Key compatibility ---

    #[test]
    fn identical_keys_score_100() {
        for key in ["Am", "C", "F#m", "Bb", "G#m", "Eb"] {
            assert_eq!(key_compatibility(key, key), 100, "key {}", key);
        }
    }

    #[test]
    fn enharmonic_keys_are_identical() {
        assert_eq!(camelot_of("A#m"), camelot_of("Bbm"));
        assert_eq!(key_compatibility("A#m", "Bbm"), 100);
    }

    #[test]
    fn relative_major_minor_scores_80() {
        // Am (8A) and C (8B) share the wheel number
        assert_eq!(key_compatibility("Am", "C"), 80);
        assert_eq!(key_compatibility("C", "Am"), 80);
    }

    #[test]
    fn wheel_adjacent_same_mode_scores_90() {
        // Am (8A) -> Em (9A) and Dm (7A)
        assert_eq!(key_compatibility("Am", "Em"), 90);
        assert_eq!(key_compatibility("Am", "Dm"), 90);
    }

    #[test]
    fn energy_boost_distance_scores_70() {
        // Am (8A) -> Bbm (3A): raw distance 5
        assert_eq!(key_compatibility("Am", "Bbm"), 70);
        // Cm (5A) -> Am (8A) is distance 3, not a boost
        assert_eq!(key_compatibility("Cm", "Am"), 35);
    }

    #[test]
    fn adjacent_cross_mode_scores_65() {
        // Am (8A) -> G (9B): distance 1, different mode
        assert_eq!(key_compatibility("Am", "G"), 65);
    }

    #[test]
    fn unknown_keys_score_neutral() {
        assert_eq!(key_compatibility("??", "Am"), 50);
        assert_eq!(key_compatibility("Am", ""), 50);
        assert_eq!(camelot_of("not a key"), None);
    }

    #[test]
    fn distant_keys_floor_at_20() {
        // Am (8A) -> Ebm (2A): distance 6 -> max(20, 50-30) = 20
        assert_eq!(key_compatibility("Am", "Ebm"), 20);
    }

    // --- BPM compatibility ---

    #[test]
    fn identical_bpm_scores_100() {
        assert_eq!(bpm_compatibility(128.0, 128.0), 100);
        assert_eq!(bpm_compatibility(74.3, 74.3), 100);
    }

    #[test]
    fn half_and_double_time_score_80() {
        assert_eq!(bpm_compatibility(128.0, 64.0), 80);
        assert_eq!(bpm_compatibility(128.0, 256.0), 80);
    }

    #[test]
    fn close_tempos_tier_down() {
        assert_eq!(bpm_compatibility(128.0, 130.0), 95); // ~1.5%
        assert_eq!(bpm_compatibility(128.0, 122.0), 85); // ~4.9%
        assert_eq!(bpm_compatibility(128.0, 118.0), 70); // ~8.5%
    }

    #[test]
    fn far_tempos_floor_at_10() {
        assert_eq!(bpm_compatibility(128.0, 90.0), 10);
    }

    #[test]
    fn degenerate_bpm_scores_neutral() {
        assert_eq!(bpm_compatibility(0.0, 128.0), 50);
        assert_eq!(bpm_compatibility(128.0, -1.0), 50);
    }

    // --- Energy flow ---

    #[test]
    fn gentle_build_is_ideal() {
        assert_eq!(energy_flow(0.6, 0.7), 100);
        assert_eq!(energy_flow(0.5, 0.5), 100); // zero diff counts as a build
    }

    #[test]
    fn energy_tiers() {
        assert_eq!(energy_flow(0.5, 0.45), 95); // small dip
        assert_eq!(energy_flow(0.4, 0.6), 85); // moderate build
        assert_eq!(energy_flow(0.6, 0.48), 80); // slight decrease
        assert_eq!(energy_flow(0.8, 0.6), 70);
        assert_eq!(energy_flow(0.8, 0.4), 55);
        assert_eq!(energy_flow(0.9, 0.3), 40);
    }

    // --- Overall compatibility ---

    #[test]
    fn score_is_weighted_sum() {
        let a = analysis(1, 128.0, "Am", 0.7);
        let b = analysis(2, 124.0, "Em", 0.8);
        let result = mix_compatibility(&a, &b);

        let expected = (result.bpm_match as f64 * 0.40
            + result.key_match as f64 * 0.35
            + result.energy_flow as f64 * 0.25)
            .round() as u32;
        assert_eq!(result.score, expected);
    }

    #[test]
    fn perfect_pair_scenario() {
        // Same tempo and key, gentle energy build: perfect tier
        let a = analysis(1, 128.0, "Am", 0.7);
        let b = analysis(2, 128.0, "Am", 0.75);
        let result = mix_compatibility(&a, &b);
        assert!(result.score > 90, "score {}", result.score);
        assert_eq!(
            result.recommendation,
            "Perfect match! These tracks will blend seamlessly."
        );
    }

    #[test]
    fn clashing_pair_scenario() {
        let a = analysis(1, 128.0, "Am", 0.9);
        let b = analysis(2, 90.0, "F#m", 0.3);
        let result = mix_compatibility(&a, &b);
        assert!(result.score < 50, "score {}", result.score);
        assert_eq!(
            result.recommendation,
            "Not recommended. These tracks may clash."
        );
    }

    #[test]
    fn recommendation_tier_boundaries() {
        assert!(recommendation_for(90).starts_with("Perfect"));
        assert!(recommendation_for(89).starts_with("Great"));
        assert!(recommendation_for(79).starts_with("Good"));
        assert!(recommendation_for(69).starts_with("Challenging"));
        assert!(recommendation_for(59).starts_with("Difficult"));
        assert!(recommendation_for(49).starts_with("Not recommended"));
    }

    // --- Smart ordering ---

    #[test]
    fn empty_collection_orders_empty() {
        let result = smart_order(&[]);
        assert!(result.order.is_empty());
        assert_eq!(result.total_score, 0);
    }

    #[test]
    fn singleton_scores_100() {
        let a = analysis(7, 128.0, "Am", 0.5);
        let result = smart_order(&[(7, &a)]);
        assert_eq!(result.order, vec![7]);
        assert_eq!(result.total_score, 100);
    }

    #[test]
    fn greedy_picks_the_compatible_neighbor_first() {
        // Track 2 matches track 1 exactly; track 3 clashes hard
        let t1 = analysis(1, 128.0, "Am", 0.7);
        let t2 = analysis(2, 128.0, "Am", 0.75);
        let t3 = analysis(3, 90.0, "F#m", 0.2);

        let result = smart_order(&[(1, &t1), (2, &t2), (3, &t3)]);
        assert_eq!(result.order, vec![1, 2, 3]);
    }

    #[test]
    fn total_score_is_mean_of_transitions() {
        let t1 = analysis(1, 128.0, "Am", 0.7);
        let t2 = analysis(2, 128.0, "Am", 0.75);
        let t3 = analysis(3, 90.0, "F#m", 0.2);

        let s12 = mix_compatibility(&t1, &t2).score;
        let s23 = mix_compatibility(&t2, &t3).score;
        let result = smart_order(&[(1, &t1), (2, &t2), (3, &t3)]);
        let expected = ((s12 + s23) as f64 / 2.0).round() as u32;
        assert_eq!(result.total_score, expected);
    }

    #[test]
    fn ties_keep_input_order() {
        // Two identical candidates: the first one in input order wins
        let t1 = analysis(1, 128.0, "Am", 0.7);
        let t2 = analysis(2, 128.0, "Am", 0.7);
        let t3 = analysis(3, 128.0, "Am", 0.7);
        let result = smart_order(&[(1, &t1), (2, &t2), (3, &t3)]);
        assert_eq!(result.order, vec![1, 2, 3]);
    }
}
