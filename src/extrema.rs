//! Local extrema and the macro silhouettes built from them
//!
//! Peaks and valleys are found with a strict look-around test, so a plateau
//! never elects an extremum. Double tops/bottoms and head-and-shoulders shapes
//! are then plain inequality checks over the last two or three points.

use serde::{Deserialize, Serialize};

use crate::OHLCV;

/// Fewest bars between the two extremes of a double top/bottom
pub const DOUBLE_MIN_GAP: usize = 5;
/// Most bars between the two extremes of a double top/bottom
pub const DOUBLE_MAX_GAP: usize = 25;
/// Fewest bars between a shoulder and the head
pub const SHOULDER_MIN_SPACING: usize = 3;

/// A local peak or valley inside a window
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Extremum {
    /// Position inside the scanned window
    pub index: usize,
    pub value: f64,
}

// ============================================================
// PEAK / VALLEY DETECTION
// ============================================================

/// Bars whose low is strictly below every other low within `radius`.
///
/// `radius` must be at least 1, which [`PatternConfig::validate`] enforces for
/// `extrema_radius`. Debug builds panic on 0; release builds find nothing.
///
/// [`PatternConfig::validate`]: crate::PatternConfig::validate
pub fn find_local_minima<T: OHLCV>(window: &[T], radius: usize) -> Vec<Extremum> {
    find_extrema(window, radius, |b| b.low(), |candidate, other| candidate < other)
}

/// Bars whose high is strictly above every other high within `radius`.
///
/// Same `radius` contract as [`find_local_minima`].
pub fn find_local_maxima<T: OHLCV>(window: &[T], radius: usize) -> Vec<Extremum> {
    find_extrema(window, radius, |b| b.high(), |candidate, other| candidate > other)
}

fn find_extrema<T, V, D>(window: &[T], radius: usize, value: V, dominates: D) -> Vec<Extremum>
where
    V: Fn(&T) -> f64,
    D: Fn(f64, f64) -> bool,
{
    debug_assert!(radius >= 1, "extrema radius must be at least 1");
    let len = window.len();
    if radius == 0 || len < 2 * radius + 1 {
        return Vec::new();
    }

    (radius..len - radius)
        .filter_map(|i| {
            let candidate = value(&window[i]);
            let strict = (i - radius..=i + radius)
                .filter(|&j| j != i)
                .all(|j| dominates(candidate, value(&window[j])));
            strict.then_some(Extremum { index: i, value: candidate })
        })
        .collect()
}

// ============================================================
// MACRO SHAPES
// ============================================================

/// Last two points sit within `tolerance` of each other and 5 to 25 bars apart.
pub fn is_double_pattern(points: &[Extremum], tolerance: f64) -> bool {
    let [.., first, second] = points else {
        return false;
    };

    let lower = first.value.min(second.value);
    if lower <= f64::EPSILON {
        return false;
    }

    let gap = second.index.saturating_sub(first.index);
    (first.value - second.value).abs() / lower < tolerance
        && (DOUBLE_MIN_GAP..=DOUBLE_MAX_GAP).contains(&gap)
}

/// Last three peaks form a head above two matching shoulders.
pub fn is_head_and_shoulders(peaks: &[Extremum], tolerance: f64) -> bool {
    let [.., left, head, right] = peaks else {
        return false;
    };

    if head.value <= left.value || head.value <= right.value {
        return false;
    }

    let lower = left.value.min(right.value);
    if lower <= f64::EPSILON {
        return false;
    }

    (left.value - right.value).abs() / lower < tolerance && well_spaced(left, head, right)
}

/// Last three troughs form a head below two matching shoulders.
pub fn is_inverse_head_and_shoulders(troughs: &[Extremum], tolerance: f64) -> bool {
    let [.., left, head, right] = troughs else {
        return false;
    };

    if head.value >= left.value || head.value >= right.value {
        return false;
    }

    let upper = left.value.max(right.value);
    if upper <= f64::EPSILON {
        return false;
    }

    (left.value - right.value).abs() / upper < tolerance && well_spaced(left, head, right)
}

#[inline]
fn well_spaced(left: &Extremum, head: &Extremum, right: &Extremum) -> bool {
    head.index >= left.index + SHOULDER_MIN_SPACING
        && right.index >= head.index + SHOULDER_MIN_SPACING
}

// ============================================================
// TESTS
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Bar;

    fn from_highs(highs: &[f64]) -> Vec<Bar> {
        highs.iter().map(|&h| Bar::new(h - 1.0, h, h - 2.0, h - 1.0)).collect()
    }

    fn point(index: usize, value: f64) -> Extremum {
        Extremum { index, value }
    }

    #[test]
    fn test_unimodal_window_has_single_peak() {
        let bars = from_highs(&[1.0, 2.0, 3.0, 4.0, 9.0, 5.0, 3.0, 2.0, 1.0]);
        let peaks = find_local_maxima(&bars, 4);
        assert_eq!(peaks, vec![point(4, 9.0)]);
    }

    #[test]
    fn test_plateau_elects_nothing() {
        let bars = from_highs(&[1.0, 2.0, 5.0, 5.0, 2.0, 1.0]);
        assert!(find_local_maxima(&bars, 1).is_empty());

        let flat = from_highs(&[3.0; 10]);
        assert!(find_local_maxima(&flat, 2).is_empty());
        assert!(find_local_minima(&flat, 2).is_empty());
    }

    #[test]
    fn test_minima_use_lows() {
        let bars = from_highs(&[10.0, 8.0, 6.0, 8.0, 10.0, 7.0, 10.0]);
        let minima = find_local_minima(&bars, 1);
        assert_eq!(minima.len(), 2);
        assert_eq!(minima[0], point(2, 4.0));
        assert_eq!(minima[1], point(5, 5.0));
    }

    #[test]
    fn test_short_window_has_no_extrema() {
        let bars = from_highs(&[1.0, 3.0, 1.0]);
        assert!(find_local_maxima(&bars, 2).is_empty());
        assert_eq!(find_local_maxima(&bars, 1).len(), 1);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "extrema radius must be at least 1")]
    fn test_zero_radius_is_rejected() {
        let bars = from_highs(&[1.0, 3.0, 1.0]);
        find_local_maxima(&bars, 0);
    }

    #[test]
    fn test_zero_radius_config_fails_validation() {
        let config = crate::PatternConfig { extrema_radius: 0, ..Default::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_double_pattern() {
        assert!(is_double_pattern(&[point(3, 100.0), point(13, 101.0)], 0.02));
        // too far apart in value
        assert!(!is_double_pattern(&[point(3, 100.0), point(13, 105.0)], 0.02));
        // gap outside 5..=25
        assert!(!is_double_pattern(&[point(3, 100.0), point(6, 100.0)], 0.02));
        assert!(!is_double_pattern(&[point(0, 100.0), point(30, 100.0)], 0.02));
        assert!(!is_double_pattern(&[point(3, 100.0)], 0.02));
    }

    #[test]
    fn test_head_and_shoulders() {
        let peaks = [point(2, 100.0), point(8, 110.0), point(14, 101.0)];
        assert!(is_head_and_shoulders(&peaks, 0.05));

        let lopsided = [point(2, 100.0), point(8, 110.0), point(14, 108.0)];
        assert!(!is_head_and_shoulders(&lopsided, 0.05));

        let cramped = [point(2, 100.0), point(4, 110.0), point(14, 101.0)];
        assert!(!is_head_and_shoulders(&cramped, 0.05));

        let no_head = [point(2, 100.0), point(8, 99.0), point(14, 101.0)];
        assert!(!is_head_and_shoulders(&no_head, 0.05));
    }

    #[test]
    fn test_inverse_head_and_shoulders() {
        let troughs = [point(1, 90.0), point(7, 80.0), point(13, 91.0)];
        assert!(is_inverse_head_and_shoulders(&troughs, 0.05));
        assert!(!is_head_and_shoulders(&troughs, 0.05));

        let shallow = [point(1, 90.0), point(7, 95.0), point(13, 91.0)];
        assert!(!is_inverse_head_and_shoulders(&shallow, 0.05));
    }
}
