// THEORY:
// A `Threshold` is the pass/fail predicate for one labeling pass: six inclusive
// bounds, one min/max pair for each L*a*b* channel. Grayscale and binary pixels
// only ever consult the `l` pair (a grayscale pixel's value is compared to it
// directly on the 0..=255 scale; a binary pixel's value is 0 or 1). The invert
// flag flips the result after the bounds test.

use std::fmt;
use std::str::FromStr;

use crate::core_modules::pixel::Lab;

/// Inclusive per-channel bounds for one labeling pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Threshold {
    pub l_min: u8,
    pub l_max: u8,
    pub a_min: i8,
    pub a_max: i8,
    pub b_min: i8,
    pub b_max: i8,
}

impl Default for Threshold {
    /// Accepts every pixel.
    fn default() -> Self {
        Self::new(u8::MIN, u8::MAX, i8::MIN, i8::MAX, i8::MIN, i8::MAX)
    }
}

impl Threshold {
    pub const fn new(l_min: u8, l_max: u8, a_min: i8, a_max: i8, b_min: i8, b_max: i8) -> Self {
        Self {
            l_min,
            l_max,
            a_min,
            a_max,
            b_min,
            b_max,
        }
    }

    /// Bounds on luma only, chroma left wide open.
    pub const fn grayscale(min: u8, max: u8) -> Self {
        Self::new(min, max, i8::MIN, i8::MAX, i8::MIN, i8::MAX)
    }

    /// Passes set bits of a binary image.
    pub const fn binary() -> Self {
        Self::grayscale(1, 1)
    }

    /// Returns a copy with any reversed min/max pair swapped.
    pub fn normalized(self) -> Self {
        Self::new(
            self.l_min.min(self.l_max),
            self.l_min.max(self.l_max),
            self.a_min.min(self.a_max),
            self.a_min.max(self.a_max),
            self.b_min.min(self.b_max),
            self.b_min.max(self.b_max),
        )
    }

    #[inline]
    pub fn matches_binary(&self, bit: bool, invert: bool) -> bool {
        self.matches_grayscale(bit as u8, invert)
    }

    #[inline]
    pub fn matches_grayscale(&self, value: u8, invert: bool) -> bool {
        ((self.l_min..=self.l_max).contains(&value)) ^ invert
    }

    #[inline]
    pub fn matches_lab(&self, lab: Lab, invert: bool) -> bool {
        ((self.l_min..=self.l_max).contains(&lab.l)
            && (self.a_min..=self.a_max).contains(&lab.a)
            && (self.b_min..=self.b_max).contains(&lab.b))
            ^ invert
    }
}

impl fmt::Display for Threshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{},{},{},{}",
            self.l_min, self.l_max, self.a_min, self.a_max, self.b_min, self.b_max
        )
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseThresholdError {
    #[error("expected 2 or 6 comma-separated bounds, got {0}")]
    WrongArity(usize),
    #[error("bound {index} ({value:?}) is not a valid integer for its channel")]
    InvalidBound { index: usize, value: String },
}

impl FromStr for Threshold {
    type Err = ParseThresholdError;

    /// Parses `"lmin,lmax"` or `"lmin,lmax,amin,amax,bmin,bmax"`. Reversed
    /// pairs are normalized.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        if parts.len() != 2 && parts.len() != 6 {
            return Err(ParseThresholdError::WrongArity(parts.len()));
        }

        let invalid = |index: usize| ParseThresholdError::InvalidBound {
            index,
            value: parts[index].to_string(),
        };
        let luma = |index: usize| parts[index].parse::<u8>().map_err(|_| invalid(index));
        let chroma = |index: usize| parts[index].parse::<i8>().map_err(|_| invalid(index));

        let threshold = if parts.len() == 2 {
            Self::grayscale(luma(0)?, luma(1)?)
        } else {
            Self::new(
                luma(0)?,
                luma(1)?,
                chroma(2)?,
                chroma(3)?,
                chroma(4)?,
                chroma(5)?,
            )
        };
        Ok(threshold.normalized())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grayscale_bounds_are_inclusive() {
        let t = Threshold::grayscale(100, 200);
        assert!(!t.matches_grayscale(99, false));
        assert!(t.matches_grayscale(100, false));
        assert!(t.matches_grayscale(200, false));
        assert!(!t.matches_grayscale(201, false));
    }

    #[test]
    fn invert_flips_the_result() {
        let t = Threshold::grayscale(100, 200);
        assert!(t.matches_grayscale(50, true));
        assert!(!t.matches_grayscale(150, true));
    }

    #[test]
    fn binary_threshold_passes_set_bits() {
        let t = Threshold::binary();
        assert!(t.matches_binary(true, false));
        assert!(!t.matches_binary(false, false));
        assert!(t.matches_binary(false, true));
    }

    #[test]
    fn lab_requires_all_three_channels() {
        let t = Threshold::new(30, 70, 40, 127, 20, 127);
        assert!(t.matches_lab(Lab { l: 53, a: 80, b: 67 }, false));
        assert!(!t.matches_lab(Lab { l: 53, a: 0, b: 67 }, false));
        assert!(!t.matches_lab(Lab { l: 90, a: 80, b: 67 }, false));
    }

    #[test]
    fn default_accepts_everything() {
        let t = Threshold::default();
        assert!(t.matches_grayscale(0, false));
        assert!(t.matches_grayscale(255, false));
        assert!(t.matches_lab(Lab { l: 100, a: -128, b: 127 }, false));
    }

    #[test]
    fn parses_short_and_long_forms() {
        assert_eq!("10, 20".parse::<Threshold>(), Ok(Threshold::grayscale(10, 20)));
        assert_eq!(
            "30,70,-10,10,127,-128".parse::<Threshold>(),
            Ok(Threshold::new(30, 70, -10, 10, -128, 127))
        );
        assert_eq!(
            "1,2,3".parse::<Threshold>(),
            Err(ParseThresholdError::WrongArity(3))
        );
        assert!(matches!(
            "0,300".parse::<Threshold>(),
            Err(ParseThresholdError::InvalidBound { index: 1, .. })
        ));
    }

    #[test]
    fn display_round_trips_through_parse() {
        let t = Threshold::new(5, 60, -20, 20, 0, 90);
        assert_eq!(t.to_string().parse::<Threshold>(), Ok(t));
    }
}
