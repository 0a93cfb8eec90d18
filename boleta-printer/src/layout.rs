//! Line budget: paper width, codepage and size state in one place
//!
//! Every width decision the builder makes goes through [`LineBudget`], so
//! columns, dot positions and double-width state never drift apart.

use crate::encoding::Codepage;
use crate::error::{PrintError, PrintResult};
use std::str::FromStr;

/// Paper width profile
///
/// `printable_dots` is always `columns * dots_per_char`, so absolute
/// positioning and space padding land on the same dot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaperProfile {
    /// Characters per line in Font A, normal width
    pub columns: usize,
    /// Horizontal dots per Font A character
    pub dots_per_char: u16,
    /// Printer honours `ESC $` absolute horizontal positioning
    pub absolute_positioning: bool,
}

impl PaperProfile {
    /// 58mm paper: 32 columns, 384 dots
    pub const MM58: Self = Self {
        columns: 32,
        dots_per_char: 12,
        absolute_positioning: true,
    };

    /// 76mm paper: 42 columns, 504 dots
    pub const MM76: Self = Self {
        columns: 42,
        dots_per_char: 12,
        absolute_positioning: true,
    };

    /// 80mm paper: 48 columns, 576 dots
    pub const MM80: Self = Self {
        columns: 48,
        dots_per_char: 12,
        absolute_positioning: true,
    };

    pub fn printable_dots(&self) -> u16 {
        self.columns as u16 * self.dots_per_char
    }

    /// Same profile with `ESC $` positioning switched on or off
    pub fn with_absolute_positioning(self, enabled: bool) -> Self {
        Self {
            absolute_positioning: enabled,
            ..self
        }
    }
}

impl Default for PaperProfile {
    fn default() -> Self {
        Self::MM80
    }
}

impl FromStr for PaperProfile {
    type Err = PrintError;

    fn from_str(s: &str) -> PrintResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "58mm" | "58" => Ok(Self::MM58),
            "76mm" | "76" => Ok(Self::MM76),
            "80mm" | "80" => Ok(Self::MM80),
            other => Err(PrintError::InvalidConfig(format!(
                "Unknown paper profile: {}",
                other
            ))),
        }
    }
}

/// Layout of a two-column row after fitting it into the line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairLayout {
    /// Left field, truncated if needed
    pub left: String,
    /// Right field
    pub right: String,
    /// Column where the right field starts
    pub right_column: usize,
    /// Spaces between the fields (>= 1 whenever `left` is non-empty)
    pub gap: usize,
}

/// Tracks the width budget of the current line style
#[derive(Debug, Clone, Copy)]
pub struct LineBudget {
    profile: PaperProfile,
    codepage: Codepage,
    double_width: bool,
}

impl LineBudget {
    pub fn new(profile: PaperProfile, codepage: Codepage) -> Self {
        Self {
            profile,
            codepage,
            double_width: false,
        }
    }

    pub fn profile(&self) -> PaperProfile {
        self.profile
    }

    pub fn codepage(&self) -> Codepage {
        self.codepage
    }

    pub fn set_double_width(&mut self, on: bool) {
        self.double_width = on;
    }

    pub fn is_double_width(&self) -> bool {
        self.double_width
    }

    /// Characters per line in the current size
    pub fn columns(&self) -> usize {
        if self.double_width {
            self.profile.columns / 2
        } else {
            self.profile.columns
        }
    }

    /// Dots per character in the current size
    pub fn dots_per_char(&self) -> u16 {
        if self.double_width {
            self.profile.dots_per_char * 2
        } else {
            self.profile.dots_per_char
        }
    }

    pub fn printable_dots(&self) -> u16 {
        self.profile.printable_dots()
    }

    /// Encoded width of `s` in columns
    pub fn width(&self, s: &str) -> usize {
        self.codepage.width(s)
    }

    /// Full-width rule made of `ch`
    pub fn rule(&self, ch: char) -> String {
        ch.to_string().repeat(self.columns())
    }

    /// Fit `left` and `right` on one line
    ///
    /// The right field keeps its full text and ends at the last column;
    /// the left field is truncated so that exactly one space separates
    /// them when both would not fit.
    pub fn fit_pair(&self, left: &str, right: &str) -> PairLayout {
        let columns = self.columns();
        let right = self.codepage.truncate(right, columns);
        let rw = self.width(&right);
        let right_column = columns - rw;

        let left = if right_column == 0 {
            String::new()
        } else {
            self.codepage.truncate(left, right_column - 1)
        };
        let gap = right_column - self.width(&left);

        PairLayout {
            left,
            right,
            right_column,
            gap,
        }
    }

    /// Absolute dot position that right-aligns `text`
    pub fn right_aligned_dot(&self, text: &str) -> u16 {
        let text_dots = self.width(text) as u32 * self.dots_per_char() as u32;
        (self.printable_dots() as u32).saturating_sub(text_dots) as u16
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn budget() -> LineBudget {
        LineBudget::new(PaperProfile::MM80, Codepage::Windows1252)
    }

    #[test]
    fn test_profiles() {
        assert_eq!(PaperProfile::MM58.printable_dots(), 384);
        assert_eq!(PaperProfile::MM76.printable_dots(), 504);
        assert_eq!(PaperProfile::MM80.printable_dots(), 576);
        assert_eq!("58mm".parse::<PaperProfile>().unwrap(), PaperProfile::MM58);
        assert!("A4".parse::<PaperProfile>().is_err());
    }

    #[test]
    fn test_fit_pair_no_truncation() {
        let pair = budget().fit_pair("Widget", "$ 2.000");
        assert_eq!(pair.left, "Widget");
        assert_eq!(pair.right_column, 48 - 7);
        assert_eq!(pair.gap, 48 - 7 - 6);
    }

    #[test]
    fn test_fit_pair_truncates_with_one_space() {
        let b = budget();
        let long = "X".repeat(60);
        let pair = b.fit_pair(&long, "$ 12.345");
        assert_eq!(pair.gap, 1);
        assert_eq!(b.width(&pair.left) + pair.gap + b.width(&pair.right), 48);
    }

    #[test]
    fn test_fit_pair_never_exceeds_width() {
        let b = LineBudget::new(PaperProfile::MM58, Codepage::Windows1252);
        for left_len in 0..40 {
            for right_len in 1..12 {
                let left = "a".repeat(left_len);
                let right = "9".repeat(right_len);
                let pair = b.fit_pair(&left, &right);
                let used = b.width(&pair.left) + pair.gap + b.width(&pair.right);
                assert!(used <= 32);
                if !pair.left.is_empty() {
                    assert!(pair.gap >= 1);
                }
            }
        }
    }

    #[test]
    fn test_double_width_halves_columns() {
        let mut b = budget();
        b.set_double_width(true);
        assert_eq!(b.columns(), 24);
        assert_eq!(b.dots_per_char(), 24);
        assert_eq!(b.rule('-').len(), 24);
    }

    #[test]
    fn test_right_aligned_dot_matches_column() {
        let mut b = budget();
        let text = "$ 2.000";
        let pair = b.fit_pair("Widget", text);
        assert_eq!(
            b.right_aligned_dot(text),
            pair.right_column as u16 * b.dots_per_char()
        );
        b.set_double_width(true);
        assert_eq!(b.right_aligned_dot(text), 576 - 7 * 24);
    }
}
