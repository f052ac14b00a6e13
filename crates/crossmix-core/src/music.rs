//! Music theory utilities for harmonic mixing
//!
//! Key parsing and Camelot wheel coordinates. The analysis collaborator
//! reports keys as short strings ("Am", "F#", "Bbm"); everything downstream
//! works on parsed [`MusicalKey`] values so enharmonic spellings (A#m / Bbm)
//! collapse to the same pitch class.

/// Musical key with root note and scale
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MusicalKey {
    /// Root note as semitone offset from C (0=C, 1=C#, ..., 11=B)
    pub root: u8,
    /// true = minor, false = major
    pub minor: bool,
}

/// Camelot wheel position: wheel number 1-12 plus mode letter
///
/// 'A' = minor keys (inner wheel), 'B' = major keys (outer wheel).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CamelotKey {
    pub number: u8,
    pub mode: char,
}

// Camelot numbers indexed by root semitone (0=C .. 11=B).
const CAMELOT_MAJOR: [u8; 12] = [8, 3, 10, 5, 12, 7, 2, 9, 4, 11, 6, 1];
const CAMELOT_MINOR: [u8; 12] = [5, 12, 7, 2, 9, 4, 11, 6, 1, 8, 3, 10];

impl MusicalKey {
    /// Create a new musical key
    pub const fn new(root: u8, minor: bool) -> Self {
        Self {
            root: root % 12,
            minor,
        }
    }

    /// Parse a key string like "Am", "C#m", "F", "Bb", "D minor", "Eb major"
    ///
    /// Accepts the analysis backend's short form (minor suffix "m") as well
    /// as the long " minor"/" major" spelling. Returns `None` for anything
    /// unrecognized - callers treat unknown keys as a neutral score, never
    /// an error.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if s.is_empty() {
            return None;
        }

        let mut chars = s.chars().peekable();

        let root_char = chars.next()?.to_ascii_uppercase();
        let base_root = match root_char {
            'C' => 0,
            'D' => 2,
            'E' => 4,
            'F' => 5,
            'G' => 7,
            'A' => 9,
            'B' => 11,
            _ => return None,
        };

        // Sharp or flat modifier
        let root = match chars.peek() {
            Some('#') => {
                chars.next();
                (base_root + 1) % 12
            }
            Some('b') => {
                chars.next();
                (base_root + 11) % 12 // -1 mod 12
            }
            _ => base_root,
        };

        // Mode suffix: "m", "min", "minor" (with or without a space) mean
        // minor; "maj"/"major" or nothing mean major.
        let remaining: String = chars.collect::<String>().trim().to_lowercase();
        let minor = if remaining.starts_with("maj") {
            false
        } else {
            remaining.starts_with('m')
        };

        Some(Self { root, minor })
    }

    /// Relative major/minor key (3 semitones up from minor, down from major)
    pub fn relative(&self) -> Self {
        if self.minor {
            Self {
                root: (self.root + 3) % 12,
                minor: false,
            }
        } else {
            Self {
                root: (self.root + 9) % 12,
                minor: true,
            }
        }
    }

    /// Camelot wheel coordinate for this key
    pub fn camelot(&self) -> CamelotKey {
        let number = if self.minor {
            CAMELOT_MINOR[self.root as usize]
        } else {
            CAMELOT_MAJOR[self.root as usize]
        };
        let mode = if self.minor { 'A' } else { 'B' };
        CamelotKey { number, mode }
    }
}

impl std::fmt::Display for MusicalKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let note_names = ["C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B"];
        let note = note_names[self.root as usize];
        if self.minor {
            write!(f, "{}m", note)
        } else {
            write!(f, "{}", note)
        }
    }
}

impl std::fmt::Display for CamelotKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.number, self.mode)
    }
}

/// Circular distance between two wheel numbers on the 12-position wheel
pub fn wheel_distance(a: u8, b: u8) -> u8 {
    let raw = (a as i8 - b as i8).unsigned_abs();
    raw.min(12 - raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_major_keys() {
        assert_eq!(MusicalKey::parse("C"), Some(MusicalKey::new(0, false)));
        assert_eq!(MusicalKey::parse("G"), Some(MusicalKey::new(7, false)));
        assert_eq!(MusicalKey::parse("F#"), Some(MusicalKey::new(6, false)));
        assert_eq!(MusicalKey::parse("Bb"), Some(MusicalKey::new(10, false)));
        assert_eq!(MusicalKey::parse("Eb major"), Some(MusicalKey::new(3, false)));
    }

    #[test]
    fn parse_minor_keys() {
        assert_eq!(MusicalKey::parse("Am"), Some(MusicalKey::new(9, true)));
        assert_eq!(MusicalKey::parse("C#m"), Some(MusicalKey::new(1, true)));
        assert_eq!(MusicalKey::parse("Bbm"), Some(MusicalKey::new(10, true)));
        assert_eq!(MusicalKey::parse("D minor"), Some(MusicalKey::new(2, true)));
    }

    #[test]
    fn parse_rejects_garbage() {
        assert_eq!(MusicalKey::parse(""), None);
        assert_eq!(MusicalKey::parse("H#m"), None);
        assert_eq!(MusicalKey::parse("  "), None);
    }

    #[test]
    fn enharmonic_spellings_collapse() {
        assert_eq!(MusicalKey::parse("A#m"), MusicalKey::parse("Bbm"));
        assert_eq!(MusicalKey::parse("Db"), MusicalKey::parse("C#"));
    }

    #[test]
    fn relative_keys() {
        let am = MusicalKey::parse("Am").unwrap();
        let c = MusicalKey::parse("C").unwrap();
        assert_eq!(am.relative(), c);
        assert_eq!(c.relative(), am);
    }

    #[test]
    fn camelot_coordinates() {
        // Am and C are relative - both sit at wheel position 8
        let am = MusicalKey::parse("Am").unwrap();
        let c = MusicalKey::parse("C").unwrap();
        assert_eq!(am.camelot(), CamelotKey { number: 8, mode: 'A' });
        assert_eq!(c.camelot(), CamelotKey { number: 8, mode: 'B' });

        // Spot-check against the analysis backend's wheel: Bbm = 3A, E = 12B
        assert_eq!(MusicalKey::parse("Bbm").unwrap().camelot().number, 3);
        assert_eq!(MusicalKey::parse("E").unwrap().camelot(), CamelotKey { number: 12, mode: 'B' });
    }

    #[test]
    fn wheel_distance_wraps() {
        assert_eq!(wheel_distance(1, 12), 1);
        assert_eq!(wheel_distance(8, 9), 1);
        assert_eq!(wheel_distance(2, 8), 6);
        assert_eq!(wheel_distance(8, 3), 5);
    }
}
