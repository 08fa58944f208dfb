//! Three-state logic values used to evaluate cell functions.
//!
//! Cell functions are evaluated with fully specified inputs when enumerating
//! sensitizing conditions, but the storage state of a sequential cell may be
//! unknown before it has been initialized. [`Logic::X`] carries that unknown
//! through the operators using pessimistic (IEEE 1164 style) truth tables.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitAnd, BitOr, BitXor, Not};

/// A single logic value: driven low, driven high, or unknown.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[repr(u8)]
pub enum Logic {
    /// Logic low (0).
    Zero = 0,
    /// Logic high (1).
    One = 1,
    /// Unknown or uninitialized.
    X = 2,
}

impl Logic {
    /// Converts a character to a [`Logic`] value.
    ///
    /// Accepts '0', '1' and 'x'/'X'.
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            '0' => Some(Logic::Zero),
            '1' => Some(Logic::One),
            'x' | 'X' => Some(Logic::X),
            _ => None,
        }
    }

    /// Returns the known boolean value, or `None` for [`Logic::X`].
    pub fn to_bool(self) -> Option<bool> {
        match self {
            Logic::Zero => Some(false),
            Logic::One => Some(true),
            Logic::X => None,
        }
    }

    /// Returns `true` if the value is `0` or `1`.
    pub fn is_known(self) -> bool {
        self != Logic::X
    }
}

impl From<bool> for Logic {
    fn from(value: bool) -> Self {
        if value {
            Logic::One
        } else {
            Logic::Zero
        }
    }
}

impl fmt::Display for Logic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Logic::Zero => write!(f, "0"),
            Logic::One => write!(f, "1"),
            Logic::X => write!(f, "X"),
        }
    }
}

/// AND: a `0` on either side dominates.
impl BitAnd for Logic {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        use Logic::*;
        match (self, rhs) {
            (Zero, _) | (_, Zero) => Zero,
            (One, One) => One,
            _ => X,
        }
    }
}

/// OR: a `1` on either side dominates.
impl BitOr for Logic {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        use Logic::*;
        match (self, rhs) {
            (One, _) | (_, One) => One,
            (Zero, Zero) => Zero,
            _ => X,
        }
    }
}

/// XOR: unknown if either side is unknown.
impl BitXor for Logic {
    type Output = Self;

    fn bitxor(self, rhs: Self) -> Self {
        use Logic::*;
        match (self, rhs) {
            (Zero, Zero) | (One, One) => Zero,
            (Zero, One) | (One, Zero) => One,
            _ => X,
        }
    }
}

impl Not for Logic {
    type Output = Self;

    fn not(self) -> Self {
        match self {
            Logic::Zero => Logic::One,
            Logic::One => Logic::Zero,
            Logic::X => Logic::X,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use Logic::*;

    #[test]
    fn and_dominance() {
        assert_eq!(Zero & X, Zero);
        assert_eq!(X & Zero, Zero);
        assert_eq!(One & One, One);
        assert_eq!(One & X, X);
    }

    #[test]
    fn or_dominance() {
        assert_eq!(One | X, One);
        assert_eq!(Zero | Zero, Zero);
        assert_eq!(Zero | X, X);
    }

    #[test]
    fn xor_table() {
        assert_eq!(Zero ^ One, One);
        assert_eq!(One ^ One, Zero);
        assert_eq!(One ^ X, X);
    }

    #[test]
    fn not_table() {
        assert_eq!(!Zero, One);
        assert_eq!(!One, Zero);
        assert_eq!(!X, X);
    }

    #[test]
    fn bool_conversions() {
        assert_eq!(Logic::from(true), One);
        assert_eq!(Logic::from(false), Zero);
        assert_eq!(One.to_bool(), Some(true));
        assert_eq!(X.to_bool(), None);
        assert!(!X.is_known());
    }

    #[test]
    fn from_char_and_display() {
        for c in ['0', '1', 'X'] {
            assert_eq!(Logic::from_char(c).unwrap().to_string(), c.to_string());
        }
        assert_eq!(Logic::from_char('x'), Some(X));
        assert_eq!(Logic::from_char('z'), None);
    }
}
