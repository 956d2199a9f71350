//! 指し手

use std::fmt;
use std::str::FromStr;

use crate::error::ParseError;

/// A cell coordinate or one of the four sentinel moves.
///
/// Field order makes the derived `Ord` row-major (y, then x). Sentinels use a
/// negative `y`, which no board coordinate can have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Move {
    pub y: i8,
    pub x: i8,
}

impl Move {
    pub const SWAP: Move = Move { y: -1, x: 0 };
    pub const RESIGN: Move = Move { y: -2, x: 0 };
    pub const NONE: Move = Move { y: -3, x: 0 };
    pub const UNKNOWN: Move = Move { y: -4, x: 0 };

    #[inline]
    pub const fn new(x: i8, y: i8) -> Move {
        Move { y, x }
    }

    /// 盤上の座標かどうか（sentinel でない）
    #[inline]
    pub const fn is_coord(self) -> bool {
        self.y >= 0
    }

    #[inline]
    pub const fn is_swap(self) -> bool {
        self.y == Move::SWAP.y
    }

    /// Pack into 16 bits for storage in atomic node fields.
    #[inline]
    pub const fn to_u16(self) -> u16 {
        ((self.y as u8 as u16) << 8) | self.x as u8 as u16
    }

    #[inline]
    pub const fn from_u16(v: u16) -> Move {
        Move { y: (v >> 8) as u8 as i8, x: v as u8 as i8 }
    }
}

impl Default for Move {
    fn default() -> Self {
        Move::NONE
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Move::SWAP => f.write_str("swap"),
            Move::RESIGN => f.write_str("resign"),
            Move::NONE => f.write_str("none"),
            Move::UNKNOWN => f.write_str("unknown"),
            Move { y, x } => write!(f, "{}{}", (b'a' + y as u8) as char, x as i32 + 1),
        }
    }
}

impl FromStr for Move {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim().to_ascii_lowercase();
        match text.as_str() {
            "swap" => return Ok(Move::SWAP),
            "resign" => return Ok(Move::RESIGN),
            "none" => return Ok(Move::NONE),
            "unknown" => return Ok(Move::UNKNOWN),
            _ => {}
        }

        let invalid = || ParseError::InvalidMove(s.to_string());
        let mut chars = text.chars();
        let row = chars.next().filter(char::is_ascii_lowercase).ok_or_else(invalid)?;
        let col: i32 = chars.as_str().parse().map_err(|_| invalid())?;
        if !(1..=i8::MAX as i32).contains(&col) {
            return Err(invalid());
        }
        Ok(Move::new((col - 1) as i8, (row as u8 - b'a') as i8))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_move_text() {
        assert_eq!(Move::new(2, 0).to_string(), "a3");
        assert_eq!("c1".parse::<Move>().unwrap(), Move::new(0, 2));
        assert_eq!("SWAP".parse::<Move>().unwrap(), Move::SWAP);
        assert_eq!(Move::RESIGN.to_string(), "resign");
        assert!("c0".parse::<Move>().is_err());
        assert!("3c".parse::<Move>().is_err());
        assert!("".parse::<Move>().is_err());
    }

    #[test]
    fn test_move_ordering_is_row_major() {
        assert!(Move::new(5, 0) < Move::new(0, 1));
        assert!(Move::new(1, 3) < Move::new(2, 3));
    }

    #[test]
    fn test_sentinels_are_not_coords() {
        for m in [Move::SWAP, Move::RESIGN, Move::NONE, Move::UNKNOWN] {
            assert!(!m.is_coord());
            assert_eq!(Move::from_u16(m.to_u16()), m);
        }
        assert_eq!(Move::from_u16(Move::new(7, 11).to_u16()), Move::new(7, 11));
    }
}
