// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Shared text utilities for tokenization and parsing.

/// Check if a byte is a valid identifier start character (letter or underscore).
#[inline]
pub fn is_ident_start(c: u8) -> bool {
    c.is_ascii_alphabetic() || c == b'_'
}

/// Check if a byte is a valid identifier continuation character.
#[inline]
pub fn is_ident_char(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'_'
}

/// Check if a byte is horizontal whitespace (space, tab, or carriage return).
#[inline]
pub fn is_space(c: u8) -> bool {
    c == b' ' || c == b'\t' || c == b'\r'
}

#[inline]
pub fn is_digit(c: u8) -> bool {
    c.is_ascii_digit()
}

#[inline]
pub fn is_bin_digit(c: u8) -> bool {
    c == b'0' || c == b'1'
}

#[inline]
pub fn is_oct_digit(c: u8) -> bool {
    (b'0'..=b'7').contains(&c)
}

#[inline]
pub fn is_hex_digit(c: u8) -> bool {
    c.is_ascii_hexdigit()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ident_start_classification() {
        assert!(is_ident_start(b'a'));
        assert!(is_ident_start(b'Z'));
        assert!(is_ident_start(b'_'));
        assert!(!is_ident_start(b'0'));
        assert!(!is_ident_start(b'.'));
    }

    #[test]
    fn ident_char_classification() {
        assert!(is_ident_char(b'a'));
        assert!(is_ident_char(b'0'));
        assert!(is_ident_char(b'_'));
        assert!(!is_ident_char(b'.'));
        assert!(!is_ident_char(b' '));
    }

    #[test]
    fn digit_classification() {
        assert!(is_bin_digit(b'1'));
        assert!(!is_bin_digit(b'2'));
        assert!(is_oct_digit(b'7'));
        assert!(!is_oct_digit(b'8'));
        assert!(is_hex_digit(b'f'));
        assert!(!is_hex_digit(b'g'));
    }
}
