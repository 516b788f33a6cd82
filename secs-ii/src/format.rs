// Copyright © 2024 Nathaniel Hardesty
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the “Software”), to
// deal in the Software without restriction, including without limitation the
// rights to use, copy, modify, merge, publish, distribute, sublicense, and/or
// sell copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in
// all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED “AS IS”, WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING
// FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS
// IN THE SOFTWARE.

//! ## ITEM FORMAT
//! **Based on SEMI E5§9.2.2**
//!
//! ----------------------------------------------------------------------------
//!
//! The octal format codes associated with the various [Item] types, expressed
//! as the [Format] enum. The enum is used wherever a format must be stored,
//! compared, or negotiated at runtime: the item header codec, the
//! allowed-format sets of [Dynamic] variables, and the declarative
//! [Data Item] tables.
//!
//! [Item]:      crate::Item
//! [Format]:    Format
//! [Dynamic]:   crate::variables::Dynamic
//! [Data Item]: crate::variables::DataItem

use num_enum::{IntoPrimitive, TryFromPrimitive};

/// ## FORMAT
/// **Based on SEMI E5§9.2.2**
///
/// The format of an [Item], named by its 6-bit octal format code.
///
/// On the wire, the format code occupies the upper 6 bits of the first item
/// header byte; the remaining 2 bits carry the number of length bytes which
/// follow.
///
/// [Item]: crate::Item
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
pub enum Format {
  /// ### LIST
  ///
  /// **Format Code 0o00** - Ordered set of items; length counts child items.
  List = 0o00,

  /// ### BINARY
  ///
  /// **Format Code 0o10** - Single-byte quantity without further meaning.
  Binary = 0o10,

  /// ### BOOLEAN
  ///
  /// **Format Code 0o11** - Single-byte quantity, zero false, non-zero true.
  Boolean = 0o11,

  /// ### ASCII
  ///
  /// **Format Code 0o20** - ASCII character string, one byte per character.
  Ascii = 0o20,

  /// ### JIS-8
  ///
  /// **Format Code 0o21** - JIS-8 character string, one byte per character.
  Jis8 = 0o21,

  /// ### 8-BYTE SIGNED INTEGER
  ///
  /// **Format Code 0o30** - 8-byte two's complement integer.
  I8 = 0o30,

  /// ### 1-BYTE SIGNED INTEGER
  ///
  /// **Format Code 0o31** - 1-byte two's complement integer.
  I1 = 0o31,

  /// ### 2-BYTE SIGNED INTEGER
  ///
  /// **Format Code 0o32** - 2-byte two's complement integer.
  I2 = 0o32,

  /// ### 4-BYTE SIGNED INTEGER
  ///
  /// **Format Code 0o34** - 4-byte two's complement integer.
  I4 = 0o34,

  /// ### 8-BYTE FLOATING POINT NUMBER
  ///
  /// **Format Code 0o40** - 8-byte IEEE-754 floating point number.
  F8 = 0o40,

  /// ### 4-BYTE FLOATING POINT NUMBER
  ///
  /// **Format Code 0o44** - 4-byte IEEE-754 floating point number.
  F4 = 0o44,

  /// ### 8-BYTE UNSIGNED INTEGER
  ///
  /// **Format Code 0o50** - 8-byte unsigned integer.
  U8 = 0o50,

  /// ### 1-BYTE UNSIGNED INTEGER
  ///
  /// **Format Code 0o51** - 1-byte unsigned integer.
  U1 = 0o51,

  /// ### 2-BYTE UNSIGNED INTEGER
  ///
  /// **Format Code 0o52** - 2-byte unsigned integer.
  U2 = 0o52,

  /// ### 4-BYTE UNSIGNED INTEGER
  ///
  /// **Format Code 0o54** - 4-byte unsigned integer.
  U4 = 0o54,
}
impl Format {
  /// ### ELEMENT SIZE
  ///
  /// The number of payload bytes occupied by a single element of an [Item]
  /// of this [Format]. The byte length of a non-list item must divide evenly
  /// by this value.
  ///
  /// [LIST] is the exception whose length field counts child items rather
  /// than bytes, given here as 1.
  ///
  /// [Item]:   crate::Item
  /// [Format]: Format
  /// [LIST]:   Format::List
  pub fn element_size(self) -> usize {
    match self {
      Format::List    => 1,
      Format::Binary  => 1,
      Format::Boolean => 1,
      Format::Ascii   => 1,
      Format::Jis8    => 1,
      Format::I1      => 1,
      Format::U1      => 1,
      Format::I2      => 2,
      Format::U2      => 2,
      Format::I4      => 4,
      Format::U4      => 4,
      Format::F4      => 4,
      Format::I8      => 8,
      Format::U8      => 8,
      Format::F8      => 8,
    }
  }

  /// ### TEXT TAG
  ///
  /// The short mnemonic used for this [Format] in SML-style renderings of
  /// items, e.g. `A` for ASCII or `U4` for the 4-byte unsigned integer.
  ///
  /// [Format]: Format
  pub fn text_tag(self) -> &'static str {
    match self {
      Format::List    => "L",
      Format::Binary  => "B",
      Format::Boolean => "BOOLEAN",
      Format::Ascii   => "A",
      Format::Jis8    => "J",
      Format::I1      => "I1",
      Format::I2      => "I2",
      Format::I4      => "I4",
      Format::I8      => "I8",
      Format::F4      => "F4",
      Format::F8      => "F8",
      Format::U1      => "U1",
      Format::U2      => "U2",
      Format::U4      => "U4",
      Format::U8      => "U8",
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn format_codes_match_the_standard() {
    assert_eq!(u8::from(Format::List), 0o00);
    assert_eq!(u8::from(Format::Binary), 0o10);
    assert_eq!(u8::from(Format::Boolean), 0o11);
    assert_eq!(u8::from(Format::Ascii), 0o20);
    assert_eq!(u8::from(Format::Jis8), 0o21);
    assert_eq!(u8::from(Format::I8), 0o30);
    assert_eq!(u8::from(Format::F8), 0o40);
    assert_eq!(u8::from(Format::U8), 0o50);
    assert!(Format::try_from(0o22u8).is_err());
  }

  #[test]
  fn element_sizes_divide_payloads() {
    assert_eq!(Format::U1.element_size(), 1);
    assert_eq!(Format::I2.element_size(), 2);
    assert_eq!(Format::F4.element_size(), 4);
    assert_eq!(Format::U8.element_size(), 8);
  }

  #[test]
  fn text_tags_are_the_sml_mnemonics() {
    assert_eq!(Format::Ascii.text_tag(), "A");
    assert_eq!(Format::U4.text_tag(), "U4");
    assert_eq!(Format::Boolean.text_tag(), "BOOLEAN");
  }
}
