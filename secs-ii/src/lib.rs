//! # SEMI EQUIPMENT COMMUNICATIONS STANDARD 2 (SECS-II) MESSAGE CONTENT
//! **Based on:**
//! - **[SEMI E5]-0712**
//!
//! ---------------------------------------------------------------------------
//!
//! [SECS-II] is a Presentation Protocol designed to facilitate a common
//! communications language between semiconductor equipment, particularly as
//! understood by the GEM ([SEMI E30]) Application Protocol
//! (together known as SECS/GEM). Common Session Protocols for transporting
//! [SECS-II] messages include SECS-I ([SEMI E4]) and HSMS ([SEMI E37]).
//!
//! ---------------------------------------------------------------------------
//!
//! This crate provides:
//!
//! - The [Item] type, the self-describing binary unit of [SECS-II] data,
//!   together with its encoding and decoding.
//! - The [Message] type, pairing a Stream and Function with optional text.
//! - The [Variables] module, containing typed value containers with
//!   validation and coercion, used to build and pick apart message text
//!   without hand-assembling [Item] trees.
//!
//! ---------------------------------------------------------------------------
//!
//! ## REFERENCED STANDARDS
//!
//! - SEMI E4        - SEMI Equipment Communications Standard 1 (SECS-I) Message Transfer
//! - SEMI E37       - High-Speed SECS Message Services (HSMS) Generic Services
//! - ANSI X3.4-1977 - Code for Information Interchange (ASCII)
//! - IEEE 754       - Standards for Binary Floating Point Arithmetic
//! - JIS-6226       - JIS 8-bit Coded Character Set for Information Exchange
//!
//! [SEMI E4]:  https://store-us.semi.org/products/e00400-semi-e4-specification-for-semi-equipment-communications-standard-1-message-transfer-secs-i
//! [SEMI E5]:  https://store-us.semi.org/products/e00500-semi-e5-specification-for-semi-equipment-communications-standard-2-message-content-secs-ii
//! [SEMI E30]: https://store-us.semi.org/products/e03000-semi-e30-specification-for-the-generic-model-for-communications-and-control-of-manufacturing-equipment-gem
//! [SEMI E37]: https://store-us.semi.org/products/e03700-semi-e37-high-speed-secs-message-services-hsms-generic-services
//!
//! [SECS-II]:   crate
//! [Item]:      Item
//! [Message]:   Message
//! [Variables]: variables

#![allow(clippy::unusual_byte_groupings)]

pub mod format;
pub mod variables;

use encoding::{all::ISO_2022_JP, Encoding};
use format::Format;

/// ## MAXIMUM ITEM LENGTH
/// **Based on SEMI E5§9.2.1**
///
/// The largest payload length representable by the three length bytes of an
/// [Item] header.
///
/// [Item]: Item
pub const MAX_LENGTH: usize = 0xFF_FF_FF;

/// ## ERROR
///
/// Represents a failure to encode, decode, convert, or assign [SECS-II]
/// formatted data.
///
/// [SECS-II]: crate
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum Error {
  /// ### EMPTY TEXT
  ///
  /// Binary data was attempted to be converted into an [Item] despite being
  /// empty. Acceptable where a message is allowed to be header-only.
  ///
  /// [Item]: Item
  #[error("item text is empty")]
  EmptyText,

  /// ### INVALID TEXT
  ///
  /// Binary data was attempted to be converted into an [Item] despite having
  /// an invalid format, an incomplete body, or trailing bytes.
  ///
  /// [Item]: Item
  #[error("item text is malformed")]
  InvalidText,

  /// ### BAD ITEM HEADER
  ///
  /// An item header declared zero length bytes, or the data ended before the
  /// declared length bytes could be read.
  #[error("malformed item header")]
  BadItemHeader,

  /// ### ITEM TOO LONG
  ///
  /// An item payload exceeded the 2^24 - 1 bytes representable by the three
  /// available length bytes.
  #[error("item length exceeds the representable maximum")]
  ItemTooLong,

  /// ### TYPE MISMATCH
  ///
  /// A value of an incompatible kind was assigned to a typed variable.
  #[error("value is not compatible with the variable type")]
  TypeMismatch,

  /// ### OUT OF RANGE
  ///
  /// A numeric value fell outside the representable range of the variable
  /// it was assigned to.
  #[error("numeric value is out of range for the variable type")]
  OutOfRange,

  /// ### TOO LONG
  ///
  /// An assignment violated the fixed element count of a variable.
  #[error("value exceeds the fixed element count")]
  TooLong,

  /// ### WRONG STREAM
  ///
  /// A [Message] was attempted to be converted into a specific function
  /// despite carrying the wrong Stream.
  ///
  /// [Message]: Message
  #[error("message carries the wrong stream")]
  WrongStream,

  /// ### WRONG FUNCTION
  ///
  /// A [Message] was attempted to be converted into a specific function
  /// despite carrying the wrong Function.
  ///
  /// [Message]: Message
  #[error("message carries the wrong function")]
  WrongFunction,

  /// ### WRONG FORMAT
  ///
  /// An [Item] was attempted to be converted into a typed variable despite
  /// carrying a [Format] the variable does not admit.
  ///
  /// [Item]:   Item
  /// [Format]: format::Format
  #[error("item format is not admitted here")]
  WrongFormat,

  /// ### UNKNOWN FIELD
  ///
  /// A named [List] variable was addressed with a name or index not present
  /// in its template.
  ///
  /// [List]: variables::List
  #[error("no such field in the list template")]
  UnknownField,
}

/// ## GENERIC MESSAGE
/// **Based on SEMI E5§6**
#[derive(Clone, Debug, PartialEq)]
pub struct Message {
  /// ### STREAM
  /// **Based on SEMI E5§6.4.2**
  ///
  /// The category of the [Message] (0 to 127, 7 bits). The [Stream],
  /// together with the [Function], uniquely defines a [Message].
  ///
  /// [Message]:  Message
  /// [Stream]:   Message::stream
  /// [Function]: Message::function
  pub stream: u8,

  /// ### FUNCTION
  /// **Based on SEMI E5§6.4.2**
  ///
  /// The specific function of the [Message] (0 to 255, 8 bits). An odd
  /// [Function] denotes a Primary Message, an even non-zero [Function] the
  /// corresponding Reply, and zero the abort of a transaction.
  ///
  /// [Message]:  Message
  /// [Function]: Message::function
  pub function: u8,

  /// ### REPLY REQUESTED
  /// **Based on SEMI E5§6.4.3**
  ///
  /// Whether a reply is requested to a Primary [Message], carried as the
  /// W-bit of the message header.
  ///
  /// [Message]: Message
  pub w: bool,

  /// ### MESSAGE TEXT
  ///
  /// The message's contents.
  ///
  /// - [None] - Indicates a header-only message.
  /// - [Some] - Indicates a message with contents after the header.
  pub text: Option<Item>,
}
impl Message {
  /// ### REPLY EXPECTED
  ///
  /// Whether transmitting this [Message] opens a transaction which must be
  /// completed by a Reply: true for a Primary Message with the W-bit set.
  ///
  /// [Message]: Message
  pub fn reply_expected(&self) -> bool {
    self.w && self.function % 2 == 1
  }
}

/// ## ENCODE ITEM HEADER
/// **Based on SEMI E5§9.2**
///
/// Appends an item header to the provided buffer: one format byte carrying
/// the [Format] code in its upper 6 bits and the number of length bytes in
/// its lower 2 bits, followed by `length` in 1 to 3 big-endian bytes, the
/// minimum number able to represent it.
///
/// Fails with [Item Too Long] when the length exceeds [MAX LENGTH].
///
/// [Format]:        format::Format
/// [Item Too Long]: Error::ItemTooLong
/// [MAX LENGTH]:    MAX_LENGTH
pub fn encode_item_header(format: Format, length: usize, buffer: &mut Vec<u8>) -> Result<(), Error> {
  let code: u8 = u8::from(format) << 2;
  if length < 0x100 {
    buffer.push(code | 1);
    buffer.push(length as u8);
  } else if length < 0x1_00_00 {
    buffer.push(code | 2);
    buffer.extend_from_slice(&(length as u16).to_be_bytes());
  } else if length <= MAX_LENGTH {
    buffer.push(code | 3);
    buffer.extend_from_slice(&(length as u32).to_be_bytes()[1..4]);
  } else {
    return Err(Error::ItemTooLong);
  }
  Ok(())
}

/// ## DECODE ITEM HEADER
/// **Based on SEMI E5§9.2**
///
/// Reads an item header at `start`, returning the position of the first body
/// byte, the [Format], and the declared length.
///
/// Fails with [Bad Item Header] when the data ends before the header does or
/// the header declares zero length bytes, and with [Invalid Text] when the
/// format code is not one defined by the standard.
///
/// [Format]:          format::Format
/// [Bad Item Header]: Error::BadItemHeader
/// [Invalid Text]:    Error::InvalidText
pub fn decode_item_header(data: &[u8], start: usize) -> Result<(usize, Format, usize), Error> {
  let format_byte: u8 = *data.get(start).ok_or(Error::BadItemHeader)?;
  let length_bytes: usize = (format_byte & 0b000000_11) as usize;
  if length_bytes == 0 {
    return Err(Error::BadItemHeader);
  }
  if start + 1 + length_bytes > data.len() {
    return Err(Error::BadItemHeader);
  }
  let mut length: usize = 0;
  for &byte in &data[start + 1..start + 1 + length_bytes] {
    length = (length << 8) | byte as usize;
  }
  let format: Format = Format::try_from(format_byte >> 2).map_err(|_| Error::InvalidText)?;
  Ok((start + 1 + length_bytes, format, length))
}

/// ## GENERIC ITEM
/// **Based on SEMI E5§9**
///
/// An [Item] is an information packet which has a length defined by the
/// first 2, 3, or 4 bytes, called the Item Header.
///
/// - Bits 1 to 2 of the Item Header tell how many of the following bytes
///   refer to the length of the item.
/// - The Item Length refers to the number of bytes following the Item
///   Header, called the Item Body, which is the actual data of the item.
/// - Bits 3 to 8 of the Item Header define the [Format] of the data which
///   follows.
///
/// [Item]:   Item
/// [Format]: format::Format
#[derive(Clone, Debug, PartialEq)]
pub enum Item {
  /// ### LIST
  /// **Based on SEMI E5§9.3**
  ///
  /// An ordered set of elements, where elements are [Item]s.
  ///
  /// The Item Header of a List is unique in that the Item Length refers to
  /// the number of [Item]s it contains, rather than the number of bytes.
  ///
  /// [Item]: Item
  List(Vec<Item>),

  /// ### ASCII
  /// **Based on SEMI E5§9.2.2**
  ///
  /// ASCII character string. Restricted to characters in the 7-bit range;
  /// the checked [ASCII Constructor] and the decoder uphold this, and the
  /// [Variables] layer rejects wider strings on assignment.
  ///
  /// [ASCII Constructor]: Item::ascii
  /// [Variables]:         variables
  Ascii(String),

  /// ### JIS-8
  /// **Based on SEMI E5§9.2.2**
  ///
  /// JIS-8 character string, carried on the wire in the ISO-2022-JP
  /// encoding.
  Jis8(String),

  /// ### BINARY
  /// **Based on SEMI E5§9.2.2**
  ///
  /// Single-byte quantity where the value can be anything and does not
  /// otherwise have a strictly defined meaning.
  Bin(Vec<u8>),

  /// ### BOOLEAN
  /// **Based on SEMI E5§9.2.2**
  ///
  /// Single-byte quantity where a value of 0 is equivalent to 'false' and
  /// any non-zero value is equivalent to 'true'.
  Bool(Vec<bool>),

  /// ### 1-BYTE SIGNED INTEGER
  /// **Based on SEMI E5§9.2.2**
  I1(Vec<i8>),

  /// ### 2-BYTE SIGNED INTEGER
  /// **Based on SEMI E5§9.2.2**
  I2(Vec<i16>),

  /// ### 4-BYTE SIGNED INTEGER
  /// **Based on SEMI E5§9.2.2**
  I4(Vec<i32>),

  /// ### 8-BYTE SIGNED INTEGER
  /// **Based on SEMI E5§9.2.2**
  I8(Vec<i64>),

  /// ### 1-BYTE UNSIGNED INTEGER
  /// **Based on SEMI E5§9.2.2**
  U1(Vec<u8>),

  /// ### 2-BYTE UNSIGNED INTEGER
  /// **Based on SEMI E5§9.2.2**
  U2(Vec<u16>),

  /// ### 4-BYTE UNSIGNED INTEGER
  /// **Based on SEMI E5§9.2.2**
  U4(Vec<u32>),

  /// ### 8-BYTE UNSIGNED INTEGER
  /// **Based on SEMI E5§9.2.2**
  U8(Vec<u64>),

  /// ### 4-BYTE FLOATING POINT NUMBER
  /// **Based on SEMI E5§9.2.2**
  F4(Vec<f32>),

  /// ### 8-BYTE FLOATING POINT NUMBER
  /// **Based on SEMI E5§9.2.2**
  F8(Vec<f64>),
}
impl Item {
  /// ### ITEM FORMAT
  ///
  /// Provides the [Format] of this [Item].
  ///
  /// [Item]:   Item
  /// [Format]: format::Format
  pub fn format(&self) -> Format {
    match self {
      Item::List(_)  => Format::List,
      Item::Ascii(_) => Format::Ascii,
      Item::Jis8(_)  => Format::Jis8,
      Item::Bin(_)   => Format::Binary,
      Item::Bool(_)  => Format::Boolean,
      Item::I1(_)    => Format::I1,
      Item::I2(_)    => Format::I2,
      Item::I4(_)    => Format::I4,
      Item::I8(_)    => Format::I8,
      Item::U1(_)    => Format::U1,
      Item::U2(_)    => Format::U2,
      Item::U4(_)    => Format::U4,
      Item::U8(_)    => Format::U8,
      Item::F4(_)    => Format::F4,
      Item::F8(_)    => Format::F8,
    }
  }

  /// ### CHECKED ASCII ITEM
  ///
  /// Constructs an [ASCII] [Item] from a string, refusing strings which
  /// contain characters outside the 7-bit range.
  ///
  /// [Item]:  Item
  /// [ASCII]: Item::Ascii
  pub fn ascii(value: &str) -> Result<Self, Error> {
    if value.is_ascii() {
      Ok(Item::Ascii(value.to_owned()))
    } else {
      Err(Error::TypeMismatch)
    }
  }

  /// ### SINGLE BINARY ITEM
  ///
  /// Constructs a [Binary] [Item] with a single member.
  ///
  /// Provided for convenient syntax of this common use case.
  ///
  /// [Item]:   Item
  /// [Binary]: Item::Bin
  pub fn bin(value: u8) -> Self {
    Self::Bin(vec![value])
  }

  /// ### SINGLE BOOLEAN ITEM
  ///
  /// Constructs a [Boolean] [Item] with a single member.
  ///
  /// [Item]:    Item
  /// [Boolean]: Item::Bool
  pub fn bool(value: bool) -> Self {
    Self::Bool(vec![value])
  }

  /// ### SINGLE 1-BYTE UNSIGNED INTEGER ITEM
  pub fn u1(value: u8) -> Self {
    Self::U1(vec![value])
  }

  /// ### SINGLE 2-BYTE UNSIGNED INTEGER ITEM
  pub fn u2(value: u16) -> Self {
    Self::U2(vec![value])
  }

  /// ### SINGLE 4-BYTE UNSIGNED INTEGER ITEM
  pub fn u4(value: u32) -> Self {
    Self::U4(vec![value])
  }

  /// ### SINGLE 1-BYTE SIGNED INTEGER ITEM
  pub fn i1(value: i8) -> Self {
    Self::I1(vec![value])
  }

  /// ### SINGLE 2-BYTE SIGNED INTEGER ITEM
  pub fn i2(value: i16) -> Self {
    Self::I2(vec![value])
  }

  /// ### SINGLE 4-BYTE SIGNED INTEGER ITEM
  pub fn i4(value: i32) -> Self {
    Self::I4(vec![value])
  }

  /// ### ENCODE ITEM
  ///
  /// Serializes this [Item] and appends it to the provided buffer.
  ///
  /// Fails with [Item Too Long] when a payload exceeds [MAX LENGTH].
  ///
  /// [Item]:          Item
  /// [Item Too Long]: Error::ItemTooLong
  /// [MAX LENGTH]:    MAX_LENGTH
  pub fn encode_into(&self, buffer: &mut Vec<u8>) -> Result<(), Error> {
    match self {
      Item::List(items) => {
        encode_item_header(Format::List, items.len(), buffer)?;
        for item in items {
          item.encode_into(buffer)?;
        }
      }
      Item::Ascii(string) => {
        encode_item_header(Format::Ascii, string.len(), buffer)?;
        buffer.extend_from_slice(string.as_bytes());
      }
      Item::Jis8(string) => {
        // With the Ignore trap the ISO-2022-JP encoder cannot fail.
        let encoded: Vec<u8> = ISO_2022_JP.encode(string, encoding::EncoderTrap::Ignore).unwrap();
        encode_item_header(Format::Jis8, encoded.len(), buffer)?;
        buffer.extend_from_slice(&encoded);
      }
      Item::Bin(values) => {
        encode_item_header(Format::Binary, values.len(), buffer)?;
        buffer.extend_from_slice(values);
      }
      Item::Bool(values) => {
        encode_item_header(Format::Boolean, values.len(), buffer)?;
        for &value in values {
          buffer.push(value as u8);
        }
      }
      Item::I1(values) => {
        encode_item_header(Format::I1, values.len(), buffer)?;
        for value in values {
          buffer.extend_from_slice(&value.to_be_bytes());
        }
      }
      Item::I2(values) => {
        encode_item_header(Format::I2, values.len() * 2, buffer)?;
        for value in values {
          buffer.extend_from_slice(&value.to_be_bytes());
        }
      }
      Item::I4(values) => {
        encode_item_header(Format::I4, values.len() * 4, buffer)?;
        for value in values {
          buffer.extend_from_slice(&value.to_be_bytes());
        }
      }
      Item::I8(values) => {
        encode_item_header(Format::I8, values.len() * 8, buffer)?;
        for value in values {
          buffer.extend_from_slice(&value.to_be_bytes());
        }
      }
      Item::U1(values) => {
        encode_item_header(Format::U1, values.len(), buffer)?;
        buffer.extend_from_slice(values);
      }
      Item::U2(values) => {
        encode_item_header(Format::U2, values.len() * 2, buffer)?;
        for value in values {
          buffer.extend_from_slice(&value.to_be_bytes());
        }
      }
      Item::U4(values) => {
        encode_item_header(Format::U4, values.len() * 4, buffer)?;
        for value in values {
          buffer.extend_from_slice(&value.to_be_bytes());
        }
      }
      Item::U8(values) => {
        encode_item_header(Format::U8, values.len() * 8, buffer)?;
        for value in values {
          buffer.extend_from_slice(&value.to_be_bytes());
        }
      }
      Item::F4(values) => {
        encode_item_header(Format::F4, values.len() * 4, buffer)?;
        for value in values {
          buffer.extend_from_slice(&value.to_be_bytes());
        }
      }
      Item::F8(values) => {
        encode_item_header(Format::F8, values.len() * 8, buffer)?;
        for value in values {
          buffer.extend_from_slice(&value.to_be_bytes());
        }
      }
    }
    Ok(())
  }

  /// ### DECODE ITEM AT POSITION
  ///
  /// Deserializes a single [Item] starting at `start`, returning the item
  /// and the position of the first byte beyond it. List items are decoded
  /// recursively.
  ///
  /// [Item]: Item
  pub fn decode_at(data: &[u8], start: usize) -> Result<(Item, usize), Error> {
    let (body, format, length) = decode_item_header(data, start)?;

    // List bodies are measured in items, everything else in bytes.
    if format == Format::List {
      let mut items: Vec<Item> = Vec::with_capacity(length.min(256));
      let mut position: usize = body;
      for _ in 0..length {
        let (item, next) = Item::decode_at(data, position)?;
        items.push(item);
        position = next;
      }
      return Ok((Item::List(items), position));
    }

    let end: usize = body.checked_add(length).ok_or(Error::InvalidText)?;
    if end > data.len() {
      return Err(Error::InvalidText);
    }
    let bytes: &[u8] = &data[body..end];
    if length % format.element_size() != 0 {
      return Err(Error::InvalidText);
    }

    let item: Item = match format {
      Format::List => unreachable!(),
      Format::Ascii => {
        if !bytes.is_ascii() {
          return Err(Error::InvalidText);
        }
        Item::Ascii(String::from_utf8(bytes.to_vec()).map_err(|_| Error::InvalidText)?)
      }
      Format::Jis8 => Item::Jis8(
        ISO_2022_JP
          .decode(bytes, encoding::DecoderTrap::Strict)
          .map_err(|_| Error::InvalidText)?,
      ),
      Format::Binary  => Item::Bin(bytes.to_vec()),
      Format::Boolean => Item::Bool(bytes.iter().map(|&byte| byte > 0).collect()),
      Format::I1      => Item::I1(bytes.iter().map(|&byte| byte as i8).collect()),
      Format::U1      => Item::U1(bytes.to_vec()),
      Format::I2 => Item::I2(
        bytes.chunks_exact(2).map(|chunk| i16::from_be_bytes([chunk[0], chunk[1]])).collect(),
      ),
      Format::U2 => Item::U2(
        bytes.chunks_exact(2).map(|chunk| u16::from_be_bytes([chunk[0], chunk[1]])).collect(),
      ),
      Format::I4 => Item::I4(
        bytes
          .chunks_exact(4)
          .map(|chunk| i32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
          .collect(),
      ),
      Format::U4 => Item::U4(
        bytes
          .chunks_exact(4)
          .map(|chunk| u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
          .collect(),
      ),
      Format::F4 => Item::F4(
        bytes
          .chunks_exact(4)
          .map(|chunk| f32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
          .collect(),
      ),
      Format::I8 => Item::I8(
        bytes
          .chunks_exact(8)
          .map(|chunk| {
            i64::from_be_bytes([
              chunk[0], chunk[1], chunk[2], chunk[3], chunk[4], chunk[5], chunk[6], chunk[7],
            ])
          })
          .collect(),
      ),
      Format::U8 => Item::U8(
        bytes
          .chunks_exact(8)
          .map(|chunk| {
            u64::from_be_bytes([
              chunk[0], chunk[1], chunk[2], chunk[3], chunk[4], chunk[5], chunk[6], chunk[7],
            ])
          })
          .collect(),
      ),
      Format::F8 => Item::F8(
        bytes
          .chunks_exact(8)
          .map(|chunk| {
            f64::from_be_bytes([
              chunk[0], chunk[1], chunk[2], chunk[3], chunk[4], chunk[5], chunk[6], chunk[7],
            ])
          })
          .collect(),
      ),
    };
    Ok((item, end))
  }
}
impl TryFrom<Item> for Vec<u8> {
  type Error = Error;

  /// ### ITEM -> BINARY DATA
  fn try_from(item: Item) -> Result<Self, Self::Error> {
    let mut buffer: Vec<u8> = vec![];
    item.encode_into(&mut buffer)?;
    Ok(buffer)
  }
}
impl TryFrom<&[u8]> for Item {
  type Error = Error;

  /// ### BINARY DATA -> ITEM
  ///
  /// Deserializes a complete [Item] from the provided data.
  ///
  /// Fails with [Empty Text] on empty input, which may be acceptable
  /// elsewhere as a header-only message, and with [Invalid Text] when bytes
  /// remain once the item has been decoded.
  ///
  /// [Item]:         Item
  /// [Empty Text]:   Error::EmptyText
  /// [Invalid Text]: Error::InvalidText
  fn try_from(text: &[u8]) -> Result<Self, Self::Error> {
    if text.is_empty() {
      return Err(Error::EmptyText);
    }
    let (item, next) = Item::decode_at(text, 0)?;
    if next != text.len() {
      return Err(Error::InvalidText);
    }
    Ok(item)
  }
}
impl TryFrom<Vec<u8>> for Item {
  type Error = Error;

  /// ### BINARY DATA -> ITEM
  fn try_from(text: Vec<u8>) -> Result<Self, Self::Error> {
    Item::try_from(text.as_slice())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use proptest::prelude::*;

  fn encode(item: &Item) -> Vec<u8> {
    let mut buffer = vec![];
    item.encode_into(&mut buffer).unwrap();
    buffer
  }

  #[test]
  fn item_header_length_bytes() {
    for (length, expected) in [
      (0usize, 1usize),
      (1, 1),
      (255, 1),
      (256, 2),
      (65535, 2),
      (65536, 3),
      (MAX_LENGTH, 3),
    ] {
      let mut buffer = vec![];
      encode_item_header(Format::Binary, length, &mut buffer).unwrap();
      assert_eq!(buffer.len(), 1 + expected, "header for length {length}");
      let (position, format, decoded) = decode_item_header(&buffer, 0).unwrap();
      assert_eq!(position, buffer.len());
      assert_eq!(format, Format::Binary);
      assert_eq!(decoded, length);
    }
  }

  #[test]
  fn item_header_too_long() {
    let mut buffer = vec![];
    assert_eq!(
      encode_item_header(Format::Binary, MAX_LENGTH + 1, &mut buffer),
      Err(Error::ItemTooLong)
    );
  }

  #[test]
  fn item_header_rejects_zero_length_bytes() {
    // Format byte for U4 with the length-byte field set to zero.
    assert_eq!(decode_item_header(&[0b101100_00], 0), Err(Error::BadItemHeader));
  }

  #[test]
  fn item_header_rejects_underrun() {
    // Declares two length bytes but provides one.
    assert_eq!(decode_item_header(&[0b101100_10, 0x01], 0), Err(Error::BadItemHeader));
    assert_eq!(decode_item_header(&[], 0), Err(Error::BadItemHeader));
  }

  #[test]
  fn ascii_item_wire_format() {
    let item = Item::ascii("testString").unwrap();
    assert_eq!(
      encode(&item),
      vec![0x41, 0x0A, b't', b'e', b's', b't', b'S', b't', b'r', b'i', b'n', b'g']
    );
  }

  #[test]
  fn u4_item_wire_format() {
    assert_eq!(encode(&Item::u4(1337)), vec![0xB1, 0x04, 0x00, 0x00, 0x05, 0x39]);
  }

  #[test]
  fn f4_item_wire_format() {
    assert_eq!(encode(&Item::F4(vec![123.0])), vec![0x91, 0x04, 0x42, 0xF6, 0x00, 0x00]);
  }

  #[test]
  fn list_item_wire_format() {
    let item = Item::List(vec![
      Item::ascii("MDLN1").unwrap(),
      Item::ascii("SOFTREV1").unwrap(),
    ]);
    assert_eq!(
      encode(&item),
      vec![
        0x01, 0x02, 0x41, 0x05, b'M', b'D', b'L', b'N', b'1', 0x41, 0x08, b'S', b'O', b'F', b'T',
        b'R', b'E', b'V', b'1',
      ]
    );
  }

  #[test]
  fn empty_item_decodes_to_zero_elements() {
    let item = Item::try_from([0xB1u8, 0x00].as_slice()).unwrap();
    assert_eq!(item, Item::U4(vec![]));
  }

  #[test]
  fn decode_rejects_empty_input() {
    let empty: &[u8] = &[];
    assert_eq!(Item::try_from(empty), Err(Error::EmptyText));
  }

  #[test]
  fn decode_rejects_trailing_bytes() {
    assert_eq!(Item::try_from([0xB1u8, 0x00, 0xFF].as_slice()), Err(Error::InvalidText));
  }

  #[test]
  fn decode_rejects_uneven_element_length() {
    // U4 with a 3-byte body.
    assert_eq!(
      Item::try_from([0xB1u8, 0x03, 0x00, 0x00, 0x00].as_slice()),
      Err(Error::InvalidText)
    );
  }

  #[test]
  fn decode_rejects_truncated_body() {
    assert_eq!(Item::try_from([0x41u8, 0x05, b'a'].as_slice()), Err(Error::InvalidText));
  }

  #[test]
  fn checked_ascii_rejects_wide_characters() {
    assert_eq!(Item::ascii("héllo"), Err(Error::TypeMismatch));
  }

  #[test]
  fn reply_expected_requires_w_and_odd_function() {
    let primary = Message { stream: 1, function: 1, w: true, text: None };
    let reply = Message { stream: 1, function: 2, w: false, text: None };
    let fire_and_forget = Message { stream: 5, function: 1, w: false, text: None };
    assert!(primary.reply_expected());
    assert!(!reply.reply_expected());
    assert!(!fire_and_forget.reply_expected());
  }

  fn item_strategy() -> impl Strategy<Value = Item> {
    // Floats are generated from integers so equality-based round-trip
    // assertions never meet a NaN.
    let leaf = proptest::strategy::Union::new(vec![
      prop::collection::vec(any::<u8>(), 0..8).prop_map(Item::Bin).boxed(),
      prop::collection::vec(any::<bool>(), 0..8).prop_map(Item::Bool).boxed(),
      "[ -~]{0,12}".prop_map(Item::Ascii).boxed(),
      "[ -~]{0,12}".prop_map(Item::Jis8).boxed(),
      prop::collection::vec(any::<i8>(), 0..8).prop_map(Item::I1).boxed(),
      prop::collection::vec(any::<i16>(), 0..8).prop_map(Item::I2).boxed(),
      prop::collection::vec(any::<i32>(), 0..8).prop_map(Item::I4).boxed(),
      prop::collection::vec(any::<i64>(), 0..8).prop_map(Item::I8).boxed(),
      prop::collection::vec(any::<u8>(), 0..8).prop_map(Item::U1).boxed(),
      prop::collection::vec(any::<u16>(), 0..8).prop_map(Item::U2).boxed(),
      prop::collection::vec(any::<u32>(), 0..8).prop_map(Item::U4).boxed(),
      prop::collection::vec(any::<u64>(), 0..8).prop_map(Item::U8).boxed(),
      prop::collection::vec(any::<i16>().prop_map(|v| v as f32), 0..8).prop_map(Item::F4).boxed(),
      prop::collection::vec(any::<i32>().prop_map(|v| v as f64), 0..8).prop_map(Item::F8).boxed(),
    ]);
    leaf.prop_recursive(3, 32, 4, |inner| {
      prop::collection::vec(inner, 0..4).prop_map(Item::List)
    })
  }

  proptest! {
    #[test]
    fn encode_decode_round_trip(item in item_strategy()) {
      let encoded = encode(&item);
      let decoded = Item::try_from(encoded.as_slice()).unwrap();
      prop_assert_eq!(decoded, item);
    }

    #[test]
    fn decode_encode_round_trip(item in item_strategy()) {
      // The encoder always emits the minimal header, so bytes it produced
      // re-encode to themselves after a decode.
      let encoded = encode(&item);
      let decoded = Item::try_from(encoded.as_slice()).unwrap();
      prop_assert_eq!(encode(&decoded), encoded);
    }
  }
}
