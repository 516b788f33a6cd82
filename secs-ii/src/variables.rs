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

//! # VARIABLES
//! **Based on SEMI E5§9**
//!
//! ---------------------------------------------------------------------------
//!
//! Typed value containers layered over the [Item] codec. Where an [Item] is
//! the exact image of bytes on the wire, a [Variable] enforces a contract:
//! which [Format] is admitted, how many elements are allowed, and which
//! loosely-typed [Value]s may be coerced into it.
//!
//! - Concrete containers ([Binary], [Boolean], [Ascii], [Jis8], the signed,
//!   unsigned, and floating point numerics) hold one [Format] apiece with an
//!   optional fixed element count.
//! - [Dynamic] holds a set of allowed [Format]s and resolves to a concrete
//!   container on assignment or decode.
//! - [List] holds a named, ordered template of child variables; [Array]
//!   holds a homogeneous run of one [Data Item].
//! - [Data Item] is the declarative table entry `(name, formats, count)`
//!   from which message definitions construct their variables.
//!
//! All assignment goes through [Value], the loosely-typed source: every
//! element of an assignment must be admitted or the whole assignment fails,
//! leaving the previous contents untouched.
//!
//! [Item]:      crate::Item
//! [Format]:    crate::format::Format
//! [Value]:     Value
//! [Variable]:  Variable
//! [Binary]:    Binary
//! [Boolean]:   Boolean
//! [Ascii]:     Ascii
//! [Jis8]:      Jis8
//! [Dynamic]:   Dynamic
//! [List]:      List
//! [Array]:     Array
//! [Data Item]: DataItem

use crate::format::Format;
use crate::{Error, Item};
use encoding::{all::ISO_2022_JP, Encoding};

/// ## VALUE
///
/// A loosely-typed assignment source for [Variable]s.
///
/// Mirrors the kinds of values a caller may hold before the message layer
/// has decided on a wire [Format]: plain booleans, integers, floats,
/// strings, byte strings, and sequences thereof.
///
/// [Variable]: Variable
/// [Format]:   crate::format::Format
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
  /// ### BOOLEAN VALUE
  Bool(bool),

  /// ### SIGNED INTEGER VALUE
  Int(i64),

  /// ### UNSIGNED INTEGER VALUE
  UInt(u64),

  /// ### FLOATING POINT VALUE
  Float(f64),

  /// ### STRING VALUE
  Str(String),

  /// ### BYTE STRING VALUE
  Bytes(Vec<u8>),

  /// ### SEQUENCE VALUE
  List(Vec<Value>),
}
impl From<bool> for Value {
  fn from(value: bool) -> Self {
    Value::Bool(value)
  }
}
impl From<i8> for Value {
  fn from(value: i8) -> Self {
    Value::Int(value as i64)
  }
}
impl From<i16> for Value {
  fn from(value: i16) -> Self {
    Value::Int(value as i64)
  }
}
impl From<i32> for Value {
  fn from(value: i32) -> Self {
    Value::Int(value as i64)
  }
}
impl From<i64> for Value {
  fn from(value: i64) -> Self {
    Value::Int(value)
  }
}
impl From<u8> for Value {
  fn from(value: u8) -> Self {
    Value::UInt(value as u64)
  }
}
impl From<u16> for Value {
  fn from(value: u16) -> Self {
    Value::UInt(value as u64)
  }
}
impl From<u32> for Value {
  fn from(value: u32) -> Self {
    Value::UInt(value as u64)
  }
}
impl From<u64> for Value {
  fn from(value: u64) -> Self {
    Value::UInt(value)
  }
}
impl From<f32> for Value {
  fn from(value: f32) -> Self {
    Value::Float(value as f64)
  }
}
impl From<f64> for Value {
  fn from(value: f64) -> Self {
    Value::Float(value)
  }
}
impl From<&str> for Value {
  fn from(value: &str) -> Self {
    Value::Str(value.to_owned())
  }
}
impl From<String> for Value {
  fn from(value: String) -> Self {
    Value::Str(value)
  }
}
impl From<&[u8]> for Value {
  fn from(value: &[u8]) -> Self {
    Value::Bytes(value.to_vec())
  }
}
impl<T: Into<Value>> From<Vec<T>> for Value {
  fn from(value: Vec<T>) -> Self {
    Value::List(value.into_iter().map(Into::into).collect())
  }
}

/// ## FIELD KEY
///
/// Addresses a child of a [List] variable, either by position or by the
/// name given in its template.
///
/// [List]: List
#[derive(Clone, Copy, Debug)]
pub enum FieldKey<'a> {
  /// ### POSITIONAL KEY
  Index(usize),

  /// ### NAMED KEY
  Name(&'a str),
}
impl From<usize> for FieldKey<'_> {
  fn from(index: usize) -> Self {
    FieldKey::Index(index)
  }
}
impl<'a> From<&'a str> for FieldKey<'a> {
  fn from(name: &'a str) -> Self {
    FieldKey::Name(name)
  }
}

/// ## INTEGER VARIABLE MACRO
///
/// Expands to one fixed-width integer container with the shared coercion
/// rules: booleans, in-range integers, integral floats, numeric strings,
/// and sequences whose elements each pass the scalar rule.
macro_rules! integer_variable {
  (
    $name:ident,
    $prim:ty,
    $item:ident,
    $value_variant:ident,
    $cast:ty,
    $doc:literal
  ) => {
    #[doc = $doc]
    ///
    /// Assignment admits booleans, integers within the type's range,
    /// numeric strings, floats with an integral in-range value, and
    /// sequences whose elements each pass those rules. Out-of-range
    /// numerics fail with [Out Of Range], foreign kinds with
    /// [Type Mismatch], and fixed-count violations with [Too Long].
    ///
    /// [Out Of Range]:  crate::Error::OutOfRange
    /// [Type Mismatch]: crate::Error::TypeMismatch
    /// [Too Long]:      crate::Error::TooLong
    #[derive(Clone, Debug, Default)]
    pub struct $name {
      value: Vec<$prim>,
      count: Option<usize>,
    }
    impl $name {
      /// ### NEW VARIABLE
      ///
      /// Creates an empty, unconstrained variable.
      pub fn new() -> Self {
        Self { value: vec![], count: None }
      }

      /// ### NEW VARIABLE WITH FIXED COUNT
      ///
      /// Creates an empty variable which will refuse assignments of more
      /// than `count` elements.
      pub fn with_count(count: usize) -> Self {
        Self { value: vec![], count: Some(count) }
      }

      // Scalar coercion rule shared by assignment and support checks.
      fn coerce(value: &Value) -> Result<$prim, Error> {
        match value {
          Value::Bool(value) => Ok(*value as u8 as $prim),
          Value::Int(value) => <$prim>::try_from(*value).map_err(|_| Error::OutOfRange),
          Value::UInt(value) => <$prim>::try_from(*value).map_err(|_| Error::OutOfRange),
          Value::Float(value) => {
            if !value.is_finite() || value.fract() != 0.0 {
              return Err(Error::TypeMismatch);
            }
            if *value < <$prim>::MIN as f64 || *value > <$prim>::MAX as f64 {
              return Err(Error::OutOfRange);
            }
            Ok(*value as $prim)
          }
          Value::Str(value) => {
            let parsed: i128 = value.trim().parse().map_err(|_| Error::TypeMismatch)?;
            <$prim>::try_from(parsed).map_err(|_| Error::OutOfRange)
          }
          _ => Err(Error::TypeMismatch),
        }
      }

      fn convert(&self, value: &Value) -> Result<Vec<$prim>, Error> {
        let values: Vec<$prim> = match value {
          Value::List(elements) => {
            elements.iter().map(Self::coerce).collect::<Result<_, _>>()?
          }
          scalar => vec![Self::coerce(scalar)?],
        };
        if let Some(count) = self.count {
          if values.len() > count {
            return Err(Error::TooLong);
          }
        }
        Ok(values)
      }

      /// ### SET VALUE
      ///
      /// Coerces and assigns the provided value, failing without touching
      /// the previous contents if any element is not admitted.
      pub fn set(&mut self, value: impl Into<Value>) -> Result<(), Error> {
        self.value = self.convert(&value.into())?;
        Ok(())
      }

      /// ### SUPPORTS VALUE
      ///
      /// Whether the provided value would be admitted by [Set Value].
      ///
      /// [Set Value]: Self::set
      pub fn supports_value(&self, value: &Value) -> bool {
        self.convert(value).is_ok()
      }

      /// ### GET VALUE
      ///
      /// The current contents: a scalar when exactly one element is held,
      /// otherwise a sequence.
      pub fn get(&self) -> Value {
        if self.value.len() == 1 {
          Value::$value_variant(self.value[0] as $cast)
        } else {
          Value::List(
            self
              .value
              .iter()
              .map(|&value| Value::$value_variant(value as $cast))
              .collect(),
          )
        }
      }

      /// ### ELEMENTS
      pub fn values(&self) -> &[$prim] {
        &self.value
      }

      /// ### ELEMENT COUNT
      pub fn len(&self) -> usize {
        self.value.len()
      }

      /// ### IS EMPTY
      pub fn is_empty(&self) -> bool {
        self.value.is_empty()
      }

      /// ### ENCODE
      ///
      /// Serializes the current contents as a complete item.
      pub fn encode(&self) -> Result<Vec<u8>, Error> {
        Vec::<u8>::try_from(Item::from(self.clone()))
      }

      /// ### DECODE
      ///
      /// Deserializes an item at `start` into this variable, returning the
      /// position of the first byte beyond it.
      pub fn decode(&mut self, data: &[u8], start: usize) -> Result<usize, Error> {
        let (item, next) = Item::decode_at(data, start)?;
        match item {
          Item::$item(values) => {
            if let Some(count) = self.count {
              if values.len() > count {
                return Err(Error::TooLong);
              }
            }
            self.value = values;
            Ok(next)
          }
          _ => Err(Error::WrongFormat),
        }
      }
    }
    impl PartialEq for $name {
      // Equality is value-based; the count constraint does not participate.
      fn eq(&self, other: &Self) -> bool {
        self.value == other.value
      }
    }
    impl std::hash::Hash for $name {
      fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.value.hash(state);
      }
    }
    impl From<$name> for Item {
      fn from(variable: $name) -> Item {
        Item::$item(variable.value)
      }
    }
    impl TryFrom<Item> for $name {
      type Error = Error;

      fn try_from(item: Item) -> Result<Self, Self::Error> {
        match item {
          Item::$item(values) => Ok(Self { value: values, count: None }),
          _ => Err(Error::WrongFormat),
        }
      }
    }
  };
}

integer_variable! {I1, i8, I1, Int, i64, "## 1-BYTE SIGNED INTEGER VARIABLE"}
integer_variable! {I2, i16, I2, Int, i64, "## 2-BYTE SIGNED INTEGER VARIABLE"}
integer_variable! {I4, i32, I4, Int, i64, "## 4-BYTE SIGNED INTEGER VARIABLE"}
integer_variable! {I8, i64, I8, Int, i64, "## 8-BYTE SIGNED INTEGER VARIABLE"}
integer_variable! {U1, u8, U1, UInt, u64, "## 1-BYTE UNSIGNED INTEGER VARIABLE"}
integer_variable! {U2, u16, U2, UInt, u64, "## 2-BYTE UNSIGNED INTEGER VARIABLE"}
integer_variable! {U4, u32, U4, UInt, u64, "## 4-BYTE UNSIGNED INTEGER VARIABLE"}
integer_variable! {U8, u64, U8, UInt, u64, "## 8-BYTE UNSIGNED INTEGER VARIABLE"}

/// ## FLOATING POINT VARIABLE MACRO
///
/// Expands to one IEEE-754 container; the coercion rules additionally admit
/// any finite numeric.
macro_rules! float_variable {
  (
    $name:ident,
    $prim:ty,
    $item:ident,
    $doc:literal
  ) => {
    #[doc = $doc]
    ///
    /// Assignment admits booleans, integers, finite floats, numeric
    /// strings, and sequences whose elements each pass those rules.
    #[derive(Clone, Debug, Default)]
    pub struct $name {
      value: Vec<$prim>,
      count: Option<usize>,
    }
    impl $name {
      /// ### NEW VARIABLE
      pub fn new() -> Self {
        Self { value: vec![], count: None }
      }

      /// ### NEW VARIABLE WITH FIXED COUNT
      pub fn with_count(count: usize) -> Self {
        Self { value: vec![], count: Some(count) }
      }

      fn coerce(value: &Value) -> Result<$prim, Error> {
        match value {
          Value::Bool(value) => Ok(*value as u8 as $prim),
          Value::Int(value) => Ok(*value as $prim),
          Value::UInt(value) => Ok(*value as $prim),
          Value::Float(value) => {
            if value.is_finite() {
              Ok(*value as $prim)
            } else {
              Err(Error::OutOfRange)
            }
          }
          Value::Str(value) => {
            value.trim().parse::<$prim>().map_err(|_| Error::TypeMismatch)
          }
          _ => Err(Error::TypeMismatch),
        }
      }

      fn convert(&self, value: &Value) -> Result<Vec<$prim>, Error> {
        let values: Vec<$prim> = match value {
          Value::List(elements) => {
            elements.iter().map(Self::coerce).collect::<Result<_, _>>()?
          }
          scalar => vec![Self::coerce(scalar)?],
        };
        if let Some(count) = self.count {
          if values.len() > count {
            return Err(Error::TooLong);
          }
        }
        Ok(values)
      }

      /// ### SET VALUE
      pub fn set(&mut self, value: impl Into<Value>) -> Result<(), Error> {
        self.value = self.convert(&value.into())?;
        Ok(())
      }

      /// ### SUPPORTS VALUE
      pub fn supports_value(&self, value: &Value) -> bool {
        self.convert(value).is_ok()
      }

      /// ### GET VALUE
      pub fn get(&self) -> Value {
        if self.value.len() == 1 {
          Value::Float(self.value[0] as f64)
        } else {
          Value::List(self.value.iter().map(|&value| Value::Float(value as f64)).collect())
        }
      }

      /// ### ELEMENTS
      pub fn values(&self) -> &[$prim] {
        &self.value
      }

      /// ### ELEMENT COUNT
      pub fn len(&self) -> usize {
        self.value.len()
      }

      /// ### IS EMPTY
      pub fn is_empty(&self) -> bool {
        self.value.is_empty()
      }

      /// ### ENCODE
      pub fn encode(&self) -> Result<Vec<u8>, Error> {
        Vec::<u8>::try_from(Item::from(self.clone()))
      }

      /// ### DECODE
      pub fn decode(&mut self, data: &[u8], start: usize) -> Result<usize, Error> {
        let (item, next) = Item::decode_at(data, start)?;
        match item {
          Item::$item(values) => {
            if let Some(count) = self.count {
              if values.len() > count {
                return Err(Error::TooLong);
              }
            }
            self.value = values;
            Ok(next)
          }
          _ => Err(Error::WrongFormat),
        }
      }
    }
    impl PartialEq for $name {
      fn eq(&self, other: &Self) -> bool {
        self.value == other.value
      }
    }
    impl From<$name> for Item {
      fn from(variable: $name) -> Item {
        Item::$item(variable.value)
      }
    }
    impl TryFrom<Item> for $name {
      type Error = Error;

      fn try_from(item: Item) -> Result<Self, Self::Error> {
        match item {
          Item::$item(values) => Ok(Self { value: values, count: None }),
          _ => Err(Error::WrongFormat),
        }
      }
    }
  };
}

float_variable! {F4, f32, F4, "## 4-BYTE FLOATING POINT VARIABLE"}
float_variable! {F8, f64, F8, "## 8-BYTE FLOATING POINT VARIABLE"}

/// ## BINARY VARIABLE
///
/// Byte-per-element container without further meaning attached to its
/// contents.
///
/// Assignment admits byte strings, single integers and sequences of
/// integers in the 0 to 255 range, booleans, and ASCII-encodable strings.
#[derive(Clone, Debug, Default)]
pub struct Binary {
  value: Vec<u8>,
  count: Option<usize>,
}
impl Binary {
  /// ### NEW VARIABLE
  pub fn new() -> Self {
    Self { value: vec![], count: None }
  }

  /// ### NEW VARIABLE WITH FIXED COUNT
  pub fn with_count(count: usize) -> Self {
    Self { value: vec![], count: Some(count) }
  }

  fn coerce(value: &Value) -> Result<u8, Error> {
    match value {
      Value::Bool(value) => Ok(*value as u8),
      Value::Int(value) => u8::try_from(*value).map_err(|_| Error::OutOfRange),
      Value::UInt(value) => u8::try_from(*value).map_err(|_| Error::OutOfRange),
      _ => Err(Error::TypeMismatch),
    }
  }

  fn convert(&self, value: &Value) -> Result<Vec<u8>, Error> {
    let values: Vec<u8> = match value {
      Value::Bytes(bytes) => bytes.clone(),
      Value::Str(string) => {
        if !string.is_ascii() {
          return Err(Error::TypeMismatch);
        }
        string.as_bytes().to_vec()
      }
      Value::List(elements) => elements.iter().map(Self::coerce).collect::<Result<_, _>>()?,
      scalar => vec![Self::coerce(scalar)?],
    };
    if let Some(count) = self.count {
      if values.len() > count {
        return Err(Error::TooLong);
      }
    }
    Ok(values)
  }

  /// ### SET VALUE
  pub fn set(&mut self, value: impl Into<Value>) -> Result<(), Error> {
    self.value = self.convert(&value.into())?;
    Ok(())
  }

  /// ### SUPPORTS VALUE
  pub fn supports_value(&self, value: &Value) -> bool {
    self.convert(value).is_ok()
  }

  /// ### GET VALUE
  pub fn get(&self) -> Value {
    if self.value.len() == 1 {
      Value::UInt(self.value[0] as u64)
    } else {
      Value::Bytes(self.value.clone())
    }
  }

  /// ### ELEMENTS
  pub fn values(&self) -> &[u8] {
    &self.value
  }

  /// ### ELEMENT COUNT
  pub fn len(&self) -> usize {
    self.value.len()
  }

  /// ### IS EMPTY
  pub fn is_empty(&self) -> bool {
    self.value.is_empty()
  }

  /// ### ENCODE
  pub fn encode(&self) -> Result<Vec<u8>, Error> {
    Vec::<u8>::try_from(Item::from(self.clone()))
  }

  /// ### DECODE
  pub fn decode(&mut self, data: &[u8], start: usize) -> Result<usize, Error> {
    let (item, next) = Item::decode_at(data, start)?;
    match item {
      Item::Bin(values) => {
        if let Some(count) = self.count {
          if values.len() > count {
            return Err(Error::TooLong);
          }
        }
        self.value = values;
        Ok(next)
      }
      _ => Err(Error::WrongFormat),
    }
  }
}
impl PartialEq for Binary {
  fn eq(&self, other: &Self) -> bool {
    self.value == other.value
  }
}
impl std::hash::Hash for Binary {
  fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
    self.value.hash(state);
  }
}
impl From<Binary> for Item {
  fn from(variable: Binary) -> Item {
    Item::Bin(variable.value)
  }
}
impl TryFrom<Item> for Binary {
  type Error = Error;

  fn try_from(item: Item) -> Result<Self, Self::Error> {
    match item {
      Item::Bin(values) => Ok(Self { value: values, count: None }),
      _ => Err(Error::WrongFormat),
    }
  }
}

/// ## BOOLEAN VARIABLE
///
/// Byte-per-element container where zero is false and non-zero is true.
///
/// Assignment admits booleans, the integers 0 and 1, and the fixed
/// case-insensitive string sets "true"/"yes" and "false"/"no". All other
/// integers and strings are rejected.
#[derive(Clone, Debug, Default)]
pub struct Boolean {
  value: Vec<bool>,
  count: Option<usize>,
}
impl Boolean {
  /// ### NEW VARIABLE
  pub fn new() -> Self {
    Self { value: vec![], count: None }
  }

  /// ### NEW VARIABLE WITH FIXED COUNT
  pub fn with_count(count: usize) -> Self {
    Self { value: vec![], count: Some(count) }
  }

  fn coerce(value: &Value) -> Result<bool, Error> {
    match value {
      Value::Bool(value) => Ok(*value),
      Value::Int(0) | Value::UInt(0) => Ok(false),
      Value::Int(1) | Value::UInt(1) => Ok(true),
      Value::Int(_) | Value::UInt(_) => Err(Error::OutOfRange),
      Value::Str(string) => {
        if string.eq_ignore_ascii_case("true") || string.eq_ignore_ascii_case("yes") {
          Ok(true)
        } else if string.eq_ignore_ascii_case("false") || string.eq_ignore_ascii_case("no") {
          Ok(false)
        } else {
          Err(Error::TypeMismatch)
        }
      }
      _ => Err(Error::TypeMismatch),
    }
  }

  fn convert(&self, value: &Value) -> Result<Vec<bool>, Error> {
    let values: Vec<bool> = match value {
      Value::List(elements) => elements.iter().map(Self::coerce).collect::<Result<_, _>>()?,
      scalar => vec![Self::coerce(scalar)?],
    };
    if let Some(count) = self.count {
      if values.len() > count {
        return Err(Error::TooLong);
      }
    }
    Ok(values)
  }

  /// ### SET VALUE
  pub fn set(&mut self, value: impl Into<Value>) -> Result<(), Error> {
    self.value = self.convert(&value.into())?;
    Ok(())
  }

  /// ### SUPPORTS VALUE
  pub fn supports_value(&self, value: &Value) -> bool {
    self.convert(value).is_ok()
  }

  /// ### GET VALUE
  pub fn get(&self) -> Value {
    if self.value.len() == 1 {
      Value::Bool(self.value[0])
    } else {
      Value::List(self.value.iter().map(|&value| Value::Bool(value)).collect())
    }
  }

  /// ### ELEMENTS
  pub fn values(&self) -> &[bool] {
    &self.value
  }

  /// ### ELEMENT COUNT
  pub fn len(&self) -> usize {
    self.value.len()
  }

  /// ### IS EMPTY
  pub fn is_empty(&self) -> bool {
    self.value.is_empty()
  }

  /// ### ENCODE
  pub fn encode(&self) -> Result<Vec<u8>, Error> {
    Vec::<u8>::try_from(Item::from(self.clone()))
  }

  /// ### DECODE
  pub fn decode(&mut self, data: &[u8], start: usize) -> Result<usize, Error> {
    let (item, next) = Item::decode_at(data, start)?;
    match item {
      Item::Bool(values) => {
        if let Some(count) = self.count {
          if values.len() > count {
            return Err(Error::TooLong);
          }
        }
        self.value = values;
        Ok(next)
      }
      _ => Err(Error::WrongFormat),
    }
  }
}
impl PartialEq for Boolean {
  fn eq(&self, other: &Self) -> bool {
    self.value == other.value
  }
}
impl std::hash::Hash for Boolean {
  fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
    self.value.hash(state);
  }
}
impl From<Boolean> for Item {
  fn from(variable: Boolean) -> Item {
    Item::Bool(variable.value)
  }
}
impl TryFrom<Item> for Boolean {
  type Error = Error;

  fn try_from(item: Item) -> Result<Self, Self::Error> {
    match item {
      Item::Bool(values) => Ok(Self { value: values, count: None }),
      _ => Err(Error::WrongFormat),
    }
  }
}

/// ## STRING VARIABLE MACRO
///
/// Expands to one character string container. The two instances differ only
/// in their [Format] and in the admission check applied to assigned text.
///
/// [Format]: crate::format::Format
macro_rules! string_variable {
  (
    $name:ident,
    $item:ident,
    $admit:expr,
    $doc:literal
  ) => {
    #[doc = $doc]
    #[derive(Clone, Debug, Default)]
    pub struct $name {
      value: String,
      count: Option<usize>,
    }
    impl $name {
      /// ### NEW VARIABLE
      pub fn new() -> Self {
        Self { value: String::new(), count: None }
      }

      /// ### NEW VARIABLE WITH FIXED COUNT
      ///
      /// Creates an empty variable which will refuse assignments of more
      /// than `count` characters.
      pub fn with_count(count: usize) -> Self {
        Self { value: String::new(), count: Some(count) }
      }

      fn convert(&self, value: &Value) -> Result<String, Error> {
        let admit: fn(&str) -> bool = $admit;
        let string: String = match value {
          Value::Str(string) => string.clone(),
          Value::Int(value) => value.to_string(),
          Value::UInt(value) => value.to_string(),
          Value::Float(value) => value.to_string(),
          Value::Bytes(bytes) => {
            if !bytes.is_ascii() {
              return Err(Error::TypeMismatch);
            }
            String::from_utf8(bytes.clone()).map_err(|_| Error::TypeMismatch)?
          }
          _ => return Err(Error::TypeMismatch),
        };
        if !admit(&string) {
          return Err(Error::TypeMismatch);
        }
        if let Some(count) = self.count {
          if string.chars().count() > count {
            return Err(Error::TooLong);
          }
        }
        Ok(string)
      }

      /// ### SET VALUE
      pub fn set(&mut self, value: impl Into<Value>) -> Result<(), Error> {
        self.value = self.convert(&value.into())?;
        Ok(())
      }

      /// ### SUPPORTS VALUE
      pub fn supports_value(&self, value: &Value) -> bool {
        self.convert(value).is_ok()
      }

      /// ### GET VALUE
      pub fn get(&self) -> Value {
        Value::Str(self.value.clone())
      }

      /// ### CONTENTS
      pub fn as_str(&self) -> &str {
        &self.value
      }

      /// ### CHARACTER COUNT
      pub fn len(&self) -> usize {
        self.value.chars().count()
      }

      /// ### IS EMPTY
      pub fn is_empty(&self) -> bool {
        self.value.is_empty()
      }

      /// ### ENCODE
      pub fn encode(&self) -> Result<Vec<u8>, Error> {
        Vec::<u8>::try_from(Item::from(self.clone()))
      }

      /// ### DECODE
      pub fn decode(&mut self, data: &[u8], start: usize) -> Result<usize, Error> {
        let (item, next) = Item::decode_at(data, start)?;
        match item {
          Item::$item(string) => {
            if let Some(count) = self.count {
              if string.chars().count() > count {
                return Err(Error::TooLong);
              }
            }
            self.value = string;
            Ok(next)
          }
          _ => Err(Error::WrongFormat),
        }
      }
    }
    impl PartialEq for $name {
      fn eq(&self, other: &Self) -> bool {
        self.value == other.value
      }
    }
    impl std::hash::Hash for $name {
      fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.value.hash(state);
      }
    }
    impl From<$name> for Item {
      fn from(variable: $name) -> Item {
        Item::$item(variable.value)
      }
    }
    impl TryFrom<Item> for $name {
      type Error = Error;

      fn try_from(item: Item) -> Result<Self, Self::Error> {
        match item {
          Item::$item(string) => Ok(Self { value: string, count: None }),
          _ => Err(Error::WrongFormat),
        }
      }
    }
  };
}

string_variable! {
  Ascii,
  Ascii,
  |string| string.is_ascii(),
  "## ASCII STRING VARIABLE\n\nCharacter string restricted to the 7-bit \
   range; assignment of wider text fails with a type mismatch. Numerics \
   are admitted in their decimal rendering."
}
string_variable! {
  Jis8,
  Jis8,
  |string| ISO_2022_JP.encode(string, encoding::EncoderTrap::Strict).is_ok(),
  "## JIS-8 STRING VARIABLE\n\nCharacter string restricted to the text the \
   ISO-2022-JP encoding can round-trip."
}

/// ## NAMED LIST VARIABLE
/// **Based on SEMI E5§9.3**
///
/// An ordered set of named child variables built from a template
/// `[(name, DataItem), ...]`, as used by stream/function definitions.
///
/// Children may be addressed by position or by name. Assigning a sequence
/// replaces children in order: over-length sequences fail with [Too Long],
/// under-length sequences leave the tail children untouched.
///
/// [Too Long]: crate::Error::TooLong
#[derive(Clone, Debug, Default, PartialEq)]
pub struct List {
  fields: Vec<(String, Variable)>,
}
impl List {
  /// ### NEW LIST FROM TEMPLATE
  ///
  /// Instantiates one child variable per template entry, in order.
  pub fn new(template: &[(&str, DataItem)]) -> Self {
    Self {
      fields: template
        .iter()
        .map(|(name, definition)| ((*name).to_owned(), definition.variable()))
        .collect(),
    }
  }

  /// ### NEW LIST FROM VARIABLES
  ///
  /// Builds a list directly from named child variables, for structures not
  /// described by a [Data Item] table.
  ///
  /// [Data Item]: DataItem
  pub fn from_fields(fields: Vec<(String, Variable)>) -> Self {
    Self { fields }
  }

  fn position(&self, key: FieldKey) -> Result<usize, Error> {
    match key {
      FieldKey::Index(index) => {
        if index < self.fields.len() {
          Ok(index)
        } else {
          Err(Error::UnknownField)
        }
      }
      FieldKey::Name(name) => self
        .fields
        .iter()
        .position(|(field_name, _)| field_name == name)
        .ok_or(Error::UnknownField),
    }
  }

  /// ### FIELD
  ///
  /// The child variable at the provided position or name.
  pub fn field<'a>(&self, key: impl Into<FieldKey<'a>>) -> Result<&Variable, Error> {
    let position = self.position(key.into())?;
    Ok(&self.fields[position].1)
  }

  /// ### MUTABLE FIELD
  pub fn field_mut<'a>(&mut self, key: impl Into<FieldKey<'a>>) -> Result<&mut Variable, Error> {
    let position = self.position(key.into())?;
    Ok(&mut self.fields[position].1)
  }

  /// ### SET FIELD
  ///
  /// Assigns a bare value to the child at the provided position or name,
  /// passing it through the child's own coercion.
  pub fn set_field<'a>(
    &mut self,
    key: impl Into<FieldKey<'a>>,
    value: impl Into<Value>,
  ) -> Result<(), Error> {
    self.field_mut(key)?.set(value)
  }

  /// ### SET FIELD FROM ITEM
  ///
  /// Assigns an already-concrete item to the child at the provided position
  /// or name, type-checked against the template.
  pub fn set_field_item<'a>(
    &mut self,
    key: impl Into<FieldKey<'a>>,
    item: Item,
  ) -> Result<(), Error> {
    self.field_mut(key)?.set_item(item)
  }

  /// ### SET VALUE
  ///
  /// Replaces children in order from a sequence value. A sequence longer
  /// than the template fails with [Too Long]; a shorter one leaves the
  /// tail children untouched.
  ///
  /// [Too Long]: crate::Error::TooLong
  pub fn set(&mut self, value: impl Into<Value>) -> Result<(), Error> {
    match value.into() {
      Value::List(elements) => {
        if elements.len() > self.fields.len() {
          return Err(Error::TooLong);
        }
        // Coerce into clones first so a failing element leaves every child
        // untouched.
        let mut replaced: Vec<Variable> = vec![];
        for (element, (_, field)) in elements.iter().zip(self.fields.iter()) {
          let mut candidate: Variable = field.clone();
          candidate.set(element.clone())?;
          replaced.push(candidate);
        }
        for ((_, field), candidate) in self.fields.iter_mut().zip(replaced) {
          *field = candidate;
        }
        Ok(())
      }
      _ => Err(Error::TypeMismatch),
    }
  }

  /// ### SUPPORTS VALUE
  pub fn supports_value(&self, value: &Value) -> bool {
    match value {
      Value::List(elements) => {
        elements.len() <= self.fields.len()
          && elements
            .iter()
            .zip(self.fields.iter())
            .all(|(element, (_, field))| field.supports_value(element))
      }
      _ => false,
    }
  }

  /// ### GET VALUE
  pub fn get(&self) -> Value {
    Value::List(self.fields.iter().map(|(_, field)| field.get()).collect())
  }

  /// ### CHILD COUNT
  pub fn len(&self) -> usize {
    self.fields.len()
  }

  /// ### IS EMPTY
  pub fn is_empty(&self) -> bool {
    self.fields.is_empty()
  }

  /// ### ITEM
  ///
  /// The list and its children as a concrete [Item] tree.
  ///
  /// [Item]: crate::Item
  pub fn item(&self) -> Result<Item, Error> {
    Ok(Item::List(
      self
        .fields
        .iter()
        .map(|(_, field)| field.item())
        .collect::<Result<Vec<Item>, Error>>()?,
    ))
  }

  /// ### ENCODE
  pub fn encode(&self) -> Result<Vec<u8>, Error> {
    Vec::<u8>::try_from(self.item()?)
  }

  /// ### DECODE
  ///
  /// Deserializes a list item at `start` whose length matches the template,
  /// delegating each child to the templated variable in order.
  pub fn decode(&mut self, data: &[u8], start: usize) -> Result<usize, Error> {
    let (position, format, length) = crate::decode_item_header(data, start)?;
    if format != Format::List {
      return Err(Error::WrongFormat);
    }
    if length != self.fields.len() {
      return Err(Error::WrongFormat);
    }
    let mut position: usize = position;
    for (_, field) in self.fields.iter_mut() {
      position = field.decode(data, position)?;
    }
    Ok(position)
  }
}

/// ## HOMOGENEOUS ARRAY VARIABLE
///
/// A list whose elements all share one [Data Item] definition, with an
/// optional exact element count.
///
/// [Data Item]: DataItem
#[derive(Clone, Debug, PartialEq)]
pub struct Array {
  definition: DataItem,
  items: Vec<Variable>,
  count: Option<usize>,
}
impl Array {
  /// ### NEW ARRAY
  pub fn new(definition: DataItem) -> Self {
    Self { definition, items: vec![], count: None }
  }

  /// ### NEW ARRAY WITH FIXED COUNT
  ///
  /// Creates an array which will refuse assignments whose length is not
  /// exactly `count`.
  pub fn with_count(definition: DataItem, count: usize) -> Self {
    Self { definition, items: vec![], count: Some(count) }
  }

  fn convert(&self, value: &Value) -> Result<Vec<Variable>, Error> {
    let elements: &[Value] = match value {
      Value::List(elements) => elements,
      _ => return Err(Error::TypeMismatch),
    };
    if let Some(count) = self.count {
      if elements.len() > count {
        return Err(Error::TooLong);
      }
      if elements.len() < count {
        return Err(Error::TypeMismatch);
      }
    }
    elements
      .iter()
      .map(|element| {
        let mut item: Variable = self.definition.variable();
        item.set(element.clone())?;
        Ok(item)
      })
      .collect()
  }

  /// ### SET VALUE
  pub fn set(&mut self, value: impl Into<Value>) -> Result<(), Error> {
    self.items = self.convert(&value.into())?;
    Ok(())
  }

  /// ### SUPPORTS VALUE
  pub fn supports_value(&self, value: &Value) -> bool {
    self.convert(value).is_ok()
  }

  /// ### GET VALUE
  pub fn get(&self) -> Value {
    Value::List(self.items.iter().map(Variable::get).collect())
  }

  /// ### ELEMENTS
  pub fn items(&self) -> &[Variable] {
    &self.items
  }

  /// ### ELEMENT COUNT
  pub fn len(&self) -> usize {
    self.items.len()
  }

  /// ### IS EMPTY
  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  /// ### ITEM
  pub fn item(&self) -> Result<Item, Error> {
    Ok(Item::List(
      self
        .items
        .iter()
        .map(Variable::item)
        .collect::<Result<Vec<Item>, Error>>()?,
    ))
  }

  /// ### ENCODE
  pub fn encode(&self) -> Result<Vec<u8>, Error> {
    Vec::<u8>::try_from(self.item()?)
  }

  /// ### DECODE
  pub fn decode(&mut self, data: &[u8], start: usize) -> Result<usize, Error> {
    let (position, format, length) = crate::decode_item_header(data, start)?;
    if format != Format::List {
      return Err(Error::WrongFormat);
    }
    if let Some(count) = self.count {
      if length != count {
        return Err(Error::WrongFormat);
      }
    }
    let mut position: usize = position;
    let mut items: Vec<Variable> = Vec::with_capacity(length.min(256));
    for _ in 0..length {
      let mut item: Variable = self.definition.variable();
      position = item.decode(data, position)?;
      items.push(item);
    }
    self.items = items;
    Ok(position)
  }
}

/// ## DYNAMIC VARIABLE
///
/// A polymorphic holder bound to a set of allowed [Format]s, replacing the
/// per-item subclassing of type-flexible data items with runtime format
/// negotiation.
///
/// On assignment the allowed formats are probed in declaration order and
/// the first container which admits the value is instantiated; the
/// data-item tables declare their formats narrowest first, so the smallest
/// admitting type wins. On decode any allowed format is accepted. An empty
/// allowed set accepts every format.
///
/// [Format]: crate::format::Format
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Dynamic {
  allowed: Vec<Format>,
  value: Option<Box<Variable>>,
}
impl Dynamic {
  /// ### PROBE ORDER FOR THE UNRESTRICTED HOLDER
  ///
  /// The order in which formats are tried when the allowed set is empty,
  /// narrowest first.
  const ANY_ORDER: [Format; 13] = [
    Format::Boolean,
    Format::U1,
    Format::U2,
    Format::U4,
    Format::U8,
    Format::I1,
    Format::I2,
    Format::I4,
    Format::I8,
    Format::F4,
    Format::F8,
    Format::Ascii,
    Format::Binary,
  ];

  /// ### NEW DYNAMIC VARIABLE
  ///
  /// Creates an unresolved holder bound to the provided allowed formats; an
  /// empty set accepts any format.
  pub fn new(allowed: Vec<Format>) -> Self {
    Self { allowed, value: None }
  }

  /// ### ALLOWED FORMATS
  pub fn allowed(&self) -> &[Format] {
    &self.allowed
  }

  /// ### RESOLVED VARIABLE
  ///
  /// The currently-instantiated concrete variable, when one has been
  /// resolved by assignment or decode.
  pub fn resolved(&self) -> Option<&Variable> {
    self.value.as_deref()
  }

  fn admits(&self, format: Format) -> bool {
    self.allowed.is_empty() || self.allowed.contains(&format)
  }

  fn probe(&self, value: &Value) -> Result<Variable, Error> {
    let order: &[Format] = if self.allowed.is_empty() { &Self::ANY_ORDER } else { &self.allowed };
    for &format in order {
      let mut candidate: Variable = variable_for(format, None);
      if candidate.supports_value(value) {
        candidate.set(value.clone())?;
        return Ok(candidate);
      }
    }
    Err(Error::TypeMismatch)
  }

  /// ### SET VALUE
  ///
  /// Probes the allowed formats in declaration order and commits the first
  /// container which admits the value.
  pub fn set(&mut self, value: impl Into<Value>) -> Result<(), Error> {
    self.value = Some(Box::new(self.probe(&value.into())?));
    Ok(())
  }

  /// ### SET FROM ITEM
  ///
  /// Adopts an already-concrete item directly when its format is allowed.
  pub fn set_item(&mut self, item: Item) -> Result<(), Error> {
    if !self.admits(item.format()) {
      return Err(Error::WrongFormat);
    }
    self.value = Some(Box::new(Variable::from(item)));
    Ok(())
  }

  /// ### SUPPORTS VALUE
  pub fn supports_value(&self, value: &Value) -> bool {
    self.probe(value).is_ok()
  }

  /// ### GET VALUE
  ///
  /// The resolved contents; an unresolved holder reads as an empty
  /// sequence.
  pub fn get(&self) -> Value {
    match &self.value {
      Some(variable) => variable.get(),
      None => Value::List(vec![]),
    }
  }

  /// ### ELEMENT COUNT
  pub fn len(&self) -> usize {
    self.value.as_ref().map_or(0, |variable| variable.len())
  }

  /// ### IS EMPTY
  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// ### ITEM
  ///
  /// The resolved contents as a concrete [Item]; fails while unresolved.
  ///
  /// [Item]: crate::Item
  pub fn item(&self) -> Result<Item, Error> {
    match &self.value {
      Some(variable) => variable.item(),
      None => Err(Error::TypeMismatch),
    }
  }

  /// ### ENCODE
  pub fn encode(&self) -> Result<Vec<u8>, Error> {
    Vec::<u8>::try_from(self.item()?)
  }

  /// ### DECODE
  ///
  /// Peeks the format code at `start` and delegates to that format's
  /// container when it is allowed.
  pub fn decode(&mut self, data: &[u8], start: usize) -> Result<usize, Error> {
    let (_, format, _) = crate::decode_item_header(data, start)?;
    if !self.admits(format) {
      return Err(Error::WrongFormat);
    }
    let mut variable: Variable = variable_for(format, None);
    let next: usize = variable.decode(data, start)?;
    self.value = Some(Box::new(variable));
    Ok(next)
  }
}

/// ## VARIABLE
///
/// The sum of every typed container, providing the common operations with
/// dispatch on the resolved kind.
#[derive(Clone, Debug, PartialEq)]
pub enum Variable {
  /// ### BINARY
  Binary(Binary),

  /// ### BOOLEAN
  Boolean(Boolean),

  /// ### ASCII STRING
  Ascii(Ascii),

  /// ### JIS-8 STRING
  Jis8(Jis8),

  /// ### 1-BYTE SIGNED INTEGER
  I1(I1),

  /// ### 2-BYTE SIGNED INTEGER
  I2(I2),

  /// ### 4-BYTE SIGNED INTEGER
  I4(I4),

  /// ### 8-BYTE SIGNED INTEGER
  I8(I8),

  /// ### 1-BYTE UNSIGNED INTEGER
  U1(U1),

  /// ### 2-BYTE UNSIGNED INTEGER
  U2(U2),

  /// ### 4-BYTE UNSIGNED INTEGER
  U4(U4),

  /// ### 8-BYTE UNSIGNED INTEGER
  U8(U8),

  /// ### 4-BYTE FLOATING POINT NUMBER
  F4(F4),

  /// ### 8-BYTE FLOATING POINT NUMBER
  F8(F8),

  /// ### NAMED LIST
  List(List),

  /// ### HOMOGENEOUS ARRAY
  Array(Array),

  /// ### DYNAMIC HOLDER
  Dynamic(Dynamic),
}

/// ## VARIABLE DISPATCH MACRO
///
/// Expands one match over every [Variable] kind, applying the same method
/// call to the inner container.
///
/// [Variable]: Variable
macro_rules! each_variable {
  ($self:expr, $inner:ident => $body:expr) => {
    match $self {
      Variable::Binary($inner) => $body,
      Variable::Boolean($inner) => $body,
      Variable::Ascii($inner) => $body,
      Variable::Jis8($inner) => $body,
      Variable::I1($inner) => $body,
      Variable::I2($inner) => $body,
      Variable::I4($inner) => $body,
      Variable::I8($inner) => $body,
      Variable::U1($inner) => $body,
      Variable::U2($inner) => $body,
      Variable::U4($inner) => $body,
      Variable::U8($inner) => $body,
      Variable::F4($inner) => $body,
      Variable::F8($inner) => $body,
      Variable::List($inner) => $body,
      Variable::Array($inner) => $body,
      Variable::Dynamic($inner) => $body,
    }
  };
}

impl Variable {
  /// ### SET VALUE
  ///
  /// Delegates to the container's own coercion.
  pub fn set(&mut self, value: impl Into<Value>) -> Result<(), Error> {
    let value: Value = value.into();
    each_variable!(self, inner => inner.set(value))
  }

  /// ### SET FROM ITEM
  ///
  /// Adopts a concrete item, type-checked against this variable's kind.
  pub fn set_item(&mut self, item: Item) -> Result<(), Error> {
    match self {
      Variable::Dynamic(inner) => inner.set_item(item),
      _ => {
        if item.format() != self.format().ok_or(Error::WrongFormat)? {
          return Err(Error::WrongFormat);
        }
        // Round-trip through the item's encoding so element counts and
        // string admission checks are applied uniformly.
        let encoded: Vec<u8> = Vec::<u8>::try_from(item)?;
        self.decode(&encoded, 0).map(|_| ())
      }
    }
  }

  /// ### SUPPORTS VALUE
  pub fn supports_value(&self, value: &Value) -> bool {
    each_variable!(self, inner => inner.supports_value(value))
  }

  /// ### GET VALUE
  pub fn get(&self) -> Value {
    each_variable!(self, inner => inner.get())
  }

  /// ### ELEMENT COUNT
  pub fn len(&self) -> usize {
    each_variable!(self, inner => inner.len())
  }

  /// ### IS EMPTY
  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// ### VARIABLE FORMAT
  ///
  /// The wire format of this variable; [None] for a [Dynamic] holder which
  /// has not yet resolved.
  ///
  /// [Dynamic]: Dynamic
  pub fn format(&self) -> Option<Format> {
    match self {
      Variable::Binary(_) => Some(Format::Binary),
      Variable::Boolean(_) => Some(Format::Boolean),
      Variable::Ascii(_) => Some(Format::Ascii),
      Variable::Jis8(_) => Some(Format::Jis8),
      Variable::I1(_) => Some(Format::I1),
      Variable::I2(_) => Some(Format::I2),
      Variable::I4(_) => Some(Format::I4),
      Variable::I8(_) => Some(Format::I8),
      Variable::U1(_) => Some(Format::U1),
      Variable::U2(_) => Some(Format::U2),
      Variable::U4(_) => Some(Format::U4),
      Variable::U8(_) => Some(Format::U8),
      Variable::F4(_) => Some(Format::F4),
      Variable::F8(_) => Some(Format::F8),
      Variable::List(_) | Variable::Array(_) => Some(Format::List),
      Variable::Dynamic(inner) => inner.resolved().and_then(Variable::format),
    }
  }

  /// ### ITEM
  ///
  /// The contents as a concrete [Item] tree.
  ///
  /// [Item]: crate::Item
  pub fn item(&self) -> Result<Item, Error> {
    match self {
      Variable::Binary(inner) => Ok(Item::from(inner.clone())),
      Variable::Boolean(inner) => Ok(Item::from(inner.clone())),
      Variable::Ascii(inner) => Ok(Item::from(inner.clone())),
      Variable::Jis8(inner) => Ok(Item::from(inner.clone())),
      Variable::I1(inner) => Ok(Item::from(inner.clone())),
      Variable::I2(inner) => Ok(Item::from(inner.clone())),
      Variable::I4(inner) => Ok(Item::from(inner.clone())),
      Variable::I8(inner) => Ok(Item::from(inner.clone())),
      Variable::U1(inner) => Ok(Item::from(inner.clone())),
      Variable::U2(inner) => Ok(Item::from(inner.clone())),
      Variable::U4(inner) => Ok(Item::from(inner.clone())),
      Variable::U8(inner) => Ok(Item::from(inner.clone())),
      Variable::F4(inner) => Ok(Item::from(inner.clone())),
      Variable::F8(inner) => Ok(Item::from(inner.clone())),
      Variable::List(inner) => inner.item(),
      Variable::Array(inner) => inner.item(),
      Variable::Dynamic(inner) => inner.item(),
    }
  }

  /// ### ENCODE
  pub fn encode(&self) -> Result<Vec<u8>, Error> {
    Vec::<u8>::try_from(self.item()?)
  }

  /// ### DECODE
  pub fn decode(&mut self, data: &[u8], start: usize) -> Result<usize, Error> {
    each_variable!(self, inner => inner.decode(data, start))
  }
}
impl From<Item> for Variable {
  /// ### ITEM -> VARIABLE
  ///
  /// Wraps a decoded item in the matching unconstrained container. List
  /// items become positional lists with unnamed children.
  fn from(item: Item) -> Self {
    match item {
      Item::List(items) => Variable::List(List::from_fields(
        items
          .into_iter()
          .map(|child| (String::new(), Variable::from(child)))
          .collect(),
      )),
      Item::Ascii(string) => Variable::Ascii(Ascii { value: string, count: None }),
      Item::Jis8(string) => Variable::Jis8(Jis8 { value: string, count: None }),
      Item::Bin(values) => Variable::Binary(Binary { value: values, count: None }),
      Item::Bool(values) => Variable::Boolean(Boolean { value: values, count: None }),
      Item::I1(values) => Variable::I1(I1 { value: values, count: None }),
      Item::I2(values) => Variable::I2(I2 { value: values, count: None }),
      Item::I4(values) => Variable::I4(I4 { value: values, count: None }),
      Item::I8(values) => Variable::I8(I8 { value: values, count: None }),
      Item::U1(values) => Variable::U1(U1 { value: values, count: None }),
      Item::U2(values) => Variable::U2(U2 { value: values, count: None }),
      Item::U4(values) => Variable::U4(U4 { value: values, count: None }),
      Item::U8(values) => Variable::U8(U8 { value: values, count: None }),
      Item::F4(values) => Variable::F4(F4 { value: values, count: None }),
      Item::F8(values) => Variable::F8(F8 { value: values, count: None }),
    }
  }
}

/// ## VARIABLE FOR FORMAT
///
/// Instantiates the empty, unconstrained container for a [Format]; the
/// [LIST] format yields an empty positional list.
///
/// [Format]: crate::format::Format
/// [LIST]:   crate::format::Format::List
pub fn variable_for(format: Format, count: Option<usize>) -> Variable {
  match format {
    Format::List => Variable::List(List::from_fields(vec![])),
    Format::Binary => Variable::Binary(match count {
      Some(count) => Binary::with_count(count),
      None => Binary::new(),
    }),
    Format::Boolean => Variable::Boolean(match count {
      Some(count) => Boolean::with_count(count),
      None => Boolean::new(),
    }),
    Format::Ascii => Variable::Ascii(match count {
      Some(count) => Ascii::with_count(count),
      None => Ascii::new(),
    }),
    Format::Jis8 => Variable::Jis8(match count {
      Some(count) => Jis8::with_count(count),
      None => Jis8::new(),
    }),
    Format::I1 => Variable::I1(match count {
      Some(count) => I1::with_count(count),
      None => I1::new(),
    }),
    Format::I2 => Variable::I2(match count {
      Some(count) => I2::with_count(count),
      None => I2::new(),
    }),
    Format::I4 => Variable::I4(match count {
      Some(count) => I4::with_count(count),
      None => I4::new(),
    }),
    Format::I8 => Variable::I8(match count {
      Some(count) => I8::with_count(count),
      None => I8::new(),
    }),
    Format::U1 => Variable::U1(match count {
      Some(count) => U1::with_count(count),
      None => U1::new(),
    }),
    Format::U2 => Variable::U2(match count {
      Some(count) => U2::with_count(count),
      None => U2::new(),
    }),
    Format::U4 => Variable::U4(match count {
      Some(count) => U4::with_count(count),
      None => U4::new(),
    }),
    Format::U8 => Variable::U8(match count {
      Some(count) => U8::with_count(count),
      None => U8::new(),
    }),
    Format::F4 => Variable::F4(match count {
      Some(count) => F4::with_count(count),
      None => F4::new(),
    }),
    Format::F8 => Variable::F8(match count {
      Some(count) => F8::with_count(count),
      None => F8::new(),
    }),
  }
}

/// ## DATA ITEM DEFINITION
///
/// The declarative table entry from which message definitions construct
/// their variables, flattening the per-item subclassing of the standard's
/// Data Item Dictionary into `(name, formats, count)`.
///
/// One allowed format constructs the concrete container directly; several
/// construct a [Dynamic] holder probing them in declaration order.
///
/// [Dynamic]: Dynamic
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DataItem {
  /// ### ITEM NAME
  ///
  /// The name of the data item as given by the Data Item Dictionary.
  pub name: &'static str,

  /// ### ALLOWED FORMATS
  ///
  /// The formats the item may legally carry, narrowest first.
  pub formats: &'static [Format],

  /// ### FIXED ELEMENT COUNT
  pub count: Option<usize>,
}
impl DataItem {
  /// ### NEW DEFINITION
  pub const fn new(name: &'static str, formats: &'static [Format]) -> Self {
    Self { name, formats, count: None }
  }

  /// ### NEW DEFINITION WITH FIXED COUNT
  pub const fn with_count(name: &'static str, formats: &'static [Format], count: usize) -> Self {
    Self { name, formats, count: Some(count) }
  }

  /// ### INSTANTIATE
  ///
  /// Constructs the variable this definition describes.
  pub fn variable(&self) -> Variable {
    match self.formats {
      [format] => variable_for(*format, self.count),
      formats => Variable::Dynamic(Dynamic::new(formats.to_vec())),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn u1_bounds() {
    let mut variable = U1::new();
    assert!(variable.set(0u8).is_ok());
    assert!(variable.set(255u8).is_ok());
    assert_eq!(variable.set(-1i64), Err(Error::OutOfRange));
    assert_eq!(variable.set(256i64), Err(Error::OutOfRange));
  }

  #[test]
  fn i2_bounds() {
    let mut variable = I2::new();
    assert!(variable.set(-32768i64).is_ok());
    assert!(variable.set(32767i64).is_ok());
    assert_eq!(variable.set(-32769i64), Err(Error::OutOfRange));
    assert_eq!(variable.set(32768i64), Err(Error::OutOfRange));
  }

  #[test]
  fn integer_accepts_numeric_string() {
    let mut variable = U2::new();
    variable.set("1337").unwrap();
    assert_eq!(variable.values(), &[1337]);
    assert_eq!(variable.set("twelve"), Err(Error::TypeMismatch));
    assert_eq!(variable.set("70000"), Err(Error::OutOfRange));
  }

  #[test]
  fn integer_accepts_boolean_and_integral_float() {
    let mut variable = I4::new();
    variable.set(true).unwrap();
    assert_eq!(variable.values(), &[1]);
    variable.set(12.0f64).unwrap();
    assert_eq!(variable.values(), &[12]);
    assert_eq!(variable.set(12.5f64), Err(Error::TypeMismatch));
  }

  #[test]
  fn vector_assignment_is_all_or_nothing() {
    let mut variable = U1::new();
    variable.set(vec![1u8, 2, 3]).unwrap();
    assert_eq!(variable.set(Value::List(vec![Value::UInt(7), Value::Int(-1)])), Err(Error::OutOfRange));
    // The failing assignment left the previous contents in place.
    assert_eq!(variable.values(), &[1, 2, 3]);
  }

  #[test]
  fn fixed_count_rejects_over_length() {
    let mut variable = U1::with_count(2);
    variable.set(vec![1u8]).unwrap();
    assert_eq!(variable.set(vec![1u8, 2, 3]), Err(Error::TooLong));
  }

  #[test]
  fn f4_wire_format() {
    let mut variable = F4::new();
    variable.set(123.0f32).unwrap();
    assert_eq!(variable.encode().unwrap(), vec![0x91, 0x04, 0x42, 0xF6, 0x00, 0x00]);
  }

  #[test]
  fn boolean_coercion() {
    let mut variable = Boolean::new();
    variable.set(true).unwrap();
    assert_eq!(variable.values(), &[true]);
    variable.set(0i64).unwrap();
    assert_eq!(variable.values(), &[false]);
    variable.set("YES").unwrap();
    assert_eq!(variable.values(), &[true]);
    variable.set("False").unwrap();
    assert_eq!(variable.values(), &[false]);
    assert_eq!(variable.set(2i64), Err(Error::OutOfRange));
    assert_eq!(variable.set("maybe"), Err(Error::TypeMismatch));
  }

  #[test]
  fn binary_coercion() {
    let mut variable = Binary::new();
    variable.set(Value::Bytes(vec![1, 2, 3])).unwrap();
    assert_eq!(variable.values(), &[1, 2, 3]);
    variable.set("AB").unwrap();
    assert_eq!(variable.values(), &[0x41, 0x42]);
    variable.set(200u64).unwrap();
    assert_eq!(variable.values(), &[200]);
    variable.set(vec![0u8, 255]).unwrap();
    assert_eq!(variable.values(), &[0, 255]);
    assert_eq!(variable.set(256i64), Err(Error::OutOfRange));
  }

  #[test]
  fn ascii_admission() {
    let mut variable = Ascii::new();
    variable.set("testString").unwrap();
    assert_eq!(variable.as_str(), "testString");
    variable.set(1337u64).unwrap();
    assert_eq!(variable.as_str(), "1337");
    assert_eq!(variable.set("héllo"), Err(Error::TypeMismatch));
  }

  #[test]
  fn ascii_fixed_count() {
    let mut variable = Ascii::with_count(6);
    variable.set("ABC").unwrap();
    assert_eq!(variable.set("ABCDEFG"), Err(Error::TooLong));
  }

  #[test]
  fn variable_equality_ignores_count() {
    let mut left = U4::new();
    let mut right = U4::with_count(8);
    left.set(7u32).unwrap();
    right.set(7u32).unwrap();
    assert_eq!(left, right);
  }

  #[test]
  fn decode_returns_next_position() {
    let mut buffer = vec![];
    Item::u4(1337).encode_into(&mut buffer).unwrap();
    Item::ascii("ok").unwrap().encode_into(&mut buffer).unwrap();
    let mut number = U4::new();
    let mut text = Ascii::new();
    let next = number.decode(&buffer, 0).unwrap();
    let end = text.decode(&buffer, next).unwrap();
    assert_eq!(number.values(), &[1337]);
    assert_eq!(text.as_str(), "ok");
    assert_eq!(end, buffer.len());
  }

  #[test]
  fn decode_rejects_wrong_format() {
    let buffer = Vec::<u8>::try_from(Item::u4(1)).unwrap();
    let mut variable = Ascii::new();
    assert_eq!(variable.decode(&buffer, 0), Err(Error::WrongFormat));
  }

  const DATA_ID: DataItem = DataItem::new(
    "DATAID",
    &[
      Format::U1,
      Format::U2,
      Format::U4,
      Format::U8,
      Format::I1,
      Format::I2,
      Format::I4,
      Format::I8,
      Format::Ascii,
    ],
  );

  #[test]
  fn dynamic_selects_narrowest_allowed_type() {
    let mut variable = Dynamic::new(vec![Format::U1, Format::U2, Format::U4]);
    variable.set(5u64).unwrap();
    assert_eq!(variable.resolved().unwrap().format(), Some(Format::U1));
    variable.set(300u64).unwrap();
    assert_eq!(variable.resolved().unwrap().format(), Some(Format::U2));
    variable.set(70000u64).unwrap();
    assert_eq!(variable.resolved().unwrap().format(), Some(Format::U4));
  }

  #[test]
  fn dynamic_rejects_unsupported_value() {
    let mut variable = Dynamic::new(vec![Format::U1, Format::U2]);
    assert_eq!(variable.set(-1i64), Err(Error::TypeMismatch));
  }

  #[test]
  fn dynamic_adopts_allowed_item() {
    let mut variable = DATA_ID.variable();
    variable.set_item(Item::ascii("WAFER-7").unwrap()).unwrap();
    assert_eq!(variable.format(), Some(Format::Ascii));
    assert_eq!(
      variable.set_item(Item::F4(vec![1.0])),
      Err(Error::WrongFormat)
    );
  }

  #[test]
  fn dynamic_decode_honors_allowed_set() {
    let encoded = Vec::<u8>::try_from(Item::u4(1337)).unwrap();
    let mut accepts = Dynamic::new(vec![Format::U4]);
    let next = accepts.decode(&encoded, 0).unwrap();
    assert_eq!(next, encoded.len());
    assert_eq!(accepts.get(), Value::UInt(1337));

    let mut rejects = Dynamic::new(vec![Format::Ascii]);
    assert_eq!(rejects.decode(&encoded, 0), Err(Error::WrongFormat));
  }

  #[test]
  fn dynamic_with_empty_allowed_set_accepts_any() {
    let mut variable = Dynamic::new(vec![]);
    let encoded = Vec::<u8>::try_from(Item::bool(true)).unwrap();
    variable.decode(&encoded, 0).unwrap();
    assert_eq!(variable.get(), Value::Bool(true));
  }

  const OBJ_SPEC: DataItem = DataItem::new("OBJSPEC", &[Format::Ascii]);
  const M_EXP: DataItem = DataItem::with_count("MEXP", &[Format::Ascii], 6);

  #[test]
  fn data_item_with_single_format_is_concrete() {
    let mut variable = OBJ_SPEC.variable();
    assert_eq!(variable.format(), Some(Format::Ascii));
    variable.set("OBJ:1").unwrap();
    assert_eq!(variable.get(), Value::Str("OBJ:1".to_owned()));
  }

  #[test]
  fn data_item_count_is_enforced() {
    let mut variable = M_EXP.variable();
    variable.set("S01E05").unwrap();
    assert_eq!(variable.set("S01E005"), Err(Error::TooLong));
  }

  #[test]
  fn list_fields_by_name_and_index() {
    let mut list = List::new(&[("OBJSPEC", OBJ_SPEC), ("DATAID", DATA_ID)]);
    list.set_field("OBJSPEC", "OBJ:2").unwrap();
    list.set_field(1usize, 12u64).unwrap();
    assert_eq!(list.field("OBJSPEC").unwrap().get(), Value::Str("OBJ:2".to_owned()));
    assert_eq!(list.field(1usize).unwrap().get(), Value::UInt(12));
    assert_eq!(list.field("NOSUCH").err(), Some(Error::UnknownField));
    assert_eq!(list.field(2usize).err(), Some(Error::UnknownField));
  }

  #[test]
  fn list_sequence_assignment() {
    let mut list = List::new(&[("OBJSPEC", OBJ_SPEC), ("DATAID", DATA_ID)]);
    list.set_field("DATAID", 99u64).unwrap();
    // Under-length assignment replaces the head and leaves the tail.
    list.set(Value::List(vec![Value::Str("OBJ:3".to_owned())])).unwrap();
    assert_eq!(list.field("DATAID").unwrap().get(), Value::UInt(99));
    // Over-length assignment fails.
    assert_eq!(
      list.set(Value::List(vec![
        Value::Str("A".to_owned()),
        Value::UInt(1),
        Value::UInt(2),
      ])),
      Err(Error::TooLong)
    );
  }

  #[test]
  fn list_round_trip() {
    let mut list = List::new(&[("OBJSPEC", OBJ_SPEC), ("DATAID", DATA_ID)]);
    list.set_field("OBJSPEC", "OBJ:4").unwrap();
    list.set_field("DATAID", 7u64).unwrap();
    let encoded = list.encode().unwrap();
    let mut decoded = List::new(&[("OBJSPEC", OBJ_SPEC), ("DATAID", DATA_ID)]);
    let next = decoded.decode(&encoded, 0).unwrap();
    assert_eq!(next, encoded.len());
    assert_eq!(decoded.field("OBJSPEC").unwrap().get(), Value::Str("OBJ:4".to_owned()));
    assert_eq!(decoded.field("DATAID").unwrap().get(), Value::UInt(7));
  }

  #[test]
  fn array_round_trip_and_count() {
    let mut array = Array::new(OBJ_SPEC);
    array.set(vec!["A", "B", "C"]).unwrap();
    let encoded = array.encode().unwrap();
    let mut decoded = Array::new(OBJ_SPEC);
    decoded.decode(&encoded, 0).unwrap();
    assert_eq!(decoded.len(), 3);
    assert_eq!(decoded.items()[2].get(), Value::Str("C".to_owned()));

    let mut fixed = Array::with_count(OBJ_SPEC, 2);
    assert_eq!(fixed.set(vec!["A", "B", "C"]), Err(Error::TooLong));
    fixed.set(vec!["A", "B"]).unwrap();
  }
}
