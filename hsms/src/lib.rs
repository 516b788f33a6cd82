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

//! # HIGH-SPEED SECS MESSAGE SERVICES (HSMS)
//!
//! **Based on:**
//! - **[SEMI E37]-1109**
//!
//! ---------------------------------------------------------------------------
//!
//! HSMS is a protocol designed to facilitate the reliable transmission of
//! messages between semiconductor equipment over TCP/IP, most commonly
//! encoded with the SECS-II ([SEMI E5]) protocol.
//!
//! For ease of programming and extension, the functionality of the protocol
//! has been divided into a few subsets:
//!
//! - The [Primitive Services], which manage the TCP/IP connection and the
//!   framing of messages with proper headers and length prefixes.
//! - The [Session Services], which manage the selection state, the control
//!   transactions which move it, and the protocol timers.
//! - The [Data Services], which correlate requests to replies by their
//!   system bytes and dispatch inbound messages to registered handlers by
//!   stream and function.
//!
//! The [Settings] module carries the parameters all three layers abide by.
//!
//! ---------------------------------------------------------------------------
//!
//! ## Referenced Standards
//!
//! - SEMI E4      - SEMI Equipment Communications Standard 1 Message Transfer (SECS-I)
//! - SEMI E5      - SEMI Equipment Communications Standard 2 Message Content (SECS-II)
//! - IETF RFC 791 - Internet Protocol (IP)
//! - IETF RFC 793 - Transmission Control Protocol (TCP)
//!
//! [SEMI E5]:  https://store-us.semi.org/products/e00500-semi-e5-specification-for-semi-equipment-communications-standard-2-message-content-secs-ii
//! [SEMI E37]: https://store-us.semi.org/products/e03700-semi-e37-high-speed-secs-message-services-hsms-generic-services
//!
//! [Primitive Services]: primitive
//! [Session Services]:   session
//! [Data Services]:      dispatch
//! [Settings]:           settings

pub mod dispatch;
pub mod primitive;
pub mod session;
pub mod settings;

pub use dispatch::Handler;
pub use primitive::ConnectionMode;
pub use session::{RejectReason, SelectionState};
pub use settings::{DeviceType, Settings};

/// ## PRESENTATION TYPE
/// **Based on SEMI E37-1109§8.2.6.4**
///
/// An enumerated value defining the encoding of a message's text.
///
/// Values 1-127 are reserved for Subsidiary Standards; values 128-255 are
/// reserved and may not be used.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PresentationType {
  /// ### SECS-II ENCODING
  SecsII = 0,
}

/// ## ERROR
///
/// Represents a failure of an [HSMS] procedure.
///
/// [HSMS]: crate
#[derive(Debug, thiserror::Error)]
pub enum Error {
  /// ### NOT CONNECTED
  ///
  /// The procedure requires an established TCP/IP connection.
  #[error("the connection is not established")]
  NotConnected,

  /// ### NOT SELECTED
  ///
  /// The procedure requires the session to be in the selected state.
  #[error("the session entity is not selected")]
  NotSelected,

  /// ### I/O FAILURE
  ///
  /// The underlying connection failed while being established or torn
  /// down.
  #[error("i/o failure on the connection")]
  Io(#[from] std::io::Error),

  /// ### SEND FAILED
  ///
  /// A message could not be written to the wire; the session drops to the
  /// not-connected state.
  #[error("the message could not be transmitted")]
  SendFailed(#[source] std::io::Error),

  /// ### TIMEOUT
  ///
  /// The deadline elapsed before the awaited reply arrived: T3 for data
  /// transactions, T6 for control transactions.
  #[error("the deadline elapsed before a reply arrived")]
  Timeout,

  /// ### DISCONNECTED
  ///
  /// The connection dropped while a reply was being awaited.
  #[error("the connection dropped while waiting for a reply")]
  Disconnected,

  /// ### CONTROL REFUSED
  ///
  /// The remote entity answered a control request with a non-zero status.
  #[error("the remote entity refused the control transaction with status {0}")]
  ControlRefused(u8),

  /// ### PROTOCOL VIOLATION
  ///
  /// The remote entity sent something inappropriate for the current state,
  /// or rejected a message of ours.
  #[error("protocol violation: {0:?}")]
  ProtocolViolation(session::RejectReason),

  /// ### TRANSACTION CONFLICT
  ///
  /// A transaction with the same system bytes is already open.
  #[error("a transaction with the same system bytes is already open")]
  TransactionConflict,

  /// ### CONTENT ERROR
  ///
  /// The SECS-II text of a message could not be encoded or decoded.
  #[error("message content error")]
  Content(#[from] secs_ii::Error),
}
