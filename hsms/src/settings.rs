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

//! # SETTINGS
//! **Based on SEMI E37-1109§10.2**
//!
//! The set of parameters an [HSMS] implementation must provide, together
//! with the connection endpoint and the local entity's role.
//!
//! [HSMS]: crate

use crate::primitive::ConnectionMode;
use std::time::Duration;

/// ## DEVICE TYPE
///
/// The role of the local entity in the host/equipment pair, which decides
/// defaults such as which side customarily initiates the connection and how
/// unhandled messages are reported.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum DeviceType {
  /// ### HOST
  ///
  /// The factory side of the link: the entity which supervises equipment.
  #[default]
  Host,

  /// ### EQUIPMENT
  ///
  /// The tool side of the link: the entity being supervised.
  Equipment,
}

/// ## SETTINGS
/// **Based on SEMI E37-1109§10.2**
///
/// The parameters the [Client] and [Handler] abide by: the TCP endpoint,
/// the connection role, the session id placed in data-message headers, and
/// the protocol timeouts.
///
/// [Client]:  crate::session::Client
/// [Handler]: crate::dispatch::Handler
#[derive(Clone, Debug, PartialEq)]
pub struct Settings {
  /// ### ENDPOINT ADDRESS
  ///
  /// The `host:port` endpoint: the address to bind and listen on when the
  /// [Connect Mode] is [PASSIVE], or the remote entity to reach when it is
  /// [ACTIVE].
  ///
  /// [Connect Mode]: Settings::connect_mode
  /// [PASSIVE]:      crate::primitive::ConnectionMode::Passive
  /// [ACTIVE]:       crate::primitive::ConnectionMode::Active
  pub address: String,

  /// ### CONNECT MODE
  ///
  /// Whether the local entity waits for an incoming connection ([PASSIVE])
  /// or initiates an outgoing one ([ACTIVE]).
  ///
  /// [PASSIVE]: crate::primitive::ConnectionMode::Passive
  /// [ACTIVE]:  crate::primitive::ConnectionMode::Active
  pub connect_mode: ConnectionMode,

  /// ### SESSION ID
  ///
  /// The numeric id placed in the headers of data messages; control
  /// messages carry 0xFFFF regardless.
  pub session_id: u16,

  /// ### DEVICE TYPE
  ///
  /// The local entity's role in the host/equipment pair.
  pub device_type: DeviceType,

  /// ### T3: REPLY TIMEOUT
  ///
  /// The maximum amount of time to wait for the reply to a data message
  /// sent with the W-bit before the transaction fails with a timeout.
  pub t3: Duration,

  /// ### T5: CONNECTION SEPARATION TIMEOUT
  ///
  /// The minimum amount of time to wait between successive attempts to
  /// initiate a connection in [ACTIVE] mode.
  ///
  /// [ACTIVE]: crate::primitive::ConnectionMode::Active
  pub t5: Duration,

  /// ### T6: CONTROL TRANSACTION TIMEOUT
  ///
  /// The maximum amount of time to wait for the response to a select,
  /// deselect, or linktest request before the connection is considered
  /// failed and dropped.
  pub t6: Duration,

  /// ### T7: NOT SELECTED TIMEOUT
  ///
  /// The maximum amount of time a connection may sit without being
  /// selected before it is dropped.
  pub t7: Duration,

  /// ### T8: NETWORK INTERCHARACTER TIMEOUT
  ///
  /// The maximum amount of time to wait between successive characters of a
  /// single message on the wire, applied as the socket read and write
  /// timeout.
  pub t8: Duration,

  /// ### LINKTEST INTERVAL
  ///
  /// The period of the connection integrity probe; [None] disables the
  /// probe entirely.
  pub linktest: Option<Duration>,
}
impl Default for Settings {
  /// ### DEFAULT SETTINGS
  /// **Based on SEMI E37-1109§10.2**
  ///
  /// Timeouts as shown in the 'typical values' column in Table 10, with a
  /// passive host on an unspecified local port, session id 0, and the
  /// linktest probe disabled.
  fn default() -> Self {
    Self {
      address: String::from("127.0.0.1:5000"),
      connect_mode: ConnectionMode::default(),
      session_id: 0,
      device_type: DeviceType::default(),
      t3: Duration::from_secs(45),
      t5: Duration::from_secs(10),
      t6: Duration::from_secs(5),
      t7: Duration::from_secs(10),
      t8: Duration::from_secs(5),
      linktest: None,
    }
  }
}
