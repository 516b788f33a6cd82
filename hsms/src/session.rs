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

//! # SESSION SERVICES
//! **Based on SEMI E37-1109§5-7**
//!
//! Defines the session layer of the [HSMS] protocol: the [Selection State]
//! and the control transactions which move it, layered over the
//! [Primitive Services].
//!
//! ---------------------------------------------------------------------------
//!
//! To use the [Session Services]:
//!
//! - Create a [Client] by providing the [New Client] function with
//!   [Settings] and a state-change hook.
//! - Manage the connection with the [Connect Procedure] and
//!   [Disconnect Procedure]; the [Connect Procedure] starts the receive
//!   loop, the linktest driver, and, for a passive entity, the T7
//!   watchdog.
//! - Manage the [Selection State] with the [Select Procedure],
//!   [Deselect Procedure], and [Separate Procedure].
//! - Test connection integrity with the [Linktest Procedure].
//! - Send [Data Message]s with the [Data Procedure]; receive them with the
//!   hook provided by the [Connect Procedure].
//!
//! Control requests received from the remote entity are answered
//! automatically, as dictated by the current state.
//!
//! [HSMS]:                 crate
//! [Primitive Services]:   crate::primitive
//! [Session Services]:     crate::session
//! [Settings]:             crate::settings::Settings
//! [Client]:               Client
//! [New Client]:           Client::new
//! [Connect Procedure]:    Client::connect
//! [Disconnect Procedure]: Client::disconnect
//! [Select Procedure]:     Client::select
//! [Deselect Procedure]:   Client::deselect
//! [Separate Procedure]:   Client::separate
//! [Linktest Procedure]:   Client::linktest
//! [Data Procedure]:       Client::send_data
//! [Data Message]:         Contents::Data
//! [Selection State]:      SelectionState

use crate::primitive::{self, ConnectionMode};
use crate::settings::Settings;
use crate::{Error, PresentationType};
use atomic::Atomic;
use bytemuck::NoUninit;
use num_enum::{IntoPrimitive, TryFromPrimitive};
use oneshot::Sender as SendOnce;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering::Relaxed};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

/// ## STATE CHANGE HOOK
///
/// Called with the new [Selection State] whenever the [Client] moves
/// between [NOT SELECTED] and [SELECTED], from whichever thread drove the
/// transition.
///
/// [Client]:          Client
/// [Selection State]: SelectionState
/// [NOT SELECTED]:    SelectionState::NotSelected
/// [SELECTED]:        SelectionState::Selected
pub type StateHook = Arc<dyn Fn(SelectionState) + Send + Sync>;

/// ## CLIENT
///
/// Encapsulates the session layer of the [HSMS] protocol: ownership of a
/// [Primitive Client], the [Selection State], the set of open control
/// transactions, and the per-session system bytes counter.
///
/// [HSMS]:             crate
/// [Primitive Client]: primitive::Client
/// [Selection State]:  SelectionState
pub struct Client {
  /// ### SETTINGS
  ///
  /// Immutable parameters provided with the [New Client] function.
  ///
  /// [New Client]: Client::new
  pub settings: Settings,

  /// ### PRIMITIVE CLIENT
  ///
  /// Handles the TCP/IP connection and the framing of messages.
  primitive_client: Arc<primitive::Client>,

  /// ### SELECTION STATE
  selection_state: Atomic<SelectionState>,

  /// ### SELECTION MUTEX
  ///
  /// Serializes the critical sections of the [Select Procedure],
  /// [Deselect Procedure], and [Separate Procedure] against each other and
  /// against the automatic responses of the receive loop.
  ///
  /// [Select Procedure]:   Client::select
  /// [Deselect Procedure]: Client::deselect
  /// [Separate Procedure]: Client::separate
  selection_mutex: Mutex<()>,

  /// ### CONTROL OUTBOX
  ///
  /// The open control transactions initiated locally, keyed by system
  /// bytes, each holding the slot its initiator is waiting on.
  outbox: Mutex<HashMap<u32, SendOnce<Contents>>>,

  /// ### SYSTEM BYTES COUNTER
  ///
  /// The per-session transaction counter; each outbound message takes the
  /// next value, wrapping from 2^32 - 1 back to 0.
  system_counter: AtomicU32,

  /// ### DISCONNECTING FLAG
  ///
  /// Set while a local shutdown is in progress, during which incoming
  /// select requests are rejected rather than answered.
  disconnecting: AtomicBool,

  /// ### STATE CHANGE HOOK
  on_state: StateHook,
}

/// ## CONNECTION PROCEDURES
/// **Based on SEMI E37-1109§6.3-6.5**
impl Client {
  /// ### NEW CLIENT
  ///
  /// Creates a [Client] in the [NOT CONNECTED], [NOT SELECTED] state,
  /// ready to initiate the [Connect Procedure].
  ///
  /// [Client]:            Client
  /// [Connect Procedure]: Client::connect
  /// [NOT CONNECTED]:     primitive::ConnectionState::NotConnected
  /// [NOT SELECTED]:      SelectionState::NotSelected
  pub fn new(settings: Settings, on_state: StateHook) -> Arc<Self> {
    Arc::new(Self {
      settings,
      primitive_client: primitive::Client::new(),
      selection_state: Atomic::new(SelectionState::NotSelected),
      selection_mutex: Mutex::new(()),
      outbox: Mutex::new(HashMap::new()),
      system_counter: AtomicU32::new(0),
      disconnecting: AtomicBool::new(false),
      on_state,
    })
  }

  /// ### CONNECT PROCEDURE
  /// **Based on SEMI E37-1109§6.3.4-6.3.7**
  ///
  /// Connects the [Client] to the Remote Entity per the [Connect Mode],
  /// and starts the long-running activities of the session:
  ///
  /// - The receive loop, which parses inbound frames, answers control
  ///   requests, completes open control transactions, and forwards
  ///   [Data Message]s to the returned channel.
  /// - For a passive entity, the [T7] watchdog, which drops a connection
  ///   that sits [NOT SELECTED] too long.
  /// - When configured, the linktest driver, which probes connection
  ///   integrity every [Linktest Interval] and drops the connection on a
  ///   missed response.
  ///
  /// The returned channel hangs up when the connection is broken.
  ///
  /// [Client]:            Client
  /// [Connect Mode]:      crate::settings::Settings::connect_mode
  /// [Data Message]:      Contents::Data
  /// [NOT SELECTED]:      SelectionState::NotSelected
  /// [T7]:                crate::settings::Settings::t7
  /// [Linktest Interval]: crate::settings::Settings::linktest
  pub fn connect(
    self: &Arc<Self>,
  ) -> Result<(SocketAddr, Receiver<(MessageId, secs_ii::Message)>), Error> {
    self.disconnecting.store(false, Relaxed);
    let (socket, rx_receiver) = self.primitive_client.connect(
      &self.settings.address,
      self.settings.connect_mode,
      self.settings.t5,
      self.settings.t8,
    )?;

    let (data_sender, data_receiver) = channel::<(MessageId, secs_ii::Message)>();
    let rx_clone: Arc<Client> = self.clone();
    thread::spawn(move || rx_clone.receive(rx_receiver, data_sender));

    // A passive entity gives the remote entity T7 to complete the select
    // procedure before the connection is considered abandoned.
    if self.settings.connect_mode == ConnectionMode::Passive {
      let t7: Duration = self.settings.t7;
      let watchdog: Arc<Client> = self.clone();
      thread::spawn(move || {
        thread::sleep(t7);
        if watchdog.primitive_client.is_connected()
          && watchdog.selection_state.load(Relaxed) == SelectionState::NotSelected
        {
          warn!("T7 expired while not selected, dropping connection");
          let _ = watchdog.disconnect();
        }
      });
    }

    if let Some(interval) = self.settings.linktest {
      let prober: Arc<Client> = self.clone();
      thread::spawn(move || {
        loop {
          thread::sleep(interval);
          if !prober.primitive_client.is_connected() {
            break;
          }
          if let Err(error) = prober.linktest() {
            warn!(%error, "linktest failed, dropping connection");
            let _ = prober.disconnect();
            break;
          }
        }
      });
    }

    Ok((socket, data_receiver))
  }

  /// ### DISCONNECT PROCEDURE
  /// **Based on SEMI E37-1109§6.4-6.5**
  ///
  /// Disconnects the [Client] from the Remote Entity: every open control
  /// transaction is failed immediately, the [Selection State] returns to
  /// [NOT SELECTED], and the TCP/IP connection is closed.
  ///
  /// [Client]:          Client
  /// [Selection State]: SelectionState
  /// [NOT SELECTED]:    SelectionState::NotSelected
  pub fn disconnect(&self) -> Result<(), Error> {
    self.outbox.lock().unwrap().clear();
    self.set_state(SelectionState::NotSelected);
    self.primitive_client.disconnect()?;
    Ok(())
  }

  /// ### BEGIN SHUTDOWN
  ///
  /// Marks a local shutdown as in progress: incoming select requests are
  /// rejected from here on, and a [Connect Procedure] blocked waiting for
  /// an incoming connection gives up.
  ///
  /// [Connect Procedure]: Client::connect
  pub fn begin_shutdown(&self) {
    self.disconnecting.store(true, Relaxed);
    self.primitive_client.halt();
  }

  /// ### CONNECTED
  pub fn is_connected(&self) -> bool {
    self.primitive_client.is_connected()
  }

  /// ### SELECTION STATE
  pub fn state(&self) -> SelectionState {
    self.selection_state.load(Relaxed)
  }

  /// ### NEXT SYSTEM BYTES
  ///
  /// Takes the next value of the per-session system bytes counter,
  /// wrapping from 2^32 - 1 back to 0.
  pub fn next_system(&self) -> u32 {
    self.system_counter.fetch_add(1, Relaxed).wrapping_add(1)
  }

  // Stores the new state and fires the hook on an actual change.
  fn set_state(&self, state: SelectionState) {
    if self.selection_state.swap(state, Relaxed) != state {
      debug!(?state, "selection state changed");
      (self.on_state)(state);
    }
  }
}

/// ## MESSAGE EXCHANGE PROCEDURES
/// **Based on SEMI E37-1109§7**
impl Client {
  /// ### CONTROL TRANSACTION
  ///
  /// Transmits a control request and waits up to [T6] for its completion.
  ///
  /// The reply slot is registered under the outbox lock before the message
  /// reaches the wire, so the receive loop can never observe a response to
  /// an unregistered transaction. Expiry of [T6] is a communications
  /// failure which drops the connection.
  ///
  /// [T6]: crate::settings::Settings::t6
  fn control_transaction(&self, contents: Contents) -> Result<Contents, Error> {
    let system: u32 = self.next_system();
    let receiver: oneshot::Receiver<Contents> = {
      let mut outbox = self.outbox.lock().unwrap();
      if outbox.contains_key(&system) {
        return Err(Error::TransactionConflict);
      }
      let (sender, receiver) = oneshot::channel::<Contents>();
      let message: Message =
        Message { id: MessageId { session: 0xFFFF, system }, contents };
      if let Err(error) = self.transmit(message) {
        return Err(error);
      }
      outbox.insert(system, sender);
      receiver
    };

    match receiver.recv_timeout(self.settings.t6) {
      Ok(contents) => Ok(contents),
      Err(oneshot::RecvTimeoutError::Timeout) => {
        self.outbox.lock().unwrap().remove(&system);
        warn!(system, "T6 expired on a control transaction, dropping connection");
        let _ = self.disconnect();
        Err(Error::Timeout)
      }
      Err(oneshot::RecvTimeoutError::Disconnected) => Err(Error::Disconnected),
    }
  }

  // Serializes and transmits one session message.
  fn transmit(&self, message: Message) -> Result<(), Error> {
    let primitive_message: primitive::Message = primitive::Message::try_from(message)?;
    self.primitive_client.transmit(primitive_message).map_err(Error::SendFailed)
  }

  /// ### SELECT PROCEDURE
  /// **Based on SEMI E37-1109§7.3-7.4**
  ///
  /// Transmits a Select.req and waits up to [T6] for the Select.rsp,
  /// entering the [SELECTED] state on a status of 0.
  ///
  /// A non-zero status fails with [Control Refused]; a Reject.req in
  /// response fails with [Protocol Violation].
  ///
  /// [T6]:                 crate::settings::Settings::t6
  /// [SELECTED]:           SelectionState::Selected
  /// [Control Refused]:    crate::Error::ControlRefused
  /// [Protocol Violation]: crate::Error::ProtocolViolation
  pub fn select(&self) -> Result<(), Error> {
    if !self.primitive_client.is_connected() {
      return Err(Error::NotConnected);
    }
    match self.control_transaction(Contents::SelectRequest)? {
      Contents::SelectResponse(0) => {
        let _guard: MutexGuard<'_, ()> = self.selection_mutex.lock().unwrap();
        self.set_state(SelectionState::Selected);
        Ok(())
      }
      Contents::SelectResponse(status) => Err(Error::ControlRefused(status)),
      Contents::RejectRequest(_, reason) => Err(Error::ProtocolViolation(
        RejectReason::try_from(reason).unwrap_or(RejectReason::MalformedData),
      )),
      _ => Err(Error::ProtocolViolation(RejectReason::MalformedData)),
    }
  }

  /// ### DESELECT PROCEDURE
  /// **Based on SEMI E37-1109§7.7-7.8**
  ///
  /// Transmits a Deselect.req and waits up to [T6] for the Deselect.rsp,
  /// returning to the [NOT SELECTED] state on a status of 0.
  ///
  /// [T6]:           crate::settings::Settings::t6
  /// [NOT SELECTED]: SelectionState::NotSelected
  pub fn deselect(&self) -> Result<(), Error> {
    if !self.primitive_client.is_connected() {
      return Err(Error::NotConnected);
    }
    match self.control_transaction(Contents::DeselectRequest)? {
      Contents::DeselectResponse(0) => {
        let _guard: MutexGuard<'_, ()> = self.selection_mutex.lock().unwrap();
        self.set_state(SelectionState::NotSelected);
        Ok(())
      }
      Contents::DeselectResponse(status) => Err(Error::ControlRefused(status)),
      Contents::RejectRequest(_, reason) => Err(Error::ProtocolViolation(
        RejectReason::try_from(reason).unwrap_or(RejectReason::MalformedData),
      )),
      _ => Err(Error::ProtocolViolation(RejectReason::MalformedData)),
    }
  }

  /// ### SEPARATE PROCEDURE
  /// **Based on SEMI E37-1109§7.9**
  ///
  /// Transmits a Separate.req, which by design has no response, and
  /// immediately considers the selection ended.
  pub fn separate(&self) -> Result<(), Error> {
    if !self.primitive_client.is_connected() {
      return Err(Error::NotConnected);
    }
    let _guard: MutexGuard<'_, ()> = self.selection_mutex.lock().unwrap();
    self.transmit(Message {
      id: MessageId { session: 0xFFFF, system: self.next_system() },
      contents: Contents::SeparateRequest,
    })?;
    self.set_state(SelectionState::NotSelected);
    Ok(())
  }

  /// ### LINKTEST PROCEDURE
  /// **Based on SEMI E37-1109§7.10**
  ///
  /// Transmits a Linktest.req and waits up to [T6] for the Linktest.rsp.
  ///
  /// [T6]: crate::settings::Settings::t6
  pub fn linktest(&self) -> Result<(), Error> {
    if !self.primitive_client.is_connected() {
      return Err(Error::NotConnected);
    }
    match self.control_transaction(Contents::LinktestRequest)? {
      Contents::LinktestResponse => Ok(()),
      Contents::RejectRequest(_, reason) => Err(Error::ProtocolViolation(
        RejectReason::try_from(reason).unwrap_or(RejectReason::MalformedData),
      )),
      _ => Err(Error::ProtocolViolation(RejectReason::MalformedData)),
    }
  }

  /// ### DATA PROCEDURE
  /// **Based on SEMI E37-1109§7.5-7.6**
  ///
  /// Transmits a [Data Message] under the provided system bytes, without
  /// waiting: reply correlation belongs to the data services layered on
  /// top.
  ///
  /// The [Selection State] must be [SELECTED] to use this procedure.
  ///
  /// [Data Message]:    Contents::Data
  /// [Selection State]: SelectionState
  /// [SELECTED]:        SelectionState::Selected
  pub fn send_data(&self, message: secs_ii::Message, system: u32) -> Result<(), Error> {
    if self.selection_state.load(Relaxed) != SelectionState::Selected {
      return Err(Error::NotSelected);
    }
    self.transmit(Message {
      id: MessageId { session: self.settings.session_id, system },
      contents: Contents::Data(message),
    })
  }

  /// ### REJECT PROCEDURE
  /// **Based on SEMI E37-1109§7.11**
  ///
  /// Transmits a Reject.req answering the provided transaction, carrying
  /// the offending type byte and the reason.
  fn reject(&self, id: MessageId, type_byte: u8, reason: RejectReason) -> Result<(), Error> {
    self.transmit(Message { id, contents: Contents::RejectRequest(type_byte, reason as u8) })
  }

  // Completes an open control transaction, or answers with Reject.req when
  // no transaction with these system bytes is open.
  fn complete_transaction(&self, id: MessageId, contents: Contents) -> Result<(), Error> {
    match self.outbox.lock().unwrap().remove(&id.system) {
      Some(sender) => {
        // The initiator may have timed out and gone; nothing to do then.
        let _ = sender.send(contents);
        Ok(())
      }
      None => {
        let type_byte: u8 = contents.session_type() as u8;
        self.reject(id, type_byte, RejectReason::TransactionNotOpen)
      }
    }
  }

  /// ### RECEIVE LOOP
  ///
  /// Dispatches every inbound frame per the current state:
  ///
  /// - [Data Message]s are forwarded to the data channel when [SELECTED],
  ///   and answered with Reject.req otherwise.
  /// - Select.req is answered with Select.rsp and enters [SELECTED],
  ///   unless a local shutdown is in progress, in which case it is
  ///   rejected.
  /// - Deselect.req is answered with Deselect.rsp and returns to
  ///   [NOT SELECTED] when currently [SELECTED].
  /// - Linktest.req is answered with Linktest.rsp unconditionally.
  /// - Separate.req ends the selection and closes the connection without a
  ///   response.
  /// - Responses complete their open transaction, or are rejected as
  ///   transaction-not-open.
  /// - Frames which parse as no known message are answered with
  ///   Reject.req.
  ///
  /// [Data Message]: Contents::Data
  /// [SELECTED]:     SelectionState::Selected
  /// [NOT SELECTED]: SelectionState::NotSelected
  fn receive(
    self: Arc<Self>,
    rx_receiver: Receiver<primitive::Message>,
    data_sender: Sender<(MessageId, secs_ii::Message)>,
  ) {
    for primitive_message in rx_receiver {
      let primitive_header: primitive::MessageHeader = primitive_message.header;
      match Message::try_from(primitive_message) {
        // The frame is structurally valid per the primitive services but
        // not a message this layer recognizes.
        Err(reject_reason) => {
          warn!(?reject_reason, "rejecting unrecognized frame");
          let type_byte: u8 = match reject_reason {
            RejectReason::PTypeNotSupported => primitive_header.presentation_type,
            _ => primitive_header.session_type,
          };
          let id = MessageId {
            session: primitive_header.session_id,
            system: primitive_header.system,
          };
          if self.reject(id, type_byte, reject_reason).is_err() {
            break;
          }
        }

        Ok(rx_message) => match rx_message.contents {
          Contents::Data(data) => match self.selection_state.load(Relaxed) {
            SelectionState::NotSelected => {
              if self
                .reject(rx_message.id, 0, RejectReason::EntityNotSelected)
                .is_err()
              {
                break;
              }
            }
            SelectionState::Selected => {
              // Both primary messages and replies travel to the data
              // services; the pending-reply table lives there.
              if data_sender.send((rx_message.id, data)).is_err() {
                break;
              }
            }
          },

          Contents::SelectRequest => {
            if self.disconnecting.load(Relaxed) {
              if self
                .reject(
                  rx_message.id,
                  SessionType::SelectRequest as u8,
                  RejectReason::EntityNotSelected,
                )
                .is_err()
              {
                break;
              }
            } else {
              let _guard: MutexGuard<'_, ()> = self.selection_mutex.lock().unwrap();
              let status: SelectStatus =
                match self.selection_state.load(Relaxed) {
                  SelectionState::NotSelected => SelectStatus::Ok,
                  SelectionState::Selected => SelectStatus::AlreadyActive,
                };
              if status == SelectStatus::Ok {
                self.set_state(SelectionState::Selected);
              }
              if self
                .transmit(Message {
                  id: rx_message.id,
                  contents: Contents::SelectResponse(status as u8),
                })
                .is_err()
              {
                break;
              }
            }
          }

          Contents::DeselectRequest => {
            let _guard: MutexGuard<'_, ()> = self.selection_mutex.lock().unwrap();
            let status: DeselectStatus = match self.selection_state.load(Relaxed) {
              SelectionState::Selected => DeselectStatus::Ok,
              SelectionState::NotSelected => DeselectStatus::NotEstablished,
            };
            if status == DeselectStatus::Ok {
              self.set_state(SelectionState::NotSelected);
            }
            if self
              .transmit(Message {
                id: rx_message.id,
                contents: Contents::DeselectResponse(status as u8),
              })
              .is_err()
            {
              break;
            }
          }

          Contents::LinktestRequest => {
            if self
              .transmit(Message { id: rx_message.id, contents: Contents::LinktestResponse })
              .is_err()
            {
              break;
            }
          }

          Contents::SeparateRequest => {
            debug!("separate request received, closing");
            let _guard: MutexGuard<'_, ()> = self.selection_mutex.lock().unwrap();
            self.set_state(SelectionState::NotSelected);
            drop(_guard);
            let _ = self.disconnect();
            break;
          }

          contents @ (Contents::SelectResponse(_)
          | Contents::DeselectResponse(_)
          | Contents::LinktestResponse) => {
            if self.complete_transaction(rx_message.id, contents).is_err() {
              break;
            }
          }

          Contents::RejectRequest(type_byte, reason) => {
            // A reject answering one of our open transactions completes
            // it; an unsolicited reject is only noted, since rejecting a
            // reject would ping-pong.
            match self.outbox.lock().unwrap().remove(&rx_message.id.system) {
              Some(sender) => {
                let _ = sender.send(Contents::RejectRequest(type_byte, reason));
              }
              None => {
                warn!(type_byte, reason, "unsolicited reject request received");
              }
            }
          }
        },
      }
    }

    // The connection is gone: every open transaction fails immediately
    // rather than being left to time out, and the state resets.
    self.outbox.lock().unwrap().clear();
    self.set_state(SelectionState::NotSelected);
    let _ = self.primitive_client.disconnect();
  }
}

/// ## SELECTION STATE
/// **Based on SEMI E37-1109§5.5.2**
///
/// The state governing whether [Data Message]s may be exchanged. Together
/// with the [Connection State] of the [Primitive Services] this forms the
/// session lifecycle: not connected, connected but [NOT SELECTED], and
/// [SELECTED].
///
/// [Data Message]:       Contents::Data
/// [Connection State]:   primitive::ConnectionState
/// [Primitive Services]: crate::primitive
/// [NOT SELECTED]:       SelectionState::NotSelected
/// [SELECTED]:           SelectionState::Selected
#[repr(u8)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, NoUninit)]
pub enum SelectionState {
  /// ### NOT SELECTED
  ///
  /// The entity is ready to complete the Select Procedure but has either
  /// not yet done so, or has ended a previous selection.
  #[default]
  NotSelected = 0,

  /// ### SELECTED
  ///
  /// The entity has completed the Select Procedure and may exchange
  /// [Data Message]s.
  ///
  /// [Data Message]: Contents::Data
  Selected = 1,
}

/// ## MESSAGE ID
/// **Based on SEMI E37-1109§8.2**
///
/// The uniquely identifying components of a [Message] in forming a valid
/// transaction: the session id and the system bytes.
///
/// [Message]: Message
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageId {
  /// ### SESSION ID
  ///
  /// Provides an association between [Message]s across multiple
  /// transactions; 0xFFFF for control messages.
  ///
  /// [Message]: Message
  pub session: u16,

  /// ### SYSTEM BYTES
  ///
  /// Identifies a transaction uniquely among the set of open transactions.
  pub system: u32,
}

/// ## MESSAGE
/// **Based on SEMI E37-1109§8.2-8.3**
///
/// Data using the structure defined by the session layer, enforcing
/// compliance as determined by a [Presentation Type] of 0, broken down into
/// its [Message ID] and [Contents].
///
/// [Presentation Type]: crate::PresentationType
/// [Message ID]:        MessageId
/// [Contents]:          Contents
#[derive(Clone, Debug, PartialEq)]
pub struct Message {
  /// ### MESSAGE ID
  pub id: MessageId,

  /// ### MESSAGE CONTENTS
  pub contents: Contents,
}

/// ## MESSAGE CONTENTS
/// **Based on SEMI E37-1109§8.3.1-8.3.21**
///
/// The contents of a [Message], broken down by its [Session Type].
///
/// [Message]:      Message
/// [Session Type]: SessionType
#[derive(Clone, Debug, PartialEq)]
pub enum Contents {
  /// ### DATA MESSAGE
  /// **Based on SEMI E37-1109§8.3.1-8.3.3**
  ///
  /// A [Message] with a [Session Type] of 0, carrying SECS-II formatted
  /// data.
  ///
  /// [Message]:      Message
  /// [Session Type]: SessionType
  Data(secs_ii::Message),

  /// ### SELECT REQUEST
  /// **Based on SEMI E37-1109§8.3.4**
  ///
  /// A [Message] with a [Session Type] of 1, initiating the Select
  /// Procedure.
  ///
  /// [Message]:      Message
  /// [Session Type]: SessionType
  SelectRequest,

  /// ### SELECT RESPONSE
  /// **Based on SEMI E37-1109§8.3.5-8.3.7**
  ///
  /// A [Message] with a [Session Type] of 2, carrying a [Select Status].
  ///
  /// [Message]:       Message
  /// [Session Type]:  SessionType
  /// [Select Status]: SelectStatus
  SelectResponse(u8),

  /// ### DESELECT REQUEST
  /// **Based on SEMI E37-1109§8.3.8-8.3.10**
  ///
  /// A [Message] with a [Session Type] of 3, initiating the Deselect
  /// Procedure.
  ///
  /// [Message]:      Message
  /// [Session Type]: SessionType
  DeselectRequest,

  /// ### DESELECT RESPONSE
  /// **Based on SEMI E37-1109§8.3.11-8.3.13**
  ///
  /// A [Message] with a [Session Type] of 4, carrying a [Deselect Status].
  ///
  /// [Message]:         Message
  /// [Session Type]:    SessionType
  /// [Deselect Status]: DeselectStatus
  DeselectResponse(u8),

  /// ### LINKTEST REQUEST
  /// **Based on SEMI E37-1109§8.3.14-8.3.16**
  ///
  /// A [Message] with a [Session Type] of 5, probing connection integrity.
  ///
  /// [Message]:      Message
  /// [Session Type]: SessionType
  LinktestRequest,

  /// ### LINKTEST RESPONSE
  /// **Based on SEMI E37-1109§8.3.17-8.3.19**
  ///
  /// A [Message] with a [Session Type] of 6, answering a Linktest.req.
  ///
  /// [Message]:      Message
  /// [Session Type]: SessionType
  LinktestResponse,

  /// ### REJECT REQUEST
  /// **Based on SEMI E37-1109§8.3.20-8.3.21**
  ///
  /// A [Message] with a [Session Type] of 7, carrying the offending
  /// session or presentation type and the [Reject Reason].
  ///
  /// [Message]:       Message
  /// [Session Type]:  SessionType
  /// [Reject Reason]: RejectReason
  RejectRequest(u8, u8),

  /// ### SEPARATE REQUEST
  /// **Based on SEMI E37-1109§8.3.22**
  ///
  /// A [Message] with a [Session Type] of 9, ending the selection without
  /// a response.
  ///
  /// [Message]:      Message
  /// [Session Type]: SessionType
  SeparateRequest,
}
impl Contents {
  /// ### SESSION TYPE
  ///
  /// The [Session Type] these contents are carried under.
  ///
  /// [Session Type]: SessionType
  pub fn session_type(&self) -> SessionType {
    match self {
      Contents::Data(_) => SessionType::DataMessage,
      Contents::SelectRequest => SessionType::SelectRequest,
      Contents::SelectResponse(_) => SessionType::SelectResponse,
      Contents::DeselectRequest => SessionType::DeselectRequest,
      Contents::DeselectResponse(_) => SessionType::DeselectResponse,
      Contents::LinktestRequest => SessionType::LinktestRequest,
      Contents::LinktestResponse => SessionType::LinktestResponse,
      Contents::RejectRequest(_, _) => SessionType::RejectRequest,
      Contents::SeparateRequest => SessionType::SeparateRequest,
    }
  }
}
impl TryFrom<Message> for primitive::Message {
  type Error = Error;

  /// ### PRIMITIVE MESSAGE FROM SESSION MESSAGE
  ///
  /// Fails only when the text of a data message cannot be encoded.
  fn try_from(message: Message) -> Result<Self, Self::Error> {
    let session_type: u8 = message.contents.session_type() as u8;
    Ok(match message.contents {
      Contents::Data(data_message) => primitive::Message {
        header: primitive::MessageHeader {
          session_id: message.id.session,
          byte_2: ((data_message.w as u8) << 7) | data_message.stream,
          byte_3: data_message.function,
          presentation_type: PresentationType::SecsII as u8,
          session_type,
          system: message.id.system,
        },
        text: match data_message.text {
          Some(item) => Vec::<u8>::try_from(item)?,
          None => vec![],
        },
      },
      Contents::SelectResponse(status) | Contents::DeselectResponse(status) => {
        primitive::Message {
          header: primitive::MessageHeader {
            session_id: 0xFFFF,
            byte_2: 0,
            byte_3: status,
            presentation_type: PresentationType::SecsII as u8,
            session_type,
            system: message.id.system,
          },
          text: vec![],
        }
      }
      Contents::RejectRequest(type_byte, reason) => primitive::Message {
        header: primitive::MessageHeader {
          session_id: 0xFFFF,
          byte_2: type_byte,
          byte_3: reason,
          presentation_type: PresentationType::SecsII as u8,
          session_type,
          system: message.id.system,
        },
        text: vec![],
      },
      Contents::SelectRequest
      | Contents::DeselectRequest
      | Contents::LinktestRequest
      | Contents::LinktestResponse
      | Contents::SeparateRequest => primitive::Message {
        header: primitive::MessageHeader {
          session_id: 0xFFFF,
          byte_2: 0,
          byte_3: 0,
          presentation_type: PresentationType::SecsII as u8,
          session_type,
          system: message.id.system,
        },
        text: vec![],
      },
    })
  }
}
impl TryFrom<primitive::Message> for Message {
  type Error = RejectReason;

  /// ### SESSION MESSAGE FROM PRIMITIVE MESSAGE
  ///
  /// Valid session messages are a subset of valid primitive messages, so
  /// this operation fails, with the [Reject Reason] to answer with, when
  /// the primitive message is not one.
  ///
  /// [Reject Reason]: RejectReason
  fn try_from(message: primitive::Message) -> Result<Self, Self::Error> {
    if message.header.presentation_type != 0 {
      return Err(RejectReason::PTypeNotSupported);
    }
    let id = MessageId { session: message.header.session_id, system: message.header.system };
    let contents: Contents = match SessionType::try_from(message.header.session_type)
      .map_err(|_| RejectReason::STypeNotSupported)?
    {
      SessionType::DataMessage => Contents::Data(secs_ii::Message {
        stream: message.header.byte_2 & 0b0111_1111,
        function: message.header.byte_3,
        w: message.header.byte_2 & 0b1000_0000 > 0,
        text: match secs_ii::Item::try_from(message.text) {
          Ok(item) => Some(item),
          // A header-only data message is valid; garbled text is not.
          Err(secs_ii::Error::EmptyText) => None,
          Err(_) => return Err(RejectReason::MalformedData),
        },
      }),
      SessionType::SelectRequest => {
        if message.header.byte_2 != 0 || message.header.byte_3 != 0 || !message.text.is_empty() {
          return Err(RejectReason::MalformedData);
        }
        Contents::SelectRequest
      }
      SessionType::SelectResponse => {
        if message.header.byte_2 != 0 || !message.text.is_empty() {
          return Err(RejectReason::MalformedData);
        }
        Contents::SelectResponse(message.header.byte_3)
      }
      SessionType::DeselectRequest => {
        if message.header.byte_2 != 0 || message.header.byte_3 != 0 || !message.text.is_empty() {
          return Err(RejectReason::MalformedData);
        }
        Contents::DeselectRequest
      }
      SessionType::DeselectResponse => {
        if message.header.byte_2 != 0 || !message.text.is_empty() {
          return Err(RejectReason::MalformedData);
        }
        Contents::DeselectResponse(message.header.byte_3)
      }
      SessionType::LinktestRequest => {
        if message.header.session_id != 0xFFFF
          || message.header.byte_2 != 0
          || message.header.byte_3 != 0
          || !message.text.is_empty()
        {
          return Err(RejectReason::MalformedData);
        }
        Contents::LinktestRequest
      }
      SessionType::LinktestResponse => {
        if message.header.session_id != 0xFFFF
          || message.header.byte_2 != 0
          || message.header.byte_3 != 0
          || !message.text.is_empty()
        {
          return Err(RejectReason::MalformedData);
        }
        Contents::LinktestResponse
      }
      SessionType::RejectRequest => {
        if !message.text.is_empty() {
          return Err(RejectReason::MalformedData);
        }
        Contents::RejectRequest(message.header.byte_2, message.header.byte_3)
      }
      SessionType::SeparateRequest => {
        if message.header.byte_2 != 0 || message.header.byte_3 != 0 || !message.text.is_empty() {
          return Err(RejectReason::MalformedData);
        }
        Contents::SeparateRequest
      }
    };
    Ok(Message { id, contents })
  }
}

/// ## SESSION TYPE
/// **Based on SEMI E37-1109§8.2.6.5-8.2.6.6**
///
/// Defines the type of [Message] being sent.
///
/// Values 11-127 are reserved for Subsidiary Standards; values 8, 10, and
/// 128-255 are reserved and may not be used.
///
/// [Message]: Message
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
pub enum SessionType {
  /// ### DATA MESSAGE
  DataMessage = 0,

  /// ### SELECT REQUEST
  SelectRequest = 1,

  /// ### SELECT RESPONSE
  SelectResponse = 2,

  /// ### DESELECT REQUEST
  DeselectRequest = 3,

  /// ### DESELECT RESPONSE
  DeselectResponse = 4,

  /// ### LINKTEST REQUEST
  LinktestRequest = 5,

  /// ### LINKTEST RESPONSE
  LinktestResponse = 6,

  /// ### REJECT REQUEST
  RejectRequest = 7,

  /// ### SEPARATE REQUEST
  SeparateRequest = 9,
}

/// ## SELECT STATUS
/// **Based on SEMI E37-1109§8.3.7.2**
///
/// Byte 3 of a Select.rsp message, indicating success or the reason for
/// failure of the Select Procedure.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SelectStatus {
  /// ### COMMUNICATION ESTABLISHED
  Ok = 0,

  /// ### COMMUNICATION ALREADY ACTIVE
  ///
  /// A previous select has already established communications to the
  /// entity being selected.
  AlreadyActive = 1,

  /// ### CONNECTION NOT READY
  NotReady = 2,

  /// ### CONNECTION EXHAUSTED
  Exhausted = 3,
}

/// ## DESELECT STATUS
/// **Based on SEMI E37-1109§8.3.13.2**
///
/// Byte 3 of a Deselect.rsp message, indicating success or the reason for
/// failure of the Deselect Procedure.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum DeselectStatus {
  /// ### COMMUNICATION ENDED
  Ok = 0,

  /// ### COMMUNICATION NOT ESTABLISHED
  ///
  /// Communication has not been established with a prior select, or has
  /// already been ended with a previous deselect.
  NotEstablished = 1,

  /// ### COMMUNICATION BUSY
  Busy = 2,
}

/// ## REJECT REASON
/// **Based on SEMI E37-1109§8.3.21.3**
///
/// Byte 3 of a Reject.req message, specifying the reason a message has
/// been rejected.
///
/// Values 4-127 are reserved for Subsidiary Standards; values 0 and
/// 128-255 are reserved for the Local Entity.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
pub enum RejectReason {
  /// ### MALFORMED DATA
  /// **Local Entity Specific Reason**
  ///
  /// A message was received which was structurally valid but whose fields
  /// violate the session layer's requirements.
  MalformedData = 0,

  /// ### SESSION TYPE NOT SUPPORTED
  STypeNotSupported = 1,

  /// ### PRESENTATION TYPE NOT SUPPORTED
  PTypeNotSupported = 2,

  /// ### TRANSACTION NOT OPEN
  ///
  /// A response was received when no open transaction corresponded to it.
  TransactionNotOpen = 3,

  /// ### ENTITY NOT SELECTED
  ///
  /// A data message was received while not in the selected state.
  EntityNotSelected = 4,
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::io::{Read, Write};
  use std::net::TcpStream;

  fn test_settings(port: u16) -> Settings {
    Settings {
      address: format!("127.0.0.1:{port}"),
      connect_mode: ConnectionMode::Passive,
      t6: Duration::from_millis(500),
      t7: Duration::from_secs(5),
      t8: Duration::from_secs(2),
      ..Settings::default()
    }
  }

  fn free_port() -> u16 {
    std::net::TcpListener::bind("127.0.0.1:0")
      .unwrap()
      .local_addr()
      .unwrap()
      .port()
  }

  // Retries until the passive client has bound its listener.
  fn connect_peer(port: u16) -> TcpStream {
    for _ in 0..100 {
      if let Ok(stream) = TcpStream::connect(("127.0.0.1", port)) {
        stream.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
        return stream;
      }
      thread::sleep(Duration::from_millis(20));
    }
    panic!("passive client never bound its listener");
  }

  fn control_frame(session_type: u8, byte_2: u8, byte_3: u8, system: u32) -> Vec<u8> {
    primitive::Block {
      header: primitive::MessageHeader {
        session_id: 0xFFFF,
        byte_2,
        byte_3,
        presentation_type: 0,
        session_type,
        system,
      },
      text: vec![],
    }
    .encode()
  }

  fn read_frame(stream: &mut TcpStream) -> (primitive::MessageHeader, Vec<u8>) {
    let mut length_bytes: [u8; 4] = [0; 4];
    stream.read_exact(&mut length_bytes).unwrap();
    let length: usize = u32::from_be_bytes(length_bytes) as usize;
    let mut header_bytes: [u8; 10] = [0; 10];
    stream.read_exact(&mut header_bytes).unwrap();
    let mut text: Vec<u8> = vec![0; length - 10];
    if !text.is_empty() {
      stream.read_exact(&mut text).unwrap();
    }
    (primitive::MessageHeader::from(header_bytes), text)
  }

  #[test]
  fn system_counter_wraps() {
    let client = Client::new(Settings::default(), Arc::new(|_| {}));
    client.system_counter.store(u32::MAX, Relaxed);
    assert_eq!(client.next_system(), 0);
    assert_eq!(client.next_system(), 1);
  }

  #[test]
  fn select_request_header_wire_format() {
    let message = Message {
      id: MessageId { session: 0xFFFF, system: 123 },
      contents: Contents::SelectRequest,
    };
    let primitive_message = primitive::Message::try_from(message).unwrap();
    let bytes: [u8; 10] = primitive_message.header.into();
    assert_eq!(bytes, [0xFF, 0xFF, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x7B]);
  }

  #[test]
  fn linktest_request_header_wire_format() {
    let message = Message {
      id: MessageId { session: 0xFFFF, system: 123 },
      contents: Contents::LinktestRequest,
    };
    let primitive_message = primitive::Message::try_from(message).unwrap();
    let bytes: [u8; 10] = primitive_message.header.into();
    assert_eq!(bytes, [0xFF, 0xFF, 0x00, 0x00, 0x00, 0x05, 0x00, 0x00, 0x00, 0x7B]);
  }

  #[test]
  fn reject_request_header_wire_format() {
    let message = Message {
      id: MessageId { session: 0xFFFF, system: 123 },
      contents: Contents::RejectRequest(SessionType::SelectRequest as u8, 1),
    };
    let primitive_message = primitive::Message::try_from(message).unwrap();
    let bytes: [u8; 10] = primitive_message.header.into();
    assert_eq!(bytes, [0xFF, 0xFF, 0x01, 0x01, 0x00, 0x07, 0x00, 0x00, 0x00, 0x7B]);
  }

  #[test]
  fn data_message_round_trips_through_primitive() {
    let message = Message {
      id: MessageId { session: 7, system: 99 },
      contents: Contents::Data(secs_ii::Message {
        stream: 1,
        function: 13,
        w: true,
        text: Some(secs_ii::Item::List(vec![])),
      }),
    };
    let primitive_message = primitive::Message::try_from(message.clone()).unwrap();
    assert_eq!(primitive_message.header.byte_2, 0b1000_0001);
    assert_eq!(Message::try_from(primitive_message).unwrap(), message);
  }

  #[test]
  fn malformed_control_frame_is_refused() {
    let bad = primitive::Message {
      header: primitive::MessageHeader {
        session_id: 0xFFFF,
        byte_2: 5,
        byte_3: 0,
        presentation_type: 0,
        session_type: 1,
        system: 1,
      },
      text: vec![],
    };
    assert_eq!(Message::try_from(bad), Err(RejectReason::MalformedData));

    let unknown_s_type = primitive::Message {
      header: primitive::MessageHeader {
        session_id: 0xFFFF,
        byte_2: 0,
        byte_3: 0,
        presentation_type: 0,
        session_type: 8,
        system: 1,
      },
      text: vec![],
    };
    assert_eq!(Message::try_from(unknown_s_type), Err(RejectReason::STypeNotSupported));
  }

  #[test]
  fn passive_answers_select_and_enters_selected() {
    let port = free_port();
    let client = Client::new(test_settings(port), Arc::new(|_| {}));
    let connecting = client.clone();
    let accept = thread::spawn(move || connecting.connect());
    let mut peer = connect_peer(port);

    peer.write_all(&control_frame(1, 0, 0, 123)).unwrap();
    let (header, _) = read_frame(&mut peer);
    assert_eq!(header.session_type, 2);
    assert_eq!(header.byte_3, SelectStatus::Ok as u8);
    assert_eq!(header.system, 123);
    assert_eq!(client.state(), SelectionState::Selected);

    // A linktest request is answered in the selected state.
    peer.write_all(&control_frame(5, 0, 0, 124)).unwrap();
    let (header, _) = read_frame(&mut peer);
    assert_eq!(header.session_type, 6);
    assert_eq!(header.system, 124);

    drop(peer);
    accept.join().unwrap().unwrap();
  }

  #[test]
  fn select_while_disconnecting_is_rejected() {
    let port = free_port();
    let client = Client::new(test_settings(port), Arc::new(|_| {}));
    let connecting = client.clone();
    let accept = thread::spawn(move || connecting.connect());
    let mut peer = connect_peer(port);
    // Wait for the accept to finish before flagging the shutdown, so the
    // connect procedure itself is not interrupted.
    accept.join().unwrap().unwrap();
    client.disconnecting.store(true, Relaxed);

    peer.write_all(&control_frame(1, 0, 0, 123)).unwrap();
    let (header, _) = read_frame(&mut peer);
    assert_eq!(header.session_type, 7);
    assert_eq!(header.byte_2, SessionType::SelectRequest as u8);
    assert_eq!(header.system, 123);
    assert_eq!(client.state(), SelectionState::NotSelected);
  }

  #[test]
  fn linktest_timer_probes_the_wire() {
    let port = free_port();
    let mut settings = test_settings(port);
    settings.linktest = Some(Duration::from_millis(100));
    let client = Client::new(settings, Arc::new(|_| {}));
    let connecting = client.clone();
    let accept = thread::spawn(move || connecting.connect());
    let mut peer = connect_peer(port);
    accept.join().unwrap().unwrap();

    let (header, _) = read_frame(&mut peer);
    assert_eq!(header.session_type, 5);
    assert_eq!(header.session_id, 0xFFFF);

    // Answering keeps the link alive and another probe follows.
    peer
      .write_all(&control_frame(6, 0, 0, header.system))
      .unwrap();
    let (header, _) = read_frame(&mut peer);
    assert_eq!(header.session_type, 5);
  }

  #[test]
  fn deselect_returns_to_not_selected() {
    let port = free_port();
    let client = Client::new(test_settings(port), Arc::new(|_| {}));
    let connecting = client.clone();
    let accept = thread::spawn(move || connecting.connect());
    let mut peer = connect_peer(port);
    accept.join().unwrap().unwrap();

    peer.write_all(&control_frame(1, 0, 0, 1)).unwrap();
    let (header, _) = read_frame(&mut peer);
    assert_eq!(header.session_type, 2);
    assert_eq!(client.state(), SelectionState::Selected);

    peer.write_all(&control_frame(3, 0, 0, 2)).unwrap();
    let (header, _) = read_frame(&mut peer);
    assert_eq!(header.session_type, 4);
    assert_eq!(header.byte_3, DeselectStatus::Ok as u8);
    assert_eq!(client.state(), SelectionState::NotSelected);
  }

  #[test]
  fn separate_closes_the_connection() {
    let port = free_port();
    let client = Client::new(test_settings(port), Arc::new(|_| {}));
    let connecting = client.clone();
    let accept = thread::spawn(move || connecting.connect());
    let mut peer = connect_peer(port);
    accept.join().unwrap().unwrap();

    peer.write_all(&control_frame(1, 0, 0, 1)).unwrap();
    let _ = read_frame(&mut peer);
    peer.write_all(&control_frame(9, 0, 0, 2)).unwrap();

    // The connection closes without a response.
    let mut probe: [u8; 1] = [0];
    loop {
      match peer.read(&mut probe) {
        Ok(0) => break,
        Ok(_) => panic!("unexpected response to a separate request"),
        Err(error) if error.kind() == std::io::ErrorKind::WouldBlock => continue,
        Err(_) => break,
      }
    }
    assert_eq!(client.state(), SelectionState::NotSelected);
  }

  #[test]
  fn data_before_select_is_rejected() {
    let port = free_port();
    let client = Client::new(test_settings(port), Arc::new(|_| {}));
    let connecting = client.clone();
    let accept = thread::spawn(move || connecting.connect());
    let mut peer = connect_peer(port);
    accept.join().unwrap().unwrap();

    let data_frame = primitive::Block {
      header: primitive::MessageHeader {
        session_id: 0,
        byte_2: 0b1000_0001,
        byte_3: 1,
        presentation_type: 0,
        session_type: 0,
        system: 55,
      },
      text: vec![],
    }
    .encode();
    peer.write_all(&data_frame).unwrap();
    let (header, _) = read_frame(&mut peer);
    assert_eq!(header.session_type, 7);
    assert_eq!(header.byte_3, RejectReason::EntityNotSelected as u8);
    assert_eq!(header.system, 55);
  }

  #[test]
  fn t7_expiry_drops_an_unselected_connection() {
    let port = free_port();
    let mut settings = test_settings(port);
    settings.t7 = Duration::from_millis(150);
    let client = Client::new(settings, Arc::new(|_| {}));
    let connecting = client.clone();
    let accept = thread::spawn(move || connecting.connect());
    let mut peer = connect_peer(port);
    accept.join().unwrap().unwrap();

    // Without a select, the watchdog closes the connection.
    let mut probe: [u8; 1] = [0];
    loop {
      match peer.read(&mut probe) {
        Ok(0) => break,
        Ok(_) => panic!("unexpected data while waiting for T7"),
        Err(error) if error.kind() == std::io::ErrorKind::WouldBlock => continue,
        Err(_) => break,
      }
    }
    assert!(!client.is_connected());
  }
}
