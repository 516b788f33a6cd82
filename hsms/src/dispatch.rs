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

//! # DATA SERVICES
//!
//! Bridges the [Session Services] to the stream/function level: outbound
//! requests are correlated to their replies by system bytes, and inbound
//! messages are dispatched to handlers registered by `(stream, function)`.
//!
//! ---------------------------------------------------------------------------
//!
//! To use the [Data Services]:
//!
//! - Create a [Handler] by providing the [New Handler] function with
//!   [Settings], or [With Events] to observe the connection lifecycle.
//! - Register callbacks with [Register Stream Function]; they run on the
//!   dispatch thread and must not register or unregister callbacks
//!   themselves.
//! - Start communicating with [Enable]; stop with [Disable]. An enabled
//!   [Handler] maintains its connection, re-establishing it after [T5] in
//!   active mode or by listening again in passive mode.
//! - Send primary messages with [Send Stream Function] (no reply) or
//!   [Send And Wait For Response] (reply bounded by [T3]); answer a prior
//!   request with [Send Response].
//!
//! An inbound message for which no handler is registered and which demands
//! a reply is answered with S9F5, carrying the 10 header bytes of the
//! offending message; a handler failure is answered with the abort function
//! of its stream.
//!
//! [Session Services]:           crate::session
//! [Data Services]:              crate::dispatch
//! [Settings]:                   crate::settings::Settings
//! [T3]:                         crate::settings::Settings::t3
//! [T5]:                         crate::settings::Settings::t5
//! [Handler]:                    Handler
//! [New Handler]:                Handler::new
//! [With Events]:                Handler::with_events
//! [Enable]:                     Handler::enable
//! [Disable]:                    Handler::disable
//! [Register Stream Function]:   Handler::register_stream_function
//! [Send Stream Function]:       Handler::send_stream_function
//! [Send And Wait For Response]: Handler::send_and_waitfor_response
//! [Send Response]:              Handler::send_response

use crate::primitive::{self, ConnectionMode};
use crate::session::{self, MessageId, SelectionState};
use crate::settings::Settings;
use crate::{Error, PresentationType};
use oneshot::Sender as SendOnce;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering::Relaxed};
use std::sync::mpsc::Receiver;
use std::sync::{Arc, Mutex, RwLock};
use std::thread;
use std::time::Duration;
use tracing::{debug, error, warn};

/// ## HANDLER FAILURE
///
/// The error a registered callback may fail with; answered on the wire by
/// the abort function of the callback's stream.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// ## CALLBACK
///
/// A handler registered for one `(stream, function)` pair.
///
/// Runs on the dispatch thread. Returning a message sends it as the reply
/// to the inbound transaction; returning [None] ends the transaction
/// silently; failing sends the abort function of the stream.
pub type Callback =
  Box<dyn Fn(&Handler, &secs_ii::Message) -> Result<Option<secs_ii::Message>, HandlerError> + Send + Sync>;

/// ## EVENT CALLBACKS
///
/// Hooks observing the connection lifecycle, called from the threads which
/// drive it. Every hook defaults to a no-op.
#[derive(Clone)]
pub struct EventCallbacks {
  /// ### CONNECTED
  ///
  /// Called with the remote entity's address once a connection is
  /// established.
  pub connected: Arc<dyn Fn(SocketAddr) + Send + Sync>,

  /// ### DISCONNECTED
  ///
  /// Called once an established connection is broken, by either side.
  pub disconnected: Arc<dyn Fn() + Send + Sync>,

  /// ### STATE CHANGED
  ///
  /// Called with the new [Selection State] on every transition.
  ///
  /// [Selection State]: crate::session::SelectionState
  pub state_changed: Arc<dyn Fn(SelectionState) + Send + Sync>,

  /// ### MESSAGE RECEIVED
  ///
  /// Called with every inbound data message before it is dispatched.
  pub message_received: Arc<dyn Fn(&secs_ii::Message) + Send + Sync>,
}
impl Default for EventCallbacks {
  fn default() -> Self {
    Self {
      connected: Arc::new(|_| {}),
      disconnected: Arc::new(|| {}),
      state_changed: Arc::new(|_| {}),
      message_received: Arc::new(|_| {}),
    }
  }
}

/// ## HANDLER
///
/// The stream/function level of the protocol stack: owns the pending-reply
/// table, the callback registry, and the supervisor which keeps the
/// session alive while enabled.
pub struct Handler {
  /// ### SESSION CLIENT
  session_client: Arc<session::Client>,

  /// ### PENDING REPLIES
  ///
  /// The open data transactions initiated locally, keyed by system bytes,
  /// each holding the slot its initiator is waiting on.
  pending: Mutex<HashMap<u32, SendOnce<secs_ii::Message>>>,

  /// ### CALLBACK REGISTRY
  ///
  /// Handlers keyed by `(stream, function)`.
  callbacks: RwLock<HashMap<(u8, u8), Callback>>,

  /// ### EVENT CALLBACKS
  events: EventCallbacks,

  /// ### ENABLED FLAG
  enabled: AtomicBool,
}
impl Handler {
  /// ### NEW HANDLER
  ///
  /// Creates a disabled [Handler] with no registered callbacks and no-op
  /// event hooks.
  ///
  /// [Handler]: Handler
  pub fn new(settings: Settings) -> Arc<Self> {
    Self::with_events(settings, EventCallbacks::default())
  }

  /// ### NEW HANDLER WITH EVENTS
  ///
  /// Creates a disabled [Handler] whose event hooks observe the connection
  /// lifecycle.
  ///
  /// [Handler]: Handler
  pub fn with_events(settings: Settings, events: EventCallbacks) -> Arc<Self> {
    let state_changed = events.state_changed.clone();
    Arc::new(Self {
      session_client: session::Client::new(settings, state_changed),
      pending: Mutex::new(HashMap::new()),
      callbacks: RwLock::new(HashMap::new()),
      events,
      enabled: AtomicBool::new(false),
    })
  }

  /// ### SESSION CLIENT
  ///
  /// The underlying session layer, for control procedures not mediated by
  /// the data services, such as an explicit linktest.
  pub fn session_client(&self) -> &Arc<session::Client> {
    &self.session_client
  }

  /// ### SETTINGS
  pub fn settings(&self) -> &Settings {
    &self.session_client.settings
  }

  /// ### REGISTER STREAM FUNCTION
  ///
  /// Registers the callback for a `(stream, function)` pair, replacing any
  /// previous registration. Registering a reply function is permitted;
  /// such a callback sees replies which no pending transaction claimed.
  pub fn register_stream_function<F>(&self, stream: u8, function: u8, callback: F)
  where
    F: Fn(&Handler, &secs_ii::Message) -> Result<Option<secs_ii::Message>, HandlerError>
      + Send
      + Sync
      + 'static,
  {
    self.callbacks.write().unwrap().insert((stream, function), Box::new(callback));
  }

  /// ### UNREGISTER STREAM FUNCTION
  ///
  /// Removes the callback for a `(stream, function)` pair, if any.
  pub fn unregister_stream_function(&self, stream: u8, function: u8) {
    self.callbacks.write().unwrap().remove(&(stream, function));
  }

  /// ### ENABLE
  ///
  /// Starts the supervisor thread, which establishes and maintains the
  /// connection until [Disable] is called: an active entity connects,
  /// selects, and retries after [T5] on failure; a passive entity listens
  /// for the remote entity and expects it to select within [T7].
  ///
  /// [Disable]: Handler::disable
  /// [T5]:      crate::settings::Settings::t5
  /// [T7]:      crate::settings::Settings::t7
  pub fn enable(self: &Arc<Self>) {
    if self.enabled.swap(true, Relaxed) {
      return;
    }
    let supervisor: Arc<Handler> = self.clone();
    thread::spawn(move || supervisor.supervise());
  }

  /// ### DISABLE
  ///
  /// Stops the supervisor, closes the connection, and fails every pending
  /// request immediately. Callers blocked in
  /// [Send And Wait For Response] observe the failure at once.
  ///
  /// [Send And Wait For Response]: Handler::send_and_waitfor_response
  pub fn disable(&self) {
    if !self.enabled.swap(false, Relaxed) {
      return;
    }
    self.session_client.begin_shutdown();
    if self.session_client.is_connected() {
      let _ = self.session_client.disconnect();
    }
    self.pending.lock().unwrap().clear();
  }

  /// ### SUPERVISOR LOOP
  ///
  /// One connection lifetime per iteration: connect, select when active,
  /// serve inbound messages until the connection breaks, then wait out
  /// [T5] before the next attempt.
  ///
  /// [T5]: crate::settings::Settings::t5
  fn supervise(self: Arc<Self>) {
    let connect_mode: ConnectionMode = self.settings().connect_mode;
    let t5: Duration = self.settings().t5;
    while self.enabled.load(Relaxed) {
      match self.session_client.connect() {
        Ok((peer, receiver)) => {
          debug!(%peer, device = ?self.settings().device_type, "session connected");
          (self.events.connected)(peer);
          let established: bool = match connect_mode {
            ConnectionMode::Active => match self.session_client.select() {
              Ok(()) => true,
              Err(select_error) => {
                warn!(%select_error, "select procedure failed");
                let _ = self.session_client.disconnect();
                false
              }
            },
            ConnectionMode::Passive => true,
          };
          if established {
            self.serve(receiver);
          }
          (self.events.disconnected)();
        }
        Err(connect_error) => {
          if self.enabled.load(Relaxed) {
            warn!(%connect_error, "connect attempt failed");
          }
        }
      }
      if !self.enabled.load(Relaxed) {
        break;
      }
      match connect_mode {
        ConnectionMode::Active => thread::sleep(t5),
        // A passive listener re-accepts immediately.
        ConnectionMode::Passive => thread::sleep(Duration::from_millis(50)),
      }
    }
  }

  /// ### SERVE LOOP
  ///
  /// Drains the data channel of one connection, dispatching each message
  /// in receive order; when the channel hangs up, every pending request is
  /// failed rather than left to time out.
  fn serve(&self, receiver: Receiver<(MessageId, secs_ii::Message)>) {
    for (id, message) in receiver {
      self.handle_inbound(id, message);
    }
    self.pending.lock().unwrap().clear();
  }

  /// ### INBOUND DISPATCH
  ///
  /// Routes one inbound data message:
  ///
  /// 1. A reply function whose system bytes match a pending transaction
  ///    completes it; the abort function completes it the same way.
  /// 2. Otherwise a registered callback is invoked: its reply, if any, is
  ///    sent under the inbound system bytes, and its failure is answered
  ///    with the abort function of the stream.
  /// 3. Otherwise, when the W-bit demands a reply, S9F5 is sent carrying
  ///    the 10 header bytes of the offending message.
  fn handle_inbound(&self, id: MessageId, message: secs_ii::Message) {
    (self.events.message_received)(&message);

    if message.function % 2 == 0 {
      if let Some(sender) = self.pending.lock().unwrap().remove(&id.system) {
        // The initiator may have timed out and gone; nothing more to do.
        let _ = sender.send(message);
        return;
      }
    }

    let callbacks = self.callbacks.read().unwrap();
    match callbacks.get(&(message.stream, message.function)) {
      Some(callback) => match callback(self, &message) {
        Ok(Some(reply)) => {
          if let Err(send_error) = self.send_response(reply, id.system) {
            error!(%send_error, "failed to send a callback's reply");
          }
        }
        Ok(None) => {}
        Err(callback_error) => {
          warn!(%callback_error, stream = message.stream, "callback failed, sending abort");
          let abort = secs_ii::Message {
            stream: message.stream,
            function: 0,
            w: false,
            text: None,
          };
          if let Err(send_error) = self.send_response(abort, id.system) {
            error!(%send_error, "failed to send the abort reply");
          }
        }
      },
      None => {
        warn!(
          stream = message.stream,
          function = message.function,
          "no handler for inbound function"
        );
        if message.w {
          let request_header: [u8; 10] = primitive::MessageHeader {
            session_id: id.session,
            byte_2: ((message.w as u8) << 7) | message.stream,
            byte_3: message.function,
            presentation_type: PresentationType::SecsII as u8,
            session_type: 0,
            system: id.system,
          }
          .into();
          let unrecognized = secs_ii::Message {
            stream: 9,
            function: 5,
            w: false,
            text: Some(secs_ii::Item::Bin(request_header.to_vec())),
          };
          if let Err(send_error) = self.send_response(unrecognized, id.system) {
            error!(%send_error, "failed to send S9F5");
          }
        }
      }
    }
  }

  /// ### SEND STREAM FUNCTION
  ///
  /// Transmits a primary message without awaiting anything, under the next
  /// system bytes.
  pub fn send_stream_function(&self, message: secs_ii::Message) -> Result<(), Error> {
    let system: u32 = self.session_client.next_system();
    self.session_client.send_data(message, system)
  }

  /// ### SEND AND WAIT FOR RESPONSE
  ///
  /// Transmits a primary message with the W-bit set and waits up to [T3]
  /// for the reply.
  ///
  /// The pending slot is registered before the message reaches the wire,
  /// so the dispatch loop can never observe a reply to an unregistered
  /// transaction. A send failure removes the slot and surfaces the error;
  /// expiry of [T3] removes the slot and fails with [Timeout]; a broken
  /// connection fails with [Disconnected].
  ///
  /// [T3]:           crate::settings::Settings::t3
  /// [Timeout]:      crate::Error::Timeout
  /// [Disconnected]: crate::Error::Disconnected
  pub fn send_and_waitfor_response(
    &self,
    message: secs_ii::Message,
  ) -> Result<secs_ii::Message, Error> {
    let mut message: secs_ii::Message = message;
    message.w = true;
    let system: u32 = self.session_client.next_system();

    let receiver: oneshot::Receiver<secs_ii::Message> = {
      let mut pending = self.pending.lock().unwrap();
      let (sender, receiver) = oneshot::channel::<secs_ii::Message>();
      pending.insert(system, sender);
      receiver
    };

    if let Err(send_error) = self.session_client.send_data(message, system) {
      self.pending.lock().unwrap().remove(&system);
      return Err(send_error);
    }

    match receiver.recv_timeout(self.settings().t3) {
      Ok(reply) => Ok(reply),
      Err(oneshot::RecvTimeoutError::Timeout) => {
        self.pending.lock().unwrap().remove(&system);
        warn!(system, "T3 expired waiting for a reply");
        Err(Error::Timeout)
      }
      Err(oneshot::RecvTimeoutError::Disconnected) => Err(Error::Disconnected),
    }
  }

  /// ### SEND RESPONSE
  ///
  /// Transmits a reply to a prior request, under the request's system
  /// bytes.
  pub fn send_response(&self, message: secs_ii::Message, system: u32) -> Result<(), Error> {
    self.session_client.send_data(message, system)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::io::{Read, Write};
  use std::net::TcpStream;

  fn free_port() -> u16 {
    std::net::TcpListener::bind("127.0.0.1:0")
      .unwrap()
      .local_addr()
      .unwrap()
      .port()
  }

  fn test_settings(port: u16) -> Settings {
    Settings {
      address: format!("127.0.0.1:{port}"),
      connect_mode: ConnectionMode::Passive,
      t3: Duration::from_millis(300),
      t6: Duration::from_millis(500),
      t7: Duration::from_secs(10),
      t8: Duration::from_secs(2),
      ..Settings::default()
    }
  }

  fn connect_peer(port: u16) -> TcpStream {
    for _ in 0..100 {
      if let Ok(stream) = TcpStream::connect(("127.0.0.1", port)) {
        stream.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
        return stream;
      }
      thread::sleep(std::time::Duration::from_millis(20));
    }
    panic!("handler never bound its listener");
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

  fn data_frame(stream: u8, function: u8, w: bool, system: u32, text: Vec<u8>) -> Vec<u8> {
    primitive::Block {
      header: primitive::MessageHeader {
        session_id: 0,
        byte_2: ((w as u8) << 7) | stream,
        byte_3: function,
        presentation_type: 0,
        session_type: 0,
        system,
      },
      text,
    }
    .encode()
  }

  // Brings up a passive handler and a raw peer which has completed the
  // select procedure against it.
  fn established(handler: &Arc<Handler>, port: u16) -> TcpStream {
    handler.enable();
    let mut peer = connect_peer(port);
    peer
      .write_all(
        &primitive::Block {
          header: primitive::MessageHeader {
            session_id: 0xFFFF,
            byte_2: 0,
            byte_3: 0,
            presentation_type: 0,
            session_type: 1,
            system: 1,
          },
          text: vec![],
        }
        .encode(),
      )
      .unwrap();
    let (header, _) = read_frame(&mut peer);
    assert_eq!(header.session_type, 2);
    peer
  }

  #[test]
  fn unknown_function_is_answered_by_s9f5() {
    let port = free_port();
    let handler = Handler::new(test_settings(port));
    let mut peer = established(&handler, port);

    peer.write_all(&data_frame(1, 1, true, 17, vec![])).unwrap();
    let (header, text) = read_frame(&mut peer);
    assert_eq!(header.byte_2 & 0b0111_1111, 9);
    assert_eq!(header.byte_3, 5);
    assert_eq!(header.system, 17);
    // The S9F5 text is a binary item carrying the offending header.
    assert_eq!(
      text,
      vec![0x21, 0x0A, 0x00, 0x00, 0x81, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x11]
    );

    handler.disable();
  }

  #[test]
  fn unknown_function_without_w_bit_is_dropped() {
    let port = free_port();
    let handler = Handler::new(test_settings(port));
    let mut peer = established(&handler, port);

    peer.write_all(&data_frame(1, 1, false, 18, vec![])).unwrap();
    // Nothing comes back; the read times out.
    let mut probe: [u8; 1] = [0];
    assert!(peer.read_exact(&mut probe).is_err());

    handler.disable();
  }

  #[test]
  fn registered_callback_reply_is_sent() {
    let port = free_port();
    let handler = Handler::new(test_settings(port));
    handler.register_stream_function(1, 1, |_, _| {
      Ok(Some(secs_ii::Message {
        stream: 1,
        function: 2,
        w: false,
        text: Some(secs_ii::Item::u4(42)),
      }))
    });
    let mut peer = established(&handler, port);

    peer.write_all(&data_frame(1, 1, true, 19, vec![])).unwrap();
    let (header, text) = read_frame(&mut peer);
    assert_eq!(header.byte_2, 1);
    assert_eq!(header.byte_3, 2);
    assert_eq!(header.system, 19);
    assert_eq!(text, vec![0xB1, 0x04, 0x00, 0x00, 0x00, 0x2A]);

    handler.disable();
  }

  #[test]
  fn unregistered_function_falls_back_to_s9f5() {
    let port = free_port();
    let handler = Handler::new(test_settings(port));
    handler.register_stream_function(1, 1, |_, _| Ok(None));
    handler.unregister_stream_function(1, 1);
    let mut peer = established(&handler, port);

    peer.write_all(&data_frame(1, 1, true, 23, vec![])).unwrap();
    let (header, _) = read_frame(&mut peer);
    assert_eq!(header.byte_2 & 0b0111_1111, 9);
    assert_eq!(header.byte_3, 5);

    handler.disable();
  }

  #[test]
  fn failing_callback_is_answered_by_abort() {
    let port = free_port();
    let handler = Handler::new(test_settings(port));
    handler.register_stream_function(1, 1, |_, _| Err("callback failure".into()));
    let mut peer = established(&handler, port);

    peer.write_all(&data_frame(1, 1, true, 20, vec![])).unwrap();
    let (header, text) = read_frame(&mut peer);
    assert_eq!(header.byte_2, 1);
    assert_eq!(header.byte_3, 0);
    assert_eq!(header.system, 20);
    assert!(text.is_empty());

    handler.disable();
  }

  #[test]
  fn reply_timeout_clears_the_pending_slot() {
    let port = free_port();
    let handler = Handler::new(test_settings(port));
    let mut peer = established(&handler, port);

    let request = secs_ii::Message { stream: 1, function: 1, w: true, text: None };
    let result = handler.send_and_waitfor_response(request);
    assert!(matches!(result, Err(Error::Timeout)));
    assert!(handler.pending.lock().unwrap().is_empty());

    // The request did reach the wire.
    let (header, _) = read_frame(&mut peer);
    assert_eq!(header.byte_2, 0b1000_0001);
    assert_eq!(header.byte_3, 1);

    handler.disable();
  }

  #[test]
  fn reply_fulfills_the_pending_slot() {
    let port = free_port();
    let handler = Handler::new(test_settings(port));
    let mut peer = established(&handler, port);

    let answering = thread::spawn(move || {
      let (header, _) = read_frame(&mut peer);
      assert_eq!(header.byte_3, 1);
      peer
        .write_all(&data_frame(1, 2, false, header.system, vec![0xB1, 0x04, 0x00, 0x00, 0x05, 0x39]))
        .unwrap();
      peer
    });

    let request = secs_ii::Message { stream: 1, function: 1, w: true, text: None };
    let reply = handler.send_and_waitfor_response(request).unwrap();
    assert_eq!(reply.stream, 1);
    assert_eq!(reply.function, 2);
    assert_eq!(reply.text, Some(secs_ii::Item::u4(1337)));

    let _peer = answering.join().unwrap();
    handler.disable();
  }

  #[test]
  fn inbound_abort_fulfills_the_pending_slot() {
    let port = free_port();
    let handler = Handler::new(test_settings(port));
    let mut peer = established(&handler, port);

    let answering = thread::spawn(move || {
      let (header, _) = read_frame(&mut peer);
      peer.write_all(&data_frame(1, 0, false, header.system, vec![])).unwrap();
      peer
    });

    let request = secs_ii::Message { stream: 1, function: 1, w: true, text: None };
    let reply = handler.send_and_waitfor_response(request).unwrap();
    assert_eq!(reply.function, 0);

    let _peer = answering.join().unwrap();
    handler.disable();
  }

  #[test]
  fn disable_fails_pending_requests() {
    let port = free_port();
    let handler = Handler::new(Settings {
      t3: Duration::from_secs(10),
      ..test_settings(port)
    });
    let mut peer = established(&handler, port);

    let requesting = {
      let handler = handler.clone();
      thread::spawn(move || {
        handler.send_and_waitfor_response(secs_ii::Message {
          stream: 1,
          function: 1,
          w: true,
          text: None,
        })
      })
    };
    // Wait until the request is on the wire, then tear the session down.
    let (header, _) = read_frame(&mut peer);
    assert_eq!(header.byte_3, 1);
    handler.disable();

    let result = requesting.join().unwrap();
    assert!(matches!(result, Err(Error::Disconnected)));
  }
}
