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

//! # PRIMITIVE SERVICES
//!
//! Defines the most agnostic form in which data can be exchanged pursuant to
//! the [HSMS] protocol: the creation and breaking of the TCP/IP connection,
//! and the framing of messages with properly formatted headers and length
//! prefixes. This is not necessarily outlined by the standard, but is an
//! important piece of establishing and maintaining proper communications.
//!
//! ---------------------------------------------------------------------------
//!
//! To use the [Primitive Services]:
//!
//! - Build [Message]s which use [Message Header]s.
//! - Create a [Client] with the [New Client] function.
//! - Manage the [Connection State] with the [Connect Procedure] and
//!   [Disconnect Procedure].
//! - Receive [Message]s with the hook provided by the [Connect Procedure].
//! - Transmit [Message]s with the [Transmit Procedure].
//!
//! [HSMS]:                 crate
//! [Primitive Services]:   crate::primitive
//! [Client]:               Client
//! [New Client]:           Client::new
//! [Connect Procedure]:    Client::connect
//! [Disconnect Procedure]: Client::disconnect
//! [Transmit Procedure]:   Client::transmit
//! [Message]:              Message
//! [Message Header]:       MessageHeader
//! [Connection State]:     ConnectionState

use std::io::{Error, ErrorKind, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering::Relaxed};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Mutex, RwLock};
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

/// ## MAXIMUM FRAME LENGTH
///
/// The largest acceptable value of the 4-byte length field: the 10 header
/// bytes plus the largest single item representable by three length bytes.
/// Frames declaring more are treated as a protocol failure and drop the
/// connection.
pub const MAX_FRAME: u32 = 10 + 0xFF_FF_FF;

/// ## MESSAGE HEADER
/// **Based on SEMI E37-1109§8.2.5-8.2.6**
///
/// A 10 byte field describing the contents of a [Message].
///
/// [Message]: Message
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MessageHeader {
  /// ### SESSION ID
  /// **Based on SEMI E37-1109§8.2.6.1**
  ///
  /// Provides an association between [Message]s across multiple
  /// transactions; 0xFFFF denotes a control message.
  ///
  /// [Message]: Message
  pub session_id: u16,

  /// ### HEADER BYTE 2
  /// **Based on SEMI E37-1109§8.2.6.2**
  ///
  /// For data messages, the W-bit in the high bit and the stream in the low
  /// 7 bits; interpretation otherwise depends on the [Session Type].
  ///
  /// [Session Type]: MessageHeader::session_type
  pub byte_2: u8,

  /// ### HEADER BYTE 3
  /// **Based on SEMI E37-1109§8.2.6.3**
  ///
  /// For data messages, the function; interpretation otherwise depends on
  /// the [Session Type].
  ///
  /// [Session Type]: MessageHeader::session_type
  pub byte_3: u8,

  /// ### PRESENTATION TYPE
  /// **Based on SEMI E37-1109§8.2.6.4**
  ///
  /// An enumerated value defining the encoding type of the message text;
  /// 0 denotes SECS-II.
  pub presentation_type: u8,

  /// ### SESSION TYPE
  /// **Based on SEMI E37-1109§8.2.6.5-8.2.6.6**
  ///
  /// An enumerated value defining the specific interpretation of the
  /// [Message]: 0 for data, 1 through 9 for control.
  ///
  /// [Message]: Message
  pub session_type: u8,

  /// ### SYSTEM BYTES
  /// **Based on SEMI E37-1109§8.2.6.7**
  ///
  /// Provides an association between [Message]s within a single
  /// transaction.
  ///
  /// [Message]: Message
  pub system: u32,
}
impl From<MessageHeader> for [u8; 10] {
  /// ### SERIALIZE MESSAGE HEADER
  fn from(header: MessageHeader) -> Self {
    let mut bytes: [u8; 10] = [0; 10];
    bytes[0..2].copy_from_slice(&header.session_id.to_be_bytes());
    bytes[2] = header.byte_2;
    bytes[3] = header.byte_3;
    bytes[4] = header.presentation_type;
    bytes[5] = header.session_type;
    bytes[6..10].copy_from_slice(&header.system.to_be_bytes());
    bytes
  }
}
impl From<[u8; 10]> for MessageHeader {
  /// ### DESERIALIZE MESSAGE HEADER
  fn from(bytes: [u8; 10]) -> Self {
    Self {
      session_id: u16::from_be_bytes([bytes[0], bytes[1]]),
      byte_2: bytes[2],
      byte_3: bytes[3],
      presentation_type: bytes[4],
      session_type: bytes[5],
      system: u32::from_be_bytes([bytes[6], bytes[7], bytes[8], bytes[9]]),
    }
  }
}

/// ## MESSAGE
/// **Based on SEMI E37-1109§8.2**
///
/// Data using the [HSMS] defined structure, but not enforcing compliance
/// with the standards for how its fields are filled and what they mean.
///
/// The Message Length field defined by the standard is not stored here; it
/// exists only on the wire, as part of each [Block].
///
/// [HSMS]:  crate
/// [Block]: Block
#[derive(Clone, Debug, PartialEq)]
pub struct Message {
  /// ### MESSAGE HEADER
  pub header: MessageHeader,

  /// ### MESSAGE TEXT
  ///
  /// The message's content, whose layout is defined by its
  /// [Presentation Type] and [Session Type].
  ///
  /// [Presentation Type]: MessageHeader::presentation_type
  /// [Session Type]:      MessageHeader::session_type
  pub text: Vec<u8>,
}
impl Message {
  /// ### PARTITION INTO BLOCKS
  /// **Based on SEMI E37-1109§8.2**
  ///
  /// The framed transmission units of this [Message]. HSMS does not
  /// partition outbound messages, so exactly one [Block] carrying the whole
  /// text is produced.
  ///
  /// [Message]: Message
  /// [Block]:   Block
  pub fn blocks(self) -> Vec<Block> {
    vec![Block { header: self.header, text: self.text }]
  }

  /// ### ASSEMBLE FROM BLOCKS
  ///
  /// Combines received [Block]s carrying the same system bytes back into a
  /// [Message], concatenating their payloads in arrival order.
  ///
  /// A continuation whose header does not agree with the first block's
  /// session and system bytes indicates interleaved transmissions, which
  /// the receiver does not attempt to reorder.
  ///
  /// [Message]: Message
  /// [Block]:   Block
  pub fn from_blocks(blocks: Vec<Block>) -> Result<Message, Error> {
    let mut blocks = blocks.into_iter();
    let first: Block = blocks
      .next()
      .ok_or_else(|| Error::new(ErrorKind::InvalidData, "no blocks to assemble"))?;
    let mut message: Message = Message { header: first.header, text: first.text };
    for block in blocks {
      if block.header.system != message.header.system
        || block.header.session_id != message.header.session_id
      {
        return Err(Error::new(ErrorKind::InvalidData, "out-of-order continuation block"));
      }
      message.text.extend_from_slice(&block.text);
    }
    Ok(message)
  }
}

/// ## BLOCK
/// **Based on SEMI E37-1109§8.2**
///
/// One framed transmission unit: on the wire, a 4-byte big-endian length
/// counting the 10 header bytes plus the payload, followed by the header
/// and the payload itself.
#[derive(Clone, Debug, PartialEq)]
pub struct Block {
  /// ### BLOCK HEADER
  pub header: MessageHeader,

  /// ### BLOCK TEXT
  pub text: Vec<u8>,
}
impl Block {
  /// ### ENCODE BLOCK
  ///
  /// Serializes the length field, header, and payload into one contiguous
  /// buffer, so a single write puts the whole frame on the wire.
  pub fn encode(&self) -> Vec<u8> {
    let length: u32 = (self.text.len() + 10) as u32;
    let mut buffer: Vec<u8> = Vec::with_capacity(4 + length as usize);
    buffer.extend_from_slice(&length.to_be_bytes());
    buffer.extend_from_slice(&<[u8; 10]>::from(self.header));
    buffer.extend_from_slice(&self.text);
    buffer
  }

  /// ### DECODE BLOCK
  ///
  /// Deserializes one complete frame, validating the length field against
  /// the actual data.
  pub fn decode(data: &[u8]) -> Result<Block, Error> {
    if data.len() < 14 {
      return Err(Error::new(ErrorKind::InvalidData, "frame shorter than the minimal block"));
    }
    let length: u32 = u32::from_be_bytes([data[0], data[1], data[2], data[3]]);
    if !(10..=MAX_FRAME).contains(&length) {
      return Err(Error::new(ErrorKind::InvalidData, "frame length out of bounds"));
    }
    if data.len() != 4 + length as usize {
      return Err(Error::new(ErrorKind::InvalidData, "frame length disagrees with data"));
    }
    let mut header_bytes: [u8; 10] = [0; 10];
    header_bytes.copy_from_slice(&data[4..14]);
    Ok(Block { header: MessageHeader::from(header_bytes), text: data[14..].to_vec() })
  }
}

/// ## CLIENT
///
/// Encapsulates a limited set of functionality of the [HSMS] protocol
/// referred to as the [Primitive Services].
///
/// This [Client] can be used to:
/// - Manage the [Connection State] with the [Connect Procedure] and
///   [Disconnect Procedure].
/// - Receive [Message]s with the hook provided by the [Connect Procedure].
/// - Transmit [Message]s with the [Transmit Procedure].
///
/// [HSMS]:                 crate
/// [Primitive Services]:   crate::primitive
/// [Message]:              Message
/// [Client]:               Client
/// [Connect Procedure]:    Client::connect
/// [Disconnect Procedure]: Client::disconnect
/// [Transmit Procedure]:   Client::transmit
/// [Connection State]:     ConnectionState
#[derive(Default)]
pub struct Client {
  /// ### CONNECTION STATE
  connection_state: RwLock<ConnectionState>,

  /// ### WRITE LOCK
  ///
  /// Serializes transmissions so length prefixes and their payloads are
  /// never interleaved on the wire.
  write_lock: Mutex<()>,

  /// ### HALT FLAG
  ///
  /// Asks a [Connect Procedure] blocked waiting for an incoming connection
  /// to give up, since closing an idle listener does not interrupt it.
  ///
  /// [Connect Procedure]: Client::connect
  halt: AtomicBool,
}

/// ## CONNECTION PROCEDURES
/// **Based on SEMI E37-1109§6.3-6.5**
impl Client {
  /// ### NEW CLIENT
  ///
  /// Creates a [Client] in the [NOT CONNECTED] state, ready to initiate the
  /// [Connect Procedure].
  ///
  /// [Client]:            Client
  /// [Connect Procedure]: Client::connect
  /// [NOT CONNECTED]:     ConnectionState::NotConnected
  pub fn new() -> Arc<Self> {
    Arc::new(Self::default())
  }

  /// ### CONNECT PROCEDURE
  /// **Based on SEMI E37-1109§6.3.4-6.3.7**
  ///
  /// Connects the [Client] to the Remote Entity.
  ///
  /// -------------------------------------------------------------------------
  ///
  /// The [Connection State] must be in the [NOT CONNECTED] state to use
  /// this procedure.
  ///
  /// -------------------------------------------------------------------------
  ///
  /// The [Connect Procedure] has two different behaviors based on the
  /// [Connection Mode] provided to it:
  /// - [PASSIVE] - The socket address of the Local Entity must be provided,
  ///   and the [Client] listens for and accepts the connection when
  ///   initiated by the Remote Entity, polling the [Halt Procedure] flag
  ///   while it waits.
  /// - [ACTIVE] - The socket address of the Remote Entity must be provided,
  ///   and the [Client] initiates the connection, waiting up to the time
  ///   specified by [T5] for the Remote Entity to respond.
  ///
  /// -------------------------------------------------------------------------
  ///
  /// Upon completion of the [Connect Procedure], the [T8] parameter is set
  /// as the TCP stream's read and write timeout, the [CONNECTED] state is
  /// entered, and a thread draining the socket into the returned channel is
  /// started. The channel hangs up when the connection is broken.
  ///
  /// [Client]:            Client
  /// [Connect Procedure]: Client::connect
  /// [Halt Procedure]:    Client::halt
  /// [Connection State]:  ConnectionState
  /// [NOT CONNECTED]:     ConnectionState::NotConnected
  /// [CONNECTED]:         ConnectionState::Connected
  /// [Connection Mode]:   ConnectionMode
  /// [PASSIVE]:           ConnectionMode::Passive
  /// [ACTIVE]:            ConnectionMode::Active
  /// [T5]:                crate::settings::Settings::t5
  /// [T8]:                crate::settings::Settings::t8
  pub fn connect(
    self: &Arc<Self>,
    entity: &str,
    connection_mode: ConnectionMode,
    t5: Duration,
    t8: Duration,
  ) -> Result<(SocketAddr, Receiver<Message>), Error> {
    if let ConnectionState::Connected(_) = *self.connection_state.read().unwrap() {
      return Err(Error::new(ErrorKind::AlreadyExists, "already connected"));
    }
    self.halt.store(false, Relaxed);

    let (stream, socket) = match connection_mode {
      // A passive entity publishes a port and waits for the remote entity
      // to reach it. The listener is polled rather than blocked on so that
      // the halt flag can interrupt a wait with no incoming connection.
      ConnectionMode::Passive => {
        let listener: TcpListener = TcpListener::bind(entity)?;
        listener.set_nonblocking(true)?;
        loop {
          if self.halt.load(Relaxed) {
            return Err(Error::new(ErrorKind::Interrupted, "connect halted"));
          }
          match listener.accept() {
            Ok((stream, socket)) => {
              stream.set_nonblocking(false)?;
              break (stream, socket);
            }
            Err(error) if error.kind() == ErrorKind::WouldBlock => {
              thread::sleep(Duration::from_millis(50));
            }
            Err(error) => return Err(error),
          }
        }
      }

      // An active entity initiates the connection, bounded by T5.
      ConnectionMode::Active => {
        let socket: SocketAddr = entity
          .to_socket_addrs()?
          .next()
          .ok_or_else(|| Error::new(ErrorKind::AddrNotAvailable, "unresolvable endpoint"))?;
        let stream: TcpStream = TcpStream::connect_timeout(&socket, t5)?;
        (stream, socket)
      }
    };

    // T8 bounds the wait between successive characters of one message.
    stream.set_read_timeout(Some(t8))?;
    stream.set_write_timeout(Some(t8))?;

    debug!(peer = %socket, "connection established");
    *self.connection_state.write().unwrap() = ConnectionState::Connected(stream);

    let (rx_sender, rx_receiver) = channel::<Message>();
    let rx_clone: Arc<Client> = self.clone();
    thread::spawn(move || rx_clone.receive(rx_sender));

    Ok((socket, rx_receiver))
  }

  /// ### HALT PROCEDURE
  ///
  /// Asks a [Connect Procedure] blocked waiting for an incoming connection
  /// to give up with an error instead of accepting.
  ///
  /// [Connect Procedure]: Client::connect
  pub fn halt(&self) {
    self.halt.store(true, Relaxed);
  }

  /// ### DISCONNECT PROCEDURE
  /// **Based on SEMI E37-1109§6.4-6.5**
  ///
  /// Disconnects the [Client] from the Remote Entity, entering the
  /// [NOT CONNECTED] state and causing the receive thread to hang up its
  /// channel.
  ///
  /// [Client]:        Client
  /// [NOT CONNECTED]: ConnectionState::NotConnected
  pub fn disconnect(&self) -> Result<(), Error> {
    match &*self.connection_state.read().unwrap() {
      ConnectionState::NotConnected => {
        return Err(Error::new(ErrorKind::NotConnected, "not connected"))
      }
      ConnectionState::Connected(stream) => {
        // Informs the other end and errors out the receive thread if it has
        // not already quit.
        let _ = stream.shutdown(Shutdown::Both);
      }
    }
    *self.connection_state.write().unwrap() = ConnectionState::NotConnected;
    debug!("connection closed");
    Ok(())
  }

  /// ### CONNECTED
  ///
  /// Whether the [Client] currently holds a live connection.
  ///
  /// [Client]: Client
  pub fn is_connected(&self) -> bool {
    matches!(*self.connection_state.read().unwrap(), ConnectionState::Connected(_))
  }
}

/// ## MESSAGE EXCHANGE PROCEDURES
/// **Based on SEMI E37-1109§7**
impl Client {
  /// ### RECEIVE PROCEDURE
  ///
  /// A [Client] in the [CONNECTED] state automatically receives [Message]s
  /// and provides them to the hook handed out by the [Connect Procedure].
  ///
  /// Each frame is read as the 4-byte length, validated against
  /// [MAX FRAME], then the 10-byte header and the payload. A read timeout
  /// while waiting between frames is an acceptable idle period; a timeout
  /// or end-of-stream inside a frame, a bad length field, or any other
  /// error shuts the connection down.
  ///
  /// [Message]:           Message
  /// [Client]:            Client
  /// [Connect Procedure]: Client::connect
  /// [CONNECTED]:         ConnectionState::Connected
  /// [MAX FRAME]:         MAX_FRAME
  fn receive(self: Arc<Self>, rx_sender: Sender<Message>) {
    while let ConnectionState::Connected(stream_shared) = &*self.connection_state.read().unwrap() {
      let mut stream: &TcpStream = stream_shared;

      // Ok(None) marks an idle timeout before any byte of a frame arrived,
      // which is allowed; Err requires the connection to be dropped.
      let result: Result<Option<Message>, Error> = 'rx: {
        let mut length_buffer: [u8; 4] = [0; 4];
        let first_read: usize = match stream.read(&mut length_buffer) {
          Ok(0) => break 'rx Err(Error::from(ErrorKind::UnexpectedEof)),
          Ok(received) => received,
          Err(error) => match error.kind() {
            ErrorKind::TimedOut | ErrorKind::WouldBlock => break 'rx Ok(None),
            _ => break 'rx Err(error),
          },
        };
        // From here on a frame is in progress, so shortfalls are fatal.
        if first_read < 4 {
          if let Err(error) = stream.read_exact(&mut length_buffer[first_read..]) {
            break 'rx Err(error);
          }
        }
        let length: u32 = u32::from_be_bytes(length_buffer);
        if !(10..=MAX_FRAME).contains(&length) {
          warn!(length, "dropping connection: frame length out of bounds");
          break 'rx Err(Error::from(ErrorKind::InvalidData));
        }

        let mut header_buffer: [u8; 10] = [0; 10];
        if let Err(error) = stream.read_exact(&mut header_buffer) {
          break 'rx Err(error);
        }

        let mut text: Vec<u8> = vec![0; (length - 10) as usize];
        if !text.is_empty() {
          if let Err(error) = stream.read_exact(&mut text) {
            break 'rx Err(error);
          }
        }

        Ok(Some(Message { header: MessageHeader::from(header_buffer), text }))
      };

      match result {
        Ok(None) => {}
        Ok(Some(rx_message)) => {
          // The other end of the channel hanging up means nobody wants
          // further messages, so the thread stops here.
          if rx_sender.send(rx_message).is_err() {
            break;
          }
        }
        Err(_error) => {
          // Only the read side of a TCP connection is guaranteed to learn
          // of dropped communications, so shutdown is called in order for
          // the transmit procedure to fail fast instead of timing out.
          let _ = stream_shared.shutdown(Shutdown::Both);
          break;
        }
      }
    }

    // Dropping the sender hangs up the channel, which is how the layers
    // above learn that the connection is gone.
    let _ = self.disconnect();
  }

  /// ### TRANSMIT PROCEDURE
  /// **Based on SEMI E37-1109§7.2**
  ///
  /// Serializes a [Message] and transmits it over the TCP/IP connection as
  /// a single frame, written in one call under the write lock so concurrent
  /// transmissions never interleave.
  ///
  /// -------------------------------------------------------------------------
  ///
  /// The [Connection State] must be in the [CONNECTED] state to use this
  /// procedure. A failed transmission initiates the
  /// [Disconnect Procedure].
  ///
  /// [Message]:              Message
  /// [Connection State]:     ConnectionState
  /// [CONNECTED]:            ConnectionState::Connected
  /// [Disconnect Procedure]: Client::disconnect
  pub fn transmit(&self, message: Message) -> Result<(), Error> {
    let transmit_result: Result<(), Error> = {
      let state = self.connection_state.read().unwrap();
      match &*state {
        ConnectionState::NotConnected => {
          return Err(Error::new(ErrorKind::NotConnected, "not connected"))
        }
        ConnectionState::Connected(stream_shared) => {
          let frame: Vec<u8> = Block { header: message.header, text: message.text }.encode();
          let _guard = self.write_lock.lock().unwrap();
          let mut stream: &TcpStream = stream_shared;
          stream.write_all(&frame)
        }
      }
    };

    match transmit_result {
      Ok(()) => Ok(()),
      Err(error) => {
        // A write failure is a communications failure; the connection is
        // dropped so both sides converge on NOT CONNECTED.
        let _ = self.disconnect();
        Err(error)
      }
    }
  }
}

/// ## CONNECTION STATE
/// **Based on SEMI E37-1109§5.4-5.5**
///
/// In the [HSMS] protocol, two [Connection State]s exist, [NOT CONNECTED]
/// and [CONNECTED]. The [Client] moves between them based on whether it has
/// established a TCP/IP connection to a Remote Entity, and the integrity of
/// that connection.
///
/// [HSMS]:             crate
/// [Client]:           Client
/// [Connection State]: ConnectionState
/// [NOT CONNECTED]:    ConnectionState::NotConnected
/// [CONNECTED]:        ConnectionState::Connected
#[derive(Debug, Default)]
pub enum ConnectionState {
  /// ### NOT CONNECTED
  /// **Based on SEMI E37-1109§5.5.1**
  ///
  /// In this state, the [Client] is ready to initiate the
  /// [Connect Procedure] but has either not yet done so, or has terminated
  /// a previous connection.
  ///
  /// [Client]:            Client
  /// [Connect Procedure]: Client::connect
  #[default]
  NotConnected,

  /// ### CONNECTED
  /// **Based on SEMI E37-1109§5.5.2**
  ///
  /// In this state, the [Client] has successfully completed the
  /// [Connect Procedure] and is able to send and receive data.
  ///
  /// [Client]:            Client
  /// [Connect Procedure]: Client::connect
  Connected(TcpStream),
}

/// ## CONNECTION MODE
/// **Based on SEMI E37-1109§6.3.2**
///
/// The [Client] must use one of two [Connection Mode]s, [PASSIVE] or
/// [ACTIVE], in order to perform the [Connect Procedure] and attain a
/// TCP/IP connection.
///
/// [Client]:            Client
/// [Connect Procedure]: Client::connect
/// [Connection Mode]:   ConnectionMode
/// [PASSIVE]:           ConnectionMode::Passive
/// [ACTIVE]:            ConnectionMode::Active
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum ConnectionMode {
  /// ### PASSIVE
  ///
  /// In this mode, the [Client] listens for and accepts the connection when
  /// initiated by the Remote Entity.
  ///
  /// [Client]: Client
  #[default]
  Passive,

  /// ### ACTIVE
  ///
  /// In this mode, the [Client] initiates the connection and waits up to
  /// the time specified by [T5] for the Remote Entity to respond.
  ///
  /// [Client]: Client
  /// [T5]:     crate::settings::Settings::t5
  Active,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn header_round_trip() {
    let header = MessageHeader {
      session_id: 0x1234,
      byte_2: 0b1000_0001,
      byte_3: 13,
      presentation_type: 0,
      session_type: 0,
      system: 0xDEAD_BEEF,
    };
    let bytes: [u8; 10] = header.into();
    assert_eq!(bytes, [0x12, 0x34, 0x81, 0x0D, 0x00, 0x00, 0xDE, 0xAD, 0xBE, 0xEF]);
    assert_eq!(MessageHeader::from(bytes), header);
  }

  #[test]
  fn block_wire_format() {
    // A select request with system bytes 123 frames to a minimal block.
    let block = Block {
      header: MessageHeader {
        session_id: 0xFFFF,
        byte_2: 0,
        byte_3: 0,
        presentation_type: 0,
        session_type: 1,
        system: 123,
      },
      text: vec![],
    };
    let encoded = block.encode();
    assert_eq!(
      encoded,
      vec![0x00, 0x00, 0x00, 0x0A, 0xFF, 0xFF, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x7B]
    );
    assert_eq!(Block::decode(&encoded).unwrap(), block);
  }

  #[test]
  fn block_decode_rejects_bad_length() {
    let mut encoded = Block {
      header: MessageHeader {
        session_id: 0xFFFF,
        byte_2: 0,
        byte_3: 0,
        presentation_type: 0,
        session_type: 1,
        system: 123,
      },
      text: vec![],
    }
    .encode();
    encoded[3] = 0x09;
    assert!(Block::decode(&encoded).is_err());
  }

  #[test]
  fn message_partitions_to_a_single_block() {
    let message = Message {
      header: MessageHeader {
        session_id: 1,
        byte_2: 0b1000_0001,
        byte_3: 13,
        presentation_type: 0,
        session_type: 0,
        system: 7,
      },
      text: vec![1, 2, 3],
    };
    let blocks = message.clone().blocks();
    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0].header, message.header);
    assert_eq!(blocks[0].text, message.text);
    assert_eq!(Message::from_blocks(blocks).unwrap(), message);
  }

  #[test]
  fn message_assembles_from_blocks_in_order() {
    let header = MessageHeader {
      session_id: 1,
      byte_2: 1,
      byte_3: 1,
      presentation_type: 0,
      session_type: 0,
      system: 7,
    };
    let message = Message::from_blocks(vec![
      Block { header, text: vec![1, 2] },
      Block { header, text: vec![3] },
    ])
    .unwrap();
    assert_eq!(message.text, vec![1, 2, 3]);
  }

  #[test]
  fn message_assembly_rejects_foreign_continuation() {
    let header = MessageHeader {
      session_id: 1,
      byte_2: 1,
      byte_3: 1,
      presentation_type: 0,
      session_type: 0,
      system: 7,
    };
    let mut foreign = header;
    foreign.system = 8;
    assert!(Message::from_blocks(vec![
      Block { header, text: vec![1, 2] },
      Block { header: foreign, text: vec![3] },
    ])
    .is_err());
  }
}
