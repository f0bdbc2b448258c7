//! Direct two-party connection carrying moves and chat.
//!
//! The side that accepts the inbound connection hosts and plays White; the
//! side that dials out joins and plays Black. The wire format is one JSON
//! object per line.

use crate::board::{Color, Square};
use crate::error::{Error, Result};
use futures::{SinkExt, StreamExt};
use log::{info, trace, warn};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec};

/// Longest line accepted from a peer. A longer one ends the connection.
pub const MAX_LINE_LENGTH: usize = 16 * 1024;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PeerMessage {
   /// Promotion is always to a queen, so it is not sent.
   Move { from: Square, to: Square },
   Chat { msg: String },
}

impl PeerMessage {
   pub fn encode(&self) -> Result<String> {
      Ok(serde_json::to_string(self)?)
   }

   pub fn decode(line: &str) -> Result<PeerMessage> {
      Ok(serde_json::from_str(line)?)
   }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
   Host,
   Joiner,
}

impl Role {
   pub fn color(self) -> Color {
      match self {
         Role::Host => Color::White,
         Role::Joiner => Color::Black,
      }
   }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChannelState {
   Idle,
   AwaitingPeer,
   Connected(Role),
   Closed,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PeerEvent {
   Message(PeerMessage),
   Closed,
}

/// Sending half of a live connection. Sends are fire-and-forget; once every
/// clone is dropped the connection is shut down.
#[derive(Clone, Debug)]
pub struct PeerLink {
   role: Role,
   outbound: UnboundedSender<PeerMessage>,
}

impl PeerLink {
   pub fn role(&self) -> Role {
      self.role
   }

   /// Returns false if the connection is already gone.
   pub fn send(&self, message: PeerMessage) -> bool {
      self.outbound.send(message).is_ok()
   }

   pub fn is_open(&self) -> bool {
      !self.outbound.is_closed()
   }

   /// A link with no transport behind it, handing outbound messages to the
   /// returned receiver.
   pub fn detached(role: Role) -> (PeerLink, UnboundedReceiver<PeerMessage>) {
      let (outbound, outbound_rx) = unbounded_channel();
      (PeerLink { role, outbound }, outbound_rx)
   }
}

pub struct PeerChannel {
   state: ChannelState,
   listener: Option<TcpListener>,
}

impl PeerChannel {
   pub fn new() -> PeerChannel {
      PeerChannel {
         state: ChannelState::Idle,
         listener: None,
      }
   }

   pub fn state(&self) -> ChannelState {
      self.state
   }

   fn transition(&mut self, to: ChannelState) -> Result<()> {
      let allowed = matches!(
         (self.state, to),
         (ChannelState::Idle, ChannelState::AwaitingPeer)
            | (ChannelState::Idle, ChannelState::Connected(Role::Joiner))
            | (ChannelState::AwaitingPeer, ChannelState::Connected(Role::Host))
            | (ChannelState::AwaitingPeer, ChannelState::Connected(Role::Joiner))
            | (ChannelState::Idle, ChannelState::Closed)
            | (ChannelState::AwaitingPeer, ChannelState::Closed)
            | (ChannelState::Connected(_), ChannelState::Closed)
      );
      if !allowed {
         return Err(Error::ChannelState { from: self.state, to });
      }
      trace!("peer channel {:?} -> {:?}", self.state, to);
      self.state = to;
      Ok(())
   }

   /// Starts listening for the one inbound connection this channel will
   /// accept. The returned address is what the other side connects to.
   pub async fn listen<A: ToSocketAddrs>(&mut self, addr: A) -> Result<SocketAddr> {
      if self.state != ChannelState::Idle {
         return Err(Error::ChannelState {
            from: self.state,
            to: ChannelState::AwaitingPeer,
         });
      }
      let listener = TcpListener::bind(addr).await?;
      let local_addr = listener.local_addr()?;
      self.listener = Some(listener);
      self.transition(ChannelState::AwaitingPeer)?;
      info!("waiting for a peer on {}", local_addr);
      Ok(local_addr)
   }

   /// Accepts exactly one inbound connection and stops listening. The
   /// accepting side is the host.
   pub async fn accept(&mut self) -> Result<(PeerLink, UnboundedReceiver<PeerEvent>)> {
      let listener = match (self.state, self.listener.take()) {
         (ChannelState::AwaitingPeer, Some(listener)) => listener,
         _ => {
            return Err(Error::ChannelState {
               from: self.state,
               to: ChannelState::Connected(Role::Host),
            })
         }
      };
      let (stream, remote) = listener.accept().await?;
      self.transition(ChannelState::Connected(Role::Host))?;
      info!("peer {} connected, hosting as White", remote);
      Ok(spawn_io(stream, Role::Host))
   }

   /// Connects to a listening peer. The connecting side is the joiner, even
   /// if this side was itself waiting for a peer; it stops listening.
   pub async fn connect<A: ToSocketAddrs>(&mut self, addr: A) -> Result<(PeerLink, UnboundedReceiver<PeerEvent>)> {
      if !matches!(self.state, ChannelState::Idle | ChannelState::AwaitingPeer) {
         return Err(Error::ChannelState {
            from: self.state,
            to: ChannelState::Connected(Role::Joiner),
         });
      }
      let stream = TcpStream::connect(addr).await?;
      self.listener = None;
      self.transition(ChannelState::Connected(Role::Joiner))?;
      info!("connected to peer {}, joining as Black", stream.peer_addr()?);
      Ok(spawn_io(stream, Role::Joiner))
   }

   /// Marks the channel closed. Already closed channels stay closed.
   pub fn close(&mut self) {
      self.listener = None;
      if self.state != ChannelState::Closed {
         let _ = self.transition(ChannelState::Closed);
      }
   }
}

impl Default for PeerChannel {
   fn default() -> PeerChannel {
      PeerChannel::new()
   }
}

fn spawn_io(stream: TcpStream, role: Role) -> (PeerLink, UnboundedReceiver<PeerEvent>) {
   let (read_half, write_half) = stream.into_split();
   let mut lines = FramedRead::new(read_half, LinesCodec::new_with_max_length(MAX_LINE_LENGTH));
   let mut sink = FramedWrite::new(write_half, LinesCodec::new());
   let (link, mut outbound_rx) = PeerLink::detached(role);
   let (event_tx, event_rx) = unbounded_channel();

   tokio::spawn(async move {
      while let Some(message) = outbound_rx.recv().await {
         let line = match message.encode() {
            Ok(line) => line,
            Err(e) => {
               warn!("dropping unencodable peer message: {}", e);
               continue;
            }
         };
         if let Err(e) = sink.send(line).await {
            warn!("peer write failed: {}", e);
            break;
         }
      }
      trace!("peer writer finished");
   });

   tokio::spawn(async move {
      while let Some(line) = lines.next().await {
         let line = match line {
            Ok(line) => line,
            Err(e) => {
               warn!("peer read failed: {}", e);
               break;
            }
         };
         let line = line.trim();
         if line.is_empty() {
            continue;
         }
         match PeerMessage::decode(line) {
            Ok(message) => {
               if event_tx.send(PeerEvent::Message(message)).is_err() {
                  break;
               }
            }
            Err(e) => warn!("skipping malformed peer message {:?}: {}", line, e),
         }
      }
      info!("peer connection closed");
      let _ = event_tx.send(PeerEvent::Closed);
   });

   (link, event_rx)
}
