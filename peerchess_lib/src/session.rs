use crate::board::{Color, Move, PieceKind, Square};
use crate::engine::{self, Difficulty, EngineHandle};
use crate::error::Result;
use crate::messages::{EngineMessage, SearchRequest};
use crate::oracle::{GameStatus, RulesOracle};
use crate::peer::{PeerEvent, PeerLink, PeerMessage, Role};
use log::{error, info, trace, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::fmt;
use std::str::FromStr;

pub const CONNECT_FIRST_TEXT: &str = "Connect with your friend first.";
pub const CONNECTED_TEXT: &str = "Connected!";
pub const DISCONNECTED_TEXT: &str = "Disconnected.";
pub const DESYNC_TEXT: &str = "Desynchronized: opponent sent an illegal move.";
pub const THINKING_TEXT: &str = "Thinking...";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GameMode {
   Local,
   VsBot,
   Online,
}

impl FromStr for GameMode {
   type Err = String;

   fn from_str(s: &str) -> std::result::Result<GameMode, String> {
      match s.to_ascii_lowercase().as_str() {
         "local" => Ok(GameMode::Local),
         "bot" | "vs-bot" => Ok(GameMode::VsBot),
         "online" => Ok(GameMode::Online),
         _ => Err(format!("Expected one of local, bot, online for mode, got {}", s)),
      }
   }
}

impl fmt::Display for GameMode {
   fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
      let display = match self {
         GameMode::Local => "local",
         GameMode::VsBot => "bot",
         GameMode::Online => "online",
      };
      write!(f, "{}", display)
   }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DropOutcome {
   Applied,
   Rejected,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChatDirection {
   Sent,
   Received,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatLine {
   pub direction: ChatDirection,
   pub text: String,
}

/// Where the session shows itself. Board widgets, drag and drop and chat
/// panes live behind this.
pub trait Presentation {
   fn render(&mut self, fen: &str);

   fn set_status_text(&mut self, text: &str);

   /// Connection notices, kept apart from the game status.
   fn set_connection_status(&mut self, _text: &str) {}

   fn show_chat(&mut self, _line: &ChatLine) {}
}

/// Peer state of one session. The role, and therefore the colour, is fixed
/// by the link for as long as it lives.
#[derive(Debug, Default)]
pub struct SessionContext {
   link: Option<PeerLink>,
}

impl SessionContext {
   pub fn link(&self) -> Option<&PeerLink> {
      self.link.as_ref()
   }

   pub fn role(&self) -> Option<Role> {
      self.link.as_ref().map(PeerLink::role)
   }

   pub fn assigned_color(&self) -> Option<Color> {
      self.role().map(Role::color)
   }

   pub fn is_connected(&self) -> bool {
      self.link.is_some()
   }
}

/// How bot replies are computed.
pub enum BotDriver {
   /// On the calling thread, against a snapshot of the position.
   Inline(StdRng),
   /// On a search worker; replies come back through `on_engine_reply`.
   Worker(EngineHandle),
}

pub struct GameSession<O: RulesOracle, P: Presentation> {
   oracle: O,
   mode: GameMode,
   difficulty: Difficulty,
   context: SessionContext,
   bot: BotDriver,
   generation: u64,
   pending_search: Option<u64>,
   chat_log: Vec<ChatLine>,
   presentation: P,
}

impl<O: RulesOracle, P: Presentation> GameSession<O, P> {
   pub fn new(oracle: O, mode: GameMode, difficulty: Difficulty, presentation: P) -> GameSession<O, P> {
      let mut session = GameSession {
         oracle,
         mode,
         difficulty,
         context: SessionContext::default(),
         bot: BotDriver::Inline(StdRng::from_entropy()),
         generation: 0,
         pending_search: None,
         chat_log: Vec::new(),
         presentation,
      };
      session.refresh();
      session.start_bot_if_due();
      session
   }

   pub fn with_bot(mut self, bot: BotDriver) -> GameSession<O, P> {
      self.bot = bot;
      self.start_bot_if_due();
      self
   }

   pub fn oracle(&self) -> &O {
      &self.oracle
   }

   pub fn mode(&self) -> GameMode {
      self.mode
   }

   pub fn difficulty(&self) -> Difficulty {
      self.difficulty
   }

   pub fn context(&self) -> &SessionContext {
      &self.context
   }

   pub fn chat_log(&self) -> &[ChatLine] {
      &self.chat_log
   }

   pub fn presentation(&self) -> &P {
      &self.presentation
   }

   pub fn generation(&self) -> u64 {
      self.generation
   }

   pub fn is_thinking(&self) -> bool {
      self.pending_search.is_some()
   }

   pub fn status_text(&self) -> String {
      status_text(self.oracle.turn(), self.oracle.status())
   }

   /// Whether the piece on `square` may be picked up right now. Nothing is
   /// mutated either way.
   pub fn on_drag_attempt(&mut self, square: Square) -> bool {
      if self.oracle.is_game_over() {
         return false;
      }
      let piece_color = match self.oracle.piece_on(square) {
         Some((color, _)) => color,
         None => return false,
      };
      match self.mode {
         GameMode::Local => true,
         GameMode::Online => match self.context.assigned_color() {
            Some(mine) => self.oracle.turn() == mine && piece_color == mine,
            None => {
               self.presentation.set_connection_status(CONNECT_FIRST_TEXT);
               false
            }
         },
         GameMode::VsBot => piece_color == Color::White,
      }
   }

   pub fn on_drop(&mut self, from: Square, to: Square) -> DropOutcome {
      if !self.on_drag_attempt(from) {
         trace!("gesture from {} refused", from);
         return DropOutcome::Rejected;
      }
      let attempt = Move {
         from,
         to,
         promotion: Some(PieceKind::Queen),
      };
      let played = match self.oracle.apply_move(attempt) {
         Some(played) => played,
         None => {
            trace!("{} is not legal here", attempt);
            return DropOutcome::Rejected;
         }
      };
      self.refresh();

      match self.mode {
         GameMode::Online => {
            let relayed = self.context.link().map_or(false, |link| {
               link.send(PeerMessage::Move {
                  from: played.from,
                  to: played.to,
               })
            });
            if !relayed {
               warn!("{} was played but could not be relayed", played);
            }
         }
         GameMode::VsBot => self.start_bot_if_due(),
         GameMode::Local => {}
      }
      DropOutcome::Applied
   }

   /// The bot plays Black. Asks it for a move when that is its turn and no
   /// search is out.
   fn start_bot_if_due(&mut self) {
      if self.mode == GameMode::VsBot
         && self.pending_search.is_none()
         && self.oracle.turn() == Color::Black
         && !self.oracle.is_game_over()
      {
         self.request_bot_move();
      }
   }

   fn request_bot_move(&mut self) {
      if let Some(generation) = self.pending_search {
         warn!("search for generation {} still outstanding, not starting another", generation);
         return;
      }
      // one tag per request, so a reply matches at most once
      self.generation += 1;
      let request = SearchRequest {
         generation: self.generation,
         fen: self.oracle.to_fen(),
         difficulty: self.difficulty,
      };
      self.pending_search = Some(request.generation);
      trace!("requesting a {} move for generation {}", request.difficulty, request.generation);
      let inline_reply = match &mut self.bot {
         BotDriver::Inline(rng) => {
            let best_move = match O::from_fen(&request.fen) {
               Ok(mut snapshot) => engine::select_move(&mut snapshot, request.difficulty, rng),
               Err(e) => {
                  error!("could not snapshot the position for search: {}", e);
                  None
               }
            };
            Some(EngineMessage::BestMove {
               generation: request.generation,
               best_move,
            })
         }
         BotDriver::Worker(handle) => {
            if handle.request(request) {
               self.presentation.set_status_text(THINKING_TEXT);
            } else {
               error!("search worker is gone");
               self.pending_search = None;
            }
            None
         }
      };
      if let Some(reply) = inline_reply {
         self.on_engine_reply(reply);
      }
   }

   /// Applies a bot reply. Replies for a superseded position, or that
   /// nobody is waiting for, are dropped. Returns whether a move was played.
   pub fn on_engine_reply(&mut self, reply: EngineMessage) -> bool {
      match reply {
         EngineMessage::BestMove { generation, best_move } => {
            if self.pending_search != Some(generation) {
               warn!(
                  "discarding stale engine reply for generation {} (current {})",
                  generation, self.generation
               );
               return false;
            }
            self.pending_search = None;
            let best_move = match best_move {
               Some(m) => m,
               None => {
                  error!("engine had no move to offer");
                  return false;
               }
            };
            if self.oracle.apply_move(best_move).is_none() {
               error!("engine suggested {}, which is illegal here", best_move);
               return false;
            }
            trace!("bot played {}", best_move);
            self.refresh();
            true
         }
      }
   }

   pub fn attach_peer(&mut self, link: PeerLink) {
      info!("playing online as {}", link.role().color().name());
      self.context.link = Some(link);
      self.presentation.set_connection_status(CONNECTED_TEXT);
      self.refresh();
   }

   /// Drops the link, which closes the connection.
   pub fn detach_peer(&mut self) {
      if self.context.link.take().is_some() {
         info!("peer link dropped");
      }
   }

   pub fn on_peer_event(&mut self, event: PeerEvent) {
      match event {
         PeerEvent::Message(PeerMessage::Chat { msg }) => {
            self.log_chat(ChatDirection::Received, msg);
         }
         PeerEvent::Message(PeerMessage::Move { from, to }) => {
            self.apply_remote_move(from, to);
         }
         PeerEvent::Closed => {
            // after a desync the link is already gone and that notice stays
            if self.context.link.take().is_some() {
               info!("peer disconnected");
               self.presentation.set_connection_status(DISCONNECTED_TEXT);
            }
         }
      }
   }

   fn apply_remote_move(&mut self, from: Square, to: Square) {
      let mine = match (self.mode, self.context.assigned_color()) {
         (GameMode::Online, Some(mine)) => mine,
         _ => {
            warn!("ignoring relayed move {}{} outside of an online game", from, to);
            return;
         }
      };
      let relayed = Move {
         from,
         to,
         promotion: Some(PieceKind::Queen),
      };
      let applied = self.oracle.turn() != mine && self.oracle.apply_move(relayed).is_some();
      if applied {
         self.refresh();
      } else {
         error!("opponent's move {} does not apply here, dropping the connection", relayed);
         self.detach_peer();
         self.presentation.set_connection_status(DESYNC_TEXT);
      }
   }

   /// Relays a chat line. Blank text, or no connection, sends nothing.
   pub fn send_chat(&mut self, text: &str) -> bool {
      let text = text.trim();
      if text.is_empty() {
         return false;
      }
      let sent = self.context.link().map_or(false, |link| {
         link.send(PeerMessage::Chat { msg: text.to_string() })
      });
      if sent {
         self.log_chat(ChatDirection::Sent, text.to_string());
      }
      sent
   }

   fn log_chat(&mut self, direction: ChatDirection, text: String) {
      let line = ChatLine { direction, text };
      self.presentation.show_chat(&line);
      self.chat_log.push(line);
   }

   /// Back to the starting position. Any outstanding search is forgotten.
   pub fn reset(&mut self) {
      self.replace_oracle(O::start());
   }

   pub fn reset_to(&mut self, fen: &str) -> Result<()> {
      let oracle = O::from_fen(fen)?;
      self.replace_oracle(oracle);
      Ok(())
   }

   fn replace_oracle(&mut self, oracle: O) {
      self.oracle = oracle;
      self.generation += 1;
      self.pending_search = None;
      self.refresh();
      self.start_bot_if_due();
   }

   fn refresh(&mut self) {
      let fen = self.oracle.to_fen();
      let status = self.status_text();
      self.presentation.render(&fen);
      self.presentation.set_status_text(&status);
   }
}

pub fn status_text(turn: Color, status: GameStatus) -> String {
   match status {
      GameStatus::Checkmate { loser } => format!("Game over, {} is in checkmate.", loser.name()),
      GameStatus::Draw => "Game over, drawn position.".to_string(),
      GameStatus::Ongoing { in_check: false } => format!("{} to move", turn.name()),
      GameStatus::Ongoing { in_check: true } => format!("{} to move, {} is in check", turn.name(), turn.name()),
   }
}
