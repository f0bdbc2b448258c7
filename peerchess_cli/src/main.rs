mod notify;
mod presentation;

use anyhow::{bail, Context};
use log::{info, warn};
use peerchess_lib::board::{parse_gesture, Square};
use peerchess_lib::cozy::CozyOracle;
use peerchess_lib::engine::{Difficulty, EngineHandle};
use peerchess_lib::error::Error;
use peerchess_lib::oracle::RulesOracle;
use peerchess_lib::peer::{PeerChannel, PeerEvent, PeerLink};
use peerchess_lib::session::{BotDriver, DropOutcome, GameMode, GameSession, Presentation};
use presentation::TerminalPresentation;
use structopt::StructOpt;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};

/// Chess against a friend, a bot, or yourself
#[derive(StructOpt, Debug)]
#[structopt(name = "peerchess")]
struct Opt {
   /// local, bot or online
   #[structopt(short = "m", long = "mode", default_value = "bot")]
   mode: GameMode,
   /// easy, medium or hard
   #[structopt(short = "d", long = "difficulty", default_value = "medium")]
   difficulty: Difficulty,
   /// Start from this position instead of the usual one
   #[structopt(long = "fen")]
   fen: Option<String>,
   /// Open a room on this address and play White
   #[structopt(long = "host", conflicts_with = "join")]
   host: Option<String>,
   /// Join the room at this address and play Black
   #[structopt(long = "join")]
   join: Option<String>,
   /// ntfy.sh topic to announce the room on
   #[structopt(long = "notify-topic")]
   notify_topic: Option<String>,
}

#[derive(Debug, PartialEq, Eq)]
enum Command {
   Move(Square, Square),
   Say(String),
   Reset,
   Status,
   Quit,
}

fn parse_command(line: &str) -> Result<Command, Error> {
   let line = line.trim();
   let (word, rest) = match line.split_once(char::is_whitespace) {
      Some((word, rest)) => (word, rest.trim()),
      None => (line, ""),
   };
   match (word, rest) {
      ("say", text) if !text.is_empty() => Ok(Command::Say(text.to_string())),
      ("reset", "") => Ok(Command::Reset),
      ("status", "") => Ok(Command::Status),
      ("quit", "") | ("exit", "") => Ok(Command::Quit),
      _ => {
         let (from, to) = parse_gesture(line)?;
         Ok(Command::Move(from, to))
      }
   }
}

/// Returns false once the player wants out.
fn handle_line<O: RulesOracle, P: Presentation>(session: &mut GameSession<O, P>, line: &str) -> bool {
   if line.trim().is_empty() {
      return true;
   }
   match parse_command(line) {
      Ok(Command::Move(from, to)) => {
         if session.on_drop(from, to) == DropOutcome::Rejected {
            println!("{}{} can't be played right now.", from, to);
         }
      }
      Ok(Command::Say(text)) => {
         if !session.send_chat(&text) {
            println!("{}", Error::NotConnected);
         }
      }
      Ok(Command::Reset) => session.reset(),
      Ok(Command::Status) => {
         println!("{}", session.status_text());
         match session.context().assigned_color() {
            Some(color) => println!("Playing online as {}.", color.name()),
            None if session.mode() == GameMode::Online => println!("Not connected."),
            None => println!("Playing {} ({}).", session.mode(), session.difficulty()),
         }
         if session.is_thinking() {
            println!("The bot is thinking.");
         }
      }
      Ok(Command::Quit) => return false,
      Err(e) => println!("{}. Try e2e4, say <text>, reset, status or quit.", e),
   }
   true
}

async fn establish(opt: &Opt) -> anyhow::Result<(PeerLink, UnboundedReceiver<PeerEvent>)> {
   let mut channel = PeerChannel::new();
   match (&opt.host, &opt.join) {
      (Some(addr), _) => {
         let room = channel
            .listen(addr.as_str())
            .await
            .with_context(|| format!("couldn't open a room on {}", addr))?;
         println!("Room open at {}. Waiting for your friend...", room);
         if let Some(topic) = notify::resolve_topic(opt.notify_topic.clone()) {
            notify::announce_room(&topic, &room.to_string()).await;
         }
         Ok(channel.accept().await.context("waiting for a peer failed")?)
      }
      (None, Some(addr)) => Ok(channel
         .connect(addr.as_str())
         .await
         .with_context(|| format!("couldn't join the room at {}", addr))?),
      (None, None) => bail!("online mode needs --host <ADDR> or --join <ADDR>"),
   }
}

/// Waits on an optional receiver; a missing one never yields.
async fn recv_or_pend<T>(receiver: &mut Option<UnboundedReceiver<T>>) -> Option<T> {
   match receiver {
      Some(receiver) => receiver.recv().await,
      None => std::future::pending().await,
   }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
   pretty_env_logger::init();
   let opt = Opt::from_args();

   if opt.mode != GameMode::Online && (opt.host.is_some() || opt.join.is_some()) {
      warn!("--host and --join only apply to online mode, ignoring them");
   }
   if opt.mode == GameMode::Online && opt.host.is_none() && opt.join.is_none() {
      bail!("online mode needs --host <ADDR> or --join <ADDR>");
   }

   let oracle = match &opt.fen {
      Some(fen) => CozyOracle::from_fen(fen).context("couldn't start from --fen")?,
      None => CozyOracle::start(),
   };

   let (eti_tx, mut eti_rx) = unbounded_channel(); // Engine to Interface
   let flipped = opt.mode == GameMode::Online && opt.join.is_some();
   let mut session = GameSession::new(oracle, opt.mode, opt.difficulty, TerminalPresentation::new(flipped));
   if opt.mode == GameMode::VsBot {
      session = session.with_bot(BotDriver::Worker(EngineHandle::spawn::<CozyOracle>(eti_tx)));
   }

   let mut connections = None;
   if opt.mode == GameMode::Online {
      let (conn_tx, conn_rx) = unbounded_channel();
      tokio::spawn(async move {
         let _ = conn_tx.send(establish(&opt).await);
      });
      connections = Some(conn_rx);
   }
   let mut peer_events: Option<UnboundedReceiver<PeerEvent>> = None;

   let mut lines = BufReader::new(tokio::io::stdin()).lines();
   loop {
      tokio::select! {
         line = lines.next_line() => {
            let line = match line.context("couldn't read stdin")? {
               Some(line) => line,
               None => break,
            };
            if !handle_line(&mut session, &line) {
               break;
            }
         }
         Some(reply) = eti_rx.recv() => {
            session.on_engine_reply(reply);
         }
         Some(connection) = recv_or_pend(&mut connections) => {
            connections = None;
            match connection {
               Ok((link, events)) => {
                  session.attach_peer(link);
                  peer_events = Some(events);
               }
               Err(e) => println!("{:#}", e),
            }
         }
         Some(event) = recv_or_pend(&mut peer_events) => {
            let closed = event == PeerEvent::Closed;
            session.on_peer_event(event);
            if closed {
               peer_events = None;
            }
         }
      }
   }

   info!("bye");
   Ok(())
}
