use log::{info, warn};
use std::env;

const NTFY_URL: &str = "https://ntfy.sh";
pub const TOPIC_ENV: &str = "PEERCHESS_NTFY_TOPIC";

/// The flag wins over the environment.
pub fn resolve_topic(flag: Option<String>) -> Option<String> {
   if flag.is_some() {
      return flag;
   }
   match env::var(TOPIC_ENV) {
      Ok(topic) => Some(topic),
      Err(env::VarError::NotPresent) => None,
      Err(env::VarError::NotUnicode(_)) => {
         warn!("Notification topic environment variable found, but with invalid unicode. Ignoring.");
         None
      }
   }
}

/// Tells whoever follows `topic` where the room is. Failures are logged and
/// otherwise ignored.
pub async fn announce_room(topic: &str, room: &str) {
   let client = match reqwest::Client::builder().build() {
      Ok(client) => client,
      Err(e) => {
         warn!("could not build an http client for the room announcement: {}", e);
         return;
      }
   };
   let res = client
      .post(&format!("{}/{}", NTFY_URL, topic))
      .header("Title", "peerchess room")
      .header("Priority", "high")
      .header("Tags", "key")
      .body(room.to_string())
      .send()
      .await;
   match res {
      Ok(res) if res.status().is_success() => info!("announced room {} on topic {}", room, topic),
      Ok(res) => warn!("room announcement refused: {}", res.status()),
      Err(e) => warn!("room announcement failed: {}", e),
   }
}
