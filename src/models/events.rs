use serde::Deserialize;

/// Event on the account-wide incoming stream
#[derive(Deserialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum IncomingEvent {
    Challenge { challenge: ChallengeInfo },
    GameStart { game: GameStartInfo },
    #[serde(other)]
    Other,
}

#[derive(Deserialize, Debug, Clone)]
pub struct ChallengeInfo {
    pub id: String,
    pub challenger: Option<UserRef>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct UserRef {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct GameStartInfo {
    pub id: String,
}

/// Event on a single game's stream
#[derive(Deserialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum GameEvent {
    GameFull(GameFull),
    GameState(GameStateUpdate),
    #[serde(other)]
    Other,
}

/// Full game description, sent first on every game stream
#[derive(Deserialize, Debug, Clone)]
pub struct GameFull {
    pub id: String,
    pub white: PlayerInfo,
    pub black: PlayerInfo,
    pub state: GameStateUpdate,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct PlayerInfo {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default, alias = "username")]
    pub name: Option<String>,
    #[serde(default)]
    pub ai_level: Option<u8>,
}

impl PlayerInfo {
    pub fn is(&self, account: &str) -> bool {
        [self.id.as_deref(), self.name.as_deref()]
            .into_iter()
            .flatten()
            .any(|value| value.eq_ignore_ascii_case(account))
    }

    pub fn display_name(&self) -> String {
        match (&self.name, &self.id, self.ai_level) {
            (Some(name), _, _) => name.clone(),
            (None, Some(id), _) => id.clone(),
            (None, None, Some(level)) => format!("AI level {}", level),
            (None, None, None) => "Anonymous".to_string(),
        }
    }
}

/// Authoritative state of a game so far
#[derive(Deserialize, Debug, Clone, Default)]
pub struct GameStateUpdate {
    /// Space separated UCI moves from the start position
    #[serde(default)]
    pub moves: String,
    #[serde(default, alias = "wDraw")]
    pub wdraw: bool,
    #[serde(default, alias = "bDraw")]
    pub bdraw: bool,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub winner: Option<String>,
}

/// Game in the account's ongoing list
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct OngoingGame {
    pub game_id: String,
}

/// Online account returned by the bot listing
#[derive(Deserialize, Debug, Clone)]
pub struct OnlineUser {
    #[serde(alias = "name")]
    pub username: String,
}

/// Colour asked for in a challenge, sent as a form value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorPreference {
    White,
    Black,
    Random,
}

impl ColorPreference {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColorPreference::White => "white",
            ColorPreference::Black => "black",
            ColorPreference::Random => "random",
        }
    }
}

/// One outgoing challenge: opponent plus the fixed game parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengeTarget {
    pub opponent: String,
    pub rated: bool,
    pub clock_limit_secs: u32,
    pub clock_increment_secs: u32,
    pub color: ColorPreference,
}
