use chess::Color;

use crate::game::position::Outcome;
use crate::models::events::{GameFull, GameStateUpdate};

/// Who we are in a game. Fixed once the full game description arrives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameIdentity {
    pub game_id: String,
    pub color: Color,
    pub opponent: String,
}

impl GameIdentity {
    /// Work out our colour and opponent from the full game description.
    /// Anything that is not us on the white side means we are black.
    pub fn from_game_full(full: &GameFull, account: &str) -> Self {
        let (color, opponent) = if full.white.is(account) {
            (Color::White, full.black.display_name())
        } else {
            (Color::Black, full.white.display_name())
        };
        Self {
            game_id: full.id.clone(),
            color,
            opponent,
        }
    }
}

/// Draw offers derived from one state update, relative to our colour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DrawOfferState {
    pub opponent_offering: bool,
    pub own_offering: bool,
}

impl DrawOfferState {
    pub fn derive(white_offering: bool, black_offering: bool, own_color: Color) -> Self {
        match own_color {
            Color::White => Self {
                opponent_offering: black_offering,
                own_offering: white_offering,
            },
            Color::Black => Self {
                opponent_offering: white_offering,
                own_offering: black_offering,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionPhase {
    AwaitingIdentity,
    Active(GameIdentity),
    Terminal,
}

/// How the platform says a game ended, when it did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    Finished(Outcome),
    Aborted,
}

impl Termination {
    /// Read the platform's status field. `created` and `started` mean the
    /// game is still running.
    pub fn from_update(update: &GameStateUpdate) -> Option<Self> {
        let status = update.status.as_deref()?;
        match status {
            "created" | "started" => None,
            "aborted" | "noStart" => Some(Termination::Aborted),
            _ => {
                let outcome = match update.winner.as_deref() {
                    Some("white") => Outcome::Decisive { winner: Color::White },
                    Some("black") => Outcome::Decisive { winner: Color::Black },
                    _ => Outcome::Draw,
                };
                Some(Termination::Finished(outcome))
            }
        }
    }
}
