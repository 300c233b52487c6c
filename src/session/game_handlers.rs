use chess::ChessMove;
use log::{debug, info, warn};

use crate::config::SessionSettings;
use crate::engine::MoveOracle;
use crate::game::position::{is_my_turn, Position};
use crate::game::utils::{classify, color_to_string};
use crate::models::events::{GameEvent, GameStateUpdate};
use crate::models::game_state::{DrawOfferState, GameIdentity, SessionPhase, Termination};
use crate::models::memory::OpponentMemory;
use crate::platform::{MoveOutcome, Platform};

/// Work a single update asks for, computed without touching the network
#[derive(Debug, Default)]
pub struct Step {
    pub notices: Vec<String>,
    pub turn: Option<TurnPlan>,
}

/// Decision left to the oracle and the platform for one update
#[derive(Debug, Clone)]
pub struct TurnPlan {
    pub position: Position,
    pub draw_offered: bool,
    pub my_turn: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    DrawAccepted,
    Moved(ChessMove),
    RejectedNotMyTurn,
    MoveFailed,
    Waiting,
    NoLegalMove,
}

/// Draw offers are accepted only strictly below the threshold.
pub fn should_accept_draw(evaluation_cp: i32, threshold_cp: i32) -> bool {
    evaluation_cp < threshold_cp
}

/// Per-game state machine: `AwaitingIdentity -> Active -> Terminal`
pub struct SessionState {
    game_id: String,
    account: String,
    memory: OpponentMemory,
    phase: SessionPhase,
}

impl SessionState {
    pub fn new(game_id: &str, account: &str, memory: OpponentMemory) -> Self {
        Self {
            game_id: game_id.to_string(),
            account: account.to_string(),
            memory,
            phase: SessionPhase::AwaitingIdentity,
        }
    }

    #[cfg(test)]
    pub fn phase(&self) -> &SessionPhase {
        &self.phase
    }

    pub fn is_terminal(&self) -> bool {
        self.phase == SessionPhase::Terminal
    }

    pub fn handle_event(&mut self, event: GameEvent) -> Step {
        match (self.phase.clone(), event) {
            (SessionPhase::Terminal, _) => Step::default(),
            (SessionPhase::AwaitingIdentity, GameEvent::GameFull(full)) => {
                let identity = GameIdentity::from_game_full(&full, &self.account);
                info!(
                    "Game {}: playing as {} vs {}",
                    self.game_id,
                    color_to_string(identity.color),
                    identity.opponent
                );
                let notice = format!(
                    "Playing as {} vs {}",
                    title_case(&color_to_string(identity.color)),
                    identity.opponent
                );
                self.phase = SessionPhase::Active(identity.clone());
                let mut step = self.handle_update(identity, &full.state);
                step.notices.insert(0, notice);
                step
            }
            (SessionPhase::Active(identity), GameEvent::GameFull(full)) => self.handle_update(identity, &full.state),
            (SessionPhase::Active(identity), GameEvent::GameState(update)) => self.handle_update(identity, &update),
            (SessionPhase::AwaitingIdentity, GameEvent::GameState(_)) => {
                debug!("Game {}: state before identity, ignored", self.game_id);
                Step::default()
            }
            (_, GameEvent::Other) => Step::default(),
        }
    }

    fn handle_update(&mut self, identity: GameIdentity, update: &GameStateUpdate) -> Step {
        // The move list is the whole game so far; never patch the old position.
        let position = match Position::replay(&update.moves) {
            Ok(position) => position,
            Err(e) => {
                warn!("Game {}: skipping update with bad move list: {}", self.game_id, e);
                return Step::default();
            }
        };

        let termination = position
            .outcome()
            .map(Termination::Finished)
            .or_else(|| Termination::from_update(update));
        if let Some(termination) = termination {
            return self.finish(&identity, termination, &position);
        }

        let draw = DrawOfferState::derive(update.wdraw, update.bdraw, identity.color);
        let my_turn = is_my_turn(&position, identity.color);
        if !draw.opponent_offering && !my_turn {
            return Step::default();
        }
        Step {
            notices: Vec::new(),
            turn: Some(TurnPlan {
                position,
                draw_offered: draw.opponent_offering,
                my_turn,
            }),
        }
    }

    fn finish(&mut self, identity: &GameIdentity, termination: Termination, position: &Position) -> Step {
        self.phase = SessionPhase::Terminal;
        let notice = match termination {
            Termination::Finished(outcome) => {
                let result = classify(outcome, identity.color);
                self.memory.record(&identity.opponent, result);
                info!(
                    "Game {} over: {} ({} vs {})",
                    self.game_id,
                    outcome.result_str(),
                    result.as_str(),
                    identity.opponent
                );
                let record = self.memory.snapshot();
                debug!("Conquered opponents: {:?}", record.conquered);
                format!(
                    "Game over\nResult: {} ({} vs {})\nMoves: {}",
                    outcome.result_str(),
                    result.as_str(),
                    identity.opponent,
                    position.fullmove_number()
                )
            }
            Termination::Aborted => {
                info!("Game {} aborted", self.game_id);
                format!("Game {} aborted", self.game_id)
            }
        };
        Step {
            notices: vec![notice],
            turn: None,
        }
    }
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Answer a pending draw offer, then move if it is our turn.
pub async fn play_turn(
    oracle: &mut MoveOracle,
    platform: &dyn Platform,
    game_id: &str,
    plan: &TurnPlan,
    settings: &SessionSettings,
) -> TurnOutcome {
    if plan.draw_offered {
        let evaluation = oracle.evaluate(&plan.position).await;
        info!("Game {}: draw offered, evaluation {} cp", game_id, evaluation);
        if should_accept_draw(evaluation, settings.draw_threshold_cp) {
            match platform.accept_draw(game_id).await {
                Ok(()) => {
                    info!("Game {}: draw accepted", game_id);
                    return TurnOutcome::DrawAccepted;
                }
                Err(e) => warn!("Game {}: failed to accept draw: {}", game_id, e),
            }
        } else {
            info!("Game {}: ignoring draw offer", game_id);
        }
    }

    if !plan.my_turn {
        return TurnOutcome::Waiting;
    }

    let Some(mv) = oracle.best_move(&plan.position, settings.move_time_ms).await else {
        return TurnOutcome::NoLegalMove;
    };
    let uci = mv.to_string();
    match platform.make_move(game_id, &uci).await {
        Ok(MoveOutcome::Accepted) => {
            info!("Game {}: sent {}", game_id, uci);
            TurnOutcome::Moved(mv)
        }
        Ok(MoveOutcome::RejectedNotMyTurn) => {
            warn!("Game {}: {} rejected, not our turn", game_id, uci);
            TurnOutcome::RejectedNotMyTurn
        }
        Err(e) => {
            warn!("Game {}: move {} failed: {}", game_id, uci, e);
            TurnOutcome::MoveFailed
        }
    }
}
