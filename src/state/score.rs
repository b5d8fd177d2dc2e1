//! Score document for a single match and the per-ball scoring rules.

use std::fmt;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Legal deliveries that make up one over.
pub const BALLS_PER_OVER: u8 = 6;
/// Wickets that end an innings.
pub const MAX_WICKETS: u8 = 10;
/// Commentary line written when a score document is created.
pub const INITIAL_COMMENTARY: &str = "Match is about to start...";

/// Kind of extra attached to a delivery.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ExtraType {
    /// Ordinary delivery.
    #[default]
    None,
    /// Wide; does not count as a ball of the over.
    Wide,
    /// No-ball; does not count as a ball of the over.
    NoBall,
    /// Bye.
    Bye,
    /// Leg-bye.
    LegBye,
}

impl ExtraType {
    /// Whether a delivery of this kind advances the ball-in-over counter.
    ///
    /// Byes and leg-byes are treated like wides and no-balls here, which is a known
    /// simplification of real scoring kept for compatibility with existing scorecards.
    pub fn is_legal_delivery(self) -> bool {
        match self {
            ExtraType::None => true,
            ExtraType::Wide | ExtraType::NoBall | ExtraType::Bye | ExtraType::LegBye => false,
        }
    }
}

/// Over progress as an `(over, ball)` pair, rendered as `over.ball` on output only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Overs {
    /// Completed overs.
    pub over_number: u32,
    /// Legal deliveries bowled in the current over, always in `0..=5`.
    pub ball_in_over: u8,
}

impl Overs {
    /// Overs at `over_number.ball_in_over`.
    pub fn new(over_number: u32, ball_in_over: u8) -> Self {
        Self {
            over_number,
            ball_in_over,
        }
    }

    /// Count one legal delivery, rolling over to the next over on the sixth ball.
    pub fn advance(&mut self) {
        self.ball_in_over += 1;
        if self.ball_in_over >= BALLS_PER_OVER {
            self.ball_in_over = 0;
            self.over_number += 1;
        }
    }
}

impl fmt::Display for Overs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.over_number, self.ball_in_over)
    }
}

/// Batsman currently listed at the crease.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BatsmanEntry {
    /// Batsman name, used as the identity key.
    pub name: String,
    /// Runs scored.
    pub runs: u32,
    /// Legal deliveries faced.
    pub balls: u32,
}

/// Figures of the bowler currently in the bowling slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BowlerSpell {
    /// Bowler name.
    pub name: String,
    /// Overs bowled in this spell.
    pub overs: Overs,
    /// Runs conceded.
    pub runs: u32,
    /// Wickets taken.
    pub wickets: u32,
}

/// Summary of the most recent delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LastBall {
    /// Runs off the ball.
    pub runs: u8,
    /// Whether it took a wicket.
    pub is_wicket: bool,
    /// Extra kind, if any.
    pub extra_type: ExtraType,
}

/// A single delivery, already validated at the HTTP boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BallEvent {
    /// Runs off the ball, extras included.
    pub runs: u8,
    /// Whether it took a wicket.
    pub is_wicket: bool,
    /// Extra kind, if any.
    pub extra_type: ExtraType,
    /// Batsman on strike.
    pub batsman_name: String,
    /// Bowler of the delivery.
    pub bowler_name: String,
    /// Commentary line for this ball.
    pub commentary: String,
}

/// Live score of a match. Only the latest state is kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScoreDocument {
    /// Innings number, starting at 1.
    pub innings: u32,
    /// Team currently batting.
    pub batting_team_id: i64,
    /// Team currently bowling.
    pub bowling_team_id: i64,
    /// Team total.
    pub runs: u32,
    /// Wickets fallen.
    pub wickets: u8,
    /// Over progress.
    pub overs: Overs,
    /// Batting order for this spell; not capped at two entries.
    pub active_batsmen: Vec<BatsmanEntry>,
    /// Bowler in the bowling slot.
    pub current_bowler: Option<BowlerSpell>,
    /// Most recent delivery.
    pub last_ball: Option<LastBall>,
    /// Single commentary line, overwritten on each update.
    pub commentary: String,
}

impl ScoreDocument {
    /// Fresh first-innings document with zeroed counters.
    pub fn new(batting_team_id: i64, bowling_team_id: i64) -> Self {
        Self {
            innings: 1,
            batting_team_id,
            bowling_team_id,
            runs: 0,
            wickets: 0,
            overs: Overs::default(),
            active_batsmen: Vec::new(),
            current_bowler: None,
            last_ball: None,
            commentary: INITIAL_COMMENTARY.to_string(),
        }
    }

    /// Apply one delivery to the document.
    ///
    /// A dismissed batsman is removed from the crease and receives no further bookkeeping
    /// for that ball. The bowler slot is replaced wholesale when a different bowler is named,
    /// so figures from an earlier spell are not retained.
    pub fn apply_ball(&mut self, event: &BallEvent) {
        let runs = u32::from(event.runs);
        let legal = event.extra_type.is_legal_delivery();

        self.runs += runs;

        if event.is_wicket {
            self.wickets = (self.wickets + 1).min(MAX_WICKETS);
            self.active_batsmen
                .retain(|batsman| batsman.name != event.batsman_name);
        }

        if legal {
            self.overs.advance();
        }

        if !event.is_wicket {
            self.record_batsman(&event.batsman_name, runs, legal);
        }
        self.record_bowler(event, runs, legal);

        self.last_ball = Some(LastBall {
            runs: event.runs,
            is_wicket: event.is_wicket,
            extra_type: event.extra_type,
        });
        self.commentary = event.commentary.clone();
    }

    fn record_batsman(&mut self, name: &str, runs: u32, legal: bool) {
        let balls = u32::from(legal);
        match self
            .active_batsmen
            .iter_mut()
            .find(|batsman| batsman.name == name)
        {
            Some(batsman) => {
                batsman.runs += runs;
                batsman.balls += balls;
            }
            None => self.active_batsmen.push(BatsmanEntry {
                name: name.to_string(),
                runs,
                balls,
            }),
        }
    }

    fn record_bowler(&mut self, event: &BallEvent, runs: u32, legal: bool) {
        let wickets = u32::from(event.is_wicket);
        let overs = self.overs;

        match self.current_bowler.as_mut() {
            Some(bowler) if bowler.name == event.bowler_name => {
                bowler.runs += runs;
                bowler.wickets += wickets;
                if legal {
                    bowler.overs = overs;
                }
            }
            _ => {
                self.current_bowler = Some(BowlerSpell {
                    name: event.bowler_name.clone(),
                    overs: if legal { overs } else { Overs::default() },
                    runs,
                    wickets,
                });
            }
        }
    }
}
