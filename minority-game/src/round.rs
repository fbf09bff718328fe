use crate::config::GameConfig;
use crate::{GameError, Result};
use minority_core::{Address, Wei};
use serde::{Deserialize, Serialize};

pub type RoundId = u64;

/// Lifecycle of a round. Declaration order is the only legal direction of travel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Stage {
    Created,
    Committing,
    Revealing,
    Finalized,
    /// Finalized and at least one claim has landed. Does not block anything.
    Claiming,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Created => "created",
            Stage::Committing => "committing",
            Stage::Revealing => "revealing",
            Stage::Finalized => "finalized",
            Stage::Claiming => "claiming",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "created" => Some(Stage::Created),
            "committing" => Some(Stage::Committing),
            "revealing" => Some(Stage::Revealing),
            "finalized" => Some(Stage::Finalized),
            "claiming" => Some(Stage::Claiming),
            _ => None,
        }
    }
}

/// One vote. Timestamps are unix seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Round {
    pub id: RoundId,
    pub creator: Address,
    pub question: String,
    pub options: Vec<String>,
    pub stage: Stage,
    pub created_at: u64,
    pub commit_deadline: u64,
    pub reveal_deadline: Option<u64>,
    pub reveal_duration: u64,
    pub option_totals: Vec<Wei>,
    pub total_bets: Wei,
    pub total_paid: Wei,
    pub total_confiscated: Wei,
    pub winning_option: Option<usize>,
    pub finalized: bool,
}

impl Round {
    /// Validate inputs and build a round in `Created`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: RoundId,
        creator: Address,
        question: &str,
        options: Vec<String>,
        now: u64,
        commit_duration: u64,
        reveal_duration: u64,
        config: &GameConfig,
    ) -> Result<Self> {
        let question = question.trim();
        if question.is_empty() {
            return Err(GameError::EmptyQuestion);
        }

        if options.len() < config.min_options || options.len() > config.max_options {
            return Err(GameError::OptionCount {
                count: options.len(),
                min: config.min_options,
                max: config.max_options,
            });
        }

        let options: Vec<String> = options.into_iter().map(|o| o.trim().to_string()).collect();
        if let Some(index) = options.iter().position(|o| o.is_empty()) {
            return Err(GameError::EmptyOption(index));
        }

        let option_count = options.len();
        Ok(Self {
            id,
            creator,
            question: question.to_string(),
            options,
            stage: Stage::Created,
            created_at: now,
            commit_deadline: now.saturating_add(commit_duration),
            reveal_deadline: None,
            reveal_duration,
            option_totals: vec![0; option_count],
            total_bets: 0,
            total_paid: 0,
            total_confiscated: 0,
            winning_option: None,
            finalized: false,
        })
    }

    fn advance(&mut self, to: Stage) -> Result<()> {
        if to <= self.stage {
            return Err(GameError::IllegalTransition {
                from: self.stage,
                to,
            });
        }
        tracing::debug!("Round {}: {:?} -> {:?}", self.id, self.stage, to);
        self.stage = to;
        Ok(())
    }

    /// `Created -> Committing`, done right after creation.
    pub fn open_commit(&mut self) -> Result<()> {
        if self.stage != Stage::Created {
            return Err(GameError::IllegalTransition {
                from: self.stage,
                to: Stage::Committing,
            });
        }
        self.advance(Stage::Committing)
    }

    pub fn ensure_accepting_commits(&self, now: u64) -> Result<()> {
        match self.stage {
            Stage::Created => Err(GameError::CommitPhaseNotStarted),
            Stage::Committing if now < self.commit_deadline => Ok(()),
            _ => Err(GameError::CommitPhaseEnded),
        }
    }

    /// `Committing -> Revealing`. Permissionless once the commit deadline passed.
    pub fn start_reveal(&mut self, now: u64) -> Result<u64> {
        match self.stage {
            Stage::Created => return Err(GameError::CommitPhaseNotStarted),
            Stage::Committing => {}
            _ => {
                return Err(GameError::IllegalTransition {
                    from: self.stage,
                    to: Stage::Revealing,
                })
            }
        }

        if now < self.commit_deadline {
            return Err(GameError::RevealTooEarly {
                commit_deadline: self.commit_deadline,
            });
        }

        // strictly after the commit deadline even with a zero reveal window
        let deadline = now.saturating_add(self.reveal_duration).max(self.commit_deadline + 1);
        self.advance(Stage::Revealing)?;
        self.reveal_deadline = Some(deadline);
        Ok(deadline)
    }

    pub fn ensure_accepting_reveals(&self, now: u64) -> Result<()> {
        if self.stage != Stage::Revealing {
            return Err(GameError::NotInRevealPhase);
        }
        match self.reveal_deadline {
            Some(deadline) if now < deadline => Ok(()),
            _ => Err(GameError::RevealPhaseEnded),
        }
    }

    /// Checks that `Revealing -> Finalized` is legal at `now`.
    pub fn ensure_finalizable(&self, now: u64) -> Result<()> {
        if self.finalized {
            return Err(GameError::AlreadyFinalized);
        }
        match (self.stage, self.reveal_deadline) {
            (Stage::Revealing, Some(deadline)) if now >= deadline => Ok(()),
            _ => Err(GameError::FinalizeTooEarly),
        }
    }

    /// Record the winner and freeze the round. Caller checked `ensure_finalizable`.
    pub(crate) fn seal_result(&mut self, winning_option: Option<usize>) -> Result<()> {
        self.advance(Stage::Finalized)?;
        self.winning_option = winning_option;
        self.finalized = true;
        Ok(())
    }

    pub(crate) fn mark_claiming(&mut self) {
        if self.stage == Stage::Finalized {
            self.stage = Stage::Claiming;
        }
    }

    pub fn is_active(&self) -> bool {
        !self.finalized
    }

    pub fn option_total(&self, option: usize) -> Result<Wei> {
        self.option_totals
            .get(option)
            .copied()
            .ok_or(GameError::InvalidChoice {
                choice: option,
                options: self.options.len(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creator() -> Address {
        "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266".parse().unwrap()
    }

    fn round(now: u64) -> Round {
        let mut r = Round::new(
            1,
            creator(),
            "Which colour?",
            vec!["red".into(), "blue".into(), "green".into()],
            now,
            3600,
            1800,
            &GameConfig::default(),
        )
        .unwrap();
        r.open_commit().unwrap();
        r
    }

    #[test]
    fn test_validation() {
        let config = GameConfig::default();
        let make = |q: &str, opts: Vec<&str>| {
            Round::new(
                1,
                creator(),
                q,
                opts.into_iter().map(String::from).collect(),
                0,
                10,
                10,
                &config,
            )
        };

        assert!(matches!(make("  ", vec!["a", "b"]), Err(GameError::EmptyQuestion)));
        assert!(matches!(
            make("q", vec!["only"]),
            Err(GameError::OptionCount { count: 1, .. })
        ));
        assert!(matches!(
            make("q", vec!["x"; 11]),
            Err(GameError::OptionCount { count: 11, .. })
        ));
        assert!(matches!(make("q", vec!["a", ""]), Err(GameError::EmptyOption(1))));
        assert!(make("q", vec!["x"; 10]).is_ok());
    }

    #[test]
    fn test_commit_window() {
        let r = round(1000);
        assert_eq!(r.stage, Stage::Committing);
        r.ensure_accepting_commits(1000).unwrap();
        r.ensure_accepting_commits(4599).unwrap();
        assert!(matches!(
            r.ensure_accepting_commits(4600),
            Err(GameError::CommitPhaseEnded)
        ));
    }

    #[test]
    fn test_created_round_rejects_commits() {
        let r = Round::new(
            1,
            creator(),
            "q",
            vec!["a".into(), "b".into()],
            0,
            10,
            10,
            &GameConfig::default(),
        )
        .unwrap();
        assert!(matches!(
            r.ensure_accepting_commits(0),
            Err(GameError::CommitPhaseNotStarted)
        ));
    }

    #[test]
    fn test_stage_transitions_follow_deadlines() {
        let mut r = round(1000);

        assert!(matches!(
            r.start_reveal(4599),
            Err(GameError::RevealTooEarly { commit_deadline: 4600 })
        ));
        assert!(matches!(r.ensure_finalizable(4599), Err(GameError::FinalizeTooEarly)));

        let deadline = r.start_reveal(4600).unwrap();
        assert_eq!(deadline, 6400);
        assert_eq!(r.stage, Stage::Revealing);
        r.ensure_accepting_reveals(6399).unwrap();
        assert!(matches!(
            r.ensure_accepting_reveals(6400),
            Err(GameError::RevealPhaseEnded)
        ));

        assert!(matches!(r.ensure_finalizable(6399), Err(GameError::FinalizeTooEarly)));
        r.ensure_finalizable(6400).unwrap();
        r.seal_result(Some(0)).unwrap();
        assert!(r.finalized);

        assert!(matches!(r.ensure_finalizable(9999), Err(GameError::AlreadyFinalized)));
        assert!(matches!(r.ensure_accepting_reveals(6000), Err(GameError::NotInRevealPhase)));
        assert!(matches!(r.ensure_accepting_commits(1000), Err(GameError::CommitPhaseEnded)));
    }

    #[test]
    fn test_stage_never_regresses() {
        let mut r = round(0);
        r.start_reveal(3600).unwrap();
        assert!(matches!(
            r.start_reveal(9000),
            Err(GameError::IllegalTransition { .. })
        ));
        assert!(r.open_commit().is_err());
        assert_eq!(r.stage, Stage::Revealing);

        r.seal_result(None).unwrap();
        r.mark_claiming();
        assert_eq!(r.stage, Stage::Claiming);
        assert!(r.seal_result(Some(1)).is_err());
        assert_eq!(r.winning_option, None);
    }

    #[test]
    fn test_stage_string_round_trip() {
        for stage in [
            Stage::Created,
            Stage::Committing,
            Stage::Revealing,
            Stage::Finalized,
            Stage::Claiming,
        ] {
            assert_eq!(Stage::parse(stage.as_str()), Some(stage));
        }
    }
}
