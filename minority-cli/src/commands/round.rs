use crate::config::CliConfig;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Subcommand;
use comfy_table::{presets::UTF8_FULL, Table};
use dialoguer::Password;
use minority_core::units::{format_ether, parse_ether};
use minority_core::Address;
use minority_game::{ClaimOutcome, MinorityGame, Participant, Round, RoundId};
use std::path::Path;
use std::time::Duration;

#[derive(Subcommand)]
pub enum RoundCommands {
    /// Create a round and open its commit phase
    Create {
        /// Creator address
        creator: String,
        /// The question being voted on
        question: String,
        /// Between 2 and 10 option labels
        #[arg(required = true, num_args = 2..)]
        options: Vec<String>,
        /// Commit phase length in seconds (0 = 1 hour)
        #[arg(long, default_value_t = 0)]
        commit_secs: u64,
        /// Reveal phase length in seconds (0 = 30 minutes)
        #[arg(long, default_value_t = 0)]
        reveal_secs: u64,
    },
    /// Commit to a choice with a stake; the secret is sealed in the local vault
    Commit {
        round: RoundId,
        /// Participant address
        participant: String,
        /// Option index
        choice: usize,
        /// Stake in ETH, e.g. 0.5
        amount: String,
        /// Vault passphrase (will prompt if not provided)
        #[arg(short, long)]
        passphrase: Option<String>,
    },
    /// Open the reveal phase once commits have closed
    StartReveal { round: RoundId },
    /// Reveal a sealed choice
    Reveal {
        round: RoundId,
        participant: String,
        /// Vault passphrase (will prompt if not provided)
        #[arg(short, long)]
        passphrase: Option<String>,
    },
    /// Close the round and pick the minority option
    Finalize { round: RoundId },
    /// Show what a participant is owed
    Reward { round: RoundId, participant: String },
    /// Claim a reward (or settle a forfeited deposit)
    Claim { round: RoundId, participant: String },
    /// Show round details
    Info { round: RoundId },
    /// List rounds
    List {
        /// Only rounds that are not finalized
        #[arg(short, long)]
        active: bool,
    },
    /// Show how a round's escrow has been paid out
    Settlement { round: RoundId },
}

pub async fn handle_round_command(
    cmd: RoundCommands,
    data_dir: &Path,
    config: &CliConfig,
) -> Result<()> {
    let game = MinorityGame::open(data_dir, config.game.clone()).await?;

    match cmd {
        RoundCommands::Create {
            creator,
            question,
            options,
            commit_secs,
            reveal_secs,
        } => {
            let creator: Address = creator.parse()?;
            let id = game
                .create_round(
                    creator,
                    &question,
                    options,
                    Duration::from_secs(commit_secs),
                    Duration::from_secs(reveal_secs),
                )
                .await?;

            let round = game.get_round_info(id).await?;
            println!("Round {} created.", id);
            println!("  Commits close: {}", format_time(round.commit_deadline));
            println!("  Reveal window: {} seconds", round.reveal_duration);
        }

        RoundCommands::Commit {
            round,
            participant,
            choice,
            amount,
            passphrase,
        } => {
            let participant = Participant::new(participant.parse()?);
            let amount = parse_ether(&amount)?;
            let passphrase = match passphrase {
                Some(p) => p,
                None => Password::new()
                    .with_prompt("Vault passphrase")
                    .with_confirmation("Confirm passphrase", "Passphrases don't match")
                    .interact()
                    .context("reading passphrase")?,
            };

            let ticket = participant
                .commit(&game, round, choice, amount, &passphrase)
                .await?;

            println!("Committed {} ETH to round {}.", format_ether(amount), round);
            println!("  Commit hash: {}", ticket.commit_hash);
            println!("Your choice and secret are sealed in the local vault.");
            println!("Reveal with: minority round reveal {} {}", round, participant.address());
        }

        RoundCommands::StartReveal { round } => {
            let deadline = game.start_reveal(round).await?;
            println!("Round {} is revealing until {}.", round, format_time(deadline));
        }

        RoundCommands::Reveal {
            round,
            participant,
            passphrase,
        } => {
            let participant = Participant::new(participant.parse()?);
            let passphrase = match passphrase {
                Some(p) => p,
                None => Password::new()
                    .with_prompt("Vault passphrase")
                    .interact()
                    .context("reading passphrase")?,
            };

            let choice = participant.reveal(&game, round, &passphrase).await?;
            let info = game.get_round_info(round).await?;
            println!(
                "Revealed option {} ('{}') in round {}.",
                choice, info.options[choice], round
            );
        }

        RoundCommands::Finalize { round } => match game.finalize(round).await? {
            Some(option) => {
                let info = game.get_round_info(round).await?;
                println!(
                    "Round {} finalized. Minority option: {} ('{}').",
                    round, option, info.options[option]
                );
            }
            None => println!("Round {} finalized with no reveals; there is no winner.", round),
        },

        RoundCommands::Reward { round, participant } => {
            let participant: Address = participant.parse()?;
            let reward = game.calculate_reward(round, &participant).await?;
            println!("Reward for {} in round {}: {} ETH", participant, round, format_ether(reward));
        }

        RoundCommands::Claim { round, participant } => {
            let participant = Participant::new(participant.parse()?);
            match participant.claim(&game, round).await? {
                ClaimOutcome::Paid(amount) => {
                    println!("Paid {} ETH to {}.", format_ether(amount), participant.address());
                }
                ClaimOutcome::Confiscated(amount) => {
                    println!(
                        "Deposit of {} ETH confiscated: {} never revealed.",
                        format_ether(amount),
                        participant.address()
                    );
                }
            }
        }

        RoundCommands::Info { round } => {
            let info = game.get_round_info(round).await?;
            print_round(&info);

            let participants = game.get_participants(round).await?;
            if !participants.is_empty() {
                println!();
                let mut table = Table::new();
                table.load_preset(UTF8_FULL);
                table.set_header(vec!["Participant", "Stake (ETH)", "Revealed", "Claimed"]);
                for address in participants {
                    if let Some(c) = game.get_commitment(round, &address).await? {
                        table.add_row(vec![
                            address.to_string(),
                            format_ether(c.escrowed_amount),
                            c.choice.map_or("no".to_string(), |o| format!("option {}", o)),
                            if c.claimed { "yes" } else { "no" }.to_string(),
                        ]);
                    }
                }
                println!("{}", table);
            }
        }

        RoundCommands::List { active } => {
            let rounds = if active {
                game.active_rounds().await
            } else {
                game.all_rounds().await
            };

            if rounds.is_empty() {
                println!("No rounds found.");
                println!("Create one with: minority round create <creator> <question> <options>...");
                return Ok(());
            }

            let mut table = Table::new();
            table.load_preset(UTF8_FULL);
            table.set_header(vec!["ID", "Question", "Stage", "Options", "Total (ETH)", "Winner"]);
            for r in rounds {
                table.add_row(vec![
                    r.id.to_string(),
                    r.question.clone(),
                    r.stage.as_str().to_string(),
                    r.options.len().to_string(),
                    format_ether(r.total_bets),
                    winner_label(&r),
                ]);
            }
            println!("{}", table);
        }

        RoundCommands::Settlement { round } => {
            let s = game.settlement(round).await?;
            println!("Round {} escrow:", round);
            println!("  Total bets:  {} ETH", format_ether(s.total_bets));
            println!("  Paid out:    {} ETH", format_ether(s.total_paid));
            println!("  Confiscated: {} ETH", format_ether(s.total_confiscated));
            println!("  Outstanding: {} ETH", format_ether(s.outstanding));
            println!("  Dust:        {} wei", s.dust);
        }
    }

    Ok(())
}

fn print_round(round: &Round) {
    println!("Round {}: {}", round.id, round.question);
    println!("  Creator: {}", round.creator);
    println!("  Stage: {}", round.stage.as_str());
    println!("  Created: {}", format_time(round.created_at));
    println!("  Commits close: {}", format_time(round.commit_deadline));
    match round.reveal_deadline {
        Some(deadline) => println!("  Reveals close: {}", format_time(deadline)),
        None => println!("  Reveal window: {} seconds once opened", round.reveal_duration),
    }
    println!("  Total bets: {} ETH", format_ether(round.total_bets));
    println!("  Winner: {}", winner_label(round));
    println!();

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["#", "Option", "Revealed (ETH)"]);
    for (i, (label, total)) in round.options.iter().zip(&round.option_totals).enumerate() {
        table.add_row(vec![i.to_string(), label.clone(), format_ether(*total)]);
    }
    println!("{}", table);
}

fn winner_label(round: &Round) -> String {
    match (round.finalized, round.winning_option) {
        (false, _) => "-".to_string(),
        (true, Some(option)) => format!("{} ({})", option, round.options[option]),
        (true, None) => "none".to_string(),
    }
}

fn format_time(unix: u64) -> String {
    DateTime::<Utc>::from_timestamp(unix as i64, 0)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| unix.to_string())
}
