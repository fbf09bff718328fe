use crate::config::CliConfig;
use anyhow::Result;
use clap::Subcommand;
use comfy_table::{presets::UTF8_FULL, Table};
use minority_core::units::format_gwei;
use minority_core::{Address, ChainClient, FeeParams, JsonRpcClient, Selector, H256};
use minority_game::{compute_commit_hash, generate_secret};

#[derive(Subcommand)]
pub enum UtilCommands {
    /// Print the 4-byte selector of a function signature
    Selector {
        /// Canonical signature, e.g. "transfer(address,uint256)"
        signature: String,
    },
    /// Compute a commit hash the way the game contract does
    CommitHash {
        round: u64,
        choice: usize,
        /// 32-byte secret as hex
        secret: String,
        participant: String,
    },
    /// Generate a random 32-byte secret
    Secret,
    /// Show the node's pending transactions
    Pending {
        /// Only calls to this contract
        #[arg(long)]
        contract: Option<String>,
    },
}

pub async fn handle_util_command(cmd: UtilCommands, config: &CliConfig) -> Result<()> {
    match cmd {
        UtilCommands::Selector { signature } => {
            println!("{}", Selector::from_signature(&signature));
        }

        UtilCommands::CommitHash {
            round,
            choice,
            secret,
            participant,
        } => {
            let secret: H256 = secret.parse()?;
            let participant: Address = participant.parse()?;
            println!("{}", compute_commit_hash(round, choice, &secret, &participant));
        }

        UtilCommands::Secret => {
            println!("{}", generate_secret());
        }

        UtilCommands::Pending { contract } => {
            let contract = contract.map(|c| c.parse::<Address>()).transpose()?;
            let client = JsonRpcClient::new(&config.node)?;
            let pending: Vec<_> = client
                .pending_transactions()
                .await?
                .into_iter()
                .filter(|tx| contract.is_none() || tx.to == contract)
                .collect();

            if pending.is_empty() {
                println!("No pending transactions.");
                return Ok(());
            }

            let mut table = Table::new();
            table.load_preset(UTF8_FULL);
            table.set_header(vec!["Hash", "From", "To", "Selector", "Fees (gwei)"]);
            for tx in &pending {
                let selector = tx
                    .input
                    .get(..Selector::LEN)
                    .map_or("-".to_string(), hex::encode);
                table.add_row(vec![
                    tx.hash.to_string(),
                    tx.from.short(),
                    tx.to.map_or("(deploy)".to_string(), |a| a.short()),
                    selector,
                    describe_fees(tx.fees),
                ]);
            }
            println!("{}", table);
            println!("{} pending", pending.len());
        }
    }

    Ok(())
}

fn describe_fees(fees: Option<FeeParams>) -> String {
    match fees {
        Some(FeeParams::Legacy { gas_price }) => format!("{} legacy", format_gwei(gas_price)),
        Some(FeeParams::Eip1559 {
            max_fee_per_gas,
            max_priority_fee_per_gas,
        }) => format!(
            "{} / {} tip",
            format_gwei(max_fee_per_gas),
            format_gwei(max_priority_fee_per_gas)
        ),
        None => "-".to_string(),
    }
}
