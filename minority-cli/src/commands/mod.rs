pub mod config;
pub mod racer;
pub mod round;
pub mod util;

pub use config::{handle_config_command, ConfigCommands};
pub use racer::{handle_racer_command, RacerCommands};
pub use round::{handle_round_command, RoundCommands};
pub use util::{handle_util_command, UtilCommands};
