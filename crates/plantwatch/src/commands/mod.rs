//! Command dispatch: bridges CLI args -> coordinator actions -> output formatting.

pub mod config_cmd;
pub mod sensors;
pub mod status;
pub mod util;

use plantwatch_config::FileSettingsStore;
use plantwatch_core::Coordinator;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a hub-bound command to the appropriate handler.
pub async fn dispatch(
    cmd: Command,
    coordinator: &Coordinator,
    store: &FileSettingsStore,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::Status => status::status(coordinator, global).await,
        Command::Watch => status::watch(coordinator, global).await,
        Command::Water(args) => sensors::water(coordinator, args.id, global).await,
        Command::Unwater(args) => sensors::unwater(coordinator, args.id, global).await,
        Command::Rename(args) => sensors::rename(coordinator, args, global).await,
        Command::Test => status::test(coordinator, store, global).await,
        // Config and Completions are handled before dispatch
        Command::Config(_) | Command::Completions(_) => unreachable!(),
    }
}
