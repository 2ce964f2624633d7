//! Command dispatch: bridges CLI args -> core operations -> output formatting.

pub mod book;
pub mod config_cmd;
pub mod courts;
pub mod reservations;
pub mod slots;
pub mod util;

use courtly_core::{AvailabilityController, Session};

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a service-bound command to the appropriate handler.
pub async fn dispatch(
    cmd: Command,
    controller: &AvailabilityController,
    session: Option<&Session>,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::Courts(args) => courts::handle(controller, args, global).await,
        Command::Slots(args) => slots::handle(controller, args, global).await,
        Command::Reservations(args) => {
            reservations::handle(controller, session, args, global).await
        }
        Command::Book(args) => book::handle(controller, session, args, global).await,
        // Config and Completions are handled before dispatch
        Command::Config(_) | Command::Completions(_) => unreachable!(),
    }
}
