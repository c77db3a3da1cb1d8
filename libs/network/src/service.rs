//! Worker-mode command loop
//!
//! Receive a command, dispatch it, reply, repeat. Only `Command` records are
//! acted on; anything else is logged and skipped. The upstream link closing,
//! between commands or while one runs, ends the loop normally.

use crate::communicator::{Incoming, WorkerCommunicator};
use crate::error::{Result, TransportError};
use dispatch::Dispatcher;
use tracing::{debug, info, warn};
use types::Command;

/// Serve commands until the upstream link closes
///
/// A closed upstream ends the loop normally; other transport failures are
/// returned.
pub async fn serve_commands(
    communicator: &mut WorkerCommunicator,
    dispatcher: &Dispatcher,
) -> Result<()> {
    loop {
        let Incoming { origin, record } = match communicator.receive().await {
            Ok(incoming) => incoming,
            Err(TransportError::Closed) => {
                info!("Upstream connection closed");
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        let command = match record.downcast::<Command>() {
            Ok(command) => command,
            Err(other) => {
                warn!(
                    ?origin,
                    type_name = other.type_name(),
                    "Ignoring record that is not a command"
                );
                continue;
            }
        };

        let opcode = command.opcode;
        debug!(?origin, %opcode, "Dispatching command");
        let result = dispatcher.dispatch(command).await;
        match communicator.reply(&origin, &result) {
            Ok(()) => {}
            Err(TransportError::Closed) => {
                info!(%opcode, "Upstream connection closed before the result was sent");
                return Ok(());
            }
            Err(e) => return Err(e),
        }
    }
}
