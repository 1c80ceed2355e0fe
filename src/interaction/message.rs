use tracing::{Instrument, error, instrument};

use crate::{base::types::InboundMessage, relay, runtime::Runtime};

/// Relays a newly created message if it belongs to an open ticket.
///
/// Failures are logged; there is no interaction to report them on.
#[instrument(skip_all, fields(message_id = message.reference.message_id))]
pub fn handle_message(message: InboundMessage, runtime: Runtime) {
    tokio::spawn(
        async move {
            // Process the event.
            let result = relay::relay_message(&runtime, &message).await;

            // Log any errors.
            if let Err(err) = &result {
                error!("Error relaying message {}: {:#}", message.reference.message_id, err);
            }
        }
        .in_current_span(),
    );
}
