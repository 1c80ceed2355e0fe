//! The `/ticket` command, which shows the category prompt.

use tracing::{Instrument, error, instrument};

use crate::{
    base::types::{Accent, Button, ButtonStyle, Card, Category, InteractionEvent, InteractionReply, Void},
    runtime::Runtime,
};

#[instrument(skip_all)]
pub fn handle_ticket_command(event: InteractionEvent, runtime: Runtime) {
    tokio::spawn(
        async move {
            // Process the event.
            let result = show_category_prompt(&event, &runtime).await;

            // Log any errors.
            if let Err(err) = &result {
                error!("Error while handling: {:#}", err);
            }
        }
        .in_current_span(),
    );
}

/// Replies with one button per category, visible only to the invoking user.
pub async fn show_category_prompt(event: &InteractionEvent, runtime: &Runtime) -> Void {
    runtime.chat.reply(&event.reference, &category_prompt()).await
}

pub fn category_prompt() -> InteractionReply {
    let card = Card::new(Accent::Success)
        .with_title("Create a Ticket")
        .with_description("Please select a category for your ticket:");

    let buttons = Category::ALL
        .into_iter()
        .map(|category| Button::new(category.button_id(), category.label(), ButtonStyle::Primary))
        .collect();

    InteractionReply::card(card).with_buttons(buttons).ephemeral()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_offers_every_category() {
        let prompt = category_prompt();

        assert!(prompt.ephemeral);
        assert_eq!(prompt.card.unwrap().title.as_deref(), Some("Create a Ticket"));

        let ids: Vec<_> = prompt.buttons.iter().map(|b| b.custom_id.as_str()).collect();
        assert_eq!(ids, vec!["create_ticket_Technical Support", "create_ticket_HWID Reset", "create_ticket_Selling"]);
    }
}
