//! Booking flow: derive the board, validate the slot, submit.

use chrono::Local;

use courtly_core::{AvailabilityController, BookingDraft, Session, SlotQuery, derive_once};

use crate::cli::{BookArgs, GlobalOpts};
use crate::error::CliError;
use crate::output;

use super::util;

pub async fn handle(
    controller: &AvailabilityController,
    session: Option<&Session>,
    args: BookArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let Some(session) = session else {
        return Err(CliError::Validation {
            field: "profile".into(),
            reason: "booking requires a profile with user_ref set".into(),
        });
    };

    let court = util::resolve_court(controller.client(), &args.court).await?;
    let date = util::parse_date_or_today(args.date.as_deref())?;
    let start = util::parse_start(&args.start)?;

    // Derive the current board before touching the service: past and
    // occupied slots are refused here, without a round trip.
    let query = SlotQuery::new(date, court.id, Local::now().naive_local());
    let slots = derive_once(controller.client(), controller.window(), &query).await?;

    let window = controller.window();
    let slot = slots
        .iter()
        .find(|s| s.start == start)
        .copied()
        .ok_or_else(|| CliError::Validation {
            field: "start".into(),
            reason: format!(
                "no slot starts at {start}; operating hours are {}:00 to {}:00",
                window.open_hour, window.close_hour
            ),
        })?;

    let mut draft = BookingDraft::new(court.id, date);
    draft.select_slot(slot)?;
    let request = draft.to_request(session)?;

    let prompt = format!(
        "Book {} on {} ({date}) as {}?",
        slot.label(),
        court.name,
        session.user_ref
    );
    if !util::confirm(&prompt, global.yes)? {
        eprintln!("Aborted.");
        return Ok(());
    }

    let record = controller.client().create_reservation(&request).await?;

    let out = output::render_single(
        &global.output,
        &record,
        |r| {
            format!(
                "Booked: reservation {} holds {} on court {} ({})",
                r.id,
                slot.label(),
                r.court_id,
                r.date
            )
        },
        |r| r.id.to_string(),
    );
    output::print_output(&out, global.quiet);
    Ok(())
}
