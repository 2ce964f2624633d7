//! Availability board handlers.

use chrono::{Local, NaiveDate, NaiveDateTime};
use tabled::Tabled;

use courtly_core::{
    AvailabilityController, BoardStatus, SlotBoard, SlotQuery, TimeSlot, derive_once,
};

use crate::cli::{GlobalOpts, OutputFormat, SlotsArgs, SlotsCommand, SlotsSelector};
use crate::error::CliError;
use crate::output;

use super::util;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct SlotRow {
    #[tabled(rename = "Slot")]
    slot: String,
    #[tabled(rename = "Status")]
    status: String,
}

/// Display status for one slot. The pipeline only says unavailable;
/// the label tells bookers why.
fn slot_status(slot: &TimeSlot, date: NaiveDate, now: NaiveDateTime) -> &'static str {
    if slot.available {
        "Open"
    } else if date == now.date() && slot.start.on(date) <= now {
        "Past"
    } else {
        "Booked"
    }
}

fn slot_row(slot: &TimeSlot, date: NaiveDate, now: NaiveDateTime) -> SlotRow {
    SlotRow {
        slot: slot.label(),
        status: slot_status(slot, date, now).into(),
    }
}

fn plain_line(slot: &TimeSlot) -> String {
    let state = if slot.available { "open" } else { "booked" };
    format!("{} {state}", slot.start)
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    controller: &AvailabilityController,
    args: SlotsArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        SlotsCommand::List(sel) => {
            let query = selector_query(controller, &sel).await?;
            let slots = derive_once(controller.client(), controller.window(), &query).await?;

            let out = output::render_list(
                &global.output,
                &slots,
                |s| slot_row(s, query.date, query.reference_now),
                plain_line,
            );
            output::print_output(&out, global.quiet);
            print_summary(&slots, global);
            Ok(())
        }

        SlotsCommand::Watch(sel) => {
            let query = selector_query(controller, &sel).await?;

            let mut stream = controller.subscribe();
            controller.set_query(query).await;

            if !global.quiet {
                eprintln!(
                    "Watching court {} on {} (Ctrl-C to stop)",
                    query.court, query.date
                );
            }

            loop {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => break,
                    changed = stream.changed() => {
                        let Some(board) = changed else { break };
                        render_frame(&board, global);
                    }
                }
            }

            controller.clear_query().await;
            Ok(())
        }
    }
}

async fn selector_query(
    controller: &AvailabilityController,
    sel: &SlotsSelector,
) -> Result<SlotQuery, CliError> {
    let court = util::resolve_court(controller.client(), &sel.court).await?;
    let date = util::parse_date_or_today(sel.date.as_deref())?;
    Ok(SlotQuery::new(date, court.id, Local::now().naive_local()))
}

/// Render one watch update. A failed run keeps the previous grid on
/// screen; only a warning line is added.
fn render_frame(board: &SlotBoard, global: &GlobalOpts) {
    match &board.status {
        BoardStatus::Loading => {
            if !global.quiet {
                eprintln!("... loading");
            }
        }
        BoardStatus::Ready => {
            let Some(target) = board.target else { return };
            let now = Local::now().naive_local();
            let out = output::render_list(
                &global.output,
                &board.slots,
                |s| slot_row(s, target.date, now),
                plain_line,
            );
            output::print_output(&out, global.quiet);
            print_summary(&board.slots, global);
        }
        BoardStatus::Failed { reason } => {
            eprintln!("update failed: {reason} (showing last good board)");
        }
        BoardStatus::Idle => {}
    }
}

fn print_summary(slots: &[TimeSlot], global: &GlobalOpts) {
    if global.quiet || !matches!(global.output, OutputFormat::Table) {
        return;
    }
    let open = slots.iter().filter(|s| s.available).count();
    let color = output::should_color(&global.color);
    println!(
        "{}",
        output::availability_summary(open, slots.len(), color)
    );
}
