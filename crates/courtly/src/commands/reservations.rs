//! Reservation handlers.

use tabled::Tabled;

use courtly_core::{
    AvailabilityController, ReservationFilter, ReservationId, ReservationRecord,
    ReservationStatus, Session,
};

use crate::cli::{GlobalOpts, ReservationsArgs, ReservationsCommand, StatusFilter};
use crate::error::CliError;
use crate::output;

use super::util;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct ReservationRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Court")]
    court: String,
    #[tabled(rename = "Date")]
    date: String,
    #[tabled(rename = "Slot")]
    slot: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Booked by")]
    user: String,
}

impl From<&ReservationRecord> for ReservationRow {
    fn from(r: &ReservationRecord) -> Self {
        Self {
            id: r.id.to_string(),
            court: r.court_id.to_string(),
            date: r.date.to_string(),
            slot: format!("{} - {}", r.start_time, r.end_time),
            status: r.status.to_string(),
            user: r.user_ref.clone(),
        }
    }
}

impl From<StatusFilter> for ReservationStatus {
    fn from(f: StatusFilter) -> Self {
        match f {
            StatusFilter::Pending => Self::Pending,
            StatusFilter::Confirmed => Self::Confirmed,
            StatusFilter::Cancelled => Self::Cancelled,
        }
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    controller: &AvailabilityController,
    session: Option<&Session>,
    args: ReservationsArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        ReservationsCommand::List {
            date,
            court,
            status,
            mine,
        } => {
            let mut filter = ReservationFilter {
                date: date.as_deref().map(util::parse_date).transpose()?,
                status: status.map(Into::into),
                ..ReservationFilter::default()
            };
            if let Some(identifier) = court.as_deref() {
                let found = util::resolve_court(controller.client(), identifier).await?;
                filter.court = Some(found.id);
            }
            if mine {
                let Some(session) = session else {
                    return Err(CliError::Validation {
                        field: "mine".into(),
                        reason: "the active profile has no user_ref".into(),
                    });
                };
                filter.user_ref = Some(session.user_ref.clone());
            }

            let records = controller.client().list_reservations(&filter).await?;
            let out = output::render_list(&global.output, &records, |r| ReservationRow::from(r), |r| {
                r.id.to_string()
            });
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ReservationsCommand::Cancel { reservation } => {
            let id: ReservationId = reservation.parse().map_err(|_| CliError::Validation {
                field: "reservation".into(),
                reason: format!("expected a numeric reservation ID, got '{reservation}'"),
            })?;

            let record = controller.client().get_reservation(id).await?;

            // Local role gate; the service applies the same rule.
            if let Some(session) = session {
                if !session.may_cancel(&record) {
                    return Err(CliError::Forbidden {
                        message: format!(
                            "reservation {id} belongs to '{}'; only staff may cancel \
                             other members' bookings",
                            record.user_ref
                        ),
                    });
                }
            }

            let prompt = format!(
                "Cancel reservation {id} ({} court {} at {})?",
                record.date, record.court_id, record.start_time
            );
            if !util::confirm(&prompt, global.yes)? {
                eprintln!("Aborted.");
                return Ok(());
            }

            let cancelled = controller.client().cancel_reservation(id).await?;
            if !global.quiet {
                eprintln!("Reservation {} cancelled", cancelled.id);
            }
            Ok(())
        }
    }
}
