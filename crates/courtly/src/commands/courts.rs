//! Court catalog handlers.

use tabled::Tabled;

use courtly_core::{AvailabilityController, Court};

use crate::cli::{CourtsArgs, CourtsCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;

use super::util;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct CourtRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Sport")]
    sport: String,
    #[tabled(rename = "Surface")]
    surface: String,
    #[tabled(rename = "Price/h")]
    price: String,
    #[tabled(rename = "Active")]
    active: String,
}

impl From<&Court> for CourtRow {
    fn from(c: &Court) -> Self {
        Self {
            id: c.id.to_string(),
            name: c.name.clone(),
            sport: c.sport.clone(),
            surface: c.surface.clone().unwrap_or_else(|| "-".into()),
            price: c
                .hourly_price
                .map_or_else(|| "-".into(), |p| format!("{p:.2}")),
            active: if c.active { "yes" } else { "no" }.into(),
        }
    }
}

fn detail(c: &Court) -> String {
    [
        format!("ID:       {}", c.id),
        format!("Name:     {}", c.name),
        format!("Sport:    {}", c.sport),
        format!("Surface:  {}", c.surface.as_deref().unwrap_or("-")),
        format!(
            "Price/h:  {}",
            c.hourly_price
                .map_or_else(|| "-".into(), |p| format!("{p:.2}"))
        ),
        format!("Active:   {}", c.active),
    ]
    .join("\n")
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    controller: &AvailabilityController,
    args: CourtsArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        CourtsCommand::List { all } => {
            let mut courts = controller.client().list_courts().await?;
            if !all {
                courts.retain(|c| c.active);
            }
            let out = output::render_list(&global.output, &courts, |c| CourtRow::from(c), |c| {
                c.id.to_string()
            });
            output::print_output(&out, global.quiet);
            Ok(())
        }

        CourtsCommand::Get { court } => {
            let found = util::resolve_court(controller.client(), &court).await?;
            let out = output::render_single(&global.output, &found, detail, |c| c.id.to_string());
            output::print_output(&out, global.quiet);
            Ok(())
        }
    }
}
