//! Crop forecast command.

use taja_haat_client::integrations::{ForecastClient, ForecastSource};

use super::context::{CliResult, Context};
use super::say;

/// Print the crop forecast for `region`, and the market insight if asked.
///
/// # Errors
///
/// Returns an error if the forecast client cannot be built.
pub async fn run(ctx: &Context, region: &str, insights: bool) -> CliResult {
    let client = ForecastClient::new(ctx.config.forecast.clone())?;

    let forecast = client.forecast(region).await;
    if forecast.source == ForecastSource::Fallback {
        say("(Live forecast unavailable; showing typical figures.)");
    }
    say(format!("{:<12} {:>10} {:>10} {:>10}", "Crop", "Demand", "Supply", "Gap"));
    for crop in &forecast.crops {
        say(format!(
            "{:<12} {:>10} {:>10} {:>+10}  {}",
            crop.crop,
            crop.demand,
            crop.supply,
            crop.gap(),
            crop.unit
        ));
    }

    if insights {
        let insight = client.insight(region).await;
        say("");
        say(insight.text);
    }
    Ok(())
}
