use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use inquire::{Confirm, Text};
use openwindow_core::{
    Config, Coordinate, HttpWeatherClient, LocalityRef, LocalityResolver, NominatimResolver,
    PassOutcome, Pipeline, ScoreCalculator, UpdatePolicy, WeatherSource, aggregate, run_updates,
};
use std::{io, path::PathBuf, sync::Arc, thread};
use tokio::sync::mpsc;

use crate::{feed, status::StatusLine};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "openwindow", version, about = "Window comfort score from the weather outside")]
pub struct Cli {
    /// Config file to use instead of the platform default.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Compute the comfort score for a coordinate.
    Score {
        #[arg(long, allow_negative_numbers = true)]
        lat: f64,
        #[arg(long, allow_negative_numbers = true)]
        lon: f64,
    },

    /// Reverse geocode a coordinate to the locality pair used by the weather service.
    Resolve {
        #[arg(long, allow_negative_numbers = true)]
        lat: f64,
        #[arg(long, allow_negative_numbers = true)]
        lon: f64,
    },

    /// Fetch and score the hourly series of a known locality.
    Fetch {
        locality: String,
        sub_locality: String,
    },

    /// Read `lat,lon` lines from stdin and score the first usable one.
    Watch {
        /// Keep reading the feed; every later line re-triggers a pass.
        #[arg(long)]
        continuous: bool,
    },

    /// Interactively set the service addresses and scoring options.
    Configure,

    /// Print the location of the config file.
    ConfigPath,
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        let config_path = match &self.config {
            Some(path) => path.clone(),
            None => Config::config_file_path()?,
        };
        let config = Config::load_from(&config_path)?;

        match self.command {
            Command::Score { lat, lon } => {
                let pipeline = Pipeline::from_config(&config)?;
                let status = StatusLine::new();

                match pipeline.submit(Coordinate::new(lat, lon), &status).await {
                    PassOutcome::Scored { .. } => {}
                    PassOutcome::Failed(kind) => bail!("No score computed ({kind})"),
                    PassOutcome::Dropped => bail!("Pipeline busy"),
                }
            }
            Command::Resolve { lat, lon } => {
                let resolver = NominatimResolver::from_config(&config.geocoder)?;
                let locality = resolver.resolve(Coordinate::new(lat, lon)).await?;
                println!("locality:     {}", locality.locality);
                println!("sub-locality: {}", locality.sub_locality);
            }
            Command::Fetch { locality, sub_locality } => {
                let client = HttpWeatherClient::from_config(&config.weather)?;
                let locality = LocalityRef::new(locality, sub_locality);
                let series = client.fetch(&locality).await?;
                let reading = aggregate(&series)?;

                let calculator = ScoreCalculator::with_clamping(config.scoring.clamp_components);
                let breakdown = calculator.breakdown(&reading);

                println!("{locality}: {} hourly readings", series.len());
                println!("average humidity:    {:.1}%", reading.average_humidity);
                println!("average temperature: {:.1}°C", reading.average_temperature);
                println!("condition:           {}", reading.condition);
                println!(
                    "score:               {} (humidity {:.1}, temperature {:.1}, condition {})",
                    breakdown.total(),
                    breakdown.humidity,
                    breakdown.temperature,
                    breakdown.condition,
                );
            }
            Command::Watch { continuous } => {
                let pipeline = Arc::new(Pipeline::from_config(&config)?);
                let policy =
                    if continuous { UpdatePolicy::Continuous } else { UpdatePolicy::default() };

                let (tx, rx) = mpsc::channel(16);
                // A plain thread so a pending stdin read never blocks runtime shutdown.
                thread::spawn(move || feed::forward_lines(io::stdin().lock(), tx));

                run_updates(pipeline, rx, Arc::new(StatusLine::new()), policy).await;
            }
            Command::Configure => configure(config, &config_path)?,
            Command::ConfigPath => println!("{}", config_path.display()),
        }

        Ok(())
    }
}

fn configure(mut config: Config, path: &std::path::Path) -> anyhow::Result<()> {
    config.weather.base_url = Text::new("Weather service URL:")
        .with_default(&config.weather.base_url)
        .with_help_message("Locality and sub-locality are appended as path segments")
        .prompt()
        .context("Failed to read weather service URL")?;

    config.geocoder.base_url = Text::new("Reverse geocoder URL:")
        .with_default(&config.geocoder.base_url)
        .prompt()
        .context("Failed to read geocoder URL")?;

    let language = Text::new("Place name language (empty for server default):")
        .with_default(config.geocoder.accept_language.as_deref().unwrap_or(""))
        .prompt()
        .context("Failed to read place name language")?;
    config.geocoder.accept_language =
        Some(language.trim().to_string()).filter(|lang| !lang.is_empty());

    config.scoring.clamp_components = Confirm::new("Clamp score components to 0..=100?")
        .with_default(config.scoring.clamp_components)
        .prompt()
        .context("Failed to read clamping choice")?;

    // Fail early on addresses the pipeline could not use.
    Pipeline::from_config(&config)?;

    config.save_to(path)?;
    println!("Saved configuration to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn watch_stops_after_first_fix_unless_continuous() {
        let cli = Cli::try_parse_from(["openwindow", "watch"]).unwrap();
        assert!(matches!(cli.command, Command::Watch { continuous: false }));

        let cli = Cli::try_parse_from(["openwindow", "watch", "--continuous"]).unwrap();
        assert!(matches!(cli.command, Command::Watch { continuous: true }));
    }

    #[test]
    fn negative_coordinates_parse() {
        let args = ["openwindow", "score", "--lat", "-33.86", "--lon", "151.2"];
        let cli = Cli::try_parse_from(args).unwrap();
        assert!(matches!(
            cli.command,
            Command::Score { lat, lon } if lat == -33.86 && lon == 151.2
        ));
    }
}
