//! Location feed read from stdin, one `lat,lon` per line.

use anyhow::{Context, Result, anyhow};
use openwindow_core::Coordinate;
use std::io::BufRead;
use tokio::sync::mpsc;
use tracing::{debug, warn};

pub fn parse_coordinate(line: &str) -> Result<Coordinate> {
    let mut parts = line
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|p| !p.is_empty());

    let (Some(lat), Some(lon), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(anyhow!("Expected `lat,lon`, got {line:?}"));
    };

    let latitude: f64 = lat.parse().with_context(|| format!("Invalid latitude {lat:?}"))?;
    let longitude: f64 = lon.parse().with_context(|| format!("Invalid longitude {lon:?}"))?;

    if !(-90.0..=90.0).contains(&latitude) {
        return Err(anyhow!("Latitude {latitude} out of range"));
    }
    if !(-180.0..=180.0).contains(&longitude) {
        return Err(anyhow!("Longitude {longitude} out of range"));
    }

    Ok(Coordinate::new(latitude, longitude))
}

/// Forward coordinates from `input` until it ends or the receiver closes the
/// feed. Blocking; run it on a dedicated thread.
pub fn forward_lines(input: impl BufRead, tx: mpsc::Sender<Coordinate>) {
    for line in input.lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                warn!(error = %e, "failed to read location feed");
                break;
            }
        };
        if line.trim().is_empty() || line.trim_start().starts_with('#') {
            continue;
        }

        match parse_coordinate(&line) {
            Ok(coordinate) => {
                if tx.blocking_send(coordinate).is_err() {
                    debug!("location feed closed by pipeline");
                    break;
                }
            }
            Err(e) => warn!("skipping feed line: {e:#}"),
        }
    }
}
