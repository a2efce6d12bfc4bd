use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::Path;
use tracing::info;

use tradelab::cli::{print_success, GenerateKind};
use tradelab::error::Result;
use tradelab::rl::{CointegratedGenerator, PriceGenerator};

pub(crate) fn run_generate(
    kind: GenerateKind,
    rows: usize,
    seed: u64,
    start: NaiveDate,
    output: &Path,
) -> Result<()> {
    let mut rng = StdRng::seed_from_u64(seed);
    let series = match kind {
        GenerateKind::Synthetic => {
            PriceGenerator::default().generate_returns(rows, "SYNTH", &mut rng)?
        }
        GenerateKind::Cointegrated => {
            CointegratedGenerator::default().generate_returns(rows, &mut rng)?
        }
    }
    .with_business_dates(start);

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    series.to_csv(output, "date")?;

    info!(?kind, rows, seed, output = %output.display(), "Synthetic series written");
    print_success(&format!(
        "Wrote {} rows of {} to {}",
        series.len(),
        series.assets().join(", "),
        output.display()
    ));
    Ok(())
}
