use anyhow::Result;
use debtscraper::{logging, viz, Config};

fn main() -> Result<()> {
    logging::init();
    let config = Config::load()?;
    viz::line_chart_explore_interest(&config)?;
    Ok(())
}
