use anyhow::Result;

mod app;
mod logging;

fn main() -> Result<()> {
    let args = cache_mover::cli::parse();
    app::run(args)
}
