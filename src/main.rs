use clap::Parser;
use color_eyre::Result;
use media_command_center::{
    init_errors,
    init_logging,
    App,
};
use mcc_config::Args;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_errors()?;
    init_logging(args.verbose)?;
    App::new(args)?.run().await
}
