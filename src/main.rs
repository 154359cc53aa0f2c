use clap::Parser;
use ruleward::{
    cli::{Args, run},
    error::RulewardError,
};

#[tokio::main]
async fn main() -> Result<(), RulewardError> {
    env_logger::init();

    let args = Args::parse();

    let exit_code = run(args).await.inspect_err(|err| {
        log::error!("{}", err.user_message());
    })?;
    std::process::exit(exit_code);
}
