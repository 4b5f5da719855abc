use clap::Parser;
use imanalyze::Opts;
use imanalyze::cli::SubCommandExtend;
use imanalyze::config::SubCommand;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // 缺少 API key 时 clap 会直接报错退出
    let opts = Opts::parse();

    match &opts.subcmd {
        SubCommand::Analyze(config) => config.run(&opts).await,
        SubCommand::Server(config) => config.run(&opts).await,
    }
}
