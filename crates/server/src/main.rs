use std::process;

use clap::Parser;

use facedetect_server::config::Config;
use facedetect_server::lifecycle;

#[tokio::main]
async fn main() {
    // a missing .env is normal outside development
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::parse();
    if let Err(e) = lifecycle::run(config).await {
        log::error!("Startup failed: {e}");
        process::exit(1);
    }
}
