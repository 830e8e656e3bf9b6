use log::error;
use timetable_mcts::server;

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = server::run_server().await {
        error!("{}", e);
        std::process::exit(1);
    }
}
