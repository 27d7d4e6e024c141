use eventhive::{AppConfig, build_app};
use log::{debug, error, info};
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("invalid configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let app = match build_app(&config).await {
        Ok(app) => app,
        Err(e) => {
            error!("startup failed: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let port = config.port;
    let served = app
        .listen(port, |addr| {
            info!("EventHive listening on http://{}", addr);
            match local_ip_address::local_ip() {
                Ok(ip) => info!("on your network: http://{}:{}", ip, port),
                Err(e) => debug!("no local network address: {}", e),
            }
        })
        .await;

    match served {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("server stopped: {}", e);
            ExitCode::FAILURE
        }
    }
}
