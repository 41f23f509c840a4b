//! Hydrogen daemon entry point. CLI parsing, settings/logging/Sentry
//! bring-up, `Runtime` assembly, the gate's launch pass, and the thin
//! heartbeat surface -- the full HTTP/WebSocket/mDNS/print-job protocol
//! bodies live outside this core and aren't implemented here.

#[macro_use]
extern crate slog_scope;

mod logging;
mod runtime;
mod subsystems;
mod web;

use std::error::Error;
use std::sync::Arc;

use actix_web::{web as actix_web_mod, App, HttpServer};
use docopt::Docopt;
use hydrogen_gate::{handle_landing_plan, run_landing_sequence, run_launch_sequence};
use hydrogen_settings::AppConfig;
use serde::Deserialize;

use logging::init_logging;
use runtime::Runtime;
use web::{heartbeat, lbheartbeat, ServerState};

const USAGE: &str = "
Usage: hydrogen-server [options]

Options:
    -h, --help               Show this message.
    --config=CONFIGFILE      Hydrogen configuration file path.
";

#[derive(Debug, Deserialize)]
struct Args {
    flag_config: Option<String>,
}

#[actix_web::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let args: Args = Docopt::new(USAGE)
        .and_then(|d| d.deserialize())
        .unwrap_or_else(|e| e.exit());

    let config = AppConfig::with_env_and_config_file(args.flag_config.as_deref())?;
    init_logging(!config.human_logs);
    debug!("Starting up...");

    let _sentry = sentry::init(sentry::ClientOptions {
        release: sentry::release_name!(),
        ..sentry::ClientOptions::default()
    });

    let banner = config.banner();
    let runtime = Arc::new(Runtime::assemble(config)?);

    let launch = run_launch_sequence(&runtime.gate_registry);
    for report in &launch.reports {
        for line in report.messages.iter().flatten() {
            info!("{}", line; "subsystem" => %report.subsystem);
        }
    }
    if !handle_landing_plan(&launch) {
        error!("no subsystem reported ready at launch; refusing to bind");
        return Ok(());
    }

    info!("Server running on {}", banner);
    let state = actix_web_mod::Data::new(ServerState { runtime: runtime.clone() });
    let bind = (runtime.config.host.clone(), runtime.config.port);
    let server = HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .service(actix_web_mod::resource("/__heartbeat__").route(actix_web_mod::get().to(heartbeat)))
            .service(actix_web_mod::resource("/__lbheartbeat__").route(actix_web_mod::get().to(lbheartbeat)))
    })
    .bind(bind)?
    .run();

    let running = server.handle();
    actix_web::rt::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        running.stop(true).await;
    });
    server.await?;

    runtime.shutdown.trip();
    let landing = run_landing_sequence(&runtime.gate_registry);
    for report in &landing.reports {
        for line in report.messages.iter().flatten() {
            info!("{}", line; "subsystem" => %report.subsystem);
        }
    }
    info!("Server closing");
    logging::reset_logging();

    Ok(())
}
