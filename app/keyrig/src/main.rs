use aether::logging;
use chrono::Local;
use clap::{App, Arg};
use plkg::csi::Aggregator;
use plkg::medium::PublicChannel;
use plkg::orchestrator::Actor;
use plkg::queue::Inbox;
use plkg::radio::{RadioControl, RadioLink, TrafficLog};
use plkg::report::{EndpointReport, SessionReport};
use plkg::support::{PlkgResult, Role};
use std::fs;
use std::process;
use std::sync::{Arc, Mutex};
use std::thread;

mod config;
mod recorder;

use crate::config::RigConfig;
use crate::recorder::CsvRecorder;

const ROLES: [Role; 3] = [Role::Initiator, Role::Responder, Role::Eavesdropper];

fn main() {
    let matches = App::new("Key Generation Rig")
        .version("1.0")
        .author("Bush Hammer Industries")
        .about("Drives a three-radio physical-layer key generation session.")
        .arg(Arg::with_name("CONFIG_FILE").help("Path to the rig configuration file"))
        .arg(
            Arg::with_name("print-config")
                .long("print-config")
                .help("Print the default configuration as TOML and exit"),
        )
        .get_matches();

    if matches.is_present("print-config") {
        print!("{}", RigConfig::default().to_toml());
        return;
    }

    let config = match matches.value_of("CONFIG_FILE") {
        Some(path) => RigConfig::load(path),
        None => RigConfig::default(),
    };

    let log = logging::init();

    logging::info!(log, "starting key generation rig";
                   "initiator" => config.initiator.port.as_str(),
                   "responder" => config.responder.port.as_str(),
                   "eavesdropper" => config.eavesdropper.port.as_str());

    let mut handles = Vec::new();
    for &role in &ROLES {
        match spawn_endpoint(role, &config, &log) {
            Ok(handle) => handles.push(handle),
            Err(err) => {
                logging::crit!(log, "endpoint setup failed";
                               "role" => role.name(),
                               "error" => ?err);
                process::exit(1);
            }
        }
    }

    let mut reports = handles
        .into_iter()
        .map(|handle| handle.join().expect("Endpoint thread panicked"));

    let report = SessionReport {
        initiator: reports.next().unwrap(),
        responder: reports.next().unwrap(),
        eavesdropper: reports.next().unwrap(),
    };

    print!("{}", report.render());
    process::exit(report.exit_code());
}

/// Wires one endpoint (aggregator, inbox, optional CSV recorder, radio
/// link) and launches its session actor.
fn spawn_endpoint(
    role: Role,
    config: &RigConfig,
    log: &logging::Logger,
) -> PlkgResult<thread::JoinHandle<EndpointReport>> {
    let endpoint = config.endpoint(role);

    let aggregator = Arc::new(Mutex::new(Aggregator::new(config.session.window)));
    let inbox = Arc::new(Inbox::new());

    let traffic: Option<Arc<dyn TrafficLog>> = match &config.capture_dir {
        Some(dir) => {
            fs::create_dir_all(dir)?;

            let stamp = Local::now().format("%Y%m%d_%H%M%S");
            let path = format!("{}/traffic_{}_{}.csv", dir, role.name(), stamp);
            Some(Arc::new(CsvRecorder::create(path)?))
        }
        None => None,
    };

    let link = Arc::new(RadioLink::open(
        &endpoint.port,
        endpoint.baud,
        role,
        config.wifi.clone(),
        aggregator.clone(),
        inbox.clone(),
        traffic,
        log,
    )?);

    let channel: Arc<dyn PublicChannel> = link.clone();
    let radio: Arc<dyn RadioControl> = link;

    let actor = Actor::new(role, config.session.clone(), aggregator, inbox, channel, radio, log);

    thread::Builder::new()
        .name(format!("{}-actor", role.name()))
        .spawn(move || actor.run())
        .map_err(Into::into)
}
