use clap::{Arg, Command};
use std::{panic, process};

pub mod app;
pub mod config;
pub mod decoder;
pub mod pipeline;
pub mod render;
pub mod telemetry;
pub mod utils;
pub mod video;

use crate::utils::stop::StopSignal;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let matches = Command::new(config::app_name())
        .version(config::version())
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .arg(
            Arg::new("broker")
                .short('b')
                .long("broker")
                .value_name("HOST")
                .help("MQTT broker host.")
                .default_value(config::BROKER_HOST),
        )
        .arg(
            Arg::new("broker-port")
                .long("broker-port")
                .value_name("PORT")
                .help("MQTT broker port.")
                .value_parser(clap::value_parser!(u16))
                .default_value("1883"),
        )
        .arg(
            Arg::new("video-port")
                .short('p')
                .long("video-port")
                .value_name("PORT")
                .help("UDP port the RTP video stream arrives on.")
                .value_parser(clap::value_parser!(u16))
                .default_value("5000"),
        )
        .arg(
            Arg::new("fps")
                .long("fps")
                .value_name("RATE")
                .help("Presentation rate in ticks per second.")
                .value_parser(clap::value_parser!(u32).range(1..=120))
                .default_value("30"),
        )
        .get_matches();

    let mut cfg = config::Config::default();
    if let Some(host) = matches.get_one::<String>("broker") {
        cfg.broker_host = host.clone();
    }
    if let Some(port) = matches.get_one::<u16>("broker-port") {
        cfg.broker_port = *port;
    }
    if let Some(port) = matches.get_one::<u16>("video-port") {
        cfg.video_port = *port;
    }
    if let Some(fps) = matches.get_one::<u32>("fps") {
        cfg.frame_rate = *fps;
    }

    // kill the main thread as soon as a secondary thread panics
    let orig_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        // invoke the default handler and exit the process
        orig_hook(panic_info);
        process::exit(105);
    }));

    // gracefully close the app when receiving SIGINT or SIGTERM
    let stop = StopSignal::new();
    {
        let stop = stop.clone();
        ctrlc::set_handler(move || {
            stop.cancel();
        })
        .expect("Error setting Ctrl-C handler");
    }

    app::run(cfg, stop)
}
