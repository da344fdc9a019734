use std::{fs::File, sync::Arc, time::Duration};

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use daemonize::Daemonize;
use log::{LevelFilter, info, warn};
use syslog::{BasicLogger, Facility, Formatter3164};
use tokio::signal::unix::{SignalKind, signal};

use lumeond::{
    bus::{BusTransport, I2cBus},
    cli::Cli,
    config::Config,
    drivers::ssd1306::{Oled, OledOptions, centered_x},
    fan::Fan,
    fan_curve::FanCurve,
    fan_service::FanService,
    temperature_sensors::{CpuTemperature, DriveTemperature},
};

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

fn init_log() -> Result<()> {
    syslog::unix(Formatter3164 {
        facility: Facility::LOG_DAEMON,
        hostname: None,
        process: "lumeond".into(),
        pid: 0,
    })
    .map_err(|e| anyhow!("{e}"))
    .and_then(|logger| {
        log::set_boxed_logger(Box::new(BasicLogger::new(logger)))
            .map(|_| log::set_max_level(LevelFilter::Info))
            .map_err(|e| anyhow!("{e}"))
    })
}

fn into_daemon() -> Result<()> {
    File::create("/var/tmp/lumeond.log")
        .and_then(|out| Ok((out.try_clone()?, out)))
        .map_err(|e| anyhow!("{e}"))
        .and_then(|(stderr, stdout)| {
            Daemonize::new()
                .stdout(stdout)
                .stderr(stderr)
                .start()
                .map_err(|e| anyhow!("{e}"))
        })
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_log()?;
    let config = Config::load(cli.config.clone())?;
    log::set_max_level(config.log_filter());

    // Fork before any runtime threads exist.
    if cli.daemonize {
        into_daemon()?;
    }

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build async runtime")?
        .block_on(run(config))
}

async fn run(config: Config) -> Result<()> {
    let bus: Arc<dyn BusTransport> = Arc::new(I2cBus::open(&config.i2c.device)?);

    let display = Oled::new(
        bus.clone(),
        OledOptions {
            mirror_horizontal: config.display.mirror_horizontal,
        },
    );
    // A dead panel must not take the fans down with it.
    let display = match splash(&display, config.display.contrast).await {
        Ok(()) => Some(display),
        Err(e) => {
            warn!("display unavailable: {e}");
            None
        }
    };

    let service = FanService::new(
        Fan::new(bus),
        Box::new(CpuTemperature::new()),
        Box::new(DriveTemperature::new()),
        FanCurve::from_points(config.fan.cpu_curve.clone()),
        FanCurve::from_points(config.fan.hdd_curve.clone()),
        Duration::from_secs(config.fan.interval_seconds),
    );

    if config.fan.enabled {
        service.start().await?;
    } else {
        info!("fan control disabled by config");
    }

    wait_for_shutdown_signal().await?;

    service
        .shutdown(SHUTDOWN_TIMEOUT)
        .await
        .context("Failed to shutdown fan control")?;

    if let Some(display) = display {
        if let Err(e) = display.clear().await {
            warn!("failed to clear display on exit: {e}");
        }
    }

    info!("lumeond stopped");
    Ok(())
}

async fn splash(display: &Oled, contrast: u8) -> Result<()> {
    display.init().await?;
    display.set_contrast(contrast).await?;
    display.draw_text("lumeond", centered_x("lumeond"), 26).await?;
    Ok(())
}

async fn wait_for_shutdown_signal() -> Result<()> {
    let mut sigterm =
        signal(SignalKind::terminate()).context("Failed to listen for SIGTERM")?;

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.context("Failed to listen for shutdown signal")?;
            info!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = sigterm.recv() => {
            info!("Received SIGTERM, initiating graceful shutdown...");
        }
    }
    Ok(())
}
