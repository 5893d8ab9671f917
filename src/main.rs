use anyhow::Result;
use orient_config::AppConfig;
use orient_imu::service::dispatch;
use orient_imu::{
    wire, Call, CallContext, Caller, Driver, DriverError, DriverSettings, Gateway, Listener,
    Notification, NotifyError, Response,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// One line of the input feed.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
enum Input {
    /// A raw reading from the sensor.
    Sample(FeedSample),
    /// A service call from a client.
    Call(CallLine),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FeedSample {
    quaternion: Option<Value>,
    sensor_id: Option<String>,
    timestamp: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct CallLine {
    #[serde(flatten)]
    call: Call,
    caller: Option<Caller>,
}

/// One line of the output stream.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
enum Output<'a> {
    Response(&'a Response),
    Notify {
        target: Option<String>,
        notification: &'a Notification,
    },
    Error {
        message: String,
    },
}

/// Publishes notifications as JSON lines on stdout via the writer task.
struct StdoutGateway {
    tx: mpsc::UnboundedSender<String>,
}

impl Gateway for StdoutGateway {
    fn notify(
        &self,
        notification: &Notification,
        target: Option<&Listener>,
    ) -> Result<(), NotifyError> {
        let line = serde_json::to_string(&Output::Notify {
            target: target.map(|l| l.addr.to_string()),
            notification,
        })?;
        self.tx.send(line).map_err(|_| NotifyError::Closed)
    }
}

fn emit(tx: &mpsc::UnboundedSender<String>, output: &Output<'_>) {
    match serde_json::to_string(output) {
        Ok(line) => {
            if tx.send(line).is_err() {
                warn!("Output stream closed");
            }
        }
        Err(e) => error!(?e, "Failed to encode output"),
    }
}

/// Drain `rx` into `out`, one line per message, until the channel closes or
/// the output fails. Returns the number of lines written.
async fn write_lines<W: AsyncWrite + Unpin>(
    rx: &mut mpsc::UnboundedReceiver<String>,
    mut out: W,
) -> usize {
    let mut written = 0;
    while let Some(mut line) = rx.recv().await {
        line.push('\n');
        if let Err(e) = out.write_all(line.as_bytes()).await {
            error!(?e, "stdout write error");
            break;
        }
        if let Err(e) = out.flush().await {
            error!(?e, "stdout flush error");
            break;
        }
        written += 1;
    }
    written
}

fn handle_input(driver: &Driver, input: Input) -> Result<Option<Response>, DriverError> {
    match input {
        Input::Sample(sample) => {
            let raw = sample
                .quaternion
                .ok_or_else(|| DriverError::InvalidArgument("no quaternion provided".into()))?;
            let q = wire::quaternion_from_value(raw)
                .map_err(|e| DriverError::InvalidArgument(e.to_string()))?;
            driver.sensor_changed(q, sample.sensor_id.as_deref(), sample.timestamp)?;
            Ok(None)
        }
        Input::Call(line) => {
            let context = CallContext {
                caller: line.caller,
            };
            Ok(Some(dispatch(driver, &line.call, &context)))
        }
    }
}

fn settings_from(config: &AppConfig) -> Result<DriverSettings> {
    let driver = config.driver.sanitized();
    Ok(DriverSettings {
        valid_ids: driver.sensor_ids(),
        default_sensor_id: driver.default_sensor_id,
        sensitivity: driver.sensitivity,
        min_update_interval: u64::try_from(driver.min_update_interval_ms)?,
        median_window: driver.median_window,
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr; stdout carries the JSON stream.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "orient_app=info,orient_imu=info,orient_config=info".into()),
        )
        .init();

    info!("Orientation driver starting");

    let config = match std::env::args_os().nth(1) {
        Some(path) => orient_config::load_config_from(Path::new(&path)),
        None => orient_config::load_config(),
    }
    .unwrap_or_else(|e| {
        warn!(?e, "Failed to load config, using defaults");
        AppConfig::default()
    });

    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let writer = tokio::spawn(async move {
        let written = write_lines(&mut rx, tokio::io::stdout()).await;
        debug!(written, "Output writer finished");
    });

    let instance_id = config
        .instance_id
        .clone()
        .unwrap_or_else(|| format!("orient-{}", std::process::id()));
    let gateway = Arc::new(StdoutGateway { tx: tx.clone() });
    let driver = Driver::new(settings_from(&config)?, gateway, instance_id)?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut line_count: u64 = 0;

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    info!("Input closed");
                    break;
                };
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                match serde_json::from_str::<Input>(line) {
                    Ok(input) => match handle_input(&driver, input) {
                        Ok(Some(response)) => emit(&tx, &Output::Response(&response)),
                        Ok(None) => {}
                        Err(e) => {
                            warn!(%e, "Rejected reading");
                            emit(&tx, &Output::Error { message: e.to_string() });
                        }
                    },
                    Err(e) => {
                        warn!(%e, "Malformed input line");
                        emit(&tx, &Output::Error { message: format!("malformed input: {e}") });
                    }
                }

                line_count += 1;
                if line_count % 1000 == 0 {
                    debug!(line_count, "Input lines processed");
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
        }
    }

    driver.destroy();
    drop(driver);
    drop(tx);
    writer.await?;

    Ok(())
}
