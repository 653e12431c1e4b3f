//! Scripted responses for the simulated terminal.

use super::terminal::MockTerminalHandle;
use crate::{
    error::{TerminalError, TerminalErrorCode},
    types::{DiscoveryConfiguration, ReaderSoftwareUpdate},
};
use readerlink_core::{Reader, ReaderDisplayMessage, ReaderInputOption, ReaderType};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info};

/// Behaviour of a terminal built with `MockTerminal::simulated`.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatedTerminalConfig {
    /// Readers reported by every simulated scan.
    pub readers: Vec<Reader>,

    /// Delay before the reader list is reported, and again before the scan ends.
    pub discovery_delay: Duration,

    /// Delay before a connect or disconnect request is answered.
    pub connect_delay: Duration,

    /// Fail every connect request with a Bluetooth error.
    pub fail_connect: bool,

    /// Battery level given to readers that do not report their own.
    pub battery_level: Option<f32>,

    /// Offer this firmware update right after connecting.
    pub available_update: Option<ReaderSoftwareUpdate>,

    /// Number of progress reports between start and finish of an installation.
    pub update_steps: u32,

    /// Delay between installation progress reports.
    pub update_step_delay: Duration,

    /// Abort installations halfway with this error code.
    pub update_failure: Option<TerminalErrorCode>,

    /// Messages the reader shows after connecting, in order.
    pub display_messages: Vec<ReaderDisplayMessage>,

    /// Input options requested after the display messages. Empty skips the request.
    pub input_options: Vec<ReaderInputOption>,

    /// Delay between reader prompts.
    pub prompt_delay: Duration,
}

impl Default for SimulatedTerminalConfig {
    fn default() -> Self {
        Self {
            readers: vec![
                Reader {
                    id: "CHB204909005931".to_string(),
                    reader_type: ReaderType::Chipper2X,
                    location_id: None,
                    firmware_version: Some("1.00.03.34".to_string()),
                    battery_level: Some(0.8),
                },
                Reader {
                    id: "STRM26138003393".to_string(),
                    reader_type: ReaderType::StripeM2,
                    location_id: Some("tml_simulated".to_string()),
                    firmware_version: Some("2.00.01.18".to_string()),
                    battery_level: Some(0.45),
                },
            ],
            discovery_delay: Duration::from_millis(500),
            connect_delay: Duration::from_millis(800),
            fail_connect: false,
            battery_level: Some(0.75),
            available_update: Some(ReaderSoftwareUpdate::new(
                "1.00.03.40",
                Duration::from_secs(120),
            )),
            update_steps: 10,
            update_step_delay: Duration::from_millis(300),
            update_failure: None,
            display_messages: vec![
                ReaderDisplayMessage::InsertOrSwipeCard,
                ReaderDisplayMessage::RemoveCard,
            ],
            input_options: vec![
                ReaderInputOption::Insert,
                ReaderInputOption::Swipe,
                ReaderInputOption::Tap,
            ],
            prompt_delay: Duration::from_millis(200),
        }
    }
}

pub(super) async fn run_discovery(
    handle: MockTerminalHandle,
    config: SimulatedTerminalConfig,
    discovery: DiscoveryConfiguration,
) {
    if !discovery.is_simulated {
        handle.fail_discovery(TerminalError::new(
            TerminalErrorCode::BluetoothDisabled,
            "Bluetooth scanning is not available on a simulated terminal",
        ));
        return;
    }

    if let Some(timeout) = discovery.timeout
        && timeout < config.discovery_delay
    {
        sleep(timeout).await;
        handle.fail_discovery(TerminalError::new(
            TerminalErrorCode::BluetoothScanTimedOut,
            format!("No readers found within {}ms", timeout.as_millis()),
        ));
        return;
    }

    sleep(config.discovery_delay).await;
    if !handle.report_readers(config.readers.clone()) {
        debug!("Simulated scan canceled before reporting readers");
        return;
    }

    sleep(config.discovery_delay).await;
    handle.complete_discovery();
}

pub(super) async fn run_connect(handle: MockTerminalHandle, config: SimulatedTerminalConfig) {
    sleep(config.connect_delay).await;

    if config.fail_connect {
        handle
            .reject_connect(TerminalError::new(
                TerminalErrorCode::BluetoothConnectionFailed,
                "Simulated connection failure",
            ))
            .await;
        return;
    }

    let reader = handle.accept_connect().await;
    info!(reader = %reader.id, "Simulated reader connected");

    if let Some(update) = config.available_update {
        handle.report_available_update(update);
    }

    for message in config.display_messages {
        sleep(config.prompt_delay).await;
        if !handle.display_message(message) {
            return;
        }
    }

    if !config.input_options.is_empty() {
        sleep(config.prompt_delay).await;
        handle.request_input(config.input_options);
    }
}

pub(super) async fn run_disconnect(handle: MockTerminalHandle, config: SimulatedTerminalConfig) {
    sleep(config.connect_delay).await;
    handle.accept_disconnect().await;
}

pub(super) async fn run_install(handle: MockTerminalHandle, config: SimulatedTerminalConfig) {
    if !handle.start_installing() {
        debug!("Simulated install requested without a connected reader");
        return;
    }

    let steps = config.update_steps.max(1);
    let last_step = match config.update_failure {
        Some(_) => steps / 2,
        None => steps,
    };

    for step in 0..=last_step {
        sleep(config.update_step_delay).await;
        // Stops when the installation was canceled or the link dropped
        if !handle.report_progress(step as f32 / steps as f32) {
            return;
        }
    }

    sleep(config.update_step_delay).await;
    let error = config
        .update_failure
        .map(|code| TerminalError::new(code, "Simulated update failure"));
    if handle.is_installing() {
        handle.finish_installing(error);
    }
}
