//! Terminal output for readerlink

use readerlink_core::{DiscoveryEvent, Reader, ReaderPrompt, SoftwareUpdateStatus};

pub fn print_discovery_event(event: &DiscoveryEvent) {
    match event {
        DiscoveryEvent::Started => println!("Scanning for readers..."),
        DiscoveryEvent::ReadersFound(readers) => {
            println!("Found {} reader(s):", readers.len());
            for reader in readers {
                println!("  {}", describe_reader(reader));
            }
        }
        DiscoveryEvent::Succeeded => println!("Scan finished"),
        DiscoveryEvent::Failed(message) => println!("Scan failed: {message}"),
    }
}

pub fn describe_reader(reader: &Reader) -> String {
    let mut line = reader.to_string();
    if let Some(location) = reader.location() {
        line.push_str(&format!(" @ {location}"));
    }
    if let Some(version) = &reader.firmware_version {
        line.push_str(&format!(" fw {version}"));
    }
    if let Some(percent) = reader.battery_percent() {
        line.push_str(&format!(" battery {percent}%"));
    }
    line
}

pub fn print_prompt(prompt: &ReaderPrompt) {
    match prompt {
        ReaderPrompt::DisplayMessage(message) => println!("[reader] {message}"),
        ReaderPrompt::InputRequest(options) => {
            let options: Vec<String> = options.iter().map(ToString::to_string).collect();
            println!("[reader] {}", options.join(" / "));
        }
        ReaderPrompt::NoMessage => println!("[reader] (cleared)"),
    }
}

pub fn print_update_status(status: &SoftwareUpdateStatus) {
    match status {
        SoftwareUpdateStatus::Unknown => {}
        SoftwareUpdateStatus::InstallationStarted => println!("Update: installation started"),
        SoftwareUpdateStatus::Installing { .. } => {
            let percent = status.progress_percent().unwrap_or_default();
            println!("Update: {percent:>3}% {}", progress_bar(percent));
        }
        SoftwareUpdateStatus::Success => println!("Update: installed"),
        SoftwareUpdateStatus::Failed { reason, message } => {
            println!("Update: failed, {reason} ({message})")
        }
    }
}

fn progress_bar(percent: u8) -> String {
    let filled = usize::from(percent) / 5;
    format!("[{}{}]", "#".repeat(filled), ".".repeat(20 - filled))
}
