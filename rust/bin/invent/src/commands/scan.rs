//! Continuous scanning: every stdin line is one scan event.

use std::sync::Arc;

use anyhow::Result;
use install::{
    BindMode, FieldSession, InstallError, ScanContext, ScanEvent, ScanHub, ScanOutcome,
    ScanSource, UuidGenerator,
};
use invent_remote::RemoteService;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use super::field::print_resolution;

pub struct ScanOptions {
    pub context: ScanContext,
    pub nfc: bool,
    /// Bind every found device instead of only showing it.
    pub confirm: bool,
    pub mode: BindMode,
}

pub async fn run(remote: Arc<dyn RemoteService>, opts: ScanOptions) -> Result<()> {
    let session = FieldSession::new(remote, Arc::new(UuidGenerator), opts.context)
        .with_bind_mode(opts.mode);

    let hub = ScanHub::new(64);
    let mut listener = hub.subscribe();
    let cancel = CancellationToken::new();

    let reader = tokio::spawn(read_scans(hub, opts.nfc, cancel.clone()));
    eprintln!("Scan a code (one per line, \"quit\" to stop).");

    while let Some(outcome) = session.next_outcome(&mut listener, &cancel).await {
        match outcome {
            Ok(ScanOutcome::Found { event, resolution }) => {
                print_resolution(&resolution);
                if opts.confirm {
                    match session.confirm(&event.payload, &resolution).await {
                        Ok(nav) => println!(
                            "-> dashboard of {} at installation {}",
                            nav.serial_number, nav.installation_code
                        ),
                        Err(e) => report(&e),
                    }
                }
            }
            Ok(ScanOutcome::NotFound { payload }) => {
                report(&InstallError::DeviceNotFound(payload));
            }
            Err(e) => report(&e),
        }
        println!();
    }

    reader.abort();
    Ok(())
}

fn report(err: &InstallError) {
    eprintln!("{}", err.user_message());
    warn!("{}", err);
}

/// Publish stdin lines until EOF or "quit". Dropping the hub ends the listener.
async fn read_scans(hub: ScanHub, nfc: bool, cancel: CancellationToken) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                warn!("reading scans from stdin failed: {}", e);
                break;
            }
        };
        if line.trim().eq_ignore_ascii_case("quit") {
            cancel.cancel();
            break;
        }

        let event = if nfc {
            parse_tag_id(&line).and_then(|bytes| ScanEvent::nfc(&bytes))
        } else {
            ScanEvent::barcode(&line)
        };
        match event {
            Some(event) => {
                hub.publish(event);
            }
            None => eprintln!("{}", InstallError::InvalidScan.user_message()),
        }
    }
}

/// Parse a tag id typed as hex, with or without `:` separators.
fn parse_tag_id(s: &str) -> Option<Vec<u8>> {
    let hex: String = s.chars().filter(|c| !c.is_whitespace() && *c != ':').collect();
    if hex.is_empty() || !hex.is_ascii() || hex.len() % 2 != 0 {
        return None;
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_ids_parse_with_or_without_separators() {
        assert_eq!(parse_tag_id("04:a2:3f"), Some(vec![0x04, 0xa2, 0x3f]));
        assert_eq!(parse_tag_id("04A23F"), Some(vec![0x04, 0xa2, 0x3f]));
        assert_eq!(parse_tag_id("04A"), None);
        assert_eq!(parse_tag_id("zz"), None);
        assert_eq!(parse_tag_id(""), None);
        assert_eq!(parse_tag_id("é0"), None);
    }
}
