use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Default window within which an identical payload counts as the same physical scan.
pub const DEFAULT_DEDUP_WINDOW: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanKind {
    Barcode,
    Nfc,
}

/// One decoded scan.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanEvent {
    pub payload: String,
    pub kind: ScanKind,
    pub scanned_at: DateTime<Utc>,
}

impl ScanEvent {
    /// Event for a barcode or QR payload; `None` when blank.
    pub fn barcode(raw: &str) -> Option<Self> {
        barcode_token(raw).map(|payload| Self::new(payload, ScanKind::Barcode))
    }

    /// Event for an NFC tag id; `None` when the id is empty or all zeros.
    pub fn nfc(tag_id: &[u8]) -> Option<Self> {
        nfc_tag_token(tag_id).map(|payload| Self::new(payload, ScanKind::Nfc))
    }

    fn new(payload: String, kind: ScanKind) -> Self {
        Self {
            payload,
            kind,
            scanned_at: Utc::now(),
        }
    }
}

/// Render an NFC tag id as upper-case hex, the form printed on device labels.
pub fn nfc_tag_token(tag_id: &[u8]) -> Option<String> {
    if tag_id.iter().all(|b| *b == 0) {
        return None;
    }
    Some(tag_id.iter().map(|b| format!("{:02X}", b)).collect())
}

/// Barcode payload with surrounding whitespace removed. Case is kept.
pub fn barcode_token(raw: &str) -> Option<String> {
    let token = raw.trim();
    (!token.is_empty()).then(|| token.to_string())
}

/// Anything that can hand out scan subscriptions.
pub trait ScanSource {
    fn subscribe(&self) -> ScanListener;
}

/// Fan-out of scan events to every live listener.
pub struct ScanHub {
    tx: broadcast::Sender<ScanEvent>,
    dedup_window: Duration,
}

impl ScanHub {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            tx,
            dedup_window: DEFAULT_DEDUP_WINDOW,
        }
    }

    pub fn with_dedup_window(mut self, window: Duration) -> Self {
        self.dedup_window = window;
        self
    }

    /// Deliver `event` to all listeners; returns how many received it.
    pub fn publish(&self, event: ScanEvent) -> usize {
        self.tx.send(event).unwrap_or(0)
    }

    pub fn listener_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl ScanSource for ScanHub {
    fn subscribe(&self) -> ScanListener {
        ScanListener {
            rx: self.tx.subscribe(),
            window: self.dedup_window,
            last: None,
        }
    }
}

/// A subscription. Dropping it unsubscribes.
pub struct ScanListener {
    rx: broadcast::Receiver<ScanEvent>,
    window: Duration,
    last: Option<(String, Instant)>,
}

impl ScanListener {
    /// Next distinct scan, or `None` once the source is gone.
    ///
    /// A payload equal to the previous one within the dedup window is
    /// dropped and extends the window.
    pub async fn next(&mut self) -> Option<ScanEvent> {
        loop {
            let event = match self.rx.recv().await {
                Ok(event) => event,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "scan listener lagging, dropped events");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            };

            let now = Instant::now();
            if let Some((payload, seen)) = self.last.as_mut() {
                if *payload == event.payload && now.duration_since(*seen) < self.window {
                    *seen = now;
                    debug!(payload = %event.payload, "duplicate scan suppressed");
                    continue;
                }
            }
            self.last = Some((event.payload.clone(), now));
            return Some(event);
        }
    }

    pub fn close(self) {
        drop(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nfc_ids_render_as_upper_hex() {
        assert_eq!(nfc_tag_token(&[0x04, 0xa2, 0x3f, 0x00]).as_deref(), Some("04A23F00"));
        assert_eq!(nfc_tag_token(&[]), None);
        assert_eq!(nfc_tag_token(&[0, 0, 0, 0]), None);
    }

    #[test]
    fn barcode_keeps_case_and_drops_blanks() {
        assert_eq!(barcode_token("  sn-001Ab\n").as_deref(), Some("sn-001Ab"));
        assert_eq!(barcode_token("   "), None);
        assert!(ScanEvent::barcode("").is_none());
        assert_eq!(ScanEvent::nfc(&[0xde, 0xad]).map(|e| e.kind), Some(ScanKind::Nfc));
    }

    #[tokio::test]
    async fn repeated_payload_is_suppressed() {
        let hub = ScanHub::new(16);
        let mut listener = hub.subscribe();

        for raw in ["SN-001", "SN-001", "SN-002", "SN-001"] {
            assert_eq!(hub.publish(ScanEvent::barcode(raw).unwrap()), 1);
        }

        assert_eq!(listener.next().await.unwrap().payload, "SN-001");
        assert_eq!(listener.next().await.unwrap().payload, "SN-002");
        assert_eq!(listener.next().await.unwrap().payload, "SN-001");

        drop(hub);
        assert!(listener.next().await.is_none());
    }

    #[tokio::test]
    async fn zero_window_lets_duplicates_through() {
        let hub = ScanHub::new(4).with_dedup_window(Duration::ZERO);
        let mut listener = hub.subscribe();
        hub.publish(ScanEvent::barcode("SN-001").unwrap());
        hub.publish(ScanEvent::barcode("SN-001").unwrap());
        assert_eq!(listener.next().await.unwrap().payload, "SN-001");
        assert_eq!(listener.next().await.unwrap().payload, "SN-001");
    }

    #[tokio::test]
    async fn lagging_listener_skips_ahead() {
        let hub = ScanHub::new(2);
        let mut listener = hub.subscribe();
        for raw in ["A", "B", "C", "D"] {
            hub.publish(ScanEvent::barcode(raw).unwrap());
        }
        assert_eq!(listener.next().await.unwrap().payload, "C");
        assert_eq!(listener.next().await.unwrap().payload, "D");
    }

    #[test]
    fn closing_unsubscribes() {
        let hub = ScanHub::new(4);
        let listener = hub.subscribe();
        assert_eq!(hub.listener_count(), 1);
        listener.close();
        assert_eq!(hub.listener_count(), 0);
        assert_eq!(hub.publish(ScanEvent::barcode("SN-001").unwrap()), 0);
    }
}
