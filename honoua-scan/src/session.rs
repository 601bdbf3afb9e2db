//! Scan session: decoder callback side of the barcode filter
//!
//! One session owns one [`ScanFilter`]. Decoder errors that fire on almost
//! every frame (nothing found, bad checksum, unknown format) are dropped
//! silently; anything else is logged and ignored so the session keeps going.

use chrono::{DateTime, Duration, Utc};
use honoua_common::scan_filter::ScanPhase;
use honoua_common::{ConfirmedScan, Error, Result, ScanCandidate, ScanFilter, ScanFilterConfig};
use tracing::{debug, info, warn};

/// One decoder output
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecoderEvent {
    /// Text read from a frame
    Decoded(String),
    /// No barcode in the frame
    NotFound,
    /// Barcode found but its checksum failed
    Checksum,
    /// Barcode format not recognized
    Format,
    /// Any other decoder failure
    Other(String),
}

impl DecoderEvent {
    /// Replay notation: `!not_found`, `!checksum`, `!format`, `!<message>`,
    /// anything else is decoded text
    pub fn from_replay_text(text: &str) -> Self {
        match text.strip_prefix('!') {
            Some("not_found") => DecoderEvent::NotFound,
            Some("checksum") => DecoderEvent::Checksum,
            Some("format") => DecoderEvent::Format,
            Some(message) => DecoderEvent::Other(message.trim().to_string()),
            None => DecoderEvent::Decoded(text.to_string()),
        }
    }
}

/// Parse a replay line `"<millis> <text>"`
///
/// Millis are relative to the session start. Blank lines and `#` comments
/// yield `Ok(None)`.
pub fn parse_decoder_line(line: &str) -> Result<Option<(u64, DecoderEvent)>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let (millis, text) = line.split_once(char::is_whitespace).unwrap_or((line, ""));

    let millis = millis
        .parse::<u64>()
        .map_err(|_| Error::InvalidInput(format!("bad timestamp in decoder line '{}'", line)))?;

    Ok(Some((millis, DecoderEvent::from_replay_text(text.trim()))))
}

/// An active scan session
pub struct ScanSession {
    filter: Option<ScanFilter>,
    started_at: DateTime<Utc>,
}

impl ScanSession {
    /// Start a session with a fresh filter state
    pub fn start(config: ScanFilterConfig, started_at: DateTime<Utc>) -> Self {
        info!(
            "Scan session started (window {} ms, cooldown {} ms, {} repeats)",
            config.stability_window_ms,
            config.cooldown_ms,
            config.effective_min_repeats()
        );
        Self {
            filter: Some(ScanFilter::new(config)),
            started_at,
        }
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn is_active(&self) -> bool {
        self.filter.is_some()
    }

    /// Absolute time of a replay offset
    pub fn at_offset(&self, millis: u64) -> DateTime<Utc> {
        let millis = i64::try_from(millis).unwrap_or(i64::MAX);
        self.started_at
            .checked_add_signed(Duration::milliseconds(millis))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Decoder callback: returns the scan when the filter confirms it
    pub fn on_decoded(&mut self, text: &str, at: DateTime<Utc>) -> Option<ConfirmedScan> {
        let Some(filter) = self.filter.as_mut() else {
            debug!("Ignoring decoded text after session stop");
            return None;
        };

        let confirmed = filter.offer(&ScanCandidate::new(text, at));
        if let Some(scan) = &confirmed {
            info!("Confirmed barcode {} ({})", scan.code, scan.code.kind());
        }
        confirmed
    }

    pub fn on_event(&mut self, event: DecoderEvent, at: DateTime<Utc>) -> Option<ConfirmedScan> {
        match event {
            DecoderEvent::Decoded(text) => self.on_decoded(&text, at),
            DecoderEvent::NotFound | DecoderEvent::Checksum | DecoderEvent::Format => None,
            DecoderEvent::Other(message) => {
                warn!("Decoder error ignored: {}", message);
                None
            }
        }
    }

    /// Current filter phase, `None` once stopped
    pub fn phase(&self, now: DateTime<Utc>) -> Option<ScanPhase> {
        self.filter.as_ref().map(|f| f.phase(now))
    }

    /// Drop the filter state; later decoder output is ignored
    pub fn stop(&mut self) {
        if self.filter.take().is_some() {
            info!("Scan session stopped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const EAN: &str = "5901234123457";

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 11, 20, 10, 0, 0).unwrap()
    }

    #[test]
    fn test_parse_decoder_line() {
        assert_eq!(
            parse_decoder_line("120 5901234123457").unwrap(),
            Some((120, DecoderEvent::Decoded(EAN.to_string())))
        );
        assert_eq!(
            parse_decoder_line("  40\t!not_found ").unwrap(),
            Some((40, DecoderEvent::NotFound))
        );
        assert_eq!(
            parse_decoder_line("50 !checksum").unwrap(),
            Some((50, DecoderEvent::Checksum))
        );
        assert_eq!(
            parse_decoder_line("60 !format").unwrap(),
            Some((60, DecoderEvent::Format))
        );
        assert_eq!(
            parse_decoder_line("70 !camera unplugged").unwrap(),
            Some((70, DecoderEvent::Other("camera unplugged".to_string())))
        );
        assert_eq!(
            parse_decoder_line("80").unwrap(),
            Some((80, DecoderEvent::Decoded(String::new())))
        );
    }

    #[test]
    fn test_parse_decoder_line_skips_blank_and_comments() {
        assert_eq!(parse_decoder_line("").unwrap(), None);
        assert_eq!(parse_decoder_line("   ").unwrap(), None);
        assert_eq!(parse_decoder_line("# recorded at the shop").unwrap(), None);
    }

    #[test]
    fn test_parse_decoder_line_bad_timestamp() {
        let err = parse_decoder_line("soon 5901234123457").unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_session_confirms_after_two_reads() {
        let mut session = ScanSession::start(ScanFilterConfig::default(), t0());

        assert!(session.on_decoded(EAN, session.at_offset(0)).is_none());
        let scan = session.on_decoded(EAN, session.at_offset(150)).unwrap();
        assert_eq!(scan.code.as_str(), EAN);
        assert_eq!(scan.confirmed_at, session.at_offset(150));

        // Same code keeps being seen while the product is in frame
        assert!(session.on_decoded(EAN, session.at_offset(300)).is_none());
        assert!(matches!(
            session.phase(session.at_offset(300)),
            Some(ScanPhase::Cooldown { .. })
        ));
    }

    #[test]
    fn test_decoder_errors_do_not_break_streak() {
        let mut session = ScanSession::start(ScanFilterConfig::default(), t0());

        assert!(session.on_event(DecoderEvent::Decoded(EAN.to_string()), session.at_offset(0)).is_none());
        assert!(session.on_event(DecoderEvent::NotFound, session.at_offset(50)).is_none());
        assert!(session.on_event(DecoderEvent::Checksum, session.at_offset(60)).is_none());
        assert!(session
            .on_event(DecoderEvent::Other("glitch".to_string()), session.at_offset(70))
            .is_none());

        let scan = session.on_event(DecoderEvent::Decoded(EAN.to_string()), session.at_offset(100));
        assert!(scan.is_some());
    }

    #[test]
    fn test_stop_ignores_later_output() {
        let mut session = ScanSession::start(ScanFilterConfig::default(), t0());
        session.on_decoded(EAN, session.at_offset(0));
        session.stop();

        assert!(!session.is_active());
        assert!(session.on_decoded(EAN, session.at_offset(100)).is_none());
        assert!(session.phase(session.at_offset(100)).is_none());

        // A new session starts from scratch
        let mut session = ScanSession::start(ScanFilterConfig::default(), t0());
        assert!(session.on_decoded(EAN, session.at_offset(0)).is_none());
        assert!(session.on_decoded(EAN, session.at_offset(100)).is_some());
    }

    #[test]
    fn test_invalid_checksum_never_confirms() {
        let mut session = ScanSession::start(ScanFilterConfig::default(), t0());
        for millis in (0..1000).step_by(100) {
            assert!(session.on_decoded("5901234123458", session.at_offset(millis)).is_none());
        }
    }
}
