//! Cloud feed publisher.
//!
//! Serializes each result into a topic envelope and writes it as one JSON
//! line. The writer is the broker link: stdout when piped into a bridge,
//! or an append-only file.

use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Stdout, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::ScreeningResult;
use crate::ports::{ResultSink, TransportError};

#[derive(Serialize)]
struct Envelope<'a> {
    topic: &'a str,
    device_id: &'a str,
    published_at: DateTime<Utc>,
    payload: &'a ScreeningResult,
}

/// Publishes screening results on a feed topic.
pub struct FeedPublisher<W: Write + Send> {
    writer: W,
    topic: String,
    device_id: Option<String>,
}

impl<W: Write + Send> FeedPublisher<W> {
    #[must_use]
    pub fn new(writer: W, topic: impl Into<String>) -> Self {
        Self {
            writer,
            topic: topic.into(),
            device_id: None,
        }
    }

    #[must_use]
    pub fn get_ref(&self) -> &W {
        &self.writer
    }
}

impl FeedPublisher<Stdout> {
    #[must_use]
    pub fn stdout(topic: impl Into<String>) -> Self {
        Self::new(io::stdout(), topic)
    }
}

impl FeedPublisher<BufWriter<File>> {
    /// Append to `path`, creating it if needed.
    ///
    /// # Errors
    /// Returns the IO error if the file cannot be opened.
    pub fn append_to(path: &Path, topic: impl Into<String>) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self::new(BufWriter::new(file), topic))
    }
}

impl<W: Write + Send> ResultSink for FeedPublisher<W> {
    fn connect(&mut self, device_id: &str) -> Result<(), TransportError> {
        if device_id.trim().is_empty() {
            return Err(TransportError::Connect("empty device id".to_string()));
        }
        self.device_id = Some(device_id.to_string());
        tracing::debug!(topic = %self.topic, "Feed connected");
        Ok(())
    }

    fn send(&mut self, result: &ScreeningResult) -> Result<(), TransportError> {
        let device_id = self.device_id.as_deref().ok_or(TransportError::NotConnected)?;

        let envelope = Envelope {
            topic: &self.topic,
            device_id,
            published_at: Utc::now(),
            payload: result,
        };
        let line = serde_json::to_vec(&envelope)?;
        self.writer.write_all(&line)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;

        tracing::debug!(topic = %self.topic, id = %result.id, "Result published");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{RiskAssessment, RiskTier, VitalSigns};

    fn result() -> ScreeningResult {
        ScreeningResult::new(
            RiskAssessment {
                image_risk: 0.2,
                estimated_systolic_bp: 120.0,
                fused_risk: 0.14,
                tier: RiskTier::Low,
            },
            VitalSigns::new(75, 98.5, 36.6),
        )
    }

    #[test]
    fn test_publishes_json_line() {
        let mut feed = FeedPublisher::new(Vec::new(), "retinalguard/feeds");
        feed.connect("unit-7").expect("connect");
        let r = result();
        feed.send(&r).expect("send");

        let text = String::from_utf8(feed.get_ref().clone()).expect("utf8");
        assert!(text.ends_with('\n'));
        let value: serde_json::Value = serde_json::from_str(text.trim()).expect("json");
        assert_eq!(value["topic"], "retinalguard/feeds");
        assert_eq!(value["device_id"], "unit-7");
        assert_eq!(value["payload"]["tier"], "LOW");
        assert_eq!(value["payload"]["id"], r.id.as_str());
        assert_eq!(value["payload"]["heart_rate"], 75);
    }

    #[test]
    fn test_send_requires_connect() {
        let mut feed = FeedPublisher::new(Vec::new(), "t");
        assert!(matches!(
            feed.send(&result()),
            Err(TransportError::NotConnected)
        ));
        assert!(feed.get_ref().is_empty());
    }

    #[test]
    fn test_append_to_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("feed.jsonl");

        for _ in 0..2 {
            let mut feed = FeedPublisher::append_to(&path, "t").expect("open");
            feed.connect("dev").expect("connect");
            feed.send(&result()).expect("send");
        }

        let content = std::fs::read_to_string(&path).expect("read");
        assert_eq!(content.lines().count(), 2);
    }
}
