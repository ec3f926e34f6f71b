//! Vital-sign reading with a bounded wait.
//!
//! The sensor driver may block, so it lives on its own sampling thread. Each
//! read is a sequence-numbered request answered over a channel; the caller
//! waits at most `timeout`. Replies that arrive after their request timed
//! out are discarded.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};

use crate::domain::VitalSigns;
use crate::ports::{SensorError, VitalsSensor};

type Reply = (u64, Result<VitalSigns, SensorError>);

/// Reads vitals snapshots from a sensor driver with a timeout.
pub struct VitalsReader {
    requests: Sender<u64>,
    replies: Receiver<Reply>,
    next_seq: u64,
    timeout: Duration,
}

impl VitalsReader {
    /// Initialize the sensors and start the sampling thread.
    ///
    /// # Errors
    /// Returns the driver error if PPG or temperature init fails, or
    /// `SensorError::Bus` if the thread cannot be spawned.
    pub fn spawn<S>(mut sensor: S, timeout: Duration) -> Result<Self, SensorError>
    where
        S: VitalsSensor + 'static,
    {
        sensor.init_ppg()?;
        sensor.init_temperature()?;
        tracing::info!("PPG and temperature sensors ready");

        let (req_tx, req_rx) = mpsc::channel::<u64>();
        let (rep_tx, rep_rx) = mpsc::channel::<Reply>();

        thread::Builder::new()
            .name("vitals-sampler".to_string())
            .spawn(move || {
                while let Ok(seq) = req_rx.recv() {
                    let reading = sensor.read_all().and_then(|v| {
                        v.validate()
                            .map(|()| v)
                            .map_err(|errs| SensorError::InvalidReading(errs.join("; ")))
                    });
                    if rep_tx.send((seq, reading)).is_err() {
                        break;
                    }
                }
                tracing::debug!("Vitals sampler stopped");
            })
            .map_err(|e| SensorError::Bus(format!("failed to spawn sampler: {e}")))?;

        Ok(Self {
            requests: req_tx,
            replies: rep_rx,
            next_seq: 0,
            timeout,
        })
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Take one vitals snapshot.
    ///
    /// # Errors
    /// Returns `SensorError::Timeout` if no reading arrives in time,
    /// `SensorError::Disconnected` if the sampler is gone, or the driver error.
    pub fn read(&mut self) -> Result<VitalSigns, SensorError> {
        self.next_seq += 1;
        let seq = self.next_seq;

        self.requests
            .send(seq)
            .map_err(|_| SensorError::Disconnected)?;

        let deadline = Instant::now() + self.timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.replies.recv_timeout(remaining) {
                Ok((reply_seq, reading)) if reply_seq == seq => return reading,
                Ok((stale, _)) => {
                    tracing::debug!(stale, current = seq, "Discarding late vitals reply");
                }
                Err(RecvTimeoutError::Timeout) => return Err(SensorError::Timeout(self.timeout)),
                Err(RecvTimeoutError::Disconnected) => return Err(SensorError::Disconnected),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeSensor;

    #[test]
    fn test_reads_snapshot() {
        let mut reader =
            VitalsReader::spawn(FakeSensor::steady(), Duration::from_millis(500)).expect("spawn");
        let vitals = reader.read().expect("read");

        assert_eq!(vitals.heart_rate, 75);
        assert!((vitals.blood_oxygen - 98.5).abs() < 1e-9);
        assert!((vitals.temperature - 36.6).abs() < 1e-9);
    }

    #[test]
    fn test_slow_sensor_times_out() {
        let sensor = FakeSensor::steady().with_delays(&[Duration::from_millis(300)]);
        let mut reader = VitalsReader::spawn(sensor, Duration::from_millis(30)).expect("spawn");

        let started = Instant::now();
        assert!(matches!(reader.read(), Err(SensorError::Timeout(_))));
        assert!(started.elapsed() < Duration::from_millis(250));
    }

    #[test]
    fn test_late_reply_is_discarded() {
        // First read is slow and times out; its reply arrives while the
        // second read is waiting and must not be mistaken for it.
        let sensor = FakeSensor::counting().with_delays(&[Duration::from_millis(150)]);
        let mut reader = VitalsReader::spawn(sensor, Duration::from_millis(50)).expect("spawn");

        assert!(matches!(reader.read(), Err(SensorError::Timeout(_))));

        let mut second = None;
        for _ in 0..5 {
            match reader.read() {
                Ok(v) => {
                    second = Some(v);
                    break;
                }
                Err(SensorError::Timeout(_)) => continue,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        let second = second.expect("sensor recovers");
        assert_ne!(second.heart_rate, 70, "stale first reading returned");
    }

    #[test]
    fn test_init_failure_is_reported() {
        let result = VitalsReader::spawn(FakeSensor::broken_ppg(), Duration::from_millis(50));
        assert!(matches!(result, Err(SensorError::Bus(_))));
    }

    #[test]
    fn test_implausible_reading_rejected() {
        let sensor = FakeSensor::with_reading(75, 140.0, 36.6);
        let mut reader = VitalsReader::spawn(sensor, Duration::from_millis(200)).expect("spawn");
        assert!(matches!(reader.read(), Err(SensorError::InvalidReading(_))));
    }
}
