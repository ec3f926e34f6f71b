//! In-memory collaborators for unit tests.

use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use crate::domain::{PixelBuffer, RiskTier, ScreeningResult, VitalSigns};
use crate::ports::{
    Camera, CaptureError, DisplayError, InferenceError, ModelRuntime, ModelSession, ResultDisplay,
    ResultSink, SensorError, TransportError, VitalsSensor, FUNDUS_INPUT_SHAPE,
};

#[derive(Debug, Default)]
struct RecorderInner {
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    shown: AtomicUsize,
    sent: Mutex<Vec<String>>,
}

/// Shared observation point for fakes.
///
/// `in_flight` counts frames from `FakeCamera` that are still alive, so
/// `max_in_flight` is the most pixel buffers that ever coexisted.
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    inner: Arc<RecorderInner>,
}

impl Recorder {
    fn enter(&self) {
        let now = self.inner.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.max_in_flight.fetch_max(now, Ordering::SeqCst);
    }

    fn exit(&self) {
        let _ = self
            .inner
            .in_flight
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
    }

    /// Live frames.
    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.inner.max_in_flight.load(Ordering::SeqCst)
    }

    /// Successful display updates.
    pub fn shown(&self) -> usize {
        self.inner.shown.load(Ordering::SeqCst)
    }

    /// Ids of results accepted by the sink, in order.
    pub fn sent_ids(&self) -> Vec<String> {
        self.inner.sent.lock().expect("recorder lock").clone()
    }
}

/// Counts one live frame on a `Recorder` until dropped.
#[derive(Debug)]
pub struct FrameLease(Recorder);

impl FrameLease {
    fn new(recorder: Recorder) -> Self {
        recorder.enter();
        Self(recorder)
    }
}

impl Clone for FrameLease {
    fn clone(&self) -> Self {
        Self::new(self.0.clone())
    }
}

impl Drop for FrameLease {
    fn drop(&mut self) {
        self.0.exit();
    }
}

// Leases never affect frame equality.
impl PartialEq for FrameLease {
    fn eq(&self, _other: &Self) -> bool {
        true
    }
}

impl Eq for FrameLease {}

pub struct FakeCamera {
    recorder: Option<Recorder>,
    fail: bool,
    delay: Duration,
}

impl FakeCamera {
    /// Camera producing all-zero frames.
    pub fn zeros(recorder: Recorder) -> Self {
        Self {
            recorder: Some(recorder),
            fail: false,
            delay: Duration::ZERO,
        }
    }

    /// Camera that comes up but cannot allocate a frame.
    pub fn failing() -> Self {
        Self {
            recorder: None,
            fail: true,
            delay: Duration::ZERO,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

impl Camera for FakeCamera {
    fn init(&mut self) -> Result<(), CaptureError> {
        Ok(())
    }

    fn capture(&mut self, width: u32, height: u32) -> Result<PixelBuffer, CaptureError> {
        let bytes = (width * height * 3) as usize;
        if self.fail {
            return Err(CaptureError::Allocation { bytes });
        }
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
        let frame = PixelBuffer::from_raw(width, height, vec![0; bytes]).ok_or(
            CaptureError::SizeMismatch {
                expected: bytes,
                actual: 0,
            },
        )?;
        Ok(match &self.recorder {
            Some(recorder) => frame.with_lease(FrameLease::new(recorder.clone())),
            None => frame,
        })
    }
}

pub struct FakeSession {
    value: f32,
    shape: [usize; 4],
    fail: bool,
}

impl FakeSession {
    pub fn returning(value: f32) -> Self {
        Self {
            value,
            shape: FUNDUS_INPUT_SHAPE,
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::returning(0.0)
        }
    }

    pub fn with_shape(mut self, shape: [usize; 4]) -> Self {
        self.shape = shape;
        self
    }
}

impl ModelSession for FakeSession {
    fn input_shape(&self) -> [usize; 4] {
        self.shape
    }

    fn invoke(&mut self, _input: &[f32]) -> Result<f32, InferenceError> {
        if self.fail {
            return Err(InferenceError::Invocation("interpreter fault".to_string()));
        }
        Ok(self.value)
    }
}

pub struct FakeRuntime {
    value: f32,
}

impl FakeRuntime {
    pub fn returning(value: f32) -> Self {
        Self { value }
    }
}

impl ModelRuntime for FakeRuntime {
    type Session = FakeSession;

    fn load(&self, _path: &Path) -> Result<FakeSession, InferenceError> {
        Ok(FakeSession::returning(self.value))
    }
}

pub struct FakeSensor {
    reading: VitalSigns,
    counting: bool,
    delays: Vec<Duration>,
    broken_ppg: bool,
    fail_after: Option<(usize, SensorError)>,
    frames: Option<Recorder>,
    calls: usize,
}

impl FakeSensor {
    /// Healthy adult at rest: 75 bpm, 98.5 % SpO2, 36.6 °C.
    pub fn steady() -> Self {
        Self::with_reading(75, 98.5, 36.6)
    }

    pub fn with_reading(heart_rate: u32, blood_oxygen: f64, temperature: f64) -> Self {
        Self {
            reading: VitalSigns::new(heart_rate, blood_oxygen, temperature),
            counting: false,
            delays: Vec::new(),
            broken_ppg: false,
            fail_after: None,
            frames: None,
            calls: 0,
        }
    }

    /// Heart rate is 70 on the first read, 71 on the second, and so on.
    pub fn counting() -> Self {
        Self {
            counting: true,
            ..Self::steady()
        }
    }

    pub fn broken_ppg() -> Self {
        Self {
            broken_ppg: true,
            ..Self::steady()
        }
    }

    /// Delay the n-th read by `delays[n]`; later reads are immediate.
    pub fn with_delays(mut self, delays: &[Duration]) -> Self {
        self.delays = delays.to_vec();
        self
    }

    /// Fail any read taken while a frame counted by `recorder` is alive.
    pub fn requiring_released_frames(mut self, recorder: Recorder) -> Self {
        self.frames = Some(recorder);
        self
    }

    /// Succeed `reads` times, then fail every read with `error`.
    pub fn fail_after(mut self, reads: usize, error: SensorError) -> Self {
        self.fail_after = Some((reads, error));
        self
    }
}

impl VitalsSensor for FakeSensor {
    fn init_ppg(&mut self) -> Result<(), SensorError> {
        if self.broken_ppg {
            return Err(SensorError::Bus("MAX30102 not responding".to_string()));
        }
        Ok(())
    }

    fn init_temperature(&mut self) -> Result<(), SensorError> {
        Ok(())
    }

    fn read_all(&mut self) -> Result<VitalSigns, SensorError> {
        let call = self.calls;
        self.calls += 1;

        if let Some(delay) = self.delays.get(call) {
            thread::sleep(*delay);
        }
        if let Some(live) = self.frames.as_ref().map(Recorder::in_flight) {
            if live > 0 {
                return Err(SensorError::InvalidReading(format!(
                    "{live} frame(s) alive during vitals read"
                )));
            }
        }
        if let Some((reads, error)) = &self.fail_after {
            if call >= *reads {
                return Err(error.clone());
            }
        }

        let heart_rate = if self.counting {
            70 + call as u32
        } else {
            self.reading.heart_rate
        };
        Ok(VitalSigns::new(
            heart_rate,
            self.reading.blood_oxygen,
            self.reading.temperature,
        ))
    }
}

pub struct FakeDisplay {
    recorder: Recorder,
    broken: bool,
}

impl FakeDisplay {
    pub fn new(recorder: Recorder) -> Self {
        Self {
            recorder,
            broken: false,
        }
    }

    /// Display that initializes but fails every update.
    pub fn broken(recorder: Recorder) -> Self {
        Self {
            recorder,
            broken: true,
        }
    }
}

impl ResultDisplay for FakeDisplay {
    fn init(&mut self) -> Result<(), DisplayError> {
        Ok(())
    }

    fn show(
        &mut self,
        _fused_risk: f64,
        _vitals: &VitalSigns,
        _tier: RiskTier,
    ) -> Result<(), DisplayError> {
        if self.broken {
            return Err(DisplayError::Io(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "panel unplugged",
            )));
        }
        self.recorder.inner.shown.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub struct FakeSink {
    recorder: Recorder,
    broken: bool,
}

impl FakeSink {
    pub fn new(recorder: Recorder) -> Self {
        Self {
            recorder,
            broken: false,
        }
    }

    /// Sink that connects but drops every publish.
    pub fn broken(recorder: Recorder) -> Self {
        Self {
            recorder,
            broken: true,
        }
    }
}

impl ResultSink for FakeSink {
    fn connect(&mut self, _device_id: &str) -> Result<(), TransportError> {
        Ok(())
    }

    fn send(&mut self, result: &ScreeningResult) -> Result<(), TransportError> {
        if self.broken {
            return Err(TransportError::NotConnected);
        }
        self.recorder
            .inner
            .sent
            .lock()
            .expect("recorder lock")
            .push(result.id.clone());
        Ok(())
    }
}
