//! Local hardware: attention indicator, trigger button, low-power sleep.

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::info;

#[async_trait]
pub trait DeviceControl: Send {
    /// Attention-getting side effect for a find-me signal.
    fn blink(&mut self);

    /// `true` once per press of the trigger (edge, not level).
    fn take_trigger(&mut self) -> bool;

    /// Enter the low-power state for `duration`. Returns on wake.
    async fn deep_sleep(&mut self, duration: Duration);
}

/// Presses the trigger of a [`HostDevice`] from elsewhere (a signal handler, a test).
#[derive(Debug, Clone, Default)]
pub struct TriggerHandle(Arc<AtomicBool>);

impl TriggerHandle {
    pub fn press(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// Device stand-in for a regular host: the indicator is a log line and deep
/// sleep is a plain timer.
#[derive(Debug, Default)]
pub struct HostDevice {
    trigger: TriggerHandle,
}

impl HostDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// A device whose trigger is pressed through an existing handle, so the
    /// handle survives runtime rebuilds.
    pub fn with_trigger(trigger: TriggerHandle) -> Self {
        Self { trigger }
    }

    pub fn trigger(&self) -> TriggerHandle {
        self.trigger.clone()
    }
}

#[async_trait]
impl DeviceControl for HostDevice {
    fn blink(&mut self) {
        info!("find-me: blinking indicator");
    }

    fn take_trigger(&mut self) -> bool {
        self.trigger.0.swap(false, Ordering::SeqCst)
    }

    async fn deep_sleep(&mut self, duration: Duration) {
        info!(secs = duration.as_secs(), "entering deep sleep");
        tokio::time::sleep(duration).await;
        info!("woke from deep sleep");
    }
}
