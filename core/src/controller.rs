use crate::analyzer::SignalReading;
use crate::error::{Result, ToneSwitchError};
use crate::output::{Clock, OutputSink};
use crate::{BRIGHTNESS_STEP, INITIAL_BRIGHTNESS, RELEASE_DELAY_MS, SHUTDOWN_TIMEOUT_MS};

/// Runtime tuning for the control state machine
#[derive(Clone, Copy, Debug)]
pub struct ControllerConfig {
    /// Auto-shutoff deadline after the last qualifying activation
    pub shutdown_timeout_ms: u64,

    /// Blocking hold-off after a manual shutdown, so residual carrier
    /// cannot re-trigger the presence check on the next cycle
    pub release_delay_ms: u64,

    /// Brightness change per '*' / '#' symbol
    pub brightness_step: u8,

    /// Brightness applied on the first activation
    pub initial_brightness: u8,

    /// Variable-duty relay output; full-on when disabled
    pub brightness_control: bool,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            shutdown_timeout_ms: SHUTDOWN_TIMEOUT_MS,
            release_delay_ms: RELEASE_DELAY_MS,
            brightness_step: BRIGHTNESS_STEP,
            initial_brightness: INITIAL_BRIGHTNESS,
            brightness_control: true,
        }
    }
}

impl ControllerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.shutdown_timeout_ms == 0 {
            return Err(ToneSwitchError::InvalidConfig(
                "shutdown timeout must be nonzero".into(),
            ));
        }
        if self.brightness_step == 0 {
            return Err(ToneSwitchError::InvalidConfig(
                "brightness step must be nonzero".into(),
            ));
        }
        if self.initial_brightness < self.brightness_step {
            return Err(ToneSwitchError::InvalidConfig(
                "initial brightness below one step".into(),
            ));
        }
        Ok(())
    }
}

/// Persistent relay state, mutated only by the control core
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RelayState {
    /// Relay driven on
    pub active: bool,

    /// Output level applied while active (0-255); persists across
    /// deactivation as a user preference
    pub brightness: u8,

    /// Monotonic ms of the last qualifying activation; 0 while inactive
    pub last_activation_ms: u64,
}

/// Decision state machine for the relay
///
/// Consumes one `SignalReading` per cycle and applies the transition
/// function to the relay state, writing device outputs through the sink.
/// Every cycle is independent and self-correcting; no operation here can
/// fail.
pub struct ControlCore {
    config: ControllerConfig,
    state: RelayState,
}

impl ControlCore {
    pub fn new(config: ControllerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            state: RelayState {
                active: false,
                brightness: config.initial_brightness,
                last_activation_ms: 0,
            },
            config,
        })
    }

    pub fn state(&self) -> &RelayState {
        &self.state
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Run one cycle of the decision state machine
    ///
    /// Dispatches on the decoded symbol (or raw signal presence when no
    /// symbol decoded), then checks the shutdown timeout. The timeout
    /// check runs after dispatch so a same-cycle activation always
    /// refreshes the deadline first.
    pub fn tick<S: OutputSink, C: Clock>(
        &mut self,
        reading: &SignalReading,
        sink: &mut S,
        clock: &mut C,
    ) {
        let now = clock.now_ms();

        match reading.symbol {
            Some(symbol @ ('1'..='9' | 'A'..='D')) => {
                log::debug!("decoded '{}', activating", symbol);
                self.activate(now, sink);
            }
            Some('*') => {
                self.adjust_brightness(-(self.config.brightness_step as i16), sink);
            }
            Some('#') => {
                self.adjust_brightness(self.config.brightness_step as i16, sink);
            }
            Some('0') => {
                log::info!(
                    "manual shutdown, holding {} ms",
                    self.config.release_delay_ms
                );
                self.deactivate(self.config.release_delay_ms, sink, clock);
            }
            Some(symbol) => {
                // Any other decoded symbol counts as radio activity and
                // keeps the relay up
                log::debug!("unrecognized symbol '{}', activating", symbol);
                self.activate(now, sink);
            }
            None if reading.signal_present => {
                self.activate(now, sink);
            }
            None => {}
        }

        if self.state.active
            && now > self.state.last_activation_ms + self.config.shutdown_timeout_ms
        {
            log::info!(
                "no activity for {} ms, shutting down",
                self.config.shutdown_timeout_ms
            );
            self.deactivate(0, sink, clock);
        }
    }

    /// Drive the relay on (first activation only) and stamp the
    /// activation time. The stamp is refreshed on every qualifying
    /// cycle, which is what extends the shutdown deadline.
    fn activate<S: OutputSink>(&mut self, now: u64, sink: &mut S) {
        if !self.state.active {
            let level = self.output_level();
            sink.set_relay(level);
            sink.set_indicator(true);
            self.state.active = true;
            log::info!("relay on at level {}", level);
        }
        self.state.last_activation_ms = now;
    }

    /// Drive the relay off if it was on, then hold the loop for
    /// `delay_ms`. The hold runs regardless of prior state; nothing else
    /// executes during it, including sampling and the timeout check.
    fn deactivate<S: OutputSink, C: Clock>(&mut self, delay_ms: u64, sink: &mut S, clock: &mut C) {
        if self.state.active {
            sink.set_relay(0);
            sink.set_indicator(false);
            self.state.active = false;
            self.state.last_activation_ms = 0;
            log::info!("relay off");
        }
        if delay_ms > 0 {
            clock.delay_ms(delay_ms);
        }
    }

    /// Step the stored brightness, clamped to [step, 255]
    ///
    /// The lower clamp is the step size, not zero: the relay never sits
    /// in a fully-dark-but-on state. While active the new level is
    /// applied immediately; while idle it is stored for the next
    /// activation.
    fn adjust_brightness<S: OutputSink>(&mut self, delta: i16, sink: &mut S) {
        if !self.config.brightness_control {
            log::debug!("brightness control disabled, ignoring adjustment");
            return;
        }

        let floor = delta.unsigned_abs().min(255) as i16;
        let next = (self.state.brightness as i16 + delta).clamp(floor, 255) as u8;
        self.state.brightness = next;

        if self.state.active {
            sink.set_relay(next);
        }
        log::info!("brightness set to {}", next);
    }

    fn output_level(&self) -> u8 {
        if self.config.brightness_control {
            self.state.brightness
        } else {
            255
        }
    }
}
