//! Runtime-selected operators.
//!
//! [`SlidingWindow`] is generic over its operator, which suits a chain fixed
//! at compile time. When the operator is picked from configuration,
//! [`Processor`] closes over every operator this build enables and forwards
//! the hooks by `match`.

use std::io::{Read, Write};

use serde::{Deserialize, Serialize};
use slidewin_core::{
    Passthrough, ShiftFrame, SlidingWindow, StateVersion, WindowConfig, WindowFrame, WindowOp,
};

#[cfg(feature = "analysis")]
use slidewin_analysis::{PitchDetect, RealtimeStamp};
#[cfg(feature = "dsp")]
use slidewin_core::BandDesign;
#[cfg(feature = "dsp")]
use slidewin_dsp::{Despike, EchoTap, Filter, PitchShift, Reverb};

use crate::Result;

/// Serializable description of an operator and its settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ProcessorKind {
    Passthrough,
    /// FFT filter; `None` is the identity kernel.
    #[cfg(feature = "dsp")]
    Filter { band: Option<BandDesign> },
    /// Grain length follows the window size.
    #[cfg(feature = "dsp")]
    PitchShift { ratio: f32 },
    #[cfg(feature = "dsp")]
    Despike {
        size: usize,
        tolerance: f32,
        effect: f32,
    },
    /// `pairs` is flat `(delay, gain)`.
    #[cfg(feature = "dsp")]
    Reverb { max_reverb: usize, pairs: Vec<f32> },
    #[cfg(feature = "analysis")]
    PitchDetect { low: f32, high: f32, min_level: f32 },
    #[cfg(feature = "analysis")]
    RealtimeStamp,
}

/// One of the operators enabled in this build.
#[derive(Default)]
pub enum Processor {
    #[default]
    Passthrough,
    #[cfg(feature = "dsp")]
    Filter(Filter),
    #[cfg(feature = "dsp")]
    PitchShift(PitchShift),
    #[cfg(feature = "dsp")]
    Despike(Despike),
    #[cfg(feature = "dsp")]
    Reverb(Reverb),
    #[cfg(feature = "analysis")]
    PitchDetect(PitchDetect),
    #[cfg(feature = "analysis")]
    RealtimeStamp(RealtimeStamp),
}

/// Forward a hook to whichever operator is active.
macro_rules! dispatch {
    ($self:expr, $op:ident => $body:expr) => {
        match $self {
            Processor::Passthrough => {
                let $op = &mut Passthrough;
                $body
            }
            #[cfg(feature = "dsp")]
            Processor::Filter($op) => $body,
            #[cfg(feature = "dsp")]
            Processor::PitchShift($op) => $body,
            #[cfg(feature = "dsp")]
            Processor::Despike($op) => $body,
            #[cfg(feature = "dsp")]
            Processor::Reverb($op) => $body,
            #[cfg(feature = "analysis")]
            Processor::PitchDetect($op) => $body,
            #[cfg(feature = "analysis")]
            Processor::RealtimeStamp($op) => $body,
        }
    };
}

impl Processor {
    /// Build the operator `kind` describes for windows shaped by `config`.
    ///
    /// The configuration is validated rather than clamped.
    pub fn from_kind(kind: &ProcessorKind, config: &WindowConfig) -> Result<Self> {
        config.validate()?;
        let processor = match kind {
            ProcessorKind::Passthrough => Processor::Passthrough,
            #[cfg(feature = "dsp")]
            ProcessorKind::Filter { band } => {
                let mut filter = Filter::new(config.window_size);
                if let Some(design) = band {
                    filter.set_band(*design, config.sample_rate);
                }
                Processor::Filter(filter)
            }
            #[cfg(feature = "dsp")]
            ProcessorKind::PitchShift { ratio } => {
                let mut shifter = PitchShift::new(config.window_size);
                shifter.set_pitch_shift(*ratio);
                Processor::PitchShift(shifter)
            }
            #[cfg(feature = "dsp")]
            ProcessorKind::Despike {
                size,
                tolerance,
                effect,
            } => Processor::Despike(Despike::new(*size, *tolerance, *effect)),
            #[cfg(feature = "dsp")]
            ProcessorKind::Reverb { max_reverb, pairs } => {
                let taps = EchoTap::from_pairs(pairs)?;
                let mut reverb = Reverb::new(*max_reverb);
                reverb.set_reverb_filter(&taps);
                Processor::Reverb(reverb)
            }
            #[cfg(feature = "analysis")]
            ProcessorKind::PitchDetect {
                low,
                high,
                min_level,
            } => Processor::PitchDetect(
                PitchDetect::builder()
                    .size(config.window_size)
                    .sample_rate(config.sample_rate)
                    .band(*low, *high)
                    .min_level(*min_level)
                    .build()?,
            ),
            #[cfg(feature = "analysis")]
            ProcessorKind::RealtimeStamp => Processor::RealtimeStamp(RealtimeStamp::new()),
        };
        tracing::debug!(
            op = processor.name(),
            window_size = config.window_size,
            overlap = config.overlap,
            "processor built"
        );
        Ok(processor)
    }

    /// [`from_kind`](Self::from_kind) wrapped in its driver.
    pub fn sliding_window(
        kind: &ProcessorKind,
        config: &WindowConfig,
    ) -> Result<SlidingWindow<Processor>> {
        let processor = Self::from_kind(kind, config)?;
        Ok(SlidingWindow::with_config(config, processor))
    }
}

impl std::fmt::Debug for Processor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Processor").field(&self.name()).finish()
    }
}

impl WindowOp for Processor {
    fn name(&self) -> &'static str {
        match self {
            Processor::Passthrough => Passthrough.name(),
            #[cfg(feature = "dsp")]
            Processor::Filter(op) => op.name(),
            #[cfg(feature = "dsp")]
            Processor::PitchShift(op) => op.name(),
            #[cfg(feature = "dsp")]
            Processor::Despike(op) => op.name(),
            #[cfg(feature = "dsp")]
            Processor::Reverb(op) => op.name(),
            #[cfg(feature = "analysis")]
            Processor::PitchDetect(op) => op.name(),
            #[cfg(feature = "analysis")]
            Processor::RealtimeStamp(op) => op.name(),
        }
    }

    fn window_op(&mut self, frame: &mut WindowFrame<'_>) {
        dispatch!(self, op => op.window_op(frame))
    }

    fn shift_op(&mut self, frame: &mut ShiftFrame<'_>) {
        dispatch!(self, op => op.shift_op(frame))
    }

    fn reset(&mut self) {
        dispatch!(self, op => op.reset())
    }

    fn resize(&mut self, size: usize) {
        dispatch!(self, op => op.resize(size))
    }

    fn max_filter_samples(&self) -> Option<usize> {
        match self {
            Processor::Passthrough => None,
            #[cfg(feature = "dsp")]
            Processor::Filter(op) => op.max_filter_samples(),
            #[cfg(feature = "dsp")]
            Processor::PitchShift(op) => op.max_filter_samples(),
            #[cfg(feature = "dsp")]
            Processor::Despike(op) => op.max_filter_samples(),
            #[cfg(feature = "dsp")]
            Processor::Reverb(op) => op.max_filter_samples(),
            #[cfg(feature = "analysis")]
            Processor::PitchDetect(op) => op.max_filter_samples(),
            #[cfg(feature = "analysis")]
            Processor::RealtimeStamp(op) => op.max_filter_samples(),
        }
    }

    fn accepts_window_size(&self, size: usize) -> bool {
        match self {
            Processor::Passthrough => true,
            #[cfg(feature = "dsp")]
            Processor::Filter(op) => op.accepts_window_size(size),
            #[cfg(feature = "dsp")]
            Processor::PitchShift(op) => op.accepts_window_size(size),
            #[cfg(feature = "dsp")]
            Processor::Despike(op) => op.accepts_window_size(size),
            #[cfg(feature = "dsp")]
            Processor::Reverb(op) => op.accepts_window_size(size),
            #[cfg(feature = "analysis")]
            Processor::PitchDetect(op) => op.accepts_window_size(size),
            #[cfg(feature = "analysis")]
            Processor::RealtimeStamp(op) => op.accepts_window_size(size),
        }
    }

    fn save_state(&self, writer: &mut dyn Write) -> slidewin_core::Result<()> {
        match self {
            Processor::Passthrough => Passthrough.save_state(writer),
            #[cfg(feature = "dsp")]
            Processor::Filter(op) => op.save_state(writer),
            #[cfg(feature = "dsp")]
            Processor::PitchShift(op) => op.save_state(writer),
            #[cfg(feature = "dsp")]
            Processor::Despike(op) => op.save_state(writer),
            #[cfg(feature = "dsp")]
            Processor::Reverb(op) => op.save_state(writer),
            #[cfg(feature = "analysis")]
            Processor::PitchDetect(op) => op.save_state(writer),
            #[cfg(feature = "analysis")]
            Processor::RealtimeStamp(op) => op.save_state(writer),
        }
    }

    fn load_state(
        &mut self,
        reader: &mut dyn Read,
        version: StateVersion,
    ) -> slidewin_core::Result<()> {
        dispatch!(self, op => op.load_state(reader, version))
    }

    fn state_restored(&mut self, size: usize) {
        dispatch!(self, op => op.state_restored(size))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> WindowConfig {
        WindowConfig::new(256, 128).with_sample_rate(8000.0)
    }

    #[test]
    fn test_passthrough_kind() {
        let processor = Processor::from_kind(&ProcessorKind::Passthrough, &config()).unwrap();
        assert_eq!(processor.name(), "passthrough");
        assert_eq!(processor.max_filter_samples(), None);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let bad = WindowConfig::new(256, 256);
        assert!(Processor::from_kind(&ProcessorKind::Passthrough, &bad).is_err());
    }

    #[cfg(feature = "dsp")]
    #[test]
    fn test_dsp_kinds() {
        let filter = Processor::from_kind(
            &ProcessorKind::Filter {
                band: Some(BandDesign::LowPass { cutoff: 1000.0 }),
            },
            &config(),
        )
        .unwrap();
        assert_eq!(filter.name(), "filter");
        assert_eq!(filter.max_filter_samples(), Some(256));
        assert!(!filter.accepts_window_size(512));

        let reverb = Processor::from_kind(
            &ProcessorKind::Reverb {
                max_reverb: 100,
                pairs: vec![10.0, 0.5],
            },
            &config(),
        )
        .unwrap();
        assert_eq!(reverb.name(), "reverb");

        let odd = ProcessorKind::Reverb {
            max_reverb: 100,
            pairs: vec![10.0],
        };
        assert!(matches!(
            Processor::from_kind(&odd, &config()),
            Err(crate::Error::Dsp(_))
        ));
    }

    #[cfg(feature = "analysis")]
    #[test]
    fn test_analysis_kinds() {
        let bad = ProcessorKind::PitchDetect {
            low: 900.0,
            high: 100.0,
            min_level: 0.01,
        };
        assert!(matches!(
            Processor::from_kind(&bad, &config()),
            Err(crate::Error::Analysis(_))
        ));

        let window = Processor::sliding_window(&ProcessorKind::RealtimeStamp, &config()).unwrap();
        assert_eq!(window.op().name(), "realtime_stamp");
        assert_eq!(window.window_size(), 256);
    }
}
