use crate::analyzer::{DtmfAnalyzer, SignalReading};
use crate::controller::ControlCore;
use crate::error::Result;
use crate::output::{Clock, OutputSink};
use crate::source::SampleSource;
use crate::BLOCK_SAMPLES;

/// The sense-and-react control loop
///
/// Wires SampleSource -> DtmfAnalyzer -> ControlCore -> OutputSink, one
/// cycle per fixed-size sample block. Strictly sequential: each cycle
/// runs to completion before the next begins, and the only suspension
/// is the deliberate hold inside a manual shutdown.
pub struct ControlLoop {
    analyzer: DtmfAnalyzer,
    core: ControlCore,
    block: [i16; BLOCK_SAMPLES],
    cycles: u64,
}

impl ControlLoop {
    pub fn new(analyzer: DtmfAnalyzer, core: ControlCore) -> Self {
        Self {
            analyzer,
            core,
            block: [0; BLOCK_SAMPLES],
            cycles: 0,
        }
    }

    pub fn core(&self) -> &ControlCore {
        &self.core
    }

    /// Cycles executed so far
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Run one acquisition/decision cycle
    ///
    /// Returns the cycle's reading, or `None` when the source is
    /// exhausted.
    pub fn run_once<Src, S, C>(
        &mut self,
        source: &mut Src,
        sink: &mut S,
        clock: &mut C,
    ) -> Result<Option<SignalReading>>
    where
        Src: SampleSource,
        S: OutputSink,
        C: Clock,
    {
        if !source.fill(&mut self.block) {
            return Ok(None);
        }

        let reading = self.analyzer.analyze(&self.block)?;
        self.core.tick(&reading, sink, clock);
        self.cycles += 1;
        Ok(Some(reading))
    }

    /// Drive cycles until the source is exhausted
    ///
    /// The clock is expected to advance on its own (wall time for live
    /// sources, per-cycle advance by the caller for replay). Returns the
    /// total cycle count.
    pub fn run<Src, S, C>(&mut self, source: &mut Src, sink: &mut S, clock: &mut C) -> Result<u64>
    where
        Src: SampleSource,
        S: OutputSink,
        C: Clock,
    {
        while self.run_once(source, sink, clock)?.is_some() {}
        Ok(self.cycles)
    }
}
