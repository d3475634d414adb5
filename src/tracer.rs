//! Injectable tracing (§10.3). No `log`/`tracing` dependency: the engine
//! calls directly into a monomorphized `EngineTracer` implementation at a
//! handful of well-defined points, matching the teacher's `VmTracer` shape.

/// A point in the interpreter or collector worth reporting, passed by
/// reference so a `NoopTracer` compiles its call sites down to nothing.
#[derive(Debug, Clone, Copy)]
pub enum TraceEvent<'a> {
    CallEnter { function_name: Option<&'a str>, depth: u32 },
    CallExit { function_name: Option<&'a str>, depth: u32 },
    GcStart { reason: GcReason },
    GcEnd { objects_reclaimed: usize, functions_reclaimed: usize, properties_reclaimed: usize },
    ExceptionThrown { message: &'a str },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GcReason {
    ObjectArenaExhausted,
    FunctionArenaExhausted,
    PropertyArenaExhausted,
    StringHeapHighWaterMark,
    Explicit,
}

/// Implemented by anything that wants visibility into engine internals.
/// Kept as a trait (not a `Box<dyn Fn>`) so a no-op implementation costs
/// nothing at call sites after inlining.
pub trait EngineTracer {
    fn trace(&mut self, event: TraceEvent<'_>);
}

/// The default: discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTracer;

impl EngineTracer for NoopTracer {
    fn trace(&mut self, _event: TraceEvent<'_>) {}
}

/// Writes a one-line `Debug` rendering of every event to stderr. Intended
/// for ad hoc debugging, not production use.
#[derive(Debug, Default, Clone, Copy)]
pub struct StderrTracer;

impl EngineTracer for StderrTracer {
    fn trace(&mut self, event: TraceEvent<'_>) {
        eprintln!("{event:?}");
    }
}

/// Buffers every event's `Debug` rendering for later inspection, primarily
/// useful in tests that assert on GC or call-sequence behavior.
#[derive(Debug, Default)]
pub struct RecordingTracer {
    pub events: Vec<String>,
}

impl EngineTracer for RecordingTracer {
    fn trace(&mut self, event: TraceEvent<'_>) {
        self.events.push(format!("{event:?}"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_tracer_accumulates_events() {
        let mut tracer = RecordingTracer::default();
        tracer.trace(TraceEvent::GcStart { reason: GcReason::Explicit });
        tracer.trace(TraceEvent::GcEnd { objects_reclaimed: 3, functions_reclaimed: 0, properties_reclaimed: 1 });
        assert_eq!(tracer.events.len(), 2);
    }
}
