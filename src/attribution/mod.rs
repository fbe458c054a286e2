// Call-Chain Energy Attribution
//
// Objective: Turn priced stack snapshots into per-function sample counts, time
// and energy, split into local (the function itself was executing) and
// non-local (something it called was executing).
//
// Key Insight: A caller deep in the stack receives the whole snapshot cost,
// not a share of it. Non-local energy summed over all functions therefore
// exceeds the trace's total energy whenever stacks are deeper than one frame.
//
// Recursion: a function appearing several times in one stack is credited
// once per snapshot; every caller-to-callee edge is still recorded.

mod analyzer;
mod function;
mod registry;

pub use analyzer::{attribute, attribute_window, AnalysisWindow, Attributor};
pub use function::{FunctionAccumulator, PowerPopulation, ReadingTally};
pub use registry::FunctionRegistry;

pub(crate) use function::join_names;
