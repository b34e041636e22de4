pub mod config;
pub mod display;
pub mod error;
pub mod executor;
pub mod flatten;
pub mod grid;
mod history;
pub mod palette;
pub mod spatial;
pub mod trace;

pub use config::ExecutorConfig;
pub use display::ErrorBanner;
pub use error::{ExecError, StructuralError};
pub use executor::{ExecState, Executor, ExecutorEvent, MoveReport, RewindReport, StepOutcome};
pub use flatten::flatten;
pub use grid::{GridError, GridPath};
pub use palette::{BlockState, Palette};
pub use spatial::{Admissibility, Position, SpatialValidator};
pub use trace::{Instruction, Trace};
