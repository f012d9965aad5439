use thiserror::Error;

/// Errors raised by the simulation core.
///
/// Landfall, arrival and timeout are voyage outcomes, not errors: see
/// [`crate::engine::voyage::VoyageState`].
#[derive(Debug, Error, PartialEq)]
pub enum SimulationError {
    /// A value fell outside the domain of a lookup or a geometric operation.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// The vessel was asked to move without polar tables attached.
    #[error("vessel '{craft}' has no polar performance model attached")]
    MissingPerformanceModel { craft: String },
    /// A* exhausted its frontier before reaching the goal cell.
    #[error("no route found from cell {start:?} to cell {goal:?}")]
    NoRouteFound {
        start: (usize, usize),
        goal: (usize, usize),
    },
}

impl SimulationError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }
}
