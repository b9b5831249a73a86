use common::Direction;

/// Outcome of comparing two consecutive closes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evaluation {
    /// `current - previous`, signed.
    pub movement: f64,
    pub direction: Direction,
    pub should_alert: bool,
}

impl Evaluation {
    pub fn magnitude(&self) -> f64 {
        self.movement.abs()
    }
}

/// Decide whether the move from `previous_close` to `current_close` is alert-worthy.
/// The threshold is inclusive.
pub fn evaluate(previous_close: f64, current_close: f64, threshold: f64) -> Evaluation {
    let movement = current_close - previous_close;
    Evaluation {
        movement,
        direction: Direction::from_movement(movement),
        should_alert: movement.abs() >= threshold,
    }
}
