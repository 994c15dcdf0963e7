//! Patience-based early stopping on a monitored loss.

use serde::{Deserialize, Serialize};

/// State of the early-stopping machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopState {
    /// Last observation set a new best
    Improving,
    /// No improvement, patience not yet exhausted
    Stalled,
    /// Terminal
    Stopped,
}

/// Tracks the best loss and the run of non-improving epochs.
#[derive(Clone, Debug)]
pub struct EarlyStopping {
    patience: usize,
    best: f32,
    stalled_epochs: usize,
    state: StopState,
}

impl EarlyStopping {
    /// Create a tracker that stops after `patience` consecutive non-improving epochs.
    pub fn new(patience: usize) -> Self {
        Self {
            patience,
            best: f32::INFINITY,
            stalled_epochs: 0,
            state: StopState::Improving,
        }
    }

    /// Feed one epoch's loss and get the resulting state.
    ///
    /// Once stopped, further observations are ignored.
    pub fn observe(&mut self, loss: f32) -> StopState {
        if self.state == StopState::Stopped {
            return self.state;
        }
        if loss < self.best {
            self.best = loss;
            self.stalled_epochs = 0;
            self.state = StopState::Improving;
        } else {
            self.stalled_epochs += 1;
            self.state = if self.stalled_epochs >= self.patience {
                StopState::Stopped
            } else {
                StopState::Stalled
            };
        }
        self.state
    }

    /// Force the terminal state (e.g. epoch budget exhausted).
    pub fn stop(&mut self) {
        self.state = StopState::Stopped;
    }

    /// Best loss seen so far.
    pub fn best(&self) -> f32 {
        self.best
    }

    /// Consecutive non-improving epochs.
    pub fn stalled_epochs(&self) -> usize {
        self.stalled_epochs
    }

    /// Current state.
    pub fn state(&self) -> StopState {
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state() {
        let stopper = EarlyStopping::new(3);
        assert_eq!(stopper.state(), StopState::Improving);
        assert_eq!(stopper.best(), f32::INFINITY);
    }

    #[test]
    fn test_stops_after_patience() {
        let mut stopper = EarlyStopping::new(2);
        let states: Vec<StopState> = [1.0, 0.9, 0.95, 0.96, 0.97]
            .iter()
            .map(|&v| stopper.observe(v))
            .collect();
        assert_eq!(
            states,
            vec![
                StopState::Improving,
                StopState::Improving,
                StopState::Stalled,
                StopState::Stopped,
                StopState::Stopped,
            ]
        );
        assert!((stopper.best() - 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_improvement_resets_counter() {
        let mut stopper = EarlyStopping::new(2);
        stopper.observe(1.0);
        stopper.observe(1.1);
        assert_eq!(stopper.stalled_epochs(), 1);
        assert_eq!(stopper.observe(0.5), StopState::Improving);
        assert_eq!(stopper.stalled_epochs(), 0);
    }

    #[test]
    fn test_equal_loss_is_not_improvement() {
        let mut stopper = EarlyStopping::new(1);
        stopper.observe(0.7);
        assert_eq!(stopper.observe(0.7), StopState::Stopped);
    }

    #[test]
    fn test_forced_stop() {
        let mut stopper = EarlyStopping::new(5);
        stopper.observe(1.0);
        stopper.stop();
        assert_eq!(stopper.observe(0.1), StopState::Stopped);
    }
}
