//! Energy gate that keeps near-silent microphone frames off the wire.
//!
//! With no threshold configured every frame passes. Once a frame crosses the
//! threshold the gate stays open for `hangover_frames` more frames so word
//! endings survive.

/// Gate settings. `threshold_db: None` disables gating.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GateConfig {
    pub threshold_db: Option<f32>,
    pub hangover_frames: usize,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            threshold_db: None,
            hangover_frames: 8,
        }
    }
}

#[derive(Debug)]
pub struct EnergyGate {
    config: GateConfig,
    open_for: usize,
    suppressed: u64,
}

impl EnergyGate {
    pub fn new(config: GateConfig) -> Self {
        Self {
            config,
            open_for: 0,
            suppressed: 0,
        }
    }

    /// Decide whether a frame at `level_db` should be sent.
    pub fn admit(&mut self, level_db: f32) -> bool {
        let Some(threshold) = self.config.threshold_db else {
            return true;
        };
        if level_db >= threshold {
            self.open_for = self.config.hangover_frames;
            return true;
        }
        if self.open_for > 0 {
            self.open_for -= 1;
            return true;
        }
        self.suppressed += 1;
        false
    }

    /// Frames held back so far.
    pub fn suppressed(&self) -> u64 {
        self.suppressed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_gate_admits_everything() {
        let mut gate = EnergyGate::new(GateConfig::default());
        assert!(gate.admit(-100.0));
        assert_eq!(gate.suppressed(), 0);
    }

    #[test]
    fn quiet_frames_are_suppressed() {
        let mut gate = EnergyGate::new(GateConfig {
            threshold_db: Some(-40.0),
            hangover_frames: 0,
        });
        assert!(!gate.admit(-55.0));
        assert!(gate.admit(-30.0));
        assert!(!gate.admit(-55.0));
        assert_eq!(gate.suppressed(), 2);
    }

    #[test]
    fn hangover_keeps_gate_open_after_speech() {
        let mut gate = EnergyGate::new(GateConfig {
            threshold_db: Some(-40.0),
            hangover_frames: 2,
        });
        assert!(gate.admit(-20.0));
        assert!(gate.admit(-58.0));
        assert!(gate.admit(-58.0));
        assert!(!gate.admit(-58.0));
    }
}
