//! Layer propagation state machine.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::channel::{AdminChannel, Statement};
use crate::error::{Error, Result};
use crate::observability::metrics;
use crate::propagation::layer::{Action, ConfigSettings, Direction, Layer};

/// A layer-to-layer copy instruction for one settings group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PropagationRequest {
    pub action: Action,
    pub settings: ConfigSettings,
    pub direction: Direction,
    pub layer: Layer,
}

/// The resolved source and target layers of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Transition {
    pub source: Layer,
    pub target: Layer,
}

impl PropagationRequest {
    pub fn new(action: Action, settings: ConfigSettings, direction: Direction, layer: Layer) -> Self {
        Self {
            action,
            settings,
            direction,
            layer,
        }
    }

    /// `SAVE <settings> TO DISK`.
    pub fn save_to_disk(settings: ConfigSettings) -> Self {
        Self::new(Action::Save, settings, Direction::To, Layer::Disk)
    }

    /// `LOAD <settings> TO RUNTIME`.
    pub fn load_to_runtime(settings: ConfigSettings) -> Self {
        Self::new(Action::Load, settings, Direction::To, Layer::Runtime)
    }

    /// Resolve which layer is read and which is written.
    ///
    /// MEMORY is the hub: LOAD walks DISK/CONFIG -> MEMORY -> RUNTIME and
    /// SAVE walks RUNTIME -> MEMORY -> DISK. Nothing ever writes CONFIG.
    pub fn transition(&self) -> Result<Transition> {
        use Action::*;
        use Direction::*;
        use Layer::*;

        let (source, target) = match (self.action, self.direction, self.layer) {
            (Load, From, Config) => (Config, Memory),
            (Load, From, Disk) | (Load, To, Memory) => (Disk, Memory),
            (Load, From, Memory) | (Load, To, Runtime) => (Memory, Runtime),
            (Save, From, Runtime) | (Save, To, Memory) => (Runtime, Memory),
            (Save, From, Memory) | (Save, To, Disk) => (Memory, Disk),
            (_, _, Config) => {
                return Err(Error::invalid_layer(format!(
                    "{} {} CONFIG would write the CONFIG layer, which is read-only; only LOAD FROM CONFIG is allowed",
                    self.action, self.direction
                )))
            }
            (action, direction, layer) => {
                return Err(Error::invalid_layer(format!(
                    "{action} {direction} {layer} has no adjacent layer to {}",
                    if direction == From { "write" } else { "read" }
                )))
            }
        };

        Ok(Transition { source, target })
    }

    /// The fixed-form statement understood by the admin interface.
    pub fn statement(&self) -> Statement {
        Statement::new(self.to_string())
    }
}

impl fmt::Display for PropagationRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {} {}", self.action, self.settings, self.direction, self.layer)
    }
}

impl FromStr for PropagationRequest {
    type Err = Error;

    /// Parse `LOAD|SAVE <settings...> FROM|TO <layer>`.
    fn from_str(s: &str) -> Result<Self> {
        let words: Vec<&str> = s.trim().trim_end_matches(';').split_whitespace().collect();
        if words.len() < 4 {
            return Err(Error::invalid_layer(format!("malformed propagation statement \"{}\"", s.trim())));
        }

        let action: Action = words[0].parse()?;
        let layer: Layer = words[words.len() - 1].parse()?;
        let direction: Direction = words[words.len() - 2].parse()?;
        let settings: ConfigSettings = words[1..words.len() - 2].join(" ").parse()?;

        Ok(Self::new(action, settings, direction, layer))
    }
}

/// Outcome of one propagation.
///
/// Always `changed`: the channel offers no cheap way to tell whether the
/// target already held the same content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PropagationOutcome {
    pub changed: bool,
    pub statement: String,
    pub source: Layer,
    pub target: Layer,
}

/// Issues validated propagation statements against a channel.
pub struct Controller;

impl Controller {
    /// Validate `request` and execute it.
    ///
    /// Invalid transitions fail before the channel is touched.
    pub fn propagate<C>(channel: &mut C, request: &PropagationRequest) -> Result<PropagationOutcome>
    where
        C: AdminChannel + ?Sized,
    {
        let transition = request.transition()?;
        let statement = request.statement();

        tracing::info!(
            statement = %statement,
            source = %transition.source,
            target = %transition.target,
            "Propagating configuration"
        );

        channel.execute(&statement)?;
        metrics::record_propagation(request.settings);

        Ok(PropagationOutcome {
            changed: true,
            statement: statement.sql,
            source: transition.source,
            target: transition.target,
        })
    }
}
