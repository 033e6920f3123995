//! ---
//! cip_section: "11-simulation"
//! cip_subsection: "module"
//! cip_type: "source"
//! cip_scope: "code"
//! cip_description: "Process stages of the CIP cycle."
//! cip_version: "v0.1.0"
//! cip_owner: "tbd"
//! ---
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, IntoStaticStr};

/// Phase of the simulated CIP cycle. Exactly one is active at a time.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    Display,
    EnumIter,
    IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ProcessStage {
    #[default]
    Idle,
    TankMixing,
    TankMixed,
    Transferring,
    TransferCompleted,
    ReactorMixing,
    ReactorDraining,
    Completed,
}

impl ProcessStage {
    /// Position within one cycle; only the drain loop moves backwards.
    pub fn ordinal(self) -> u8 {
        match self {
            ProcessStage::Idle => 0,
            ProcessStage::TankMixing => 1,
            ProcessStage::TankMixed => 2,
            ProcessStage::Transferring => 3,
            ProcessStage::TransferCompleted => 4,
            ProcessStage::ReactorMixing => 5,
            ProcessStage::ReactorDraining => 6,
            ProcessStage::Completed => 7,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, ProcessStage::Completed)
    }

    /// Stages during which the reactor is being cleaned and conductivity decays.
    pub fn decays_conductivity(self) -> bool {
        matches!(
            self,
            ProcessStage::TransferCompleted | ProcessStage::ReactorMixing
        )
    }

    /// Stages in which heating, agitation, and reactor recirculation may be toggled.
    pub fn accepts_reactor_controls(self) -> bool {
        matches!(
            self,
            ProcessStage::Transferring
                | ProcessStage::TransferCompleted
                | ProcessStage::ReactorMixing
        )
    }

    /// Stage number shown to operators, if the stage has one.
    pub fn step_number(self) -> Option<u8> {
        match self {
            ProcessStage::TankMixing | ProcessStage::TankMixed => Some(1),
            ProcessStage::Transferring | ProcessStage::TransferCompleted => Some(2),
            ProcessStage::ReactorMixing => Some(3),
            ProcessStage::ReactorDraining => Some(4),
            ProcessStage::Idle | ProcessStage::Completed => None,
        }
    }

    pub fn description(self, cycle: u32) -> String {
        match self {
            ProcessStage::Idle => "Ready to start - begin tank recirculation".to_owned(),
            ProcessStage::TankMixing => {
                format!("Cycle {cycle} - Stage 1: mixing the solution in the supply tank")
            }
            ProcessStage::TankMixed => {
                format!("Cycle {cycle} - Stage 1: solution mixed, ready to transfer")
            }
            ProcessStage::Transferring => {
                format!("Cycle {cycle} - Stage 2: transferring to the reactor")
            }
            ProcessStage::TransferCompleted => {
                format!("Cycle {cycle} - Stage 2: transfer stopped, start reactor mixing")
            }
            ProcessStage::ReactorMixing => format!(
                "Cycle {cycle} - Stage 3: reactor recirculation until conductivity is near zero"
            ),
            ProcessStage::ReactorDraining => format!("Cycle {cycle} - Stage 4: draining"),
            ProcessStage::Completed => "Practice completed".to_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn ordinals_follow_declaration_order() {
        let ordinals: Vec<u8> = ProcessStage::iter().map(ProcessStage::ordinal).collect();
        assert_eq!(ordinals, (0..8).collect::<Vec<u8>>());
    }

    #[test]
    fn names_are_snake_case() {
        assert_eq!(ProcessStage::ReactorDraining.to_string(), "reactor_draining");
        let label: &'static str = ProcessStage::TankMixed.into();
        assert_eq!(label, "tank_mixed");
        assert_eq!(
            serde_json::to_string(&ProcessStage::TransferCompleted).unwrap(),
            "\"transfer_completed\""
        );
    }

    #[test]
    fn descriptions_carry_the_cycle() {
        assert!(ProcessStage::ReactorMixing.description(2).starts_with("Cycle 2"));
        assert_eq!(ProcessStage::Completed.description(3), "Practice completed");
    }
}
