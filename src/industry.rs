//! Efficiency modifiers applied to manufacturing jobs
//!
//! Everything here is pure: callers pass the [`EfficiencyContext`] and
//! skill levels explicitly.

use std::collections::HashMap;
use std::time::Duration;

use clap::ValueEnum;
use tracing::warn;

use crate::models::SkillId;

pub const INDUSTRY_SKILL: SkillId = 3380;
pub const ADVANCED_INDUSTRY_SKILL: SkillId = 3388;

const MAX_SKILL_LEVEL: u8 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, ValueEnum)]
pub enum FacilityType {
    #[default]
    Station,
    EngineeringComplex,
    AssemblyArray,
    ThukkerComponentArray,
    RapidAssemblyArray,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, ValueEnum)]
pub enum SecurityStatus {
    #[default]
    HighSec,
    LowSec,
    NullSecWh,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, ValueEnum)]
pub enum RigType {
    #[default]
    None,
    T1,
    T2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, ValueEnum)]
pub enum FacilitySize {
    #[default]
    Medium,
    Large,
    XLarge,
}

/// Lower bound for a discounted material quantity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, ValueEnum)]
pub enum MaterialFloor {
    /// At least one unit for every run
    #[default]
    PerRun,
    /// At least one unit for the whole node
    PerNode,
}

impl FacilityType {
    pub fn material_modifier(self) -> f64 {
        match self {
            FacilityType::Station => 1.0,
            FacilityType::EngineeringComplex => 0.99,
            FacilityType::AssemblyArray => 0.98,
            FacilityType::ThukkerComponentArray => 0.9,
            FacilityType::RapidAssemblyArray => 1.05,
        }
    }

    pub fn time_modifier(self, size: FacilitySize) -> f64 {
        match self {
            FacilityType::Station => 1.0,
            FacilityType::EngineeringComplex => match size {
                FacilitySize::Medium => 0.85,
                FacilitySize::Large => 0.8,
                FacilitySize::XLarge => 0.7,
            },
            FacilityType::AssemblyArray | FacilityType::ThukkerComponentArray => 0.75,
            FacilityType::RapidAssemblyArray => 0.65,
        }
    }

    /// Rigs can only be fitted to engineering complexes
    pub fn accepts_rigs(self) -> bool {
        self == FacilityType::EngineeringComplex
    }
}

impl SecurityStatus {
    pub fn rig_multiplier(self) -> f64 {
        match self {
            SecurityStatus::HighSec => 1.0,
            SecurityStatus::LowSec => 1.9,
            SecurityStatus::NullSecWh => 2.1,
        }
    }
}

impl RigType {
    pub fn material_bonus(self) -> f64 {
        match self {
            RigType::None => 0.0,
            RigType::T1 => 0.02,
            RigType::T2 => 0.024,
        }
    }

    pub fn time_bonus(self) -> f64 {
        match self {
            RigType::None => 0.0,
            RigType::T1 => 0.2,
            RigType::T2 => 0.24,
        }
    }
}

/// Facility attributes shared by every node of the tree
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EfficiencyContext {
    pub facility_type: FacilityType,
    pub security_status: SecurityStatus,
    pub material_rig: RigType,
    pub time_rig: RigType,
    pub facility_size: FacilitySize,
    pub material_floor: MaterialFloor,
}

impl EfficiencyContext {
    /// Multiplier for per-run material consumption
    pub fn material_modifier(&self, material_efficiency: u8) -> f64 {
        let rig = if self.facility_type.accepts_rigs() {
            1.0 - self.material_rig.material_bonus() * self.security_status.rig_multiplier()
        } else {
            1.0
        };
        (1.0 - f64::from(material_efficiency) / 100.0)
            * self.facility_type.material_modifier()
            * rig
    }

    /// Multiplier for per-run manufacturing time
    pub fn time_modifier(&self, time_efficiency: u8, skills: &ManufacturingSkills) -> f64 {
        let rig = if self.facility_type.accepts_rigs() {
            1.0 - self.time_rig.time_bonus() * self.security_status.rig_multiplier()
        } else {
            1.0
        };
        (1.0 - f64::from(time_efficiency) / 100.0)
            * self.facility_type.time_modifier(self.facility_size)
            * rig
            * skills.time_modifier()
    }
}

/// Skill levels relevant to manufacturing time
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManufacturingSkills {
    levels: HashMap<SkillId, u8>,
}

impl ManufacturingSkills {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn with_level(mut self, skill: SkillId, level: u8) -> Self {
        self.set_level(skill, level);
        self
    }

    pub fn set_level(&mut self, skill: SkillId, level: u8) {
        self.levels.insert(skill, level.min(MAX_SKILL_LEVEL));
    }

    pub fn level(&self, skill: SkillId) -> u8 {
        self.levels.get(&skill).copied().unwrap_or(0)
    }

    pub fn time_modifier(&self) -> f64 {
        (1.0 - 0.04 * f64::from(self.level(INDUSTRY_SKILL)))
            * (1.0 - 0.03 * f64::from(self.level(ADVANCED_INDUSTRY_SKILL)))
    }
}

/// Material units needed for `runs` runs of a blueprint entry
pub fn required_quantity(
    runs: u32,
    base_quantity: u64,
    modifier: f64,
    floor: MaterialFloor,
) -> u64 {
    if runs == 0 || base_quantity == 0 {
        return 0;
    }

    let total = f64::from(runs) * base_quantity as f64 * modifier;
    // round to cents first so 99.0000001 does not become 100
    let quantity = ((total * 100.0).round() / 100.0).ceil() as u64;

    let minimum = match floor {
        MaterialFloor::PerRun => u64::from(runs),
        MaterialFloor::PerNode => 1,
    };
    quantity.max(minimum)
}

/// Runs needed to produce `quantity` units, saturating at `u32::MAX`
pub fn runs_for(quantity: u64, quantity_produced: u64) -> u32 {
    let runs = quantity.div_ceil(quantity_produced.max(1));
    u32::try_from(runs).unwrap_or_else(|_| {
        warn!(quantity, quantity_produced, runs, "Run count exceeds u32::MAX, capping");
        u32::MAX
    })
}

pub fn time_to_manufacture(base_time: Duration, runs: u32, modifier: f64) -> Duration {
    let seconds = base_time.as_secs_f64() * f64::from(runs) * modifier;
    Duration::from_secs(seconds.round() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_station_has_no_bonus() {
        let ctx = EfficiencyContext::default();
        assert!(close(ctx.material_modifier(0), 1.0));
        assert!(close(ctx.time_modifier(0, &ManufacturingSkills::new()), 1.0));
    }

    #[test]
    fn test_material_efficiency_and_facility() {
        let ctx = EfficiencyContext {
            facility_type: FacilityType::AssemblyArray,
            ..Default::default()
        };
        assert!(close(ctx.material_modifier(10), 0.9 * 0.98));
    }

    #[test]
    fn test_rigs_only_apply_in_engineering_complex() {
        let mut ctx = EfficiencyContext {
            facility_type: FacilityType::Station,
            security_status: SecurityStatus::LowSec,
            material_rig: RigType::T1,
            time_rig: RigType::T2,
            ..Default::default()
        };
        assert!(close(ctx.material_modifier(0), 1.0));

        ctx.facility_type = FacilityType::EngineeringComplex;
        assert!(close(ctx.material_modifier(0), 0.99 * (1.0 - 0.02 * 1.9)));
        assert!(close(
            ctx.time_modifier(0, &ManufacturingSkills::new()),
            0.85 * (1.0 - 0.24 * 1.9)
        ));
    }

    #[test]
    fn test_engineering_complex_time_depends_on_size() {
        let ec = FacilityType::EngineeringComplex;
        assert!(close(ec.time_modifier(FacilitySize::Medium), 0.85));
        assert!(close(ec.time_modifier(FacilitySize::Large), 0.8));
        assert!(close(ec.time_modifier(FacilitySize::XLarge), 0.7));
        assert!(close(FacilityType::AssemblyArray.time_modifier(FacilitySize::XLarge), 0.75));
    }

    #[test]
    fn test_skills_reduce_time() {
        let skills = ManufacturingSkills::new()
            .with_level(INDUSTRY_SKILL, 5)
            .with_level(ADVANCED_INDUSTRY_SKILL, 9);
        assert_eq!(skills.level(ADVANCED_INDUSTRY_SKILL), 5);
        assert!(close(skills.time_modifier(), 0.8 * 0.85));
    }

    #[test]
    fn test_required_quantity_rounds_up() {
        // 10 runs * 5 * 0.9 = 45
        assert_eq!(required_quantity(10, 5, 0.9, MaterialFloor::PerRun), 45);
        // 3 runs * 7 * 0.9 = 18.9
        assert_eq!(required_quantity(3, 7, 0.9, MaterialFloor::PerRun), 19);
        // float noise just above an integer is absorbed
        assert_eq!(required_quantity(1, 100, 0.99 * (1.0 / 0.99), MaterialFloor::PerRun), 100);
    }

    #[test]
    fn test_per_run_floor() {
        // 10 runs * 1 * 0.9 = 9, but never below one per run
        assert_eq!(required_quantity(10, 1, 0.9, MaterialFloor::PerRun), 10);
        assert_eq!(required_quantity(10, 1, 0.9, MaterialFloor::PerNode), 9);
        assert_eq!(required_quantity(1, 1, 0.01, MaterialFloor::PerNode), 1);
    }

    #[test]
    fn test_zero_runs_need_nothing() {
        assert_eq!(required_quantity(0, 5, 1.0, MaterialFloor::PerRun), 0);
        assert_eq!(required_quantity(0, 5, 1.0, MaterialFloor::PerNode), 0);
    }

    #[test]
    fn test_runs_for() {
        assert_eq!(runs_for(0, 100), 0);
        assert_eq!(runs_for(1, 100), 1);
        assert_eq!(runs_for(100, 100), 1);
        assert_eq!(runs_for(101, 100), 2);
        assert_eq!(runs_for(5, 0), 5);
    }

    #[test]
    fn test_runs_for_caps_at_u32_max() {
        crate::logging::init_test();
        assert_eq!(runs_for(u64::MAX, 1), u32::MAX);
        assert_eq!(runs_for(u64::from(u32::MAX) * 2, 2), u32::MAX);
        assert_eq!(runs_for(u64::from(u32::MAX) * 2 + 1, 2), u32::MAX);
    }

    #[test]
    fn test_time_to_manufacture() {
        let base = Duration::from_secs(600);
        assert_eq!(time_to_manufacture(base, 3, 1.0), Duration::from_secs(1800));
        assert_eq!(time_to_manufacture(base, 3, 0.8), Duration::from_secs(1440));
        assert_eq!(time_to_manufacture(base, 0, 0.8), Duration::ZERO);
    }
}
