//! Optional TOML configuration merged beneath command-line flags.

use std::{fs, path::Path};

use anyhow::{Context, Result};
use evac_attack_core::IntruderBehavior;
use evac_attack_system_intruder::DEFAULT_SPEED;
use serde::Deserialize;

/// Contents of a configuration file. Every key is optional.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct FileConfig {
    pub(crate) scenario: ScenarioSection,
    pub(crate) intruder: IntruderSection,
    pub(crate) sweep: SweepSection,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub(crate) struct ScenarioSection {
    pub(crate) density: Option<f64>,
    pub(crate) max_ticks: Option<u64>,
    pub(crate) crowd_motion: Option<bool>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub(crate) struct IntruderSection {
    pub(crate) entry: Option<usize>,
    pub(crate) behavior: Option<IntruderBehavior>,
    pub(crate) speed: Option<f64>,
    pub(crate) precompute: Option<bool>,
    pub(crate) disabled: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct SweepSection {
    pub(crate) behaviors: Option<Vec<IntruderBehavior>>,
    pub(crate) speeds: Option<Vec<f64>>,
    pub(crate) densities: Option<Vec<f64>>,
}

impl FileConfig {
    pub(crate) fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read configuration at {}", path.display()))?;
        Self::parse(&contents)
            .with_context(|| format!("failed to load configuration at {}", path.display()))
    }

    pub(crate) fn parse(contents: &str) -> Result<Self> {
        toml::from_str(contents).context("failed to parse configuration toml contents")
    }
}

/// Effective settings after flags have been laid over the file.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Settings {
    pub(crate) density: f64,
    pub(crate) max_ticks: u64,
    pub(crate) crowd_motion: bool,
    pub(crate) entry: usize,
    pub(crate) behavior: IntruderBehavior,
    pub(crate) speed: f64,
    pub(crate) precompute: bool,
    pub(crate) disabled: Vec<String>,
}

pub(crate) const DEFAULT_DENSITY: f64 = 0.3;
pub(crate) const DEFAULT_MAX_TICKS: u64 = 100_000;

/// Flags that may override the file.
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct Overrides {
    pub(crate) density: Option<f64>,
    pub(crate) max_ticks: Option<u64>,
    pub(crate) entry: Option<usize>,
    pub(crate) behavior: Option<IntruderBehavior>,
    pub(crate) speed: Option<f64>,
    pub(crate) precompute: bool,
    pub(crate) frozen_crowd: bool,
    pub(crate) disabled: Vec<String>,
}

impl Settings {
    pub(crate) fn resolve(file: &FileConfig, flags: &Overrides) -> Self {
        let disabled = if flags.disabled.is_empty() {
            file.intruder.disabled.clone()
        } else {
            flags.disabled.clone()
        };
        Self {
            density: flags
                .density
                .or(file.scenario.density)
                .unwrap_or(DEFAULT_DENSITY),
            max_ticks: flags
                .max_ticks
                .or(file.scenario.max_ticks)
                .unwrap_or(DEFAULT_MAX_TICKS),
            crowd_motion: !flags.frozen_crowd && file.scenario.crowd_motion.unwrap_or(true),
            entry: flags.entry.or(file.intruder.entry).unwrap_or(0),
            behavior: flags
                .behavior
                .or(file.intruder.behavior)
                .unwrap_or(IntruderBehavior::Advance),
            speed: flags.speed.or(file.intruder.speed).unwrap_or(DEFAULT_SPEED),
            precompute: flags.precompute || file.intruder.precompute.unwrap_or(false),
            disabled,
        }
    }
}
