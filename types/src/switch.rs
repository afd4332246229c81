//! Static per-switch configuration.

use serde::{Deserialize, Deserializer, Serialize};

use crate::SwitchName;

/// How a switch presents itself to the host.
///
/// The kind only changes what the host sees; propagation is identical for
/// every kind because the engine only ever tracks a boolean.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceKind {
    /// A plain on/off switch.
    #[default]
    Switch,
    /// A window-covering style device driven to fully open or fully closed.
    Blinds,
}

/// The host-facing attribute a switch listens on for set requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Characteristic {
    On,
    TargetPosition,
}

/// A value pushed to the host representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostValue {
    On(bool),
    /// Percent open, 0..=100.
    Position(u8),
}

impl HostValue {
    /// Boolean a host-side write of this value requests. Any opening counts as on.
    #[must_use]
    pub const fn is_on(self) -> bool {
        match self {
            Self::On(on) => on,
            Self::Position(pct) => pct > 0,
        }
    }
}

impl ServiceKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Switch => "switch",
            Self::Blinds => "blinds",
        }
    }

    /// Service type name as announced to the host.
    #[must_use]
    pub const fn service_type(self) -> &'static str {
        match self {
            Self::Switch => "Switch",
            Self::Blinds => "WindowCovering",
        }
    }

    #[must_use]
    pub const fn characteristic(self) -> Characteristic {
        match self {
            Self::Switch => Characteristic::On,
            Self::Blinds => Characteristic::TargetPosition,
        }
    }

    /// Host value mirroring an applied boolean state.
    #[must_use]
    pub const fn reflect(self, state: bool) -> HostValue {
        match self {
            Self::Switch => HostValue::On(state),
            Self::Blinds => HostValue::Position(if state { 100 } else { 0 }),
        }
    }

    /// Host value used to bounce a stale re-assertion back to rest.
    #[must_use]
    pub const fn released(self) -> HostValue {
        self.reflect(false)
    }
}

/// Static configuration for one switch, loaded once at registration.
///
/// `depends_on` and `depends_off` behave as ordered sets: duplicates are
/// dropped on load and the first occurrence keeps its position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwitchConfig {
    pub name: SwitchName,
    /// All of these must be on for this switch to turn on automatically.
    #[serde(
        default,
        alias = "dependsOn",
        deserialize_with = "deserialize_ordered_set"
    )]
    pub depends_on: Vec<SwitchName>,
    /// All of these must be off for this switch to turn off automatically.
    #[serde(
        default,
        alias = "dependsOff",
        deserialize_with = "deserialize_ordered_set"
    )]
    pub depends_off: Vec<SwitchName>,
    /// Raise this switch's diagnostics from debug to info level.
    #[serde(default)]
    pub debug: bool,
    #[serde(default, alias = "type")]
    pub kind: ServiceKind,
}

impl SwitchConfig {
    #[must_use]
    pub fn new(name: SwitchName) -> Self {
        Self {
            name,
            depends_on: Vec::new(),
            depends_off: Vec::new(),
            debug: false,
            kind: ServiceKind::default(),
        }
    }

    #[must_use]
    pub fn with_depends_on(mut self, names: impl IntoIterator<Item = SwitchName>) -> Self {
        self.depends_on = ordered_set(names);
        self
    }

    #[must_use]
    pub fn with_depends_off(mut self, names: impl IntoIterator<Item = SwitchName>) -> Self {
        self.depends_off = ordered_set(names);
        self
    }

    #[must_use]
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    #[must_use]
    pub fn with_kind(mut self, kind: ServiceKind) -> Self {
        self.kind = kind;
        self
    }

    /// The dependency list consulted when propagating `state`.
    #[must_use]
    pub fn dependencies_for(&self, state: bool) -> &[SwitchName] {
        if state {
            &self.depends_on
        } else {
            &self.depends_off
        }
    }

    /// Whether a change of `name` to `state` makes this switch a candidate.
    #[must_use]
    pub fn listens_to(&self, name: &str, state: bool) -> bool {
        self.dependencies_for(state)
            .iter()
            .any(|dep| dep.as_str() == name)
    }
}

fn ordered_set(names: impl IntoIterator<Item = SwitchName>) -> Vec<SwitchName> {
    let mut out: Vec<SwitchName> = Vec::new();
    for name in names {
        if !out.contains(&name) {
            out.push(name);
        }
    }
    out
}

fn deserialize_ordered_set<'de, D>(deserializer: D) -> Result<Vec<SwitchName>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Vec::<SwitchName>::deserialize(deserializer)?;
    Ok(ordered_set(raw))
}
