//! Coupling topology descriptor.
//!
//! The descriptor is plain data: participants, the meshes they provide or
//! receive, the fields they read and write, and the coupling scheme. It is
//! `serde`-deserializable so an adapter can load it from whatever format it
//! prefers, or build it in code with the `with_*` helpers.
//!
//! Validation is split in two. [`CouplingConfig::resolve`] runs when a
//! session is constructed and checks that every name resolves and the scheme
//! is well-formed. [`ParticipantPlan::check_wiring`] runs at `initialize`
//! and checks that everything the participant declared is actually connected
//! to a partner.

use serde::{Deserialize, Serialize};

use crate::coupling_error::CouplingError;
use crate::data::field::Arity;

fn config_err(msg: impl Into<String>) -> CouplingError {
    CouplingError::Configuration(msg.into())
}

/// Whether partners compute one after the other or at the same time.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SchemeOrder {
    Serial,
    Parallel,
}

/// Whether a time window is computed once or iterated to convergence.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SchemeKind {
    Explicit,
    Implicit,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MappingDirection {
    /// Own mesh → partner mesh, evaluated before sending.
    Write,
    /// Partner mesh → own mesh, evaluated after receiving.
    Read,
}

/// Convergence criterion on the change of one field between iterations.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum MeasureKind {
    /// `‖x_k − x_{k−1}‖ ≤ limit`
    Absolute { limit: f64 },
    /// `‖x_k − x_{k−1}‖ ≤ limit · ‖x_k‖`
    Relative { limit: f64 },
    /// `‖x_k − x_{k−1}‖ ≤ limit · ‖x_1 − x_0‖` (first change of the window)
    ResidualRelative { limit: f64 },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MeasureConfig {
    pub data: String,
    pub mesh: String,
    #[serde(flatten)]
    pub kind: MeasureKind,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConvergencePolicy {
    /// Iterations after which a window ends regardless of the measures.
    pub max_iterations: u32,
    /// Iterations that are always performed, even if measures are met.
    #[serde(default = "one")]
    pub min_iterations: u32,
    /// All measures must be met for the window to converge.
    #[serde(default)]
    pub measures: Vec<MeasureConfig>,
}

fn one() -> u32 {
    1
}

impl Default for ConvergencePolicy {
    fn default() -> Self {
        Self {
            max_iterations: 50,
            min_iterations: 1,
            measures: Vec::new(),
        }
    }
}

impl ConvergencePolicy {
    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_min_iterations(mut self, min_iterations: u32) -> Self {
        self.min_iterations = min_iterations;
        self
    }

    pub fn with_measure(mut self, data: &str, mesh: &str, kind: MeasureKind) -> Self {
        self.measures.push(MeasureConfig {
            data: data.to_owned(),
            mesh: mesh.to_owned(),
            kind,
        });
        self
    }
}

/// Data flowing from one participant to the other on a mesh.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExchangeConfig {
    pub data: String,
    pub mesh: String,
    pub from: String,
    pub to: String,
    /// Sender provides initial values through `initialize_data`.
    #[serde(default)]
    pub initialize: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SchemeConfig {
    pub order: SchemeOrder,
    pub kind: SchemeKind,
    /// Participant computing first in serial order.
    pub first: String,
    /// Partner; the convergence controller in implicit schemes.
    pub second: String,
    pub time_window_size: f64,
    #[serde(default)]
    pub max_time: Option<f64>,
    #[serde(default)]
    pub max_time_windows: Option<u64>,
    #[serde(default)]
    pub exchanges: Vec<ExchangeConfig>,
    #[serde(default)]
    pub convergence: ConvergencePolicy,
    /// Signal an export point every this many completed time windows.
    #[serde(default)]
    pub export_interval: Option<u64>,
}

impl SchemeConfig {
    pub fn new(order: SchemeOrder, kind: SchemeKind, first: &str, second: &str, time_window_size: f64) -> Self {
        Self {
            order,
            kind,
            first: first.to_owned(),
            second: second.to_owned(),
            time_window_size,
            max_time: None,
            max_time_windows: None,
            exchanges: Vec::new(),
            convergence: ConvergencePolicy::default(),
            export_interval: None,
        }
    }

    pub fn with_max_time(mut self, max_time: f64) -> Self {
        self.max_time = Some(max_time);
        self
    }

    pub fn with_max_time_windows(mut self, windows: u64) -> Self {
        self.max_time_windows = Some(windows);
        self
    }

    pub fn with_exchange(mut self, data: &str, mesh: &str, from: &str, to: &str, initialize: bool) -> Self {
        self.exchanges.push(ExchangeConfig {
            data: data.to_owned(),
            mesh: mesh.to_owned(),
            from: from.to_owned(),
            to: to.to_owned(),
            initialize,
        });
        self
    }

    pub fn with_convergence(mut self, convergence: ConvergencePolicy) -> Self {
        self.convergence = convergence;
        self
    }

    pub fn with_export_interval(mut self, every: u64) -> Self {
        self.export_interval = Some(every);
        self
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DataConfig {
    pub name: String,
    pub arity: Arity,
}

/// A mesh the participant reads from a partner.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReceivedMesh {
    pub mesh: String,
    pub from: String,
}

/// A field the participant reads or writes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataUse {
    pub data: String,
    pub mesh: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MappingConfig {
    pub from: String,
    pub to: String,
    pub direction: MappingDirection,
}

#[derive(Clone, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct ParticipantConfig {
    pub name: String,
    #[serde(default)]
    pub provides: Vec<String>,
    #[serde(default)]
    pub receives: Vec<ReceivedMesh>,
    #[serde(default)]
    pub write_data: Vec<DataUse>,
    #[serde(default)]
    pub read_data: Vec<DataUse>,
    #[serde(default)]
    pub mappings: Vec<MappingConfig>,
}

impl ParticipantConfig {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            ..Self::default()
        }
    }

    pub fn provides(mut self, mesh: &str) -> Self {
        self.provides.push(mesh.to_owned());
        self
    }

    pub fn receives(mut self, mesh: &str, from: &str) -> Self {
        self.receives.push(ReceivedMesh {
            mesh: mesh.to_owned(),
            from: from.to_owned(),
        });
        self
    }

    pub fn writes(mut self, data: &str, mesh: &str) -> Self {
        self.write_data.push(DataUse {
            data: data.to_owned(),
            mesh: mesh.to_owned(),
        });
        self
    }

    pub fn reads(mut self, data: &str, mesh: &str) -> Self {
        self.read_data.push(DataUse {
            data: data.to_owned(),
            mesh: mesh.to_owned(),
        });
        self
    }

    pub fn maps(mut self, from: &str, to: &str, direction: MappingDirection) -> Self {
        self.mappings.push(MappingConfig {
            from: from.to_owned(),
            to: to.to_owned(),
            direction,
        });
        self
    }

    /// Meshes this participant uses, provided ones first.
    fn used_meshes(&self) -> impl Iterator<Item = &str> {
        self.provides
            .iter()
            .map(String::as_str)
            .chain(self.receives.iter().map(|r| r.mesh.as_str()))
    }

    fn uses_mesh(&self, mesh: &str) -> bool {
        self.used_meshes().any(|m| m == mesh)
    }
}

/// Complete description of one coupled run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CouplingConfig {
    /// Spatial dimension D of every mesh, 2 or 3.
    pub dimensions: usize,
    /// Every mesh of the run; registration order fixes mesh IDs.
    pub meshes: Vec<String>,
    pub data: Vec<DataConfig>,
    pub participants: Vec<ParticipantConfig>,
    pub scheme: SchemeConfig,
    /// Fail `advance` while a checkpoint action is still pending.
    #[serde(default)]
    pub strict_actions: bool,
}

/// Which end of the scheme a participant is.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Role {
    First,
    Second,
}

/// The slice of a [`CouplingConfig`] one participant acts on, with all
/// names checked.
#[derive(Clone, Debug)]
pub struct ParticipantPlan {
    pub name: String,
    pub role: Role,
    pub partner: String,
    pub participant: ParticipantConfig,
    /// Exchanges this participant sends.
    pub sends: Vec<ExchangeConfig>,
    /// Exchanges this participant receives.
    pub receives: Vec<ExchangeConfig>,
}

impl ParticipantPlan {
    /// Whether any data is initialized through `initialize_data`.
    pub fn needs_initial_exchange(&self) -> bool {
        self.sends.iter().chain(&self.receives).any(|x| x.initialize)
    }

    /// Whether this participant provides initial values.
    pub fn writes_initial_data(&self) -> bool {
        self.sends.iter().any(|x| x.initialize)
    }

    /// Connection checks run at `initialize`.
    ///
    /// Every used mesh must carry an exchange or a mapping, every field must
    /// take part in an exchange, and every received mesh must be provided by
    /// the partner it names.
    pub fn check_wiring(&self, config: &CouplingConfig) -> Result<(), CouplingError> {
        let me = &self.participant;
        for received in &me.receives {
            let provider = config
                .participants
                .iter()
                .find(|p| p.name == received.from)
                .ok_or_else(|| config_err(format!("mesh `{}` is received from unknown participant `{}`", received.mesh, received.from)))?;
            if provider.name == me.name || !provider.provides.contains(&received.mesh) {
                return Err(config_err(format!(
                    "participant `{}` receives mesh `{}` from `{}`, which does not provide it",
                    me.name, received.mesh, received.from
                )));
            }
        }

        let exchanged = |data: &str, mesh: &str| {
            self.sends
                .iter()
                .chain(&self.receives)
                .any(|x| x.data == data && x.mesh == mesh)
        };
        let mapped = |mesh: &str| me.mappings.iter().any(|m| m.from == mesh || m.to == mesh);
        for mesh in me.used_meshes() {
            let carries_exchange = self.sends.iter().chain(&self.receives).any(|x| x.mesh == mesh);
            if !carries_exchange && !mapped(mesh) {
                return Err(config_err(format!(
                    "mesh `{mesh}` of participant `{}` is not wired to any partner",
                    me.name
                )));
            }
        }
        for (uses, dir) in [(&me.write_data, "written"), (&me.read_data, "read")] {
            for u in uses {
                let flows = exchanged(&u.data, &u.mesh)
                    || self
                        .sends
                        .iter()
                        .chain(&self.receives)
                        .any(|x| x.data == u.data && mapped(&u.mesh));
                if !flows {
                    return Err(config_err(format!(
                        "data `{}` {dir} on mesh `{}` by `{}` is never exchanged",
                        u.data, u.mesh, me.name
                    )));
                }
            }
        }
        Ok(())
    }
}

impl CouplingConfig {
    pub fn new(dimensions: usize, scheme: SchemeConfig) -> Self {
        Self {
            dimensions,
            meshes: Vec::new(),
            data: Vec::new(),
            participants: Vec::new(),
            scheme,
            strict_actions: false,
        }
    }

    pub fn with_mesh(mut self, name: &str) -> Self {
        self.meshes.push(name.to_owned());
        self
    }

    pub fn with_data(mut self, name: &str, arity: Arity) -> Self {
        self.data.push(DataConfig {
            name: name.to_owned(),
            arity,
        });
        self
    }

    pub fn with_participant(mut self, participant: ParticipantConfig) -> Self {
        self.participants.push(participant);
        self
    }

    pub fn with_strict_actions(mut self, strict: bool) -> Self {
        self.strict_actions = strict;
        self
    }

    pub fn arity_of(&self, data: &str) -> Option<Arity> {
        self.data.iter().find(|d| d.name == data).map(|d| d.arity)
    }

    fn has_mesh(&self, mesh: &str) -> bool {
        self.meshes.iter().any(|m| m == mesh)
    }

    fn check_mesh(&self, mesh: &str, context: &str) -> Result<(), CouplingError> {
        if self.has_mesh(mesh) {
            Ok(())
        } else {
            Err(config_err(format!("{context} names unknown mesh `{mesh}`")))
        }
    }

    fn check_data(&self, data: &str, context: &str) -> Result<(), CouplingError> {
        if self.arity_of(data).is_some() {
            Ok(())
        } else {
            Err(config_err(format!("{context} names unknown data `{data}`")))
        }
    }

    fn check_unique<'a>(names: impl Iterator<Item = &'a str>, what: &str) -> Result<(), CouplingError> {
        let mut seen = hashbrown::HashSet::new();
        for n in names {
            if !seen.insert(n) {
                return Err(config_err(format!("{what} `{n}` is declared twice")));
            }
        }
        Ok(())
    }

    /// Structural validation and the view of the run for `participant`.
    pub fn resolve(&self, participant: &str) -> Result<ParticipantPlan, CouplingError> {
        if !(2..=3).contains(&self.dimensions) {
            return Err(config_err(format!("dimensions must be 2 or 3, got {}", self.dimensions)));
        }
        Self::check_unique(self.meshes.iter().map(String::as_str), "mesh")?;
        Self::check_unique(self.data.iter().map(|d| d.name.as_str()), "data")?;
        Self::check_unique(self.participants.iter().map(|p| p.name.as_str()), "participant")?;
        self.check_scheme()?;

        let me = self
            .participants
            .iter()
            .find(|p| p.name == participant)
            .ok_or_else(|| config_err(format!("participant `{participant}` is not declared")))?;
        let (role, partner) = if self.scheme.first == participant {
            (Role::First, self.scheme.second.clone())
        } else if self.scheme.second == participant {
            (Role::Second, self.scheme.first.clone())
        } else {
            return Err(config_err(format!(
                "participant `{participant}` is not part of the coupling scheme"
            )));
        };

        let ctx = format!("participant `{participant}`");
        for mesh in me.used_meshes() {
            self.check_mesh(mesh, &ctx)?;
        }
        Self::check_unique(me.used_meshes(), "used mesh")?;
        for u in me.write_data.iter().chain(&me.read_data) {
            self.check_data(&u.data, &ctx)?;
            if !me.uses_mesh(&u.mesh) {
                return Err(config_err(format!(
                    "{ctx} uses data `{}` on mesh `{}`, which it neither provides nor receives",
                    u.data, u.mesh
                )));
            }
        }
        for m in &me.mappings {
            for mesh in [&m.from, &m.to] {
                if !me.uses_mesh(mesh) {
                    return Err(config_err(format!("{ctx} maps mesh `{mesh}`, which it does not use")));
                }
            }
        }

        let sends: Vec<_> = self
            .scheme
            .exchanges
            .iter()
            .filter(|x| x.from == participant)
            .cloned()
            .collect();
        let receives: Vec<_> = self
            .scheme
            .exchanges
            .iter()
            .filter(|x| x.to == participant)
            .cloned()
            .collect();
        for x in &sends {
            if !me.write_data.iter().any(|u| u.data == x.data) {
                return Err(config_err(format!("{ctx} sends data `{}` but never writes it", x.data)));
            }
        }
        for x in &receives {
            if !me.read_data.iter().any(|u| u.data == x.data) {
                return Err(config_err(format!("{ctx} receives data `{}` but never reads it", x.data)));
            }
        }
        Ok(ParticipantPlan {
            name: participant.to_owned(),
            role,
            partner,
            participant: me.clone(),
            sends,
            receives,
        })
    }

    fn check_scheme(&self) -> Result<(), CouplingError> {
        let s = &self.scheme;
        if s.first == s.second {
            return Err(config_err("scheme needs two distinct participants"));
        }
        for p in [&s.first, &s.second] {
            if !self.participants.iter().any(|q| &q.name == p) {
                return Err(config_err(format!("scheme names unknown participant `{p}`")));
            }
        }
        if !(s.time_window_size.is_finite() && s.time_window_size > 0.0) {
            return Err(config_err(format!(
                "time window size must be positive, got {}",
                s.time_window_size
            )));
        }
        match (s.max_time, s.max_time_windows) {
            (None, None) => return Err(config_err("scheme needs max-time or max-time-windows")),
            (Some(t), _) if !(t.is_finite() && t > 0.0) => {
                return Err(config_err(format!("max time must be positive, got {t}")));
            }
            (_, Some(0)) => return Err(config_err("max time windows must be at least 1")),
            _ => {}
        }
        if s.export_interval == Some(0) {
            return Err(config_err("export interval must be at least 1"));
        }
        for x in &s.exchanges {
            let ctx = format!("exchange of `{}`", x.data);
            self.check_data(&x.data, &ctx)?;
            self.check_mesh(&x.mesh, &ctx)?;
            let endpoints = [s.first.as_str(), s.second.as_str()];
            if x.from == x.to || !endpoints.contains(&x.from.as_str()) || !endpoints.contains(&x.to.as_str()) {
                return Err(config_err(format!(
                    "{ctx} must run between `{}` and `{}`, got `{}` → `{}`",
                    s.first, s.second, x.from, x.to
                )));
            }
        }
        if s.order == SchemeOrder::Serial {
            if let Some(x) = s.exchanges.iter().find(|x| x.initialize && x.from == s.first) {
                return Err(config_err(format!(
                    "serial scheme: only the second participant may initialize data, but `{}` is initialized by `{}`",
                    x.data, x.from
                )));
            }
        }
        if s.kind == SchemeKind::Implicit {
            let c = &s.convergence;
            if c.max_iterations == 0 || c.min_iterations == 0 || c.min_iterations > c.max_iterations {
                return Err(config_err(format!(
                    "iteration bounds must satisfy 1 ≤ min ({}) ≤ max ({})",
                    c.min_iterations, c.max_iterations
                )));
            }
            for m in &c.measures {
                let ctx = "convergence measure";
                self.check_data(&m.data, ctx)?;
                self.check_mesh(&m.mesh, ctx)?;
                let limit = match m.kind {
                    MeasureKind::Absolute { limit }
                    | MeasureKind::Relative { limit }
                    | MeasureKind::ResidualRelative { limit } => limit,
                };
                if !(limit.is_finite() && limit > 0.0) {
                    return Err(config_err(format!("{ctx} on `{}` needs a positive limit", m.data)));
                }
            }
        }
        Ok(())
    }
}
