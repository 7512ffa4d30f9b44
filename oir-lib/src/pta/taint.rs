//! Taint tracking on top of the pointer analysis. Tainted data is modeled
//! as synthetic heap objects created at the calls of source methods, so it
//! flows through the ordinary points-to machinery. Transfer rules add
//! edges to a separate taint flow graph that re-tag taint objects with the
//! type of the target slot. At the end of the analysis, every taint object
//! that reached a sink argument is reported as a flow.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::{
    ir::{Invoke, MethodId, Program, StmtRef, Type},
    pta::{
        CallEvent, Plugin, PtaHost, PtaOptions, cs,
        pfg::PointerId,
        points_to::PointsToSet,
        result::CsPointerAnalysisResult,
    },
};

#[derive(Debug, Error)]
pub enum TaintConfigError {
    #[error("cannot read taint config '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed taint config: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid slot '{0}', expected 'base', 'result', or an argument index")]
    Slot(String),
    #[error("argument index {index} is out of range for {method}")]
    ArgIndex { method: String, index: usize },
}

/// A value position at a call site.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Slot {
    Base,
    Result,
    Arg(usize),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transfer {
    pub from: Slot,
    pub to: Slot,
    /// The type taint is re-tagged with at `to`.
    pub ty: Type,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(default)]
    sources: Vec<RawSource>,
    #[serde(default)]
    sinks: Vec<RawSink>,
    #[serde(default)]
    transfers: Vec<RawTransfer>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawSource {
    method: String,
    #[serde(rename = "type")]
    ty: String,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawSink {
    method: String,
    index: usize,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawTransfer {
    method: String,
    from: RawSlot,
    to: RawSlot,
    #[serde(rename = "type")]
    ty: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawSlot {
    Index(usize),
    Name(String),
}

/// Taint rules resolved against a program, keyed by method.
#[derive(Clone, Debug, Default)]
pub struct TaintConfig {
    sources: HashMap<MethodId, Vec<Type>>,
    sinks: HashMap<MethodId, Vec<usize>>,
    transfers: HashMap<MethodId, Vec<Transfer>>,
    warnings: Vec<String>,
}

impl TaintConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse rules in the YAML format:
    ///
    /// ```yaml
    /// sources:
    ///   - { method: "<Source: String read()>", type: "String" }
    /// sinks:
    ///   - { method: "<Sink: void write(String)>", index: 0 }
    /// transfers:
    ///   - { method: "<String: String concat(String)>", from: base, to: result, type: "String" }
    /// ```
    ///
    /// Rules naming methods or types the program does not have are skipped
    /// with a warning.
    pub fn from_yaml_str(program: &Program, text: &str) -> Result<Self, TaintConfigError> {
        let raw: RawConfig = serde_yaml::from_str(text)?;
        let mut config = Self::new();
        for source in raw.sources {
            let Some((method, ty)) = config.resolve(program, &source.method, &source.ty) else {
                continue;
            };
            config.add_source(method, ty);
        }
        for sink in raw.sinks {
            let Some(method) = config.resolve_method(program, &sink.method) else {
                continue;
            };
            check_arg(program, method, Slot::Arg(sink.index))?;
            config.add_sink(method, sink.index);
        }
        for transfer in raw.transfers {
            let from = parse_slot(transfer.from)?;
            let to = parse_slot(transfer.to)?;
            let Some((method, ty)) = config.resolve(program, &transfer.method, &transfer.ty) else {
                continue;
            };
            check_arg(program, method, from)?;
            check_arg(program, method, to)?;
            config.add_transfer(method, Transfer { from, to, ty });
        }
        Ok(config)
    }

    pub fn from_file(program: &Program, path: impl AsRef<Path>) -> Result<Self, TaintConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| TaintConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml_str(program, &text)
    }

    pub fn add_source(&mut self, method: MethodId, ty: Type) {
        self.sources.entry(method).or_default().push(ty);
    }

    pub fn add_sink(&mut self, method: MethodId, index: usize) {
        self.sinks.entry(method).or_default().push(index);
    }

    pub fn add_transfer(&mut self, method: MethodId, transfer: Transfer) {
        self.transfers.entry(method).or_default().push(transfer);
    }

    pub fn sources_of(&self, method: MethodId) -> &[Type] {
        self.sources.get(&method).map_or(&[], Vec::as_slice)
    }

    pub fn sinks_of(&self, method: MethodId) -> &[usize] {
        self.sinks.get(&method).map_or(&[], Vec::as_slice)
    }

    pub fn transfers_of(&self, method: MethodId) -> &[Transfer] {
        self.transfers.get(&method).map_or(&[], Vec::as_slice)
    }

    /// The rules that were skipped, as readable messages.
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    fn resolve_method(&mut self, program: &Program, signature: &str) -> Option<MethodId> {
        let method = program.method_by_signature(signature);
        if method.is_none() {
            warn!(signature, "Taint rule names an unknown method");
            self.warnings
                .push(format!("Unknown method '{signature}' in taint config, rule skipped."));
        }
        method
    }

    fn resolve(
        &mut self,
        program: &Program,
        signature: &str,
        ty: &str,
    ) -> Option<(MethodId, Type)> {
        let method = self.resolve_method(program, signature)?;
        let Some(ty) = program.type_by_name(ty) else {
            warn!(ty, "Taint rule names an unknown type");
            self.warnings
                .push(format!("Unknown type '{ty}' in taint config, rule skipped."));
            return None;
        };
        Some((method, ty))
    }
}

fn parse_slot(raw: RawSlot) -> Result<Slot, TaintConfigError> {
    match raw {
        RawSlot::Index(index) => Ok(Slot::Arg(index)),
        RawSlot::Name(name) => match name.as_str() {
            "base" => Ok(Slot::Base),
            "result" => Ok(Slot::Result),
            _ => Err(TaintConfigError::Slot(name)),
        },
    }
}

fn check_arg(program: &Program, method: MethodId, slot: Slot) -> Result<(), TaintConfigError> {
    match slot {
        Slot::Arg(index) if index >= program.method(method).param_types.len() => {
            Err(TaintConfigError::ArgIndex {
                method: program.method_signature(method),
                index,
            })
        }
        _ => Ok(()),
    }
}

/// Tainted data produced at `source` reaches argument `index` of the call
/// at `sink`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaintFlow {
    pub source: StmtRef,
    pub sink: StmtRef,
    pub index: usize,
}

impl TaintFlow {
    pub fn describe(&self, program: &Program) -> String {
        format!(
            "TaintFlow{{{} -> {}/{}}}",
            program.describe_stmt(self.source),
            program.describe_stmt(self.sink),
            self.index
        )
    }
}

/// The taint analysis as a pointer analysis plugin. Works with either
/// solver.
pub struct TaintAnalysis<'p> {
    program: &'p Program,
    config: TaintConfig,
    /// Edges along which taint is re-tagged with the given type.
    taint_pfg: HashMap<PointerId, Vec<(PointerId, Type)>>,
    taint_edges: HashSet<(PointerId, PointerId, Type)>,
    sinks: BTreeSet<(StmtRef, PointerId, usize)>,
    flows: BTreeSet<TaintFlow>,
}

impl<'p> TaintAnalysis<'p> {
    pub fn new(program: &'p Program, config: TaintConfig) -> Self {
        Self {
            program,
            config,
            taint_pfg: HashMap::new(),
            taint_edges: HashSet::new(),
            sinks: BTreeSet::new(),
            flows: BTreeSet::new(),
        }
    }

    /// The flows found, ordered by source, sink, and argument index.
    pub fn flows(&self) -> &BTreeSet<TaintFlow> {
        &self.flows
    }

    pub fn into_flows(self) -> BTreeSet<TaintFlow> {
        self.flows
    }

    fn add_taint_edge<H: PtaHost>(
        &mut self,
        host: &mut H,
        from: PointerId,
        to: PointerId,
        ty: Type,
    ) {
        if !self.taint_edges.insert((from, to, ty.clone())) {
            return;
        }
        self.taint_pfg.entry(from).or_default().push((to, ty.clone()));
        let existing: Vec<H::Object> = host.points_to(from).iter().collect();
        transfer_taint(host, existing, to, &ty);
    }
}

/// Re-tag the taint objects among `objs` with `ty` and send them to `to`.
fn transfer_taint<H: PtaHost>(host: &mut H, objs: Vec<H::Object>, to: PointerId, ty: &Type) {
    let mut pts = PointsToSet::new();
    for obj in objs {
        if let Some(source) = host.heap().taint_source(host.base_object(obj)) {
            pts.insert(host.taint_object(source, ty.clone()));
        }
    }
    if !pts.is_empty() {
        host.add_points_to(to, pts);
    }
}

fn slot_pointer<H: PtaHost>(
    host: &mut H,
    context: H::Context,
    invoke: &Invoke,
    slot: Slot,
) -> Option<PointerId> {
    let var = match slot {
        Slot::Base => invoke.base?,
        Slot::Result => invoke.result?,
        Slot::Arg(index) => *invoke.args.get(index)?,
    };
    Some(host.var_pointer(context, var))
}

impl<H: PtaHost> Plugin<H> for TaintAnalysis<'_> {
    fn on_new_points_to_set(
        &mut self,
        host: &mut H,
        pointer: PointerId,
        delta: &PointsToSet<H::Object>,
    ) {
        let Some(targets) = self.taint_pfg.get(&pointer) else {
            return;
        };
        for (to, ty) in targets.clone() {
            transfer_taint(host, delta.iter().collect(), to, &ty);
        }
    }

    fn on_new_call_edge(&mut self, host: &mut H, event: &CallEvent<H::Context>) {
        let program = self.program;
        let Some(invoke) = program.stmt(event.call_site).as_invoke() else {
            return;
        };
        let context = event.caller_context;
        if let Some(result) = invoke.result {
            for ty in self.config.sources_of(event.callee).to_vec() {
                let obj = host.taint_object(event.call_site, ty);
                let pointer = host.var_pointer(context, result);
                host.add_points_to(pointer, PointsToSet::singleton(obj));
            }
        }
        for transfer in self.config.transfers_of(event.callee).to_vec() {
            let from = slot_pointer(host, context, invoke, transfer.from);
            let to = slot_pointer(host, context, invoke, transfer.to);
            if let (Some(from), Some(to)) = (from, to) {
                self.add_taint_edge(host, from, to, transfer.ty);
            }
        }
        for &index in self.config.sinks_of(event.callee) {
            if let Some(&arg) = invoke.args.get(index) {
                let pointer = host.var_pointer(context, arg);
                self.sinks.insert((event.call_site, pointer, index));
            }
        }
    }

    fn on_finish(&mut self, host: &H) {
        for &(sink, pointer, index) in &self.sinks {
            for obj in host.points_to(pointer).iter() {
                if let Some(source) = host.heap().taint_source(host.base_object(obj)) {
                    self.flows.insert(TaintFlow {
                        source,
                        sink,
                        index,
                    });
                }
            }
        }
        debug!(flows = self.flows.len(), "Taint analysis finished");
    }
}

/// Run the pointer analysis configured by `options` with taint tracking
/// and return its result together with the detected flows.
pub fn analyze(
    program: &Program,
    entry: MethodId,
    options: &PtaOptions,
    config: TaintConfig,
) -> (CsPointerAnalysisResult, BTreeSet<TaintFlow>) {
    let taint = TaintAnalysis::new(program, config);
    let (result, taint) = cs::Solver::with_plugin(program, options, taint).solve(entry);
    (result, taint.into_flows())
}
