use std::fmt::Write;

use analysis::{cfg::WorklistOrder, solvers::WorklistSolver};
use clap::{Parser as CommandLineParser, ValueEnum};
use itertools::Itertools;
use oir_lib::{
    callgraph::CallGraph,
    cfg::Cfg,
    cha::build_call_graph,
    dataflow::{
        constprop::{self, ConstantPropagation},
        deadcode::find_dead_code,
        inter_constprop::InterConstantPropagation,
        livevar::{self, LiveVariables},
    },
    heap::HeapPolicy,
    ir::{MethodId, Program, StmtRef},
    lexer::Lexer,
    parser::Parser,
    pta::{
        PtaOptions, QueueOrder, SelectorKind, solve_ci, solve_cs,
        taint::{self, TaintConfig},
    },
};
use tracing::info;
use utils::DiagnosticEmitter;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, ValueEnum)]
pub enum CLIAnalyses {
    Constprop,
    Livevar,
    Deadcode,
    InterConstprop,
    Cha,
    Pta,
    Taint,
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, ValueEnum)]
pub enum CLIHeap {
    #[default]
    AllocationSite,
    Type,
}

impl From<CLIHeap> for HeapPolicy {
    fn from(value: CLIHeap) -> Self {
        match value {
            CLIHeap::AllocationSite => HeapPolicy::AllocationSite,
            CLIHeap::Type => HeapPolicy::Type,
        }
    }
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, ValueEnum)]
pub enum CLIQueueOrder {
    #[default]
    Fifo,
    Lifo,
}

impl From<CLIQueueOrder> for QueueOrder {
    fn from(value: CLIQueueOrder) -> Self {
        match value {
            CLIQueueOrder::Fifo => QueueOrder::Fifo,
            CLIQueueOrder::Lifo => QueueOrder::Lifo,
        }
    }
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, ValueEnum)]
pub enum CLIWorklist {
    #[default]
    Fifo,
    Lifo,
    Rpo,
}

impl From<CLIWorklist> for WorklistOrder {
    fn from(value: CLIWorklist) -> Self {
        match value {
            CLIWorklist::Fifo => WorklistOrder::Fifo,
            CLIWorklist::Lifo => WorklistOrder::Lifo,
            CLIWorklist::Rpo => WorklistOrder::ReversePostOrder,
        }
    }
}

#[derive(Debug, CommandLineParser, Default)]
#[command(
    name = "oir",
    version,
    about = "Run dataflow, call graph, pointer, and taint analyses on an object-oriented IR."
)]
pub struct Opt {
    /// Dump the control flow graph of every method in graphviz format.
    #[arg(long)]
    pub dump_cfg: bool,

    /// Name of the analysis to execute
    #[arg(long, value_name = "ANALYSIS_NAME")]
    pub analyze: Option<CLIAnalyses>,

    /// Signature of the entry method, e.g., "<Main: void main()>". Defaults
    /// to the first static method called main.
    #[arg(long, value_name = "SIGNATURE")]
    pub entry: Option<String>,

    /// Order in which the dataflow solver visits nodes.
    #[arg(long, value_enum, default_value_t)]
    pub worklist: CLIWorklist,

    /// Context sensitivity of the pointer analysis: ci, k-call, k-obj, or k-type.
    #[arg(long, default_value_t)]
    pub cs: SelectorKind,

    /// How allocations are abstracted into heap objects.
    #[arg(long, value_enum, default_value_t)]
    pub heap: CLIHeap,

    /// Order in which the pointer analysis drains its worklist.
    #[arg(long, value_enum, default_value_t)]
    pub order: CLIQueueOrder,

    /// YAML file with the pointer analysis options. Takes precedence over
    /// --cs, --heap, and --order.
    #[arg(long, value_name = "FILE")]
    pub pta_config: Option<String>,

    /// YAML file with the sources, sinks, and transfers of the taint analysis.
    #[arg(long, value_name = "FILE")]
    pub taint_config: Option<String>,

    /// File containing the program written in the language.
    pub filename: String,
}

pub fn process_source(src: &str, diag: &mut DiagnosticEmitter, opts: &Opt) -> Option<()> {
    let lexer = Lexer::new(src, diag);
    let tokens = lexer.lex_all();
    if tokens.tokens.is_empty() {
        return None;
    }
    let parser = Parser::new(tokens, diag);
    let program = parser.parse()?;

    if opts.dump_cfg {
        for method in methods_with_body(&program) {
            diag.out_ln(&Cfg::new(&program, method).to_dot(&program));
        }
    }

    let Some(analysis) = opts.analyze else {
        if !opts.dump_cfg {
            for method in methods_with_body(&program) {
                diag.out(&program.print_method(method, |_| None));
            }
        }
        return Some(());
    };

    let solver = WorklistSolver::new(opts.worklist.into());
    match analysis {
        CLIAnalyses::Constprop => {
            for method in methods_with_body(&program) {
                let facts = ConstantPropagation::analyze(&program, method, solver);
                diag.out(&facts.print(&program, |fact| constprop::describe_fact(&program, fact)));
            }
        }
        CLIAnalyses::Livevar => {
            for method in methods_with_body(&program) {
                let facts = LiveVariables::analyze(&program, method, solver);
                diag.out(&facts.print(&program, |fact| {
                    livevar::describe_fact(&program, method, fact)
                }));
            }
        }
        CLIAnalyses::Deadcode => {
            for method in methods_with_body(&program) {
                let dead = find_dead_code(&program, method, solver);
                diag.out(&program.print_method(method, |index| {
                    dead.contains(&index).then(|| "dead".to_owned())
                }));
            }
        }
        CLIAnalyses::InterConstprop => {
            let entry = entry_method(&program, diag, opts)?;
            let pta = solve_ci(&program, entry, &pta_options(diag, opts)?);
            let result = InterConstantPropagation::analyze(&program, entry, &pta, solver);
            diag.out(&result.print(&program));
        }
        CLIAnalyses::Cha => {
            let entry = entry_method(&program, diag, opts)?;
            diag.out(&describe_call_graph(&program, &build_call_graph(&program, entry)));
        }
        CLIAnalyses::Pta => {
            let entry = entry_method(&program, diag, opts)?;
            let options = pta_options(diag, opts)?;
            info!(cs = %options.cs, "Running pointer analysis");
            if options.cs == SelectorKind::Insensitive {
                let result = solve_ci(&program, entry, &options);
                diag.out(&result.describe(&program));
                diag.out(&describe_call_graph(&program, result.call_graph()));
            } else {
                let result = solve_cs(&program, entry, &options);
                diag.out(&result.describe(&program));
                let projected = result.to_context_insensitive();
                diag.out(&describe_call_graph(&program, projected.call_graph()));
            }
        }
        CLIAnalyses::Taint => {
            let entry = entry_method(&program, diag, opts)?;
            let options = pta_options(diag, opts)?;
            let Some(path) = &opts.taint_config else {
                diag.err_ln("The taint analysis needs a rule file, see --taint-config.");
                return None;
            };
            let config = match TaintConfig::from_file(&program, path) {
                Ok(config) => config,
                Err(err) => {
                    diag.err_ln(&err.to_string());
                    return None;
                }
            };
            for warning in config.warnings() {
                diag.warning(warning);
            }
            let (_, flows) = taint::analyze(&program, entry, &options, config);
            if flows.is_empty() {
                diag.out_ln("No taint flows found.");
            }
            for flow in flows {
                diag.out_ln(&flow.describe(&program));
            }
        }
    }

    Some(())
}

fn methods_with_body(program: &Program) -> Vec<MethodId> {
    program
        .method_ids()
        .filter(|&m| !program.method(m).stmts.is_empty())
        .collect()
}

fn entry_method(program: &Program, diag: &mut DiagnosticEmitter, opts: &Opt) -> Option<MethodId> {
    let entry = match &opts.entry {
        Some(signature) => program.method_by_signature(signature),
        None => program.main_method(),
    };
    if entry.is_none() {
        match &opts.entry {
            Some(signature) => diag.err_ln(&format!("Entry method '{signature}' not found.")),
            None => diag.err_ln("No main method found, use --entry to pick one."),
        }
    }
    entry
}

fn pta_options(diag: &mut DiagnosticEmitter, opts: &Opt) -> Option<PtaOptions> {
    let Some(path) = &opts.pta_config else {
        return Some(PtaOptions {
            cs: opts.cs,
            heap: opts.heap.into(),
            order: opts.order.into(),
        });
    };
    let options = std::fs::read_to_string(path)
        .map_err(|err| err.to_string())
        .and_then(|text| PtaOptions::from_yaml_str(&text).map_err(|err| err.to_string()));
    match options {
        Ok(options) => Some(options),
        Err(err) => {
            diag.err_ln(&format!("Cannot load pointer analysis options from '{path}': {err}"));
            None
        }
    }
}

/// The reachable methods in discovery order, then the call edges sorted by
/// call site.
fn describe_call_graph(program: &Program, call_graph: &CallGraph<StmtRef, MethodId>) -> String {
    let mut output = String::from("Reachable methods:\n");
    for &method in call_graph.reachable_methods() {
        writeln!(output, "  {}", program.method_signature(method)).unwrap();
    }
    output.push_str("Call edges:\n");
    for edge in call_graph.edges().iter().sorted_by_key(|e| (e.call_site, e.callee)) {
        writeln!(
            output,
            "  {} -> {}",
            program.describe_stmt(edge.call_site),
            program.method_signature(edge.callee)
        )
        .unwrap();
    }
    output
}
