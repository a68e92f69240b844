//! Driver for the genfsm compiler.
use crate::cmdline::Opts;
use genfsm_backend::{
    self as backend, Backend, Design, DotBackend, Icarus, JsonBackend,
    VerilogBackend, write_text,
};
use genfsm_frontend::{FunctionDef, Interpreter, lower};
use genfsm_ir::{self as ir, Config, IdCounter, Simulator};
use genfsm_opt::pass_manager::PassManager;
use genfsm_utils::{Error, FsmResult, OutputFile, wrap_signed};
use itertools::Itertools;

/// Lower `func` and run the pipeline selected by `incl`/`excl` over it. An
/// empty `incl` runs the default plan for the configured level.
pub fn compile_with(
    pm: &PassManager,
    func: &FunctionDef,
    config: Config,
    incl: &[String],
    excl: &[String],
) -> FsmResult<Design> {
    config.validate()?;
    let mut ids = IdCounter::default();
    let (ctx, graph) = lower(func, &mut ids)?;
    log::info!(
        "Lowered `{}` into {} node(s), {} state(s)",
        ctx.name,
        graph.len(),
        graph.states().len()
    );

    let level = config.optimization_level;
    let default_plan;
    let plan = if incl.is_empty() {
        default_plan = PassManager::plan(level);
        &default_plan
    } else {
        incl
    };
    let graph = pm.execute_plan(graph, &mut ids, level, plan, excl)?;
    log::info!(
        "Optimized `{}` at level {level}: {} node(s), {} state(s)",
        ctx.name,
        graph.len(),
        graph.states().len()
    );
    Ok(Design { ctx, graph, config })
}

/// Compile `func` with the default passes.
pub fn compile(func: &FunctionDef, config: Config) -> FsmResult<Design> {
    let pm = PassManager::default_passes()?;
    compile_with(&pm, func, config, &[], &[])
}

/// Render the testbench for `design` driven by `rows`.
pub fn render_testbench(
    design: &Design,
    rows: &[Vec<i64>],
) -> FsmResult<String> {
    let tb = backend::generate_testbench(&design.ctx, &design.config, rows)?;
    Ok(backend::module_lines(&tb).to_string())
}

/// Check the optimized graph against the reference interpreter on every
/// row. Returns the expected output tuples of all rows in order.
pub fn check_outputs(
    func: &FunctionDef,
    design: &Design,
    rows: &[Vec<i64>],
) -> FsmResult<Vec<Vec<i64>>> {
    let interp = Interpreter::new(func);
    let sim = Simulator::new(&design.ctx, &design.graph);
    let mut expected = vec![];
    for row in rows {
        let reference = interp.run(row)?;
        let trace = sim.run(row)?;
        if trace.outputs != reference {
            return Err(Error::misc(format!(
                "graph simulation of ({}) diverges from the generator: \
                 expected {:?}, got {:?}",
                row.iter().join(", "),
                reference,
                trace.outputs
            )));
        }
        log::info!(
            "({}) produced {} output(s) in {} cycle(s)",
            row.iter().join(", "),
            trace.outputs.len(),
            trace.cycles
        );
        expected.extend(reference);
    }
    Ok(expected)
}

/// Text produced by one compilation, built completely before anything is
/// written.
struct Artifacts {
    verilog: String,
    testbench: Option<String>,
    dot: Option<String>,
    json: Option<String>,
    graph_dump: Option<String>,
}

/// Run the compiler from the command line.
pub fn run_compiler() -> FsmResult<()> {
    // parse the command line arguments into Opts struct
    let opts = Opts::get_opts()?;

    // enable tracing
    env_logger::Builder::new()
        .format_timestamp(None)
        .filter_level(opts.log_level)
        .target(env_logger::Target::Stderr)
        .init();

    run(opts)
}

/// Compile the generator selected by `opts` and write every requested
/// output. All outputs are rendered before the first one is written, so a
/// failed compilation leaves no file behind.
pub fn run(mut opts: Opts) -> FsmResult<()> {
    let pm = PassManager::default_passes()?;

    // list all the avaliable pass options when flag --list-passes is enabled
    if opts.list_passes {
        println!("{}", pm.complete_help());
        return Ok(());
    }

    let config = opts.config();
    if opts.dump_config {
        let text = serde_json::to_string_pretty(&config).map_err(|err| {
            Error::misc(format!("failed to serialize options: {err}"))
        })?;
        println!("{text}");
        return Ok(());
    }

    let func = FunctionDef::construct(&opts.file)?;
    let design =
        compile_with(&pm, &func, config, &opts.pass, &opts.disable_pass)?;

    let mut rows = opts.rows()?;
    if rows.is_empty() && opts.simulate {
        if design.ctx.inputs().next().is_some() {
            return Err(Error::misc(
                "--simulate needs at least one --input row",
            ));
        }
        rows.push(vec![]);
    }

    VerilogBackend::validate(&design)?;
    let artifacts = Artifacts {
        verilog: VerilogBackend::render(&design)?,
        testbench: if opts.testbench.is_some() || opts.simulate {
            Some(render_testbench(&design, &rows)?)
        } else {
            None
        },
        dot: opts
            .dot
            .as_ref()
            .map(|_| DotBackend::render(&design))
            .transpose()?,
        json: opts
            .json
            .as_ref()
            .map(|_| JsonBackend::render(&design))
            .transpose()?,
        graph_dump: if opts.dump_graph {
            let mut buf = vec![];
            ir::Printer::write_graph(&design.ctx, &design.graph, &mut buf)?;
            Some(std::str::from_utf8(&buf)?.to_string())
        } else {
            None
        },
    };

    if let Some(dump) = &artifacts.graph_dump {
        write_text(dump, &mut OutputFile::Stderr)?;
    }
    write_text(&artifacts.verilog, &mut opts.output)?;
    for (text, file) in [
        (&artifacts.testbench, &mut opts.testbench),
        (&artifacts.dot, &mut opts.dot),
        (&artifacts.json, &mut opts.json),
    ] {
        if let (Some(text), Some(file)) = (text, file) {
            write_text(text, file)?;
        }
    }

    if opts.simulate {
        simulate(&func, &design, &rows, &artifacts)?;
    }
    Ok(())
}

fn simulate(
    func: &FunctionDef,
    design: &Design,
    rows: &[Vec<i64>],
    artifacts: &Artifacts,
) -> FsmResult<()> {
    let expected = check_outputs(func, design, rows)?;
    eprintln!("graph simulation: PASS");

    let icarus = Icarus::default();
    if !icarus.available() {
        log::warn!(
            "iverilog is not installed, skipping the Verilog simulation"
        );
        return Ok(());
    }
    let width = design.config.register_size;
    let expected = expected
        .into_iter()
        .map(|tuple| {
            tuple.into_iter().map(|v| wrap_signed(v, width)).collect()
        })
        .collect_vec();
    let top =
        backend::testbench_name(&design.config.module_name_for(&design.ctx));
    let testbench = artifacts.testbench.as_deref().unwrap_or_default();
    let report =
        icarus.simulate(&artifacts.verilog, testbench, &top, &expected)?;
    eprintln!("verilog simulation: {}", report.summary());
    if report.passed() {
        Ok(())
    } else {
        Err(Error::external_tool(
            "vvp",
            "simulated outputs differ from the generator",
        ))
    }
}
