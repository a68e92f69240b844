use argh::FromArgs;
use genfsm_backend::parse_row;
use genfsm_ir::Config;
use genfsm_utils::{FsmResult, OutputFile, structure};
use std::path::PathBuf;

#[derive(FromArgs)]
#[argh(help_triggers("-h", "--help"))]
/// Compiles a generator function into a Verilog state machine
pub struct Opts {
    /// input file. Reads from stdin when omitted
    #[argh(positional)]
    pub file: Option<PathBuf>,

    /// output file for the generated module, default is stdout
    #[argh(
        option,
        short = 'o',
        long = "output",
        default = "OutputFile::Stdout"
    )]
    pub output: OutputFile,

    /// how many clock boundaries may be folded into one state
    #[argh(option, short = 'O', long = "opt-level", default = "0")]
    pub opt_level: u32,

    /// width of every register and data port
    #[argh(option, long = "register-size", default = "32")]
    pub register_size: u64,

    /// name of the generated module. Defaults to the name of the generator
    #[argh(option, long = "module-name")]
    pub module_name: Option<String>,

    /// write a testbench driving the module with the --input rows
    #[argh(option, long = "testbench")]
    pub testbench: Option<OutputFile>,

    /// comma separated input values for one run, e.g. `5` or `3,-1`
    #[argh(option, long = "input")]
    pub input: Vec<String>,

    /// write the graph in Graphviz DOT format
    #[argh(option, long = "dot")]
    pub dot: Option<OutputFile>,

    /// write the graph as cytoscape elements
    #[argh(option, long = "json")]
    pub json: Option<OutputFile>,

    /// drive `_ready` randomly in the testbench
    #[argh(switch, long = "random-ready")]
    pub random_ready: bool,

    /// check the compiled machine against the generator on the --input rows
    #[argh(switch, long = "simulate")]
    pub simulate: bool,

    /// print the optimized graph to stderr
    #[argh(switch, long = "dump-graph")]
    pub dump_graph: bool,

    /// print the compilation options as JSON and exit
    #[argh(switch, long = "dump-config")]
    pub dump_config: bool,

    /// run this pass or alias instead of the default pipeline
    #[argh(option, short = 'p', long = "pass")]
    pub pass: Vec<String>,

    /// disable pass or alias
    #[argh(option, short = 'x', long = "disable-pass")]
    pub disable_pass: Vec<String>,

    /// list all the registered passes and aliases
    #[argh(switch, long = "list-passes")]
    pub list_passes: bool,

    /// logging level
    #[argh(option, long = "log-level", default = "log::LevelFilter::Warn")]
    pub log_level: log::LevelFilter,
}

impl Opts {
    /// Parse the command line and reject invalid compilation options.
    pub fn get_opts() -> FsmResult<Opts> {
        let opts: Opts = argh::from_env();
        opts.config().validate()?;
        Ok(opts)
    }

    /// Options passed on to the optimizer and the backends.
    pub fn config(&self) -> Config {
        Config {
            optimization_level: self.opt_level,
            register_size: self.register_size,
            module_name: self.module_name.clone(),
            random_ready: self.random_ready,
        }
    }

    /// The `--input` rows. Every row has the same number of values.
    pub fn rows(&self) -> FsmResult<Vec<Vec<i64>>> {
        let rows = self
            .input
            .iter()
            .map(|row| parse_row(row))
            .collect::<FsmResult<Vec<_>>>()?;
        structure::uniform_arity("--input rows", rows.iter().map(Vec::len))?;
        Ok(rows)
    }
}
