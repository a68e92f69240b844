//! Runs generated designs with Icarus Verilog. The design and its testbench
//! are written to a temporary directory, compiled with `iverilog` and run
//! with `vvp`.
use genfsm_utils::{Error, FsmResult};
use itertools::Itertools;
use std::process::{Command, Output};
use std::time::Instant;

/// Outcome of one simulation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SimulationReport {
    /// Everything the simulator printed.
    pub stdout: String,
    /// Output tuples displayed by the testbench.
    pub outputs: Vec<Vec<i64>>,
    /// Output tuples the simulation was checked against.
    pub expected: Vec<Vec<i64>>,
}

impl SimulationReport {
    pub fn passed(&self) -> bool {
        self.outputs == self.expected
    }

    /// A human readable verdict.
    pub fn summary(&self) -> String {
        if self.passed() {
            format!("PASS: {} output(s) match", self.outputs.len())
        } else {
            let show = |rows: &[Vec<i64>]| {
                rows.iter()
                    .map(|r| format!("({})", r.iter().join(", ")))
                    .join(" ")
            };
            format!(
                "FAIL: expected {}\n      got {}",
                show(&self.expected),
                show(&self.outputs)
            )
        }
    }
}

/// Parse the comma separated integer lines printed by a testbench. Any
/// other line is simulator chatter and ignored.
pub fn parse_outputs(stdout: &str) -> Vec<Vec<i64>> {
    stdout
        .lines()
        .filter_map(|line| {
            line.split(',')
                .map(|v| v.trim().parse::<i64>().ok())
                .collect::<Option<Vec<_>>>()
        })
        .collect()
}

pub struct Icarus {
    iverilog: String,
    vvp: String,
}

impl Default for Icarus {
    fn default() -> Self {
        Icarus {
            iverilog: "iverilog".to_string(),
            vvp: "vvp".to_string(),
        }
    }
}

impl Icarus {
    /// Is `iverilog` installed?
    pub fn available(&self) -> bool {
        Command::new(&self.iverilog)
            .arg("-V")
            .output()
            .is_ok_and(|out| out.status.success())
    }

    /// Simulate `design` driven by the testbench module `top` and compare
    /// the displayed tuples with `expected`.
    pub fn simulate(
        &self,
        design: &str,
        testbench: &str,
        top: &str,
        expected: &[Vec<i64>],
    ) -> FsmResult<SimulationReport> {
        let time = Instant::now();
        let dir = tempfile::tempdir()?;
        let design_file = dir.path().join("design.v");
        let tb_file = dir.path().join("testbench.v");
        let binary = dir.path().join("sim.vvp");
        std::fs::write(&design_file, design)?;
        std::fs::write(&tb_file, testbench)?;

        let compile = Command::new(&self.iverilog)
            .arg("-o")
            .arg(&binary)
            .arg("-s")
            .arg(top)
            .arg(&design_file)
            .arg(&tb_file)
            .output()
            .map_err(|err| Error::external_tool(&self.iverilog, err))?;
        check(&self.iverilog, &compile)?;

        let run = Command::new(&self.vvp)
            .arg("-n")
            .arg(&binary)
            .current_dir(dir.path())
            .output()
            .map_err(|err| Error::external_tool(&self.vvp, err))?;
        check(&self.vvp, &run)?;

        let stdout = String::from_utf8_lossy(&run.stdout).to_string();
        let report = SimulationReport {
            outputs: parse_outputs(&stdout),
            stdout,
            expected: expected.to_vec(),
        };
        log::info!("Simulated `{top}` in {:?}", time.elapsed());
        Ok(report)
    }
}

fn check(tool: &str, out: &Output) -> FsmResult<()> {
    if out.status.success() {
        return Ok(());
    }
    let stderr = String::from_utf8_lossy(&out.stderr);
    let stdout = String::from_utf8_lossy(&out.stdout);
    Err(Error::external_tool(
        tool,
        format!("{}\n{}{}", out.status, stderr.trim_end(), stdout.trim_end()),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_display_lines() {
        let stdout = "\
VCD info: dumpfile
0,1
-3,4
testbench.v:40: $finish called at 120 (1s)
7
";
        assert_eq!(
            parse_outputs(stdout),
            vec![vec![0, 1], vec![-3, 4], vec![7]]
        );
    }

    #[test]
    fn verdict() {
        let report = SimulationReport {
            stdout: String::new(),
            outputs: vec![vec![1]],
            expected: vec![vec![1]],
        };
        assert!(report.passed());
        assert!(report.summary().starts_with("PASS"));
        let report = SimulationReport {
            expected: vec![vec![2]],
            ..report
        };
        assert!(!report.passed());
        assert_eq!(report.summary(), "FAIL: expected (2)\n      got (1)");
    }

    #[test]
    fn missing_tool() {
        let icarus = Icarus {
            iverilog: "genfsm-no-such-tool".to_string(),
            vvp: "genfsm-no-such-tool".to_string(),
        };
        assert!(!icarus.available());
        let err = icarus.simulate("", "", "tb", &[]).unwrap_err();
        assert!(matches!(
            err.kind(),
            genfsm_utils::ErrorKind::ExternalTool { .. }
        ));
    }
}
