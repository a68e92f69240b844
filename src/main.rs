use genfsm::driver;
use genfsm_utils::FsmResult;

fn main() -> FsmResult<()> {
    driver::run_compiler()
}
