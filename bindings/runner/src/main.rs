use kasm_stress_runner::prelude::*;

fn main() -> StressResult<()> {
    let cli = init();
    run_kasm_stress_test(cli)
}
