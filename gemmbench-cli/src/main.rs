//! gemmbench - GEMM benchmark driver

fn main() -> anyhow::Result<()> {
    gemmbench_cli::run()
}
