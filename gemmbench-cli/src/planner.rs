//! Benchmark Planner
//!
//! Expands configurations into the exact tool invocations a run would make.
//! Used by `--dry-run` to show the plan without touching the machine.

use crate::config::RunConfig;
use crate::runner::Invocation;
use gemmbench_core::GemmOpts;

/// Planned invocations for one configuration
pub struct PlannedConfig<'a> {
    pub opts: &'a GemmOpts,
    pub invocations: Vec<(usize, Invocation)>,
}

/// Execution plan for a run
pub struct ExecutionPlan<'a> {
    pub backend: &'static str,
    pub devices: String,
    pub collection: Option<String>,
    pub configs: Vec<PlannedConfig<'a>>,
}

impl ExecutionPlan<'_> {
    /// Total number of tool invocations
    pub fn total_invocations(&self) -> usize {
        self.configs.iter().map(|c| c.invocations.len()).sum()
    }
}

/// Build execution plan from loaded configurations
pub fn build_plan<'a>(config: &RunConfig, configs: &'a [GemmOpts]) -> ExecutionPlan<'a> {
    let planned = configs
        .iter()
        .map(|opts| PlannedConfig {
            opts,
            invocations: config.backend.invocations(
                opts,
                &config.devices,
                &config.output_prefix,
                config.check,
            ),
        })
        .collect();

    ExecutionPlan {
        backend: config.backend.name(),
        devices: config.devices.to_string(),
        collection: config.collection(),
        configs: planned,
    }
}

/// Render the plan as a tree
pub fn format_plan(plan: &ExecutionPlan<'_>) -> String {
    let mut output = String::new();

    output.push_str("gemmbench Plan:\n");
    output.push_str(&format!("├── backend: {}\n", plan.backend));
    output.push_str(&format!("├── devices: {}\n", plan.devices));
    output.push_str(&format!(
        "├── collection: {}\n",
        plan.collection.as_deref().unwrap_or("(local report only)")
    ));
    for planned in &plan.configs {
        output.push_str(&format!("├── {}\n", planned.opts));
        for (gpu, invocation) in &planned.invocations {
            output.push_str(&format!("│   ├── gpu {}: {}\n", gpu, invocation));
        }
    }
    output.push_str(&format!(
        "{} configurations, {} invocations.\n",
        plan.configs.len(),
        plan.total_invocations()
    ));

    output
}
