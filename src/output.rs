use std::io::{self, Write};

use serde::Serialize;

use crate::pipeline::{PipelineRun, StageOutcome};

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Human,
    Json,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_run(run: &PipelineRun) -> io::Result<()> {
        Self::print_json(run)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

pub fn print_run_summary(run: &PipelineRun) {
    let green = "\x1b[32m";
    let yellow = "\x1b[33m";
    let cyan = "\x1b[36m";
    let red = "\x1b[31m";
    let reset = "\x1b[0m";

    let failed = run.failures().count();
    println!("{cyan}smard-dp run summary (forced: {}){reset}", run.forced);
    for stage in &run.stages {
        match stage.outcome {
            StageOutcome::Succeeded => {
                println!("{green}  ok      {}{reset}", stage.stage_id);
            }
            StageOutcome::Skipped => {
                println!("{yellow}  skipped {} (output present){reset}", stage.stage_id);
            }
            StageOutcome::Failed => {
                let detail = stage.error.as_deref().unwrap_or("unknown error");
                println!("{red}  failed  {}: {detail}{reset}", stage.stage_id);
            }
        }
    }
    if failed == 0 {
        println!("{green}all stages completed{reset}");
    } else {
        println!("{red}{failed} stage(s) failed{reset}");
    }
}
