//! Engines command: list the plan formats plancheck can normalize.

use anyhow::Result;
use serde::Serialize;

use plancheck::EngineId;

use crate::exit_codes;
use crate::output::{schema, CommandOutput, Output, Severity};

#[derive(Debug, Serialize)]
pub struct EngineInfo {
    pub name: &'static str,
    pub plan_shape: &'static str,
    pub aliases: &'static [&'static str],
}

fn engine_infos() -> Vec<EngineInfo> {
    EngineId::ALL
        .iter()
        .map(|engine| EngineInfo {
            name: engine.as_str(),
            plan_shape: engine.plan_shape(),
            aliases: engine.aliases(),
        })
        .collect()
}

pub fn engines(output: &Output) -> Result<i32> {
    let infos = engine_infos();

    if output.is_json() {
        CommandOutput::new(schema::ENGINES, &infos, Severity::Healthy).print()?;
    } else {
        println!("{:<12} {:<8} ALIASES", "ENGINE", "PLAN");
        for info in &infos {
            println!(
                "{:<12} {:<8} {}",
                info.name,
                info.plan_shape,
                info.aliases.join(", ")
            );
        }
    }

    Ok(exit_codes::HEALTHY)
}
