//! `detect config`: print the defaults or validate a file.

use std::path::Path;

use anyhow::{Context, Result};
use detect_engine::EngineConfig;

pub fn run(check: Option<&Path>) -> Result<()> {
    let Some(path) = check else {
        println!("{}", EngineConfig::default().to_json_pretty()?);
        return Ok(());
    };

    let config = EngineConfig::from_json_file(path)?;
    config
        .validate()
        .with_context(|| format!("{} is invalid", path.display()))?;

    println!(
        "ok  {}  model={} candidates={} input={}x{} classes={}",
        path.display(),
        config.model.path.display(),
        config.model.candidate_count(),
        config.input_size.0,
        config.input_size.1,
        config.class_names.len()
    );
    Ok(())
}
