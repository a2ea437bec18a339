use std::sync::Arc;

use anyhow::Context;
use kasm_client_instrumented::prelude::{Image, KasmClient};
use session_stress_core::prelude::ShutdownSignalError;
use session_stress_instruments::Reporter;
use session_stress_runner::prelude::{
    default_log_file, init_logging, run, RunDefinitionBuilder, StressCli, StressResult,
};
use tabled::settings::Style;
use tabled::{Table, Tabled};

use crate::config::{Config, ConfigSource};

/// Run the stress test described by the command line against the configured Kasm server.
///
/// Returns an error for configuration problems, or if the run was interrupted. Failed sessions
/// are part of the report, not errors.
pub fn run_kasm_stress_test(cli: StressCli) -> StressResult<()> {
    let (config, source) = Config::load(cli.config.as_deref())?;

    let log_file = cli.log_file.clone().unwrap_or_else(default_log_file);
    init_logging(&log_file, &config.log_level)?;
    match source {
        ConfigSource::File(path) => log::info!("Loaded config from {}", path.display()),
        ConfigSource::EnvironmentOnly { missing } => {
            if let Some(path) = missing {
                log::warn!(
                    "Config file {} not found, using environment variables only",
                    path.display()
                );
            }
        }
    }

    let reporter = Arc::new(Reporter::in_memory());
    let client = Arc::new(KasmClient::new(config.client_config(), reporter.clone())?);

    if cli.list_images {
        return list_images(&client);
    }

    let definition = RunDefinitionBuilder::from_cli(&cli)
        .with_image_id(config.default_image_id.clone())
        .with_policy(config.ready_policy());

    let outcome = run(definition, client, reporter)?;
    log::info!("Stress run {} complete", outcome.run_id);

    if outcome.interrupted {
        return Err(ShutdownSignalError::default().into());
    }

    Ok(())
}

#[derive(Tabled)]
struct ImageRow {
    image_id: String,
    friendly_name: String,
}

impl From<Image> for ImageRow {
    fn from(image: Image) -> Self {
        Self {
            image_id: image.image_id,
            friendly_name: image.friendly_name,
        }
    }
}

fn list_images(client: &KasmClient) -> StressResult<()> {
    let runtime = tokio::runtime::Runtime::new().context("Failed to create Tokio runtime")?;
    let images = runtime
        .block_on(client.get_images())
        .context("Failed to list images")?;

    if images.is_empty() {
        println!("No images are available to this API key");
        return Ok(());
    }

    let mut table = Table::new(images.into_iter().map(ImageRow::from));
    table.with(Style::modern());
    println!("{table}");

    Ok(())
}
