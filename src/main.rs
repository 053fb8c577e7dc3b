use std::error::Error;

use clap::Parser;
use fmt_ratchet::{
    cli::{
        args::{CliArgs, Command},
        command_handlers::do_init,
    },
    FmtRatchet, TaskOutcome, TaskReport,
};
use log::{error, info};

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run().await {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn Error>> {
    let cli_args: CliArgs = CliArgs::parse();

    let build = || {
        let mut builder = FmtRatchet::builder()
            .root(&cli_args.root)
            .module_file_name(&cli_args.module_location);
        if let Some(reference) = &cli_args.ratchet_from {
            builder = builder.ratchet_from(reference);
        }
        if let Some(cache_directory) = &cli_args.cache_directory {
            builder = builder.cache_directory(cache_directory);
        }
        builder.try_build()
    };

    match &cli_args.cmd {
        Command::Init => do_init(
            &cli_args.root,
            &cli_args.module_location,
            cli_args.ratchet_from.clone(),
        )?,
        Command::Check => {
            let app = build()?;
            let reports = app.check().await?;
            let mut violations = 0;
            for report in &reports {
                if report.outcome == TaskOutcome::UpToDate {
                    continue;
                }
                for file in &report.violations {
                    println!("{}", report.project.join(file).display());
                }
                violations += report.violations.len();
            }
            fail_on_errors(&reports)?;
            if violations > 0 {
                return Err(format!(
                    "{violations} file(s) changed since {} are not formatted, run `fmt-ratchet apply` to fix",
                    app.ratchet_from()
                )
                .into());
            }
            info!("All files changed since {} are formatted", app.ratchet_from());
        }
        Command::Apply => {
            let reports = build()?.apply().await?;
            for report in &reports {
                for file in &report.formatted {
                    println!("{}", report.project.join(file).display());
                }
            }
            fail_on_errors(&reports)?;
        }
        Command::Keys => {
            for (project, key) in build()?.cache_keys()? {
                println!("{}\t{}", project.display(), key);
            }
        }
        Command::Status { project, paths } => {
            for (path, clean) in build()?.status(project, paths)? {
                let verdict = if clean { "clean" } else { "dirty" };
                println!("{}\t{}", verdict, path.display());
            }
        }
        Command::ClearCache => build()?.clear_cache()?,
    }

    Ok(())
}

fn fail_on_errors(reports: &[TaskReport]) -> Result<(), Box<dyn Error>> {
    let mut failed = 0;
    for report in reports {
        if let Some(e) = &report.error {
            error!("{} in {}: {}", report.format, report.project.display(), e);
            failed += 1;
        }
    }
    if failed > 0 {
        return Err(format!("{failed} format task(s) failed").into());
    }
    Ok(())
}
