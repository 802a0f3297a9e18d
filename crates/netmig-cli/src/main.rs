use clap::Parser;
use color_eyre::{eyre::eyre, Result};
use netmig_core::GlobalOptions;

mod cli;
mod output;
mod style;

use cli::NetmigCli;
use output::{emit_output, OutputOptions};

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = NetmigCli::parse();
    init_tracing(cli.trace, cli.verbose, cli.quiet);

    let global = GlobalOptions {
        verbose: cli.verbose,
    };

    let request = cli.command.to_request();
    tracing::debug!(?request, "starting");
    let outcome =
        netmig_core::run_migration(&global, &request).map_err(|err| eyre!("{err:?}"))?;
    let opts = OutputOptions {
        quiet: cli.quiet,
        json: cli.json,
        no_color: cli.no_color,
    };
    let code = emit_output(&opts, cli.command.name(), &outcome)?;

    if code == 0 {
        Ok(())
    } else {
        std::process::exit(code);
    }
}

fn init_tracing(trace: bool, verbose: u8, quiet: bool) {
    let level = if trace {
        "trace"
    } else if quiet {
        "warn"
    } else {
        match verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = format!(
        "netmig={level},netmig_cli={level},netmig_core={level},netmig_domain={level}"
    );
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true)
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}
