use std::env;

use anyhow::{bail, Result};
use clap::Parser;
use labely::core::{Opts, SubCommand};
use log::info;
use sentry::IntoDsn;
use slog::Drain;

fn main() -> Result<()> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async { tokio_main().await })
}

async fn tokio_main() -> Result<()> {
    let opts: Opts = Opts::parse();

    let logger = if opts.json {
        let drain = slog_json::Json::new(std::io::stderr())
            .add_default_keys()
            .build()
            .fuse();
        let drain = slog_async::Async::new(drain).build().fuse();
        slog::Logger::root(drain, slog::slog_o!())
    } else {
        let decorator = slog_term::TermDecorator::new().stderr().build();
        let drain = slog_term::FullFormat::new(decorator).build().fuse();
        let drain = slog_async::Async::new(drain).build().fuse();
        slog::Logger::root(drain, slog::slog_o!())
    };

    // Initialize our logger.
    let _scope_guard = slog_scope::set_global_logger(logger);

    // Set the logging level.
    let mut log_level = log::Level::Info;
    if opts.debug {
        log_level = log::Level::Debug;
    }
    slog_stdlog::init_with_level(log_level)?;

    // Initialize sentry.
    let sentry_dsn = env::var("LABELY_SENTRY_DSN").unwrap_or_default();
    let _guard = sentry::init(sentry::ClientOptions {
        dsn: sentry_dsn.into_dsn()?,

        release: env::var("GIT_HASH").ok().map(Into::into),
        environment: Some(
            env::var("SENTRY_ENV")
                .unwrap_or_else(|_| "development".to_string())
                .into(),
        ),
        ..Default::default()
    });

    if let Err(err) = run_main_cmd(opts.clone()).await {
        sentry::integrations::anyhow::capture_anyhow(&err);
        bail!("running cmd `{:?}` failed: {:?}", &opts.subcmd, err);
    }

    Ok(())
}

async fn run_main_cmd(opts: Opts) -> Result<()> {
    match opts.subcmd {
        SubCommand::Server(s) => {
            let resolver = s.resolver.resolver()?;
            labely::server::server(s, resolver).await?;
        }
        SubCommand::CreateServerSpec(spec) => {
            let api = labely::server::api()?;
            labely::server::write_spec(&api, &spec.spec_file)?;
        }
        SubCommand::Render(r) => {
            let resolver = r.resolver.resolver()?;
            let out = r.run(resolver.as_ref()).await?;
            info!("rendered {} label sheet", r.item_type);
            println!("{}", out);
        }
    }

    Ok(())
}
