use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use ubi_driver::config::FLAG_API_TOKEN;
use ubi_driver::{
    ApiToken, ClientFactory, Driver, DriverOptions, MachineState, PollPolicy, CREATE_FLAGS,
};

use crate::error::{CliError, Result};
use crate::opts::{Args, Command, Create, Machine, Target};
use crate::store::Store;

/// Run one command. Command output goes to `out`; progress goes to the log.
pub async fn run(args: Args, factory: Arc<dyn ClientFactory>, out: &mut impl Write) -> Result<()> {
    let store = Store::new(args.storage_path);

    match args.command {
        Command::Create(create) => create_machine(&store, factory, create).await,
        Command::Start(target) => {
            open(&store, factory, &target)?.start().await?;
            info!(machine = %target.name, "started");
            Ok(())
        }
        Command::Stop(target) => {
            open(&store, factory, &target)?.stop().await?;
            info!(machine = %target.name, "stopped");
            Ok(())
        }
        Command::Restart(target) => {
            open(&store, factory, &target)?.restart().await?;
            info!(machine = %target.name, "restarted");
            Ok(())
        }
        Command::Kill(target) => {
            open(&store, factory, &target)?.kill().await?;
            info!(machine = %target.name, "killed");
            Ok(())
        }
        Command::Rm(target) => remove_machine(&store, factory, &target).await,
        Command::Status(target) => {
            let driver = open(&store, factory, &target)?;
            let result = driver.state().await;
            writeln!(out, "{}", MachineState::from_query(&result)).map_err(CliError::Output)?;
            result.map(|_| ()).map_err(CliError::from)
        }
        Command::Ip(Machine { name }) => {
            let record = store.load(&name)?;
            let ip = Driver::restore(record, factory).ip()?.to_string();
            writeln!(out, "{ip}").map_err(CliError::Output)
        }
        Command::Url(Machine { name }) => {
            let record = store.load(&name)?;
            let url = Driver::restore(record, factory).url()?;
            writeln!(out, "{url}").map_err(CliError::Output)
        }
        Command::Inspect(Machine { name }) => {
            let record = store.load(&name)?;
            let json = serde_json::to_string_pretty(&record).map_err(|source| CliError::Json {
                path: store.machine_dir(&name).unwrap_or_default(),
                source,
            })?;
            writeln!(out, "{json}").map_err(CliError::Output)
        }
        Command::Flags => {
            for flag in CREATE_FLAGS {
                let default = flag.default.map(|d| format!(" (default: {d})")).unwrap_or_default();
                writeln!(out, "--{:<24} ${:<24} {}{default}", flag.name, flag.env_var, flag.usage)
                    .map_err(CliError::Output)?;
            }
            Ok(())
        }
    }
}

async fn create_machine(store: &Store, factory: Arc<dyn ClientFactory>, create: Create) -> Result<()> {
    if store.exists(&create.name)? {
        return Err(CliError::AlreadyExists(create.name));
    }

    let opts = DriverOptions::from(create.driver);
    let poll = PollPolicy {
        interval: Duration::from_secs(create.poll_interval_secs),
        timeout: (create.create_timeout_secs > 0)
            .then(|| Duration::from_secs(create.create_timeout_secs)),
        max_attempts: None,
    };

    let mut driver = Driver::configure(
        create.profile,
        &create.name,
        store.machine_dir(&create.name)?,
        &opts,
        factory,
    )?
    .with_poll_policy(poll);
    driver.preflight_check()?;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, abandoning wait for instance address");
            on_interrupt.cancel();
        }
    });

    let result = driver.create_with_cancel(&cancel).await;
    watcher.abort();

    // Persist whatever was allocated so `rm` can clean up a failed create.
    store.save(driver.record())?;
    result?;

    info!(
        machine = %driver.machine_name(),
        driver = driver.driver_name(),
        url = %driver.url()?,
        "machine created"
    );
    Ok(())
}

async fn remove_machine(store: &Store, factory: Arc<dyn ClientFactory>, target: &Target) -> Result<()> {
    let mut driver = open(store, factory, target)?;
    let report = driver.remove().await;

    if report.is_clean() {
        store.remove(&target.name)?;
        info!(machine = %target.name, "removed");
        return Ok(());
    }

    for (step, message) in report.failures() {
        warn!(machine = %target.name, step, error = message, "could not remove provider resource");
    }
    // Keep the record (minus what was removed) so a later `rm` can retry.
    store.save(driver.record())?;
    warn!(machine = %target.name, "removal incomplete, run rm again to retry");
    Ok(())
}

fn open(store: &Store, factory: Arc<dyn ClientFactory>, target: &Target) -> Result<Driver> {
    let record = store.load(&target.name)?;
    let token = target
        .api_token
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(ubi_driver::Error::Configuration {
            flag: FLAG_API_TOKEN,
            message: "required option is not set".into(),
        })?;

    Ok(Driver::restore(record, factory).with_token(ApiToken::new(token)))
}
