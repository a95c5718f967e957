use anyhow::{Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use foundry_core::{
    CollectorQueue, CommandResult, ExecutionOptions, FoundryCommand, OutputOptions, ParamDiff,
};
use foundry_host::MemoryFamily;
use foundry_model::SnapshotSource;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn cli() -> Command {
    Command::new("family-foundry")
        .version(foundry_core::VERSION)
        .about("Apply a profile to family documents and report what changed")
        .subcommand_required(true)
        .arg(
            Arg::new("json-logs")
                .long("json-logs")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON lines"),
        )
        .subcommand(
            Command::new("run")
                .about("Run a profile over a family dump")
                .arg(
                    Arg::new("family")
                        .long("family")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Family dump (JSON)"),
                )
                .arg(profile_arg())
                .arg(
                    Arg::new("out")
                        .long("out")
                        .value_parser(value_parser!(PathBuf))
                        .help("Report root directory"),
                )
                .arg(
                    Arg::new("save")
                        .long("save")
                        .value_parser(value_parser!(PathBuf))
                        .help("Write the processed family dump here"),
                )
                .arg(
                    Arg::new("no-reports")
                        .long("no-reports")
                        .action(ArgAction::SetTrue)
                        .help("Skip writing reports"),
                )
                .arg(single_transaction_arg())
                .arg(no_batching_arg()),
        )
        .subcommand(
            Command::new("plan")
                .about("Print the operations a profile would run")
                .arg(profile_arg())
                .arg(no_batching_arg()),
        )
        .subcommand(
            Command::new("diff")
                .about("Compare the parameters of two family dumps")
                .arg(
                    Arg::new("before")
                        .required(true)
                        .value_parser(value_parser!(PathBuf)),
                )
                .arg(
                    Arg::new("after")
                        .required(true)
                        .value_parser(value_parser!(PathBuf)),
                ),
        )
}

fn profile_arg() -> Arg {
    Arg::new("profile")
        .long("profile")
        .required(true)
        .value_parser(value_parser!(PathBuf))
        .help("Profile (JSON)")
}

fn single_transaction_arg() -> Arg {
    Arg::new("single-transaction")
        .long("single-transaction")
        .action(ArgAction::SetTrue)
        .help("Wrap the whole queue in one transaction")
}

fn no_batching_arg() -> Arg {
    Arg::new("no-batching")
        .long("no-batching")
        .action(ArgAction::SetTrue)
        .help("Give every type-level operation its own type loop")
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

fn load_family(path: &Path) -> Result<MemoryFamily> {
    MemoryFamily::from_json(&read(path)?)
        .with_context(|| format!("parsing family dump {}", path.display()))
}

fn command(args: &ArgMatches) -> Result<FoundryCommand> {
    let path = args
        .get_one::<PathBuf>("profile")
        .context("--profile is required")?;
    let command = FoundryCommand::from_profile_json(&read(path)?)
        .with_context(|| format!("loading profile {}", path.display()))?;
    // `plan` has no transaction flag
    let single = matches!(args.try_get_one::<bool>("single-transaction"), Ok(Some(true)));
    let execution = ExecutionOptions::new()
        .with_single_transaction(single)
        .with_optimize_type_operations(!args.get_flag("no-batching"));
    Ok(command.with_execution(execution))
}

fn run(args: &ArgMatches) -> Result<CommandResult> {
    let family_path = args
        .get_one::<PathBuf>("family")
        .context("--family is required")?;
    let mut family = load_family(family_path)?;

    let mut output = match args.get_one::<PathBuf>("out") {
        Some(dir) => OutputOptions::new(dir),
        None => OutputOptions::default(),
    };
    output = output.with_write_reports(!args.get_flag("no-reports"));
    let command = command(args)?.with_output(output);

    let outcome = command.run_family(&mut family)?;
    if let Some(path) = args.get_one::<PathBuf>("save") {
        fs::write(path, family.to_json_pretty()?)
            .with_context(|| format!("writing {}", path.display()))?;
        info!(path = %path.display(), "family saved");
    }

    println!("{}", outcome.summary.notification());
    if let Some(dir) = &outcome.run_dir {
        println!("Reports: {}", dir.display());
    }
    Ok(outcome.result)
}

fn plan(args: &ArgMatches) -> Result<CommandResult> {
    let command = command(args)?;
    let meta = command.queue().metadata(!args.get_flag("no-batching"));
    println!("{}", serde_json::to_string_pretty(&meta)?);
    Ok(CommandResult::Succeeded)
}

fn diff(args: &ArgMatches) -> Result<CommandResult> {
    let collectors = CollectorQueue::standard();
    let snapshot = |name: &str, source: SnapshotSource| -> Result<_> {
        let path = args
            .get_one::<PathBuf>(name)
            .with_context(|| format!("<{name}> is required"))?;
        let mut family = load_family(path)?;
        Ok(collectors.collect(&mut family, source, None)?)
    };
    let before = snapshot("before", SnapshotSource::Pre)?;
    let after = snapshot("after", SnapshotSource::Post)?;
    println!(
        "{}",
        serde_json::to_string_pretty(&ParamDiff::between(&before, &after))?
    );
    Ok(CommandResult::Succeeded)
}

fn main() {
    let matches = cli().get_matches();
    init_tracing(matches.get_flag("json-logs"));

    let result = match matches.subcommand() {
        Some(("run", args)) => run(args),
        Some(("plan", args)) => plan(args),
        Some(("diff", args)) => diff(args),
        _ => unreachable!("a subcommand is required"),
    };

    match result {
        Ok(CommandResult::Succeeded) => std::process::exit(0),
        Ok(CommandResult::Failed) => std::process::exit(1),
        Ok(CommandResult::Cancelled) => std::process::exit(2),
        Err(error) => {
            eprintln!("error: {error:#}");
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        cli().debug_assert();
    }

    #[test]
    fn run_flags_parse() {
        let matches = cli()
            .try_get_matches_from([
                "family-foundry",
                "run",
                "--family",
                "desk.json",
                "--profile",
                "profile.json",
                "--single-transaction",
                "--no-batching",
            ])
            .unwrap();
        let (name, args) = matches.subcommand().unwrap();
        assert_eq!(name, "run");
        assert!(args.get_flag("single-transaction"));
        assert!(args.get_flag("no-batching"));
        assert!(!args.get_flag("no-reports"));
    }
}
