use clap::{Parser, Subcommand};
use rail_core::contract::date_key_at;
use rail_core::state::record_path;
use rail_core::week_seed::parse_date_key;
use rail_core::*;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "rail")]
#[command(about = "Daily rail: one reset, optional movement, one nutrition tip", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Use a specific config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log decisions to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Build today's plan and print the day contract
    Today {
        #[arg(long)]
        user: String,

        /// Date key (YYYY-MM-DD); defaults to the local date
        #[arg(long)]
        date: Option<String>,

        /// Hour at which the local day starts
        #[arg(long, default_value_t = 0)]
        day_boundary_hour: u8,

        #[arg(long)]
        stress: Option<f64>,

        #[arg(long)]
        sleep: Option<f64>,

        #[arg(long)]
        energy: Option<f64>,

        /// Minutes available today
        #[arg(long)]
        minutes: Option<f64>,

        /// Safety mode: no movement, calming reset only
        #[arg(long)]
        panic: bool,

        /// Ignore today's stored picks and the week seed
        #[arg(long)]
        fresh: bool,

        /// How yesterday felt (too_hard, too_easy, just_right)
        #[arg(long)]
        feedback: Option<String>,

        /// Mark today's plan as completed
        #[arg(long)]
        completed: bool,

        /// Print the contract without storing anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Apply a quick signal to today's stored plan
    Signal {
        #[arg(long)]
        user: String,

        #[arg(long)]
        date: String,

        /// stressed, exhausted, ten_minutes or more_energy
        signal: String,
    },

    /// Set the user's baseline constraints
    Baseline {
        #[arg(long)]
        user: String,

        #[arg(long)]
        knee: bool,
        #[arg(long)]
        shoulder: bool,
        #[arg(long)]
        back: bool,
        #[arg(long)]
        neck: bool,

        #[arg(long)]
        dumbbells: bool,
        #[arg(long)]
        bands: bool,
        #[arg(long)]
        gym: bool,

        /// morning, midday, evening or any
        #[arg(long)]
        time_of_day: Option<String>,

        /// Dietary tag to avoid (repeatable)
        #[arg(long)]
        avoid: Vec<String>,
    },

    /// Generate and store a week seed
    Week {
        #[arg(long)]
        user: String,

        /// First date of the week (YYYY-MM-DD)
        #[arg(long)]
        start: String,
    },

    /// Inspect the active content library
    Library {
        /// Validate and fail on any error
        #[arg(long)]
        validate: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        rail_core::logging::init_with_level("debug");
    } else {
        rail_core::logging::init();
    }

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    let data_dir = cli.data_dir.unwrap_or_else(|| config.data.data_dir.clone());
    let policy = config.effective_policy(std::env::var("RAIL_ENV").ok().as_deref())?;
    tracing::debug!("Environment policy: {}", policy.as_str());

    match cli.command {
        Commands::Today {
            user,
            date,
            day_boundary_hour,
            stress,
            sleep,
            energy,
            minutes,
            panic,
            fresh,
            feedback,
            completed,
            dry_run,
        } => {
            let check_in_args = [stress, sleep, energy, minutes];
            let options = TodayOptions {
                date,
                day_boundary_hour,
                check_in: check_in_args.iter().any(Option::is_some).then(|| {
                    json!({
                        "stress": stress,
                        "sleepQuality": sleep,
                        "energy": energy,
                        "timeAvailableMin": minutes,
                    })
                }),
                panic,
                fresh,
                feedback: feedback.as_deref().map(str::parse::<Feedback>).transpose()?,
                completed,
                dry_run,
            };
            cmd_today(&data_dir, &user, options, &config, policy)
        }
        Commands::Signal { user, date, signal } => {
            cmd_signal(&data_dir, &user, &date, signal.parse::<QuickSignal>()?, &config)
        }
        Commands::Baseline {
            user,
            knee,
            shoulder,
            back,
            neck,
            dumbbells,
            bands,
            gym,
            time_of_day,
            avoid,
        } => {
            let raw = json!({
                "injuries": {"knee": knee, "shoulder": shoulder, "back": back, "neck": neck},
                "equipment": {"dumbbells": dumbbells, "bands": bands, "gym": gym},
                "timeOfDayPreference": time_of_day.unwrap_or_else(|| "any".into()),
                "diet": {"avoidTags": avoid},
            });
            cmd_baseline(&data_dir, &user, raw)
        }
        Commands::Week { user, start } => cmd_week(&data_dir, &user, &start, &config),
        Commands::Library { validate } => cmd_library(&config, validate),
    }
}

struct TodayOptions {
    date: Option<String>,
    day_boundary_hour: u8,
    check_in: Option<Value>,
    panic: bool,
    fresh: bool,
    feedback: Option<Feedback>,
    completed: bool,
    dry_run: bool,
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn resolve_date(date: Option<String>, day_boundary_hour: u8) -> Result<String> {
    match date {
        Some(d) => Ok(parse_date_key(&d)?.format("%Y-%m-%d").to_string()),
        None => Ok(date_key_at(
            chrono::Local::now().naive_local(),
            day_boundary_hour,
        )),
    }
}

fn cmd_today(
    data_dir: &Path,
    user: &str,
    options: TodayOptions,
    config: &Config,
    policy: EnvPolicy,
) -> Result<()> {
    let path = record_path(data_dir, user)?;
    let record = UserRecord::load(&path)?;
    let library = config.active_library()?;
    let index = LibraryIndex::new(&library);
    let date_key = resolve_date(options.date, options.day_boundary_hour)?;

    // A fresh check-in replaces the stored one; otherwise reuse today's
    let check_in = match options.check_in {
        Some(raw) => CheckIn::from(raw),
        None => record.check_ins.get(&date_key).cloned().unwrap_or_default(),
    };

    let day_state = record.day_states.get(&date_key).cloned();
    let request = PlanRequest {
        user_id: user.to_string(),
        date_key: date_key.clone(),
        timezone: chrono::Local::now().offset().to_string(),
        day_boundary_hour: options.day_boundary_hour,
        check_in: check_in.clone(),
        constraints: record.constraints.clone(),
        day_state: day_state.clone(),
        week_seed: record.week_seed.clone(),
        prior_profile: record.prior_profile(&date_key),
        recent_novelty_groups: recent_novelty_groups(
            &record.day_states,
            &date_key,
            config.engine.novelty_days,
            &index,
        ),
        feedback: options.feedback,
        panic_mode: options.panic,
        rail_reset: options.fresh,
        completed: options.completed,
        overrides: ParamOverrides::default(),
    };

    let contract = build_day_contract(&request, &index, &config.engine, policy)?;
    print_json(&contract)?;

    if options.dry_run {
        tracing::info!("Dry run, nothing stored");
        return Ok(());
    }

    let last_signal = if options.fresh {
        None
    } else {
        day_state.and_then(|d| d.last_quick_signal)
    };
    UserRecord::update(&path, |r| {
        r.day_states
            .insert(date_key.clone(), contract.day_state(last_signal));
        // Later signals for the day must see the panic flag the plan was built with
        r.check_ins
            .insert(date_key.clone(), check_in.with_panic(contract.panic_mode));
        r.profiles.insert(date_key.clone(), contract.profile);
        Ok(())
    })?;

    Ok(())
}

fn cmd_signal(
    data_dir: &Path,
    user: &str,
    date: &str,
    signal: QuickSignal,
    config: &Config,
) -> Result<()> {
    let path = record_path(data_dir, user)?;
    let date_key = resolve_date(Some(date.to_string()), 0)?;
    let record = UserRecord::load(&path)?;

    let state = record.day_states.get(&date_key).cloned().ok_or_else(|| {
        Error::State(format!(
            "No plan stored for {} on {}; run `rail today` first",
            user, date_key
        ))
    })?;

    let library = config.active_library()?;
    let index = LibraryIndex::new(&library);
    let check_in = record.check_ins.get(&date_key).cloned().unwrap_or_default();
    let scores = compute_load_capacity(&check_in);
    let profile = record
        .profiles
        .get(&date_key)
        .copied()
        .unwrap_or(Profile::Balanced);

    let ctx = SignalContext {
        scores,
        profile,
        constraints: &record.constraints,
        time_available_min: check_in.time_available_min,
        panic: check_in.safety.panic,
        params: &config.engine,
    };
    let (selection, new_state) = apply_signal_to_day_state(signal, &state, &ctx, &index);

    UserRecord::update(&path, |r| {
        r.day_states.insert(date_key.clone(), new_state);
        Ok(())
    })?;

    print_json(&selection)
}

fn cmd_baseline(data_dir: &Path, user: &str, raw: Value) -> Result<()> {
    let path = record_path(data_dir, user)?;
    let constraints = Constraints::from(raw);

    let record = UserRecord::update(&path, |r| {
        r.constraints = constraints;
        Ok(())
    })?;

    print_json(&record.constraints)
}

fn cmd_week(data_dir: &Path, user: &str, start: &str, config: &Config) -> Result<()> {
    let path = record_path(data_dir, user)?;
    let start_date = parse_date_key(start)?;
    let library = config.active_library()?;
    let index = LibraryIndex::new(&library);

    let record = UserRecord::update(&path, |r| {
        r.week_seed = Some(generate_week_seed(
            user,
            start_date,
            &r.constraints,
            &index,
            &config.engine,
        ));
        Ok(())
    })?;

    print_json(&record.week_seed)
}

fn cmd_library(config: &Config, validate: bool) -> Result<()> {
    let library = match &config.library.path {
        Some(path) => Library::load_from(path)?,
        None => default_library().clone(),
    };

    println!(
        "Library {}: {} resets, {} movement, {} nutrition",
        library.version,
        library.resets.len(),
        library.movement.len(),
        library.nutrition.len()
    );

    if validate {
        let errors = library.validate();
        if !errors.is_empty() {
            eprintln!("Library validation errors:");
            for error in &errors {
                eprintln!("  - {}", error);
            }
            return Err(Error::LibraryValidation(format!(
                "{} problem(s) found",
                errors.len()
            )));
        }
        println!("✓ Library is valid");
    }

    Ok(())
}
