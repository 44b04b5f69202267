use clap::{Parser, Subcommand};
use setforge_core::achievements::format_kg;
use setforge_core::*;
use std::collections::HashMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

#[derive(Parser)]
#[command(name = "setforge")]
#[command(about = "Guided strength workout execution and tracking", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a workout from a template file
    Start {
        /// Path to a workout template (JSON)
        #[arg(long)]
        template: PathBuf,

        /// Auto-complete (for testing) - log every set at its minimum reps
        #[arg(long)]
        auto_complete: bool,

        /// Skip every rest countdown
        #[arg(long)]
        no_rest: bool,
    },

    /// Resume an interrupted session from its crash snapshot
    Resume {
        /// Discard the snapshot instead of resuming
        #[arg(long)]
        discard: bool,

        /// Auto-complete (for testing) - log every remaining set at its minimum reps
        #[arg(long)]
        auto_complete: bool,

        /// Skip every rest countdown
        #[arg(long)]
        no_rest: bool,
    },

    /// Show the logged history of one exercise
    History {
        /// Exercise identifier, e.g. bench_press
        exercise_id: String,
    },

    /// List achievements and their unlock state
    Achievements,
}

fn main() -> Result<()> {
    // Initialize logging
    setforge_core::logging::init();

    let cli = Cli::parse();

    // Determine data directory
    let config = Config::load()?;
    let data_dir = cli.data_dir.unwrap_or_else(|| config.data.data_dir.clone());

    match cli.command {
        Some(Commands::Start {
            template,
            auto_complete,
            no_rest,
        }) => cmd_start(data_dir, &template, auto_complete, no_rest, &config),
        Some(Commands::Resume {
            discard,
            auto_complete,
            no_rest,
        }) => cmd_resume(data_dir, discard, auto_complete, no_rest, &config),
        Some(Commands::History { exercise_id }) => cmd_history(data_dir, &exercise_id),
        Some(Commands::Achievements) => cmd_achievements(data_dir),
        None => cmd_status(data_dir),
    }
}

// ============================================================================
// Template Files
// ============================================================================

/// On-disk workout template. `names` maps exercise ids to display names;
/// ids without an entry are shown as-is.
#[derive(Debug, serde::Deserialize)]
struct TemplateFile {
    #[serde(default)]
    id: Option<String>,
    name: String,
    #[serde(default)]
    default_rest_sec: Option<u32>,
    #[serde(default)]
    names: HashMap<String, String>,
    blocks: Vec<TemplateBlock>,
}

fn load_template(path: &Path) -> Result<TemplateFile> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| Error::Template(format!("cannot read {}: {}", path.display(), e)))?;
    let template: TemplateFile = serde_json::from_str(&contents)
        .map_err(|e| Error::Template(format!("cannot parse {}: {}", path.display(), e)))?;
    if template.blocks.is_empty() {
        tracing::warn!(template = %template.name, "template has no blocks");
    }
    Ok(template)
}

fn display_name(names: &HashMap<String, String>, exercise_id: &str) -> String {
    names
        .get(exercise_id)
        .cloned()
        .unwrap_or_else(|| exercise_id.to_string())
}

// ============================================================================
// Cues
// ============================================================================

/// Terminal bell on rest cues. Print failures are ignored; a lost beep
/// must never disturb the session.
struct TerminalCues;

impl SessionCues for TerminalCues {
    fn rest_ending(&self, _remaining_ms: u64) {
        ring_bell();
    }

    fn rest_complete(&self) {
        ring_bell();
    }
}

fn ring_bell() {
    print!("\x07");
    let _ = io::stdout().flush();
}

// ============================================================================
// Commands
// ============================================================================

fn cmd_start(
    data_dir: PathBuf,
    template_path: &Path,
    auto_complete: bool,
    no_rest: bool,
    config: &Config,
) -> Result<()> {
    let template = load_template(template_path)?;
    let mut store = JsonlStore::open(&data_dir)?;

    // An interrupted session takes precedence over a fresh start.
    let recovery_path = data_dir.join("recovery.json");
    if SessionSnapshot::load(&recovery_path)?.is_some() {
        println!("An interrupted session exists.");
        println!("Run 'setforge resume' to pick it up, or 'setforge resume --discard' to drop it.");
        return Ok(());
    }

    let mut session = WorkoutSession::with_cues(Box::new(TerminalCues));
    session.set_recovery_path(Some(recovery_path));
    session.set_cue_threshold(config.timer.cue_threshold_sec);
    session.start_workout(
        template.id.clone(),
        &template.name,
        template.blocks.clone(),
        template.default_rest_sec,
        config.rest.between_sets_sec,
        config.rest.transition_sec,
    );

    println!(
        "Starting '{}' ({} steps).",
        template.name,
        session.steps().len()
    );

    run_session_loop(
        &mut session,
        &mut store,
        &template.names,
        auto_complete,
        no_rest,
        config,
    )
}

fn cmd_resume(
    data_dir: PathBuf,
    discard: bool,
    auto_complete: bool,
    no_rest: bool,
    config: &Config,
) -> Result<()> {
    let recovery_path = data_dir.join("recovery.json");
    let Some(snapshot) = SessionSnapshot::load(&recovery_path)? else {
        println!("No interrupted session found.");
        return Ok(());
    };

    if discard {
        SessionSnapshot::clear(&recovery_path)?;
        println!("Discarded interrupted session '{}'.", snapshot.template_name);
        return Ok(());
    }

    println!("Interrupted session found:");
    display_snapshot(&snapshot);

    if !auto_complete && !prompt_yes_no("Resume this session?")? {
        println!("Leaving the snapshot in place.");
        return Ok(());
    }

    // The snapshot has no display-name table; recover what we can from
    // the sets already logged.
    let names: HashMap<String, String> = snapshot
        .performed
        .values()
        .map(|set| (set.exercise_id.clone(), set.exercise_name.clone()))
        .collect();

    let mut store = JsonlStore::open(&data_dir)?;
    let mut session = WorkoutSession::with_cues(Box::new(TerminalCues));
    session.set_recovery_path(Some(recovery_path));
    session.set_cue_threshold(config.timer.cue_threshold_sec);
    session.resume_from(snapshot);

    run_session_loop(
        &mut session,
        &mut store,
        &names,
        auto_complete,
        no_rest,
        config,
    )
}

fn cmd_history(data_dir: PathBuf, exercise_id: &str) -> Result<()> {
    let store = JsonlStore::open(&data_dir)?;
    let entries = store.history_for_exercise(exercise_id)?;

    if entries.is_empty() {
        println!("No history recorded for '{}'.", exercise_id);
        return Ok(());
    }

    // Entries are sorted oldest first; the newest name wins for display.
    let name = entries
        .last()
        .map(|entry| entry.exercise_name.clone())
        .unwrap_or_else(|| exercise_id.to_string());

    println!("History for {} ({} sessions):", name, entries.len());
    for entry in &entries {
        let one_rm = entry
            .estimated_one_rm_g
            .map(format_kg)
            .unwrap_or_else(|| "n/a".to_string());
        println!(
            "  {}  best {:>9}  volume {:>10}  {} sets / {} reps  est. 1RM {}",
            entry.performed_at.format("%Y-%m-%d"),
            format_kg(u64::from(entry.best_weight_g)),
            format_kg(entry.total_volume_g),
            entry.total_sets,
            entry.total_reps,
            one_rm,
        );
    }

    Ok(())
}

fn cmd_achievements(data_dir: PathBuf) -> Result<()> {
    let store = JsonlStore::open(&data_dir)?;
    let unlocked = store.unlocked_achievements()?;
    let unlocked_ids = store.unlocked_achievement_ids()?;
    let catalog = achievement_catalog();

    println!(
        "Achievements ({}/{} unlocked):",
        unlocked_ids.len(),
        catalog.len()
    );
    for def in catalog {
        match unlocked.iter().find(|u| u.achievement_id == def.id) {
            Some(record) => {
                println!(
                    "  ★ {}: {} (unlocked {})",
                    def.name,
                    def.description,
                    record.unlocked_at.format("%Y-%m-%d")
                );
                if let Some(context) = &record.context {
                    println!("      {}", context);
                }
            }
            None => println!("  ☆ {}: {}", def.name, def.description),
        }
    }

    Ok(())
}

fn cmd_status(data_dir: PathBuf) -> Result<()> {
    let recovery_path = data_dir.join("recovery.json");
    if let Some(snapshot) = SessionSnapshot::load(&recovery_path)? {
        println!("Interrupted session found:");
        display_snapshot(&snapshot);
        println!("Run 'setforge resume' to pick it up, or 'setforge resume --discard' to drop it.");
        return Ok(());
    }

    let store = JsonlStore::open(&data_dir)?;
    let logs = store.log_count()?;
    let unlocked = store.unlocked_achievement_ids()?.len();

    println!(
        "{} workouts logged, {}/{} achievements unlocked.",
        logs,
        unlocked,
        achievement_catalog().len()
    );
    println!("Run 'setforge start --template <file>' to begin a workout.");

    Ok(())
}

// ============================================================================
// Session Loop
// ============================================================================

fn run_session_loop(
    session: &mut WorkoutSession,
    store: &mut JsonlStore,
    names: &HashMap<String, String>,
    auto_complete: bool,
    no_rest: bool,
    config: &Config,
) -> Result<()> {
    let snapshot_interval = Duration::from_secs(u64::from(config.timer.snapshot_interval_sec));
    let mut last_snapshot = Instant::now();

    // Weight entered per exercise, reused as the next prompt default.
    let mut last_weights: HashMap<String, u32> = HashMap::new();

    // Seconds spent at the last set-entry prompt; credited against the
    // following rest so the countdown reflects time actually rested.
    let mut entry_sec: u32 = 0;

    while session.phase() == SessionPhase::Active {
        if last_snapshot.elapsed() >= snapshot_interval && session.write_crash_recovery() {
            last_snapshot = Instant::now();
        }

        let Some(step) = session.current_step().cloned() else {
            break;
        };

        match step {
            WorkoutStep::Exercise { .. } => {
                entry_sec = run_exercise_step(
                    session,
                    &step,
                    names,
                    &mut last_weights,
                    auto_complete,
                )?;
            }
            WorkoutStep::Rest { .. } | WorkoutStep::SupersetRest { .. } => {
                run_rest_step(session, &step, auto_complete || no_rest, entry_sec, config)?;
                entry_sec = 0;
            }
            WorkoutStep::Complete { .. } => {
                session.advance_step();
            }
        }
    }

    if session.phase() != SessionPhase::Recap {
        return Ok(());
    }

    display_recap(session);

    if !auto_complete && !prompt_yes_no("Save this workout?")? {
        session.reset();
        println!("Workout discarded.");
        return Ok(());
    }

    match session.complete_workout(store)? {
        Some(log) => {
            let outcome = run_completion_pipeline(store, &log);
            display_outcome(&log, &outcome);
        }
        None => println!("Nothing to save."),
    }

    Ok(())
}

/// Show one exercise step, take the set entry, and advance. Returns the
/// seconds spent at the prompt.
fn run_exercise_step(
    session: &mut WorkoutSession,
    step: &WorkoutStep,
    names: &HashMap<String, String>,
    last_weights: &mut HashMap<String, u32>,
    auto_complete: bool,
) -> Result<u32> {
    // Default weight when auto-completing: an empty 20 kg bar.
    const AUTO_WEIGHT_G: u32 = 20_000;

    let WorkoutStep::Exercise {
        exercise_id,
        set_index,
        reps_min,
        reps_max,
        ..
    } = step
    else {
        session.advance_step();
        return Ok(0);
    };

    // The terminal Complete step carries blocks.len().
    let total_blocks = session
        .steps()
        .last()
        .map(WorkoutStep::block_index)
        .unwrap_or(0);

    let name = display_name(names, exercise_id);
    display_exercise_step(&name, step, total_blocks);

    let Some(ordinal) = session.current_exercise_ordinal() else {
        session.advance_step();
        return Ok(0);
    };

    let prompt_started = Instant::now();
    let entry = if auto_complete {
        SetEntry::Logged {
            reps_done: *reps_min,
            weight_g: AUTO_WEIGHT_G,
        }
    } else {
        let default_weight_g = last_weights.get(exercise_id).copied().unwrap_or(0);
        prompt_set_entry(*reps_min, *reps_max, default_weight_g)?
    };

    match entry {
        SetEntry::Quit => {
            session.end_workout_early();
            Ok(0)
        }
        SetEntry::Logged { reps_done, weight_g } => {
            last_weights.insert(exercise_id.clone(), weight_g);
            let set = PerformedSet {
                exercise_id: exercise_id.clone(),
                exercise_name: name,
                block_path: step.block_path(),
                set_index: *set_index,
                reps_target_min: *reps_min,
                reps_target_max: *reps_max,
                reps_done,
                weight_g,
            };
            session.upsert_set(ordinal, set);
            session.advance_step();
            Ok(prompt_started.elapsed().as_secs().min(u64::from(u32::MAX)) as u32)
        }
    }
}

/// Offer the rest, run the countdown, and advance past it.
fn run_rest_step(
    session: &mut WorkoutSession,
    step: &WorkoutStep,
    skip_rests: bool,
    entry_sec: u32,
    config: &Config,
) -> Result<()> {
    let Some(duration) = step.rest_duration_sec() else {
        session.advance_step();
        return Ok(());
    };

    if skip_rests {
        session.skip_rest();
        return Ok(());
    }

    let kind = match step {
        WorkoutStep::SupersetRest { .. } => "Superset rest",
        _ => "Rest",
    };

    let prompt_started = Instant::now();
    let action = prompt_rest_action(kind, duration, entry_sec)?;
    let entry_total = entry_sec
        .saturating_add(prompt_started.elapsed().as_secs().min(u64::from(u32::MAX)) as u32);

    if matches!(action, RestAction::Skip) {
        session.skip_rest();
        println!("  Rest skipped.");
        return Ok(());
    }

    session.start_rest_timer(entry_total);
    if let RestAction::Adjust(delta) = action {
        session.adjust_rest(delta);
    }

    let tick = Duration::from_millis(config.timer.tick_ms);
    loop {
        match session.poll() {
            Some(SessionEvent::RestFinished { .. }) => break,
            Some(SessionEvent::RestTick { remaining_ms })
            | Some(SessionEvent::RestEndingSoon { remaining_ms }) => {
                print!("\r  {} {:>4}s remaining ", kind, remaining_ms.div_ceil(1000));
                io::stdout().flush()?;
            }
            None => break,
        }
        std::thread::sleep(tick);
    }

    println!();
    println!("  ✓ Rest complete.");
    Ok(())
}

// ============================================================================
// Prompts
// ============================================================================

enum SetEntry {
    Logged { reps_done: u32, weight_g: u32 },
    Quit,
}

fn prompt_set_entry(reps_min: u32, reps_max: u32, default_weight_g: u32) -> Result<SetEntry> {
    let reps_hint = if is_amrap(reps_max) {
        format!("{}+", reps_min)
    } else {
        format!("{}-{}", reps_min, reps_max)
    };

    print!("  reps done [{}] ('q' + Enter to finish early): ", reps_hint);
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    let trimmed = input.trim();

    if trimmed.eq_ignore_ascii_case("q") {
        return Ok(SetEntry::Quit);
    }

    let reps_done = if trimmed.is_empty() {
        reps_min
    } else {
        match trimmed.parse() {
            Ok(reps) => reps,
            Err(_) => {
                eprintln!("  Could not read reps, using {}", reps_min);
                reps_min
            }
        }
    };

    let default_kg = f64::from(default_weight_g) / 1000.0;
    print!("  weight kg [{:.1}]: ", default_kg);
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    let trimmed = input.trim();

    let weight_g = if trimmed.is_empty() {
        default_weight_g
    } else {
        match trimmed.parse::<f64>() {
            // Float-to-int casts saturate, so absurd entries just clamp.
            Ok(kg) if kg >= 0.0 => (kg * 1000.0).round() as u32,
            _ => {
                eprintln!("  Could not read weight, using {:.1} kg", default_kg);
                default_weight_g
            }
        }
    };

    Ok(SetEntry::Logged { reps_done, weight_g })
}

enum RestAction {
    Start,
    Skip,
    Adjust(i64),
}

fn prompt_rest_action(kind: &str, duration_sec: u32, entry_sec: u32) -> Result<RestAction> {
    println!("─────────────────────────────────────────");
    if entry_sec > 0 {
        println!(
            "{}: {}s ({}s already spent logging)",
            kind,
            duration_sec,
            entry_sec.min(duration_sec)
        );
    } else {
        println!("{}: {}s", kind, duration_sec);
    }
    println!("Press Enter to start the countdown");
    println!("  's' + Enter to skip");
    println!("  '+N' / '-N' + Enter to adjust seconds");
    print!("> ");
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    let trimmed = input.trim();

    let action = match trimmed {
        "s" => RestAction::Skip,
        t if t.starts_with('+') || t.starts_with('-') => match t.parse::<i64>() {
            Ok(delta) => RestAction::Adjust(delta),
            Err(_) => RestAction::Start,
        },
        _ => RestAction::Start,
    };

    Ok(action)
}

fn prompt_yes_no(question: &str) -> Result<bool> {
    print!("{} [Y/n] ", question);
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(!matches!(input.trim().to_lowercase().as_str(), "n" | "no"))
}

// ============================================================================
// Display
// ============================================================================

fn display_exercise_step(name: &str, step: &WorkoutStep, total_blocks: usize) {
    let WorkoutStep::Exercise {
        block_index,
        set_index,
        total_sets,
        reps_min,
        reps_max,
        is_superset,
        superset_exercise_index,
        superset_total_exercises,
        ..
    } = step
    else {
        return;
    };

    println!("\n╭─────────────────────────────────────────╮");
    println!(
        "│  BLOCK {}/{} · SET {}/{}",
        block_index + 1,
        total_blocks.max(1),
        set_index + 1,
        total_sets
    );
    println!("╰─────────────────────────────────────────╯");
    println!();
    println!("  {}", name);
    if is_amrap(*reps_max) {
        println!("  Target: {}+ reps (as many as possible)", reps_min);
    } else {
        println!("  Target: {}-{} reps", reps_min, reps_max);
    }
    if *is_superset {
        if let (Some(position), Some(total)) = (superset_exercise_index, superset_total_exercises) {
            println!("  Superset: exercise {} of {}", position + 1, total);
        }
    }
    println!();
}

fn display_recap(session: &WorkoutSession) {
    println!("\n═════════════════════════════════════════");
    println!("  WORKOUT RECAP · {}", session.template_name());
    println!("═════════════════════════════════════════");

    let elapsed_min = session
        .started_at()
        .map(|started| (chrono::Utc::now() - started).num_minutes().max(0))
        .unwrap_or(0);
    println!("  Elapsed: {} min", elapsed_min);
    println!("  Sets logged: {}", session.performed_sets().len());

    for set in session.performed_sets().values() {
        println!(
            "    {} set {}: {} reps x {}",
            set.exercise_name,
            set.set_index + 1,
            set.reps_done,
            format_kg(u64::from(set.weight_g))
        );
    }
    println!();
}

fn display_outcome(log: &WorkoutLog, outcome: &CompletionOutcome) {
    let status = match log.status {
        LogStatus::Completed => "completed",
        LogStatus::Partial => "partial",
    };

    println!(
        "✓ Workout saved ({}, {} sets, {} min, volume {})",
        status,
        log.performed_sets.len(),
        log.duration_sec / 60,
        format_kg(log.total_volume_g)
    );

    match &outcome.history_entries {
        Ok(0) => {}
        Ok(count) => println!("  History updated for {} exercises", count),
        Err(e) => println!("  (history update failed: {})", e),
    }

    match &outcome.records {
        Ok(records) => {
            for record in &records.one_rm {
                println!(
                    "  🏆 New est. 1RM record: {} {} (was {})",
                    record.exercise_name,
                    format_kg(record.achieved_g),
                    format_kg(record.previous_g)
                );
            }
            for record in &records.volume {
                println!(
                    "  🏆 New volume record: {} {} (was {})",
                    record.exercise_name,
                    format_kg(record.achieved_g),
                    format_kg(record.previous_g)
                );
            }
        }
        Err(e) => println!("  (record detection failed: {})", e),
    }

    match &outcome.achievements {
        Ok(unlocked) => {
            for achievement in unlocked {
                match achievement_def(&achievement.achievement_id) {
                    Some(def) => {
                        println!("  ★ Achievement unlocked: {}", def.name);
                        println!("      {}", def.description);
                    }
                    None => {
                        println!(
                            "  ★ Achievement unlocked: {}",
                            achievement.achievement_id
                        );
                    }
                }
                if let Some(context) = &achievement.context {
                    println!("      {}", context);
                }
            }
        }
        Err(e) => println!("  (achievement check failed: {})", e),
    }
}

fn display_snapshot(snapshot: &SessionSnapshot) {
    println!("  Template: {}", snapshot.template_name);
    println!("  Started:  {}", snapshot.started_at.format("%Y-%m-%d %H:%M"));
    println!(
        "  Progress: step {}/{} with {} sets logged",
        snapshot.cursor + 1,
        snapshot.steps.len().max(1),
        snapshot.performed.len()
    );
    println!("  Saved:    {}", snapshot.saved_at.format("%Y-%m-%d %H:%M:%S"));
}
