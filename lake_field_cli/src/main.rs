use std::fs::{self, File};
use std::hash::{Hash, Hasher};
use std::io::{self, BufReader, Write};
use std::panic;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use chrono::NaiveDateTime;
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum, ValueHint};
use lake_field::{
    build_field, grid_from_readings, parse_readings, parse_sun_table, rng_from_seed, year_bounds,
    FieldParams, FieldReports, FitnessGrid, FitnessModel, Grid, GridRow, LakeField, Policy,
    RejectedLine, Resolution, Step, SunTable, Trajectory, DEFAULT_DEPTH_STEP,
    DEFAULT_HEADER_LINES,
};
use plotters::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const CACHE_VERSION: u32 = 1;

#[derive(Parser, Debug)]
#[command(author, version, about = "Lake thermal field and movement simulation CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build the gap-filled, depth-interpolated field for one year and export it
    Field(FieldCommandArgs),
    /// Run movement policies over the field and export their trajectories
    Simulate(SimulateArgs),
}

#[derive(Args, Debug)]
struct FieldArgs {
    /// Sensor CSV export to ingest
    #[arg(value_hint = ValueHint::FilePath)]
    input: PathBuf,

    /// Target year
    #[arg(long)]
    year: i32,

    /// Walk the field in daily instead of hourly steps
    #[arg(long, action = ArgAction::SetTrue)]
    daily: bool,

    /// Layout of the sensor export
    #[arg(long, value_enum, default_value_t = ResolutionOpt::Hourly)]
    resolution: ResolutionOpt,

    /// Depth spacing (meters) for interpolated cells
    #[arg(long, default_value_t = DEFAULT_DEPTH_STEP)]
    depth_step: f64,

    /// Fitness model
    #[arg(long, value_enum, default_value_t = FitnessModelOpt::OptimumRelative)]
    fitness_model: FitnessModelOpt,

    /// Optional fitness parameter JSON (overrides or a full tagged model)
    #[arg(long, value_hint = ValueHint::FilePath)]
    fitness_params: Option<PathBuf>,

    /// Skip the parsed-field cache
    #[arg(long, action = ArgAction::SetTrue)]
    no_cache: bool,

    /// Verbose logging
    #[arg(long, action = ArgAction::SetTrue)]
    verbose: bool,

    /// Log stage timings
    #[arg(long, action = ArgAction::SetTrue)]
    profile: bool,
}

#[derive(Args, Debug)]
struct FieldCommandArgs {
    #[command(flatten)]
    field: FieldArgs,

    /// Output grid CSV path (`-` for stdout)
    #[arg(short, long, default_value = "lake_field.csv", value_hint = ValueHint::FilePath)]
    output: PathBuf,

    /// Optional fitness CSV path (`-` for stdout)
    #[arg(long, value_hint = ValueHint::FilePath)]
    fitness_output: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct SimulateArgs {
    #[command(flatten)]
    field: FieldArgs,

    /// Sunrise/sunset table for the target year (needed by circadian policies)
    #[arg(long, value_hint = ValueHint::FilePath)]
    sun: Option<PathBuf>,

    /// Header lines to skip in the sunrise/sunset table
    #[arg(long, default_value_t = DEFAULT_HEADER_LINES)]
    sun_header_lines: usize,

    /// Movement policy (repeatable): oracle, random-walk,
    /// directional-random-walk[:p], hill-climbing, circadian:slow|fast, stable:<depth>
    #[arg(long = "policy", default_values = ["oracle", "hill-climbing", "random-walk"])]
    policies: Vec<Policy>,

    /// Seed for reproducible stochastic policies
    #[arg(long)]
    seed: Option<u64>,

    /// Output trajectory CSV path (`-` for stdout)
    #[arg(short, long, default_value = "trajectories.csv", value_hint = ValueHint::FilePath)]
    output: PathBuf,

    /// Output SVG figure path (defaults next to CSV)
    #[arg(long, value_hint = ValueHint::FilePath)]
    svg: Option<PathBuf>,

    /// Disable plot generation
    #[arg(long, action = ArgAction::SetTrue)]
    no_plot: bool,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum ResolutionOpt {
    Hourly,
    Daily,
    Hires,
}

impl From<ResolutionOpt> for Resolution {
    fn from(value: ResolutionOpt) -> Self {
        match value {
            ResolutionOpt::Hourly => Resolution::Hourly,
            ResolutionOpt::Daily => Resolution::Daily,
            ResolutionOpt::Hires => Resolution::Hires,
        }
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum FitnessModelOpt {
    OptimumRelative,
    DoubleExponential,
}

impl From<FitnessModelOpt> for FitnessModel {
    fn from(value: FitnessModelOpt) -> Self {
        match value {
            FitnessModelOpt::OptimumRelative => FitnessModel::synechococcus(),
            FitnessModelOpt::DoubleExponential => FitnessModel::double_exponential(),
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let verbose = match &cli.command {
        Command::Field(args) => args.field.verbose,
        Command::Simulate(args) => args.field.verbose,
    };
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    match cli.command {
        Command::Field(args) => handle_field(args),
        Command::Simulate(args) => handle_simulate(args),
    }
}

fn handle_field(args: FieldCommandArgs) -> Result<()> {
    let params = field_params(&args.field)?;
    let field = load_field(&args.field, &params)?;

    let t_csv = Instant::now();
    let rows = write_grid_csv(&field, &args.output)?;
    if args.field.profile || args.field.verbose {
        info!(
            "CSV stage: {:.1} ms ({} rows)",
            t_csv.elapsed().as_secs_f64() * 1000.0,
            rows
        );
    }
    if args.output.as_os_str() != "-" {
        info!("Wrote grid CSV: {}", args.output.display());
    }

    if let Some(path) = args.fitness_output.as_ref() {
        write_fitness_csv(&field.fitness, path)?;
        if path.as_os_str() != "-" {
            info!("Wrote fitness CSV: {}", path.display());
        }
    }
    Ok(())
}

fn handle_simulate(args: SimulateArgs) -> Result<()> {
    if args.policies.is_empty() {
        return Err(anyhow!("no movement policies supplied"));
    }
    let params = field_params(&args.field)?;
    let field = load_field(&args.field, &params)?;

    let sun = match args.sun.as_ref() {
        Some(path) => Some(load_sun_table(path, params.year, args.sun_header_lines)?),
        None => None,
    };
    let simulation = match sun.as_ref() {
        Some(table) => field.simulation_with_sun(table),
        None => field.simulation(),
    };

    let t_sim = Instant::now();
    let mut trajectories = Vec::with_capacity(args.policies.len());
    for policy in &args.policies {
        // Fresh generator per policy so a seeded run does not depend on policy order.
        let mut rng = rng_from_seed(args.seed);
        let trajectory = simulation
            .run(policy, &mut rng)
            .with_context(|| format!("{} simulation failed", policy))?;
        match trajectory.mean_fitness() {
            Some(mean) => info!(
                "{}: {} steps, mean fitness {:.4}, total {:.2}",
                policy,
                trajectory.len(),
                mean,
                trajectory.total_fitness()
            ),
            None => warn!("{}: no steps in {}", policy, params.year),
        }
        trajectories.push(trajectory);
    }
    if args.field.profile || args.field.verbose {
        info!(
            "Simulation stage: {:.1} ms ({} policies)",
            t_sim.elapsed().as_secs_f64() * 1000.0,
            trajectories.len()
        );
    }

    write_trajectory_csv(&trajectories, &args.output)?;
    if args.output.as_os_str() != "-" {
        info!("Wrote trajectory CSV: {}", args.output.display());
    }

    if !args.no_plot {
        let svg_path = match args.svg.as_ref() {
            Some(path) => Some(path.clone()),
            None if args.output.as_os_str() != "-" => {
                let mut path = args.output.clone();
                path.set_extension("svg");
                Some(path)
            }
            None => None,
        };
        if let Some(path) = svg_path {
            if let Err(err) = render_plot_guard(&trajectories, field.start, &path) {
                warn!("Skipping SVG render ({}): {}", path.display(), err);
            } else {
                info!("Wrote plot: {}", path.display());
            }
        }
    }
    Ok(())
}

fn field_params(args: &FieldArgs) -> Result<FieldParams> {
    let mut params = FieldParams::default();
    params.year = args.year;
    params.step = Step::from_hourly(!args.daily);
    params.depth_step = args.depth_step;
    params.fitness = args.fitness_model.into();
    if let Some(path) = args.fitness_params.as_ref() {
        params.fitness = load_fitness_params(path, &params.fitness)?;
    }
    Ok(params)
}

fn load_field(args: &FieldArgs, params: &FieldParams) -> Result<LakeField> {
    let cache_dir = PathBuf::from(".cache").join("lake_field");
    let key = cache_key(&args.input, args.resolution, params)?;
    if !args.no_cache {
        if let Some(cached) = read_cache(&cache_dir, &key) {
            info!("Using cached field for {}", args.input.display());
            return field_from_cache(cached, params);
        }
    }

    let t_parse = Instant::now();
    let file = File::open(&args.input)
        .with_context(|| format!("failed to open {}", args.input.display()))?;
    let parsed = parse_readings(BufReader::new(file), args.resolution.into())
        .with_context(|| format!("failed to parse {}", args.input.display()))?;
    if !parsed.rejected.is_empty() {
        let header: Vec<&str> = parsed.header.iter().map(String::as_str).collect();
        let sidecar = write_error_sidecar(&args.input, &header, &parsed.rejected)?;
        warn!(
            "{} malformed rows in {} (see {})",
            parsed.rejected.len(),
            args.input.display(),
            sidecar.display()
        );
    }
    if args.profile || args.verbose {
        info!(
            "Parse stage: {:.1} ms ({} readings)",
            t_parse.elapsed().as_secs_f64() * 1000.0,
            parsed.readings.len()
        );
    }
    let grid = grid_from_readings(&parsed)
        .with_context(|| format!("no usable readings in {}", args.input.display()))?;

    let t_build = Instant::now();
    let field = build_field(grid, params).context("failed to build lake field")?;
    if args.profile || args.verbose {
        info!(
            "Build stage: {:.1} ms",
            t_build.elapsed().as_secs_f64() * 1000.0
        );
    }
    info!(
        "Field {}: {} timestamps, {} scored hours",
        params.year,
        field.grid.len(),
        field.fitness.len()
    );

    if !args.no_cache {
        let _ = fs::create_dir_all(&cache_dir);
        // Best-effort cache write
        if let Err(err) = write_cache(&cache_dir, &key, &field) {
            debug!("cache write skipped: {}", err);
        }
    }
    Ok(field)
}

#[derive(Serialize, Deserialize)]
struct CachedField {
    version: u32,
    rows: Vec<GridRow>,
    reports: FieldReports,
}

fn cache_key(path: &Path, resolution: ResolutionOpt, params: &FieldParams) -> Result<String> {
    use std::time::SystemTime;
    let meta = fs::metadata(path).with_context(|| format!("failed to stat {}", path.display()))?;
    let size = meta.len();
    let modified = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
    let dur = modified
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default();
    let mtime = (dur.as_secs(), dur.subsec_nanos());
    let params_json = serde_json::to_string(params)?;

    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    CACHE_VERSION.hash(&mut hasher);
    path.to_string_lossy().hash(&mut hasher);
    size.hash(&mut hasher);
    mtime.hash(&mut hasher);
    format!("{:?}", resolution).hash(&mut hasher);
    params_json.hash(&mut hasher);
    Ok(format!("{:016x}", hasher.finish()))
}

fn read_cache(dir: &Path, key: &str) -> Option<CachedField> {
    let path = dir.join(format!("{}.json", key));
    let text = fs::read_to_string(&path).ok()?;
    let cached: CachedField = serde_json::from_str(&text).ok()?;
    (cached.version == CACHE_VERSION).then_some(cached)
}

fn write_cache(dir: &Path, key: &str, field: &LakeField) -> Result<()> {
    let path = dir.join(format!("{}.json", key));
    let cached = CachedField {
        version: CACHE_VERSION,
        rows: field.grid.rows(),
        reports: field.reports.clone(),
    };
    let text = serde_json::to_string(&cached)?;
    fs::write(&path, text).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

fn field_from_cache(cached: CachedField, params: &FieldParams) -> Result<LakeField> {
    let (start, end) = year_bounds(params.year)?;
    let grid = Grid::from_rows(cached.rows);
    let fitness = FitnessGrid::evaluate(&grid, &params.fitness, start, end);
    Ok(LakeField {
        grid,
        fitness,
        start,
        end,
        step: params.step,
        reports: cached.reports,
    })
}

fn load_fitness_params(path: &Path, base: &FitnessModel) -> Result<FitnessModel> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read fitness parameters {}", path.display()))?;
    let json: JsonValue = serde_json::from_str(&text)
        .with_context(|| format!("{} is not valid JSON", path.display()))?;
    let overrides = json
        .as_object()
        .ok_or_else(|| anyhow!("fitness parameters must be a JSON object"))?;
    if overrides.contains_key("model") {
        return serde_json::from_value(json.clone())
            .with_context(|| format!("invalid fitness model in {}", path.display()));
    }

    let mut merged = serde_json::to_value(base)?;
    let fields = merged
        .as_object_mut()
        .ok_or_else(|| anyhow!("fitness model did not serialize to an object"))?;
    for (key, value) in overrides {
        if !fields.contains_key(key) {
            return Err(anyhow!("unknown fitness parameter '{}' for this model", key));
        }
        if !value.is_number() {
            return Err(anyhow!("invalid value for '{}': expected number", key));
        }
        fields.insert(key.clone(), value.clone());
    }
    if overrides.is_empty() {
        warn!("fitness parameters {} had no entries", path.display());
    }
    serde_json::from_value(merged).context("invalid fitness parameters")
}

fn load_sun_table(path: &Path, year: i32, header_lines: usize) -> Result<SunTable> {
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let parsed = parse_sun_table(BufReader::new(file), year, header_lines)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    if !parsed.rejected.is_empty() {
        let header: Vec<&str> = parsed.header.iter().map(String::as_str).collect();
        let sidecar = write_error_sidecar(path, &header, &parsed.rejected)?;
        warn!(
            "{} malformed lines in {} (see {})",
            parsed.rejected.len(),
            path.display(),
            sidecar.display()
        );
    }
    info!("Sun table {}: {} days", year, parsed.table.len());
    Ok(parsed.table)
}

/// `<input>error.txt`, next to the input.
fn sidecar_path(input: &Path) -> PathBuf {
    let mut name = input.as_os_str().to_os_string();
    name.push("error.txt");
    PathBuf::from(name)
}

fn write_error_sidecar(input: &Path, header: &[&str], rejected: &[RejectedLine]) -> Result<PathBuf> {
    let path = sidecar_path(input);
    let mut file =
        File::create(&path).with_context(|| format!("failed to create {}", path.display()))?;
    for line in header {
        writeln!(file, "{}", line)?;
    }
    for line in rejected {
        writeln!(file, "{}", line.raw)?;
    }
    Ok(path)
}

fn open_csv(path: &Path) -> Result<csv::Writer<Box<dyn Write>>> {
    let sink: Box<dyn Write> = if path.as_os_str() == "-" {
        Box::new(io::stdout().lock())
    } else {
        Box::new(
            File::create(path).with_context(|| format!("failed to create {}", path.display()))?,
        )
    };
    Ok(csv::Writer::from_writer(sink))
}

fn write_grid_csv(field: &LakeField, path: &Path) -> Result<usize> {
    let mut writer = open_csv(path)?;
    writer.write_record(["timestamp", "depth", "temperature", "flag", "frequency"])?;
    let mut rows = 0usize;
    for (timestamp, profile) in field.grid.range(field.start..=field.end) {
        let stamp = timestamp.format(TIMESTAMP_FORMAT).to_string();
        for (depth, cell) in profile {
            writer.write_record([
                stamp.clone(),
                format!("{:.3}", depth.0),
                format!("{:.3}", cell.temperature),
                cell.flag.clone(),
                cell.frequency.clone().unwrap_or_default(),
            ])?;
            rows += 1;
        }
    }
    writer.flush()?;
    Ok(rows)
}

fn write_fitness_csv(fitness: &FitnessGrid, path: &Path) -> Result<()> {
    let mut writer = open_csv(path)?;
    writer.write_record(["timestamp", "depth", "fitness"])?;
    for (timestamp, scores) in fitness.iter() {
        let stamp = timestamp.format(TIMESTAMP_FORMAT).to_string();
        for (depth, value) in scores {
            writer.write_record([
                stamp.clone(),
                format!("{:.3}", depth.0),
                format!("{:.6}", value),
            ])?;
        }
    }
    writer.flush()?;
    Ok(())
}

fn write_trajectory_csv(trajectories: &[Trajectory], path: &Path) -> Result<()> {
    let mut writer = open_csv(path)?;
    writer.write_record(["policy", "timestamp", "depth", "temperature", "fitness"])?;
    for trajectory in trajectories {
        for i in 0..trajectory.len() {
            writer.write_record([
                trajectory.policy.clone(),
                trajectory.dates[i].format(TIMESTAMP_FORMAT).to_string(),
                format!("{:.3}", trajectory.depths[i]),
                format!("{:.3}", trajectory.temperatures[i]),
                format!("{:.6}", trajectory.fitnesses[i]),
            ])?;
        }
    }
    writer.flush()?;
    Ok(())
}

struct PolicySeries<'a> {
    label: &'a str,
    hours: Vec<f64>,
    fitness: Vec<f64>,
    color: RGBColor,
}

const SERIES_COLORS: [RGBColor; 6] = [
    RGBColor(200, 0, 100),
    RGBColor(50, 50, 50),
    RGBColor(30, 144, 255),
    RGBColor(34, 139, 34),
    RGBColor(255, 140, 0),
    RGBColor(128, 0, 128),
];

fn render_plot_guard(
    trajectories: &[Trajectory],
    origin: NaiveDateTime,
    path: &Path,
) -> Result<(), String> {
    let render = || -> Result<(), String> {
        render_fitness_plot(trajectories, origin, path)
            .map_err(|e| format!("plotting error: {}", e))
    };

    panic::catch_unwind(panic::AssertUnwindSafe(render))
        .map_err(|_| "plotting backend panicked".to_string())?
}

fn render_fitness_plot(trajectories: &[Trajectory], origin: NaiveDateTime, path: &Path) -> Result<()> {
    let series: Vec<PolicySeries> = trajectories
        .iter()
        .enumerate()
        .filter(|(_, t)| !t.is_empty())
        .map(|(idx, t)| PolicySeries {
            label: t.policy.as_str(),
            hours: t
                .dates
                .iter()
                .map(|d| (*d - origin).num_minutes() as f64 / 60.0)
                .collect(),
            fitness: t.fitnesses.clone(),
            color: SERIES_COLORS[idx % SERIES_COLORS.len()],
        })
        .collect();
    if series.is_empty() {
        return Ok(());
    }

    let x_max = series
        .iter()
        .flat_map(|s| s.hours.iter().copied())
        .fold(f64::MIN, f64::max)
        .max(1.0);
    let y_min = series
        .iter()
        .flat_map(|s| s.fitness.iter().copied())
        .fold(f64::MAX, f64::min);
    let mut y_max = series
        .iter()
        .flat_map(|s| s.fitness.iter().copied())
        .fold(f64::MIN, f64::max);
    if y_max - y_min < 1e-9 {
        y_max = y_min + 1.0;
    }

    let area = SVGBackend::new(path, (1280, 760)).into_drawing_area();
    area.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&area)
        .margin(25)
        .set_label_area_size(LabelAreaPosition::Left, 60)
        .set_label_area_size(LabelAreaPosition::Bottom, 40)
        .build_cartesian_2d(0.0..x_max, y_min..y_max)?;

    chart
        .configure_mesh()
        .light_line_style(&TRANSPARENT)
        .x_desc("Hours since Jan 1")
        .y_desc("Fitness")
        .x_label_formatter(&|v| format!("{:.0}", v))
        .y_label_formatter(&|v| format!("{:.2}", v))
        .draw()?;

    for s in &series {
        let color = s.color;
        let style = ShapeStyle {
            color: color.to_rgba(),
            filled: false,
            stroke_width: 1,
        };
        chart
            .draw_series(LineSeries::new(
                s.hours.iter().copied().zip(s.fitness.iter().copied()),
                style,
            ))?
            .label(s.label)
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 30, y)], color));
    }

    chart
        .configure_series_labels()
        .background_style(&WHITE.mix(0.7))
        .border_style(&BLACK.mix(0.3))
        .position(SeriesLabelPosition::LowerRight)
        .draw()?;

    area.present()?;
    Ok(())
}
