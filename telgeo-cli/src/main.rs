//! telgeo command-line interface.
//!
//! Inspects telescope layouts, converts hits between frames and traces
//! straight or helical tracks through the plane stack.
#![allow(clippy::uninlined_format_args, clippy::too_many_lines)]

use clap::{ArgAction, Parser, Subcommand};
use std::path::{Path, PathBuf};
use telgeo_core::nalgebra::Vector3;
use telgeo_core::{SensorId, TelescopeHit};
use telgeo_nav::{GeometryConfig, TelescopeGeometry};
use thiserror::Error;

/// Result type for CLI operations.
type Result<T> = std::result::Result<T, CliError>;

/// CLI error types.
#[derive(Error, Debug)]
enum CliError {
    #[error("layout error: {0}")]
    Layout(#[from] telgeo_io::Error),

    #[error("geometry error: {0}")]
    Core(#[from] telgeo_core::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

/// Parses `x,y,z`.
fn parse_vector(s: &str) -> std::result::Result<[f64; 3], String> {
    let values = s
        .split(',')
        .map(|v| v.trim().parse::<f64>().map_err(|e| format!("'{v}': {e}")))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    <[f64; 3]>::try_from(values.as_slice())
        .map_err(|_| format!("expected three comma-separated values, got {}", values.len()))
}

/// Telescope geometry queries.
#[derive(Parser)]
#[command(name = "telgeo")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the planes of a layout in z-order
    Info {
        /// Layout JSON file
        layout: PathBuf,
    },

    /// Convert a local hit position to the global frame
    ToGlobal {
        /// Layout JSON file
        layout: PathBuf,

        /// Sensor ID of the hit
        #[arg(short, long, allow_negative_numbers = true)]
        sensor: SensorId,

        /// Local position x,y,z (mm)
        #[arg(value_parser = parse_vector, allow_hyphen_values = true)]
        position: [f64; 3],
    },

    /// Convert a global hit position to a sensor's local frame
    ToLocal {
        /// Layout JSON file
        layout: PathBuf,

        /// Sensor ID of the hit
        #[arg(short, long, allow_negative_numbers = true)]
        sensor: SensorId,

        /// Global position x,y,z (mm)
        #[arg(value_parser = parse_vector, allow_hyphen_values = true)]
        position: [f64; 3],
    },

    /// Find the next plane along a straight line
    NextPlane {
        /// Layout JSON file
        layout: PathBuf,

        /// Start point x,y,z (mm)
        #[arg(long, value_parser = parse_vector, allow_hyphen_values = true)]
        point: [f64; 3],

        /// Direction x,y,z
        #[arg(long, value_parser = parse_vector, allow_hyphen_values = true)]
        direction: [f64; 3],
    },

    /// Intersect a track with a given plane
    Intersect {
        /// Layout JSON file
        layout: PathBuf,

        /// Target sensor ID
        #[arg(short, long, allow_negative_numbers = true)]
        sensor: SensorId,

        /// Start point x,y,z (mm)
        #[arg(long, value_parser = parse_vector, allow_hyphen_values = true)]
        point: [f64; 3],

        /// Momentum x,y,z (GeV/c)
        #[arg(long, value_parser = parse_vector, allow_hyphen_values = true)]
        momentum: [f64; 3],

        /// Charge in units of e
        #[arg(long, default_value = "-1.0", allow_negative_numbers = true)]
        charge: f64,
    },

    /// Integrate radiation lengths between two points
    Radlen {
        /// Layout JSON file
        layout: PathBuf,

        /// Start point x,y,z (mm)
        #[arg(long, value_parser = parse_vector, allow_hyphen_values = true)]
        from: [f64; 3],

        /// End point x,y,z (mm)
        #[arg(long, value_parser = parse_vector, allow_hyphen_values = true)]
        to: [f64; 3],

        /// Leave out the volumes holding the end points
        #[arg(long)]
        skip_boundary: bool,

        /// Radiation length of the world medium (mm); transparent if unset
        #[arg(long)]
        world_radiation_length: Option<f64>,
    },

    /// Write a layout back out, optionally moving one plane first
    Export {
        /// Layout JSON file
        layout: PathBuf,

        /// Output layout file
        #[arg(short, long)]
        output: PathBuf,

        /// Sensor to move
        #[arg(long, allow_negative_numbers = true, requires_all = ["position", "angles"])]
        sensor: Option<SensorId>,

        /// New centre x,y,z (mm)
        #[arg(long, value_parser = parse_vector, allow_hyphen_values = true)]
        position: Option<[f64; 3]>,

        /// New angles alpha,beta,gamma (degrees)
        #[arg(long, value_parser = parse_vector, allow_hyphen_values = true)]
        angles: Option<[f64; 3]>,
    },
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn load_geometry(path: &Path, config: GeometryConfig) -> Result<TelescopeGeometry> {
    let layout = telgeo_io::read_layout(path)?;
    let mut geometry =
        TelescopeGeometry::new(layout.catalog, layout.magnetic_field).with_geometry_config(config);
    geometry.build()?;
    Ok(geometry)
}

fn format_vector(v: &Vector3<f64>) -> String {
    format!("({:.6}, {:.6}, {:.6})", v.x, v.y, v.z)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    run(cli.command)
}

fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Info { layout } => {
            let layout = telgeo_io::read_layout(&layout)?;
            let catalog = &layout.catalog;

            println!("Layout: {}", catalog.layout_id());
            println!("Planes: {}", catalog.len());
            println!("Field: {:?} T", layout.magnetic_field.field);
            println!(
                "{:<5} | {:<6} | {:<30} | {:<24} | {:<9} | {:<8}",
                "Rank", "ID", "Position (mm)", "Angles (deg)", "Thickness", "X0 (mm)"
            );
            println!("{:-<97}", "");
            for (rank, plane) in catalog.iter().enumerate() {
                let [x, y, z] = plane.position;
                let [a, b, g] = plane.angles;
                println!(
                    "{:<5} | {:<6} | {:<30} | {:<24} | {:<9} | {:<8}",
                    rank,
                    plane.sensor_id,
                    format!("({x:.3}, {y:.3}, {z:.3})"),
                    format!("({a:.2}, {b:.2}, {g:.2})"),
                    plane.size[2],
                    plane.radiation_length
                );
            }
        }

        Commands::ToGlobal {
            layout,
            sensor,
            position,
        } => {
            let geometry = load_geometry(&layout, GeometryConfig::default())?;
            let hit = geometry.hit_to_global(&TelescopeHit::local(sensor, position))?;
            println!("{}", serde_json::to_string_pretty(&hit)?);
        }

        Commands::ToLocal {
            layout,
            sensor,
            position,
        } => {
            let geometry = load_geometry(&layout, GeometryConfig::default())?;
            let hit = geometry.hit_to_local(&TelescopeHit::global(sensor, position))?;
            println!("{}", serde_json::to_string_pretty(&hit)?);
        }

        Commands::NextPlane {
            layout,
            point,
            direction,
        } => {
            let direction = Vector3::from(direction);
            if direction.norm() == 0.0 {
                return Err(CliError::InvalidArgument(
                    "direction must be non-zero".to_string(),
                ));
            }
            let geometry = load_geometry(&layout, GeometryConfig::default())?;
            let crossing = geometry
                .intersector()?
                .find_next_plane(Vector3::from(point), direction);

            if crossing.is_found() {
                println!("Next plane: {}", crossing.sensor_id);
                println!("Entry point: {}", format_vector(&crossing.point));
            } else {
                println!("No plane found (status {})", crossing.sensor_id);
                println!("Last point: {}", format_vector(&crossing.point));
            }
        }

        Commands::Intersect {
            layout,
            sensor,
            point,
            momentum,
            charge,
        } => {
            let momentum = Vector3::from(momentum);
            if momentum.norm() == 0.0 {
                return Err(CliError::InvalidArgument(
                    "momentum must be non-zero".to_string(),
                ));
            }
            let geometry = load_geometry(&layout, GeometryConfig::default())?;
            let intersection = geometry.intersector()?.find_intersection(
                &Vector3::from(point),
                &momentum,
                charge,
                sensor,
            )?;

            println!("Status: {}", intersection.status);
            println!("Position: {}", format_vector(&intersection.position));
            println!("Momentum: {}", format_vector(&intersection.momentum));
            println!("Arc length: {:.6} mm", intersection.arc_length);
            if intersection.is_found() {
                let local = geometry
                    .frames()
                    .global_to_local(sensor, &intersection.position)?;
                println!("Local position: {}", format_vector(&local));
            }
        }

        Commands::Radlen {
            layout,
            from,
            to,
            skip_boundary,
            world_radiation_length,
        } => {
            let mut config = GeometryConfig::default();
            if let Some(radiation_length) = world_radiation_length {
                config = config.with_world_radiation_length(radiation_length);
            }
            let geometry = load_geometry(&layout, config)?;
            let report = geometry.radiation_integrator()?.accumulate_detailed(
                &Vector3::from(from),
                &Vector3::from(to),
                skip_boundary,
            );

            println!("X/X0: {:.6e}", report.total);
            println!("Path length: {:.6} mm", report.length);
            println!("Steps: {} ({} nudges)", report.steps, report.nudges);
            println!("Termination: {:?}", report.reason);
        }

        Commands::Export {
            layout,
            output,
            sensor,
            position,
            angles,
        } => {
            let mut geometry = load_geometry(&layout, GeometryConfig::default())?;
            let field = *geometry.propagator().field();

            if let (Some(sensor), Some(position), Some(angles)) = (sensor, position, angles) {
                geometry.set_placement(sensor, position, angles)?;
                geometry.update_layout()?;
                log::info!("moved sensor {sensor} to {position:?} with angles {angles:?}");
            }

            telgeo_io::write_layout(&output, geometry.catalog(), &field)?;
            println!(
                "Wrote {} planes to {}",
                geometry.catalog().len(),
                output.display()
            );
        }
    }

    Ok(())
}
