//! Line-oriented driver for the localizer.
//!
//! Reads commands on stdin and answers on stdout:
//!
//! ```text
//! change <dx> <dy> <dtheta>   odometry since the last change (dtheta in radians)
//! left|front|right <dist>     new distance reading for a sensor
//! get                         print `particle <i> <x> <y> <weight>` lines
//! pose                        print `pose <x> <y> <theta>`
//! exit
//! ```
use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use log::{info, warn};
use prometheus_mcl::{AngleUnit, DistanceSensor, LocalizationConfig, Localizer, Pose};
use std::f64::consts::FRAC_PI_2;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

#[derive(Parser, Debug)]
#[command(name = "mcl_harness", about = "Drive the particle filter from stdin commands")]
struct Args {
    /// YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the particle count
    #[arg(short = 'n', long)]
    particles: Option<usize>,

    /// Seed the random source for reproducible runs
    #[arg(short, long)]
    seed: Option<u64>,

    /// Noise standard deviation attached to every distance reading
    #[arg(long, default_value_t = 63.0)]
    sensor_std_dev: f64,
}

#[derive(Debug)]
enum Command {
    Change(Pose),
    Reading { sensor: String, distance: f64 },
    Get,
    Pose,
    Exit,
}

fn parse_number(token: Option<&str>, what: &str) -> Result<f64> {
    let token = token.ok_or_else(|| anyhow!("missing {}", what))?;
    token
        .parse()
        .with_context(|| format!("invalid {} `{}`", what, token))
}

fn parse_command(line: &str) -> Result<Option<Command>> {
    let mut tokens = line.split_whitespace();
    let Some(code) = tokens.next() else {
        return Ok(None);
    };

    let command = match code {
        "change" => {
            let dx = parse_number(tokens.next(), "dx")?;
            let dy = parse_number(tokens.next(), "dy")?;
            let dtheta = parse_number(tokens.next(), "dtheta")?;
            // the visualizer measures heading the other way round
            Command::Change(Pose::new(dx, dy, -dtheta))
        }
        "left" | "front" | "right" => Command::Reading {
            sensor: code.to_string(),
            distance: parse_number(tokens.next(), "distance")?,
        },
        "get" => Command::Get,
        "pose" => Command::Pose,
        "exit" => Command::Exit,
        other => bail!("unknown command `{}`", other),
    };
    Ok(Some(command))
}

fn build_localizer(args: &Args) -> Result<Localizer> {
    let mut config = match &args.config {
        Some(path) => LocalizationConfig::from_yaml_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => LocalizationConfig::default(),
    };
    if let Some(particles) = args.particles {
        config.filter.num_particles = particles;
    }
    if args.seed.is_some() {
        config.filter.seed = args.seed;
    }

    let mut localizer = Localizer::new(config)?;
    localizer.add_sensor(DistanceSensor::new("left", Pose::new(0.0, 0.0, FRAC_PI_2)));
    localizer.add_sensor(DistanceSensor::new("front", Pose::new(0.0, 0.0, 0.0)));
    localizer.add_sensor(DistanceSensor::new("right", Pose::new(0.0, 0.0, -FRAC_PI_2)));
    localizer.set_pose(0.0, 0.0, 90.0, AngleUnit::Degrees, true)?;
    Ok(localizer)
}

fn apply(localizer: &mut Localizer, command: Command, sensor_std_dev: f64) -> Result<bool> {
    match command {
        Command::Change(delta) => localizer.odom_update(delta)?,
        Command::Reading { sensor, distance } => {
            localizer.update_sensor_by_name(&sensor, distance, sensor_std_dev)?
        }
        Command::Get => {
            for (i, particle) in localizer.particles().iter().enumerate() {
                println!(
                    "particle {} {} {} {}",
                    i, particle.location.x, particle.location.y, particle.weight
                );
            }
        }
        Command::Pose => {
            let pose = localizer.get_pose(AngleUnit::Radians, false);
            println!("pose {} {} {}", pose.x, pose.y, pose.theta);
        }
        Command::Exit => return Ok(false),
    }
    Ok(true)
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut localizer = build_localizer(&args)?;
    info!(
        "Localizer ready with {} particles",
        localizer.filter().num_particles()
    );

    // stdin is read on its own task; the localizer is only touched here
    let (tx, mut rx) = mpsc::channel::<String>(64);
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if tx.send(line).await.is_err() {
                break;
            }
        }
    });

    while let Some(line) = rx.recv().await {
        let command = match parse_command(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                warn!("Ignoring `{}`: {:#}", line, e);
                continue;
            }
        };
        match apply(&mut localizer, command, args.sensor_std_dev) {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) => warn!("Command `{}` failed: {:#}", line, e),
        }
    }

    info!("Shutting down");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_change_negates_heading() {
        match parse_command("change 1.5 -2 0.25").unwrap() {
            Some(Command::Change(delta)) => assert_eq!(delta, Pose::new(1.5, -2.0, -0.25)),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_parse_reading() {
        match parse_command("front 42.5").unwrap() {
            Some(Command::Reading { sensor, distance }) => {
                assert_eq!(sensor, "front");
                assert_eq!(distance, 42.5);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_command("change 1 two 3").is_err());
        assert!(parse_command("left").is_err());
        assert!(parse_command("teleport 1 2").is_err());
        assert!(parse_command("   ").unwrap().is_none());
    }

    #[test]
    fn test_exit_stops_loop() {
        let args = Args::parse_from(["mcl_harness", "-n", "50", "-s", "1"]);
        let mut localizer = build_localizer(&args).unwrap();
        assert!(apply(&mut localizer, Command::Pose, 63.0).unwrap());
        assert!(!apply(&mut localizer, Command::Exit, 63.0).unwrap());
    }
}
