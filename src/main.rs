// ========================================================================================
//
//                        ALOE-RSM: RESPONSE SURFACE EXPLORER
//
// ========================================================================================
//
// Command-line front end. Every subcommand loads the experiment table once, fits the
// reduced cubic model for each solvent system, and writes its results to disk. Data
// sources are local paths or URLs; without one, the published dataset is downloaded.

use aloe_rsm::coding::Factor;
use aloe_rsm::dashboard::{DASHBOARD_RESOLUTION, build_dashboard};
use aloe_rsm::explorer::{Explorer, ExplorerRequest, default_sliders};
use aloe_rsm::export::{DASHBOARD_INDEX_FILE, FitSummary, write_dashboard, write_surface_tsv};
use aloe_rsm::source::DEFAULT_SOURCE_URL;
use aloe_rsm::surface::DEFAULT_RESOLUTION;
use aloe_rsm::types::SolventSystem;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;

#[derive(Parser)]
#[command(
    name = "aloe-rsm",
    version,
    about = "Response-surface explorer for aloesin extraction with green solvents",
    long_about = "Fits the reduced cubic response-surface model to a central composite \
                 extraction design for three solvent systems and renders predicted yield \
                 surfaces over two-factor slices."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fit every solvent system and summarise the fits
    #[command(about = "Fit all solvent systems (outputs: fit_summary.toml)")]
    Fit {
        /// Experiment CSV path or URL
        #[arg(value_name = "SOURCE", default_value = DEFAULT_SOURCE_URL)]
        source: String,

        #[arg(long, default_value = "fit_summary.toml")]
        out: PathBuf,
    },

    /// Predict one surface slice for one solvent system
    #[command(about = "Generate a response surface (outputs: surface.tsv)")]
    Surface {
        /// Experiment CSV path or URL
        #[arg(value_name = "SOURCE", default_value = DEFAULT_SOURCE_URL)]
        source: String,

        /// Solvent system: et_w, pg_w or gly_w
        #[arg(long, default_value = "et_w")]
        solvent: SolventSystem,

        /// Factor held constant: time, temp or solvent
        #[arg(long, default_value = "solvent")]
        fixed: Factor,

        /// Value of the held factor; defaults to its design center
        #[arg(long)]
        value: Option<f64>,

        /// Grid points per swept axis
        #[arg(long, default_value_t = DEFAULT_RESOLUTION)]
        resolution: usize,

        #[arg(long, default_value = "surface.tsv")]
        out: PathBuf,
    },

    /// Rank the fitted coefficients by magnitude
    #[command(about = "Show the coefficient impact table")]
    Importance {
        /// Experiment CSV path or URL
        #[arg(value_name = "SOURCE", default_value = DEFAULT_SOURCE_URL)]
        source: String,

        #[arg(long, default_value = "et_w")]
        solvent: SolventSystem,
    },

    /// Render the 3x3 comparison of all systems and slices
    #[command(about = "Build the comparative dashboard (outputs: dashboard/)")]
    Dashboard {
        /// Experiment CSV path or URL
        #[arg(value_name = "SOURCE", default_value = DEFAULT_SOURCE_URL)]
        source: String,

        #[arg(long, default_value_t = DASHBOARD_RESOLUTION)]
        resolution: usize,

        #[arg(long, default_value = "dashboard")]
        out_dir: PathBuf,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Fit { source, out } => fit_command(&source, out),
        Commands::Surface {
            source,
            solvent,
            fixed,
            value,
            resolution,
            out,
        } => surface_command(&source, solvent, fixed, value, resolution, out),
        Commands::Importance { source, solvent } => importance_command(&source, solvent),
        Commands::Dashboard {
            source,
            resolution,
            out_dir,
        } => dashboard_command(&source, resolution, out_dir),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn fit_command(source: &str, out: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let mut explorer: Explorer = Explorer::default();
    let set = explorer.models(source)?;
    println!("Loaded {} experimental runs from: {}", set.data.len(), source);

    for (system, result) in &set.fits {
        match result {
            Ok(model) => println!(
                "{:<24} R² = {:.4}  adjusted R² = {:.4}",
                system.system_name(),
                model.statistics().r_squared,
                model.adj_r_squared()
            ),
            Err(e) => println!("{:<24} not fitted: {}", system.system_name(), e),
        }
    }

    let summary = FitSummary::from_fits(source, &set.fits);
    summary.save(&out)?;
    println!("Fit summary saved to: {}", out.display());
    Ok(())
}

fn surface_command(
    source: &str,
    solvent: SolventSystem,
    fixed: Factor,
    value: Option<f64>,
    resolution: usize,
    out: PathBuf,
) -> Result<(), Box<dyn std::error::Error>> {
    let value = value.unwrap_or_else(|| default_sliders().get(fixed));
    let request = ExplorerRequest::new(solvent)
        .holding(fixed, value)
        .with_resolution(resolution);

    let mut explorer: Explorer = Explorer::default();
    let view = explorer.view(source, &request)?;

    println!("{}", view.title);
    println!(
        "{} held at {} ({} x {} grid)",
        fixed.axis_label(),
        view.surface.fixed_value,
        view.surface.resolution(),
        view.surface.resolution()
    );
    println!("Model R² (Adj): {:.3}", view.adj_r_squared);
    println!("Max Yield in View: {:.2} mg/L", view.max_yield);
    println!("{}", view.caption);
    if let Some(warning) = &view.surface.extrapolation {
        println!("Warning: {warning}");
    }

    write_surface_tsv(&view.surface, &out)?;
    println!("Surface saved to: {}", out.display());
    Ok(())
}

fn importance_command(
    source: &str,
    solvent: SolventSystem,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut explorer: Explorer = Explorer::default();
    let view = explorer.view(source, &ExplorerRequest::new(solvent))?;

    println!("Factor Impact Analysis: {}", solvent.column().to_uppercase());
    println!("{:<16} {:>12} {:>12}", "Feature", "Coefficient", "|Coefficient|");
    for impact in view.impacts.iter().rev() {
        println!(
            "{:<16} {:>12.4} {:>12.4}",
            impact.label,
            impact.coefficient,
            impact.magnitude()
        );
    }
    Ok(())
}

fn dashboard_command(
    source: &str,
    resolution: usize,
    out_dir: PathBuf,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut explorer: Explorer = Explorer::default();
    let set = explorer.models(source)?;
    let dashboard = build_dashboard(&set.fits, set.data.ranges(), resolution);

    println!("{}", dashboard.title());
    println!("{}", dashboard.subtitle());
    let index = write_dashboard(&dashboard, &out_dir)?;
    for panel in &index.panels {
        match (&panel.file, &panel.error) {
            (Some(file), _) => println!("  {:<20} -> {}", panel.title, file),
            (None, Some(reason)) => println!("  {:<20} unavailable: {}", panel.title, reason),
            (None, None) => println!("  {:<20} unavailable", panel.title),
        }
    }
    println!(
        "Dashboard saved to: {}",
        out_dir.join(DASHBOARD_INDEX_FILE).display()
    );
    Ok(())
}
