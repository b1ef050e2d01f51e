use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use andromap::constants::{D_KPC, M31_DEC0, M31_RA0, NB_FIELD_HEIGHT_DEG, NB_FIELD_WIDTH_DEG};
use andromap::ellipse::{DEFAULT_N_VERTS, EllipseConfig, isophote_polygons, read_profile_csv};
use andromap::fields::{FieldCatalog, box_footprint, narrowband_catalog, parse_dms, parse_hms};
use andromap::imagelog::{ImageLog, Selector, combined_footprint};
use andromap::{DataError, Deprojection, Lookup, Polygon, SkyCoord, TangentPlane};

#[derive(Parser)]
#[command(name = "andromap", about = "Sky footprint geometry for M31 survey maps")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Project an (RA, Dec) position onto the tangent plane.
    Project {
        /// Right ascension in degrees.
        #[arg(long, allow_hyphen_values = true)]
        ra: f64,

        /// Declination in degrees.
        #[arg(long, allow_hyphen_values = true)]
        dec: f64,

        /// Tangent point RA in degrees.
        #[arg(long, default_value_t = M31_RA0, allow_hyphen_values = true)]
        ra0: f64,

        /// Tangent point Dec in degrees.
        #[arg(long, default_value_t = M31_DEC0, allow_hyphen_values = true)]
        dec0: f64,
    },

    /// Deproject tangent-plane (xi, eta) back to (RA, Dec).
    Deproject {
        /// Tangent-plane xi in degrees.
        #[arg(long, allow_hyphen_values = true)]
        xi: f64,

        /// Tangent-plane eta in degrees.
        #[arg(long, allow_hyphen_values = true)]
        eta: f64,

        /// Tangent point RA in degrees.
        #[arg(long, default_value_t = M31_RA0, allow_hyphen_values = true)]
        ra0: f64,

        /// Tangent point Dec in degrees.
        #[arg(long, default_value_t = M31_DEC0, allow_hyphen_values = true)]
        dec0: f64,

        /// Use the exact inverse gnomonic transform.
        #[arg(long)]
        gnomonic: bool,
    },

    /// Union of the footprints in an image log.
    Union {
        /// JSON array of image documents, each with a "footprint" field.
        log: PathBuf,

        /// Mongo-style selector, e.g. '{"INSTRUME": "WIRCam"}'.
        #[arg(long)]
        select: Option<String>,

        /// Union separately for each distinct value of this key (e.g. OBJECT).
        #[arg(long)]
        by: Option<String>,

        /// Output JSON path (stdout if omitted).
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Isophote ellipses from a radial surface-brightness profile.
    Ellipses {
        /// CSV table with R (arcsec), PA and ELL columns.
        profile: PathBuf,

        /// Comma-separated galactocentric radii in kpc (e.g. "10,20,30").
        #[arg(long)]
        radii: String,

        /// Distance to M31 in kpc.
        #[arg(long, default_value_t = D_KPC)]
        distance: f64,

        /// Vertices per ellipse.
        #[arg(long, default_value_t = DEFAULT_N_VERTS)]
        n_verts: usize,

        /// Use the exact inverse gnomonic transform.
        #[arg(long)]
        gnomonic: bool,

        /// Output JSON path (stdout if omitted).
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Write the narrowband field catalog.
    PrepFields {
        /// Output JSON path.
        #[arg(short, long, default_value = "narrowband_fields.json")]
        output: PathBuf,
    },

    /// Polygons of named fields from a field catalog.
    Fields {
        /// Field catalog JSON written by prep-fields.
        catalog: PathBuf,

        /// Field names (e.g. AGB_1 NGC205).
        #[arg(required = true)]
        names: Vec<String>,

        /// Output JSON path (stdout if omitted).
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Rectangular footprint centered on a sky position.
    Box {
        /// Center RA as HH:MM:SS or decimal degrees.
        #[arg(long, allow_hyphen_values = true)]
        ra: String,

        /// Center Dec as DD:MM:SS or decimal degrees.
        #[arg(long, allow_hyphen_values = true)]
        dec: String,

        /// Box width in degrees.
        #[arg(long, default_value_t = NB_FIELD_WIDTH_DEG)]
        width: f64,

        /// Box height in degrees.
        #[arg(long, default_value_t = NB_FIELD_HEIGHT_DEG)]
        height: f64,

        /// Output JSON path (stdout if omitted).
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Serialize)]
struct PolygonsOutput<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    names: Option<Vec<String>>,
    polygons: Vec<&'a [(f64, f64)]>,
}

fn write_json<W: Write>(mut w: W, doc: &impl Serialize) -> Result<(), DataError> {
    serde_json::to_writer(&mut w, doc)?;
    writeln!(w)?;
    w.flush()?;
    Ok(())
}

fn write_polygons(polygons: &[Polygon], names: Option<Vec<String>>, output: Option<&Path>) {
    let doc = PolygonsOutput {
        names,
        polygons: polygons.iter().map(Polygon::vertices).collect(),
    };

    let result = match output {
        Some(path) => File::create(path)
            .map_err(DataError::from)
            .and_then(|f| write_json(BufWriter::new(f), &doc)),
        None => write_json(io::stdout().lock(), &doc),
    };

    result.unwrap_or_else(|e| {
        error!("Failed to write polygons: {e}");
        process::exit(1);
    });

    if let Some(path) = output {
        info!("Wrote {} polygon(s) to {}", polygons.len(), path.display());
    }
}

fn parse_radii(s: &str) -> Vec<f64> {
    let radii: Vec<f64> = s
        .split(',')
        .map(|p| {
            p.trim().parse::<f64>().unwrap_or_else(|_| {
                error!("Invalid radius: {p}");
                process::exit(1);
            })
        })
        .collect();
    if radii.is_empty() {
        error!("radii must be a comma-separated list (e.g. \"10,20,30\")");
        process::exit(1);
    }
    radii
}

/// Sexagesimal if the value has separators, decimal degrees otherwise.
fn parse_angle(s: &str, sexagesimal: fn(&str) -> Result<f64, DataError>) -> f64 {
    let result = if s.trim().contains([':', ' ']) {
        sexagesimal(s)
    } else {
        s.trim()
            .parse::<f64>()
            .map_err(|_| DataError::InvalidSexagesimal(s.to_string()))
    };
    result.unwrap_or_else(|e| {
        error!("{e}");
        process::exit(1);
    })
}

fn deprojection(gnomonic: bool) -> Deprojection {
    if gnomonic {
        Deprojection::Gnomonic
    } else {
        Deprojection::Reference
    }
}

fn cmd_union(log_path: &Path, select: Option<&str>, by: Option<&str>, output: Option<&Path>) {
    let log = ImageLog::load(log_path).unwrap_or_else(|e| {
        error!("Failed to load image log {}: {e}", log_path.display());
        process::exit(1);
    });
    info!("Loaded {} document(s) from {}", log.len(), log_path.display());

    let selector = match select {
        Some(s) => Selector::parse(s).unwrap_or_else(|e| {
            error!("{e}");
            process::exit(1);
        }),
        None => Selector::new(),
    };
    info!("{} document(s) match the selector", log.count(&selector));

    match log.mean_coordinate(&selector) {
        Ok(Lookup::Found(center)) => {
            info!("Mean position: RA {:.5}, Dec {:.5}", center.ra, center.dec);
        }
        Ok(Lookup::NotFound) => {}
        Err(e) => warn!("Could not compute mean position: {e}"),
    }

    if let Some(key) = by {
        let groups = log.combined_by_key(key, &selector).unwrap_or_else(|e| {
            error!("Failed to combine footprints: {e}");
            process::exit(1);
        });
        if groups.is_empty() {
            warn!("No footprints match the selector");
            process::exit(1);
        }
        let mut names = Vec::new();
        let mut polygons = Vec::new();
        for (value, group) in groups {
            let label = match value {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            };
            info!("{key} = {label}: {} piece(s)", group.len());
            names.extend(std::iter::repeat_n(label, group.len()));
            polygons.extend(group);
        }
        write_polygons(&polygons, Some(names), output);
        return;
    }

    match combined_footprint(&log, &selector) {
        Ok(Lookup::Found(polygons)) => {
            info!("Union has {} piece(s)", polygons.len());
            write_polygons(&polygons, None, output);
        }
        Ok(Lookup::NotFound) => {
            warn!("No footprints match the selector");
            process::exit(1);
        }
        Err(e) => {
            error!("Failed to combine footprints: {e}");
            process::exit(1);
        }
    }
}

fn cmd_ellipses(
    profile_path: &Path,
    radii: &[f64],
    config: &EllipseConfig,
    plane: &TangentPlane,
    output: Option<&Path>,
) {
    let file = File::open(profile_path).unwrap_or_else(|e| {
        error!("Failed to open profile {}: {e}", profile_path.display());
        process::exit(1);
    });
    let profile = read_profile_csv(file, config.distance_kpc).unwrap_or_else(|e| {
        error!("Failed to read profile {}: {e}", profile_path.display());
        process::exit(1);
    });
    info!("Loaded profile with {} sample(s)", profile.len());

    let polygons = isophote_polygons(&profile, radii, plane, config).unwrap_or_else(|e| {
        error!("Failed to build isophotes: {e}");
        process::exit(1);
    });
    write_polygons(&polygons, None, output);
}

fn cmd_prep_fields(output: &Path) {
    let catalog = narrowband_catalog(&TangentPlane::default());
    catalog.save(output).unwrap_or_else(|e| {
        error!("Failed to write field catalog {}: {e}", output.display());
        process::exit(1);
    });
    info!("Wrote {} field(s) to {}", catalog.len(), output.display());
}

fn cmd_fields(catalog_path: &Path, names: &[String], output: Option<&Path>) {
    let catalog = FieldCatalog::load(catalog_path).unwrap_or_else(|e| {
        error!("Failed to load field catalog {}: {e}", catalog_path.display());
        process::exit(1);
    });
    let selected = catalog.select(names).unwrap_or_else(|e| {
        error!("{e}");
        process::exit(1);
    });
    let (names, polygons): (Vec<String>, Vec<Polygon>) = selected.into_iter().unzip();
    write_polygons(&polygons, Some(names), output);
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Project { ra, dec, ra0, dec0 } => {
            let plane = TangentPlane::new(SkyCoord::new(*ra0, *dec0));
            let (xi, eta) = plane.to_tangent(*ra, *dec);
            println!("{xi:.10} {eta:.10}");
        }
        Commands::Deproject {
            xi,
            eta,
            ra0,
            dec0,
            gnomonic,
        } => {
            let plane = TangentPlane::new(SkyCoord::new(*ra0, *dec0))
                .with_deprojection(deprojection(*gnomonic));
            let (ra, dec) = plane.to_equatorial(*xi, *eta);
            println!("{ra:.10} {dec:.10}");
        }
        Commands::Union {
            log,
            select,
            by,
            output,
        } => {
            cmd_union(log, select.as_deref(), by.as_deref(), output.as_deref());
        }
        Commands::Ellipses {
            profile,
            radii,
            distance,
            n_verts,
            gnomonic,
            output,
        } => {
            let radii = parse_radii(radii);
            let config = EllipseConfig {
                distance_kpc: *distance,
                n_verts: *n_verts,
                ..EllipseConfig::default()
            };
            let plane = TangentPlane::default().with_deprojection(deprojection(*gnomonic));
            cmd_ellipses(profile, &radii, &config, &plane, output.as_deref());
        }
        Commands::PrepFields { output } => {
            if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent).unwrap_or_else(|e| {
                    error!("Failed to create {}: {e}", parent.display());
                    process::exit(1);
                });
            }
            cmd_prep_fields(output);
        }
        Commands::Fields {
            catalog,
            names,
            output,
        } => {
            cmd_fields(catalog, names, output.as_deref());
        }
        Commands::Box {
            ra,
            dec,
            width,
            height,
            output,
        } => {
            let center = SkyCoord::new(parse_angle(ra, parse_hms), parse_angle(dec, parse_dms));
            let polygon = box_footprint(center, *width, *height).unwrap_or_else(|e| {
                error!("Invalid box: {e}");
                process::exit(1);
            });
            write_polygons(&[polygon], None, output.as_deref());
        }
    }
}
