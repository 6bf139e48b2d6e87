// Copyright 2025 Veil (https://github.com/veil-privacy/veil)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Veil CLI
//!
//! Thin command-line boundary around the anonymization engine: reads
//! delimited files, assembles the dataset and configuration, runs the
//! search, writes the generalized output. Invalid combinations fail
//! fast with a descriptive message before the engine is invoked.

mod io;

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, Level};
use veil_core::{
    AnonymizationConfig, AttributeRole, Dataset, LDiversityVariant, Metric, PrivacyCriterion,
    TClosenessVariant,
};
use veil_search::Anonymizer;

#[derive(Parser)]
#[command(name = "veil")]
#[command(about = "Veil - privacy-preserving data transformation", long_about = None)]
struct Cli {
    /// Verbose mode
    #[arg(short, long)]
    verbose: bool,

    /// Output statistics as JSON (machine-readable)
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Anonymize a dataset
    Anonymize {
        /// Input CSV path
        #[arg(long)]
        input: PathBuf,

        /// Output CSV path
        #[arg(long)]
        output: Option<PathBuf>,

        /// Field separator
        #[arg(long, default_value = ";")]
        separator: char,

        /// Attribute declaration: name:role[:hierarchy.csv]
        /// (role: qi | sensitive | insensitive | identifying).
        /// Undeclared columns default to insensitive.
        #[arg(long = "attribute")]
        attributes: Vec<String>,

        /// Privacy criterion, e.g. k=3, distinct-l=3, entropy-l=2.5,
        /// recursive-l=3:c=4, t-equal=0.2, t-hierarchical=0.3,
        /// d=0.05:0.7
        #[arg(long)]
        criterion: String,

        /// Maximum fraction of rows that may be suppressed
        #[arg(long, default_value = "0.0")]
        suppression: f64,

        /// Information-loss metric: height, precision, aecs,
        /// discernability, discernability-star, entropy,
        /// normalized-entropy
        #[arg(long, default_value = "height")]
        metric: String,

        /// Research subset file for d-presence (one row index per line)
        #[arg(long)]
        subset: Option<PathBuf>,

        /// Assume practical monotonicity of the criterion
        #[arg(long)]
        practical_monotonicity: bool,
    },

    /// Inspect a dataset and report lattice dimensions
    Inspect {
        /// Input CSV path
        #[arg(long)]
        input: PathBuf,

        /// Field separator
        #[arg(long, default_value = ";")]
        separator: char,

        /// Attribute declaration: name:role[:hierarchy.csv]
        #[arg(long = "attribute")]
        attributes: Vec<String>,
    },
}

/// One parsed attribute declaration.
struct AttributeSpec {
    name: String,
    role: AttributeRole,
    hierarchy: Option<PathBuf>,
}

fn parse_attribute(spec: &str) -> Result<AttributeSpec> {
    let mut parts = spec.splitn(3, ':');
    let name = parts
        .next()
        .filter(|s| !s.is_empty())
        .with_context(|| format!("attribute '{}' has no name", spec))?;
    let role = parts
        .next()
        .with_context(|| format!("attribute '{}' has no role", spec))?;
    let role = AttributeRole::parse(role)
        .with_context(|| format!("unknown attribute role '{}' in '{}'", role, spec))?;
    let hierarchy = parts.next().map(PathBuf::from);
    if role == AttributeRole::QuasiIdentifying && hierarchy.is_none() {
        bail!(
            "quasi-identifying attribute '{}' needs a hierarchy file: {}:qi:hierarchy.csv",
            name,
            name
        );
    }
    Ok(AttributeSpec {
        name: name.to_string(),
        role,
        hierarchy,
    })
}

fn parse_criterion(spec: &str) -> Result<PrivacyCriterion> {
    let (kind, params) = spec
        .split_once('=')
        .with_context(|| format!("criterion '{}' has no parameters", spec))?;
    let criterion = match kind {
        "k" => PrivacyCriterion::KAnonymity {
            k: params.parse().context("k must be an integer")?,
        },
        "distinct-l" => PrivacyCriterion::LDiversity {
            l: params.parse().context("l must be numeric")?,
            variant: LDiversityVariant::Distinct,
        },
        "entropy-l" => PrivacyCriterion::LDiversity {
            l: params.parse().context("l must be numeric")?,
            variant: LDiversityVariant::Entropy,
        },
        "recursive-l" => {
            let (l, c) = params
                .split_once(":c=")
                .with_context(|| format!("recursive-l needs c, e.g. recursive-l=3:c=4: {}", spec))?;
            PrivacyCriterion::LDiversity {
                l: l.parse().context("l must be numeric")?,
                variant: LDiversityVariant::Recursive {
                    c: c.parse().context("c must be numeric")?,
                },
            }
        }
        "t-equal" => PrivacyCriterion::TCloseness {
            t: params.parse().context("t must be numeric")?,
            variant: TClosenessVariant::EqualDistance,
        },
        "t-hierarchical" => PrivacyCriterion::TCloseness {
            t: params.parse().context("t must be numeric")?,
            variant: TClosenessVariant::HierarchicalDistance,
        },
        "d" => {
            let (min, max) = params
                .split_once(':')
                .with_context(|| format!("d-presence needs two bounds, e.g. d=0.05:0.7: {}", spec))?;
            PrivacyCriterion::DPresence {
                d_min: min.parse().context("d_min must be numeric")?,
                d_max: max.parse().context("d_max must be numeric")?,
            }
        }
        other => bail!("unknown criterion '{}'", other),
    };
    criterion.validate()?;
    Ok(criterion)
}

fn build_dataset(
    input: &PathBuf,
    separator: char,
    attribute_specs: &[String],
) -> Result<Dataset> {
    let (header, rows) = io::read_csv(input, separator)?;

    let specs: Vec<AttributeSpec> = attribute_specs
        .iter()
        .map(|s| parse_attribute(s))
        .collect::<Result<_>>()?;
    for spec in &specs {
        if !header.iter().any(|h| *h == spec.name) {
            bail!(
                "attribute '{}' does not appear in the input header {:?}",
                spec.name,
                header
            );
        }
    }

    let mut builder = Dataset::builder();
    for column in &header {
        match specs.iter().find(|s| s.name == *column) {
            Some(spec) => match &spec.hierarchy {
                Some(path) => {
                    let material = io::read_hierarchy(path, separator)?;
                    builder = builder.attribute_with_hierarchy(column, spec.role, material);
                }
                None => builder = builder.attribute(column, spec.role),
            },
            // Undeclared columns are carried through unchanged.
            None => builder = builder.attribute(column, AttributeRole::Insensitive),
        }
    }
    builder.rows(rows).build().context("encoding the dataset")
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    match cli.command {
        Commands::Anonymize {
            input,
            output,
            separator,
            attributes,
            criterion,
            suppression,
            metric,
            subset,
            practical_monotonicity,
        } => {
            let dataset = build_dataset(&input, separator, &attributes)?;

            let metric = Metric::parse(&metric)
                .with_context(|| format!("unknown metric '{}'", metric))?;
            let criterion = parse_criterion(&criterion)?;
            let research_subset = subset.as_deref().map(io::read_subset).transpose()?;

            let config = AnonymizationConfig {
                criteria: vec![criterion],
                metric,
                max_outlier_fraction: suppression,
                practical_monotonicity,
                research_subset,
                ..Default::default()
            };

            let result = Anonymizer::new(&dataset, &config).run()?;

            match &result.optimum {
                Some(optimum) => {
                    info!(
                        transformation = ?optimum.transformation,
                        loss = optimum.information_loss,
                        "optimum found"
                    );
                    if let Some(path) = &output {
                        let rows = result
                            .materialize(&dataset)
                            .expect("optimum implies materializable output");
                        let header: Vec<String> = dataset
                            .attributes()
                            .iter()
                            .map(|a| a.name.clone())
                            .collect();
                        io::write_csv(path, separator, &header, &rows)?;
                        println!("✓ Wrote {} rows to {}", rows.len(), path.display());
                    }
                }
                None => bail!("no transformation satisfies the criterion"),
            }

            if cli.json {
                println!(
                    "{}",
                    serde_json::json!({
                        "optimum": result.optimum,
                        "statistics": result.statistics,
                    })
                );
            } else {
                let stats = &result.statistics;
                let optimum = result.optimum.as_ref().expect("bailed above otherwise");
                println!("Transformation: {:?}", optimum.transformation);
                println!("Information loss: {}", optimum.information_loss);
                if let Some(classification) = &result.classification {
                    println!(
                        "Classes: {}, suppressed rows: {}",
                        classification.class_count,
                        classification.suppressed.count_ones()
                    );
                }
                println!(
                    "Checked {} of {} transformations ({} tagged) in {} ms",
                    stats.transformations_checked,
                    stats.transformations_total,
                    stats.transformations_tagged,
                    stats.duration_ms
                );
                println!(
                    "Snapshot roll-ups: {}, full scans: {}",
                    stats.snapshot_rollups, stats.full_scans
                );
            }
        }

        Commands::Inspect {
            input,
            separator,
            attributes,
        } => {
            let dataset = build_dataset(&input, separator, &attributes)?;
            let mut lattice_size: u128 = 1;
            println!("Rows: {}", dataset.rows());
            for (i, attribute) in dataset.attributes().iter().enumerate() {
                let distinct = dataset.dictionary(i).len();
                match dataset.hierarchy(i) {
                    Some(h) => {
                        lattice_size *= h.height() as u128;
                        println!(
                            "  {} ({:?}): {} values, hierarchy height {}",
                            attribute.name, attribute.role, distinct, h.height()
                        );
                    }
                    None => println!(
                        "  {} ({:?}): {} values",
                        attribute.name, attribute.role, distinct
                    ),
                }
            }
            println!("Lattice size: {} transformations", lattice_size);
        }
    }

    Ok(())
}
