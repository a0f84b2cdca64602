//! Contract extraction CLI.
//!
//! Provides the `contractor` binary. A unit is read from a JSON file (the
//! serde form of [`contractor_core::Unit`]) and every method and type is
//! run through the extractor:
//!
//! - `extract` prints a JSON report of contracts, residual bodies and
//!   diagnostics;
//! - `roundtrip` injects each extracted contract back into its residual body,
//!   re-extracts, and reports methods whose contracts do not survive.
//!
//! The extractor configuration comes from `--config` or, failing that, from
//! the file named by the `CONTRACTOR_CONFIG` environment variable.

use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use serde::Serialize;

use contractor_core::{MethodId, TypeId, Unit};
use contractor_extract::{
    ContractExtractor, ContractInjector, ContractProvider, ExtractionDiagnostic, ExtractorConfig,
    Member, MethodContract, TypeContract,
};

/// Environment variable naming a default configuration file.
const CONFIG_ENV: &str = "CONTRACTOR_CONFIG";

/// Contract extraction tools.
#[derive(Parser)]
#[command(name = "contractor", about = "Contract extraction tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Extract method and type contracts from a unit.
    Extract {
        /// Path to the unit JSON file.
        #[arg(short, long)]
        unit: PathBuf,

        /// Path to an extractor configuration JSON file.
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Only report this method (`Namespace.Type::Method`).
        #[arg(short, long)]
        method: Option<String>,

        /// Report effective (inherited) contracts instead of own contracts.
        #[arg(long)]
        effective: bool,

        /// Include residual bodies in the report.
        #[arg(long)]
        residual: bool,
    },

    /// Inject every contract back and check that re-extraction agrees.
    Roundtrip {
        /// Path to the unit JSON file.
        #[arg(short, long)]
        unit: PathBuf,

        /// Path to an extractor configuration JSON file.
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn main() {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let exit_code = match cli.command {
        Commands::Extract {
            unit,
            config,
            method,
            effective,
            residual,
        } => run_extract(&unit, config.as_deref(), method.as_deref(), effective, residual),
        Commands::Roundtrip { unit, config } => run_roundtrip(&unit, config.as_deref()),
    };
    process::exit(exit_code);
}

/// A failure that ends the run.
#[derive(Debug, thiserror::Error)]
enum CliError {
    /// The input could not be interpreted (bad JSON, unknown method,
    /// cyclic hierarchy).
    #[error("invalid input: {0}")]
    Invalid(String),
    /// A file could not be read.
    #[error("I/O error: {0}")]
    Io(String),
}

impl CliError {
    fn exit_code(&self) -> i32 {
        match self {
            CliError::Invalid(_) => 2,
            CliError::Io(_) => 3,
        }
    }
}

fn read_file(path: &Path) -> Result<String, CliError> {
    std::fs::read_to_string(path)
        .map_err(|e| CliError::Io(format!("failed to read '{}': {}", path.display(), e)))
}

fn load_unit(path: &Path) -> Result<Unit, CliError> {
    let text = read_file(path)?;
    serde_json::from_str(&text)
        .map_err(|e| CliError::Invalid(format!("'{}' is not a unit: {}", path.display(), e)))
}

/// Loads the configuration from `path`, from `CONTRACTOR_CONFIG`, or the
/// defaults, in that order.
fn load_config(path: Option<&Path>) -> Result<ExtractorConfig, CliError> {
    let from_env = std::env::var_os(CONFIG_ENV).map(PathBuf::from);
    let Some(path) = path.map(Path::to_path_buf).or(from_env) else {
        return Ok(ExtractorConfig::default());
    };
    let text = read_file(&path)?;
    serde_json::from_str(&text)
        .map_err(|e| CliError::Invalid(format!("bad configuration '{}': {}", path.display(), e)))
}

// ---------------------------------------------------------------------------
// extract
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ExtractReport {
    unit: String,
    methods: Vec<MethodReport>,
    types: Vec<TypeReport>,
    failures: Vec<FailureReport>,
    diagnostics: Vec<ExtractionDiagnostic>,
}

#[derive(Debug, Serialize)]
struct MethodReport {
    id: MethodId,
    name: String,
    contract: Option<MethodContract>,
    #[serde(skip_serializing_if = "Option::is_none")]
    residual: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    diagnostics: Vec<ExtractionDiagnostic>,
}

#[derive(Debug, Serialize)]
struct TypeReport {
    id: TypeId,
    name: String,
    contract: TypeContract,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    diagnostics: Vec<ExtractionDiagnostic>,
}

#[derive(Debug, Serialize)]
struct FailureReport {
    member: Member,
    error: String,
}

/// Execute the extract subcommand.
///
/// Returns exit code: 0 = success, 1 = some members failed,
/// 2 = invalid input, 3 = I/O error.
fn run_extract(
    unit_path: &Path,
    config_path: Option<&Path>,
    method: Option<&str>,
    effective: bool,
    residual: bool,
) -> i32 {
    let result = load_unit(unit_path).and_then(|unit| {
        let config = load_config(config_path)?;
        extract_report(&unit, config, method, effective, residual)
    });
    match result {
        Ok(report) => {
            print_json(&report);
            if report.failures.is_empty() {
                0
            } else {
                eprintln!("{} member(s) failed", report.failures.len());
                1
            }
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            e.exit_code()
        }
    }
}

fn extract_report(
    unit: &Unit,
    config: ExtractorConfig,
    method: Option<&str>,
    effective: bool,
    residual: bool,
) -> Result<ExtractReport, CliError> {
    let extractor = ContractExtractor::new(unit, config);
    let batch = extractor.extract_unit();
    let provider = if effective {
        Some(ContractProvider::new(extractor).map_err(|e| CliError::Invalid(e.to_string()))?)
    } else {
        None
    };

    if let Some(name) = method {
        if !batch
            .methods
            .iter()
            .any(|m| unit.method_display_name(m.method) == name)
        {
            return Err(CliError::Invalid(format!("no method named '{}'", name)));
        }
    }

    let mut failures: Vec<FailureReport> = batch
        .failures
        .iter()
        .map(|f| FailureReport {
            member: f.member,
            error: f.error.to_string(),
        })
        .collect();

    let mut methods = Vec::new();
    for extraction in batch.methods {
        let name = unit.method_display_name(extraction.method);
        if method.is_some_and(|wanted| wanted != name) {
            continue;
        }
        let contract = match &provider {
            Some(provider) => match provider.effective_contract(extraction.method) {
                Ok(contract) => contract,
                Err(e) => {
                    failures.push(FailureReport {
                        member: Member::Method(extraction.method),
                        error: e.to_string(),
                    });
                    continue;
                }
            },
            None => extraction.contract,
        };
        methods.push(MethodReport {
            id: extraction.method,
            name,
            contract,
            residual: if residual {
                extraction.residual.map(|b| b.to_string())
            } else {
                None
            },
            diagnostics: extraction.diagnostics,
        });
    }

    let types = if method.is_some() {
        Vec::new()
    } else {
        batch
            .types
            .into_iter()
            .filter(|t| !t.contract.is_empty() || !t.diagnostics.is_empty())
            .map(|t| TypeReport {
                id: t.ty,
                name: unit
                    .type_def(t.ty)
                    .map(|d| d.full_name())
                    .unwrap_or_else(|| t.ty.to_string()),
                contract: t.contract,
                diagnostics: t.diagnostics,
            })
            .collect()
    };

    Ok(ExtractReport {
        unit: unit.name.clone(),
        methods,
        types,
        failures,
        diagnostics: batch.diagnostics,
    })
}

// ---------------------------------------------------------------------------
// roundtrip
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct RoundtripReport {
    checked: usize,
    mismatches: Vec<Mismatch>,
}

#[derive(Debug, Serialize)]
struct Mismatch {
    name: String,
    reason: String,
}

/// Execute the roundtrip subcommand.
///
/// Returns exit code: 0 = every contract survived, 1 = mismatches,
/// 2 = invalid input, 3 = I/O error.
fn run_roundtrip(unit_path: &Path, config_path: Option<&Path>) -> i32 {
    let result = load_unit(unit_path).and_then(|unit| {
        let config = load_config(config_path)?;
        Ok(roundtrip_report(&unit, config))
    });
    match result {
        Ok(report) => {
            print_json(&report);
            if report.mismatches.is_empty() {
                0
            } else {
                1
            }
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            e.exit_code()
        }
    }
}

fn roundtrip_report(unit: &Unit, config: ExtractorConfig) -> RoundtripReport {
    let extractor = ContractExtractor::new(unit, config.clone());
    let injector = ContractInjector::new(unit, extractor.registry());
    let mut mismatches = Vec::new();
    let mut rebuilt_unit = unit.clone();
    let mut expected = Vec::new();

    for extraction in extractor.extract_unit().methods {
        let (Some(contract), Some(residual)) = (&extraction.contract, &extraction.residual) else {
            continue;
        };
        let name = unit.method_display_name(extraction.method);
        let Some(method) = unit.method(extraction.method) else {
            continue;
        };
        match injector.inject(method, residual, contract) {
            Ok(body) => {
                if let Some(target) = rebuilt_unit.method_mut(extraction.method) {
                    target.body = Some(body);
                }
                expected.push((name, extraction));
            }
            Err(e) => mismatches.push(Mismatch {
                name,
                reason: format!("injection failed: {}", e),
            }),
        }
    }

    let checked = expected.len();
    let again = ContractExtractor::new(&rebuilt_unit, config);
    for (name, first) in expected {
        let reason = match again.extract_method(first.method) {
            Ok(second) => {
                let count = |c: &Option<MethodContract>| c.as_ref().map_or(0, |c| c.clause_count());
                if count(&second.contract) != count(&first.contract) {
                    Some(format!(
                        "clause count {} became {}",
                        count(&first.contract),
                        count(&second.contract)
                    ))
                } else if second.contract != first.contract {
                    Some("conditions differ".to_string())
                } else if second.residual != first.residual {
                    Some("residual body differs".to_string())
                } else {
                    None
                }
            }
            Err(e) => Some(format!("re-extraction failed: {}", e)),
        };
        if let Some(reason) = reason {
            tracing::warn!(method = %name, %reason, "round trip mismatch");
            mismatches.push(Mismatch { name, reason });
        }
    }

    tracing::info!(checked, mismatches = mismatches.len(), "round trip complete");
    RoundtripReport {
        checked,
        mismatches,
    }
}

fn print_json<T: Serialize>(value: &T) {
    let json = serde_json::to_string_pretty(value)
        .unwrap_or_else(|e| format!("{{\"error\": \"failed to serialize report: {}\"}}", e));
    println!("{}", json);
}
