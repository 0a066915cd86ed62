#![forbid(unsafe_code)]

use std::error::Error;
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use dexpack_config::{BuildKind, ProjectDescriptor};
use dexpack_engine::{BuildVariant, Builder, ContentCacheIndex, JsonLinesSink, StderrSink};
use dexpack_tools::detect::{self, Tool};
use dexpack_tools::SigningKey;

type CliResult = Result<(), Box<dyn Error>>;

#[derive(Debug, Parser)]
#[command(name = "dexpack", about = "Build Android packages and jars from Java sources")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
enum MessageFormat {
    /// `error: File.java:3:9: message` lines on stderr
    #[default]
    Human,
    /// One JSON object per diagnostic on stdout
    Json,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create a new project
    Init {
        /// Project name (defaults to the current directory name)
        #[arg(long)]
        name: Option<String>,
        /// What the project builds: app, jar, or lib
        #[arg(long, default_value = "app", value_parser = parse_kind)]
        kind: BuildKind,
        /// Java package for the generated sources
        #[arg(long)]
        package: Option<String>,
    },
    /// Run the build pipeline
    Build {
        /// Sign with the release key from [signing] instead of the debug key
        #[arg(long)]
        release: bool,
        /// Show per-library cache results and tool details
        #[arg(long, short = 'v')]
        verbose: bool,
        /// How compiler diagnostics are reported
        #[arg(long, value_enum, default_value_t = MessageFormat::Human)]
        message_format: MessageFormat,
        /// Release keystore password
        #[arg(long, env = "DEXPACK_STORE_PASSWORD", hide_env_values = true)]
        store_password: Option<String>,
        /// Release key password (defaults to the keystore password)
        #[arg(long, env = "DEXPACK_KEY_PASSWORD", hide_env_values = true)]
        key_password: Option<String>,
    },
    /// Remove build outputs, keeping the converted-library cache
    Clean,
    /// Check that the external tools and SDK files can be found
    Doctor,
    /// Inspect the converted-library cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Debug, Subcommand)]
enum CacheAction {
    /// List cached library digests and artifacts
    List,
}

fn parse_kind(value: &str) -> Result<BuildKind, String> {
    value.parse().map_err(|e: dexpack_config::manifest::ManifestError| e.to_string())
}

fn main() {
    init_tracing();
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Init {
            name,
            kind,
            package,
        } => cmd_init(name, kind, package.as_deref()),
        Command::Build {
            release,
            verbose,
            message_format,
            store_password,
            key_password,
        } => cmd_build(release, verbose, message_format, store_password, key_password),
        Command::Clean => cmd_clean(),
        Command::Doctor => cmd_doctor(),
        Command::Cache { action } => cmd_cache(&action),
    };

    if let Err(msg) = result {
        eprintln!("error: {msg}");
        process::exit(1);
    }
}

/// Log filter comes from `DEXPACK_LOG` (e.g. `DEXPACK_LOG=dexpack_engine=debug`).
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_env("DEXPACK_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// The project containing the current directory.
fn current_project() -> Result<ProjectDescriptor, Box<dyn Error>> {
    let cwd = std::env::current_dir()?;
    Ok(ProjectDescriptor::discover(&cwd)?)
}

fn cmd_init(name: Option<String>, kind: BuildKind, package: Option<&str>) -> CliResult {
    let cwd = std::env::current_dir()?;

    let project_name = name.unwrap_or_else(|| {
        cwd.file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("my-project")
            .to_owned()
    });
    let project_dir = cwd.join(&project_name);

    let project = dexpack_engine::init_project(&project_name, &project_dir, kind, package)?;

    eprintln!(
        "     Created {kind} `{project_name}` at {}",
        project.project_dir().display()
    );
    eprintln!();
    eprintln!("  To get started:");
    eprintln!("    cd {project_name}");
    eprintln!("    dexpack build");
    Ok(())
}

/// The release key from `[signing]` plus the supplied passwords. `None` when
/// anything is missing; the builder then reports which configuration is absent.
fn release_key(
    project: &ProjectDescriptor,
    store_password: Option<String>,
    key_password: Option<String>,
) -> Result<Option<SigningKey>, Box<dyn Error>> {
    let (Some(signing), Some(store_password)) = (project.signing(), store_password) else {
        return Ok(None);
    };
    let keystore = dexpack_util::fs::expand_home(&signing.keystore)?;
    let keystore = if keystore.is_absolute() {
        keystore
    } else {
        project.project_dir().join(keystore)
    };
    Ok(Some(SigningKey {
        keystore,
        alias: signing.alias.clone(),
        key_password: key_password.unwrap_or_else(|| store_password.clone()),
        store_password,
    }))
}

fn cmd_build(
    release: bool,
    verbose: bool,
    message_format: MessageFormat,
    store_password: Option<String>,
    key_password: Option<String>,
) -> CliResult {
    let project = current_project()?;
    let variant = if release {
        BuildVariant::Release
    } else {
        BuildVariant::Debug
    };

    let key = if release {
        release_key(&project, store_password, key_password)?
    } else {
        None
    };
    let mut builder = Builder::for_project(project).verbose(verbose);
    if let Some(key) = key {
        builder = builder.with_release_key(key);
    }
    builder = match message_format {
        MessageFormat::Human => builder.with_sink(StderrSink),
        MessageFormat::Json => builder.with_sink(JsonLinesSink::new(std::io::stdout())),
    };

    let result = builder.build(variant)?;

    if message_format == MessageFormat::Human {
        println!("{}", result.output_path.display());
    }
    if let Some(report) = result.convert {
        tracing::info!(
            hits = report.hits,
            converted = report.converted,
            "library cache"
        );
    }
    Ok(())
}

fn cmd_clean() -> CliResult {
    let project = current_project()?;
    let removed = dexpack_engine::clean_build_dir(&project)?;
    eprintln!(
        "     Cleaned {removed} build output(s) for `{}` (library cache kept)",
        project.name()
    );
    Ok(())
}

fn configured_tool(project: Option<&ProjectDescriptor>, tool: Tool) -> Option<&Path> {
    let tools = project?.tools();
    match tool {
        Tool::Javac => tools.javac.as_deref(),
        Tool::D8 => tools.d8.as_deref(),
        Tool::Aapt => tools.aapt.as_deref(),
        Tool::ApkSigner => tools.apksigner.as_deref(),
    }
}

fn cmd_doctor() -> CliResult {
    eprintln!("Checking environment...");
    eprintln!();

    let mut issues = 0u32;

    let cwd = std::env::current_dir()?;
    let project = match ProjectDescriptor::discover(&cwd) {
        Ok(project) => {
            eprintln!(
                "  [ok] Project: {} ({}) at {}",
                project.name(),
                project.kind(),
                project.project_dir().display()
            );
            Some(project)
        }
        Err(dexpack_config::project::ProjectError::NoManifest { .. }) => {
            eprintln!("  [--] No dexpack.toml in this directory or its parents");
            None
        }
        Err(e) => {
            eprintln!("  [!!] dexpack.toml: {e}");
            issues = issues.saturating_add(1);
            None
        }
    };

    for tool in Tool::ALL {
        match detect::detect(tool, configured_tool(project.as_ref(), tool)) {
            Ok(info) => {
                let version = info.version.unwrap_or_else(|| "unknown version".to_owned());
                eprintln!(
                    "  [ok] {}: {version} ({})",
                    tool.name(),
                    info.path.display()
                );
            }
            Err(e) => {
                eprintln!("  [!!] {}: {e}", tool.name());
                issues = issues.saturating_add(1);
            }
        }
    }

    let tools = project.as_ref().map(ProjectDescriptor::tools);
    match detect::resolve_android_jar(tools.and_then(|t| t.android_jar.as_deref())) {
        Ok(path) => eprintln!("  [ok] android.jar: {}", path.display()),
        Err(e) => {
            eprintln!("  [!!] android.jar: {e}");
            issues = issues.saturating_add(1);
        }
    }
    match detect::debug_keystore(tools.and_then(|t| t.debug_keystore.as_deref())) {
        Ok(path) if path.is_file() => eprintln!("  [ok] Debug keystore: {}", path.display()),
        Ok(path) => {
            eprintln!(
                "  [!!] Debug keystore: {} does not exist - create it with keytool",
                path.display()
            );
            issues = issues.saturating_add(1);
        }
        Err(e) => {
            eprintln!("  [!!] Debug keystore: {e}");
            issues = issues.saturating_add(1);
        }
    }

    eprintln!();
    if issues > 0 {
        eprintln!("{issues} issue(s) found - fix them before building");
        Err(format!("{issues} issue(s) found").into())
    } else {
        eprintln!("All checks passed");
        Ok(())
    }
}

fn cmd_cache(action: &CacheAction) -> CliResult {
    match action {
        CacheAction::List => {
            let project = current_project()?;
            let cache = ContentCacheIndex::open(&project.dexed_libs_dir())?;
            if cache.is_empty() {
                eprintln!("No cached libraries in {}", cache.dir().display());
                return Ok(());
            }
            for (key, path) in cache.entries() {
                println!(
                    "{:<14} {}  {}",
                    key.scope,
                    key.digest,
                    display_relative(&path, project.project_dir())
                );
            }
            Ok(())
        }
    }
}

fn display_relative(path: &Path, base: &Path) -> String {
    path.strip_prefix(base)
        .map_or_else(|_| path.to_path_buf(), PathBuf::from)
        .display()
        .to_string()
}
