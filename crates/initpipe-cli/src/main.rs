mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "initpipe",
    about = "Checkpoint-gated project bootstrap: requirements, blueprint, scaffold",
    version,
    propagate_version = true
)]
struct Cli {
    /// Repository root (default: auto-detect from init/ or .git/)
    #[arg(long, global = true, env = "INITPIPE_ROOT")]
    root: Option<PathBuf>,

    /// Output format
    #[arg(long, global = true, value_enum, default_value_t = Format::Text)]
    format: Format,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the init state (no-op if it already exists)
    Start,

    /// Show the current stage and per-stage progress
    Status,

    /// Check whether the current stage is ready for approval
    Advance,

    /// Record explicit approval of the current stage
    Approve {
        /// Stage to approve: A, B or C
        #[arg(long)]
        stage: String,
        /// Free-form note stored with the approval
        #[arg(long)]
        note: Option<String>,
    },

    /// Update the Stage-A must-ask checklist
    MustAsk {
        #[arg(long)]
        key: String,
        #[arg(long)]
        asked: bool,
        #[arg(long)]
        answered: bool,
        /// Document the answer was written to
        #[arg(long)]
        written_to: Option<String>,
    },

    /// Check the Stage-A documents
    CheckDocs {
        #[arg(long)]
        docs_root: Option<PathBuf>,
        /// Treat warnings as failures
        #[arg(long)]
        strict: bool,
    },

    /// Validate the project blueprint
    Validate {
        #[arg(long)]
        blueprint: Option<PathBuf>,
        /// Treat warnings as failures
        #[arg(long)]
        strict: bool,
    },

    /// Show the normalized skill packs and mark them reviewed
    ReviewPacks {
        #[arg(long)]
        blueprint: Option<PathBuf>,
    },

    /// Recommend features from capabilities and db settings
    SuggestFeatures {
        #[arg(long)]
        blueprint: Option<PathBuf>,
        /// Add missing recommendations to the blueprint (never removes)
        #[arg(long)]
        write: bool,
    },

    /// Recommend skill packs
    SuggestPacks {
        #[arg(long)]
        blueprint: Option<PathBuf>,
        /// Add missing recommendations to the blueprint (never removes)
        #[arg(long)]
        write: bool,
    },

    /// Plan (or create) the base directory layout
    Scaffold {
        #[arg(long)]
        blueprint: Option<PathBuf>,
        /// Create the directories instead of printing the plan
        #[arg(long)]
        apply: bool,
    },

    /// Run the full Stage-C pipeline
    Apply {
        #[arg(long)]
        blueprint: Option<PathBuf>,
        /// Providers passed to wrapper sync (default from init/pipeline.yaml)
        #[arg(long)]
        providers: Option<String>,
        /// Overwrite existing feature files
        #[arg(long)]
        force_features: bool,
        /// Run each feature's control script (init + verify)
        #[arg(long)]
        verify_features: bool,
        /// Keep going when a feature fails
        #[arg(long)]
        non_blocking_features: bool,
        /// Strict-check the Stage-A documents first
        #[arg(long)]
        require_stage_a: bool,
        /// Print the plan without writing anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Archive and remove the init/ kit
    CleanupInit {
        /// Remove files instead of printing the plan
        #[arg(long)]
        apply: bool,
        /// Required acknowledgement
        #[arg(long = "i-understand")]
        i_understand: bool,
        /// Copy Stage-A docs and the blueprint to the archive dir first
        #[arg(long)]
        archive: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let root = root::resolve_root(cli.root.as_deref());
    let json = cli.format == Format::Json;
    tracing::debug!(root = %root.display(), "resolved root");

    let result = match cli.command {
        Commands::Start => cmd::stage::start(&root, json),
        Commands::Status => cmd::stage::status(&root, json),
        Commands::Advance => cmd::stage::advance(&root, json),
        Commands::Approve { stage, note } => {
            cmd::stage::approve(&root, &stage, note.as_deref(), json)
        }
        Commands::MustAsk {
            key,
            asked,
            answered,
            written_to,
        } => cmd::stage::must_ask(&root, &key, asked, answered, written_to, json),
        Commands::CheckDocs { docs_root, strict } => {
            cmd::docs::run(&root, docs_root.as_deref(), strict, json)
        }
        Commands::Validate { blueprint, strict } => {
            cmd::blueprint::validate(&root, blueprint.as_deref(), strict, json)
        }
        Commands::ReviewPacks { blueprint } => {
            cmd::blueprint::review_packs(&root, blueprint.as_deref(), json)
        }
        Commands::SuggestFeatures { blueprint, write } => {
            cmd::blueprint::suggest_features(&root, blueprint.as_deref(), write, json)
        }
        Commands::SuggestPacks { blueprint, write } => {
            cmd::blueprint::suggest_packs(&root, blueprint.as_deref(), write, json)
        }
        Commands::Scaffold { blueprint, apply } => {
            cmd::scaffold::run(&root, blueprint.as_deref(), apply, json)
        }
        Commands::Apply {
            blueprint,
            providers,
            force_features,
            verify_features,
            non_blocking_features,
            require_stage_a,
            dry_run,
        } => cmd::apply::run(
            &root,
            initpipe_core::pipeline::ApplyOptions {
                blueprint,
                providers,
                force_features,
                verify_features,
                non_blocking_features,
                require_stage_a,
                dry_run,
            },
            json,
        ),
        Commands::CleanupInit {
            apply,
            i_understand,
            archive,
        } => cmd::cleanup::run(
            &root,
            initpipe_core::cleanup::CleanupOptions {
                apply,
                acknowledged: i_understand,
                archive,
            },
            json,
        ),
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
