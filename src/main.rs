use arbor::Result;
use arbor::commands::{create, list, merge};
use clap::{Parser, Subcommand, ValueHint};

#[derive(Parser)]
#[command(name = "arbor")]
#[command(about = "Work on many branches of one repository at once via git worktrees")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a worktree for each branch
    Create {
        /// Branch names to create worktrees for
        #[arg(value_hint = ValueHint::Other)]
        branches: Vec<String>,
        /// Run the package manager's install step in each new worktree
        #[arg(long)]
        install_deps: bool,
        /// Skip copying environment files into the new worktrees
        #[arg(long)]
        no_env: bool,
        /// Suppress per-file copy output
        #[arg(long)]
        quiet: bool,
    },
    /// List worktrees with their status, then offer interactive cleanup
    List {
        /// Skip the per-worktree status classification
        #[arg(long)]
        no_status: bool,
        /// Print raw worktree records after the listing
        #[arg(long)]
        debug: bool,
    },
    /// Merge a worktree's branch back into the default branch
    Merge {
        /// Branch whose worktree should be merged
        #[arg(value_hint = ValueHint::Other)]
        branch: Option<String>,
        /// Remove every managed worktree and its branch after a successful merge
        #[arg(long)]
        cleanup_all: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Create {
            branches,
            install_deps,
            no_env,
            quiet,
        } => {
            let options = create::CreateOptions {
                install_deps,
                copy_env: !no_env,
                quiet,
            };
            create::create_worktrees(&branches, &options)?;
        }
        Commands::List { no_status, debug } => {
            let options = list::ListOptions {
                show_status: !no_status,
                debug,
            };
            list::list_worktrees(&options)?;
        }
        Commands::Merge {
            branch,
            cleanup_all,
        } => {
            merge::merge_worktree(branch.as_deref(), cleanup_all)?;
        }
    }

    Ok(())
}
