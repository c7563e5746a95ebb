use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "arbor",
    about = "Arbor: content-addressed trees with a copy-on-write filesystem",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Repository directory
    #[arg(short = 'C', long, global = true, default_value = ".arbor")]
    pub repo: PathBuf,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create a new repository
    Init,
    /// List a directory
    Ls(LsArgs),
    /// Print a file
    Cat(PathArgs),
    /// Show metadata for a path
    Stat(PathArgs),
    /// Write a file and commit
    Write(WriteArgs),
    /// Create a directory and commit
    Mkdir(MkdirArgs),
    /// Remove a path and commit
    Rm(RmArgs),
    /// Move a path and commit
    Mv(MvArgs),
    /// Commit the contents of a directory on disk
    Import(ImportArgs),
    /// Show a commit
    Show(ShowArgs),
    /// Resolve a reference to an object ID
    Resolve(ResolveArgs),
    /// List references
    Refs(RefsArgs),
}

#[derive(Args)]
pub struct RevArgs {
    /// Branch, reference, or commit/tree hash to read from
    #[arg(short, long, default_value = "HEAD")]
    pub rev: String,
}

#[derive(Args)]
pub struct LsArgs {
    #[arg(default_value = "/")]
    pub path: String,
    #[command(flatten)]
    pub rev: RevArgs,
}

#[derive(Args)]
pub struct PathArgs {
    pub path: String,
    #[command(flatten)]
    pub rev: RevArgs,
}

#[derive(Args)]
pub struct MessageArgs {
    #[arg(short, long)]
    pub message: Option<String>,
}

#[derive(Args)]
pub struct WriteArgs {
    pub path: String,
    /// Literal content; read from --from or stdin when omitted
    pub content: Option<String>,
    /// Read content from this file
    #[arg(long, conflicts_with = "content")]
    pub from: Option<PathBuf>,
    /// Mark the file executable
    #[arg(long)]
    pub exec: bool,
    /// Fail if the path already exists
    #[arg(long)]
    pub create: bool,
    #[command(flatten)]
    pub message: MessageArgs,
}

#[derive(Args)]
pub struct MkdirArgs {
    pub path: String,
    /// Create missing parents
    #[arg(short, long)]
    pub parents: bool,
    #[command(flatten)]
    pub message: MessageArgs,
}

#[derive(Args)]
pub struct RmArgs {
    pub path: String,
    #[arg(short, long)]
    pub recursive: bool,
    #[command(flatten)]
    pub message: MessageArgs,
}

#[derive(Args)]
pub struct MvArgs {
    pub from: String,
    pub to: String,
    #[command(flatten)]
    pub message: MessageArgs,
}

#[derive(Args)]
pub struct ImportArgs {
    pub dir: PathBuf,
    /// Include hidden files
    #[arg(long)]
    pub hidden: bool,
    /// Do not honor ignore files
    #[arg(long)]
    pub no_ignore: bool,
    #[command(flatten)]
    pub message: MessageArgs,
}

#[derive(Args)]
pub struct ShowArgs {
    #[arg(default_value = "HEAD")]
    pub rev: String,
}

#[derive(Args)]
pub struct ResolveArgs {
    pub name: String,
}

#[derive(Args)]
pub struct RefsArgs {
    #[arg(default_value = "refs/")]
    pub prefix: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_init() {
        let cli = Cli::try_parse_from(["arbor", "init"]).unwrap();
        assert!(matches!(cli.command, Command::Init));
        assert_eq!(cli.repo, PathBuf::from(".arbor"));
    }

    #[test]
    fn parse_repo_flag() {
        let cli = Cli::try_parse_from(["arbor", "ls", "-C", "/tmp/r"]).unwrap();
        assert_eq!(cli.repo, PathBuf::from("/tmp/r"));
        if let Command::Ls(args) = cli.command {
            assert_eq!(args.path, "/");
            assert_eq!(args.rev.rev, "HEAD");
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_cat_at_rev() {
        let cli = Cli::try_parse_from(["arbor", "cat", "src/lib.rs", "--rev", "main"]).unwrap();
        if let Command::Cat(args) = cli.command {
            assert_eq!(args.path, "src/lib.rs");
            assert_eq!(args.rev.rev, "main");
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_write() {
        let cli = Cli::try_parse_from(["arbor", "write", "a.txt", "hello", "--exec", "-m", "add"])
            .unwrap();
        if let Command::Write(args) = cli.command {
            assert_eq!(args.content.as_deref(), Some("hello"));
            assert!(args.exec);
            assert!(!args.create);
            assert_eq!(args.message.message.as_deref(), Some("add"));
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn write_content_conflicts_with_from() {
        assert!(Cli::try_parse_from(["arbor", "write", "a", "x", "--from", "f"]).is_err());
    }

    #[test]
    fn parse_rm_recursive() {
        let cli = Cli::try_parse_from(["arbor", "rm", "-r", "dir"]).unwrap();
        if let Command::Rm(args) = cli.command {
            assert!(args.recursive);
            assert_eq!(args.path, "dir");
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_mv() {
        let cli = Cli::try_parse_from(["arbor", "mv", "a", "b"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Mv(MvArgs { ref from, ref to, .. }) if from == "a" && to == "b"
        ));
    }

    #[test]
    fn parse_import() {
        let cli =
            Cli::try_parse_from(["arbor", "import", "./src", "--hidden", "--no-ignore"]).unwrap();
        if let Command::Import(args) = cli.command {
            assert_eq!(args.dir, PathBuf::from("./src"));
            assert!(args.hidden);
            assert!(args.no_ignore);
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_refs_default_prefix() {
        let cli = Cli::try_parse_from(["arbor", "refs"]).unwrap();
        if let Command::Refs(args) = cli.command {
            assert_eq!(args.prefix, "refs/");
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_verbose() {
        let cli = Cli::try_parse_from(["arbor", "--verbose", "init"]).unwrap();
        assert!(cli.verbose);
    }

    #[test]
    fn parse_json_format() {
        let cli = Cli::try_parse_from(["arbor", "--format", "json", "show"]).unwrap();
        assert_eq!(cli.format, OutputFormat::Json);
    }
}
