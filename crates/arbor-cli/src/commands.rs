use std::io::{self, Read, Write};
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context};
use arbor_index::{import_directory, ImportOptions};
use arbor_store::{EntryMode, ObjectStore, ObjectStoreExt};
use arbor_vfs::{
    CommitOutcome, CopyOnWriteOverlay, FileSystem, ReadOnlyView, Repository, TracingObserver,
};
use colored::Colorize;
use serde_json::json;
use tracing::debug;

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let command = match cli.command {
        Command::Init => return cmd_init(&cli.repo),
        other => other,
    };
    let repo = Repository::open(&cli.repo)
        .with_context(|| format!("no repository at {}", cli.repo.display()))?
        .with_observer(Arc::new(TracingObserver));
    debug!(repo = %cli.repo.display(), "repository opened");
    let format = cli.format;
    match command {
        Command::Init => Ok(()),
        Command::Ls(args) => cmd_ls(&repo, args, format),
        Command::Cat(args) => cmd_cat(&repo, args),
        Command::Stat(args) => cmd_stat(&repo, args, format),
        Command::Write(args) => cmd_write(&repo, args),
        Command::Mkdir(args) => cmd_mkdir(&repo, args),
        Command::Rm(args) => cmd_rm(&repo, args),
        Command::Mv(args) => cmd_mv(&repo, args),
        Command::Import(args) => cmd_import(&repo, args),
        Command::Show(args) => cmd_show(&repo, args, format),
        Command::Resolve(args) => cmd_resolve(&repo, args),
        Command::Refs(args) => cmd_refs(&repo, args, format),
    }
}

/// View of `rev`; the tracked reference may still be unborn.
fn view_for(repo: &Repository, rev: &str) -> anyhow::Result<ReadOnlyView> {
    if rev == repo.config().reference {
        return Ok(repo.view()?);
    }
    repo.view_at(rev)
        .with_context(|| format!("cannot resolve revision {rev}"))
}

fn print_commit(outcome: &CommitOutcome, message: &str) {
    println!(
        "{} [{} {}] {}",
        "✓".green().bold(),
        outcome.reference.trim_start_matches("refs/heads/").yellow(),
        outcome.commit.short_hex().dimmed(),
        message
    );
}

fn commit_overlay(
    repo: &Repository,
    mut overlay: CopyOnWriteOverlay,
    message: String,
) -> anyhow::Result<()> {
    let outcome = overlay
        .commit(&message, &repo.signature())
        .context("commit failed")?;
    print_commit(&outcome, &message);
    Ok(())
}

fn cmd_init(path: &Path) -> anyhow::Result<()> {
    let repo = Repository::init(path)
        .with_context(|| format!("cannot initialize {}", path.display()))?;
    println!(
        "{} Initialized Arbor repository in {}",
        "✓".green().bold(),
        path.display().to_string().bold()
    );
    println!("  Branch: {}", repo.config().default_branch.yellow());
    Ok(())
}

fn cmd_ls(repo: &Repository, args: LsArgs, format: OutputFormat) -> anyhow::Result<()> {
    let view = view_for(repo, &args.rev.rev)?;
    let entries = view.open_dir(&args.path)?.read_dir(0)?;
    if format == OutputFormat::Json {
        let rows: Vec<_> = entries
            .iter()
            .map(|e| {
                json!({
                    "name": e.name(),
                    "mode": e.mode().to_string(),
                    "id": e.object_id().map(|id| id.to_hex()),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }
    for entry in entries {
        let id = entry.object_id().map(|id| id.short_hex()).unwrap_or_default();
        if entry.is_dir() {
            println!("{} {} {}/", entry.mode(), id.dimmed(), entry.name().blue().bold());
        } else if entry.mode() == EntryMode::Executable {
            println!("{} {} {}", entry.mode(), id.dimmed(), entry.name().green());
        } else {
            println!("{} {} {}", entry.mode(), id.dimmed(), entry.name());
        }
    }
    Ok(())
}

fn cmd_cat(repo: &Repository, args: PathArgs) -> anyhow::Result<()> {
    let view = view_for(repo, &args.rev.rev)?;
    let mut file = view.open_file(&args.path)?;
    let mut stdout = io::stdout().lock();
    io::copy(&mut file, &mut stdout)?;
    stdout.flush()?;
    Ok(())
}

fn cmd_stat(repo: &Repository, args: PathArgs, format: OutputFormat) -> anyhow::Result<()> {
    let view = view_for(repo, &args.rev.rev)?;
    let info = view.metadata(&args.path)?;
    let size = match info.object_id() {
        Some(id) if !info.is_dir() => repo.store().object_size(&id)?,
        _ => None,
    };
    let kind = if info.is_dir() { "directory" } else { "file" };
    if format == OutputFormat::Json {
        let value = json!({
            "path": info.path(),
            "name": info.name(),
            "type": kind,
            "mode": info.mode().to_string(),
            "id": info.object_id().map(|id| id.to_hex()),
            "size": size,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }
    println!("  Path: {}", info.name().bold());
    println!("  Type: {kind}");
    println!("  Mode: {}", info.mode());
    if let Some(id) = info.object_id() {
        println!("  Object: {}", id.to_hex().yellow());
    }
    if let Some(size) = size {
        println!("  Size: {size}");
    }
    Ok(())
}

fn cmd_write(repo: &Repository, args: WriteArgs) -> anyhow::Result<()> {
    let content = match (&args.content, &args.from) {
        (Some(text), _) => text.clone().into_bytes(),
        (None, Some(file)) => {
            std::fs::read(file).with_context(|| format!("cannot read {}", file.display()))?
        }
        (None, None) => {
            let mut buf = Vec::new();
            io::stdin().read_to_end(&mut buf)?;
            buf
        }
    };
    let mut overlay = repo.overlay()?;
    if args.create {
        overlay.create_file(&args.path, &content)?;
    } else {
        overlay.write_file(&args.path, &content)?;
    }
    if args.exec {
        overlay.set_mode(&args.path, EntryMode::Executable)?;
    }
    let message = args
        .message
        .message
        .unwrap_or_else(|| format!("Write {}", args.path));
    commit_overlay(repo, overlay, message)
}

fn cmd_mkdir(repo: &Repository, args: MkdirArgs) -> anyhow::Result<()> {
    let mut overlay = repo.overlay()?;
    if args.parents {
        overlay.create_dir_all(&args.path)?;
    } else {
        overlay.create_dir(&args.path)?;
    }
    if !overlay.is_dirty() {
        println!("Nothing to do.");
        return Ok(());
    }
    let message = args
        .message
        .message
        .unwrap_or_else(|| format!("Create {}", args.path));
    commit_overlay(repo, overlay, message)
}

fn cmd_rm(repo: &Repository, args: RmArgs) -> anyhow::Result<()> {
    let mut overlay = repo.overlay()?;
    if args.recursive {
        if !overlay.exists(&args.path)? {
            bail!("{} does not exist", args.path);
        }
        overlay.remove_all(&args.path)?;
    } else {
        overlay.remove(&args.path)?;
    }
    let message = args
        .message
        .message
        .unwrap_or_else(|| format!("Remove {}", args.path));
    commit_overlay(repo, overlay, message)
}

fn cmd_mv(repo: &Repository, args: MvArgs) -> anyhow::Result<()> {
    let mut overlay = repo.overlay()?;
    overlay.rename(&args.from, &args.to)?;
    if !overlay.is_dirty() {
        println!("Nothing to do.");
        return Ok(());
    }
    let message = args
        .message
        .message
        .unwrap_or_else(|| format!("Move {} to {}", args.from, args.to));
    commit_overlay(repo, overlay, message)
}

fn cmd_import(repo: &Repository, args: ImportArgs) -> anyhow::Result<()> {
    let options = ImportOptions {
        include_hidden: args.hidden || repo.config().import.include_hidden,
        respect_ignore_files: !args.no_ignore && repo.config().import.respect_ignore_files,
        ..repo.config().import.clone()
    };
    let mut index = repo.load_index()?;
    let summary = import_directory(&mut index, &args.dir, &options)
        .with_context(|| format!("cannot import {}", args.dir.display()))?;
    repo.save_index(&index)?;
    println!(
        "  {} {} files, {} symlinks, {} bytes ({} removed)",
        "imported:".green(),
        summary.files,
        summary.symlinks,
        summary.bytes,
        summary.removed
    );

    let message = args
        .message
        .message
        .unwrap_or_else(|| format!("Import {}", args.dir.display()));
    let outcome = repo.commit_index(&mut index, &message, &repo.signature())?;
    print_commit(&outcome, &message);
    Ok(())
}

fn cmd_show(repo: &Repository, args: ShowArgs, format: OutputFormat) -> anyhow::Result<()> {
    let view = repo
        .view_at(&args.rev)
        .with_context(|| format!("cannot resolve revision {}", args.rev))?;
    let Some(id) = view.commit() else {
        bail!("{} is not a commit", args.rev);
    };
    let commit = repo.store().read_commit(&id)?;
    if format == OutputFormat::Json {
        let value = json!({
            "commit": id.to_hex(),
            "tree": commit.tree.to_hex(),
            "parents": commit.parents.iter().map(|p| p.to_hex()).collect::<Vec<_>>(),
            "author": commit.author,
            "committer": commit.committer,
            "message": commit.message,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }
    println!("{} {}", "commit".yellow(), id.to_hex().yellow());
    println!("  Tree: {}", commit.tree.to_hex().dimmed());
    for parent in &commit.parents {
        println!("  Parent: {}", parent.to_hex().dimmed());
    }
    println!("  Author: {} ({} ms)", commit.author, commit.author.timestamp_ms);
    println!();
    for line in commit.message.lines() {
        println!("    {line}");
    }
    Ok(())
}

fn cmd_resolve(repo: &Repository, args: ResolveArgs) -> anyhow::Result<()> {
    let id = repo
        .resolve(&args.name)
        .with_context(|| format!("cannot resolve {}", args.name))?;
    println!("{}", id.to_hex());
    Ok(())
}

fn cmd_refs(repo: &Repository, args: RefsArgs, format: OutputFormat) -> anyhow::Result<()> {
    let refs = repo.list_refs(&args.prefix)?;
    if format == OutputFormat::Json {
        let rows: Vec<_> = refs
            .iter()
            .map(|(name, value)| json!({ "name": name, "value": value.to_string() }))
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }
    if refs.is_empty() {
        println!("No references.");
    }
    for (name, value) in refs {
        println!("{} {}", value.to_string().dimmed(), name.green());
    }
    Ok(())
}
