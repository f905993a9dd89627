//! Command implementations: the orchestration layer driving auth, the Drive
//! client, and the snapshot writer.

use crate::archive;
use crate::auth;
use crate::config::{Config, DocumentRef};
use crate::drive::{DriveClient, Revision};
use crate::error::Error;
use anyhow::{bail, Result};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Duration;

/// Per-revision outcome collected by the download loop. Failures stay local
/// to their item; nothing crosses the loop boundary as an error.
type Outcome = (String, std::result::Result<PathBuf, Error>);

// ============ REVISIONS COMMAND ============

pub fn revisions(timeout: u64) -> Result<()> {
    println!("{}", "docrev - revision archive".bold().cyan());
    println!();

    let config = Config::load()?;
    let documents = config.require_documents()?;

    let credentials = auth::obtain_credentials(&config, Duration::from_secs(timeout))?;
    let client = DriveClient::new(credentials.access_token);

    let mut total_revisions = 0usize;
    let mut total_saved = 0usize;

    for doc in documents {
        let title = display_title(&client, doc);
        println!("Downloading revision history for '{}'...", title.yellow());

        // A listing failure aborts the run: a partial revision list is not
        // usable. Per-revision failures below are only skipped.
        let revisions = client.list_revisions(&doc.id)?;
        if revisions.is_empty() {
            println!("  {}", "No revisions available".dimmed());
            continue;
        }

        let outcomes = download_all(&client, &config, doc, &revisions);
        let saved = outcomes.iter().filter(|(_, result)| result.is_ok()).count();
        let failed = outcomes.len() - saved;

        for (revision_id, result) in &outcomes {
            if let Err(e) = result {
                println!("  {} revision {}: {}", "skipped".yellow(), revision_id, e);
            }
        }

        println!(
            "  {} saved, {} failed -> {}",
            saved.to_string().green(),
            failed.to_string().red(),
            config.revisions_dir.join(doc.folder()).display()
        );

        total_revisions += outcomes.len();
        total_saved += saved;
    }

    println!();
    if total_revisions > 0 && total_saved == 0 {
        bail!("no revisions could be downloaded; re-run the command to try again");
    }

    println!(
        "{}",
        format!(
            "✓ Archive complete: {}/{} revisions saved",
            total_saved, total_revisions
        )
        .green()
        .bold()
    );
    if total_saved < total_revisions {
        println!(
            "{}",
            "Re-run the command to pick up the revisions that failed.".dimmed()
        );
    }

    Ok(())
}

/// Download and write every revision, one at a time, in listing order.
/// Each item's result is collected; a failure is logged and skipped so the
/// later revisions still run.
fn download_all(
    client: &DriveClient,
    config: &Config,
    doc: &DocumentRef,
    revisions: &[Revision],
) -> Vec<Outcome> {
    let pb = ProgressBar::new(revisions.len() as u64);
    pb.set_style(
        ProgressStyle::with_template("  [{bar:40.cyan/blue}] {pos}/{len} ({percent}%)")
            .unwrap()
            .progress_chars("█▓░"),
    );

    let mut outcomes = Vec::with_capacity(revisions.len());
    for revision in revisions {
        let result = client
            .download_revision(&doc.id, revision)
            .and_then(|content| {
                archive::write_revision(&config.revisions_dir, doc.folder(), revision, &content)
            });
        if let Err(ref e) = result {
            tracing::warn!("Could not save revision {}: {}", revision.id, e);
        }
        outcomes.push((revision.id.clone(), result));
        pb.inc(1);
    }
    pb.finish();

    outcomes
}

/// Title for display and folders: a metadata failure falls back to the
/// document ID rather than aborting the archive run.
fn display_title(client: &DriveClient, doc: &DocumentRef) -> String {
    match client.document_title(&doc.id) {
        Ok(title) => title,
        Err(e) => {
            tracing::debug!("Cannot fetch title for {}: {}", doc.id, e);
            doc.id.clone()
        }
    }
}

// ============ EXPORT COMMAND ============

pub fn export(timeout: u64) -> Result<()> {
    println!("{}", "docrev - current-content export".bold().cyan());
    println!();

    let config = Config::load()?;
    let documents = config.require_documents()?;

    let credentials = auth::obtain_credentials(&config, Duration::from_secs(timeout))?;
    let client = DriveClient::new(credentials.access_token);

    for doc in documents {
        let title = client.document_title(&doc.id)?;
        let content = client.export_document(&doc.id)?;
        let path = archive::write_export(&config.exports_dir, &title, &content)?;
        println!(
            "Exported current content of '{}' to {}",
            title.yellow(),
            path.display()
        );
    }

    Ok(())
}

// ============ AUTH COMMAND ============

pub fn auth_only(timeout: u64) -> Result<()> {
    println!("{}", "docrev - Google Drive authentication".bold().cyan());
    println!();

    let config = Config::load()?;
    auth::obtain_credentials(&config, Duration::from_secs(timeout))?;

    println!("{}", "✓ Authentication successful".green());
    println!(
        "Token saved to {}",
        config.token_path.display().to_string().dimmed()
    );
    Ok(())
}

// ============ STATUS COMMAND ============

pub fn status() -> Result<()> {
    println!("{}", "docrev status".bold().cyan());
    println!();

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            println!("Config:    {}", "Not configured".yellow());
            println!("{}", e.to_string().dimmed());
            return Ok(());
        }
    };

    let auth_line = match auth::load_credentials(&config.token_path) {
        Ok(Some(credentials)) if !credentials.is_expired() => "Authenticated".green().to_string(),
        Ok(Some(_)) => "Token expired".yellow().to_string(),
        Ok(None) => "Not authenticated".red().to_string(),
        Err(_) => "Token file unreadable".red().to_string(),
    };
    println!("Auth:      {}", auth_line);
    println!("Secrets:   {}", config.client_secrets.display());

    if config.documents.is_empty() {
        println!("Documents: {}", "none configured".yellow());
    } else {
        println!("Documents:");
        for doc in &config.documents {
            let count = archive::snapshot_count(&config.revisions_dir, doc.folder());
            println!(
                "  - {} ({} snapshots archived)",
                doc.folder(),
                count.to_string().cyan()
            );
        }
    }

    Ok(())
}
