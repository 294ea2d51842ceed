//! Folder tree walker.
//!
//! A folder listing only carries the labs directly inside it, so a full
//! inventory takes one call per folder. From `/` the walk descends
//! `folder_depth` levels (one by default: root plus each first-level
//! subfolder); any other starting folder is listed alone. Subfolders on
//! one level are fetched concurrently and merged back in listing order.

use std::collections::HashSet;

use eve_client::wire::FolderListing;
use eve_domain::error::Result;
use eve_domain::lab::{Category, LabInventory, LabSummary, Warning};
use eve_domain::trace::TraceEvent;
use futures_util::future::join_all;

use crate::adapter::Operation;
use crate::session::SessionManager;

/// Normalise a folder path: leading slash, no trailing slash, `/` for root.
pub fn normalize_folder(path: &str) -> String {
    let trimmed = path.trim().trim_matches('/');
    if trimmed.is_empty() {
        "/".to_owned()
    } else {
        format!("/{trimmed}")
    }
}

fn join_path(folder: &str, file: &str) -> String {
    if folder == "/" {
        format!("/{file}")
    } else {
        format!("{folder}/{file}")
    }
}

async fn fetch_folder(session: &SessionManager, path: &str) -> Result<FolderListing> {
    let owned = path.to_owned();
    session
        .call(Operation::new("list_folder").arg("path", path), move |api| {
            api.list_folder(&owned)
        })
        .await
}

fn collect_labs(folder: &str, listing: &FolderListing, out: &mut Vec<LabSummary>) {
    for lab in &listing.labs {
        let path = if lab.path.is_empty() {
            join_path(folder, &lab.file)
        } else {
            lab.path.clone()
        };
        out.push(LabSummary::new(folder, lab.file.clone(), path, lab.mtime.clone(), lab.umtime));
    }
}

/// Subfolders of `listing` not yet visited, marking them visited.
fn unvisited_children(listing: &FolderListing, visited: &mut HashSet<String>) -> Vec<String> {
    listing
        .subfolders()
        .map(|f| normalize_folder(&f.path))
        .filter(|p| visited.insert(p.clone()))
        .collect()
}

/// Walk the folder tree from `root` and flatten every lab found.
///
/// The root listing must succeed; its failure is the returned error.
/// A failing subfolder contributes no labs and a [`Category::Subfolder`]
/// warning.
pub async fn list_labs(session: &SessionManager, root: &str, folder_depth: usize) -> Result<LabInventory> {
    let root = normalize_folder(root);
    let root_listing = fetch_folder(session, &root).await?;

    let mut labs = Vec::new();
    let mut warnings = Vec::new();
    collect_labs(&root, &root_listing, &mut labs);

    let levels = if root == "/" { folder_depth } else { 0 };
    let mut visited = HashSet::from([root.clone()]);
    let mut frontier = if levels > 0 {
        unvisited_children(&root_listing, &mut visited)
    } else {
        Vec::new()
    };

    for level in 1..=levels {
        if frontier.is_empty() {
            break;
        }
        let results = join_all(frontier.iter().map(|p| fetch_folder(session, p))).await;

        let mut next = Vec::new();
        for (path, result) in frontier.iter().zip(results) {
            match result {
                Ok(listing) => {
                    collect_labs(path, &listing, &mut labs);
                    if level < levels {
                        next.extend(unvisited_children(&listing, &mut visited));
                    }
                }
                Err(e) => {
                    tracing::warn!(folder = %path, error = %e, "skipping unreadable folder");
                    warnings.push(Warning::new(Category::Subfolder, path.clone(), &e));
                }
            }
        }
        frontier = next;
    }

    if !warnings.is_empty() {
        TraceEvent::AggregationDegraded {
            operation: "list_labs".into(),
            subject: root.clone(),
            warnings: warnings.len(),
        }
        .emit();
    }

    Ok(LabInventory { root, labs, warnings })
}
