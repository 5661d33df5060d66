//! Interactive dataset picker.
//!
//! Kept separate from clap parsing: clap handles flags and subcommands, the
//! picker provides the "run `optofit fit` and choose a file" UX.
//!
//! The picker searches for `.json`, `.parquet` and `.pq` datasets under the
//! current working directory.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::error::AppError;
use crate::io::{SUPPORTED_EXTENSIONS, is_supported};

/// Default directory recursion depth for finding datasets.
pub const DEFAULT_SEARCH_DEPTH: usize = 4;

/// Prompt the user to select a dataset from the current directory tree.
///
/// Accepts either a number from the list or an explicit path; `q` cancels.
pub fn prompt_for_dataset_path() -> Result<PathBuf, AppError> {
    let files = discover_datasets(Path::new("."), DEFAULT_SEARCH_DEPTH);
    if files.is_empty() {
        return Err(AppError::new(
            2,
            "No datasets found. Provide one with `optofit fit <file.json|file.parquet>`.",
        ));
    }

    println!("Found {} dataset(s):", files.len());
    for (idx, path) in files.iter().enumerate() {
        println!("{:>3}) {}", idx + 1, pretty_path(path));
    }

    loop {
        print!("Select a file by number (1-{}) or type a path (q to quit): ", files.len());
        io::stdout()
            .flush()
            .map_err(|e| AppError::new(2, format!("Failed to write prompt: {e}")))?;

        let mut input = String::new();
        let bytes = io::stdin()
            .read_line(&mut input)
            .map_err(|e| AppError::new(2, format!("Failed to read input: {e}")))?;

        if bytes == 0 {
            return Err(AppError::new(
                2,
                "No input received. Provide a dataset path with `optofit fit <file>`.",
            ));
        }

        let input = input.trim();
        if input.eq_ignore_ascii_case("q") {
            return Err(AppError::new(2, "Canceled."));
        }

        if let Ok(choice) = input.parse::<usize>() {
            if (1..=files.len()).contains(&choice) {
                return validate_dataset_path(&files[choice - 1]);
            }
            println!("Invalid choice: {choice}. Enter a number between 1 and {}.", files.len());
            continue;
        }

        match validate_dataset_path(Path::new(input)) {
            Ok(path) => return Ok(path),
            Err(err) => println!("{err}"),
        }
    }
}

/// Validate that `path` is an existing file with a supported extension.
pub fn validate_dataset_path(path: &Path) -> Result<PathBuf, AppError> {
    if !path.exists() {
        return Err(AppError::new(
            2,
            format!("Dataset not found: {}", path.display()),
        ));
    }
    if path.is_dir() {
        return Err(AppError::new(
            2,
            format!("Expected a file, got a directory: {}", path.display()),
        ));
    }
    if !is_supported(path) {
        return Err(AppError::new(
            2,
            format!(
                "Unsupported dataset {} (expected one of: {}).",
                path.display(),
                SUPPORTED_EXTENSIONS.join(", ")
            ),
        ));
    }

    Ok(path.to_path_buf())
}

/// Datasets under `root`, at most `max_depth` directories deep, sorted by
/// their display path.
///
/// Used by both the text prompt and the TUI file browser.
pub fn discover_datasets(root: &Path, max_depth: usize) -> Vec<PathBuf> {
    let mut out = Vec::new();
    find_datasets_inner(root, 0, max_depth, &mut out);
    out.sort_by_key(|p| pretty_path(p));
    out
}

fn find_datasets_inner(dir: &Path, depth: usize, max_depth: usize, out: &mut Vec<PathBuf>) {
    if depth > max_depth {
        return;
    }

    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };

    for entry in entries.flatten() {
        let path = entry.path();
        let Ok(file_type) = entry.file_type() else {
            continue;
        };

        if file_type.is_dir() {
            if !should_skip_dir(&path) {
                find_datasets_inner(&path, depth + 1, max_depth, out);
            }
        } else if file_type.is_file() && is_supported(&path) && !is_temp_file(&path) {
            out.push(path);
        }
    }
}

fn should_skip_dir(path: &Path) -> bool {
    let name = path.file_name().and_then(|s| s.to_str()).unwrap_or("");
    matches!(name, ".git" | "target" | "node_modules")
}

// Leftovers of an interrupted atomic write (`.name.tmp`) are never datasets,
// but `.name.json` style hidden files are.
fn is_temp_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|s| s.to_str())
        .is_some_and(|name| name.starts_with('.') && name.ends_with(".tmp"))
}

/// Path for display: leading `./` stripped.
pub fn pretty_path(path: &Path) -> String {
    let stripped = path.strip_prefix("./").unwrap_or(path);
    stripped.display().to_string()
}
