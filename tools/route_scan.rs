//! Prints rule seeds for the routes an axum source tree serves.
//!
//! Scans Rust sources for `.route("…")` registrations and `.nest("…")`
//! mount prefixes, collapses parameterized paths to their static
//! ancestors, and prints ready-to-paste `[[rules]]` TOML for the rules
//! configuration file.
//!
//! Usage:
//!   cargo run --bin route_scan -- [src-dir]
//!
//! The directory defaults to `src`. This is a text scan, not a compile:
//! route paths built at runtime are not seen, and string literals inside
//! comments are. Review the output before loading it.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use axum_pathgate::{candidates_from_routes, RouteCandidate, DISCOVERED_RULE_PRIORITY};

fn main() {
    let args: Vec<String> = env::args().skip(1).collect();
    if args.iter().any(|arg| arg == "--help") {
        print_help();
        return;
    }
    for arg in &args {
        if arg.starts_with('-') {
            eprintln!("Unknown option: {}", arg);
            process::exit(1);
        }
    }

    let dir = args
        .first()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("src"));

    let mut routes = Vec::new();
    scan_dir(&dir, &mut routes);
    if routes.is_empty() {
        eprintln!("No route registrations found under {}", dir.display());
        process::exit(1);
    }

    print_rules(&candidates_from_routes(routes));
}

fn print_help() {
    println!("Route scanner: rule seeds for the routes an axum source tree serves");
    println!();
    println!("Usage: route_scan [src-dir]");
    println!();
    println!("Scans .rs files for .route(\"…\") and .nest(\"…\") path literals and");
    println!("prints [[rules]] TOML entries. The directory defaults to 'src'.");
}

/// Collect route path literals from every `.rs` file under a directory.
fn scan_dir(dir: &Path, routes: &mut Vec<String>) {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            eprintln!("Cannot read {}: {}", dir.display(), err);
            return;
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            scan_dir(&path, routes);
        } else if path.extension().map_or(false, |ext| ext == "rs") {
            if let Ok(source) = fs::read_to_string(&path) {
                routes.extend(extract_route_paths(&source));
            }
        }
    }
}

/// Extract the first string-literal argument of every `.route(` and
/// `.nest(` call in a source text.
fn extract_route_paths(source: &str) -> Vec<String> {
    let mut paths = Vec::new();
    for call in [".route(", ".nest("] {
        let mut search = 0;
        while let Some(pos) = source[search..].find(call) {
            let after = search + pos + call.len();
            if let Some(path) = leading_string_literal(&source[after..]) {
                paths.push(path);
            }
            search = after;
        }
    }
    paths
}

/// Read a `"…"` literal at the start of `text`, ignoring leading
/// whitespace. `None` when the first argument is not a literal.
fn leading_string_literal(text: &str) -> Option<String> {
    let rest = text.trim_start().strip_prefix('"')?;
    let end = rest.find('"')?;
    Some(rest[..end].to_string())
}

fn print_rules(candidates: &[RouteCandidate]) {
    println!("# Discovered route rules. Review before loading; discovered entries");
    println!("# default to public visibility and late priority.");
    for candidate in candidates {
        println!();
        println!("[[rules]]");
        println!("pattern = \"{}\"", candidate.pattern);
        println!("visibility = \"public\"");
        println!("priority = {}", DISCOVERED_RULE_PRIORITY);
        println!("description = \"{}\"", candidate.description);
    }
}
