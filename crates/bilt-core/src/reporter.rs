//! User-facing progress output for a build cycle.
//!
//! The cycle only talks to the [`Reporter`] trait; [`ConsoleReporter`] is the
//! terminal rendering used by the `bilt` binary.

use crate::domain::package::PackageInfo;

/// Renders cycle progress for humans.
pub trait Reporter: Send + Sync {
    /// Top-level banner, e.g. the packages about to be built.
    fn global_header(&self, text: &str);

    /// A cycle-wide operation that is about to run (pull, commit, push).
    fn global_operation(&self, text: &str);

    /// Closing status line of the cycle.
    fn global_footer(&self, text: &str);

    /// A package finished successfully.
    fn package_footer(&self, text: &str, package: &PackageInfo);

    /// A package failed.
    fn package_error_footer(&self, text: &str, package: &PackageInfo, error: &str);

    /// Undecorated output, e.g. the dry-run build order.
    fn plain(&self, text: &str);
}

/// Prints to stdout (progress) and stderr (failures).
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleReporter;

impl ConsoleReporter {
    pub fn new() -> Self {
        Self
    }
}

impl Reporter for ConsoleReporter {
    fn global_header(&self, text: &str) {
        println!("\n**** {text}\n");
    }

    fn global_operation(&self, text: &str) {
        println!("==> {text}");
    }

    fn global_footer(&self, text: &str) {
        println!("\n**** {text}");
    }

    fn package_footer(&self, text: &str, package: &PackageInfo) {
        println!("  ✓ {} ({}): {text}", package.directory(), package.name);
    }

    fn package_error_footer(&self, text: &str, package: &PackageInfo, error: &str) {
        eprintln!("  ✗ {} ({}): {text}", package.directory(), package.name);
        for line in error.lines() {
            eprintln!("      {line}");
        }
    }

    fn plain(&self, text: &str) {
        println!("{text}");
    }
}

/// Render directories as the comma-separated list used in headers and dry runs.
pub fn format_directories<'a>(directories: impl IntoIterator<Item = &'a str>) -> String {
    directories.into_iter().collect::<Vec<_>>().join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_directories() {
        assert_eq!(format_directories(["a", "b", "c"]), "a, b, c");
        assert_eq!(format_directories(Vec::<&str>::new()), "");
    }
}
