//! Startup banner and shutdown summary, written to stderr so stdout
//! carries nothing but responses.

use crate::consts::{AUTHOR, HOMEPAGE, REPO, format_number};
use crate::service::ServeStats;

/// Service configuration for display in the startup banner.
pub struct BannerInfo<'a> {
    pub topic: &'a str,
    pub api_url: &'a str,
    pub mode: &'a str,
    pub references: &'a str,
}

/// Print the startup banner with service info.
pub fn print_banner(info: &BannerInfo) {
    eprintln!(
        r#"
   ╔═══════════════════════════════════════╗
   ║            W I K I B U S              ║
   ║   encyclopedia lookups on the bus     ║
   ╚═══════════════════════════════════════╝

   version     {}
   by          {}
   home        {}
   repo        {}
   topic       {}
   api         {}
   mode        {}
   references  {}
"#,
        env!("CARGO_PKG_VERSION"),
        AUTHOR,
        HOMEPAGE,
        REPO,
        info.topic,
        info.api_url,
        info.mode,
        info.references,
    );
}

/// Print request counts and a farewell.
pub fn print_serve_summary(stats: &ServeStats) {
    if stats.received > 0 {
        eprintln!(
            "served: {} received, {} answered, {} failed",
            format_number(stats.received),
            format_number(stats.answered),
            format_number(stats.failed),
        );
    }
    if stats.skipped > 0 {
        eprintln!("skipped: {}", format_number(stats.skipped));
    }
    eprintln!("goodbye.");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn print_banner_does_not_panic() {
        let info = BannerInfo {
            topic: "wikipedia",
            api_url: "https://en.wikipedia.org/w/api.php",
            mode: "lenient",
            references: "coordinates",
        };
        print_banner(&info);
    }

    #[test]
    fn print_serve_summary_with_counts() {
        let stats = ServeStats {
            received: 1234,
            answered: 1200,
            failed: 34,
            skipped: 2,
        };
        print_serve_summary(&stats);
    }

    #[test]
    fn print_serve_summary_idle() {
        // Only the farewell line
        print_serve_summary(&ServeStats::default());
    }
}
